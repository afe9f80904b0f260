//! Stderr logging for the binary. Stdout is reserved for the report.

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "CHKSYNC_LOG";

/// Filter directive for a `-v` count.
pub fn default_directive(verbose: u8) -> String {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    format!("warn,chksync={level}")
}

/// Installs the global subscriber. `CHKSYNC_LOG`, when set, replaces the
/// verbosity-derived filter.
pub fn init_logging(verbose: u8) -> Result<()> {
    let filter = match std::env::var(LOG_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .with_context(|| format!("Invalid {LOG_ENV} filter: {directives}"))?,
        _ => EnvFilter::new(default_directive(verbose)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_crate_level() {
        assert_eq!(default_directive(0), "warn,chksync=warn");
        assert_eq!(default_directive(1), "warn,chksync=info");
        assert_eq!(default_directive(5), "warn,chksync=debug");
        assert!(EnvFilter::try_new(default_directive(2)).is_ok());
    }
}
