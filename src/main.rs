use std::io::{self, IsTerminal, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use chksync::logging::init_logging;
use chksync::scanner::ProgressFn;
use chksync::{aggregate, build_options, merge, render, Args, Format, ScanOptions, ScanProgress};

fn main() -> Result<()> {
    let args = Args::parse();
    let opts = build_options(&args)?;
    init_logging(opts.verbose)?;

    let scan_opts = ScanOptions {
        ignore_patterns: opts.ignore_patterns.clone(),
        jobs: opts.jobs,
    };

    let report_progress = |p: &ScanProgress<'_>| {
        info!(
            "Processing {}: {}/{} entries, {} bytes",
            p.root.display(),
            p.processed,
            p.total.map_or_else(|| "?".to_string(), |t| t.to_string()),
            p.size_so_far
        );
    };
    let progress: Option<&ProgressFn<'_>> = if opts.verbose >= 1 {
        Some(&report_progress)
    } else {
        None
    };

    // Both roots are independent; a failure on either aborts before merging.
    let (res1, res2) = rayon::join(
        || aggregate(&opts.folder1, &scan_opts, progress),
        || aggregate(&opts.folder2, &scan_opts, progress),
    );
    let res1 = res1.with_context(|| format!("Cannot scan folder1 {:?}", opts.folder1))?;
    let res2 = res2.with_context(|| format!("Cannot scan folder2 {:?}", opts.folder2))?;

    let label1 = opts.folder1.display().to_string();
    let label2 = opts.folder2.display().to_string();
    let report = merge(&res1, &res2, &label1, &label2, opts.only_diffs);

    let format = opts.format.unwrap_or_else(|| {
        if io::stdout().is_terminal() {
            Format::Rich
        } else {
            Format::Plain
        }
    });
    info!(
        ?format,
        rows = report.rows.len(),
        differing = report.totals.diffs,
        "{}",
        if report.has_differences() {
            "folders differ"
        } else {
            "folders match"
        }
    );

    let mut stdout = io::stdout().lock();
    stdout.write_all(render(&report, format).as_bytes())?;
    stdout.flush()?;

    Ok(())
}
