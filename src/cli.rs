use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use glob::Pattern;

use crate::render::Format;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Compare two folders and show differences in size and file count",
    long_about = None
)]
pub struct Args {
    /// First folder to compare
    pub folder1: Option<PathBuf>,

    /// Second folder to compare
    pub folder2: Option<PathBuf>,

    /// First folder to compare (alternative to positional)
    #[arg(long = "folder1", visible_alias = "f1", value_name = "FOLDER1")]
    pub folder1_flag: Option<PathBuf>,

    /// Second folder to compare (alternative to positional)
    #[arg(long = "folder2", visible_alias = "f2", value_name = "FOLDER2")]
    pub folder2_flag: Option<PathBuf>,

    /// Force colored table output
    #[arg(short, long)]
    pub rich: bool,

    /// Force plain text table output
    #[arg(short, long)]
    pub plain: bool,

    /// Output CSV
    #[arg(short, long)]
    pub csv: bool,

    /// Show only entries with differences
    #[arg(long)]
    pub only_diffs: bool,

    /// Increase verbosity: -v for progress, -vv for debug output
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Glob patterns to ignore (can be repeated or comma separated)
    #[arg(short, long, value_delimiter = ',', num_args = 1..)]
    pub ignore: Vec<String>,

    /// Worker threads per folder scan (0 = one per CPU)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,
}

#[derive(Debug)]
pub struct Options {
    pub folder1: PathBuf,
    pub folder2: PathBuf,
    pub only_diffs: bool,
    /// `None` means pick by whether stdout is a terminal.
    pub format: Option<Format>,
    pub verbose: u8,
    pub ignore_patterns: Vec<Pattern>,
    pub jobs: usize,
}

pub fn build_options(args: &Args) -> Result<Options> {
    let folder1 = args.folder1_flag.as_ref().or(args.folder1.as_ref());
    let folder2 = args.folder2_flag.as_ref().or(args.folder2.as_ref());
    let (Some(folder1), Some(folder2)) = (folder1, folder2) else {
        bail!("Two folders must be specified either positionally or using --folder1/--folder2");
    };

    let patterns = args
        .ignore
        .iter()
        .map(|s| Pattern::new(s).with_context(|| format!("Invalid glob pattern: {s}")))
        .collect::<Result<Vec<_>>>()?;

    let format = if args.csv {
        Some(Format::Csv)
    } else if args.plain {
        Some(Format::Plain)
    } else if args.rich {
        Some(Format::Rich)
    } else {
        None
    };

    Ok(Options {
        folder1: folder1.clone(),
        folder2: folder2.clone(),
        only_diffs: args.only_diffs,
        format,
        verbose: args.verbose,
        ignore_patterns: patterns,
        jobs: args.jobs,
    })
}
