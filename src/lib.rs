//
// lib.rs
// chksync
//
// Library entry that re-exports modules so the binary and any external users can access folder aggregation, report merging, and rendering.
//
// Thales Matheus Mendonça Santos - November 2025
//
// Public crate interface: re-export modules used by the binary and tests.
pub mod cli;
pub mod error;
pub mod logging;
pub mod render;
pub mod report;
pub mod scanner;
pub mod utils;

pub use cli::{build_options, Args, Options};
pub use error::{FilesystemError, ScanWarning};
pub use render::{render, Format};
pub use report::{merge, Report, ReportRow, ReportTotals};
pub use scanner::{aggregate, AggregationResult, ScanOptions, ScanProgress, SubtreeStats};
