//! Command-line surface for the `dragonsyncd` daemon.

use std::path::PathBuf;

use clap::{crate_authors, crate_description, crate_name, crate_version, Parser};

/// CLI options
#[derive(Parser)]
#[command(disable_version_flag = true)]
#[clap(name = crate_name!(), about = crate_description!())]
#[clap(version = crate_version!(), author = crate_authors!())]
pub struct Opts {
    /// Configuration file; defaults to the platform config directory.
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,
    /// Verbose/debug logging.
    #[clap(short = 'D', long = "debug")]
    pub debug: bool,
    /// Render logs as a hierarchical span tree instead of flat lines.
    #[clap(long = "use-tree")]
    pub use_tree: bool,
    /// Export traces through OpenTelemetry (only takes effect when the
    /// `telemetry` feature is built in).
    #[clap(long = "use-telemetry")]
    pub use_telemetry: bool,
}
