use std::path::PathBuf;

use clap::Parser;

use license_digger::models::MatcherKind;

#[derive(Parser, Debug)]
#[command(
    name = "license-digger",
    about = "Detect license headers in a source tree and convert them to SPDX identifiers",
    version
)]
pub struct Cli {
    /// Directory to scan
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Replace recognised headers with `SPDX-License-Identifier` lines in place
    #[arg(short, long)]
    pub convert: bool,

    /// Matching strategy [default: from config, else skip]
    #[arg(long, value_name = "MATCHER")]
    pub matcher: Option<MatcherKind>,

    /// Glob (relative to PATH) of files to skip; repeatable
    #[arg(long, value_name = "GLOB")]
    pub ignore: Vec<String>,

    /// Config file [default: ./.license-digger/config.toml, fallback ~/.config/license-digger/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory of header texts replacing the bundled corpus
    #[arg(long, value_name = "DIR")]
    pub corpus: Option<PathBuf>,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,

    /// List corpus identifiers that have no license text file
    #[arg(long)]
    pub check_license_files: bool,

    /// Show every scanned file (not just unknown/ambiguous ones)
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print summary line
    #[arg(short, long)]
    pub quiet: bool,

    /// Log per-file decisions to stderr
    #[arg(long)]
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}
