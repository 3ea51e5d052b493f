use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "thermal-report",
    version,
    about = "Satellite thermal simulation post-processor: limit checks, plots and report"
)]
pub struct Cli {
    /// Analysis options used when no subcommand is given.
    #[command(flatten)]
    pub analyze: AnalyzeArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the analysis (the default when no subcommand is given)
    Analyze(AnalyzeArgs),
    /// Write a fully populated default configuration file
    InitConfig(InitConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// TOML configuration; a missing file means built-in defaults
    #[arg(long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Directory in which the timestamped output folder is created
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct InitConfigArgs {
    /// Where to write the template
    #[arg(long, default_value = "config.toml")]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(long, default_value_t = false)]
    pub force: bool,
}
