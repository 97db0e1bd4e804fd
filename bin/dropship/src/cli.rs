use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dropship_deploy::CONFIG_FILENAME;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "dropship")]
#[command(
    author,
    version,
    about = "Build a static site and ship it to a server over SSH"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "DROPSHIP_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Build, upload and publish to an environment.
    Deploy(DeployArgs),
    /// Print the steps a deployment would run, without running them.
    Plan(TargetArgs),
}

/// Selects the environment and how it is deployed.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// The environment to deploy to, as named in the configuration file.
    #[arg(short, long, short_alias = 'm', alias = "mode", env = "DROPSHIP_ENV")]
    pub env: String,

    /// Skip the build script and deploy the output already on disk.
    #[arg(long, env = "DROPSHIP_LOCAL")]
    pub local: bool,

    /// Path to the configuration file, or to the directory holding it.
    #[arg(short, long, env = "DROPSHIP_CONFIG", default_value = CONFIG_FILENAME)]
    pub config: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
    #[clap(flatten)]
    pub target: TargetArgs,

    /// Never prompt. The password must come from DROPSHIP_PASSWORD_<ENV>.
    ///
    /// Also enabled when stdin is not a terminal.
    #[arg(long, alias = "yes", env = "DROPSHIP_CI")]
    pub ci: bool,
}
