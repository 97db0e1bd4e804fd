//! dropship-deploy - Ship a locally built static site to a server over SSH.
//!
//! A run builds the site, zips it, uploads the archive, backs up and
//! replaces the remote directory, then cleans up. See [`pipeline`] for the
//! step order and [`DeploymentRun`] for the overall flow.

pub mod cleanup;
pub mod config;
pub mod credential;
mod deployment;
mod error;
pub mod package;
pub mod pipeline;
pub mod remote;

pub use config::{CONFIG_FILENAME, DeployConfig, EnvironmentConfig, RawEnvironment};
pub use credential::{
    Prompter, RunMode, SECRET_VAR_PREFIX, Secret, TerminalPrompter, secret_var_name,
};
pub use deployment::{DeployReport, DeploymentRun, RunOptions, current_branch};
pub use error::{DeployError, DeployResult};
pub use package::{BuildRunner, ProcessBuildRunner};
pub use pipeline::{Capabilities, Executor, ExecutorState, RunContext, Step, TaskList};
pub use remote::{CommandOutput, ConnectTarget, RemoteConnector, RemoteSession, SshConnector};
