//! Error types for a deployment run.
//!
//! Every variant is fatal: a step that fails hands its error back to the
//! executor, which stops the run and reports it.

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::Step;

/// Result alias used across the crate.
pub type DeployResult<T> = Result<T, DeployError>;

/// Errors raised while preparing or running a deployment.
#[derive(Error, Debug)]
pub enum DeployError {
    /// The configuration file does not exist.
    #[error("configuration file {} not found, create it before deploying", path.display())]
    ConfigNotFound { path: PathBuf },

    /// The configuration file could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The requested environment is not defined in the configuration.
    #[error("environment '{env}' is not defined in the configuration")]
    UnknownEnvironment { env: String },

    /// A required environment field is absent, empty or set to `/`.
    #[error("environment '{env}': field '{field}' is missing or invalid")]
    MissingField { env: String, field: &'static str },

    /// Automation mode is active and no secret variable was provided.
    #[error("no password available in automation mode, set the {var} environment variable")]
    MissingSecret { var: String },

    /// An interactive prompt could not be shown or answered.
    #[error("prompt failed: {0}")]
    Prompt(String),

    /// The operator declined the pre-deploy confirmation.
    #[error("deployment cancelled by operator")]
    Declined,

    /// The external build command failed.
    #[error("build script '{script}' failed ({status}): {output}")]
    Build {
        script: String,
        status: String,
        output: String,
    },

    /// Writing the artifact archive failed.
    #[error("failed to archive {}: {message}", path.display())]
    Archive { path: PathBuf, message: String },

    /// The SSH connection could not be established.
    #[error("ssh connection to {host} failed: {message}")]
    Connect { host: String, message: String },

    /// The server rejected the credentials.
    #[error("ssh authentication failed for {user}@{host}")]
    Auth { user: String, host: String },

    /// Uploading the archive failed.
    #[error("upload to {remote} failed: {message}")]
    Transfer { remote: String, message: String },

    /// A remote command failed to run or exited non-zero.
    #[error("remote command `{command}` failed ({status}): {output}")]
    RemoteCommand {
        command: String,
        status: String,
        output: String,
    },

    /// A remote step ran without an open session.
    #[error("no ssh session is open")]
    NotConnected,

    /// Removing local build output failed.
    #[error("failed to remove {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A pipeline step failed; raised by the executor only.
    #[error("step ({index}) {step} failed: {source}")]
    StepFailed {
        index: usize,
        step: Step,
        #[source]
        source: Box<DeployError>,
    },
}

impl DeployError {
    /// The error that caused a step failure, or `self` for any other error.
    pub fn root(&self) -> &DeployError {
        match self {
            DeployError::StepFailed { source, .. } => source.root(),
            other => other,
        }
    }
}
