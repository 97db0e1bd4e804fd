//! Remote side of a deployment: one SSH session per run.
//!
//! [`RemoteConnector`] opens a [`RemoteSession`]; every remote step then
//! reuses that session until the disconnect step closes it.

mod cmd;
mod ssh;

pub use cmd::{RemoteLayout, backup_timestamp, shell_quote};
pub use ssh::SshConnector;

use std::{fmt, path::Path, time::Duration};

use async_trait::async_trait;

use crate::{
    config::EnvironmentConfig,
    credential::Secret,
    error::{DeployError, DeployResult},
};

/// Where and how to open the SSH session.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Secret,
    /// Time allowed for the handshake and authentication.
    pub ready_timeout: Duration,
}

impl fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("ready_timeout", &self.ready_timeout)
            .finish_non_exhaustive()
    }
}

impl ConnectTarget {
    /// Build the target from a resolved environment.
    ///
    /// Fails with [`DeployError::MissingSecret`] when the credential resolver
    /// has not filled in the password yet.
    pub fn from_env(env: &EnvironmentConfig) -> DeployResult<Self> {
        let password = env
            .password
            .clone()
            .ok_or_else(|| DeployError::MissingSecret {
                var: crate::credential::secret_var_name(&env.key),
            })?;

        Ok(Self {
            host: env.host.clone(),
            port: env.port,
            username: env.username.clone(),
            password,
            ready_timeout: env.ready_timeout,
        })
    }
}

/// Captured result of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit status, if the server reported one.
    pub status: Option<u32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Turn a non-zero exit into [`DeployError::RemoteCommand`].
    ///
    /// The error carries stderr, or stdout when stderr is blank.
    pub fn check(self, command: &str) -> DeployResult<Self> {
        if self.success() {
            return Ok(self);
        }

        let output = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        Err(DeployError::RemoteCommand {
            command: command.to_string(),
            status: match self.status {
                Some(code) => format!("exit status {code}"),
                None => "no exit status".to_string(),
            },
            output: output.to_string(),
        })
    }
}

/// Opens SSH sessions.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self, target: &ConnectTarget) -> DeployResult<Box<dyn RemoteSession>>;
}

/// An open SSH session.
#[async_trait]
pub trait RemoteSession: Send {
    /// Run a shell command and collect its output.
    async fn exec(&mut self, command: &str) -> DeployResult<CommandOutput>;

    /// Copy a local file to `remote`, one chunk at a time. Returns the bytes sent.
    async fn upload(&mut self, local: &Path, remote: &str) -> DeployResult<u64>;

    /// Close the session.
    async fn close(&mut self) -> DeployResult<()>;
}
