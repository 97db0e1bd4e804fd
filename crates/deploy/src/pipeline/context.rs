//! State shared by the steps of one run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::{
    config::EnvironmentConfig,
    error::{DeployError, DeployResult},
    package::{BuildRunner, ProcessBuildRunner, archive_path},
    remote::{RemoteConnector, RemoteLayout, RemoteSession, SshConnector},
};

/// External tools a run depends on.
pub struct Capabilities {
    pub connector: Box<dyn RemoteConnector>,
    pub builder: Box<dyn BuildRunner>,
}

impl Capabilities {
    pub fn new(connector: Box<dyn RemoteConnector>, builder: Box<dyn BuildRunner>) -> Self {
        Self { connector, builder }
    }

    /// SSH through `russh` and builds as child processes.
    pub fn production() -> Self {
        Self::new(Box::new(SshConnector), Box::new(ProcessBuildRunner))
    }
}

/// Context passed to every step of a run.
///
/// Holds the single SSH session of the run between the connect and
/// disconnect steps.
pub struct RunContext<'a> {
    pub env: &'a EnvironmentConfig,
    pub workdir: &'a Path,
    pub layout: RemoteLayout,
    /// When the run started; used to name backups.
    pub started_at: DateTime<Local>,
    pub(crate) capabilities: &'a Capabilities,
    session: Option<Box<dyn RemoteSession>>,
}

impl<'a> RunContext<'a> {
    pub fn new(
        env: &'a EnvironmentConfig,
        workdir: &'a Path,
        started_at: DateTime<Local>,
        capabilities: &'a Capabilities,
    ) -> Self {
        Self {
            env,
            workdir,
            layout: RemoteLayout::for_env(env),
            started_at,
            capabilities,
            session: None,
        }
    }

    /// The local artifact directory.
    pub fn artifact_path(&self) -> PathBuf {
        self.workdir.join(&self.env.dist_path)
    }

    /// The local archive, next to the artifact directory.
    pub fn archive_path(&self) -> PathBuf {
        archive_path(&self.artifact_path())
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub(crate) fn attach_session(&mut self, session: Box<dyn RemoteSession>) {
        self.session = Some(session);
    }

    pub(crate) fn session(&mut self) -> DeployResult<&mut (dyn RemoteSession + 'static)> {
        self.session.as_deref_mut().ok_or(DeployError::NotConnected)
    }

    pub(crate) fn take_session(&mut self) -> Option<Box<dyn RemoteSession>> {
        self.session.take()
    }
}
