//! SSH transport backed by `russh`.

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use russh::{
    ChannelMsg, Disconnect,
    client::{self, Handle, Msg},
};
use russh_keys::key::PublicKey;
use tokio::time::timeout;

use super::{CommandOutput, ConnectTarget, RemoteConnector, RemoteSession, shell_quote};
use crate::error::{DeployError, DeployResult};

/// Client handler. Host keys are accepted without a known_hosts check.
struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// [`RemoteConnector`] using password authentication over `russh`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector;

#[async_trait]
impl RemoteConnector for SshConnector {
    async fn connect(&self, target: &ConnectTarget) -> DeployResult<Box<dyn RemoteSession>> {
        let config = Arc::new(client::Config::default());
        let connect_error = |message: String| DeployError::Connect {
            host: format!("{}:{}", target.host, target.port),
            message,
        };

        let handshake = async {
            let mut handle = client::connect(
                config,
                (target.host.as_str(), target.port),
                ClientHandler,
            )
            .await?;
            let authenticated = handle
                .authenticate_password(target.username.clone(), target.password.expose())
                .await?;
            Ok::<_, russh::Error>((handle, authenticated))
        };

        let (handle, authenticated) = timeout(target.ready_timeout, handshake)
            .await
            .map_err(|_| {
                connect_error(format!(
                    "timed out after {}ms",
                    target.ready_timeout.as_millis()
                ))
            })?
            .map_err(|e| connect_error(e.to_string()))?;

        if !authenticated {
            return Err(DeployError::Auth {
                user: target.username.clone(),
                host: target.host.clone(),
            });
        }

        tracing::debug!(host = %target.host, port = target.port, "SSH session authenticated");
        Ok(Box::new(SshSession {
            handle,
            host: target.host.clone(),
        }))
    }
}

/// An authenticated `russh` session.
struct SshSession {
    handle: Handle<ClientHandler>,
    host: String,
}

impl SshSession {
    async fn open_exec(&mut self, command: &str) -> Result<russh::Channel<Msg>, russh::Error> {
        let mut channel = self.handle.channel_open_session().await?;
        channel.exec(true, command).await?;
        Ok(channel)
    }
}

/// Read channel messages until the server closes it.
async fn drain(channel: &mut russh::Channel<Msg>) -> CommandOutput {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut status = None;

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
            ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
            ChannelMsg::ExitStatus { exit_status } => status = Some(exit_status),
            _ => {}
        }
    }

    CommandOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        status,
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn exec(&mut self, command: &str) -> DeployResult<CommandOutput> {
        tracing::debug!(command, "Running remote command");

        let remote_error = |e: russh::Error| DeployError::RemoteCommand {
            command: command.to_string(),
            status: "not started".to_string(),
            output: e.to_string(),
        };

        let mut channel = self.open_exec(command).await.map_err(remote_error)?;
        Ok(drain(&mut channel).await)
    }

    async fn upload(&mut self, local: &Path, remote: &str) -> DeployResult<u64> {
        let transfer_error = |message: String| DeployError::Transfer {
            remote: remote.to_string(),
            message,
        };

        let file = tokio::fs::File::open(local)
            .await
            .map_err(|e| transfer_error(format!("{}: {e}", local.display())))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| transfer_error(e.to_string()))?
            .len();

        let command = format!("cat > {}", shell_quote(remote));
        let mut channel = self
            .open_exec(&command)
            .await
            .map_err(|e| transfer_error(e.to_string()))?;
        channel
            .data(file)
            .await
            .map_err(|e| transfer_error(e.to_string()))?;
        channel
            .eof()
            .await
            .map_err(|e| transfer_error(e.to_string()))?;

        let output = drain(&mut channel).await;
        if !output.success() {
            return Err(transfer_error(if output.stderr.trim().is_empty() {
                format!("remote exit status {:?}", output.status)
            } else {
                output.stderr.trim().to_string()
            }));
        }

        tracing::debug!(bytes = size, remote, "Upload finished");
        Ok(size)
    }

    async fn close(&mut self) -> DeployResult<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
            .map_err(|e| DeployError::Connect {
                host: self.host.clone(),
                message: e.to_string(),
            })
    }
}
