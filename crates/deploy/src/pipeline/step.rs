//! The closed set of deployment steps.

use crate::{
    cleanup::remove_local_artifacts,
    config::EnvironmentConfig,
    error::{DeployError, DeployResult},
    package::archive_dir,
    remote::{ConnectTarget, backup_timestamp},
};

use super::RunContext;

/// One unit of work in a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum Step {
    /// Run the build script.
    Build,
    /// Zip the artifact directory.
    Archive,
    /// Open the SSH session.
    Connect,
    /// Send the archive to `<web_dir>.zip`.
    Upload,
    /// Zip the live web directory into the backup directory.
    Backup,
    /// Delete the live web directory.
    RemoveRemote,
    /// Extract the uploaded archive and delete it.
    Unzip,
    /// Delete the local artifact and archive.
    CleanLocal,
    /// Close the SSH session.
    Disconnect,
}

impl Step {
    /// Whether the step needs the SSH session.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Step::Upload | Step::Backup | Step::RemoveRemote | Step::Unzip | Step::Disconnect
        )
    }

    /// Human-readable description for logs and plans.
    pub fn describe(&self, env: &EnvironmentConfig) -> String {
        let web_dir = env.web_dir.trim_end_matches('/');
        match self {
            Step::Build => format!(
                "{} run {}",
                env.build_tool,
                env.script.as_deref().unwrap_or_default()
            ),
            Step::Archive => format!("zip {}", env.dist_path.display()),
            Step::Connect => format!("ssh {}@{}:{}", env.username, env.host, env.port),
            Step::Upload => format!("upload {}.zip to {web_dir}.zip", env.dist_path.display()),
            Step::Backup => format!(
                "back up {web_dir} to {}",
                env.bak_dir.as_deref().unwrap_or_default()
            ),
            Step::RemoveRemote => format!("remove {web_dir}"),
            Step::Unzip => format!("unzip {web_dir}.zip into {web_dir}"),
            Step::CleanLocal => format!("remove local {}", env.dist_path.display()),
            Step::Disconnect => format!("disconnect from {}", env.host),
        }
    }

    /// Perform the step.
    pub async fn run(self, ctx: &mut RunContext<'_>) -> DeployResult<()> {
        match self {
            Step::Build => build(ctx).await,
            Step::Archive => archive(ctx).await,
            Step::Connect => connect(ctx).await,
            Step::Upload => upload(ctx).await,
            Step::Backup => backup(ctx).await,
            Step::RemoveRemote => remove_remote(ctx).await,
            Step::Unzip => unzip(ctx).await,
            Step::CleanLocal => clean_local(ctx).await,
            Step::Disconnect => disconnect(ctx).await,
        }
    }
}

async fn build(ctx: &mut RunContext<'_>) -> DeployResult<()> {
    let Some(script) = ctx.env.script.as_deref() else {
        tracing::debug!("No build script configured");
        return Ok(());
    };

    ctx.capabilities
        .builder
        .run(&ctx.env.build_tool, script, ctx.workdir)
        .await?;
    tracing::info!(script, "Build succeeded");
    Ok(())
}

async fn archive(ctx: &mut RunContext<'_>) -> DeployResult<()> {
    let source = ctx.artifact_path();
    let dest = ctx.archive_path();

    let summary = tokio::task::spawn_blocking({
        let source = source.clone();
        move || archive_dir(&source, &dest)
    })
    .await
    .map_err(|e| DeployError::Archive {
        path: source,
        message: e.to_string(),
    })??;

    tracing::info!(
        path = %summary.path.display(),
        files = summary.files,
        bytes = summary.bytes,
        "Archive created"
    );
    Ok(())
}

async fn connect(ctx: &mut RunContext<'_>) -> DeployResult<()> {
    let target = ConnectTarget::from_env(ctx.env)?;
    let session = ctx.capabilities.connector.connect(&target).await?;
    ctx.attach_session(session);
    tracing::info!(host = %target.host, port = target.port, "SSH connected");
    Ok(())
}

async fn upload(ctx: &mut RunContext<'_>) -> DeployResult<()> {
    let local = ctx.archive_path();
    let remote = ctx.layout.archive_path();
    let bytes = ctx.session()?.upload(&local, &remote).await?;
    tracing::info!(remote = %remote, bytes, "Upload succeeded");
    Ok(())
}

async fn backup(ctx: &mut RunContext<'_>) -> DeployResult<()> {
    let timestamp = backup_timestamp(ctx.started_at);
    let (Some(mkdir), Some(zip), Some(target)) = (
        ctx.layout.ensure_backup_dir_cmd(),
        ctx.layout.backup_cmd(&timestamp),
        ctx.layout.backup_path(&timestamp),
    ) else {
        tracing::debug!("No backup directory configured");
        return Ok(());
    };

    let session = ctx.session()?;
    session.exec(&mkdir).await?.check(&mkdir)?;
    session.exec(&zip).await?.check(&zip)?;
    tracing::info!(backup = %target, "Backup succeeded");
    Ok(())
}

async fn remove_remote(ctx: &mut RunContext<'_>) -> DeployResult<()> {
    let command = ctx.layout.remove_cmd();
    ctx.session()?.exec(&command).await?.check(&command)?;
    tracing::info!(web_dir = %ctx.layout.web_dir(), "Remote directory removed");
    Ok(())
}

async fn unzip(ctx: &mut RunContext<'_>) -> DeployResult<()> {
    let command = ctx.layout.unzip_cmd();
    ctx.session()?.exec(&command).await?.check(&command)?;
    tracing::info!(web_dir = %ctx.layout.web_dir(), "Archive extracted");
    Ok(())
}

async fn clean_local(ctx: &mut RunContext<'_>) -> DeployResult<()> {
    let artifact = ctx.artifact_path();
    remove_local_artifacts(&artifact).await?;
    tracing::info!(path = %artifact.display(), "Local build output removed");
    Ok(())
}

async fn disconnect(ctx: &mut RunContext<'_>) -> DeployResult<()> {
    match ctx.take_session() {
        Some(mut session) => {
            session.close().await?;
            tracing::info!(host = %ctx.env.host, "SSH disconnected");
        }
        None => tracing::debug!("No SSH session to close"),
    }
    Ok(())
}
