//! Removal of local build output once it has been deployed.

use std::{io, path::Path};

use crate::{
    error::{DeployError, DeployResult},
    package::archive_path,
};

/// Delete the artifact directory and its archive.
///
/// Paths that are already gone are skipped.
pub async fn remove_local_artifacts(artifact: &Path) -> DeployResult<()> {
    match tokio::fs::remove_dir_all(artifact).await {
        Ok(()) => tracing::debug!(path = %artifact.display(), "Removed artifact directory"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(DeployError::Cleanup {
                path: artifact.to_path_buf(),
                source,
            });
        }
    }

    let archive = archive_path(artifact);
    match tokio::fs::remove_file(&archive).await {
        Ok(()) => tracing::debug!(path = %archive.display(), "Removed archive"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(DeployError::Cleanup { path: archive, source }),
    }

    Ok(())
}
