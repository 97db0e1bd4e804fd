//! Build and archive the local artifact.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Component, Path, PathBuf},
    time::SystemTime,
};

use async_trait::async_trait;
use chrono::{Datelike, Local, Timelike};
use walkdir::WalkDir;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::error::{DeployError, DeployResult};

/// Runs the project's build script.
#[async_trait]
pub trait BuildRunner: Send + Sync {
    /// Run `<tool> run <script>` in `workdir`.
    async fn run(&self, tool: &str, script: &str, workdir: &Path) -> DeployResult<()>;
}

/// [`BuildRunner`] spawning the build tool as a child process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessBuildRunner;

#[async_trait]
impl BuildRunner for ProcessBuildRunner {
    async fn run(&self, tool: &str, script: &str, workdir: &Path) -> DeployResult<()> {
        let output = tokio::process::Command::new(tool)
            .arg("run")
            .arg(script)
            .current_dir(workdir)
            .output()
            .await
            .map_err(|e| DeployError::Build {
                script: script.to_string(),
                status: format!("could not start {tool}"),
                output: e.to_string(),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let text = if stderr.trim().is_empty() {
            String::from_utf8_lossy(&output.stdout).into_owned()
        } else {
            stderr.into_owned()
        };

        Err(DeployError::Build {
            script: script.to_string(),
            status: output.status.to_string(),
            output: text.trim().to_string(),
        })
    }
}

/// Path of the archive built for an artifact directory: `<artifact>.zip`.
pub fn archive_path(artifact: &Path) -> PathBuf {
    let mut path = artifact.as_os_str().to_owned();
    path.push(".zip");
    PathBuf::from(path)
}

/// What ended up in an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub files: usize,
    pub bytes: u64,
}

/// Compress the contents of `source` into a ZIP file at `dest`.
///
/// Entries are stored relative to `source`, deflated at level 9, and stamped
/// with their modification time in local time. Entries are added in file
/// name order so the same tree always yields the same entry list.
pub fn archive_dir(source: &Path, dest: &Path) -> DeployResult<ArchiveSummary> {
    if !source.is_dir() {
        return Err(DeployError::Archive {
            path: source.to_path_buf(),
            message: "artifact directory not found".to_string(),
        });
    }

    let file = File::create(dest).map_err(|e| archive_error(dest, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let mut files = 0;
    let mut bytes = 0;

    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| archive_error(source, e))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| archive_error(entry.path(), e))?;
        let name = entry_name(relative);
        let modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .unwrap_or_else(SystemTime::now);
        let options = entry_options(modified);

        if entry.file_type().is_dir() {
            zip.add_directory(name, options)
                .map_err(|e| archive_error(entry.path(), e))?;
        } else if entry.file_type().is_file() {
            zip.start_file(name, options)
                .map_err(|e| archive_error(entry.path(), e))?;
            let mut input = File::open(entry.path()).map_err(|e| archive_error(entry.path(), e))?;
            bytes += io::copy(&mut input, &mut zip).map_err(|e| archive_error(entry.path(), e))?;
            files += 1;
        } else {
            tracing::debug!(path = %entry.path().display(), "Skipping non-regular file");
        }
    }

    zip.finish()
        .map_err(|e| archive_error(dest, e))?
        .flush()
        .map_err(|e| archive_error(dest, e))?;

    Ok(ArchiveSummary {
        path: dest.to_path_buf(),
        files,
        bytes,
    })
}

fn archive_error(path: &Path, err: impl std::fmt::Display) -> DeployError {
    DeployError::Archive {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

// ZIP entry names always use `/`.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn entry_options(modified: SystemTime) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
        .last_modified_time(local_timestamp(modified))
}

fn local_timestamp(time: SystemTime) -> zip::DateTime {
    let local: chrono::DateTime<Local> = time.into();
    zip::DateTime::from_date_and_time(
        local.year().clamp(1980, 2107) as u16,
        local.month() as u8,
        local.day() as u8,
        local.hour() as u8,
        local.minute() as u8,
        local.second() as u8,
    )
    .unwrap_or_default()
}
