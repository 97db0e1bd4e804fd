//! Shell commands run on the deployment server.

use chrono::{DateTime, Local};

use crate::config::EnvironmentConfig;

/// Timestamp format for backup archives. No colons.
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Format a backup timestamp.
pub fn backup_timestamp(at: DateTime<Local>) -> String {
    at.format(BACKUP_TIMESTAMP_FORMAT).to_string()
}

/// Quote a value for a POSIX shell.
///
/// Plain paths are left as they are; anything else is wrapped in single quotes.
/// A leading `~` or `~/` stays outside the quotes so the shell still expands it.
pub fn shell_quote(value: &str) -> String {
    if value == "~" {
        return value.to_string();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return format!("~/{}", shell_quote(rest));
    }

    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:@%,=".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Remote paths of one environment and the commands that act on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLayout {
    web_dir: String,
    bak_dir: Option<String>,
}

impl RemoteLayout {
    pub fn new(web_dir: impl Into<String>, bak_dir: Option<String>) -> Self {
        Self {
            web_dir: web_dir.into(),
            bak_dir,
        }
    }

    pub fn for_env(env: &EnvironmentConfig) -> Self {
        Self::new(env.web_dir.clone(), env.bak_dir.clone())
    }

    pub fn web_dir(&self) -> &str {
        &self.web_dir
    }

    /// Where the uploaded archive lands: `<web_dir>.zip`.
    pub fn archive_path(&self) -> String {
        format!("{}.zip", self.web_dir.trim_end_matches('/'))
    }

    /// Last path segment of the web directory.
    pub fn dir_name(&self) -> &str {
        self.web_dir
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    /// Full path of the backup archive for a timestamp, if backups are enabled.
    pub fn backup_path(&self, timestamp: &str) -> Option<String> {
        self.bak_dir.as_deref().map(|bak| {
            format!(
                "{}/{}_{}.zip",
                bak.trim_end_matches('/'),
                self.dir_name(),
                timestamp
            )
        })
    }

    /// Create the backup directory if it is absent.
    pub fn ensure_backup_dir_cmd(&self) -> Option<String> {
        self.bak_dir
            .as_deref()
            .map(|bak| format!("mkdir -p {}", shell_quote(bak)))
    }

    /// Zip the current web directory into the backup directory.
    ///
    /// Succeeds without writing anything when the web directory does not
    /// exist yet, as on the first deployment to a server.
    pub fn backup_cmd(&self, timestamp: &str) -> Option<String> {
        self.backup_path(timestamp).map(|target| {
            let web_dir = shell_quote(&self.web_dir);
            format!(
                "test ! -e {web_dir} || zip -q -r {} {web_dir}",
                shell_quote(&target)
            )
        })
    }

    /// Delete the live web directory.
    pub fn remove_cmd(&self) -> String {
        format!("rm -rf {}", shell_quote(&self.web_dir))
    }

    /// Extract the uploaded archive into the web directory, then delete it.
    pub fn unzip_cmd(&self) -> String {
        let archive = shell_quote(&self.archive_path());
        format!(
            "unzip -o {archive} -d {} && rm -f {archive}",
            shell_quote(&self.web_dir)
        )
    }
}
