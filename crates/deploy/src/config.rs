//! Project configuration and environment resolution.
//!
//! A `dropship.toml` file holds project-level settings plus one table per
//! deployment target:
//!
//! ```toml
//! project_name = "site"
//! ready_timeout = 20000
//!
//! [prod]
//! name = "production"
//! script = "build:prod"
//! host = "203.0.113.10"
//! port = 22
//! username = "deploy"
//! dist_path = "dist"
//! web_dir = "/var/www/site"
//! bak_dir = "/var/www/backup"
//! ```

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{
    credential::Secret,
    error::{DeployError, DeployResult},
};

/// The default name for the configuration file.
pub const CONFIG_FILENAME: &str = "dropship.toml";

/// Prefix for environment variables overriding project-level settings.
pub const ENV_PREFIX: &str = "DROPSHIP_";

/// Default time allowed for the SSH handshake, in milliseconds.
pub const DEFAULT_READY_TIMEOUT_MS: u64 = 20_000;

/// Default tool used to run build scripts.
pub const DEFAULT_BUILD_TOOL: &str = "npm";

fn default_ready_timeout() -> u64 {
    DEFAULT_READY_TIMEOUT_MS
}

/// The configuration file as written by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Name of the project, used in confirmations and reports.
    #[serde(default)]
    pub project_name: String,
    /// SSH handshake timeout in milliseconds, shared by every environment.
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout: u64,
    /// Named deployment targets.
    #[serde(flatten)]
    pub environments: BTreeMap<String, RawEnvironment>,
}

/// One environment table before validation. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawEnvironment {
    pub name: Option<String>,
    pub script: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub dist_path: Option<String>,
    pub web_dir: Option<String>,
    pub bak_dir: Option<String>,
    pub is_remove_remote_file: Option<bool>,
    pub is_remove_local_file: Option<bool>,
    pub verify_address: Option<String>,
    pub build_tool: Option<String>,
}

/// A validated deployment target.
///
/// Built once per run by [`DeployConfig::resolve_environment`]. Only the
/// password is filled in afterwards, by the credential resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentConfig {
    /// The key the environment was selected with (e.g. `prod`).
    pub key: String,
    /// Human-readable name of the target.
    pub name: String,
    /// Build script identifier, if a build should run.
    pub script: Option<String>,
    /// Tool invoked as `<build_tool> run <script>`.
    pub build_tool: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Login secret, set by the credential resolver before connecting.
    pub password: Option<Secret>,
    /// Local artifact directory, relative to the working directory.
    pub dist_path: PathBuf,
    /// Remote directory served as the live deployment.
    pub web_dir: String,
    /// Remote directory receiving backup archives.
    pub bak_dir: Option<String>,
    pub is_remove_remote_file: bool,
    pub is_remove_local_file: bool,
    pub verify_address: Option<String>,
    /// SSH handshake timeout, merged in from the project level.
    pub ready_timeout: Duration,
}

impl EnvironmentConfig {
    /// Address to print once the deployment succeeded.
    pub fn verification_address(&self) -> &str {
        self.verify_address.as_deref().unwrap_or(&self.host)
    }
}

impl DeployConfig {
    /// Resolve a user-supplied path to the configuration file.
    ///
    /// A directory resolves to the [`CONFIG_FILENAME`] inside it.
    pub fn config_path(path: &Path) -> PathBuf {
        if path.is_dir() {
            path.join(CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        }
    }

    /// The figment used to load a configuration file.
    pub fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).only(&["project_name", "ready_timeout"]))
    }

    /// Load the configuration from a TOML file.
    pub fn load(path: &Path) -> DeployResult<Self> {
        let config_path = Self::config_path(path);
        if !config_path.is_file() {
            return Err(DeployError::ConfigNotFound { path: config_path });
        }

        let config = Self::from_figment(Self::figment(&config_path))?;
        tracing::info!(
            path = %config_path.display(),
            environments = config.environments.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Extract the configuration from an already assembled figment.
    pub fn from_figment(figment: Figment) -> DeployResult<Self> {
        figment
            .extract()
            .map_err(|e| DeployError::Config(e.to_string()))
    }

    /// Parse a configuration from a TOML string, without environment overrides.
    pub fn from_toml_str(content: &str) -> DeployResult<Self> {
        Self::from_figment(Figment::from(Toml::string(content)))
    }

    /// Select and validate one environment.
    ///
    /// `name`, `host`, `port`, `username`, `dist_path` and `web_dir` must be
    /// present, non-empty and not `/`. The first violation is reported.
    pub fn resolve_environment(&self, key: &str) -> DeployResult<EnvironmentConfig> {
        let raw = self
            .environments
            .get(key)
            .ok_or_else(|| DeployError::UnknownEnvironment {
                env: key.to_string(),
            })?;

        let name = required(key, "name", raw.name.as_deref())?;
        let host = required(key, "host", raw.host.as_deref())?;
        let port = match raw.port {
            Some(port) if port != 0 => port,
            _ => return Err(missing(key, "port")),
        };
        let username = required(key, "username", raw.username.as_deref())?;
        let dist_path = required(key, "dist_path", raw.dist_path.as_deref())?;
        let web_dir = required(key, "web_dir", raw.web_dir.as_deref())?;

        Ok(EnvironmentConfig {
            key: key.to_string(),
            name,
            script: optional(raw.script.as_deref()),
            build_tool: optional(raw.build_tool.as_deref())
                .unwrap_or_else(|| DEFAULT_BUILD_TOOL.to_string()),
            host,
            port,
            username,
            password: None,
            dist_path: PathBuf::from(dist_path),
            web_dir,
            bak_dir: optional(raw.bak_dir.as_deref()),
            is_remove_remote_file: raw.is_remove_remote_file.unwrap_or(true),
            is_remove_local_file: raw.is_remove_local_file.unwrap_or(true),
            verify_address: optional(raw.verify_address.as_deref()),
            ready_timeout: Duration::from_millis(self.ready_timeout),
        })
    }
}

fn missing(env: &str, field: &'static str) -> DeployError {
    DeployError::MissingField {
        env: env.to_string(),
        field,
    }
}

fn required(env: &str, field: &'static str, value: Option<&str>) -> DeployResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() && v != "/" => Ok(v.to_string()),
        _ => Err(missing(env, field)),
    }
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
