//! Layered configuration.
//!
//! Values are resolved in order, later layers winning:
//!
//! 1. built-in defaults
//! 2. a YAML file at `$TW_CONFIG`, else `~/.config/tw/config.yaml` if it exists
//! 3. environment variables
//! 4. command-line flags

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{Error, Result};
use crate::storage::StorageBackend;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "TW_CONFIG";

/// Project used when none is configured.
pub const DEFAULT_PROJECT: &str = "default";

/// Which store to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Embedded SQLite file
    #[default]
    Sqlite,
    /// The `task` CLI
    Taskwarrior,
}

impl std::str::FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "taskwarrior" => Ok(Self::Taskwarrior),
            other => Err(Error::Config(format!(
                "unknown backend '{other}' (expected sqlite or taskwarrior)"
            ))),
        }
    }
}

/// Contents of the YAML file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct FileConfig {
    prefix: Option<String>,
    project: Option<String>,
    backend: Option<BackendKind>,
    db_path: Option<String>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// `--db`
    pub db_path: Option<PathBuf>,
    /// `--prefix`
    pub prefix: Option<String>,
}

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwConfig {
    /// Identifier prefix; required once every layer is applied
    pub prefix: Option<String>,
    /// TaskWarrior project
    pub project: String,
    /// Selected store
    pub backend: BackendKind,
    /// SQLite database file
    pub db_path: PathBuf,
}

impl Default for TwConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            project: DEFAULT_PROJECT.to_string(),
            backend: BackendKind::default(),
            db_path: default_db_path(),
        }
    }
}

impl TwConfig {
    /// Resolve every layer against the process environment.
    ///
    /// # Errors
    ///
    /// `Error::Config` for an unreadable or malformed file, an unknown
    /// backend name, or a missing or malformed prefix.
    pub async fn load(overrides: &Overrides) -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        let file = match env(CONFIG_ENV) {
            Some(path) => Some(expand_home(&path)),
            None => dirs::config_dir()
                .map(|dir| dir.join("tw").join("config.yaml"))
                .filter(|path| path.is_file()),
        };

        let mut config = Self::default();
        if let Some(path) = file {
            config.apply_file(&path).await?;
        }
        config.apply_env(env)?;
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    async fn apply_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let file: FileConfig = serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;

        if let Some(prefix) = file.prefix {
            self.prefix = Some(prefix);
        }
        if let Some(project) = file.project {
            self.project = project;
        }
        if let Some(backend) = file.backend {
            self.backend = backend;
        }
        if let Some(db_path) = file.db_path {
            self.db_path = expand_home(&db_path);
        }
        Ok(())
    }

    /// Apply environment variables, read through `env`.
    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = env("TW_DB_PATH") {
            self.db_path = expand_home(&path);
        }
        if let Some(prefix) = env("TW_PREFIX").or_else(|| env("TW_PROJECT_PREFIX")) {
            self.prefix = Some(prefix);
        }
        if let Some(project) = env("TW_PROJECT_NAME").or_else(|| env("TW_PROJECT")) {
            self.project = project;
        }
        if let Some(backend) = env("TW_BACKEND") {
            self.backend = backend.parse()?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(path) = &overrides.db_path {
            self.db_path.clone_from(path);
        }
        if let Some(prefix) = &overrides.prefix {
            self.prefix = Some(prefix.clone());
        }
    }

    fn validate(&self) -> Result<()> {
        let prefix = self.prefix.as_deref().ok_or_else(|| {
            Error::Config(
                "no issue prefix configured; set TW_PREFIX, `prefix` in the config file, or pass --prefix"
                    .to_string(),
            )
        })?;
        validate_prefix(prefix)
    }

    /// The validated prefix.
    ///
    /// # Errors
    ///
    /// `Error::Config` if no prefix is set.
    pub fn prefix(&self) -> Result<&str> {
        self.prefix
            .as_deref()
            .ok_or_else(|| Error::Config("no issue prefix configured".to_string()))
    }

    /// The storage backend this configuration selects.
    pub fn to_backend(&self) -> StorageBackend {
        match self.backend {
            BackendKind::Sqlite => StorageBackend::Sqlite(self.db_path.clone()),
            BackendKind::Taskwarrior => StorageBackend::TaskWarrior {
                project: self.project.clone(),
            },
        }
    }
}

/// A prefix is one or more ASCII uppercase letters.
///
/// # Errors
///
/// `Error::Config` otherwise.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(Error::Config(format!(
            "invalid prefix '{prefix}': must be one or more uppercase letters"
        )));
    }
    Ok(())
}

fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".local")
        .join("state")
        .join("tw")
        .join("tw.db")
}

/// Expand a leading `~` to the home directory.
pub(crate) fn expand_home(path: &str) -> PathBuf {
    let path = path.trim();
    match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(path),
    }
}
