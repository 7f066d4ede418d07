//! Application context for CLI command execution.
//!
//! # Example
//!
//! ```no_run
//! use tw::app::App;
//! use tw::config::Overrides;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::load(&Overrides::default()).await?;
//!     let tree = app.service().get_issue_tree(None).await?;
//!     println!("{} open items", tree.len());
//!     Ok(())
//! }
//! ```

use crate::config::{Overrides, TwConfig};
use crate::error::Result;
use crate::service::IssueService;
use crate::storage::{create_storage, IssueStorage};

/// Resolved configuration plus the service over the selected store.
pub struct App {
    config: TwConfig,
    service: IssueService,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("service", &self.service)
            .finish()
    }
}

impl App {
    /// Resolve configuration and open the configured store.
    ///
    /// # Errors
    ///
    /// - `Error::Config` if configuration is missing or invalid
    /// - any error from opening the store
    pub async fn load(overrides: &Overrides) -> Result<Self> {
        let config = TwConfig::load(overrides).await?;
        Self::from_config(config).await
    }

    /// Open the store a resolved configuration selects.
    ///
    /// # Errors
    ///
    /// `Error::Config` without a prefix; any error from opening the store.
    pub async fn from_config(config: TwConfig) -> Result<Self> {
        let prefix = config.prefix()?.to_string();
        let storage = create_storage(config.to_backend()).await?;
        Ok(Self::with_storage(config, storage, prefix))
    }

    /// Wrap an already-open store.
    pub fn with_storage(config: TwConfig, storage: Box<dyn IssueStorage>, prefix: String) -> Self {
        Self {
            config,
            service: IssueService::new(storage, prefix),
        }
    }

    /// The resolved configuration.
    pub fn config(&self) -> &TwConfig {
        &self.config
    }

    /// The issue service.
    pub fn service(&self) -> &IssueService {
        &self.service
    }

    /// The issue service, for mutations.
    pub fn service_mut(&mut self) -> &mut IssueService {
        &mut self.service
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IssueType;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_app_opens_configured_sqlite_file() {
        let temp = TempDir::new().unwrap();
        let config = TwConfig {
            prefix: Some("TW".into()),
            db_path: temp.path().join("state").join("tw.db"),
            ..TwConfig::default()
        };

        let mut app = App::from_config(config).await.unwrap();
        let id = app
            .service_mut()
            .create_issue(IssueType::Epic, "First", None, None)
            .await
            .unwrap();

        assert_eq!(id.to_string(), "TW-1");
        assert_eq!(app.service().prefix(), "TW");
        assert!(temp.path().join("state").join("tw.db").exists());
    }

    #[tokio::test]
    async fn test_app_requires_prefix() {
        let err = App::from_config(TwConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("prefix"));
    }
}
