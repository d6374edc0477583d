//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use std::path::PathBuf;

use caseassist_config::AppConfig;
use tempfile::TempDir;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .engine_id("flow-engine")
///     .guest(true)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn engine_id(mut self, id: &str) -> Self {
        self.config.interface.engine_id = id.to_string();
        self
    }

    pub fn search_hub(mut self, hub: &str) -> Self {
        self.config.interface.search_hub = hub.to_string();
        self
    }

    pub fn pipeline(mut self, pipeline: &str) -> Self {
        self.config.interface.pipeline = Some(pipeline.to_string());
        self
    }

    pub fn default_query(mut self, q: &str) -> Self {
        self.config.interface.default_query = q.to_string();
        self
    }

    pub fn disable_state_in_url(mut self, disabled: bool) -> Self {
        self.config.interface.disable_state_in_url = disabled;
        self
    }

    pub fn skip_first_search(mut self, skip: bool) -> Self {
        self.config.interface.skip_first_search = skip;
        self
    }

    pub fn website(mut self, website: &str) -> Self {
        self.config.context.website = website.to_string();
        self
    }

    pub fn guest(mut self, guest: bool) -> Self {
        self.config.context.guest = guest;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A config file in a temp directory, deleted on drop.
pub struct TestConfigFile {
    pub config: AppConfig,
    pub path: PathBuf,
    _temp_dir: TempDir,
}

impl TestConfigFile {
    /// Write `toml_content` to a temp file and load it.
    pub async fn with_toml(toml_content: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("caseassist.toml");
        tokio::fs::write(&path, toml_content)
            .await
            .expect("failed to write test config");

        let config = AppConfig::load(&path)
            .await
            .expect("failed to parse test config");

        Self {
            config,
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Write an extra file next to the config, returning its path.
    pub async fn write_sibling(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path.with_file_name(name);
        tokio::fs::write(&path, content)
            .await
            .expect("failed to write sibling file");
        path
    }
}
