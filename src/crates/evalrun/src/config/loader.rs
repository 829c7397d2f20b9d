//! Configuration loader with dual-location support
//!
//! Loads configuration from:
//! 1. Default values
//! 2. User-level config: ~/.evalrun/evalrun.toml
//! 3. Project-level config: ./.evalrun/evalrun.toml
//! 4. An explicit file given on the command line
//!
//! Later files override earlier ones key by key; a file only has to name
//! the settings it changes.

use crate::config::schema::EvalConfig;
use crate::error::{EvalError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

const CONFIG_DIR: &str = ".evalrun";
const CONFIG_FILE: &str = "evalrun.toml";

/// Configuration loader that handles both user and project configs
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    project_config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            user_config_path: dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE)),
            project_config_path: std::env::current_dir()
                .ok()
                .map(|cwd| cwd.join(CONFIG_DIR).join(CONFIG_FILE)),
        }
    }

    /// Loader reading from the given locations instead of the standard ones
    pub fn with_paths(user: Option<PathBuf>, project: Option<PathBuf>) -> Self {
        Self {
            user_config_path: user,
            project_config_path: project,
        }
    }

    pub fn user_config_path(&self) -> Option<&Path> {
        self.user_config_path.as_deref()
    }

    pub fn project_config_path(&self) -> Option<&Path> {
        self.project_config_path.as_deref()
    }

    /// Load user and project configuration over the defaults
    pub async fn load(&self) -> Result<EvalConfig> {
        self.load_from(None).await
    }

    /// Like [`load`](Self::load), with `explicit` applied last.
    ///
    /// Missing user or project files are skipped; a missing explicit file is
    /// an error. A file that exists but does not parse is always an error.
    pub async fn load_from(&self, explicit: Option<&Path>) -> Result<EvalConfig> {
        let mut merged = toml::Table::new();

        for path in [&self.user_config_path, &self.project_config_path]
            .into_iter()
            .flatten()
        {
            match Self::read_table(path).await? {
                Some(table) => {
                    debug!(path = %path.display(), "Loaded config file");
                    merge_tables(&mut merged, table);
                }
                None => debug!(path = %path.display(), "Config file not found, skipping"),
            }
        }

        if let Some(path) = explicit {
            let table = Self::read_table(path).await?.ok_or_else(|| {
                EvalError::Config(format!("Config file not found: {}", path.display()))
            })?;
            debug!(path = %path.display(), "Loaded explicit config file");
            merge_tables(&mut merged, table);
        }

        let mut config = toml::Value::Table(merged)
            .try_into::<EvalConfig>()
            .map_err(|e| EvalError::Config(format!("Invalid configuration: {}", e)))?;
        config.resolve_env_vars();

        info!(
            model = %config.llm.model,
            strategy = %config.execution.strategy,
            max_concurrent = config.execution.max_concurrent,
            "Configuration loaded"
        );
        Ok(config)
    }

    async fn read_table(path: &Path) -> Result<Option<toml::Table>> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(EvalError::Config(format!(
                    "Failed to read config {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        content.parse::<toml::Table>().map(Some).map_err(|e| {
            EvalError::Config(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursively overlay `overlay` onto `base`; tables merge, other values replace.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, incoming);
                    continue;
                }
                base.insert(key, toml::Value::Table(incoming));
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ProcessingOrder;
    use tempfile::TempDir;

    fn loader(dir: &TempDir) -> ConfigLoader {
        ConfigLoader::with_paths(
            Some(dir.path().join("user.toml")),
            Some(dir.path().join("project.toml")),
        )
    }

    #[test]
    fn test_default_paths() {
        let loader = ConfigLoader::new();
        if let Some(path) = loader.project_config_path() {
            assert!(path.ends_with(".evalrun/evalrun.toml"));
        }
        if let Some(path) = loader.user_config_path() {
            assert!(path.ends_with(".evalrun/evalrun.toml"));
        }
    }

    #[tokio::test]
    async fn test_load_returns_defaults_when_no_files() {
        let dir = TempDir::new().unwrap();
        let config = loader(&dir).load().await.unwrap();

        let mut expected = EvalConfig::default();
        expected.resolve_env_vars();
        assert_eq!(config, expected);
    }

    #[tokio::test]
    async fn test_project_overrides_user_key_by_key() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("user.toml"),
            r#"
[llm]
model = "gpt-4o"
timeout_secs = 30

[execution]
max_concurrent = 8
"#,
        )
        .await
        .unwrap();
        fs::write(
            dir.path().join("project.toml"),
            r#"
[execution]
strategy = "cot"
processing_order = "file"
"#,
        )
        .await
        .unwrap();

        let config = loader(&dir).load().await.unwrap();

        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.timeout_secs, 30);
        // user value survives a project file touching the same section
        assert_eq!(config.execution.max_concurrent, 8);
        assert_eq!(config.execution.strategy, "cot");
        assert_eq!(config.execution.processing_order, ProcessingOrder::File);
    }

    #[tokio::test]
    async fn test_explicit_file_wins_and_must_exist() {
        let dir = TempDir::new().unwrap();
        let explicit = dir.path().join("run.toml");
        fs::write(dir.path().join("project.toml"), "[output]\nsave_dir = \"a\"\n")
            .await
            .unwrap();
        fs::write(&explicit, "[output]\nsave_dir = \"b\"\naudit_logging = true\n")
            .await
            .unwrap();

        let config = loader(&dir).load_from(Some(&explicit)).await.unwrap();
        assert_eq!(config.output.save_dir, PathBuf::from("b"));
        assert!(config.output.audit_logging);

        let missing = dir.path().join("missing.toml");
        let err = loader(&dir).load_from(Some(&missing)).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_invalid_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("user.toml"), "[llm\nmodel = \"x\"\n")
            .await
            .unwrap();

        let err = loader(&dir).load().await.unwrap_err();
        assert!(matches!(err, EvalError::Config(ref m) if m.contains("Failed to parse")));
    }

    #[tokio::test]
    async fn test_wrong_types_are_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("project.toml"),
            "[execution]\nmax_concurrent = \"many\"\n",
        )
        .await
        .unwrap();

        let err = loader(&dir).load().await.unwrap_err();
        assert!(matches!(err, EvalError::Config(ref m) if m.contains("Invalid configuration")));
    }

    #[tokio::test]
    async fn test_env_vars_are_resolved_after_merge() {
        let dir = TempDir::new().unwrap();
        std::env::set_var("EVALRUN_LOADER_TEST_KEY", "sk-loader");
        fs::write(
            dir.path().join("user.toml"),
            "[llm]\napi_key = \"${EVALRUN_LOADER_TEST_KEY}\"\n",
        )
        .await
        .unwrap();

        let config = loader(&dir).load().await.unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-loader"));
        std::env::remove_var("EVALRUN_LOADER_TEST_KEY");
    }

    #[test]
    fn test_merge_tables() {
        let mut base: toml::Table = "a = 1\n[t]\nx = 1\ny = 2\n".parse().unwrap();
        let overlay: toml::Table = "b = 2\n[t]\ny = 3\n".parse().unwrap();
        merge_tables(&mut base, overlay);

        assert_eq!(base["a"].as_integer(), Some(1));
        assert_eq!(base["b"].as_integer(), Some(2));
        assert_eq!(base["t"]["x"].as_integer(), Some(1));
        assert_eq!(base["t"]["y"].as_integer(), Some(3));
    }
}
