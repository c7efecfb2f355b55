//! Configuration management for todosync.
//!
//! Configuration lives in `.todosync/config.json` under the project
//! directory and is loaded through serde with per-field defaults, so a
//! missing file or a partially written one degrades to sensible behavior
//! instead of failing the scan.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Directory holding config and persisted state inside a project.
pub const DATA_DIR: &str = ".todosync";

/// Default directories the walker skips during file traversal
pub fn default_ignore_dirs() -> HashSet<&'static str> {
    [
        "node_modules",
        ".next",
        "_next",
        "target",
        ".venv",
        ".env",
        "__pycache__",
        "dist",
        "build",
        "out",
        "vendor",
        ".git",
        ".hg",
        ".svn",
        ".turbo",
        "coverage",
        ".nyc_output",
        ".pytest_cache",
        ".mypy_cache",
        ".ruff_cache",
        ".todosync",
        ".claude",
    ]
    .into_iter()
    .collect()
}

/// Default files the walker skips
pub fn default_ignore_files() -> HashSet<&'static str> {
    [
        "package-lock.json",
        "pnpm-lock.yaml",
        "yarn.lock",
        "Cargo.lock",
        "poetry.lock",
        "Gemfile.lock",
        "composer.lock",
        ".DS_Store",
        "thumbs.db",
    ]
    .into_iter()
    .collect()
}

// ============================================================================
// Provider Settings
// ============================================================================

/// Where created items land in the active tracker, plus backend knobs.
///
/// These values are passed through to the provider at create time and carry
/// no lifecycle of their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Target project/board/list identifier.
    #[serde(default)]
    pub project_id: String,
    /// Target status/column identifier for newly created items.
    #[serde(default)]
    pub status_id: String,
    /// Command invoked by the scripting backend to publish a task.
    #[serde(default)]
    pub script_publish: String,
    /// Command invoked by the scripting backend to archive an item.
    #[serde(default)]
    pub script_archive: String,
    /// Per-call timeout for remote operations, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            status_id: String::new(),
            script_publish: String::new(),
            script_archive: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ============================================================================
// Scan Settings
// ============================================================================

/// Walker include/exclude globs for multi-file scans.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Glob patterns a file must match to be scanned (empty = all files).
    #[serde(default)]
    pub include: Vec<String>,
    /// Glob patterns that exclude a file from scanning.
    #[serde(default)]
    pub exclude: Vec<String>,
}

// ============================================================================
// Config
// ============================================================================

/// The full configuration bundle the host supplies to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Capture code snippets alongside detected tasks.
    #[serde(default = "default_true")]
    pub snippet_extraction_enabled: bool,

    /// Maximum snippet lines captured before truncation.
    #[serde(default = "default_snippet_line_count")]
    pub snippet_line_count: usize,

    /// Whether save-triggered (hook-driven) scans run automatically.
    /// Explicit CLI invocations always run.
    #[serde(default = "default_true")]
    pub auto_scan_on_save: bool,

    /// Active provider name (empty = not configured).
    #[serde(default)]
    pub provider: String,

    /// Backend settings passed through at create time.
    #[serde(default)]
    pub provider_settings: ProviderSettings,

    /// Walker include/exclude globs.
    #[serde(default)]
    pub scan: ScanSettings,

    /// Override for the state directory. When unset, state lives next to
    /// the config under `.todosync/`, or in the platform data directory
    /// for invocations outside any project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_snippet_line_count() -> usize {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snippet_extraction_enabled: true,
            snippet_line_count: default_snippet_line_count(),
            auto_scan_on_save: true,
            provider: String::new(),
            provider_settings: ProviderSettings::default(),
            scan: ScanSettings::default(),
            state_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from a project directory.
    ///
    /// Returns defaults when no config file exists.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = Self::config_path(project_dir);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content).map_err(|e| {
                SyncError::config_with_path(format!("Malformed config: {e}"), config_path)
            })?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Write this configuration to a project directory.
    pub fn save(&self, project_dir: &Path) -> Result<()> {
        let config_path = Self::config_path(project_dir);
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, json)?;
        Ok(())
    }

    /// Get the config.json path for a project
    #[must_use]
    pub fn config_path(project_dir: &Path) -> PathBuf {
        project_dir.join(DATA_DIR).join("config.json")
    }

    /// Resolve the directory holding persisted state.
    #[must_use]
    pub fn state_dir(&self, project_dir: &Path) -> PathBuf {
        if let Some(dir) = &self.state_dir {
            return dir.clone();
        }
        if project_dir.as_os_str().is_empty() {
            return Self::fallback_state_dir();
        }
        project_dir.join(DATA_DIR)
    }

    /// Platform data directory used when no project directory applies.
    #[must_use]
    pub fn fallback_state_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("todosync")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.snippet_line_count == 0 {
            return Err(SyncError::InvalidConfig {
                field: "snippet_line_count".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.provider.is_empty()
            && !crate::provider::KNOWN_PROVIDERS.contains(&self.provider.as_str())
        {
            return Err(SyncError::InvalidConfig {
                field: "provider".to_string(),
                reason: format!(
                    "unknown provider '{}' (known: {})",
                    self.provider,
                    crate::provider::KNOWN_PROVIDERS.join(", ")
                ),
            });
        }
        if self.provider_settings.timeout_secs == 0 {
            return Err(SyncError::InvalidConfig {
                field: "provider_settings.timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_missing() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(temp.path()).unwrap();
        assert!(config.snippet_extraction_enabled);
        assert_eq!(config.snippet_line_count, 5);
        assert!(config.auto_scan_on_save);
        assert!(config.provider.is_empty());
    }

    #[test]
    fn test_round_trip() {
        let temp = TempDir::new().unwrap();
        let config = Config {
            provider: "script".to_string(),
            provider_settings: ProviderSettings {
                script_publish: "publish-task".to_string(),
                ..ProviderSettings::default()
            },
            ..Config::default()
        };
        config.save(temp.path()).unwrap();

        let loaded = Config::load(temp.path()).unwrap();
        assert_eq!(loaded.provider, "script");
        assert_eq!(loaded.provider_settings.script_publish, "publish-task");
    }

    #[test]
    fn test_partial_file_gets_defaults() {
        let temp = TempDir::new().unwrap();
        let path = Config::config_path(temp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"snippet_line_count": 3}"#).unwrap();

        let config = Config::load(temp.path()).unwrap();
        assert_eq!(config.snippet_line_count, 3);
        assert!(config.snippet_extraction_enabled);
    }

    #[test]
    fn test_rejects_zero_snippet_lines() {
        let config = Config {
            snippet_line_count: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SyncError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let config = Config {
            provider: "carrier-pigeon".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SyncError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_state_dir_resolution() {
        let config = Config::default();
        assert_eq!(
            config.state_dir(Path::new("/proj")),
            PathBuf::from("/proj/.todosync")
        );

        let config = Config {
            state_dir: Some(PathBuf::from("/elsewhere")),
            ..Config::default()
        };
        assert_eq!(
            config.state_dir(Path::new("/proj")),
            PathBuf::from("/elsewhere")
        );
    }
}
