use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// Timing and retry knobs for the bridge, mirrored into the engine's
/// tuning at startup. Every value has a default so a missing or partial
/// config file still yields a working bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    pub debounce_ms: u64,
    pub transform_timeout_ms: u64,
    pub replay_retry_limit: u32,
    pub restore_retry_limit: u32,
    pub nav_poll_interval_ms: u64,
    pub nav_retry_limit: u32,
    pub motion_settle_frames: u32,
    pub motion_class_pattern: String,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            transform_timeout_ms: 10_000,
            replay_retry_limit: 5,
            restore_retry_limit: 10,
            nav_poll_interval_ms: 250,
            nav_retry_limit: 8,
            motion_settle_frames: 3,
            motion_class_pattern: r"(^|[-_])(transitioning|transition|animate|anim|slide|fade)"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Wildcard patterns for host origins allowed to drive the bridge,
    /// e.g. `https://*.example.com`. Empty means the bridge learns the
    /// first inbound origin (reduced trust).
    pub trusted_origins: Vec<String>,
    pub tuning: TuningConfig,
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/framesync");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// Whether `origin` matches any trusted pattern. An empty pattern list
    /// allows nothing here — learning the first origin is the bridge's
    /// decision, not the config's.
    pub fn origin_allows(&self, origin: &str) -> bool {
        self.trusted_origins
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .any(|p| p.matches(origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        // Should not contain tilde anymore
        assert!(!path_str.starts_with('~'));
        // Should contain the expected config file name
        assert!(path_str.ends_with(".config/framesync/config.toml"));
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let original = Config {
            trusted_origins: vec!["https://*.example.com".to_string()],
            tuning: TuningConfig {
                debounce_ms: 150,
                ..TuningConfig::default()
            },
        };

        let toml_str = toml::to_string(&original).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(deserialized.trusted_origins, original.trusted_origins);
        assert_eq!(deserialized.tuning, original.tuning);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded = Config::load_from_path(dir.path().join("nope.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "trusted_origins = [\"https://cms.test\"]\n\n[tuning]\ndebounce_ms = 120\n",
        )
        .unwrap();
        let config = Config::load_from_path(&path).unwrap().unwrap();
        assert_eq!(config.tuning.debounce_ms, 120);
        assert_eq!(
            config.tuning.transform_timeout_ms,
            TuningConfig::default().transform_timeout_ms
        );
        assert!(config.origin_allows("https://cms.test"));
        assert!(!config.origin_allows("https://other.test"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");
        let config = Config {
            trusted_origins: vec!["https://editor.example.com".to_string()],
            tuning: TuningConfig::default(),
        };
        config.save_to_path(&path).unwrap();
        let reloaded = Config::load_from_path(&path).unwrap().unwrap();
        assert_eq!(reloaded.trusted_origins, config.trusted_origins);
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "trusted_origins = 5").unwrap();
        let err = Config::load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
    }

    #[test]
    fn test_origin_wildcards() {
        let config = Config {
            trusted_origins: vec!["https://*.example.com".to_string()],
            tuning: TuningConfig::default(),
        };
        assert!(config.origin_allows("https://editor.example.com"));
        assert!(!config.origin_allows("https://example.org"));
    }
}
