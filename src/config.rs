use crate::audio::segmenter::SegmenterConfig;
use crate::defaults;
use crate::error::{Result, ScrivError};
use crate::store::default_store_root;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub stt: SttConfig,
    pub segmenter: SegmenterConfig,
}

/// Storage location configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory for records and blobs; platform data dir when unset.
    pub root: Option<PathBuf>,
}

impl StoreConfig {
    /// Effective store root.
    pub fn root_dir(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(default_store_root)
    }
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    pub model: String,
    pub language: String,
    /// Inference threads; machine parallelism when unset.
    pub threads: Option<usize>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_MODEL.to_string(),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
        }
    }
}

impl SttConfig {
    /// Effective thread budget for a single-chunk record.
    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(defaults::default_threads)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, or defaults if the file doesn't exist
    ///
    /// Only falls back to defaults when the file is missing.
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - SCRIV_MODEL → stt.model
    /// - SCRIV_LANGUAGE → stt.language
    /// - SCRIV_STORE_ROOT → store.root
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("SCRIV_MODEL")
            && !model.is_empty()
        {
            self.stt.model = model;
        }

        if let Ok(language) = std::env::var("SCRIV_LANGUAGE")
            && !language.is_empty()
        {
            self.stt.language = language;
        }

        if let Ok(root) = std::env::var("SCRIV_STORE_ROOT")
            && !root.is_empty()
        {
            self.store.root = Some(PathBuf::from(root));
        }

        self
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.stt.threads == Some(0) {
            return Err(ScrivError::ConfigInvalidValue {
                key: "stt.threads".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        let seg = &self.segmenter;
        if seg.min_duration_ms >= seg.max_duration_ms {
            return Err(ScrivError::ConfigInvalidValue {
                key: "segmenter.min_duration_ms".to_string(),
                message: "must be below max_duration_ms".to_string(),
            });
        }
        if seg.target_duration_ms < seg.min_duration_ms
            || seg.target_duration_ms > seg.max_duration_ms
        {
            return Err(ScrivError::ConfigInvalidValue {
                key: "segmenter.target_duration_ms".to_string(),
                message: "must lie between min_duration_ms and max_duration_ms".to_string(),
            });
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/scriv/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("scriv")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.stt.model, "base");
        assert_eq!(config.stt.language, "auto");
        assert_eq!(config.stt.threads, None);
        assert!(config.store.root.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[stt]\nmodel = \"small\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.stt.model, "small");
        assert_eq!(config.stt.language, "auto");
        assert_eq!(config.segmenter.target_duration_ms, 60_000);
    }

    #[test]
    fn test_load_invalid_toml_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not valid toml [[[").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default(Path::new("/no/such/config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_propagates_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "garbage = [[[").unwrap();
        assert!(Config::load_or_default(file.path()).is_err());
    }

    #[test]
    fn test_segmenter_section_parses() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[segmenter]\ntarget_duration_ms = 30000\nmin_duration_ms = 20000\nmax_duration_ms = 40000"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.segmenter.target_duration_ms, 30_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_threads() {
        let config = Config {
            stt: SttConfig {
                threads: Some(0),
                ..SttConfig::default()
            },
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ScrivError::ConfigInvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_envelope() {
        let mut config = Config::default();
        config.segmenter.min_duration_ms = 80_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_target_outside_envelope() {
        let mut config = Config::default();
        config.segmenter.target_duration_ms = 80_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_root_dir_defaults() {
        let config = StoreConfig::default();
        assert!(config.root_dir().to_string_lossy().contains("scriv"));

        let pinned = StoreConfig {
            root: Some(PathBuf::from("/tmp/elsewhere")),
        };
        assert_eq!(pinned.root_dir(), PathBuf::from("/tmp/elsewhere"));
    }

    #[test]
    fn test_thread_count_fallback() {
        let config = SttConfig::default();
        assert!(config.thread_count() >= 1);

        let pinned = SttConfig {
            threads: Some(3),
            ..SttConfig::default()
        };
        assert_eq!(pinned.thread_count(), 3);
    }

    #[test]
    fn test_default_path_mentions_scriv() {
        let path = Config::default_path();
        assert!(path.to_string_lossy().contains("scriv"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }
}
