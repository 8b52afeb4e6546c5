use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{
    constants::{
        DEFAULT_POLL_INTERVAL_MS, DEFAULT_SANDBOX_UID_BASE, DEFAULT_SANDBOX_UID_COUNT,
        DEFAULT_WORKERS,
    },
    core::report::AggregateMode,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JudgeConfig {
    /// Parent of every per-submission working directory.
    pub work_root: PathBuf,
    pub workers: usize,
    pub aggregate: AggregateMode,
    pub poll_interval_ms: u64,
    /// Used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// First uid handed to submissions when the judge runs as root.
    pub sandbox_uid_base: u32,
    /// Size of the uid range; 0 keeps every child on the judge's uid.
    pub sandbox_uid_count: u32,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            work_root: std::env::temp_dir().join("judge-core"),
            workers: DEFAULT_WORKERS,
            aggregate: AggregateMode::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            log_filter: "info".to_string(),
            sandbox_uid_base: DEFAULT_SANDBOX_UID_BASE,
            sandbox_uid_count: DEFAULT_SANDBOX_UID_COUNT,
        }
    }
}

impl JudgeConfig {
    pub fn from_toml(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw, path)
    }

    /// Defaults when no file is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.sandbox_uid_count > 0 {
            if self.sandbox_uid_base == 0 {
                return Err(ConfigError::Invalid(
                    "sandbox_uid_base must not be root".to_string(),
                ));
            }
            if self.sandbox_uid_base.checked_add(self.sandbox_uid_count).is_none() {
                return Err(ConfigError::Invalid(
                    "sandbox uid range overflows".to_string(),
                ));
            }
            if (self.sandbox_uid_count as usize) < self.workers {
                return Err(ConfigError::Invalid(format!(
                    "sandbox_uid_count must cover all {} workers",
                    self.workers
                )));
            }
        }
        Ok(())
    }
}
