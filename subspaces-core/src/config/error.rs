//! Errors raised while loading or checking a [`Config`](super::Config)

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {} is not valid TOML: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot encode config as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("environment variable {var}={value:?} is invalid: {reason}")]
    InvalidEnv { var: &'static str, value: String, reason: String },

    #[error("invalid {section} config: {reason}")]
    Invalid { section: &'static str, reason: String },
}

impl ConfigError {
    pub(super) fn env(var: &'static str, value: &str, reason: impl ToString) -> Self {
        ConfigError::InvalidEnv { var, value: value.to_string(), reason: reason.to_string() }
    }

    pub(super) fn invalid(section: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid { section, reason: reason.into() }
    }
}
