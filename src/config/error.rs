use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong between reading the config file and having a
/// set of compiled proxy rules. Startup aborts on any of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not write default config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported config format for {0}, expected a .toml or .json file")]
    Format(PathBuf),

    #[error("malformed config {origin}: {message}")]
    Parse {
        origin: String,
        message: String,
    },

    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        field: String,
        reason: String,
    },

    #[error("could not create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Dotted path of the offending field, when the error is about a single field.
    #[cfg(test)]
    pub fn field(&self) -> Option<&str> {
        match self {
            ConfigError::Invalid { field, .. } => Some(field.as_str()),
            _ => None,
        }
    }
}
