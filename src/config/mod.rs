mod error;
mod ordered_map;
mod proxy_rule;
mod server_config;

use std::path::{Path, PathBuf};
pub use error::ConfigError;
pub use proxy_rule::{find_rule, ProxyRule};
pub use server_config::{DevConfig, ProxyTable};

const DEFAULT_CONFIG: &str = include_str!("./devgate.toml");
pub const DEFAULT_CONFIG_PATH: &str = "devgate.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Format::Toml),
            Some("json") => Ok(Format::Json),
            _ => Err(ConfigError::Format(path.to_path_buf())),
        }
    }
}

/// Parses a document without validating it. `origin` only shows up in errors.
pub fn parse_config(data: &str, format: Format, origin: &str) -> Result<DevConfig, ConfigError> {
    let parsed = match format {
        Format::Toml => toml::from_str(data).map_err(|err| err.to_string()),
        Format::Json => serde_json::from_str(data).map_err(|err| err.to_string()),
    };
    parsed.map_err(|message| ConfigError::Parse {
        origin: origin.to_string(),
        message: message.trim_end().to_string(),
    })
}

/// Reads, parses and validates the document at `path`.
pub fn load_config(path: &Path) -> Result<DevConfig, ConfigError> {
    let format = Format::from_path(path)?;
    let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&data, format, &path.display().to_string())?;
    config.validate()?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Like [`load_config`], but writes the bundled default document first when
/// nothing exists at `path`.
pub fn load_or_create_config(path: &Path) -> Result<DevConfig, ConfigError> {
    if !path.exists() {
        let format = Format::from_path(path)?;
        tracing::warn!("Config file {} not found, writing the default one", path.display());
        std::fs::write(path, default_document(format)?).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    load_config(path)
}

fn default_document(format: Format) -> Result<String, ConfigError> {
    match format {
        Format::Toml => Ok(DEFAULT_CONFIG.to_string()),
        Format::Json => {
            let config = parse_config(DEFAULT_CONFIG, Format::Toml, "bundled default")?;
            serde_json::to_string_pretty(&config).map_err(|err| ConfigError::Parse {
                origin: "bundled default".to_string(),
                message: err.to_string(),
            })
        }
    }
}

/// Creates `outputDir` (and parents) if needed and returns it.
pub fn prepare_output_dir(config: &DevConfig) -> Result<PathBuf, ConfigError> {
    let path = config.output_dir.clone();
    std::fs::create_dir_all(&path).map_err(|source| ConfigError::OutputDir {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
