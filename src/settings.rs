//! Ledger policy loaded from an optional TOML file.

use std::{fs, path::Path};

use loyalty_core::LedgerConfig;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("parse config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Defaults apply when no file is given; a given file must exist.
pub fn load(path: Option<&Path>) -> Result<LedgerConfig, SettingsError> {
    let Some(path) = path else {
        return Ok(LedgerConfig::default());
    };
    let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let config = parse(&content).map_err(|source| SettingsError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    info!(config = %path.display(), ?config, "ledger config loaded");
    Ok(config)
}

fn parse(content: &str) -> Result<LedgerConfig, toml::de::Error> {
    toml::from_str(content)
}
