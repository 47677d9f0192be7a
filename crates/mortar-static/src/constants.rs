//! Environment constants.
//!
//! Constants come from a flat TOML table (`env.toml` in development,
//! `env.prod.toml` in production). They are compiled into the rendered HTML,
//! so nothing secret belongs in them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use mortar_template::Value;

/// Which constants file a build uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Development => f.write_str("development"),
            Mode::Production => f.write_str("production"),
        }
    }
}

/// Locations of the constants files for each mode.
#[derive(Debug, Clone)]
pub struct EnvFiles {
    /// Development constants
    pub dev: PathBuf,

    /// Production constants
    pub prod: PathBuf,
}

impl Default for EnvFiles {
    fn default() -> Self {
        Self {
            dev: PathBuf::from("env.toml"),
            prod: PathBuf::from("env.prod.toml"),
        }
    }
}

impl EnvFiles {
    /// Constants file for the given mode.
    pub fn for_mode(&self, mode: Mode) -> &Path {
        match mode {
            Mode::Development => &self.dev,
            Mode::Production => &self.prod,
        }
    }
}

/// Errors that can occur when loading constants.
#[derive(Debug, thiserror::Error)]
pub enum ConstantsError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Load constants from a TOML file.
///
/// A missing file is not an error: it yields no constants and a warning.
pub fn load_constants(path: &Path) -> Result<BTreeMap<String, Value>, ConstantsError> {
    if !path.exists() {
        tracing::warn!("Constants file {} not found, continuing without it", path.display());
        return Ok(BTreeMap::new());
    }

    let content = fs::read_to_string(path).map_err(|source| ConstantsError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let table: toml::Table = toml::from_str(&content).map_err(|source| ConstantsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!("Loaded {} constants from {}", table.len(), path.display());

    Ok(table
        .into_iter()
        .map(|(name, value)| (name, Value::from_serialize(&value)))
        .collect())
}
