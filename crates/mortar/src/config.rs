//! Project configuration (mortar.toml).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use mortar_server::DevServerConfig;
use mortar_static::{BuildConfig, EnvFiles, Mode};

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub env: EnvConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_pages")]
    pub pages: String,
    #[serde(default = "default_output")]
    pub output: String,
    /// Extension of page files
    #[serde(default = "default_extension")]
    pub extension: String,
}

#[derive(Debug, Deserialize)]
pub struct EnvConfig {
    #[serde(default = "default_env_dev")]
    pub dev: String,
    #[serde(default = "default_env_prod")]
    pub prod: String,
}

#[derive(Debug, Deserialize)]
pub struct WatchConfig {
    /// Directories polled for changes
    #[serde(default = "default_watch_dirs")]
    pub dirs: Vec<String>,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            pages: default_pages(),
            output: default_output(),
            extension: default_extension(),
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            dev: default_env_dev(),
            prod: default_env_prod(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            dirs: default_watch_dirs(),
            interval_ms: default_interval_ms(),
            host: default_host(),
        }
    }
}

fn default_pages() -> String {
    "src/pages".to_string()
}
fn default_output() -> String {
    "public".to_string()
}
fn default_extension() -> String {
    "html".to_string()
}
fn default_env_dev() -> String {
    "env.toml".to_string()
}
fn default_env_prod() -> String {
    "env.prod.toml".to_string()
}
fn default_watch_dirs() -> Vec<String> {
    vec!["src".to_string()]
}
fn default_interval_ms() -> u64 {
    1000
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl ConfigFile {
    /// Settings for a build in the given mode.
    pub fn build_config(&self, mode: Mode, output: Option<PathBuf>) -> BuildConfig {
        BuildConfig {
            pages_dir: PathBuf::from(&self.site.pages),
            output_dir: output.unwrap_or_else(|| PathBuf::from(&self.site.output)),
            extension: self.site.extension.clone(),
            env_files: EnvFiles {
                dev: PathBuf::from(&self.env.dev),
                prod: PathBuf::from(&self.env.prod),
            },
            mode,
        }
    }

    /// Settings for the development server.
    pub fn dev_server_config(&self, port: u16, open: bool) -> DevServerConfig {
        DevServerConfig {
            output_dir: PathBuf::from(&self.site.output),
            watch_dirs: self.watch.dirs.iter().map(PathBuf::from).collect(),
            interval: Duration::from_millis(self.watch.interval_ms),
            port,
            host: self.watch.host.clone(),
            open,
        }
    }
}

/// Load configuration if the file exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}
