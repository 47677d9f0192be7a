//! Static site builder.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use walkdir::WalkDir;

use mortar_template::{Expander, RenderError};

use crate::constants::{load_constants, ConstantsError, EnvFiles, Mode};

/// Configuration for building a site.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory holding the page sources
    pub pages_dir: PathBuf,

    /// Output directory
    pub output_dir: PathBuf,

    /// Extension of page files (and of the rendered files that get cleaned)
    pub extension: String,

    /// Constants files for development and production
    pub env_files: EnvFiles,

    /// Which constants to load
    pub mode: Mode,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            pages_dir: PathBuf::from("src/pages"),
            output_dir: PathBuf::from("public"),
            extension: "html".to_string(),
            env_files: EnvFiles::default(),
            mode: Mode::Development,
        }
    }
}

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildReport {
    /// Number of pages generated
    pub pages: usize,

    /// Number of stale rendered files deleted before writing
    pub removed: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,

    /// Constants set used
    pub mode: Mode,
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Couldn't create output directory {}: {source}", path.display())]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Pages directory not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error(transparent)]
    Constants(#[from] ConstantsError),

    #[error("Failed to build {}: {source}", page.display())]
    Render {
        page: PathBuf,
        #[source]
        source: RenderError,
    },

    #[error("Failed to read {}: {message}", path.display())]
    ReadError { path: PathBuf, message: String },

    #[error("Failed to write {}: {source}", path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A page to be built.
#[derive(Debug)]
struct PageInfo {
    /// Source file path
    source_path: PathBuf,

    /// Output path
    output_path: PathBuf,
}

/// Static site builder.
pub struct StaticBuilder {
    config: BuildConfig,
}

impl StaticBuilder {
    /// Create a new static builder.
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Builder configuration.
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build the site.
    ///
    /// Every page is rendered before the output directory is touched, so a
    /// failing page leaves the previous output in place.
    pub fn build(&self) -> Result<BuildReport, BuildError> {
        let start = Instant::now();
        let output_dir = &self.config.output_dir;

        if !output_dir.exists() {
            tracing::info!("Creating output directory {}", output_dir.display());
        }
        fs::create_dir_all(output_dir).map_err(|source| BuildError::CreateOutput {
            path: output_dir.clone(),
            source,
        })?;

        let constants_path = self.config.env_files.for_mode(self.config.mode);
        let expander = Expander::new().with_constants(load_constants(constants_path)?);

        let pages = self.discover_pages()?;

        let rendered: Vec<(&PageInfo, String)> = pages
            .par_iter()
            .map(|page| {
                tracing::debug!(
                    "Building {} to {}",
                    page.source_path.display(),
                    page.output_path.display()
                );
                expander
                    .render(&page.source_path)
                    .map(|html| (page, html))
                    .map_err(|source| BuildError::Render {
                        page: page.source_path.clone(),
                        source,
                    })
            })
            .collect::<Result<_, _>>()?;

        let removed = self.clean()?;

        for (page, html) in &rendered {
            fs::write(&page.output_path, html).map_err(|source| BuildError::WriteError {
                path: page.output_path.clone(),
                source,
            })?;
        }

        Ok(BuildReport {
            pages: rendered.len(),
            removed,
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir: output_dir.clone(),
            mode: self.config.mode,
        })
    }

    /// Discover page sources directly inside the pages directory.
    fn discover_pages(&self) -> Result<Vec<PageInfo>, BuildError> {
        let pages_dir = &self.config.pages_dir;

        if !pages_dir.is_dir() {
            return Err(BuildError::MissingInput(pages_dir.clone()));
        }

        let mut pages = Vec::new();

        for entry in WalkDir::new(pages_dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| BuildError::ReadError {
                path: pages_dir.clone(),
                message: e.to_string(),
            })?;
            let path = entry.path();

            if !entry.file_type().is_file() || !self.has_page_extension(path) {
                continue;
            }

            let output_path = self.config.output_dir.join(entry.file_name());

            pages.push(PageInfo {
                source_path: path.to_path_buf(),
                output_path,
            });
        }

        Ok(pages)
    }

    /// Delete rendered files left over from the previous build.
    fn clean(&self) -> Result<usize, BuildError> {
        let output_dir = &self.config.output_dir;
        tracing::debug!("Cleaning rendered files from {}", output_dir.display());

        let mut removed = 0;

        for entry in WalkDir::new(output_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| BuildError::ReadError {
                path: output_dir.clone(),
                message: e.to_string(),
            })?;
            let path = entry.path();

            if !entry.file_type().is_file() || !self.has_page_extension(path) {
                continue;
            }

            tracing::debug!("Deleting {}", path.display());
            fs::remove_file(path).map_err(|source| BuildError::WriteError {
                path: path.to_path_buf(),
                source,
            })?;
            removed += 1;
        }

        Ok(removed)
    }

    fn has_page_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.config.extension))
    }
}
