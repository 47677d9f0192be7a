//! Static site build command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use mortar_static::{Mode, StaticBuilder};

use crate::config::load_config;

/// Run the build command.
pub async fn run(config_path: &Path, prod: bool, output: Option<PathBuf>) -> Result<()> {
    let mode = super::mode(prod);
    if mode == Mode::Production {
        tracing::info!("Running production build");
    }

    let file_config = load_config(config_path)?;
    let config = file_config.build_config(mode, output);

    let report = StaticBuilder::new(config).build()?;

    tracing::info!(
        "Built {} pages ({} stale removed) in {}ms",
        report.pages,
        report.removed,
        report.duration_ms
    );

    tracing::info!("Output: {}", report.output_dir.display());

    Ok(())
}
