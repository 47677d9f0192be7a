//! Development server command.

use std::path::Path;

use anyhow::Result;
use mortar_server::DevServer;
use mortar_static::StaticBuilder;

use crate::config::load_config;

/// Run the dev server.
pub async fn run(config_path: &Path, port: u16, prod: bool, open: bool) -> Result<()> {
    tracing::info!("Starting development server on port {}", port);

    let file_config = load_config(config_path)?;
    let builder = StaticBuilder::new(file_config.build_config(super::mode(prod), None));
    let config = file_config.dev_server_config(port, open);

    DevServer::new(config).start(builder).await?;

    Ok(())
}
