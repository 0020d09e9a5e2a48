use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use telyx_backend::{config, init_tracing, server};
use tracing::info;

/// Execute the start command
///
/// This will:
/// 1. Load configuration
/// 2. Initialize logging (stdout or the configured log file)
/// 3. Start the server, which blocks until shutdown
pub async fn execute(config_path: &Path) -> Result<()> {
    println!("{}", "Starting TelyX backend...".green());

    let cfg = config::load_config(config_path)?;

    // Held until the server returns so buffered log lines reach the file
    let _log_guard = init_tracing(&cfg.logging)?;

    info!(
        config = %config_path.display(),
        port = cfg.server.port,
        "Configuration loaded"
    );

    server::start_server(cfg).await?;

    Ok(())
}
