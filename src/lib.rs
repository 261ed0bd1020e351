pub mod account;
pub mod api;
pub mod config;
pub mod core_state;
pub mod db;
pub mod doctors;
pub mod models;
pub mod patients;
pub mod reception;
pub mod specializations;
pub mod validation;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub use validation::{ClinicError, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Startup error: {0}")]
    Core(#[from] core_state::CoreError),
    #[error("Server error: {0}")]
    Server(#[from] api::ServerError),
    #[error("Cannot listen for shutdown signal: {0}")]
    Signal(std::io::Error),
}

/// Serve the API until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let settings = config::ClinicConfig::from_env()?;
    let core = Arc::new(core_state::CoreState::from_config(&settings)?);
    let server = api::start_server_on(core, settings.bind_addr).await?;
    tracing::info!(addr = %server.addr, "Listening");

    tokio::signal::ctrl_c().await.map_err(StartupError::Signal)?;
    server.stop().await;
    Ok(())
}
