//! pushci API Server

use pushci_api::{AppState, routes};
use pushci_config::{SystemConfig, load_toolchain};
use pushci_core::toolchain::Toolchain;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = SystemConfig::from_env()?;

    let toolchain = match &config.toolchain_path {
        Some(path) => {
            info!(path = %path.display(), "Loading toolchain");
            load_toolchain(path)?
        }
        None => Toolchain::default(),
    };
    info!(
        toolchain = %toolchain.name,
        timeout = ?config.step_timeout.or(toolchain.timeout),
        "Toolchain ready"
    );

    if config.github_token.is_none() {
        warn!("GITHUB_TOKEN is not set, commit statuses will not be reported");
    }

    let state = AppState::from_config(&config, toolchain).await?;
    info!(
        log_dir = %config.log_dir.display(),
        work_dir = %config.work_dir.display(),
        "Log store opened"
    );

    // Build router
    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server
    info!("Starting server on {}", config.bind);

    let listener = TcpListener::bind(config.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
