//! Tabletop server binary.

use clap::Parser;
use tabletop_server::{AppState, ServerConfig, build_router};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tabletop_server=info,tabletop_core=info,tower_http=info".into()
            }),
        )
        .init();

    let config = ServerConfig::parse();
    let state = match AppState::new(&config) {
        Ok(state) => state,
        Err(e) => {
            error!("Cannot start: {}", e);
            std::process::exit(1);
        }
    };
    let app = build_router(state, &config);

    let listener = match tokio::net::TcpListener::bind(config.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Cannot bind {}: {}", config.bind, e);
            std::process::exit(1);
        }
    };
    info!("Tabletop server listening on {}", config.bind);
    info!("Images stored in {}", config.image_dir().display());

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    }
}
