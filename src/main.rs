use carelink::{relay_router, AppState, RelayConfig};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carelink=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RelayConfig::from_env();
    info!(bind_addr = %config.bind_addr, "Starting CareLink relay");

    let app = relay_router(AppState::default());

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(bind_addr = %config.bind_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };
    info!("Relay listening on ws://{}/ws", config.bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "Relay server stopped");
        std::process::exit(1);
    }
}
