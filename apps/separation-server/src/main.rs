//! Separation Server Binary
//!
//! # Usage
//!
//! ```bash
//! cargo run -p separation-server
//! ```
//!
//! # Environment Variables
//!
//! - `SEPARATION_TOKEN_SECRET`: token signing secret (required)
//! - `SEPARATION_HTTP_PORT`: HTTP/WebSocket port (default: 8000)
//! - `SEPARATION_DATABASE_PATH`: database file (default: separation.db)
//! - `RUST_LOG`: log level (default: info)

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use separation_server::application::{EventPublisher, SeparationService};
use separation_server::config::Settings;
use separation_server::infrastructure::auth::TokenVerifier;
use separation_server::infrastructure::http::{AppState, create_router};
use separation_server::infrastructure::persistence::Store;
use separation_server::infrastructure::ws::{BroadcastFabric, PresenceRegistry};
use separation_server::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }

    telemetry::init();
    tracing::info!("Starting separation server");

    let settings = match Settings::from_env() {
        Ok(settings) => Arc::new(settings),
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!(
        http_port = settings.server.http_port,
        database = %settings.database.path,
        "Configuration loaded"
    );

    let store = match Store::open(&settings.database.path).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Could not open database: {e}");
            std::process::exit(1);
        }
    };

    let registry = Arc::new(PresenceRegistry::new());
    let fabric = Arc::new(BroadcastFabric::new(Arc::clone(&registry)));
    let publisher = EventPublisher::new(Arc::clone(&fabric));
    let service = Arc::new(SeparationService::new(Arc::clone(&store), publisher));
    let auth = Arc::new(TokenVerifier::new(&settings.token_secret));

    let state = AppState {
        service,
        store,
        auth,
        registry,
        fabric,
        settings: Arc::clone(&settings),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let app = create_router(state);

    let addr: SocketAddr =
        format!("{}:{}", settings.server.bind_address, settings.server.http_port).parse()?;

    tracing::info!(%addr, "HTTP server starting");
    tracing::info!("Endpoints:");
    tracing::info!("  GET   /health");
    tracing::info!("  POST  /orders/upload");
    tracing::info!("  POST  /orders/confirm");
    tracing::info!("  GET   /orders");
    tracing::info!("  GET   /orders/stats");
    tracing::info!("  GET   /orders/purchase-items");
    tracing::info!("  GET   /orders/{{id}}/detail");
    tracing::info!("  PATCH /orders/{{id}}/items");
    tracing::info!("  GET   /ws/orders");

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    tracing::info!("Separation server stopped");
    Ok(())
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown.cancel();
}
