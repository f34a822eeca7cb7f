//! Fediseer-rs server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use fediseer_api::{AppState, app};
use fediseer_common::Config;
use fediseer_core::{IdentityService, LoggingNotifier, ServiceContext, TrustSettings};
use fediseer_federation::NodeInfoProbe;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// A handler that cannot be installed never fires; the other one still does.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fediseer=info,tower_http=info".into());
    let json = config.logging.is_json();

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    init_tracing(&config);

    info!("Starting fediseer-rs server...");

    let db = fediseer_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    fediseer_db::migrate(&db).await?;
    info!("Migrations completed");

    let probe = NodeInfoProbe::new(&config.probe)?;
    let ctx = ServiceContext::new(
        Arc::new(db),
        TrustSettings::from_config(&config),
        Arc::new(LoggingNotifier),
        Arc::new(probe),
    );

    let root = IdentityService::new(ctx.clone()).bootstrap_root().await?;
    info!(domain = %root.domain, "Trust root ready");

    let app = app(AppState::new(&ctx));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
