mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use dealroom_api::notifier::Notifier;
use dealroom_api::router::build_router;
use dealroom_api::{AppState, AppStateInner};
use dealroom_core::{SystemClock, Workflow};
use dealroom_db::Database;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                concat!(
                    "dealroom=debug,dealroom_api=debug,dealroom_core=debug,",
                    "dealroom_db=info,tower_http=debug",
                )
                .into()
            }),
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e:#}");
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    let db = Arc::new(Database::open(&config.db_path)?);

    let notifier = Notifier::new();
    spawn_notification_sink(&notifier);

    let state: AppState = Arc::new(AppStateInner {
        workflow: Workflow::new(db, Arc::new(SystemClock), config.workflow),
        notifier,
        jwt_secret: config.jwt_secret.clone(),
    });

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        "Dealroom listening on {} (fee {} bps, {} day delivery, {} revision(s))",
        addr,
        config.workflow.platform_fee_bps,
        config.workflow.default_delivery_days,
        config.workflow.default_max_revisions
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Dealroom stopped");
    Ok(())
}

/// Log every notification for the external delivery service to pick up.
fn spawn_notification_sink(notifier: &Notifier) {
    let mut rx = notifier.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(intent) => info!(
                    recipient = %intent.recipient_id,
                    deal = ?intent.event.deal_id(),
                    event = ?intent.event,
                    "notification ready for delivery"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("notification sink fell behind, {} intents dropped", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
