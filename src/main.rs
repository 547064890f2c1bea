use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use notification_dispatcher::config::Settings;
use notification_dispatcher::dispatcher::Dispatcher;
use notification_dispatcher::postgres::PostgresPool;
use notification_dispatcher::repository::create_repositories;
use notification_dispatcher::server::{create_app, AppState};
use notification_dispatcher::telemetry::init_tracing;
use notification_dispatcher::template::html_to_text;
use notification_dispatcher::transport::{create_email_transport, create_sms_transport};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing
    init_tracing(&settings.logging)?;
    tracing::info!("Configuration loaded");

    // Storage
    let postgres_pool = if settings.storage.backend == "postgres" {
        let pool = PostgresPool::new(&settings.storage.database).await?;
        pool.migrate().await?;
        Some(Arc::new(pool))
    } else {
        None
    };
    let repositories = create_repositories(&settings.storage, postgres_pool.clone());

    // Dispatcher
    let mut builder = Dispatcher::builder()
        .settings(&settings)
        .repositories(repositories)
        .html_to_text(html_to_text);
    if let Some(transport) = create_email_transport(&settings.email).await {
        builder = builder.email_transport(transport);
    }
    if let Some(transport) = create_sms_transport(&settings.sms) {
        builder = builder.sms_transport(transport);
    }
    let dispatcher = builder.build().await?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Stop the workers once the server begins shutting down
    let mut shutdown_rx = shutdown_tx.subscribe();
    let dispatcher_clone = dispatcher.clone();
    let dispatcher_handle = tokio::spawn(async move {
        dispatcher_clone
            .shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await;
    });

    // Create Axum app
    let state = AppState::new(settings.clone(), dispatcher);
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx))
        .await?;

    tracing::info!("Waiting for dispatcher workers to finish...");
    let _ = dispatcher_handle.await;

    if let Some(pool) = postgres_pool {
        pool.close().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    let _ = shutdown_tx.send(());
}
