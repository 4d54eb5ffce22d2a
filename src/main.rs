use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use jobboard_messaging::cluster::RelaySubscriber;
use jobboard_messaging::config::Settings;
use jobboard_messaging::server::{create_app, AppState};
use jobboard_messaging::tasks::HeartbeatTask;
use jobboard_messaging::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing; the guard flushes spans on exit
    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!(
        storage_backend = %settings.storage.backend,
        cluster_enabled = settings.cluster.enabled,
        "Configuration loaded"
    );

    // Create application state
    let state = AppState::new(settings.clone()).await?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Start heartbeat task in background
    let heartbeat_task = HeartbeatTask::new(
        settings.websocket.clone(),
        state.connection_manager.clone(),
        shutdown_tx.subscribe(),
    );
    let heartbeat_handle = tokio::spawn(async move {
        heartbeat_task.run().await;
    });

    // Start the cluster relay subscriber when clustering is enabled
    let relay_handle = state.router.relay().map(|relay| {
        let subscriber = RelaySubscriber::new(relay, Arc::clone(&state.router), shutdown_tx.subscribe());
        tokio::spawn(subscriber.run())
    });

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx))
        .await?;

    // Wait for background tasks to finish
    tracing::info!("Waiting for background tasks to finish...");
    let _ = heartbeat_handle.await;
    if let Some(handle) = relay_handle {
        let _ = handle.await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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

    // Stop heartbeat and relay tasks
    let _ = shutdown_tx.send(());
}
