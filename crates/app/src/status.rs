use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use stagehand_foundation::ShutdownHandler;
use tokio::sync::Mutex;

use crate::supervisor::ProcessSupervisor;

/// Serves `GET /status`, reporting each worker's last known
/// [`stagehand_foundation::WorkerState`] as plain text keyed by worker kind.
/// Shuts down cleanly alongside the rest of the process.
pub async fn serve_status(
    supervisor: Arc<Mutex<ProcessSupervisor>>,
    addr: std::net::SocketAddr,
    shutdown: ShutdownHandler,
) {
    let app = Router::new()
        .route("/status", get(status_handler))
        .with_state(supervisor);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %addr, "failed to bind status endpoint");
            return;
        }
    };

    tracing::info!(%addr, "status endpoint listening");
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await;
    if let Err(err) = result {
        tracing::error!(error = %err, "status endpoint exited with error");
    }
}

async fn status_handler(
    State(supervisor): State<Arc<Mutex<ProcessSupervisor>>>,
) -> Json<HashMap<String, String>> {
    let status = supervisor.lock().await.status();
    Json(
        status
            .into_iter()
            .map(|(kind, state)| (kind.as_str().to_string(), state.to_string()))
            .collect(),
    )
}
