use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Cooperative shutdown signal shared across a worker process's tasks
/// (audio capture loop, matcher loop, camera loop, lamp loop, bus client).
///
/// Mirrors the ColdVox shutdown handler: a `AtomicBool` flag plus a
/// `Notify` so waiters can `tokio::select!` against it instead of polling.
#[derive(Clone)]
pub struct ShutdownHandler {
    requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Default for ShutdownHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandler {
    pub fn new() -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Installs a Ctrl-C listener that triggers shutdown. Intended to be
    /// spawned once from the process entrypoint.
    pub fn install_signal_handler(&self) {
        let handler = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("received Ctrl-C, initiating shutdown");
                handler.request();
            }
        });
    }

    pub fn request(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            tracing::info!("shutdown requested");
            self.notify.notify_waiters();
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolves once `request()` has been called. Safe to await from
    /// multiple tasks concurrently within a `tokio::select!`.
    pub async fn wait(&self) {
        if self.is_requested() {
            return;
        }
        self.notify.notified().await;
    }

    pub fn guard(&self) -> ShutdownGuard {
        ShutdownGuard {
            handler: self.clone(),
        }
    }
}

/// RAII helper for a single task: holding this alongside a
/// `tokio::select! { _ = guard.handler.wait() => ... }` arm keeps the
/// intent of "this task participates in shutdown" visible at the call site.
pub struct ShutdownGuard {
    handler: ShutdownHandler,
}

impl ShutdownGuard {
    pub fn is_requested(&self) -> bool {
        self.handler.is_requested()
    }

    pub async fn wait(&self) {
        self.handler.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_resolves_after_request() {
        let handler = ShutdownHandler::new();
        let waiter = handler.clone();

        let task = tokio::spawn(async move {
            waiter.wait().await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handler.request();

        tokio::time::timeout(Duration::from_millis(200), task)
            .await
            .expect("wait() should resolve after request()")
            .unwrap();
    }

    #[tokio::test]
    async fn wait_returns_immediately_if_already_requested() {
        let handler = ShutdownHandler::new();
        handler.request();
        tokio::time::timeout(Duration::from_millis(50), handler.wait())
            .await
            .expect("wait() must not block once requested");
    }

    #[test]
    fn request_is_idempotent() {
        let handler = ShutdownHandler::new();
        handler.request();
        handler.request();
        assert!(handler.is_requested());
    }
}
