use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use stagehand_foundation::BusError;
use stagehand_telemetry::StageMetrics;
use tokio::task::JoinHandle;

const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);
const SESSION_EXPIRY_SECS: u64 = 3600;

/// A subscription handler: invoked once per message on its topic, on the
/// client's single dispatch task (never concurrently with itself or any
/// other handler).
pub type MessageHandler = Box<dyn Fn(&str, &[u8]) + Send + Sync>;

/// MQTT publish/subscribe client (C11), grounded in the original tracker's
/// `MQTTController` (`mqtt_controller.py`): automatic reconnect with
/// back-off, clean-session disabled, JSON payloads decoded where parseable.
pub struct BusClient {
    client: AsyncClient,
    handlers: Arc<Mutex<HashMap<String, MessageHandler>>>,
    dispatch_task: Option<JoinHandle<()>>,
    metrics: StageMetrics,
}

impl BusClient {
    /// Connects to `broker:port` with the given client id. Clean-session is
    /// disabled and `SESSION_EXPIRY_SECS` governs how long the broker keeps
    /// queued messages for this client id across reconnects.
    pub fn connect(broker: &str, port: u16, client_id: &str, metrics: StageMetrics) -> Self {
        let mut options = MqttOptions::new(client_id, broker, port);
        options.set_clean_session(false);
        options.set_keep_alive(Duration::from_secs(SESSION_EXPIRY_SECS.min(60)));

        let (client, event_loop) = AsyncClient::new(options, 32);
        let handlers: Arc<Mutex<HashMap<String, MessageHandler>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let dispatch_task = tokio::spawn(dispatch_loop(event_loop, handlers.clone(), metrics.clone()));

        Self {
            client,
            handlers,
            dispatch_task: Some(dispatch_task),
            metrics,
        }
    }

    /// Publishes `payload` to `topic` at QoS 0.
    pub async fn publish(&self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BusError> {
        self.client
            .publish(topic, QoS::AtMostOnce, retain, payload.to_vec())
            .await
            .map_err(|e| BusError::PublishFailed(e.to_string()))
    }

    /// Subscribes to `topic`, routing every message on it to `handler` on
    /// the client's single dispatch task.
    pub async fn subscribe(
        &self,
        topic: &str,
        handler: MessageHandler,
    ) -> Result<(), BusError> {
        self.handlers.lock().insert(topic.to_string(), handler);
        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| BusError::SubscribeFailed(e.to_string()))
    }

    pub async fn disconnect(&self) {
        let _ = self.client.disconnect().await;
    }
}

impl Drop for BusClient {
    fn drop(&mut self) {
        if let Some(task) = self.dispatch_task.take() {
            task.abort();
        }
    }
}

/// Drains the event loop, dispatching incoming `Publish` packets to their
/// registered handler and reconnecting with a fixed back-off on error.
async fn dispatch_loop(
    mut event_loop: rumqttc::EventLoop,
    handlers: Arc<Mutex<HashMap<String, MessageHandler>>>,
    metrics: StageMetrics,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                if let Some(handler) = handlers.lock().get(&publish.topic) {
                    handler(&publish.topic, &publish.payload);
                }
            }
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                tracing::info!("connected to MQTT broker");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "MQTT event loop error, reconnecting");
                metrics.record_bus_reconnect();
                tokio::time::sleep(RECONNECT_BACKOFF).await;
            }
        }
    }
}

/// Parses `payload` as JSON if possible; returns `None` for binary/plain
/// payloads rather than erroring, per the client-side "decode when
/// parseable" contract.
pub fn try_decode_json(payload: &[u8]) -> Option<serde_json::Value> {
    serde_json::from_slice(payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_json_payload_decodes_to_none() {
        assert!(try_decode_json(b"start").is_none());
    }

    #[test]
    fn json_payload_decodes() {
        let value = try_decode_json(br#"{"a":1}"#).unwrap();
        assert_eq!(value["a"], 1);
    }
}
