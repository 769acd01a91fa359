//! MQTT channel — async client for AWS IoT Core communication.
//!
//! Wraps `rumqttc::AsyncClient` behind the `Channel` trait. Publishes are
//! fire-and-forget (queued, the PUBACK future is not awaited); `subscribe`
//! is the one blocking receive in the system because callers need the
//! granted QoS and packet id before proceeding.

use std::sync::Arc;

use async_trait::async_trait;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS, SubscribeReasonCode};
use uuid::Uuid;

use crate::config::MqttConfig;
use crate::error::{MqttError, MqttResult};
use crate::session::AckBridge;
use crate::tls;

/// Broker acknowledgement of a subscription.
#[derive(Debug, Clone, Copy)]
pub struct SubscribeAck {
    /// Packet id the broker answered.
    pub pkid: u16,
    /// QoS the broker actually granted (may be lower than requested).
    pub granted: QoS,
}

// ── Channel trait ─────────────────────────────────────────────

/// Abstraction for MQTT message publishing and subscribing.
///
/// Enables mocking in tests without a real MQTT broker.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Publish a raw payload to a topic. Does not wait for delivery
    /// confirmation.
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()>;

    /// Subscribe to a topic filter, blocking until the broker's SUBACK.
    async fn subscribe(&self, filter: &str, qos: QoS) -> MqttResult<SubscribeAck>;

    /// Remove a subscription. Best-effort.
    async fn unsubscribe(&self, filter: &str) -> MqttResult<()>;
}

// ── MqttChannel ───────────────────────────────────────────────

/// MQTT channel connected to AWS IoT Core.
///
/// Owns the `AsyncClient` for publishing/subscribing. The `EventLoop` is
/// returned separately from `connect()` — the caller must hand it to a
/// `SessionDriver` and spawn its `run()` before any operation completes.
pub struct MqttChannel {
    client: AsyncClient,
    thing_name: String,
    client_id: String,
    acks: Arc<AckBridge>,
}

impl MqttChannel {
    /// Create a channel for the given thing.
    ///
    /// The client id is `<thing_name>-<uuid>` so a fresh session never
    /// collides with a stale session of the same thing. Returns
    /// `(channel, event_loop)`; the connection is confirmed only once a
    /// `SessionDriver` polling the event loop sees the CONNACK (see
    /// `SessionMonitor::wait_connected`).
    pub fn connect(config: &MqttConfig, thing_name: &str) -> MqttResult<(Self, EventLoop)> {
        let client_id = format!("{thing_name}-{}", Uuid::now_v7().simple());

        let mut options = MqttOptions::new(&client_id, &config.endpoint, config.port);
        options.set_keep_alive(std::time::Duration::from_secs(config.keepalive_secs.into()));
        options.set_clean_session(config.clean_session);

        if config.use_tls {
            let transport = tls::load_tls_transport(config)?;
            options.set_transport(transport);
        }

        let (client, eventloop) = AsyncClient::new(options, 64);

        Ok((
            Self {
                client,
                thing_name: thing_name.to_string(),
                client_id,
                acks: Arc::new(AckBridge::default()),
            },
            eventloop,
        ))
    }

    pub fn thing_name(&self) -> &str {
        &self.thing_name
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub(crate) fn ack_bridge(&self) -> &Arc<AckBridge> {
        &self.acks
    }

    /// Request a disconnect. Idempotent — safe to call when the session is
    /// already torn down (the request error is ignored).
    pub async fn disconnect(&self) {
        if let Err(e) = self.client.disconnect().await {
            tracing::debug!(error = %e, "disconnect on closed session ignored");
        }
    }
}

#[async_trait]
impl Channel for MqttChannel {
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()> {
        self.client
            .publish(topic, qos, false, payload)
            .await
            .map_err(|e| MqttError::Publish(format!("'{topic}': {e}")))
    }

    async fn subscribe(&self, filter: &str, qos: QoS) -> MqttResult<SubscribeAck> {
        // Register the waiter before issuing the request so the SUBACK
        // cannot arrive unobserved.
        let rx = self.acks.register();

        if let Err(e) = self.client.subscribe(filter, qos).await {
            self.acks.discard_latest();
            return Err(MqttError::Subscribe(format!("'{filter}': {e}")));
        }

        let ack = rx.await.map_err(|_| {
            MqttError::Subscribe(format!("no SUBACK for '{filter}': connection interrupted"))
        })?;

        match ack.return_codes.first() {
            Some(SubscribeReasonCode::Success(granted)) => Ok(SubscribeAck {
                pkid: ack.pkid,
                granted: *granted,
            }),
            _ => Err(MqttError::Subscribe(format!(
                "broker rejected subscription to '{filter}'"
            ))),
        }
    }

    async fn unsubscribe(&self, filter: &str) -> MqttResult<()> {
        self.client
            .unsubscribe(filter)
            .await
            .map_err(|e| MqttError::Unsubscribe(format!("'{filter}': {e}")))
    }
}
