//! Shadow topic operations for one thing.
//!
//! Typed publish and subscribe helpers over any `Channel` implementation.
//! Publishes are fire-and-forget (queued, PUBACK not awaited) so the
//! interactive loop stays responsive; every publish is journaled.

use rumqttc::QoS;

use sx_mqtt_channel::{Channel, MqttError, MqttResult, SubscriptionRegistry};
use sx_protocol::{shadows, topics};

use crate::journal::MessageJournal;
use crate::state_store::LocalState;

/// Shadow operations backed by a `Channel` implementation.
pub struct ShadowClient<'a, C: Channel> {
    channel: &'a C,
    journal: &'a MessageJournal,
    thing_name: String,
}

impl<'a, C: Channel> ShadowClient<'a, C> {
    pub fn new(
        channel: &'a C,
        journal: &'a MessageJournal,
        thing_name: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            journal,
            thing_name: thing_name.into(),
        }
    }

    pub fn thing_name(&self) -> &str {
        &self.thing_name
    }

    /// Request the current shadow document. The payload is empty by
    /// contract; the answer arrives on `get/accepted` or `get/rejected`.
    pub async fn publish_get(&self) -> MqttResult<()> {
        self.publish(&topics::shadow_get(&self.thing_name), Vec::new())
            .await
    }

    /// Report the device's state, overwriting the shadow's `reported`
    /// section.
    pub async fn report_state(&self, state: &LocalState) -> MqttResult<()> {
        let value = serde_json::to_value(state)
            .map_err(|e| MqttError::Serialization(e.to_string()))?;
        self.publish_json(
            &topics::shadow_update(&self.thing_name),
            &shadows::reported_update(&value),
        )
        .await
    }

    /// Set the shadow's `desired` section — playing the cloud side, e.g.
    /// to trigger a delta against a second session of the same thing.
    pub async fn publish_desired(&self, desired: &serde_json::Value) -> MqttResult<()> {
        self.publish_json(
            &topics::shadow_update(&self.thing_name),
            &shadows::desired_update(desired),
        )
        .await
    }

    /// Subscribe to the five shadow response topics at QoS 1, recording
    /// each in the registry.
    pub async fn subscribe_responses(&self, registry: &SubscriptionRegistry) -> MqttResult<()> {
        for topic in topics::shadow_response_topics(&self.thing_name) {
            registry
                .subscribe(self.channel, &topic, QoS::AtLeastOnce)
                .await?;
        }
        Ok(())
    }

    async fn publish_json(&self, topic: &str, payload: &serde_json::Value) -> MqttResult<()> {
        let bytes = serde_json::to_vec(payload)
            .map_err(|e| MqttError::Serialization(e.to_string()))?;
        self.publish(topic, bytes).await
    }

    async fn publish(&self, topic: &str, bytes: Vec<u8>) -> MqttResult<()> {
        self.channel
            .publish(topic, &bytes, QoS::AtLeastOnce)
            .await?;
        self.journal.record_sent(topic, QoS::AtLeastOnce as u8, &bytes);
        Ok(())
    }
}
