//! Generic topic exploration.
//!
//! The raw-MQTT side of the explorer. Topics here are user-supplied, so
//! they are validated against the allow-list before anything reaches the
//! transport; shadow topics are built from constants and do not pass
//! through this module.

use rumqttc::QoS;

use sx_mqtt_channel::{Channel, MqttError, MqttResult, SubscriptionEntry, SubscriptionRegistry};
use sx_protocol::topics;

use crate::journal::MessageJournal;

/// Subscribe to a user-supplied topic, recording it for resync.
pub async fn subscribe_topic<C: Channel>(
    channel: &C,
    registry: &SubscriptionRegistry,
    topic: &str,
    qos: QoS,
) -> MqttResult<SubscriptionEntry> {
    if !topics::is_valid_user_topic(topic) {
        return Err(MqttError::Subscribe(format!(
            "topic {topic:?} contains characters outside the allow-list"
        )));
    }
    registry.subscribe(channel, topic, qos).await
}

/// Publish to a user-supplied topic, journaling the send.
pub async fn publish_message<C: Channel>(
    channel: &C,
    journal: &MessageJournal,
    topic: &str,
    payload: &[u8],
    qos: QoS,
) -> MqttResult<()> {
    if !topics::is_valid_user_topic(topic) {
        return Err(MqttError::Publish(format!(
            "topic {topic:?} contains characters outside the allow-list"
        )));
    }
    channel.publish(topic, payload, qos).await?;
    journal.record_sent(topic, qos as u8, payload);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sx_mqtt_channel::MockChannel;

    #[tokio::test]
    async fn valid_topic_is_subscribed_and_tracked() {
        let mock = MockChannel::new();
        let registry = SubscriptionRegistry::new();

        let entry = subscribe_topic(&mock, &registry, "sensors/room1/temperature", QoS::AtMostOnce)
            .await
            .unwrap();

        assert_eq!(entry.topic, "sensors/room1/temperature");
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn invalid_topic_never_reaches_the_transport() {
        let mock = MockChannel::new();
        let registry = SubscriptionRegistry::new();

        let result = subscribe_topic(&mock, &registry, "sensors/room 1/#!", QoS::AtMostOnce).await;

        assert!(result.is_err());
        assert!(mock.subscriptions().is_empty());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn publish_is_validated_and_journaled() {
        let mock = MockChannel::new();
        let journal = MessageJournal::new();

        publish_message(&mock, &journal, "lab/bench-3", b"hello", QoS::AtMostOnce)
            .await
            .unwrap();
        let rejected =
            publish_message(&mock, &journal, "lab/bench 3", b"hello", QoS::AtMostOnce).await;

        assert!(rejected.is_err());
        assert_eq!(mock.published().len(), 1);
        assert_eq!(journal.len(), 1);
    }
}
