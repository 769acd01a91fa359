//! Mock MQTT channel for testing without a real broker.
//!
//! Records all published messages and subscription attempts for assertion
//! in tests, and can be told to fail subscriptions to specific topics.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU16, Ordering};

use async_trait::async_trait;
use rumqttc::QoS;

use crate::channel::{Channel, SubscribeAck};
use crate::error::{MqttError, MqttResult};

/// A recorded publish call.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
}

/// Mock implementation of the `Channel` trait.
///
/// Stores all publishes and subscription attempts in memory for test
/// verification. Thread-safe via `Mutex` (fine for test contexts).
pub struct MockChannel {
    published: Mutex<Vec<PublishedMessage>>,
    subscriptions: Mutex<Vec<(String, QoS)>>,
    unsubscriptions: Mutex<Vec<String>>,
    failing_topics: Mutex<HashSet<String>>,
    next_pkid: AtomicU16,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            unsubscriptions: Mutex::new(Vec::new()),
            failing_topics: Mutex::new(HashSet::new()),
            next_pkid: AtomicU16::new(1),
        }
    }

    /// Get all published messages.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }

    /// Get all subscription attempts (including injected failures).
    pub fn subscriptions(&self) -> Vec<(String, QoS)> {
        self.subscriptions.lock().unwrap().clone()
    }

    /// Get all unsubscribed filters.
    pub fn unsubscriptions(&self) -> Vec<String> {
        self.unsubscriptions.lock().unwrap().clone()
    }

    /// Get the last published message.
    pub fn last_published(&self) -> Option<PublishedMessage> {
        self.published.lock().unwrap().last().cloned()
    }

    /// Get published messages for a specific topic.
    pub fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Check whether a subscription was attempted for the given filter.
    pub fn is_subscribed_to(&self, filter: &str) -> bool {
        self.subscriptions
            .lock()
            .unwrap()
            .iter()
            .any(|(f, _)| f == filter)
    }

    /// Make subsequent subscriptions to `topic` fail.
    pub fn fail_subscriptions_to(&self, topic: &str) {
        self.failing_topics.lock().unwrap().insert(topic.to_string());
    }

    /// Clear all recorded state (failure injection included).
    pub fn reset(&self) {
        self.published.lock().unwrap().clear();
        self.subscriptions.lock().unwrap().clear();
        self.unsubscriptions.lock().unwrap().clear();
        self.failing_topics.lock().unwrap().clear();
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for MockChannel {
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()> {
        self.published.lock().unwrap().push(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
        });
        Ok(())
    }

    async fn subscribe(&self, filter: &str, qos: QoS) -> MqttResult<SubscribeAck> {
        self.subscriptions
            .lock()
            .unwrap()
            .push((filter.to_string(), qos));

        if self.failing_topics.lock().unwrap().contains(filter) {
            return Err(MqttError::Subscribe(format!(
                "injected failure for '{filter}'"
            )));
        }

        Ok(SubscribeAck {
            pkid: self.next_pkid.fetch_add(1, Ordering::SeqCst),
            granted: qos,
        })
    }

    async fn unsubscribe(&self, filter: &str) -> MqttResult<()> {
        self.unsubscriptions.lock().unwrap().push(filter.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_records_messages() {
        let mock = MockChannel::new();
        mock.publish("test/topic", b"hello", QoS::AtLeastOnce)
            .await
            .unwrap();
        mock.publish("test/other", b"world", QoS::AtMostOnce)
            .await
            .unwrap();

        let msgs = mock.published();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].topic, "test/topic");
        assert_eq!(msgs[0].payload, b"hello");
        assert_eq!(msgs[1].topic, "test/other");
    }

    #[tokio::test]
    async fn subscribe_returns_distinct_pkids() {
        let mock = MockChannel::new();
        let a = mock.subscribe("a", QoS::AtLeastOnce).await.unwrap();
        let b = mock.subscribe("b", QoS::AtLeastOnce).await.unwrap();

        assert_ne!(a.pkid, b.pkid);
        assert!(mock.is_subscribed_to("a"));
        assert!(!mock.is_subscribed_to("c"));
    }

    #[tokio::test]
    async fn injected_failure_still_recorded_as_attempt() {
        let mock = MockChannel::new();
        mock.fail_subscriptions_to("bad/topic");

        let result = mock.subscribe("bad/topic", QoS::AtLeastOnce).await;

        assert!(result.is_err());
        assert_eq!(mock.subscriptions().len(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_is_recorded() {
        let mock = MockChannel::new();
        mock.unsubscribe("a/b").await.unwrap();
        assert_eq!(mock.unsubscriptions(), vec!["a/b".to_string()]);
    }

    #[tokio::test]
    async fn reset_clears_state() {
        let mock = MockChannel::new();
        mock.publish("t", b"d", QoS::AtMostOnce).await.unwrap();
        mock.subscribe("f", QoS::AtLeastOnce).await.unwrap();
        mock.fail_subscriptions_to("g");

        mock.reset();
        assert!(mock.published().is_empty());
        assert!(mock.subscriptions().is_empty());
        mock.subscribe("g", QoS::AtLeastOnce).await.unwrap();
    }
}
