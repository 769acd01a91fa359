//! Topic subscription registry.
//!
//! Tracks desired topic → QoS subscriptions so they can be reinstated
//! after the broker discards a session. Entries are keyed by topic:
//! re-subscribing replaces, never duplicates.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rumqttc::QoS;

use crate::channel::Channel;
use crate::error::MqttResult;

/// A tracked subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionEntry {
    pub topic: String,
    pub requested: QoS,
    pub granted: QoS,
    pub pkid: u16,
    pub subscribed_at: DateTime<Utc>,
}

/// Registry of active subscriptions, shared between the foreground loop
/// and the session driver under one coarse mutex.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: Mutex<HashMap<String, SubscriptionEntry>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe and record the result.
    ///
    /// Blocks on the broker's SUBACK so the caller has the granted QoS and
    /// packet id before proceeding. On failure nothing is recorded.
    pub async fn subscribe<C: Channel + ?Sized>(
        &self,
        channel: &C,
        topic: &str,
        qos: QoS,
    ) -> MqttResult<SubscriptionEntry> {
        let ack = channel.subscribe(topic, qos).await?;
        let entry = SubscriptionEntry {
            topic: topic.to_string(),
            requested: qos,
            granted: ack.granted,
            pkid: ack.pkid,
            subscribed_at: Utc::now(),
        };
        self.entries
            .lock()
            .unwrap()
            .insert(topic.to_string(), entry.clone());
        Ok(entry)
    }

    /// Drop a subscription. The entry is removed even if the transport
    /// call fails — best-effort removal.
    pub async fn unsubscribe<C: Channel + ?Sized>(
        &self,
        channel: &C,
        topic: &str,
    ) -> MqttResult<()> {
        self.entries.lock().unwrap().remove(topic);
        channel.unsubscribe(topic).await
    }

    /// Reinstate every tracked subscription after the broker discarded the
    /// session.
    ///
    /// Iterates a snapshot; a per-topic failure removes that entry and
    /// warns, but never aborts resubscription of the remaining topics, so
    /// the registry is never left ambiguous. Returns how many were
    /// reinstated.
    pub async fn resync<C: Channel + ?Sized>(&self, channel: &C) -> usize {
        let snapshot: Vec<SubscriptionEntry> =
            self.entries.lock().unwrap().values().cloned().collect();

        let mut reinstated = 0;
        for entry in snapshot {
            match channel.subscribe(&entry.topic, entry.requested).await {
                Ok(ack) => {
                    let refreshed = SubscriptionEntry {
                        topic: entry.topic.clone(),
                        requested: entry.requested,
                        granted: ack.granted,
                        pkid: ack.pkid,
                        subscribed_at: Utc::now(),
                    };
                    self.entries
                        .lock()
                        .unwrap()
                        .insert(entry.topic.clone(), refreshed);
                    reinstated += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        topic = %entry.topic,
                        error = %e,
                        "resubscription failed, dropping topic"
                    );
                    self.entries.lock().unwrap().remove(&entry.topic);
                }
            }
        }
        reinstated
    }

    pub fn get(&self, topic: &str) -> Option<SubscriptionEntry> {
        self.entries.lock().unwrap().get(topic).cloned()
    }

    pub fn topics(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}
