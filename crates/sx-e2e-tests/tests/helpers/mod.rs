//! Shared test harness for E2E integration tests.
//!
//! Wires the dispatch loop, state store, journal, and subscription
//! registry through a shared `MockChannel`, exercising real code paths
//! across crate boundaries without a broker.

use rumqttc::{Publish, QoS};
use tempfile::TempDir;

use sx_explorer::dispatch::{Dispatcher, ShadowCache};
use sx_explorer::journal::MessageJournal;
use sx_explorer::shadow::ShadowClient;
use sx_explorer::state_store::{LocalState, StateStore};
use sx_mqtt_channel::{MockChannel, SessionEvent, SubscriptionRegistry};

pub const THING: &str = "lamp-01";

/// End-to-end test harness for one simulated device session.
pub struct TestHarness {
    _state_dir: TempDir,
    pub store: StateStore,
    pub journal: MessageJournal,
    pub mqtt: MockChannel,
    pub cache: ShadowCache,
    pub registry: SubscriptionRegistry,
}

impl TestHarness {
    pub fn new() -> Self {
        let state_dir = tempfile::tempdir().unwrap();
        let store = StateStore::for_thing(state_dir.path(), THING).unwrap();
        Self {
            _state_dir: state_dir,
            store,
            journal: MessageJournal::new(),
            mqtt: MockChannel::new(),
            cache: ShadowCache::default(),
            registry: SubscriptionRegistry::new(),
        }
    }

    pub fn dispatcher(&self, auto_apply: bool) -> Dispatcher<'_, MockChannel> {
        Dispatcher::new(
            &self.store,
            &self.journal,
            self.shadow(),
            &self.cache,
            auto_apply,
            false,
        )
    }

    pub fn shadow(&self) -> ShadowClient<'_, MockChannel> {
        ShadowClient::new(&self.mqtt, &self.journal, THING)
    }

    /// Persist initial device state.
    pub fn seed(&self, values: serde_json::Value) {
        let mut state = LocalState {
            last_updated: None,
            values: values.as_object().unwrap().clone(),
        };
        self.store.save(&mut state).unwrap();
    }

    /// Build an inbound-message session event.
    pub fn message(topic: &str, payload: &[u8]) -> SessionEvent {
        let mut publish = Publish::new(topic, QoS::AtLeastOnce, payload);
        publish.pkid = 1;
        SessionEvent::Message(publish)
    }

    pub fn update_topic(&self) -> String {
        sx_protocol::topics::shadow_update(THING)
    }
}
