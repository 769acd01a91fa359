//! Session event dispatch.
//!
//! Consumes `SessionEvent`s from the session driver, journals every inbound
//! publish, routes classified shadow messages, and drives reconciliation.
//! Runs on its own task, concurrently with the foreground command loop;
//! everything shared across that boundary (journal, cache) sits behind one
//! coarse mutex per structure.

use std::sync::Mutex;

use tokio::sync::mpsc;

use sx_mqtt_channel::{Channel, SessionEvent, ShadowMessage, classify};
use sx_protocol::shadows::{ErrorResponse, ShadowDocument};

use crate::error::ExplorerResult;
use crate::journal::MessageJournal;
use crate::reconcile::{self, Diff};
use crate::shadow::ShadowClient;
use crate::state_store::{LocalState, StateStore};

/// Most recent shadow document and unapplied diff, shared with the
/// foreground loop.
#[derive(Default)]
pub struct ShadowCache {
    last_document: Mutex<Option<ShadowDocument>>,
    pending_diff: Mutex<Option<Diff>>,
}

impl ShadowCache {
    pub fn last_document(&self) -> Option<ShadowDocument> {
        self.last_document.lock().unwrap().clone()
    }

    pub fn pending_diff(&self) -> Option<Diff> {
        self.pending_diff.lock().unwrap().clone()
    }

    /// Take the pending diff, leaving none. A later delta overwrites an
    /// untaken diff — only the newest divergence is worth applying.
    pub fn take_pending_diff(&self) -> Option<Diff> {
        self.pending_diff.lock().unwrap().take()
    }

    fn store_document(&self, doc: ShadowDocument) {
        *self.last_document.lock().unwrap() = Some(doc);
    }

    fn store_diff(&self, diff: Diff) {
        *self.pending_diff.lock().unwrap() = Some(diff);
    }
}

/// Routes session events into the store, journal, and cache.
pub struct Dispatcher<'a, C: Channel> {
    store: &'a StateStore,
    journal: &'a MessageJournal,
    shadow: ShadowClient<'a, C>,
    cache: &'a ShadowCache,
    /// Apply non-empty diffs immediately instead of caching them for an
    /// explicit apply.
    auto_apply: bool,
    /// Log full payloads of generic exploration messages.
    verbose_payloads: bool,
}

impl<'a, C: Channel> Dispatcher<'a, C> {
    pub fn new(
        store: &'a StateStore,
        journal: &'a MessageJournal,
        shadow: ShadowClient<'a, C>,
        cache: &'a ShadowCache,
        auto_apply: bool,
        verbose_payloads: bool,
    ) -> Self {
        Self {
            store,
            journal,
            shadow,
            cache,
            auto_apply,
            verbose_payloads,
        }
    }

    /// Consume session events until the driver closes the channel.
    pub async fn run(&self, mut events: mpsc::Receiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        tracing::debug!("session event channel closed");
    }

    pub async fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Message(publish) => {
                self.journal
                    .record_received(&publish.topic, publish.qos as u8, &publish.payload);
                self.handle_message(classify(&publish)).await;
            }
            SessionEvent::Interrupted { error } => {
                tracing::warn!(error = %error, "connection interrupted, transport will redial");
            }
            SessionEvent::Resumed { session_present } => {
                tracing::info!(session_present, "connection resumed");
            }
        }
    }

    async fn handle_message(&self, msg: ShadowMessage) {
        match msg {
            ShadowMessage::GetAccepted(doc) => {
                tracing::info!(version = doc.version, "shadow document received");
                let desired = doc.state.desired.clone();
                self.cache.store_document(doc);
                if let Some(desired) = desired {
                    self.reconcile_desired(&desired).await;
                }
            }
            ShadowMessage::ShadowAbsent(err) => {
                self.bootstrap(&err).await;
            }
            ShadowMessage::GetRejected(err) => {
                tracing::error!(code = err.code, message = %err.message, "shadow get rejected");
            }
            ShadowMessage::UpdateAccepted(ack) => {
                tracing::debug!(version = ack.version, "shadow update accepted");
            }
            ShadowMessage::UpdateRejected(err) => {
                tracing::error!(code = err.code, message = %err.message, "shadow update rejected");
            }
            ShadowMessage::Delta(delta) => {
                tracing::info!(version = delta.version, "delta received");
                self.reconcile_desired(&delta.state).await;
            }
            ShadowMessage::General { topic, payload } => {
                if self.verbose_payloads {
                    tracing::info!(
                        topic = %topic,
                        payload = %String::from_utf8_lossy(&payload),
                        "message"
                    );
                } else {
                    tracing::info!(topic = %topic, bytes = payload.len(), "message");
                }
            }
        }
    }

    async fn reconcile_desired(&self, desired: &serde_json::Value) {
        let local = self.store.load_or_empty();
        let diff = reconcile::reconcile(desired, &local);

        if diff.is_empty() {
            tracing::debug!("local state already converged");
            return;
        }

        let keys: Vec<&String> = diff.keys().collect();
        tracing::info!(?keys, "local state diverges from desired");

        if self.auto_apply {
            match reconcile::apply(&diff, self.store, &self.shadow).await {
                Ok(_) => tracing::info!("diff applied and reported"),
                Err(e) => tracing::error!(error = %e, "apply failed"),
            }
        } else {
            self.cache.store_diff(diff);
        }
    }

    /// The shadow does not exist yet (`get/rejected` 404): seed the
    /// simulated device state and report it, which creates the shadow.
    async fn bootstrap(&self, err: &ErrorResponse) {
        tracing::info!(message = %err.message, "shadow absent, creating from local state");

        let mut state = self.store.load().unwrap_or_else(LocalState::bootstrap);
        if let Err(e) = self.store.save(&mut state) {
            tracing::error!(error = %e, "failed to persist bootstrap state");
            return;
        }
        if let Err(e) = self.shadow.report_state(&state).await {
            tracing::error!(error = %e, "failed to report bootstrap state");
        }
    }

    /// Apply the cached diff — the operator's explicit confirmation step.
    /// Returns the updated state, or `None` when nothing was pending.
    pub async fn apply_pending(&self) -> ExplorerResult<Option<LocalState>> {
        let Some(diff) = self.cache.take_pending_diff() else {
            return Ok(None);
        };
        let state = reconcile::apply(&diff, self.store, &self.shadow).await?;
        Ok(Some(state))
    }
}
