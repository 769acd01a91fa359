//! Connection lifecycle management.
//!
//! `SessionDriver` owns the rumqttc event loop and the
//! connect/interrupt/resume/disconnect state machine:
//!
//! ```text
//! Disconnected → Connecting → Connected ⇄ Interrupted → Reconnecting → Connected
//! ```
//!
//! Terminal `Disconnected` is reached only by an explicit disconnect (or a
//! failed first connect — the attempt is fatal, retry is a caller
//! decision). Classification, resync scheduling, and SUBACK completion all
//! run on the driver's task; consumers receive `SessionEvent`s over a
//! bounded mpsc channel from their own task.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rumqttc::{ConnAck, Event, EventLoop, Outgoing, Packet, Publish, SubAck};
use tokio::sync::{mpsc, oneshot, watch};

use crate::channel::MqttChannel;
use crate::error::{MqttError, MqttResult};
use crate::registry::SubscriptionRegistry;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Interrupted,
    Reconnecting,
}

/// Events delivered to the session consumer.
///
/// Emitted from the driver task, concurrently with foreground code.
#[derive(Debug)]
pub enum SessionEvent {
    /// An inbound publish.
    Message(Publish),
    /// The transport dropped; the driver will let it redial.
    Interrupted { error: String },
    /// A new CONNACK after an interruption.
    Resumed { session_present: bool },
}

// ── SUBACK bridge ─────────────────────────────────────────────

/// Hands SUBACKs from the driver task to blocked `subscribe` callers.
///
/// FIFO matching is sound because the foreground loop issues one blocking
/// subscribe at a time; pending waiters are failed on interruption rather
/// than left hanging.
#[derive(Default)]
pub(crate) struct AckBridge {
    pending: Mutex<VecDeque<oneshot::Sender<SubAck>>>,
}

impl AckBridge {
    pub(crate) fn register(&self) -> oneshot::Receiver<SubAck> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push_back(tx);
        rx
    }

    /// Discard the most recent registration (the request never left the
    /// client, so no SUBACK will answer it).
    pub(crate) fn discard_latest(&self) {
        self.pending.lock().unwrap().pop_back();
    }

    pub(crate) fn complete(&self, ack: SubAck) {
        match self.pending.lock().unwrap().pop_front() {
            Some(tx) => {
                let _ = tx.send(ack);
            }
            None => tracing::debug!(pkid = ack.pkid, "unsolicited SUBACK"),
        }
    }

    /// Drop every pending waiter; their receivers resolve to an error.
    pub(crate) fn fail_all(&self) {
        self.pending.lock().unwrap().clear();
    }
}

// ── SessionMonitor ────────────────────────────────────────────

/// Shared view of the connection state, observable from any task.
pub struct SessionMonitor {
    state_tx: watch::Sender<ConnectionState>,
    last_error: Mutex<Option<String>>,
    disconnect_requested: AtomicBool,
}

impl SessionMonitor {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            state_tx,
            last_error: Mutex::new(None),
            disconnect_requested: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// The error recorded by the most recent interruption or connect
    /// failure.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    /// Block until the transport confirms the connection.
    ///
    /// Returns an error if the attempt fails — the failure is fatal to the
    /// attempt, there is no internal retry loop.
    pub async fn wait_connected(&self) -> MqttResult<()> {
        let mut rx = self.state_tx.subscribe();
        loop {
            match *rx.borrow_and_update() {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Disconnected => {
                    let detail = self
                        .last_error()
                        .unwrap_or_else(|| "connection closed".to_string());
                    return Err(MqttError::Connection(detail));
                }
                _ => {}
            }
            if rx.changed().await.is_err() {
                return Err(MqttError::Connection("session driver stopped".to_string()));
            }
        }
    }

    /// Mark the session for teardown. The next transport error is then an
    /// expected disconnect, not an interruption.
    pub fn request_disconnect(&self) {
        self.disconnect_requested.store(true, Ordering::SeqCst);
    }

    pub fn disconnect_requested(&self) -> bool {
        self.disconnect_requested.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: ConnectionState) {
        let _ = self.state_tx.send(state);
    }

    fn record_error(&self, error: String) {
        *self.last_error.lock().unwrap() = Some(error);
    }
}

impl Default for SessionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

// ── SessionDriver ─────────────────────────────────────────────

/// Drives the event loop and the lifecycle state machine.
///
/// Spawn `run()` as a background task immediately after `connect`:
/// ```ignore
/// let driver = SessionDriver::new(eventloop, channel, registry, monitor, events_tx);
/// tokio::spawn(driver.run());
/// monitor.wait_connected().await?;
/// ```
pub struct SessionDriver {
    eventloop: EventLoop,
    channel: Arc<MqttChannel>,
    registry: Arc<SubscriptionRegistry>,
    monitor: Arc<SessionMonitor>,
    events: mpsc::Sender<SessionEvent>,
}

impl SessionDriver {
    pub fn new(
        eventloop: EventLoop,
        channel: Arc<MqttChannel>,
        registry: Arc<SubscriptionRegistry>,
        monitor: Arc<SessionMonitor>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        // The attempt is in flight from construction, so wait_connected
        // cannot observe a stale Disconnected.
        monitor.set_state(ConnectionState::Connecting);
        Self {
            eventloop,
            channel,
            registry,
            monitor,
            events,
        }
    }

    /// Poll the transport until disconnect.
    ///
    /// A poll error before the first CONNACK is fatal to the attempt. After
    /// that, errors are interruptions: the state machine records them and
    /// lets the transport redial on the next poll.
    pub async fn run(mut self) {
        let mut connected_once = false;

        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    self.on_connack(&ack, &mut connected_once).await;
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    self.channel.ack_bridge().complete(ack);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if self.events.send(SessionEvent::Message(publish)).await.is_err() {
                        tracing::debug!("event consumer gone, dropping message");
                    }
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    tracing::info!(client_id = %self.channel.client_id(), "session closed");
                    self.teardown();
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    if self.monitor.disconnect_requested() {
                        self.teardown();
                        return;
                    }
                    if !connected_once {
                        // Fatal to the connect attempt — no internal retry.
                        tracing::error!(error = %e, "connection attempt failed");
                        self.monitor.record_error(format!("connect: {e}"));
                        self.teardown();
                        return;
                    }
                    self.on_interrupted(&e.to_string()).await;
                }
            }
        }
    }

    async fn on_connack(&mut self, ack: &ConnAck, connected_once: &mut bool) {
        let resumed = *connected_once;
        *connected_once = true;
        self.monitor.set_state(ConnectionState::Connected);

        if !resumed {
            tracing::info!(
                client_id = %self.channel.client_id(),
                session_present = ack.session_present,
                "mqtt session established"
            );
            return;
        }

        tracing::info!(
            client_id = %self.channel.client_id(),
            session_present = ack.session_present,
            "mqtt session resumed"
        );
        if self
            .events
            .send(SessionEvent::Resumed {
                session_present: ack.session_present,
            })
            .await
            .is_err()
        {
            tracing::debug!("event consumer gone, dropping resume event");
        }

        if !ack.session_present {
            // Broker discarded the session: every subscription must be
            // reinstated. Spawned, not awaited — the resubscribes block on
            // SUBACKs that only this task's polling can deliver.
            let channel = Arc::clone(&self.channel);
            let registry = Arc::clone(&self.registry);
            tokio::spawn(async move {
                let reinstated = registry.resync(&*channel).await;
                tracing::info!(reinstated, "resubscription complete");
            });
        }
    }

    async fn on_interrupted(&mut self, error: &str) {
        tracing::warn!(error = %error, "mqtt connection interrupted");
        self.monitor.record_error(error.to_string());
        self.monitor.set_state(ConnectionState::Interrupted);
        // Anyone blocked on a SUBACK will not get one on this connection.
        self.channel.ack_bridge().fail_all();

        if self
            .events
            .send(SessionEvent::Interrupted {
                error: error.to_string(),
            })
            .await
            .is_err()
        {
            tracing::debug!("event consumer gone, dropping interrupt event");
        }

        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        self.monitor.set_state(ConnectionState::Reconnecting);
    }

    fn teardown(&self) {
        self.channel.ack_bridge().fail_all();
        self.monitor.set_state(ConnectionState::Disconnected);
    }
}
