//! Shadow Explorer — device-shadow session for AWS IoT Core.
//!
//! Wires the MQTT session, subscription registry, and reconciliation
//! engine into a binary that mirrors one simulated device against its
//! classic shadow.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use sx_explorer::config::ExplorerConfig;
use sx_explorer::dispatch::{Dispatcher, ShadowCache};
use sx_explorer::journal::MessageJournal;
use sx_explorer::shadow::ShadowClient;
use sx_explorer::state_store::StateStore;
use sx_mqtt_channel::{MqttChannel, SessionDriver, SessionMonitor, SubscriptionRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "sx-explorer starting");

    // ── Load config ─────────────────────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "explorer.toml".to_string());

    let config = ExplorerConfig::from_file(&config_path)?;
    tracing::info!(
        thing_name = %config.thing_name,
        endpoint = %config.mqtt.endpoint,
        "config loaded"
    );

    let store = StateStore::for_thing(&config.certificates_dir, &config.thing_name)?;

    // ── MQTT session ────────────────────────────────────────────
    let (channel, eventloop) = MqttChannel::connect(&config.mqtt, &config.thing_name)?;
    let channel = Arc::new(channel);
    let registry = Arc::new(SubscriptionRegistry::new());
    let monitor = Arc::new(SessionMonitor::new());
    let (events_tx, events_rx) = mpsc::channel(64);

    let driver = SessionDriver::new(
        eventloop,
        Arc::clone(&channel),
        Arc::clone(&registry),
        Arc::clone(&monitor),
        events_tx,
    );
    tokio::spawn(driver.run());

    // Blocks until the transport confirms; a failed attempt is fatal here,
    // retrying is the operator's call.
    monitor.wait_connected().await?;
    tracing::info!(client_id = %channel.client_id(), "connected");

    // ── Shadow session ──────────────────────────────────────────
    let journal = MessageJournal::new();
    let cache = ShadowCache::default();

    let shadow = ShadowClient::new(&*channel, &journal, &config.thing_name);
    shadow.subscribe_responses(&registry).await?;
    tracing::info!(subscriptions = registry.len(), "shadow subscriptions active");

    // Ask for the current document; a 404 answer bootstraps the shadow.
    shadow.publish_get().await?;

    let dispatcher = Dispatcher::new(
        &store,
        &journal,
        shadow,
        &cache,
        config.auto_apply,
        config.verbose_payloads,
    );

    tokio::select! {
        () = dispatcher.run(events_rx) => {
            tracing::error!("dispatch loop exited unexpectedly");
        }
        // Graceful shutdown on SIGINT/SIGTERM
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    monitor.request_disconnect();
    channel.disconnect().await;
    tracing::info!(journaled = journal.len(), "sx-explorer stopped");
    Ok(())
}
