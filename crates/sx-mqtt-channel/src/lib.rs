//! MQTT channel for AWS IoT Core shadow sessions.
//!
//! Provides the connection plumbing for the shadow explorer:
//! - `Channel` trait for publish/subscribe (mockable in tests)
//! - `MqttChannel` with TLS (mTLS) for production
//! - `SessionDriver`/`SessionMonitor` for the connection lifecycle
//! - `SubscriptionRegistry` tracking desired subscriptions and resync
//! - `ShadowMessage` classification for dispatching shadow events
//! - `MockChannel` for testing without a broker

pub mod channel;
pub mod config;
pub mod error;
pub mod handler;
pub mod mock;
pub mod registry;
pub mod session;
pub mod tls;

// Re-exports for convenience.
pub use channel::{Channel, MqttChannel, SubscribeAck};
pub use config::MqttConfig;
pub use error::{MqttError, MqttResult};
pub use handler::{ShadowMessage, classify};
pub use mock::MockChannel;
pub use registry::{SubscriptionEntry, SubscriptionRegistry};
pub use session::{ConnectionState, SessionDriver, SessionEvent, SessionMonitor};
