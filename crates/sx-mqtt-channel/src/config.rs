use serde::Deserialize;

/// MQTT connection configuration, loadable from TOML.
///
/// The client id is not configured here: it is built per session from the
/// thing name plus a random suffix, so a fresh session never collides with
/// a stale session of the same thing.
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    /// AWS IoT data endpoint hostname (the `iot:Data-ATS` endpoint).
    pub endpoint: String,
    /// Broker port (8883 for mTLS).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Enable TLS (mTLS). When false, connects plaintext (local dev).
    #[serde(default = "default_use_tls")]
    pub use_tls: bool,
    /// Path to device X.509 certificate (PEM).
    #[serde(default)]
    pub client_cert_path: String,
    /// Path to device private key (PEM).
    #[serde(default)]
    pub client_key_path: String,
    /// Path to CA certificate (e.g., AmazonRootCA1.pem).
    #[serde(default)]
    pub ca_cert_path: String,
    /// Keep-alive interval in seconds.
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u16,
    /// Ask the broker to discard any previous session state on connect.
    #[serde(default = "default_clean_session")]
    pub clean_session: bool,
}

fn default_use_tls() -> bool {
    true
}

fn default_port() -> u16 {
    8883
}

fn default_keepalive() -> u16 {
    30
}

fn default_clean_session() -> bool {
    true
}
