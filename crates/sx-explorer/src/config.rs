//! Explorer configuration, loadable from TOML.
//!
//! The original tool's global language/debug flags are explicit
//! configuration here, passed at construction to each component.

use serde::Deserialize;
use sx_mqtt_channel::MqttConfig;

/// Top-level configuration for the explorer.
#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerConfig {
    /// IoT Core thing name this session simulates.
    pub thing_name: String,
    /// Directory holding per-thing certificate and state directories.
    #[serde(default = "default_certificates_dir")]
    pub certificates_dir: String,
    /// Apply non-empty diffs immediately instead of waiting for an
    /// explicit apply.
    #[serde(default)]
    pub auto_apply: bool,
    /// Log full payloads of generic exploration messages.
    #[serde(default)]
    pub verbose_payloads: bool,
    /// MQTT connection settings.
    pub mqtt: MqttConfig,
}

fn default_certificates_dir() -> String {
    "certificates".to_string()
}

impl ExplorerConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}
