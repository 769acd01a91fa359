use serde::{Deserialize, Serialize};

/// Full shadow document as published on `get/accepted`.
///
/// A read-only snapshot of the cloud-side record: reported (from device),
/// desired (from cloud), and the precomputed delta between them. Never
/// mutated locally — only used as diff input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowDocument {
    /// Desired/reported/delta sections.
    #[serde(default)]
    pub state: ShadowState,
    /// Per-attribute update timestamps, mirrored from the state sections.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Shadow version (monotonically increasing).
    pub version: u64,
    /// When the document was generated (epoch seconds).
    #[serde(default)]
    pub timestamp: u64,
}

/// The `state` sections of a shadow document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShadowState {
    /// State desired by the cloud.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired: Option<serde_json::Value>,
    /// State last reported by the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported: Option<serde_json::Value>,
    /// Difference between desired and reported, computed by the broker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<serde_json::Value>,
}

/// Delta notification published on `update/delta` when desired diverges
/// from reported. Ephemeral — consumed once by the reconciliation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaEvent {
    /// The changed properties (desired values the device has not reported).
    pub state: serde_json::Value,
    /// Shadow version this delta was computed from.
    pub version: u64,
    /// When the delta was generated (epoch seconds).
    #[serde(default)]
    pub timestamp: u64,
}

/// Error document published on `get/rejected` and `update/rejected`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP-style status code.
    pub code: u16,
    /// Human-readable rejection reason.
    pub message: String,
    /// When the rejection was generated (epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl ErrorResponse {
    /// On `get/rejected`, a 404 means the shadow has not been created yet —
    /// the bootstrap flow relies on this, it is not an error.
    pub fn is_shadow_absent(&self) -> bool {
        self.code == 404
    }
}

/// Acknowledgement published on `update/accepted`: the accepted state echo
/// plus the new version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAck {
    #[serde(default)]
    pub state: ShadowState,
    pub version: u64,
    #[serde(default)]
    pub timestamp: u64,
}

/// Build the `update` publish payload for reporting device state.
pub fn reported_update(reported: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "state": { "reported": reported } })
}

/// Build the `update` publish payload for setting desired state
/// (playing the cloud side against another session).
pub fn desired_update(desired: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "state": { "desired": desired } })
}
