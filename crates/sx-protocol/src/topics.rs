//! MQTT topic builders and classification for the classic device shadow.
//!
//! Topic structure (classic, unnamed shadow):
//! ```text
//! $aws/things/{thing_name}/shadow/get
//! $aws/things/{thing_name}/shadow/get/accepted
//! $aws/things/{thing_name}/shadow/get/rejected
//! $aws/things/{thing_name}/shadow/update
//! $aws/things/{thing_name}/shadow/update/accepted
//! $aws/things/{thing_name}/shadow/update/rejected
//! $aws/things/{thing_name}/shadow/update/delta
//! ```

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

const PREFIX: &str = "$aws/things";

// ─── Request topics (published by the device) ───

pub fn shadow_get(thing_name: &str) -> String {
    format!("{PREFIX}/{thing_name}/shadow/get")
}

pub fn shadow_update(thing_name: &str) -> String {
    format!("{PREFIX}/{thing_name}/shadow/update")
}

// ─── Response topics (subscribed by the device) ───

pub fn shadow_get_accepted(thing_name: &str) -> String {
    format!("{PREFIX}/{thing_name}/shadow/get/accepted")
}

pub fn shadow_get_rejected(thing_name: &str) -> String {
    format!("{PREFIX}/{thing_name}/shadow/get/rejected")
}

pub fn shadow_update_accepted(thing_name: &str) -> String {
    format!("{PREFIX}/{thing_name}/shadow/update/accepted")
}

pub fn shadow_update_rejected(thing_name: &str) -> String {
    format!("{PREFIX}/{thing_name}/shadow/update/rejected")
}

pub fn shadow_update_delta(thing_name: &str) -> String {
    format!("{PREFIX}/{thing_name}/shadow/update/delta")
}

/// The five response topics a shadow session listens on.
pub fn shadow_response_topics(thing_name: &str) -> [String; 5] {
    [
        shadow_get_accepted(thing_name),
        shadow_get_rejected(thing_name),
        shadow_update_accepted(thing_name),
        shadow_update_rejected(thing_name),
        shadow_update_delta(thing_name),
    ]
}

// ─── Topic classification ───

/// Which shadow response topic a message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowTopic {
    GetAccepted,
    GetRejected,
    UpdateAccepted,
    UpdateRejected,
    Delta,
}

/// Classify a topic by its shadow suffix.
///
/// Suffix matching is sufficient: the five response suffixes are mutually
/// exclusive. Returns `None` for anything that is not a shadow response
/// topic (generic exploration traffic).
pub fn classify_suffix(topic: &str) -> Option<ShadowTopic> {
    if topic.ends_with("/shadow/get/accepted") {
        Some(ShadowTopic::GetAccepted)
    } else if topic.ends_with("/shadow/get/rejected") {
        Some(ShadowTopic::GetRejected)
    } else if topic.ends_with("/shadow/update/accepted") {
        Some(ShadowTopic::UpdateAccepted)
    } else if topic.ends_with("/shadow/update/rejected") {
        Some(ShadowTopic::UpdateRejected)
    } else if topic.ends_with("/shadow/update/delta") {
        Some(ShadowTopic::Delta)
    } else {
        None
    }
}

// ─── Validation ───

static THING_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

static USER_TOPIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_/+-]+$").unwrap());

/// A thing name that failed validation.
///
/// Thing names end up in topic strings and filesystem paths, so they are
/// checked before either is constructed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid thing name {0:?}: must match [A-Za-z0-9_-]+")]
pub struct InvalidThingName(pub String);

/// Validate a thing name against the restrictive identifier pattern.
pub fn validate_thing_name(name: &str) -> Result<(), InvalidThingName> {
    if THING_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(InvalidThingName(name.to_string()))
    }
}

/// Check a user-supplied exploration topic against the allow-list before
/// it is handed to the transport. Shadow topics are built from constants
/// and bypass this (they contain `$`).
pub fn is_valid_user_topic(topic: &str) -> bool {
    USER_TOPIC_RE.is_match(topic)
}
