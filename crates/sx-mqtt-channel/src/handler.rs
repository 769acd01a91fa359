//! Inbound message classification for shadow sessions.
//!
//! Decodes raw MQTT publishes once, at the boundary, into typed
//! `ShadowMessage` variants so the dispatch loop can match exhaustively
//! instead of string-testing topics.

use rumqttc::Publish;

use sx_protocol::shadows::{DeltaEvent, ErrorResponse, ShadowDocument, UpdateAck};
use sx_protocol::topics::{self, ShadowTopic};

/// A classified inbound message.
#[derive(Debug)]
pub enum ShadowMessage {
    /// Full shadow document in answer to a `get`.
    GetAccepted(ShadowDocument),
    /// `get/rejected` with code 404: the shadow has not been created yet.
    /// The bootstrap flow relies on this — it is not an error.
    ShadowAbsent(ErrorResponse),
    /// `get/rejected` with any other code.
    GetRejected(ErrorResponse),
    /// The broker accepted an update this session (or a peer) published.
    UpdateAccepted(UpdateAck),
    /// The broker rejected an update. Surfaced to the caller, no retry.
    UpdateRejected(ErrorResponse),
    /// Desired state diverged from reported.
    Delta(DeltaEvent),
    /// Not a shadow response topic, or an undecodable payload — generic
    /// exploration traffic, printed rather than reconciled.
    General { topic: String, payload: Vec<u8> },
}

/// Classify a raw MQTT publish into a typed shadow message.
///
/// Topic-suffix matching is sufficient (the five response suffixes are
/// mutually exclusive); payloads that fail to decode degrade to `General`.
pub fn classify(publish: &Publish) -> ShadowMessage {
    let topic = &publish.topic;
    let payload = &publish.payload;

    let Some(kind) = topics::classify_suffix(topic) else {
        return general(topic, payload);
    };

    match kind {
        ShadowTopic::GetAccepted => match serde_json::from_slice::<ShadowDocument>(payload) {
            Ok(doc) => ShadowMessage::GetAccepted(doc),
            Err(_) => general(topic, payload),
        },
        ShadowTopic::GetRejected => match serde_json::from_slice::<ErrorResponse>(payload) {
            Ok(err) if err.is_shadow_absent() => ShadowMessage::ShadowAbsent(err),
            Ok(err) => ShadowMessage::GetRejected(err),
            Err(_) => general(topic, payload),
        },
        ShadowTopic::UpdateAccepted => match serde_json::from_slice::<UpdateAck>(payload) {
            Ok(ack) => ShadowMessage::UpdateAccepted(ack),
            Err(_) => general(topic, payload),
        },
        ShadowTopic::UpdateRejected => match serde_json::from_slice::<ErrorResponse>(payload) {
            Ok(err) => ShadowMessage::UpdateRejected(err),
            Err(_) => general(topic, payload),
        },
        ShadowTopic::Delta => match serde_json::from_slice::<DeltaEvent>(payload) {
            Ok(delta) => ShadowMessage::Delta(delta),
            Err(_) => general(topic, payload),
        },
    }
}

fn general(topic: &str, payload: &[u8]) -> ShadowMessage {
    ShadowMessage::General {
        topic: topic.to_string(),
        payload: payload.to_vec(),
    }
}
