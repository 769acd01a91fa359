//! Reconciliation between cloud-desired and local device state.
//!
//! `reconcile` is pure — it only computes a `Diff`. Making the change is a
//! separate `apply` call, so an interactive caller can put a confirmation
//! step between the two and an automated caller can skip it without
//! touching the engine.

use std::collections::BTreeMap;

use serde::Serialize;

use sx_mqtt_channel::Channel;

use crate::error::{ExplorerError, ExplorerResult};
use crate::shadow::ShadowClient;
use crate::state_store::{LocalState, StateStore};

/// One diverging key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    /// Local value — `None` when the key does not exist locally.
    pub local: Option<serde_json::Value>,
    pub desired: serde_json::Value,
}

/// Keys where desired state disagrees with local state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diff {
    entries: BTreeMap<String, Mismatch>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<&Mismatch> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Mismatch)> {
        self.entries.iter()
    }
}

/// Compare incoming desired state against local state.
///
/// Comparison is strict value + type equality: numeric `25` and string
/// `"25"` differ — type drift is a reportable condition, never silently
/// coerced. An empty diff means the states already converge, which is what
/// makes redelivered deltas no-ops.
pub fn reconcile(incoming: &serde_json::Value, local: &LocalState) -> Diff {
    let Some(map) = incoming.as_object() else {
        if !incoming.is_null() {
            tracing::warn!("non-object desired state ignored");
        }
        return Diff::default();
    };

    let mut entries = BTreeMap::new();
    for (key, desired) in map {
        let local_value = local.values.get(key);
        if local_value != Some(desired) {
            entries.insert(
                key.clone(),
                Mismatch {
                    local: local_value.cloned(),
                    desired: desired.clone(),
                },
            );
        }
    }
    Diff { entries }
}

/// Merge a diff into local state, persist it, and report the result as the
/// shadow's `reported` state — closing the loop:
/// get|delta → reconcile → apply → report → update/accepted.
pub async fn apply<C: Channel>(
    diff: &Diff,
    store: &StateStore,
    shadow: &ShadowClient<'_, C>,
) -> ExplorerResult<LocalState> {
    let mut state = store.load_or_empty();
    for (key, mismatch) in diff.iter() {
        state.values.insert(key.clone(), mismatch.desired.clone());
    }
    store.save(&mut state)?;
    shadow
        .report_state(&state)
        .await
        .map_err(|e| ExplorerError::Mqtt(e.to_string()))?;
    Ok(state)
}
