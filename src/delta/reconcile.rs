/// Submission reconciliation.
///
/// After a batch of deltas is posted, the backend answers with a
/// [`DeltaState`] hint per plugin source telling the agent how to adjust
/// its id ledger: acknowledge normally, resend, fill a gap, or throw the
/// local state away entirely. This module applies one hint to one sent
/// delta; the store drives it over the whole batch in id order and
/// performs any file clearing the outcome demands.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::delta::registry::PluginInfo;

/// Reconciliation hint returned by the backend for one plugin source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaState {
    /// The backend wants the agent to drop local state and start over
    #[serde(rename = "needsReset", default)]
    pub needs_reset: bool,
    /// Highest delta id the backend has stored for this source
    #[serde(rename = "lastStoredID", default)]
    pub last_stored_id: i64,
    /// The id the backend expects to receive next
    #[serde(rename = "sendNextID", default)]
    pub send_next_id: i64,
    /// Backend-side processing error, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Hints keyed by rendered plugin source.
pub type DeltaStateMap = HashMap<String, DeltaState>;

/// What the coordinator must do after a hint has been applied to the
/// registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintOutcome {
    /// Ledger updated (or untouched); journals stay as they are
    KeepFiles,
    /// Cache, pending, and sent files for the pair must be removed
    ClearFiles,
}

/// Apply one backend hint to the ledger of a sent delta.
///
/// `delta_id` is the id of the delta the hint was paired with. Returns
/// whether the plugin's files for this entity must be cleared. Hints are
/// expected in ascending `delta_id` order so the final `lastSentID` is
/// deterministic.
pub fn apply_hint(
    info: &mut PluginInfo,
    entity_key: &str,
    delta_id: i64,
    hint: Option<&DeltaState>,
) -> HintOutcome {
    let hint = match hint {
        None => {
            // No hint: a plain acknowledgement of everything up to this id.
            if delta_id > info.last_sent_id(entity_key) {
                info.set_last_sent_id(entity_key, delta_id);
            }
            return HintOutcome::KeepFiles;
        }
        Some(h) => h,
    };

    if let Some(err) = &hint.error {
        warn!(source = %info.source, entity = entity_key, error = %err,
            "Backend reported a delta processing error");
        return HintOutcome::KeepFiles;
    }

    if hint.needs_reset {
        debug!(source = %info.source, entity = entity_key,
            send_next = hint.send_next_id, last_stored = hint.last_stored_id,
            "Backend requested a reset");
        info.set_last_sent_id(entity_key, hint.send_next_id - 1);
        info.set_delta_id(entity_key, hint.last_stored_id);
        return HintOutcome::ClearFiles;
    }

    if hint.send_next_id == delta_id + 1 {
        // Normal acknowledgement.
        info.set_last_sent_id(entity_key, delta_id);
        HintOutcome::KeepFiles
    } else if hint.send_next_id == 0 {
        // The backend lost track of this source; it will ask for a full
        // snapshot. Ids stay as they are.
        debug!(source = %info.source, entity = entity_key,
            "Backend requested a full snapshot");
        HintOutcome::ClearFiles
    } else if hint.send_next_id == delta_id {
        // Resend requested.
        info.set_last_sent_id(entity_key, delta_id - 1);
        HintOutcome::KeepFiles
    } else {
        // The backend expects an id we cannot serve from the journal; drop
        // local state and realign the ledger with the backend's view.
        debug!(source = %info.source, entity = entity_key,
            sent = delta_id, send_next = hint.send_next_id,
            "Delta id gap, realigning with backend");
        info.set_last_sent_id(entity_key, hint.send_next_id - 1);
        info.set_delta_id(entity_key, hint.last_stored_id);
        HintOutcome::ClearFiles
    }
}
