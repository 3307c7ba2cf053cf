//! Process-wide engine state (spec §3 "EngineState") and the `get_status`
//! aggregate (spec §6, SPEC_FULL §10.5).

use serde::{Deserialize, Serialize};

use crate::interaction::Interaction;
use crate::url::ActiveUrl;

/// Process-wide state: the interaction log, the URL registry, the
/// monotonic interaction counter, and the opaque filter the UI owns but
/// which is persisted here for cross-tab sync (spec §3).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EngineState {
    /// Append-only except for deletes.
    pub interactions: Vec<Interaction>,
    pub active_urls: Vec<ActiveUrl>,
    /// Monotonic integer; next interaction uses this value then increments it.
    pub interaction_counter: u64,
    /// Opaque string owned by the UI.
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub filter_enabled: bool,
    /// Session-only: not part of the persisted file.
    #[serde(skip)]
    pub selected_row_id: Option<String>,
}

/// Aggregate status surfaced by `get_status` (spec §6).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineStatus {
    pub is_started: bool,
    pub interaction_count: usize,
    /// Internal event sequence counter (SPEC_FULL §10.5), useful for
    /// host-side polling-for-new-data UIs.
    pub event_sequence: u64,
}
