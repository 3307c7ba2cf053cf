//! Events the engine emits back to the host (spec §6).

use serde::{Deserialize, Serialize};

/// Events emitted to the host. Mirrors the table in spec §6 exactly.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum EngineEvent {
    /// The interaction log or URL registry changed.
    DataChanged,
    /// A new URL was minted.
    UrlGenerated(String),
    /// The opaque filter string changed.
    FilterChanged(String),
    /// The filter-enabled flag changed.
    FilterEnabledChanged(bool),
    /// The active-URL registry changed (mint, enable/disable, remove, clear).
    UrlsChanged,
    /// The selected row changed.
    RowSelected(Option<String>),
}
