//! An observed external hit (spec §3 "Interaction").

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Interaction {
    /// Lowercased protocol name: "http", "dns", "smtp", …
    pub protocol: String,
    /// Engine-minted monotonic id: `int_<ms>_<counter>`.
    pub unique_id: String,
    /// The server-provided correlation payload this hit was attributed by.
    pub full_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_address: Option<String>,
    /// ISO-8601 timestamp.
    pub timestamp: String,
    /// Copied from the attributing ActiveUrl at ingestion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Copied from the attributing ActiveUrl.
    pub server_url: String,
}

/// Mint a monotonic interaction id of the form `int_<ms>_<counter>`.
pub fn mint_unique_id(now_ms: i64, counter: u64) -> String {
    format!("int_{now_ms}_{counter}")
}
