//! A minted subdomain the engine is listening for (spec §3 "ActiveUrl").

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveUrl {
    /// The full `https://<unique_id>.<server_host>` URL.
    pub url: String,
    /// correlation_id concatenated with a fresh nonce (spec invariant:
    /// begins with the correlation_id of the corresponding session).
    pub unique_id: String,
    /// Unix epoch milliseconds at mint time.
    pub created_at: i64,
    /// Whether interactions targeting this URL are still attributed.
    pub is_active: bool,
    /// Back-reference to the owning `ClientSession::server_url`.
    pub server_url: String,
    /// Opaque tag, stored but never interpreted by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}
