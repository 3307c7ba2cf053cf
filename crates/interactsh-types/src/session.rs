//! Per-server protocol identity (spec §3 "ClientSession").

use serde::{Deserialize, Serialize};

/// The triple registered with one Interactsh server and persisted across
/// restarts (spec §3, GLOSSARY "Session").
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientSession {
    /// Unique key: the server this session is registered against.
    pub server_url: String,
    /// CSPRNG correlation identifier, chosen by the client.
    pub correlation_id: String,
    /// CSPRNG secret key, chosen by the client.
    pub secret_key: String,
    /// Optional bearer authorization token for this server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl ClientSession {
    pub fn new(
        server_url: impl Into<String>,
        correlation_id: impl Into<String>,
        secret_key: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            correlation_id: correlation_id.into(),
            secret_key: secret_key.into(),
            token,
        }
    }
}
