//! Interactsh v1 wire-format request/response bodies (spec §6).

use serde::{Deserialize, Serialize};

/// `POST /register` request body.
#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    #[serde(rename = "public-key")]
    pub public_key: &'a str,
    #[serde(rename = "secret-key")]
    pub secret_key: &'a str,
    #[serde(rename = "correlation-id")]
    pub correlation_id: &'a str,
}

/// `GET /poll` response body.
#[derive(Debug, Deserialize)]
pub struct PollResponse {
    #[serde(default)]
    pub data: Vec<String>,
    #[serde(default, rename = "aes_key")]
    pub aes_key: String,
}

/// `POST /deregister` request body.
#[derive(Debug, Serialize)]
pub struct DeregisterRequest<'a> {
    #[serde(rename = "correlationID")]
    pub correlation_id: &'a str,
    #[serde(rename = "secretKey")]
    pub secret_key: &'a str,
}
