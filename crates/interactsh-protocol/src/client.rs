//! The per-server Protocol Client (spec §4.2).
//!
//! Owns exactly one [`ClientSession`] and speaks the Interactsh v1 wire
//! protocol against exactly one server: register (new sessions only), a
//! cancellable background poll loop, `force_poll`, `generate_url`, and
//! close/deregister.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use interactsh_crypto::RsaKeys;
use interactsh_types::error::{ProtocolError, StateError};
use interactsh_types::{ClientSession, EngineConfig};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::state::ClientState;
use crate::wire::{DeregisterRequest, PollResponse, RegisterRequest};
use crate::ClientError;

/// A decrypted, parsed interaction plus the server it arrived from, handed
/// to the Multi-Server Manager over a channel rather than through a
/// back-reference (spec §9 "Cross-component references").
pub struct InteractionEvent {
    pub raw: serde_json::Value,
    pub server_url: String,
}

pub struct ProtocolClient {
    server_url: String,
    server_host: String,
    scheme: &'static str,
    http: reqwest::Client,
    keys: Arc<RsaKeys>,
    session: ClientSession,
    polling_interval: Duration,
    nonce_length: usize,
    state: Mutex<ClientState>,
    cancel: Mutex<Option<watch::Sender<()>>>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    interaction_tx: mpsc::UnboundedSender<InteractionEvent>,
    expired_tx: mpsc::UnboundedSender<String>,
    /// Serializes `force_poll` against the background loop's own iteration
    /// so at most one `/poll` round trip for this session is ever in
    /// flight (spec §5).
    poll_lock: tokio::sync::Mutex<()>,
}

/// Splits an optional `http://`/`https://` prefix off a server identifier.
/// Bare hosts (the production case, e.g. `oast.site`) default to `https`;
/// a caller that needs a different scheme (tests pointing at a plain-HTTP
/// `wiremock::MockServer`) passes it explicitly in `server_url`.
fn split_scheme(server_url: &str) -> (&'static str, &str) {
    if let Some(host) = server_url.strip_prefix("https://") {
        ("https", host)
    } else if let Some(host) = server_url.strip_prefix("http://") {
        ("http", host)
    } else {
        ("https", server_url)
    }
}

impl ProtocolClient {
    /// Register a brand-new session with `server_url` (spec §4.2
    /// "New session"). Performs the `/register` round trip.
    pub async fn register_new(
        server_url: String,
        keys: Arc<RsaKeys>,
        http: reqwest::Client,
        config: &EngineConfig,
        interaction_tx: mpsc::UnboundedSender<InteractionEvent>,
        expired_tx: mpsc::UnboundedSender<String>,
    ) -> Result<Self, ClientError> {
        let correlation_id =
            interactsh_crypto::generate_random_id(config.correlation_id_length, false);
        let secret_key =
            interactsh_crypto::generate_random_id(config.correlation_id_nonce_length, false);
        let session = ClientSession::new(
            server_url.clone(),
            correlation_id,
            secret_key,
            config.token.clone(),
        );

        let public_key_bytes = keys
            .export_public_key_pem()
            .map_err(|e| ProtocolError::RegistrationFailed(format!("key export failed: {e}")))?;
        let public_key = String::from_utf8(public_key_bytes)
            .map_err(|e| ProtocolError::RegistrationFailed(format!("non-utf8 PEM: {e}")))?;

        let body = RegisterRequest {
            public_key: &public_key,
            secret_key: &session.secret_key,
            correlation_id: &session.correlation_id,
        };

        let (scheme, host) = split_scheme(&server_url);
        let url = format!("{scheme}://{host}/register");
        let mut req = http.post(&url).json(&body);
        if let Some(token) = &session.token {
            req = req.header("Authorization", token);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ProtocolError::RegistrationFailed(e.to_string()))?;
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProtocolError::RegistrationFailed(text).into());
        }

        info!(server = %server_url, "registered new Interactsh session");
        Ok(Self::build(
            server_url,
            session,
            keys,
            http,
            config,
            interaction_tx,
            expired_tx,
        ))
    }

    /// Reattach to a session restored from persistence (spec §4.2 "Resumed
    /// session"). Does NOT re-register.
    pub fn resume(
        session: ClientSession,
        keys: Arc<RsaKeys>,
        http: reqwest::Client,
        config: &EngineConfig,
        interaction_tx: mpsc::UnboundedSender<InteractionEvent>,
        expired_tx: mpsc::UnboundedSender<String>,
    ) -> Self {
        let server_url = session.server_url.clone();
        Self::build(
            server_url,
            session,
            keys,
            http,
            config,
            interaction_tx,
            expired_tx,
        )
    }

    fn build(
        server_url: String,
        session: ClientSession,
        keys: Arc<RsaKeys>,
        http: reqwest::Client,
        config: &EngineConfig,
        interaction_tx: mpsc::UnboundedSender<InteractionEvent>,
        expired_tx: mpsc::UnboundedSender<String>,
    ) -> Self {
        let (scheme, host) = split_scheme(&server_url);
        let server_host = host.to_string();
        Self {
            server_url,
            server_host,
            scheme,
            http,
            keys,
            session,
            polling_interval: Duration::from_millis(config.polling_interval_ms),
            nonce_length: config.correlation_id_nonce_length,
            state: Mutex::new(ClientState::Idle),
            cancel: Mutex::new(None),
            poll_task: Mutex::new(None),
            interaction_tx,
            expired_tx,
            poll_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn session(&self) -> ClientSession {
        self.session.clone()
    }

    pub fn state(&self) -> ClientState {
        *self.state.lock().expect("state mutex poisoned")
    }

    /// Mint a fresh subdomain (spec §4.2 `generate_url`).
    pub fn generate_url(&self) -> Result<(String, String), ClientError> {
        if self.state() == ClientState::Closed {
            return Err(StateError::ClientClosed.into());
        }
        let nonce = interactsh_crypto::generate_random_id(self.nonce_length, false);
        let unique_id = format!("{}{}", self.session.correlation_id, nonce);
        let url = format!("{}://{unique_id}.{}", self.scheme, self.server_host);
        Ok((url, unique_id))
    }

    /// Transition Idle -> Polling and spawn the background poll loop.
    pub fn start_polling(self: &Arc<Self>) -> Result<(), ClientError> {
        let mut state = self.state.lock().expect("state mutex poisoned");
        match *state {
            ClientState::Closed => return Err(StateError::ClientClosed.into()),
            ClientState::Polling => return Err(StateError::ClientAlreadyPolling.into()),
            ClientState::Idle => {}
        }
        *state = ClientState::Polling;
        drop(state);

        let (cancel_tx, cancel_rx) = watch::channel(());
        *self.cancel.lock().expect("cancel mutex poisoned") = Some(cancel_tx);

        let client = Arc::clone(self);
        let handle = tokio::spawn(async move {
            client.polling_loop(cancel_rx).await;
        });
        *self.poll_task.lock().expect("poll_task mutex poisoned") = Some(handle);
        Ok(())
    }

    /// Idempotent: if not currently polling, this is a no-op (spec §5).
    pub async fn stop_polling(&self) -> Result<(), ClientError> {
        if self.state() != ClientState::Polling {
            return Ok(());
        }
        if let Some(tx) = self.cancel.lock().expect("cancel mutex poisoned").take() {
            let _ = tx.send(());
        }
        let handle = self
            .poll_task
            .lock()
            .expect("poll_task mutex poisoned")
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        Ok(())
    }

    /// Run one poll iteration immediately, returning the decrypted,
    /// parsed interactions from this pass directly to the caller rather
    /// than through the background channel (spec §4.2 `force_poll`): this
    /// is a direct call on the caller's own task, not the spawned polling
    /// loop, so there is no back-reference concern to avoid here. Valid
    /// only in Polling state; `SessionExpired` propagates to the caller
    /// here, unlike inside the background loop.
    pub async fn force_poll(&self) -> Result<Vec<serde_json::Value>, ClientError> {
        if self.state() != ClientState::Polling {
            return Err(StateError::ClientNotPolling.into());
        }
        match self.poll_once().await {
            Ok(items) => Ok(items),
            Err(ClientError::Protocol(ProtocolError::SessionExpired)) => {
                self.handle_session_expired();
                Err(ProtocolError::SessionExpired.into())
            }
            Err(other) => Err(other),
        }
    }

    /// Deregister and move to Closed — but only on server success (spec
    /// §4.2): a failed deregistration leaves the client in Idle so the
    /// caller may retry.
    pub async fn close(&self) -> Result<(), ClientError> {
        match self.state() {
            ClientState::Closed => return Ok(()),
            ClientState::Polling => return Err(StateError::ClientAlreadyPolling.into()),
            ClientState::Idle => {}
        }

        let body = DeregisterRequest {
            correlation_id: &self.session.correlation_id,
            secret_key: &self.session.secret_key,
        };
        let url = format!("{}://{}/deregister", self.scheme, self.server_host);
        let mut req = self.http.post(&url).json(&body);
        if let Some(token) = &self.session.token {
            req = req.header("Authorization", token);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ProtocolError::DeregistrationFailed(e.to_string()))?;
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProtocolError::DeregistrationFailed(text).into());
        }

        *self.state.lock().expect("state mutex poisoned") = ClientState::Closed;
        Ok(())
    }

    fn handle_session_expired(&self) {
        *self.state.lock().expect("state mutex poisoned") = ClientState::Idle;
        let _ = self.expired_tx.send(self.server_url.clone());
    }

    async fn polling_loop(self: Arc<Self>, mut cancel_rx: watch::Receiver<()>) {
        loop {
            match self.poll_once().await {
                Ok(items) => {
                    for raw in items {
                        let _ = self.interaction_tx.send(InteractionEvent {
                            raw,
                            server_url: self.server_url.clone(),
                        });
                    }
                }
                Err(ClientError::Protocol(ProtocolError::SessionExpired)) => {
                    info!(server = %self.server_url, "session expired, exiting poll loop");
                    self.handle_session_expired();
                    return;
                }
                Err(ClientError::Protocol(ProtocolError::AuthFailure)) => {
                    error!(server = %self.server_url, "authorization failure, exiting poll loop");
                    *self.state.lock().expect("state mutex poisoned") = ClientState::Idle;
                    return;
                }
                Err(e) => {
                    warn!(server = %self.server_url, error = %e, "transient poll error");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.polling_interval) => {}
                _ = cancel_rx.changed() => {
                    *self.state.lock().expect("state mutex poisoned") = ClientState::Idle;
                    return;
                }
            }
        }
    }

    async fn poll_once(&self) -> Result<Vec<serde_json::Value>, ClientError> {
        let _guard = self.poll_lock.lock().await;
        let url = format!("{}://{}/poll", self.scheme, self.server_host);
        let mut req = self.http.get(&url).query(&[
            ("id", self.session.correlation_id.as_str()),
            ("secret", self.session.secret_key.as_str()),
        ]);
        if let Some(token) = &self.session.token {
            req = req.header("Authorization", token);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ProtocolError::TransientPollError(e.to_string()))?;

        match response.status().as_u16() {
            200 => {
                let body: PollResponse = response
                    .json()
                    .await
                    .map_err(|e| ProtocolError::TransientPollError(e.to_string()))?;
                Ok(self.ingest_batch(body))
            }
            401 => Err(ProtocolError::AuthFailure.into()),
            400 => Err(ProtocolError::SessionExpired.into()),
            other => {
                let text = response.text().await.unwrap_or_default();
                Err(ProtocolError::TransientPollError(format!("status {other}: {text}")).into())
            }
        }
    }

    /// Decrypt and parse every item in the batch. Per-item failures are
    /// logged and skipped — a single malformed interaction never aborts
    /// the batch (spec §4.2, §7).
    fn ingest_batch(&self, body: PollResponse) -> Vec<serde_json::Value> {
        let mut parsed_items = Vec::with_capacity(body.data.len());
        for item in body.data {
            let plaintext =
                match interactsh_crypto::decrypt_interaction(&self.keys, &body.aes_key, &item) {
                    Ok(plaintext) => plaintext,
                    Err(e) => {
                        warn!(server = %self.server_url, error = %e, "failed to decrypt interaction, skipping");
                        continue;
                    }
                };
            let parsed: serde_json::Value = match serde_json::from_str(&plaintext) {
                Ok(value) => value,
                Err(e) => {
                    warn!(server = %self.server_url, error = %e, "failed to parse interaction JSON, skipping");
                    continue;
                }
            };
            debug!(server = %self.server_url, "decrypted interaction");
            parsed_items.push(parsed);
        }
        parsed_items
    }
}
