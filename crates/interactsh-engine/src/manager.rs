//! The Multi-Server Manager and External Interface Facade (spec §4.4,
//! §4.5): owns every [`ProtocolClient`], the active-URL registry, the
//! interaction log, and attributes incoming interactions to minted URLs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use interactsh_crypto::RsaKeys;
use interactsh_protocol::{ClientError, InteractionEvent, ProtocolClient};
use interactsh_store::SessionStore;
use interactsh_types::error::{ConfigurationError, ProtocolError};
use interactsh_types::interaction::mint_unique_id;
use interactsh_types::keypair::KeypairOrigin;
use interactsh_types::{ActiveUrl, EngineConfig, EngineError, EngineEvent, EngineState, EngineStatus, Interaction};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::events::EventBus;

/// Owns every live [`ProtocolClient`], the URL registry, the interaction
/// log, and the event bus a host subscribes to. Generic over the
/// persistence backend so tests can swap in an in-memory store.
pub struct Manager<S: SessionStore + 'static> {
    store: Arc<S>,
    http: reqwest::Client,
    keys: Mutex<Option<Arc<RsaKeys>>>,
    config: Mutex<Option<EngineConfig>>,
    clients: Mutex<HashMap<String, Arc<ProtocolClient>>>,
    state: Mutex<EngineState>,
    events: EventBus,
    interaction_tx: mpsc::UnboundedSender<InteractionEvent>,
    expired_tx: mpsc::UnboundedSender<String>,
    ingest_task: Mutex<Option<JoinHandle<()>>>,
}

impl<S: SessionStore + 'static> Manager<S> {
    /// Construct a manager around a persistence backend and a host-supplied
    /// HTTPS client (spec §1 Non-goals: the engine does not implement a TLS
    /// stack of its own). Spawns the background ingest task that drains
    /// interactions and expiry notices posted by each client's independent
    /// polling loop (spec §9: clients hold a channel handle back to the
    /// manager, never a strong back-reference).
    pub fn new(store: S, http: reqwest::Client) -> Arc<Self> {
        let (interaction_tx, interaction_rx) = mpsc::unbounded_channel();
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();

        let manager = Arc::new(Self {
            store: Arc::new(store),
            http,
            keys: Mutex::new(None),
            config: Mutex::new(None),
            clients: Mutex::new(HashMap::new()),
            state: Mutex::new(EngineState::default()),
            events: EventBus::new(1024),
            interaction_tx,
            expired_tx,
            ingest_task: Mutex::new(None),
        });

        let ingest_handle = tokio::spawn(Arc::clone(&manager).run_ingest(interaction_rx, expired_rx));
        *manager.ingest_task.lock().expect("ingest_task mutex poisoned") = Some(ingest_handle);
        manager
    }

    /// Subscribe to events emitted by the engine (spec §6).
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    // ---- start / stop (spec §4.4, §6) ----------------------------------

    /// Load the persisted keypair and non-confidential state, and restore
    /// every persisted session (spec §4.4 `start`).
    pub async fn start(&self, config: EngineConfig) -> Result<(), EngineError> {
        config.validate()?;
        if self.keys.lock().expect("keys mutex poisoned").is_some() {
            return Err(ConfigurationError::AlreadyStarted.into());
        }

        let (keys, origin) = self.store.load_or_generate_keypair().await?;
        let keys = Arc::new(keys);

        let persisted_state = self.store.load_state().await?;
        *self.state.lock().expect("state mutex poisoned") = persisted_state;
        *self.keys.lock().expect("keys mutex poisoned") = Some(Arc::clone(&keys));
        *self.config.lock().expect("config mutex poisoned") = Some(config.clone());

        if origin == KeypairOrigin::Resumed {
            let sessions = self.store.load_sessions().await?;
            for session in sessions {
                let server_url = session.server_url.clone();
                let client = Arc::new(ProtocolClient::resume(
                    session,
                    Arc::clone(&keys),
                    self.http.clone(),
                    &config,
                    self.interaction_tx.clone(),
                    self.expired_tx.clone(),
                ));
                match client.start_polling() {
                    Ok(()) => {
                        self.clients
                            .lock()
                            .expect("clients mutex poisoned")
                            .insert(server_url.clone(), client);
                        info!(server = %server_url, "resumed session and restarted polling");
                    }
                    Err(e) => {
                        warn!(server = %server_url, error = %e, "failed to resume session, deleting it");
                        if let Err(e) = self.store.delete_session(&server_url).await {
                            warn!(server = %server_url, error = %e, "failed to delete unrestorable session");
                        }
                    }
                }
            }
        }

        info!("interaction client engine started");
        Ok(())
    }

    /// Stop every client's polling loop, then close each one. Idempotent
    /// (spec §5, §8): calling `stop` when not started is a no-op.
    pub async fn stop(&self) -> Result<(), EngineError> {
        if self.keys.lock().expect("keys mutex poisoned").is_none() {
            return Ok(());
        }

        let clients: Vec<Arc<ProtocolClient>> = self
            .clients
            .lock()
            .expect("clients mutex poisoned")
            .drain()
            .map(|(_, client)| client)
            .collect();

        for client in clients {
            if let Err(e) = client.stop_polling().await {
                warn!(server = %client.server_url(), error = %e, "failed to stop polling cleanly");
            }
            if let Err(e) = client.close().await {
                warn!(server = %client.server_url(), error = %e, "failed to deregister cleanly");
            }
        }

        *self.keys.lock().expect("keys mutex poisoned") = None;
        *self.config.lock().expect("config mutex poisoned") = None;
        info!("interaction client engine stopped");
        Ok(())
    }

    // ---- URL minting (spec §4.4 `generate_url`) -------------------------

    pub async fn generate_url(
        &self,
        server_url: &str,
        tag: Option<String>,
    ) -> Result<(String, String), EngineError> {
        let (keys, config) = self.started_context()?;
        let client = self.get_or_register_client(server_url, &keys, &config).await?;

        let (url, unique_id) = client
            .generate_url()
            .map_err(Into::<interactsh_types::EngineError>::into)?;

        let active_url = ActiveUrl {
            url: url.clone(),
            unique_id: unique_id.clone(),
            created_at: now_ms(),
            is_active: true,
            server_url: server_url.to_string(),
            tag,
        };
        self.state
            .lock()
            .expect("state mutex poisoned")
            .active_urls
            .push(active_url);
        self.persist_state().await?;
        self.events.emit(EngineEvent::UrlGenerated(url.clone()));
        Ok((url, unique_id))
    }

    async fn get_or_register_client(
        &self,
        server_url: &str,
        keys: &Arc<RsaKeys>,
        config: &EngineConfig,
    ) -> Result<Arc<ProtocolClient>, EngineError> {
        if let Some(client) = self
            .clients
            .lock()
            .expect("clients mutex poisoned")
            .get(server_url)
            .cloned()
        {
            return Ok(client);
        }

        let client = ProtocolClient::register_new(
            server_url.to_string(),
            Arc::clone(keys),
            self.http.clone(),
            config,
            self.interaction_tx.clone(),
            self.expired_tx.clone(),
        )
        .await
        .map_err(Into::<interactsh_types::EngineError>::into)?;
        let client = Arc::new(client);

        self.store.save_session(&client.session()).await?;
        client
            .start_polling()
            .map_err(Into::<interactsh_types::EngineError>::into)?;

        self.clients
            .lock()
            .expect("clients mutex poisoned")
            .insert(server_url.to_string(), Arc::clone(&client));
        Ok(client)
    }

    // ---- polling (spec §4.4 `poll`) -------------------------------------

    /// Force one poll pass on every client. Expired clients are removed
    /// after the pass; `DataChanged` fires at most once, only if `notify`
    /// is set and the interaction log actually grew (spec §4.4).
    pub async fn poll(&self, notify: bool) -> Result<(), EngineError> {
        self.started_context()?;

        let clients: Vec<Arc<ProtocolClient>> = self
            .clients
            .lock()
            .expect("clients mutex poisoned")
            .values()
            .cloned()
            .collect();

        let mut expired = Vec::new();
        let mut grew = false;

        for client in &clients {
            match client.force_poll().await {
                Ok(items) => {
                    for raw in items {
                        if self.attribute_and_append(raw, client.server_url()).await {
                            grew = true;
                        }
                    }
                }
                Err(ClientError::Protocol(ProtocolError::SessionExpired)) => {
                    expired.push(client.server_url().to_string());
                }
                Err(e) => {
                    warn!(server = %client.server_url(), error = %e, "poll failed");
                }
            }
        }

        for server_url in expired {
            self.remove_expired_client(&server_url).await;
        }

        if notify && grew {
            self.events.emit(EngineEvent::DataChanged);
        }
        Ok(())
    }

    /// Eagerly construct and register a client for each server (spec §4.4
    /// `initialize_clients`), in parallel; per-server failures are logged
    /// and do not abort the batch. Returns the count of successes.
    pub async fn initialize_clients(&self, server_urls: Vec<String>) -> Result<usize, EngineError> {
        let (keys, config) = self.started_context()?;

        let mut handles = Vec::with_capacity(server_urls.len());
        for server_url in server_urls {
            let keys = Arc::clone(&keys);
            let config = config.clone();
            let http = self.http.clone();
            let interaction_tx = self.interaction_tx.clone();
            let expired_tx = self.expired_tx.clone();
            handles.push(tokio::spawn(async move {
                ProtocolClient::register_new(
                    server_url.clone(),
                    keys,
                    http,
                    &config,
                    interaction_tx,
                    expired_tx,
                )
                .await
                .map(|client| (server_url, client))
            }));
        }

        let mut successes = 0usize;
        for handle in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, "client initialization task panicked");
                    continue;
                }
            };
            match outcome {
                Ok((server_url, client)) => {
                    let client = Arc::new(client);
                    if let Err(e) = self.store.save_session(&client.session()).await {
                        warn!(server = %server_url, error = %e, "failed to persist session");
                    }
                    if let Err(e) = client.start_polling() {
                        warn!(server = %server_url, error = %e, "failed to start polling newly initialized client");
                        continue;
                    }
                    self.clients
                        .lock()
                        .expect("clients mutex poisoned")
                        .insert(server_url, client);
                    successes += 1;
                }
                Err(e) => {
                    warn!(error = %e, "failed to initialize client");
                }
            }
        }
        Ok(successes)
    }

    pub fn get_client_count(&self) -> usize {
        self.clients.lock().expect("clients mutex poisoned").len()
    }

    // ---- interaction log (spec §3, §4.4, §6) ----------------------------

    pub fn get_interactions(&self) -> Vec<Interaction> {
        self.state.lock().expect("state mutex poisoned").interactions.clone()
    }

    pub fn get_new_interactions(&self, since_index: usize) -> Vec<Interaction> {
        let state = self.state.lock().expect("state mutex poisoned");
        state
            .interactions
            .get(since_index..)
            .map(|slice| slice.to_vec())
            .unwrap_or_default()
    }

    pub async fn delete_interaction(&self, unique_id: &str) -> Result<usize, EngineError> {
        let removed = {
            let mut state = self.state.lock().expect("state mutex poisoned");
            let before = state.interactions.len();
            state.interactions.retain(|i| i.unique_id != unique_id);
            before - state.interactions.len()
        };
        if removed > 0 {
            self.persist_state().await?;
            self.events.emit(EngineEvent::DataChanged);
        }
        Ok(removed)
    }

    pub async fn delete_interactions(&self, unique_ids: &[String]) -> Result<usize, EngineError> {
        let removed = {
            let mut state = self.state.lock().expect("state mutex poisoned");
            let before = state.interactions.len();
            state
                .interactions
                .retain(|i| !unique_ids.iter().any(|uid| uid == &i.unique_id));
            before - state.interactions.len()
        };
        if removed > 0 {
            self.persist_state().await?;
            self.events.emit(EngineEvent::DataChanged);
        }
        Ok(removed)
    }

    pub async fn clear_interactions(&self) -> Result<(), EngineError> {
        self.state.lock().expect("state mutex poisoned").interactions.clear();
        self.persist_state().await?;
        self.events.emit(EngineEvent::DataChanged);
        Ok(())
    }

    pub async fn clear_all_data(&self) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock().expect("state mutex poisoned");
            state.interactions.clear();
            state.active_urls.clear();
            state.interaction_counter = 0;
        }
        self.persist_state().await?;
        self.events.emit(EngineEvent::DataChanged);
        self.events.emit(EngineEvent::UrlsChanged);
        Ok(())
    }

    pub async fn set_interaction_tag(&self, unique_id: &str, tag: Option<String>) -> Result<bool, EngineError> {
        let found = {
            let mut state = self.state.lock().expect("state mutex poisoned");
            match state.interactions.iter_mut().find(|i| i.unique_id == unique_id) {
                Some(interaction) => {
                    interaction.tag = tag;
                    true
                }
                None => false,
            }
        };
        if found {
            self.persist_state().await?;
            self.events.emit(EngineEvent::DataChanged);
        }
        Ok(found)
    }

    // ---- URL registry (spec §3, §4.4, §6) -------------------------------

    pub fn get_active_urls(&self) -> Vec<ActiveUrl> {
        self.state.lock().expect("state mutex poisoned").active_urls.clone()
    }

    /// Idempotent: calling twice with the same `is_active` value leaves
    /// state unchanged and emits at most one event across the pair (spec
    /// §8).
    pub async fn set_url_active(&self, unique_id: &str, is_active: bool) -> Result<bool, EngineError> {
        let changed = {
            let mut state = self.state.lock().expect("state mutex poisoned");
            match state.active_urls.iter_mut().find(|u| u.unique_id == unique_id) {
                Some(url) if url.is_active == is_active => Some(false),
                Some(url) => {
                    url.is_active = is_active;
                    Some(true)
                }
                None => None,
            }
        };
        match changed {
            None => Ok(false),
            Some(false) => Ok(true),
            Some(true) => {
                self.persist_state().await?;
                self.events.emit(EngineEvent::UrlsChanged);
                Ok(true)
            }
        }
    }

    pub async fn remove_url(&self, unique_id: &str) -> Result<bool, EngineError> {
        let removed = {
            let mut state = self.state.lock().expect("state mutex poisoned");
            let before = state.active_urls.len();
            state.active_urls.retain(|u| u.unique_id != unique_id);
            before != state.active_urls.len()
        };
        if removed {
            self.persist_state().await?;
            self.events.emit(EngineEvent::UrlsChanged);
        }
        Ok(removed)
    }

    pub async fn clear_urls(&self) -> Result<(), EngineError> {
        self.state.lock().expect("state mutex poisoned").active_urls.clear();
        self.persist_state().await?;
        self.events.emit(EngineEvent::UrlsChanged);
        Ok(())
    }

    // ---- filter / selection (spec §4.4, §6; opaque passthrough) --------

    pub async fn set_filter(&self, filter: String) -> Result<(), EngineError> {
        self.state.lock().expect("state mutex poisoned").filter = filter.clone();
        self.persist_state().await?;
        self.events.emit(EngineEvent::FilterChanged(filter));
        Ok(())
    }

    pub fn get_filter(&self) -> String {
        self.state.lock().expect("state mutex poisoned").filter.clone()
    }

    pub async fn set_filter_enabled(&self, enabled: bool) -> Result<(), EngineError> {
        self.state.lock().expect("state mutex poisoned").filter_enabled = enabled;
        self.persist_state().await?;
        self.events.emit(EngineEvent::FilterEnabledChanged(enabled));
        Ok(())
    }

    pub fn get_filter_enabled(&self) -> bool {
        self.state.lock().expect("state mutex poisoned").filter_enabled
    }

    pub fn set_selected_row_id(&self, row_id: Option<String>) {
        self.state.lock().expect("state mutex poisoned").selected_row_id = row_id.clone();
        self.events.emit(EngineEvent::RowSelected(row_id));
    }

    pub fn get_selected_row_id(&self) -> Option<String> {
        self.state.lock().expect("state mutex poisoned").selected_row_id.clone()
    }

    // ---- status (spec §6) -----------------------------------------------

    pub fn get_status(&self) -> EngineStatus {
        EngineStatus {
            is_started: self.keys.lock().expect("keys mutex poisoned").is_some(),
            interaction_count: self.state.lock().expect("state mutex poisoned").interactions.len(),
            event_sequence: self.events.sequence(),
        }
    }

    // ---- internals --------------------------------------------------------

    fn started_context(&self) -> Result<(Arc<RsaKeys>, EngineConfig), EngineError> {
        let keys = self
            .keys
            .lock()
            .expect("keys mutex poisoned")
            .clone()
            .ok_or(ConfigurationError::NotStarted)?;
        let config = self
            .config
            .lock()
            .expect("config mutex poisoned")
            .clone()
            .ok_or(ConfigurationError::NotStarted)?;
        Ok((keys, config))
    }

    async fn persist_state(&self) -> Result<(), EngineError> {
        let snapshot = self.state.lock().expect("state mutex poisoned").clone();
        self.store.save_state(&snapshot).await?;
        Ok(())
    }

    /// Attribute one decrypted interaction to its minted URL, append it to
    /// the log, and persist — but do not emit an event; callers decide
    /// the event policy (spec §4.4 `on_interaction` vs. batched `poll`).
    /// Returns whether an interaction was actually appended.
    async fn attribute_and_append(&self, raw: serde_json::Value, server_url: &str) -> bool {
        let full_id = match raw.get("full-id").and_then(|v| v.as_str()) {
            Some(id) => id.to_string(),
            None => {
                warn!(server = %server_url, "interaction payload missing full-id, dropping");
                return false;
            }
        };

        // Match the url and append the interaction under a single lock
        // acquisition so a concurrent remove_url/set_url_active/clear_urls
        // cannot run between the match and the append.
        let appended = {
            let mut state = self.state.lock().expect("state mutex poisoned");
            let Some(active_url) = crate::attribution::find_matching_url(&state.active_urls, &full_id).cloned() else {
                debug!(server = %server_url, full_id = %full_id, "no minted url matches, dropping");
                return false;
            };
            if !active_url.is_active {
                debug!(unique_id = %active_url.unique_id, "matched url is disabled, dropping");
                return false;
            }

            let counter = state.interaction_counter;
            state.interaction_counter += 1;
            let interaction = Interaction {
                protocol: raw
                    .get("protocol")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_lowercase(),
                unique_id: mint_unique_id(now_ms(), counter),
                full_id,
                q_type: raw.get("q-type").and_then(|v| v.as_str()).map(str::to_string),
                raw_request: raw.get("raw-request").and_then(|v| v.as_str()).map(str::to_string),
                raw_response: raw.get("raw-response").and_then(|v| v.as_str()).map(str::to_string),
                remote_address: raw.get("remote-address").and_then(|v| v.as_str()).map(str::to_string),
                timestamp: chrono::Utc::now().to_rfc3339(),
                tag: active_url.tag.clone(),
                server_url: active_url.server_url.clone(),
            };
            state.interactions.push(interaction);
            true
        };

        if appended {
            if let Err(e) = self.persist_state().await {
                error!(error = %e, "failed to persist state after interaction");
            }
        }
        appended
    }

    /// The callback path for interactions delivered by a client's
    /// autonomous background polling loop (spec §4.4 `on_interaction`):
    /// unlike `poll`, every appended interaction emits its own
    /// `DataChanged` immediately.
    async fn ingest_interaction(&self, raw: serde_json::Value, server_url: &str) {
        if self.attribute_and_append(raw, server_url).await {
            self.events.emit(EngineEvent::DataChanged);
        }
    }

    async fn remove_expired_client(&self, server_url: &str) {
        self.clients.lock().expect("clients mutex poisoned").remove(server_url);
        if let Err(e) = self.store.delete_session(server_url).await {
            warn!(server = %server_url, error = %e, "failed to delete expired session from persistence");
        }
        info!(server = %server_url, "removed expired client");
    }

    async fn run_ingest(
        self: Arc<Self>,
        mut interaction_rx: mpsc::UnboundedReceiver<InteractionEvent>,
        mut expired_rx: mpsc::UnboundedReceiver<String>,
    ) {
        loop {
            tokio::select! {
                event = interaction_rx.recv() => {
                    match event {
                        Some(event) => self.ingest_interaction(event.raw, &event.server_url).await,
                        None => break,
                    }
                }
                server_url = expired_rx.recv() => {
                    match server_url {
                        Some(server_url) => self.remove_expired_client(&server_url).await,
                        None => break,
                    }
                }
            }
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
