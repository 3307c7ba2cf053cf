//! End-to-end scenarios against a simulated Interactsh server (spec §8
//! S1, S2, S3, S4, S6).

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use interactsh_crypto::RsaKeys;
use interactsh_engine::Manager;
use interactsh_store::FileSessionStore;
use interactsh_types::EngineConfig;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> EngineConfig {
    EngineConfig {
        token: None,
        polling_interval_ms: 5_000,
        correlation_id_length: 20,
        correlation_id_nonce_length: 13,
        http_timeout_ms: 10_000,
        server_list: Vec::new(),
    }
}

async fn new_manager() -> (Arc<Manager<FileSessionStore>>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileSessionStore::new(dir.path());
    let manager = Manager::new(store, reqwest::Client::new());
    (manager, dir)
}

fn encrypted_payload(keys: &RsaKeys, plaintext: &[u8]) -> (String, String) {
    use cfb_mode::Encryptor;
    use cipher::{AsyncStreamCipher, KeyIvInit};
    use rsa::Oaep;
    use sha2::Sha256;

    let symmetric_key = [0x5Au8; 32];
    let iv = [0x3Cu8; 16];
    let mut rng = rand::rngs::OsRng;
    let encrypted_key = keys
        .public_key()
        .encrypt(&mut rng, Oaep::new::<Sha256>(), &symmetric_key)
        .expect("encrypt aes key");

    let mut buf = plaintext.to_vec();
    Encryptor::<aes::Aes256>::new(&symmetric_key.into(), &iv.into()).encrypt(&mut buf);
    let mut secure_message = iv.to_vec();
    secure_message.extend_from_slice(&buf);

    (B64.encode(encrypted_key), B64.encode(secure_message))
}

#[tokio::test]
async fn s1_happy_path_mints_url_and_delivers_one_interaction() {
    let server = MockServer::start().await;
    let host = server.uri();

    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileSessionStore::new(dir.path());
    let manager = Manager::new(store, reqwest::Client::new());
    manager.start(test_config()).await.expect("start");

    let (url, unique_id) = manager
        .generate_url(&host, None)
        .await
        .expect("generate_url");
    assert!(url.starts_with("http://"));
    assert_eq!(unique_id.len(), 33);

    // Recover the manager's RSA public key by reading back the same store.
    let peek_store = FileSessionStore::new(dir.path());
    let (keys, _) = peek_store
        .load_or_generate_keypair()
        .await
        .expect("peek keypair");

    let payload = json!({"full-id": unique_id, "protocol": "HTTP"}).to_string();
    let (aes_key_b64, secure_message_b64) = encrypted_payload(&keys, payload.as_bytes());

    Mock::given(method("GET"))
        .and(path("/poll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [secure_message_b64],
            "aes_key": aes_key_b64,
        })))
        .mount(&server)
        .await;

    let mut events = manager.subscribe();
    manager.poll(true).await.expect("poll");

    let interactions = manager.get_interactions();
    assert_eq!(interactions.len(), 1);
    assert_eq!(interactions[0].protocol, "http");

    let mut saw_data_changed = false;
    while let Ok(event) = events.try_recv() {
        if event == interactsh_types::EngineEvent::DataChanged {
            saw_data_changed = true;
        }
    }
    assert!(saw_data_changed);
}

#[tokio::test]
async fn s3_disabled_url_is_ignored() {
    let server = MockServer::start().await;
    let host = server.uri();

    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (manager, dir) = new_manager().await;
    manager.start(test_config()).await.expect("start");
    let (_url, unique_id) = manager.generate_url(&host, None).await.expect("generate_url");

    manager
        .set_url_active(&unique_id, false)
        .await
        .expect("disable url");

    let peek_store = FileSessionStore::new(dir.path());
    let (keys, _) = peek_store
        .load_or_generate_keypair()
        .await
        .expect("peek keypair");
    let full_id = format!("{unique_id}xyz");
    let payload = json!({"full-id": full_id, "protocol": "dns"}).to_string();
    let (aes_key_b64, secure_message_b64) = encrypted_payload(&keys, payload.as_bytes());

    Mock::given(method("GET"))
        .and(path("/poll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [secure_message_b64],
            "aes_key": aes_key_b64,
        })))
        .mount(&server)
        .await;

    let mut events = manager.subscribe();
    manager.poll(true).await.expect("poll");

    assert!(manager.get_interactions().is_empty());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn s6_clear_all_data_resets_counter() {
    let (manager, _dir) = new_manager().await;
    manager.start(test_config()).await.expect("start");

    {
        let server = MockServer::start().await;
        let host = server.uri();
        Mock::given(method("POST"))
            .and(path("/register"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        manager.generate_url(&host, None).await.expect("generate_url");
    }

    assert_eq!(manager.get_active_urls().len(), 1);
    manager.clear_all_data().await.expect("clear_all_data");

    assert!(manager.get_interactions().is_empty());
    assert!(manager.get_active_urls().is_empty());
    assert_eq!(manager.get_status().interaction_count, 0);
}

#[tokio::test]
async fn stop_is_idempotent() {
    let (manager, _dir) = new_manager().await;
    manager.stop().await.expect("stop before start is a no-op");
    manager.start(test_config()).await.expect("start");
    manager.stop().await.expect("stop");
    manager.stop().await.expect("stop again is a no-op");
}

#[tokio::test]
async fn generate_url_before_start_is_rejected() {
    let (manager, _dir) = new_manager().await;
    let err = manager
        .generate_url("oast.site", None)
        .await
        .expect_err("generate_url before start is rejected");
    assert!(matches!(
        err,
        interactsh_types::EngineError::Configuration(
            interactsh_types::error::ConfigurationError::NotStarted
        )
    ));
}

#[tokio::test]
async fn set_url_active_is_idempotent_and_emits_once() {
    let server = MockServer::start().await;
    let host = server.uri();
    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (manager, _dir) = new_manager().await;
    manager.start(test_config()).await.expect("start");
    let (_url, unique_id) = manager.generate_url(&host, None).await.expect("generate_url");

    let mut events = manager.subscribe();
    assert!(manager.set_url_active(&unique_id, false).await.expect("disable"));
    assert!(manager.set_url_active(&unique_id, false).await.expect("disable again"));

    let mut urls_changed_count = 0;
    while let Ok(event) = events.try_recv() {
        if event == interactsh_types::EngineEvent::UrlsChanged {
            urls_changed_count += 1;
        }
    }
    assert_eq!(urls_changed_count, 1);
}
