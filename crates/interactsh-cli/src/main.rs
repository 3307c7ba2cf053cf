//! interactsh-cli: a thin, uninstrumented harness around
//! `interactsh-engine` (SPEC_FULL §0). It does not implement a UI
//! surface; it exists so the engine can be exercised by hand against a
//! real or mock Interactsh server, one subcommand per process.
//!
//! Usage:
//!   interactsh-cli start
//!   interactsh-cli generate-url <server> [tag]
//!   interactsh-cli poll
//!   interactsh-cli status

use std::path::PathBuf;
use std::time::Duration;

use interactsh_engine::Manager;
use interactsh_store::FileSessionStore;
use interactsh_types::EngineConfig;
use tracing::info;

fn print_usage() {
    eprintln!(
        "usage: interactsh-cli <start|generate-url <server> [tag]|poll|status>\n\n\
         environment:\n\
         \x20\x20INTERACTSH_DATA_DIR        persisted session directory (default: ~/.interactsh-client)\n\
         \x20\x20INTERACTSH_TOKEN           bearer token sent to the server\n\
         \x20\x20INTERACTSH_POLL_INTERVAL_MS background polling interval\n\
         \x20\x20INTERACTSH_HTTP_TIMEOUT_MS  HTTP request timeout"
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("interactsh=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        print_usage();
        std::process::exit(1);
    };

    let config = load_config();
    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.http_timeout_ms))
        .build()?;
    let store = FileSessionStore::new(data_dir());
    let manager = Manager::new(store, http);

    match command.as_str() {
        "start" => {
            manager.start(config).await?;
            let status = manager.get_status();
            info!(client_count = manager.get_client_count(), "engine started");
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        "generate-url" => {
            let Some(server) = args.get(2) else {
                eprintln!("generate-url requires a server argument, e.g. oast.site");
                std::process::exit(1);
            };
            let tag = args.get(3).cloned();
            manager.start(config).await?;
            let (url, unique_id) = manager.generate_url(server, tag).await?;
            println!("{url}");
            info!(%unique_id, "minted url");
        }
        "poll" => {
            manager.start(config).await?;
            manager.poll(true).await?;
            let interactions = manager.get_interactions();
            println!("{}", serde_json::to_string_pretty(&interactions)?);
        }
        "status" => {
            manager.start(config).await?;
            let status = manager.get_status();
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        other => {
            eprintln!("unknown subcommand: {other}");
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}

fn load_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    if let Ok(token) = std::env::var("INTERACTSH_TOKEN") {
        config.token = Some(token);
    }
    if let Ok(raw) = std::env::var("INTERACTSH_POLL_INTERVAL_MS") {
        if let Ok(parsed) = raw.parse() {
            config.polling_interval_ms = parsed;
        }
    }
    if let Ok(raw) = std::env::var("INTERACTSH_HTTP_TIMEOUT_MS") {
        if let Ok(parsed) = raw.parse() {
            config.http_timeout_ms = parsed;
        }
    }
    config
}

fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("INTERACTSH_DATA_DIR") {
        return PathBuf::from(dir);
    }
    std::env::var("HOME")
        .map(|home| PathBuf::from(home).join(".interactsh-client"))
        .unwrap_or_else(|_| PathBuf::from("/tmp/interactsh-client"))
}
