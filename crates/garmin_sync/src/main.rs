use std::sync::Arc;

use garmin_connect_client::{config::ClientConfig, sso::GarminConnect};
use garmin_sync::config::{SyncConfig, log_directives};
use garmin_sync::session::{SessionManager, TerminalPrompter};
use garmin_sync::sync::Orchestrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configure logging from `GARMIN_SYNC_LOG_LEVEL` (or `RUST_LOG`, default `info`).
    let directives = log_directives();
    let env_filter = tracing_subscriber::EnvFilter::try_new(&directives)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,hyper=warn,reqwest=warn"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::debug!("garmin-sync: log filter: {}", directives);

    let config = SyncConfig::from_env()?;
    let authenticator = GarminConnect::new(ClientConfig::from_env());
    let session = SessionManager::new(authenticator, TerminalPrompter, config.token_dir.clone())
        .with_preset(config.credentials.clone());

    let client = tokio::select! {
        res = session.acquire() => match res {
            Ok(client) => client,
            Err(e) => {
                tracing::error!("authentication failed: {}", e);
                println!("Failed to authenticate.");
                std::process::exit(1);
            }
        },
        _ = tokio::signal::ctrl_c() => {
            println!("Failed to authenticate.");
            std::process::exit(1);
        }
    };

    let today = chrono::Local::now().date_naive();
    let orchestrator = Orchestrator::new(Arc::new(client), config);

    tokio::select! {
        res = orchestrator.run(today) => {
            res?;
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nSync interrupted.");
        }
    }

    Ok(())
}
