//! bankdesk - a command-line console for Extra Credit Union.
//!
//! Signs in against the banking API, keeps the session on disk (or in the
//! OS keychain) and shows accounts, transactions and businesses. Every
//! data command goes through the core gateway, so an expired access token
//! is refreshed transparently.

mod cli;
mod commands;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bankdesk_core::api::{Navigator, ReqwestTransport, Transport};
use bankdesk_core::auth::{FileStore, KeyringStore, MemoryStore};
use bankdesk_core::config::StorageBackend;
use bankdesk_core::{BankClient, Config, Gateway, SessionManager, TokenStore};

use cli::Cli;

/// Log file name prefix in the cache directory
const LOG_FILE: &str = "bankdesk.log";

/// Initialize the tracing subscriber for logging.
///
/// Returns the guard of the file writer, which must live until exit.
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

/// The CLI has no page to navigate to; it tells the user how to sign in again.
struct SignInHint;

impl Navigator for SignInHint {
    fn navigate(&self, _path: &str) {
        eprintln!("Your session has expired. Run `bankdesk login` to sign in again.");
    }
}

fn open_store(config: &Config) -> Result<Arc<dyn TokenStore>> {
    Ok(match config.storage {
        StorageBackend::File => Arc::new(FileStore::new(&config.cache_dir()?)),
        StorageBackend::Keyring => Arc::new(KeyringStore::new()),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = Config::load()?;

    let log_dir = if config.log_to_file {
        Some(config.cache_dir()?)
    } else {
        None
    };
    let _log_guard = init_tracing(log_dir);
    info!(api_url = %config.api_url, storage = ?config.storage, "bankdesk starting");

    let transport: Arc<dyn Transport> = Arc::new(
        ReqwestTransport::with_timeout(Duration::from_secs(config.request_timeout_secs))
            .context("Failed to build HTTP client")?,
    );
    let store = open_store(&config)?;
    let session = Arc::new(SessionManager::new(
        Arc::clone(&transport),
        store,
        &config.api_url,
    ));
    let gateway = Gateway::new(
        Arc::clone(&session),
        transport,
        Arc::new(SignInHint),
        &config.sign_in_path,
    );
    let client = BankClient::new(gateway);

    commands::run(cli.command, &client, &mut config).await
}
