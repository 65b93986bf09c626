//! Vigil - A headless Lifeline client
//!
//! Restores the stored session, keeps the notification feed in sync and
//! logs what arrives until interrupted. Run with `--offline` to drive the
//! same pipeline against seeded in-memory data.

use anyhow::{Context, Result};
use log::{error, info, warn};
use std::sync::Arc;

use lifeline::{
    ApiClient, Backend, ClientConfig, ConversationView, FileTokenStore, Session, Synchronizer,
};

mod demo;
mod report;

use report::FeedReporter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let offline = std::env::args().skip(1).any(|arg| arg == "--offline");
    let client_config = ClientConfig::load().context("Failed to load client config")?;

    let (session, backend) = if offline {
        info!("Running offline with demo data");
        demo::start()?
    } else {
        connect(&client_config).await?
    };

    let sync = Synchronizer::new(backend.clone(), client_config.sync_options());
    let attached = sync.attach(session.subscribe());

    let own_email = session.user().map(|user| user.email).unwrap_or_default();
    let chat = ConversationView::new(backend.clone(), own_email, client_config.chat_options());
    let chat_attached = chat.attach(session.subscribe());

    if session.user().is_some() {
        match chat.fetch_conversations().await {
            Ok(()) => {
                let state = chat.snapshot();
                info!(
                    "{} conversations, {} unread messages",
                    state.conversations().len(),
                    state.total_unread()
                );
            }
            Err(e) => warn!("Failed to load conversations: {}", e),
        }
    }

    let mut feed = sync.subscribe();
    let mut reporter = FeedReporter::default();
    loop {
        tokio::select! {
            changed = feed.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = feed.borrow_and_update().clone();
                reporter.report(&snapshot);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    sync.deactivate();
    chat.close();
    attached.abort();
    chat_attached.abort();
    Ok(())
}

/// Restore the session against the configured API
async fn connect(client_config: &ClientConfig) -> Result<(Session, Arc<dyn Backend>)> {
    let store = FileTokenStore::user()?;
    let token_path = store.path();
    let session = Session::new(Arc::new(store));

    let client = ApiClient::new(client_config, session.clone());
    info!("Using API at {}", client.base_url());
    let backend: Arc<dyn Backend> = Arc::new(client);

    match session.restore(backend.as_ref()).await {
        Ok(Some(user)) => info!("Signed in as {} ({:?})", user.name, user.role),
        Ok(None) => warn!(
            "Not signed in. Sign in on the web, then store the access token under \"{}\" in {}",
            lifeline::session::TOKEN_KEY,
            token_path.display()
        ),
        Err(e) => warn!("Could not validate the stored session: {}", e),
    }

    Ok((session, backend))
}
