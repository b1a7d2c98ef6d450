mod app;
mod clock;
mod core;
mod error;
mod http;
mod identity;
mod logging;
mod mpv;
mod poller;
mod rating;
mod reconcile;
mod schedule;
mod session;
mod theme;
mod transport;
mod ui;
mod view;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use calico_proto::config::Config;
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::prelude::*;

use crate::core::{PlayerCore, PlayerEvent};
use crate::http::{FeedClient, RatingsClient};
use crate::identity::ListenerId;
use crate::logging::FooterLayer;
use crate::mpv::MpvTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging: file + footer ───────────────────────────────────────────────
    let data_dir = calico_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("player.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let (log_tx, log_rx) = broadcast::channel::<String>(64);

    // Default to debug for our code but keep HTTP client internals quiet.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(false),
        )
        .with(FooterLayer::new(log_tx))
        .with(tracing_subscriber::EnvFilter::new(log_filter))
        .init();

    eprintln!("calico log: {}", log_path.display());
    tracing::info!("calico starting");

    // ── Config and identity ──────────────────────────────────────────────────
    let config = Config::load().unwrap_or_default();
    let player = config.player;
    let listener = ListenerId::load_or_create(&player.listener_id_file);

    // ── Services ─────────────────────────────────────────────────────────────
    let client = http::client()?;
    let metadata = Arc::new(FeedClient::new(client.clone(), player.metadata_url.clone()));
    let ratings = Arc::new(RatingsClient::new(client, &player.ratings_url));
    let transport = Box::new(MpvTransport::new(player.max_recovery_attempts));

    // ── PlayerCore ───────────────────────────────────────────────────────────
    let (event_tx, event_rx) = mpsc::channel::<PlayerEvent>(256);
    let (core, view_rx) =
        PlayerCore::new(player, listener, transport, metadata, ratings, event_tx.clone());
    let core_task = tokio::spawn(core.run(event_rx));

    // ── Front-end (blocks until quit) ────────────────────────────────────────
    let result = app::App::new(view_rx, event_tx.clone()).run(log_rx).await;

    let _ = event_tx.send(PlayerEvent::Shutdown).await;
    core_task.await?;
    tracing::info!("calico stopped");
    result
}
