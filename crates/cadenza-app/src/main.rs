//! # Cadenza
//!
//! Headless driver for the Cadenza streaming audio player.
//!
//! ```text
//! cadenza [--config PATH] <url | path | stream:NAME>...
//! ```

mod services;

use anyhow::{bail, Context, Result};
use cadenza_audio::PlayerNotification;
use cadenza_core::{AudioEntry, AudioEntryId, AudioSource, OutputFormat, PlayerConfig};
use crossbeam_channel::RecvTimeoutError;
use services::PlaybackService;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

struct Args {
    config: Option<PathBuf>,
    sources: Vec<String>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut config = None;
        let mut sources = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let path = args.next().context("--config needs a path")?;
                    config = Some(PathBuf::from(path));
                }
                _ => sources.push(arg),
            }
        }

        if sources.is_empty() {
            bail!("usage: cadenza [--config PATH] <url | path | stream:NAME>...");
        }
        Ok(Self { config, sources })
    }
}

/// Interpret one command line source.
fn parse_entry(source: &str) -> AudioEntry {
    if let Some(name) = source.strip_prefix("stream:") {
        return AudioEntry::new(
            AudioEntryId::generate(),
            AudioSource::Stream { name: name.into() },
            OutputFormat::default(),
        );
    }
    match Url::parse(source) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => AudioEntry::from_url(url),
        _ => AudioEntry::from_path(source),
    }
}

fn log_notification(notification: &PlayerNotification) {
    match notification {
        PlayerNotification::StateChanged { previous, current } => {
            info!("State: {previous:?} -> {current:?}");
        }
        PlayerNotification::WillStartPlaying(id) => info!("Will start {id}"),
        PlayerNotification::DidStartPlaying(id) => info!("Started {id}"),
        PlayerNotification::DidFinishBuffering(id) => debug!("Buffered {id}"),
        PlayerNotification::DidFinishPlaying {
            id,
            stop_reason,
            progress,
            duration,
        } => info!("Finished {id} ({stop_reason:?}) at {progress:.2}/{duration:.2}s"),
        PlayerNotification::DidCancel(ids) => info!("Cancelled {} entries", ids.len()),
        PlayerNotification::UnexpectedError(e) => error!("Player error: {e}"),
        PlayerNotification::Metadata(metadata) => debug!("Metadata: {metadata:?}"),
        PlayerNotification::Progress { id, seconds } => debug!("{id}: {seconds:.2}s"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse(std::env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => PlayerConfig::load(path)?,
        None => PlayerConfig::load_or_default()?,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .init();

    info!("Starting Cadenza v{}", env!("CARGO_PKG_VERSION"));

    let service = PlaybackService::new(config)?;
    let player = service.player().clone();

    let done = Arc::new(AtomicBool::new(false));
    let notifications = player.notifications();
    let printer_done = done.clone();
    let printer = tokio::task::spawn_blocking(move || loop {
        match notifications.recv_timeout(Duration::from_millis(100)) {
            Ok(notification) => log_notification(&notification),
            Err(RecvTimeoutError::Timeout) if !printer_done.load(Ordering::Acquire) => {}
            Err(_) => break,
        }
    });

    service.load(args.sources.iter().map(String::as_str).map(parse_entry).collect());

    tokio::select! {
        result = service.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping playback");
            player.stop();
        }
    }

    let summary = serde_json::json!({
        "state": player.state(),
        "stop_reason": player.stop_reason(),
        "background": format!("{:?}", player.background().stats()),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    player.dispose();
    done.store(true, Ordering::Release);
    printer.await?;

    Ok(())
}
