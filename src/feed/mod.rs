//! Protocol ingestion: feed transport, event model, and normalization.

/// Raw feed event framing and type priorities.
pub mod event;
/// Stateful cross-referencing normalizer.
pub mod normalizer;
/// Startup prefix reordering.
pub mod reorder;
/// Line-oriented HTTP/file sources.
pub mod transport;
/// Wire payload shapes and time parsing.
pub mod wire;

use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::feed::event::RawFeedEvent;
use crate::feed::normalizer::{FeedNormalizer, IngestError};
use crate::feed::reorder::StartupReorderBuffer;
use crate::feed::transport::{FeedConfig, SourceMessage};
use crate::update::ContestUpdate;

/// Spawns the feed reader chain and returns the normalized update stream.
///
/// The stream pauses across transport outages and closes only when every
/// configured source reached a natural end of input.
pub fn spawn_ingest(config: FeedConfig) -> mpsc::Receiver<ContestUpdate> {
    let (tx, rx) = mpsc::channel(1024);
    let mut lines = transport::spawn_sources(&config);
    let window = Duration::from_millis(config.startup_window_ms);
    let capacity = config.startup_capacity;
    let mut open_sources = config.sources.len();

    tokio::spawn(async move {
        let mut normalizer = FeedNormalizer::new();
        let mut reorder = StartupReorderBuffer::new(capacity);
        let mut flush_at = Instant::now() + window;

        loop {
            tokio::select! {
                msg = lines.recv() => match msg {
                    Some(SourceMessage::Line(line)) => {
                        match RawFeedEvent::parse(&line) {
                            Ok(event) => {
                                for event in reorder.push(event) {
                                    if !process(&mut normalizer, event, &tx).await {
                                        return;
                                    }
                                }
                            }
                            Err(err) => warn!(%err, "skipping malformed feed line"),
                        }
                    }
                    Some(SourceMessage::Reconnected) => {
                        reorder.restart();
                        flush_at = Instant::now() + window;
                    }
                    Some(SourceMessage::Closed) => {
                        open_sources = open_sources.saturating_sub(1);
                        if open_sources == 0 {
                            break;
                        }
                    }
                    None => break,
                },
                _ = tokio::time::sleep_until(flush_at), if reorder.is_buffering() => {
                    for event in reorder.flush() {
                        if !process(&mut normalizer, event, &tx).await {
                            return;
                        }
                    }
                }
            }
        }

        for event in reorder.flush() {
            if !process(&mut normalizer, event, &tx).await {
                return;
            }
        }
        info!("feed input exhausted");
    });

    rx
}

/// Runs one event through the normalizer; returns false to stop ingestion.
async fn process(
    normalizer: &mut FeedNormalizer,
    event: RawFeedEvent,
    tx: &mpsc::Sender<ContestUpdate>,
) -> bool {
    match normalizer.apply_event(event) {
        Ok(updates) => {
            for update in updates {
                if tx.send(update).await.is_err() {
                    return false;
                }
            }
            true
        }
        Err(err @ IngestError::IdMismatch { .. }) => {
            // Accepting a disputed id would corrupt cross-references.
            error!(%err, "fatal feed protocol violation");
            false
        }
        Err(err) => {
            warn!(%err, "skipping feed event");
            true
        }
    }
}
