//! Runtime event stream payloads.

use crate::update::ContestUpdate;

/// Events emitted from the single-writer pipeline loop.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// One downstream contest update.
    Update(ContestUpdate),
    /// The journal has persisted at least this sequence.
    DurableUpTo {
        /// Highest sequence known durable.
        seq: u64,
    },
    /// Every configured feed source reached a natural end of input. Live
    /// sources never emit this; outages surface only as a pause.
    FeedClosed,
}
