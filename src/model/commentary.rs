//! Commentary messages referencing teams and runs.

use serde::{Deserialize, Serialize};

use crate::types::{MessageId, RunId, TeamId, TimeMs, UnixMs};

/// One commentary feed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentaryMessage {
    /// Stable feed id.
    pub id: MessageId,
    /// Message text, possibly containing `{team:ID}` / `{problem:ID}` tags.
    pub message: String,
    /// Wall-clock emission time.
    pub time_unix_ms: UnixMs,
    /// Contest-relative emission time.
    pub time_ms: TimeMs,
    /// Teams the message refers to.
    pub team_ids: Vec<TeamId>,
    /// Runs the message refers to.
    pub run_ids: Vec<RunId>,
    /// Display priority; lower values render first.
    pub priority: i32,
    /// Free-form routing tags.
    pub tags: Vec<String>,
}
