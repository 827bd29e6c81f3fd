//! Minimal update events republished to downstream consumers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::commentary::CommentaryMessage;
use crate::model::contest::ContestInfo;
use crate::model::run::RunInfo;

/// Version number for serialized [`StoredUpdateEnvelope`] payloads.
pub const UPDATE_FORMAT_VERSION: u16 = 1;

/// One "latest known value" update for a contest entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContestUpdate {
    /// Full contest metadata snapshot.
    Info(Arc<ContestInfo>),
    /// Latest state of one run.
    Run(RunInfo),
    /// Latest state of one commentary message.
    Commentary(CommentaryMessage),
}

impl ContestUpdate {
    /// Stable id of the entity this update supersedes.
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            ContestUpdate::Info(_) => None,
            ContestUpdate::Run(run) => Some(&run.id),
            ContestUpdate::Commentary(msg) => Some(&msg.id),
        }
    }

    /// Borrow the info snapshot, when this is an info update.
    pub fn as_info(&self) -> Option<&Arc<ContestInfo>> {
        match self {
            ContestUpdate::Info(info) => Some(info),
            _ => None,
        }
    }

    /// Borrow the run, when this is a run update.
    pub fn as_run(&self) -> Option<&RunInfo> {
        match self {
            ContestUpdate::Run(run) => Some(run),
            _ => None,
        }
    }
}

/// Journal row metadata plus update payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredUpdate {
    /// Monotonic journal sequence.
    pub seq: u64,
    /// Wall-clock time the update was journaled.
    pub ts_ms: u64,
    /// Update body.
    pub update: ContestUpdate,
}

/// Versioned wrapper for stable on-disk payload decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredUpdateEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped update.
    pub stored: StoredUpdate,
}

impl StoredUpdateEnvelope {
    /// Constructs an envelope using [`UPDATE_FORMAT_VERSION`].
    pub fn new(stored: StoredUpdate) -> Self {
        Self {
            format_version: UPDATE_FORMAT_VERSION,
            stored,
        }
    }
}
