//! Event-sourced contest state snapshots.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::model::commentary::CommentaryMessage;
use crate::model::contest::ContestInfo;
use crate::model::run::RunInfo;
use crate::types::{MessageId, RunId};
use crate::update::ContestUpdate;

/// Immutable snapshot pair produced for every applied update.
///
/// The before side of the run/message tables is represented as the after
/// tables plus the prior value of the touched entity; nothing else changes
/// between the two sides.
#[derive(Debug, Clone)]
pub struct ContestState {
    /// The update that produced this state.
    pub update: ContestUpdate,
    /// Contest info before the update.
    pub info_before: Option<Arc<ContestInfo>>,
    /// Contest info after the update.
    pub info_after: Option<Arc<ContestInfo>>,
    /// Prior value of the touched run, for run updates that replaced one.
    pub run_before: Option<RunInfo>,
    /// Prior value of the touched message, for commentary replacements.
    pub message_before: Option<CommentaryMessage>,
    /// Run table after the update.
    pub runs: Arc<HashMap<RunId, RunInfo>>,
    /// Commentary table after the update.
    pub messages: Arc<HashMap<MessageId, CommentaryMessage>>,
}

/// Accumulates updates into persistent entity tables.
///
/// `apply` returns `None` for a redundant update (before == after), which is
/// what keeps duplicate feed lines from producing downstream work.
#[derive(Debug, Default)]
pub struct StateTracker {
    info: Option<Arc<ContestInfo>>,
    runs: Arc<HashMap<RunId, RunInfo>>,
    messages: Arc<HashMap<MessageId, CommentaryMessage>>,
}

impl StateTracker {
    /// Empty tracker with no known contest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest contest info, once one arrived.
    pub fn info(&self) -> Option<&Arc<ContestInfo>> {
        self.info.as_ref()
    }

    /// Current run table.
    pub fn runs(&self) -> &Arc<HashMap<RunId, RunInfo>> {
        &self.runs
    }

    /// Current commentary table.
    pub fn messages(&self) -> &Arc<HashMap<MessageId, CommentaryMessage>> {
        &self.messages
    }

    /// Latest value of one run.
    pub fn run(&self, id: &str) -> Option<&RunInfo> {
        self.runs.get(id)
    }

    /// Applies `update`, returning the resulting snapshot or `None` when the
    /// update is a no-op.
    pub fn apply(&mut self, update: ContestUpdate) -> Option<ContestState> {
        match update {
            ContestUpdate::Info(info) => {
                if self.info.as_deref() == Some(info.as_ref()) {
                    return None;
                }
                let info_before = self.info.clone();
                self.info = Some(Arc::clone(&info));
                Some(ContestState {
                    update: ContestUpdate::Info(Arc::clone(&info)),
                    info_before,
                    info_after: Some(info),
                    run_before: None,
                    message_before: None,
                    runs: Arc::clone(&self.runs),
                    messages: Arc::clone(&self.messages),
                })
            }
            ContestUpdate::Run(run) => {
                let run_before = self.runs.get(&run.id).cloned();
                if run_before.as_ref() == Some(&run) {
                    return None;
                }
                Arc::make_mut(&mut self.runs).insert(run.id.clone(), run.clone());
                Some(ContestState {
                    update: ContestUpdate::Run(run),
                    info_before: self.info.clone(),
                    info_after: self.info.clone(),
                    run_before,
                    message_before: None,
                    runs: Arc::clone(&self.runs),
                    messages: Arc::clone(&self.messages),
                })
            }
            ContestUpdate::Commentary(msg) => {
                let message_before = self.messages.get(&msg.id).cloned();
                if message_before.as_ref() == Some(&msg) {
                    return None;
                }
                Arc::make_mut(&mut self.messages).insert(msg.id.clone(), msg.clone());
                Some(ContestState {
                    update: ContestUpdate::Commentary(msg),
                    info_before: self.info.clone(),
                    info_after: self.info.clone(),
                    run_before: None,
                    message_before,
                    runs: Arc::clone(&self.runs),
                    messages: Arc::clone(&self.messages),
                })
            }
        }
    }
}
