//! Auto-finalization.
//!
//! For feeds with no native finalization signal: once the contest is over and
//! no run is pending judgement, synthesizes exactly one transition to the
//! finalized status.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashSet;

use crate::adapters::AdapterStage;
use crate::model::contest::{ContestInfo, ContestStatus};
use crate::types::RunId;
use crate::update::ContestUpdate;

/// Synthesizes the finalized transition once judging settles.
pub struct AutoFinalizeStage {
    info: Option<Arc<ContestInfo>>,
    pending: HashSet<RunId>,
}

impl AutoFinalizeStage {
    /// Stage with no contest known yet.
    pub fn new() -> Self {
        Self {
            info: None,
            pending: HashSet::new(),
        }
    }

    fn maybe_finalize(&mut self) -> Option<ContestUpdate> {
        let info = self.info.as_ref()?;
        if !self.pending.is_empty() {
            return None;
        }
        let ContestStatus::Over {
            started_at,
            finished_at,
            frozen_at,
        } = info.status
        else {
            return None;
        };

        let mut finalized = (**info).clone();
        finalized.status = ContestStatus::Finalized {
            started_at,
            finished_at,
            frozen_at,
            finalized_at: now_ms(),
        };
        let finalized = Arc::new(finalized);
        self.info = Some(Arc::clone(&finalized));
        Some(ContestUpdate::Info(finalized))
    }
}

impl Default for AutoFinalizeStage {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterStage for AutoFinalizeStage {
    fn process(&mut self, update: ContestUpdate) -> Vec<ContestUpdate> {
        match update {
            ContestUpdate::Info(info) => {
                let mut out = vec![ContestUpdate::Info(Arc::clone(&info))];
                self.info = Some(info);
                if let Some(finalized) = self.maybe_finalize() {
                    out.push(finalized);
                }
                out
            }
            ContestUpdate::Run(run) => {
                if run.result.is_in_progress() {
                    self.pending.insert(run.id.clone());
                } else {
                    self.pending.remove(&run.id);
                }
                let mut out = vec![ContestUpdate::Run(run)];
                if let Some(finalized) = self.maybe_finalize() {
                    out.push(finalized);
                }
                out
            }
            other @ ContestUpdate::Commentary(_) => vec![other],
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
