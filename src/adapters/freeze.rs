//! Freeze and after-end redaction.
//!
//! A run at or past the freeze cutoff has its result replaced with a
//! zero-progress placeholder until finalization; a run past the contest
//! length is hidden. Cutoff moves re-redact or un-redact exactly the runs
//! whose cutoff-relative side flips.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::adapters::AdapterStage;
use crate::model::contest::ContestInfo;
use crate::model::run::{RunInfo, RunResult};
use crate::types::RunId;
use crate::update::ContestUpdate;

/// Redacts submissions outside the publicly visible window.
pub struct FreezeStage {
    info: Option<Arc<ContestInfo>>,
    raw_runs: HashMap<RunId, RunInfo>,
}

impl FreezeStage {
    /// Stage with no contest known yet.
    pub fn new() -> Self {
        Self {
            info: None,
            raw_runs: HashMap::new(),
        }
    }

    fn redacted(run: &RunInfo, info: &ContestInfo) -> RunInfo {
        let mut out = run.clone();
        if !info.status.is_finalized() && info.is_after_freeze(run.time_ms) {
            out.result = RunResult::pending();
        }
        if run.time_ms > info.length_ms {
            out.is_hidden = true;
        }
        out
    }
}

impl Default for FreezeStage {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterStage for FreezeStage {
    fn process(&mut self, update: ContestUpdate) -> Vec<ContestUpdate> {
        match update {
            ContestUpdate::Info(info) => {
                let old = self.info.replace(Arc::clone(&info));
                let mut out = vec![ContestUpdate::Info(Arc::clone(&info))];

                let cutoffs_changed = old.as_ref().is_none_or(|o| {
                    o.freeze_ms != info.freeze_ms
                        || o.length_ms != info.length_ms
                        || o.status.is_finalized() != info.status.is_finalized()
                });
                if cutoffs_changed {
                    if let Some(old) = old {
                        let mut flipped: Vec<RunInfo> = self
                            .raw_runs
                            .values()
                            .filter_map(|raw| {
                                let before = Self::redacted(raw, &old);
                                let after = Self::redacted(raw, &info);
                                (before != after).then_some(after)
                            })
                            .collect();
                        flipped.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
                        out.extend(flipped.into_iter().map(ContestUpdate::Run));
                    }
                }
                out
            }
            ContestUpdate::Run(run) => {
                let visible = match self.info.as_deref() {
                    Some(info) => Self::redacted(&run, info),
                    None => run.clone(),
                };
                self.raw_runs.insert(run.id.clone(), run);
                vec![ContestUpdate::Run(visible)]
            }
            other @ ContestUpdate::Commentary(_) => vec![other],
        }
    }
}
