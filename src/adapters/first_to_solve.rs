//! First-to-solve marking.
//!
//! ICPC: within each problem's accepted visible runs, exactly the earliest by
//! `(time, id)` carries the mark; a correction that changes the earliest run
//! re-marks both sides. IOI: the earliest run reaching the problem's best
//! team score carries `is_first_best_run`. The whole computation is disabled
//! through the contest awards settings.

use std::sync::Arc;

use crate::adapters::AdapterStage;
use crate::engine::grouping::RunGrouping;
use crate::engine::tracker::GroupedRunTracker;
use crate::model::contest::ContestInfo;
use crate::model::run::{RunInfo, RunResult};
use crate::types::{ProblemId, ResultKind};
use crate::update::ContestUpdate;

/// Eligibility half of the grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Eligibility {
    /// Counts toward first-to-solve selection.
    Counted,
    /// Tracked but never marked.
    Ignored,
}

struct FtsGrouping;

impl FtsGrouping {
    fn eligible(run: &RunInfo, info: Option<&ContestInfo>) -> Eligibility {
        if run.is_hidden {
            return Eligibility::Ignored;
        }
        let kind = info.map(|i| i.result_kind).unwrap_or(ResultKind::Icpc);
        let counted = match (&run.result, kind) {
            (RunResult::Icpc { verdict, .. }, ResultKind::Icpc) => verdict.is_accepted(),
            (RunResult::Ioi { .. }, ResultKind::Ioi) => true,
            _ => false,
        };
        if counted {
            Eligibility::Counted
        } else {
            Eligibility::Ignored
        }
    }

    fn enabled(info: Option<&ContestInfo>) -> bool {
        info.map(|i| i.awards.first_to_solve).unwrap_or(true)
    }
}

impl RunGrouping for FtsGrouping {
    type Key = (ProblemId, Eligibility);

    fn key_of(&self, run: &RunInfo, info: Option<&ContestInfo>) -> Option<Self::Key> {
        Some((run.problem_id.clone(), Self::eligible(run, info)))
    }

    fn transform(
        &self,
        key: &Self::Key,
        mut runs: Vec<RunInfo>,
        _info_before: Option<&ContestInfo>,
        info_after: Option<&ContestInfo>,
    ) -> Vec<RunInfo> {
        let counted = key.1 == Eligibility::Counted && Self::enabled(info_after);
        let kind = info_after
            .map(|i| i.result_kind)
            .unwrap_or(ResultKind::Icpc);

        match kind {
            ResultKind::Icpc => {
                for (idx, run) in runs.iter_mut().enumerate() {
                    if let RunResult::Icpc {
                        is_first_to_solve, ..
                    } = &mut run.result
                    {
                        *is_first_to_solve = counted && idx == 0;
                    }
                }
            }
            ResultKind::Ioi => {
                let best = runs
                    .iter()
                    .filter_map(|r| match &r.result {
                        RunResult::Ioi { score_after, .. } => Some(*score_after),
                        _ => None,
                    })
                    .fold(0.0_f64, f64::max);
                let mut marked = false;
                for run in runs.iter_mut() {
                    if let RunResult::Ioi {
                        score_after,
                        is_first_best_run,
                        ..
                    } = &mut run.result
                    {
                        let wins = counted && !marked && best > 0.0 && *score_after == best;
                        *is_first_best_run = wins;
                        marked = marked || wins;
                    }
                }
            }
        }
        runs
    }

    fn needs_recompute(
        &self,
        new_info: &ContestInfo,
        old_info: Option<&ContestInfo>,
        _key: &Self::Key,
    ) -> bool {
        match old_info {
            Some(old) => {
                old.awards.first_to_solve != new_info.awards.first_to_solve
                    || old.result_kind != new_info.result_kind
            }
            None => true,
        }
    }

    fn clear_marks(&self, mut run: RunInfo) -> RunInfo {
        match &mut run.result {
            RunResult::Icpc {
                is_first_to_solve, ..
            } => *is_first_to_solve = false,
            RunResult::Ioi {
                is_first_best_run, ..
            } => *is_first_best_run = false,
            RunResult::InProgress { .. } => {}
        }
        run
    }
}

/// Stage wrapper over the grouped-run tracker.
pub struct FirstToSolveStage {
    tracker: GroupedRunTracker<FtsGrouping>,
}

impl FirstToSolveStage {
    /// Stage with an empty tracker.
    pub fn new() -> Self {
        Self {
            tracker: GroupedRunTracker::new(FtsGrouping),
        }
    }
}

impl Default for FirstToSolveStage {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterStage for FirstToSolveStage {
    fn process(&mut self, update: ContestUpdate) -> Vec<ContestUpdate> {
        match update {
            ContestUpdate::Info(info) => {
                let mut out = vec![ContestUpdate::Info(Arc::clone(&info))];
                out.extend(
                    self.tracker
                        .process_info(info)
                        .into_iter()
                        .map(ContestUpdate::Run),
                );
                out
            }
            ContestUpdate::Run(run) => self
                .tracker
                .process_run(run)
                .into_iter()
                .map(ContestUpdate::Run)
                .collect(),
            other @ ContestUpdate::Commentary(_) => vec![other],
        }
    }
}
