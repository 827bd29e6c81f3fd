//! IOI score-difference accumulation.
//!
//! Folds each problem-per-team run sequence through the problem's merge-mode
//! accumulator, rewriting every judged run's `difference` and `score_after`,
//! and marks the run with the largest positive improvement as the team's
//! first-best run for that problem.

use std::sync::Arc;

use crate::adapters::AdapterStage;
use crate::engine::grouping::RunGrouping;
use crate::engine::tracker::GroupedRunTracker;
use crate::model::contest::ContestInfo;
use crate::model::run::{RunInfo, RunResult};
use crate::types::{ProblemId, ResultKind, ScoreMergeMode, TeamId};
use crate::update::ContestUpdate;

struct IoiGrouping;

impl RunGrouping for IoiGrouping {
    type Key = (ProblemId, TeamId);

    fn key_of(&self, run: &RunInfo, info: Option<&ContestInfo>) -> Option<Self::Key> {
        let kind = info.map(|i| i.result_kind)?;
        if kind != ResultKind::Ioi {
            return None;
        }
        match run.result {
            RunResult::Ioi { .. } | RunResult::InProgress { .. } => {
                Some((run.problem_id.clone(), run.team_id.clone()))
            }
            RunResult::Icpc { .. } => None,
        }
    }

    fn transform(
        &self,
        key: &Self::Key,
        mut runs: Vec<RunInfo>,
        _info_before: Option<&ContestInfo>,
        info_after: Option<&ContestInfo>,
    ) -> Vec<RunInfo> {
        let mode = info_after
            .and_then(|i| i.find_problem(&key.0).map(|p| i.merge_mode_for(p)))
            .unwrap_or(ScoreMergeMode::MaxTotal);

        let mut acc = MergeAccumulator::new(mode);
        let mut best_idx: Option<usize> = None;
        let mut best_diff = 0.0_f64;

        for (idx, run) in runs.iter_mut().enumerate() {
            let RunResult::Ioi {
                score,
                wrong_verdict,
                difference,
                score_after,
                ..
            } = &mut run.result
            else {
                continue;
            };

            let total = acc.fold(score, wrong_verdict.is_some());
            *difference = total - acc.previous_total;
            *score_after = total;
            acc.previous_total = total;

            if !run.is_hidden && *difference > best_diff {
                best_diff = *difference;
                best_idx = Some(idx);
            }
        }

        for (idx, run) in runs.iter_mut().enumerate() {
            if let RunResult::Ioi {
                is_first_best_team_run,
                ..
            } = &mut run.result
            {
                *is_first_best_team_run = Some(idx) == best_idx;
            }
        }
        runs
    }

    fn needs_recompute(
        &self,
        new_info: &ContestInfo,
        old_info: Option<&ContestInfo>,
        key: &Self::Key,
    ) -> bool {
        let new_mode = new_info
            .find_problem(&key.0)
            .map(|p| new_info.merge_mode_for(p));
        match old_info {
            Some(old) => {
                let old_mode = old.find_problem(&key.0).map(|p| old.merge_mode_for(p));
                old_mode != new_mode || old.result_kind != new_info.result_kind
            }
            None => true,
        }
    }

    fn clear_marks(&self, mut run: RunInfo) -> RunInfo {
        if let RunResult::Ioi {
            difference,
            score_after,
            is_first_best_team_run,
            ..
        } = &mut run.result
        {
            *difference = 0.0;
            *score_after = 0.0;
            *is_first_best_team_run = false;
        }
        run
    }
}

/// Merge-mode fold state over one run sequence.
struct MergeAccumulator {
    mode: ScoreMergeMode,
    previous_total: f64,
    best_per_group: Vec<f64>,
    best_total: f64,
    sum_total: f64,
    last_total: f64,
    last_ok_total: f64,
}

impl MergeAccumulator {
    fn new(mode: ScoreMergeMode) -> Self {
        Self {
            mode,
            previous_total: 0.0,
            best_per_group: Vec::new(),
            best_total: 0.0,
            sum_total: 0.0,
            last_total: 0.0,
            last_ok_total: 0.0,
        }
    }

    /// Folds one judged run's scores, returning the team total afterwards.
    fn fold(&mut self, score: &[f64], is_wrong: bool) -> f64 {
        let run_total: f64 = score.iter().sum();
        match self.mode {
            ScoreMergeMode::MaxPerGroup => {
                if self.best_per_group.len() < score.len() {
                    self.best_per_group.resize(score.len(), 0.0);
                }
                for (best, s) in self.best_per_group.iter_mut().zip(score.iter()) {
                    *best = best.max(*s);
                }
                self.best_per_group.iter().sum()
            }
            ScoreMergeMode::MaxTotal => {
                self.best_total = self.best_total.max(run_total);
                self.best_total
            }
            ScoreMergeMode::Last => {
                self.last_total = run_total;
                self.last_total
            }
            ScoreMergeMode::LastOk => {
                if !is_wrong {
                    self.last_ok_total = run_total;
                }
                self.last_ok_total
            }
            ScoreMergeMode::Sum => {
                self.sum_total += run_total;
                self.sum_total
            }
        }
    }
}

/// Stage wrapper over the grouped-run tracker.
pub struct IoiScoreStage {
    tracker: GroupedRunTracker<IoiGrouping>,
}

impl IoiScoreStage {
    /// Stage with an empty tracker.
    pub fn new() -> Self {
        Self {
            tracker: GroupedRunTracker::new(IoiGrouping),
        }
    }
}

impl Default for IoiScoreStage {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterStage for IoiScoreStage {
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
