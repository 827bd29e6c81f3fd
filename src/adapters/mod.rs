//! Composable stream transformation stages.
//!
//! Each stage consumes the previous stage's update stream and republishes its
//! own; state is private per stage. Stages that react to timers surface a
//! deadline which the runtime loop merges into the main stream.

/// Problem color disclosure policy.
pub mod colors;
/// Commentary tag substitution.
pub mod commentary_tags;
/// Emulation replay scheduling.
pub mod emulate;
/// Auto-finalization once judging settles.
pub mod finalize;
/// First-to-solve and first-best-run marking.
pub mod first_to_solve;
/// Freeze and after-end redaction.
pub mod freeze;
/// Hidden team/group/problem propagation.
pub mod hidden;
/// IOI score-difference accumulation.
pub mod ioi_score;
/// Auto-creation of referenced groups/organizations.
pub mod missing_entities;
/// Advanced property and tuning overrides.
pub mod overrides;
/// Multi-day result stitching.
pub mod stitch;

use crate::adapters::overrides::TuningRules;
use crate::types::UnixMs;
use crate::update::ContestUpdate;

/// One pipeline stage: a pure transform over the update stream.
pub trait AdapterStage: Send + 'static {
    /// Transforms one incoming update into zero or more outgoing updates.
    fn process(&mut self, update: ContestUpdate) -> Vec<ContestUpdate>;

    /// Next wall-clock moment this stage wants a timer callback, if any.
    fn next_deadline(&self) -> Option<UnixMs> {
        None
    }

    /// Timer callback; fired when the runtime reaches `next_deadline`.
    fn on_timer(&mut self, _now: UnixMs) -> Vec<ContestUpdate> {
        Vec::new()
    }

    /// Side-channel tuning-rule change notification.
    fn apply_tuning(&mut self, _rules: &TuningRules) -> Vec<ContestUpdate> {
        Vec::new()
    }
}

/// Stage enablement flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Apply tuning overrides and schedule triggers.
    pub tuning_overrides: bool,
    /// Auto-create groups/organizations referenced by teams.
    pub auto_create_missing: bool,
    /// Propagate hidden flags through groups, teams, and runs.
    pub hidden_propagation: bool,
    /// Accumulate IOI score differences.
    pub ioi_scores: bool,
    /// Mark first-to-solve / first-best runs.
    pub first_to_solve: bool,
    /// Enforce the problem color disclosure policy.
    pub color_disclosure: bool,
    /// Synthesize finalization when the feed cannot signal it.
    pub auto_finalize: bool,
    /// Redact runs past the freeze cutoff or contest end.
    pub freeze_redaction: bool,
    /// Substitute commentary entity tags.
    pub commentary_tags: bool,
    /// Finalized prior-day bundles to stitch ahead of the live stream.
    pub prior_days: Vec<Vec<ContestUpdate>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tuning_overrides: true,
            auto_create_missing: true,
            hidden_propagation: true,
            ioi_scores: true,
            first_to_solve: true,
            color_disclosure: true,
            auto_finalize: true,
            freeze_redaction: true,
            commentary_tags: true,
            prior_days: Vec::new(),
        }
    }
}

/// The composed adapter chain.
pub struct Pipeline {
    stages: Vec<Box<dyn AdapterStage>>,
}

impl Pipeline {
    /// Builds the chain in its fixed order, honoring the config flags.
    pub fn new(config: &PipelineConfig) -> Self {
        let mut stages: Vec<Box<dyn AdapterStage>> = Vec::new();
        if !config.prior_days.is_empty() {
            stages.push(Box::new(stitch::MultiDayStitcher::new(
                config.prior_days.clone(),
            )));
        }
        if config.tuning_overrides {
            stages.push(Box::new(overrides::OverridesStage::new()));
        }
        if config.auto_create_missing {
            stages.push(Box::new(missing_entities::MissingEntitiesStage::new()));
        }
        if config.hidden_propagation {
            stages.push(Box::new(hidden::HiddenStage::new()));
        }
        if config.ioi_scores {
            stages.push(Box::new(ioi_score::IoiScoreStage::new()));
        }
        if config.first_to_solve {
            stages.push(Box::new(first_to_solve::FirstToSolveStage::new()));
        }
        if config.color_disclosure {
            stages.push(Box::new(colors::ColorDisclosureStage::new()));
        }
        if config.auto_finalize {
            stages.push(Box::new(finalize::AutoFinalizeStage::new()));
        }
        if config.freeze_redaction {
            stages.push(Box::new(freeze::FreezeStage::new()));
        }
        if config.commentary_tags {
            stages.push(Box::new(commentary_tags::CommentaryTagsStage::new()));
        }
        Self { stages }
    }

    /// Chain with an explicit stage list, used by tests.
    pub fn from_stages(stages: Vec<Box<dyn AdapterStage>>) -> Self {
        Self { stages }
    }

    /// Feeds one update through the whole chain.
    pub fn process(&mut self, update: ContestUpdate) -> Vec<ContestUpdate> {
        self.run_from(0, vec![update])
    }

    /// Earliest pending deadline across all stages.
    pub fn next_deadline(&self) -> Option<UnixMs> {
        self.stages.iter().filter_map(|s| s.next_deadline()).min()
    }

    /// Fires every due stage, flowing its output through the rest of the chain.
    pub fn on_timer(&mut self, now: UnixMs) -> Vec<ContestUpdate> {
        let mut out = Vec::new();
        for idx in 0..self.stages.len() {
            let due = self.stages[idx].next_deadline().is_some_and(|d| d <= now);
            if due {
                let produced = self.stages[idx].on_timer(now);
                out.extend(self.run_from(idx + 1, produced));
            }
        }
        out
    }

    /// Delivers a tuning-rule change, flowing any re-derived updates onward.
    pub fn apply_tuning(&mut self, rules: &TuningRules) -> Vec<ContestUpdate> {
        let mut out = Vec::new();
        for idx in 0..self.stages.len() {
            let produced = self.stages[idx].apply_tuning(rules);
            if !produced.is_empty() {
                out.extend(self.run_from(idx + 1, produced));
            }
        }
        out
    }

    fn run_from(&mut self, start: usize, mut pending: Vec<ContestUpdate>) -> Vec<ContestUpdate> {
        for idx in start..self.stages.len() {
            if pending.is_empty() {
                break;
            }
            let mut next = Vec::new();
            for update in pending {
                next.extend(self.stages[idx].process(update));
            }
            pending = next;
        }
        pending
    }
}
