//! Emulation replay scheduling.
//!
//! Turns a finalized update history into a wall-clock replay plan: every
//! update is scheduled by its recorded contest-relative time divided by the
//! speed multiplier, equal times keep original stream order, and a synthetic
//! zero-progress update precedes each final judgement so consumers see the
//! run enter testing before its outcome lands.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::model::contest::{ContestInfo, ContestStatus};
use crate::model::run::{RunInfo, RunResult};
use crate::types::{TimeMs, UnixMs};
use crate::update::ContestUpdate;

/// One update scheduled at an absolute wall-clock moment.
#[derive(Debug, Clone)]
pub struct ScheduledUpdate {
    /// Wall-clock emission moment.
    pub at_ms: UnixMs,
    /// Update to emit.
    pub update: ContestUpdate,
}

/// A fully ordered replay schedule.
#[derive(Debug, Clone, Default)]
pub struct EmulationPlan {
    /// Scheduled updates ordered by emission moment.
    pub items: Vec<ScheduledUpdate>,
}

impl EmulationPlan {
    /// Builds the replay plan for a finalized history.
    ///
    /// `history` must be the complete pipeline output of one contest run to
    /// completion. `start_wall_ms` anchors contest time zero; `speed` > 1
    /// compresses the timeline.
    pub fn build(history: &[ContestUpdate], start_wall_ms: UnixMs, speed: f64) -> Self {
        let speed = if speed > 0.0 { speed } else { 1.0 };
        let scaled = |t: TimeMs| start_wall_ms + (t as f64 / speed) as u64;

        let mut items = Vec::new();

        let final_info = history.iter().rev().find_map(|u| u.as_info());
        if let Some(info) = final_info {
            let mut opening = (**info).clone();
            opening.status = ContestStatus::Running {
                started_at: start_wall_ms,
                frozen_at: None,
            };
            items.push(ScheduledUpdate {
                at_ms: start_wall_ms,
                update: ContestUpdate::Info(Arc::new(opening)),
            });
        }

        // Replay each run's final value at the position of its last occurrence
        // so equal-time events keep original stream order.
        let mut last_occurrence: HashMap<&str, usize> = HashMap::new();
        for (idx, update) in history.iter().enumerate() {
            if let Some(run) = update.as_run() {
                last_occurrence.insert(run.id.as_str(), idx);
            }
        }

        for (idx, update) in history.iter().enumerate() {
            match update {
                ContestUpdate::Run(run) => {
                    if last_occurrence.get(run.id.as_str()) != Some(&idx) {
                        continue;
                    }
                    let at_ms = scaled(run.time_ms);
                    if !run.result.is_in_progress() {
                        let mut pending = run.clone();
                        pending.result = RunResult::pending();
                        items.push(ScheduledUpdate {
                            at_ms,
                            update: ContestUpdate::Run(pending),
                        });
                    }
                    items.push(ScheduledUpdate {
                        at_ms,
                        update: ContestUpdate::Run(run.clone()),
                    });
                }
                ContestUpdate::Commentary(msg) => {
                    items.push(ScheduledUpdate {
                        at_ms: scaled(msg.time_ms),
                        update: ContestUpdate::Commentary(msg.clone()),
                    });
                }
                ContestUpdate::Info(_) => {}
            }
        }

        if let Some(info) = final_info {
            items.push(ScheduledUpdate {
                at_ms: scaled(info.length_ms),
                update: ContestUpdate::Info(Arc::clone(info)),
            });
        }

        // Stable by emission moment; equal moments keep push order.
        items.sort_by_key(|item| item.at_ms);
        Self { items }
    }

    /// Closing info of the replayed contest, when the history had one.
    pub fn final_info(&self) -> Option<&Arc<ContestInfo>> {
        self.items.iter().rev().find_map(|i| i.update.as_info())
    }
}
