//! Multi-day result stitching.
//!
//! Replays already-finalized prior-day bundles ahead of the live day,
//! renumbering problem and run ids with a day prefix and concatenating the
//! problem sets into every live info snapshot.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::adapters::AdapterStage;
use crate::model::contest::ContestInfo;
use crate::model::entities::ProblemInfo;
use crate::model::run::RunInfo;
use crate::update::ContestUpdate;

/// Prefixes prior-day state ahead of the live stream.
pub struct MultiDayStitcher {
    prior_days: Vec<Vec<ContestUpdate>>,
    prior_problems: Vec<ProblemInfo>,
    prior_runs: Vec<RunInfo>,
    replayed: bool,
}

impl MultiDayStitcher {
    /// Stitcher over finalized bundles for days `1..=prior_days.len()`;
    /// the live stream becomes day `prior_days.len() + 1`.
    pub fn new(prior_days: Vec<Vec<ContestUpdate>>) -> Self {
        let mut prior_problems = Vec::new();
        let mut prior_runs: Vec<RunInfo> = Vec::new();

        for (idx, bundle) in prior_days.iter().enumerate() {
            let day = idx + 1;
            if let Some(info) = bundle.iter().rev().find_map(|u| u.as_info()) {
                for problem in &info.problems {
                    let mut p = problem.clone();
                    p.id = day_id(day, &problem.id);
                    prior_problems.push(p);
                }
            }
            // Last value per run id wins, in bundle order.
            let mut latest: HashMap<&str, &RunInfo> = HashMap::new();
            let mut order: Vec<&str> = Vec::new();
            for update in bundle {
                if let Some(run) = update.as_run() {
                    if latest.insert(run.id.as_str(), run).is_none() {
                        order.push(run.id.as_str());
                    }
                }
            }
            for id in order {
                if let Some(run) = latest.get(id) {
                    let mut r = (*run).clone();
                    r.id = day_id(day, &run.id);
                    r.problem_id = day_id(day, &run.problem_id);
                    prior_runs.push(r);
                }
            }
        }

        Self {
            prior_days,
            prior_problems,
            prior_runs,
            replayed: false,
        }
    }

    fn live_day(&self) -> usize {
        self.prior_days.len() + 1
    }

    fn merged_info(&self, live: &ContestInfo) -> Arc<ContestInfo> {
        let day = self.live_day();
        let mut merged = live.clone();
        let mut problems = self.prior_problems.clone();
        for problem in &live.problems {
            let mut p = problem.clone();
            p.id = day_id(day, &problem.id);
            problems.push(p);
        }
        for (ordinal, problem) in problems.iter_mut().enumerate() {
            problem.ordinal = ordinal as u32;
        }
        merged.problems = problems;
        Arc::new(merged)
    }
}

impl AdapterStage for MultiDayStitcher {
    fn process(&mut self, update: ContestUpdate) -> Vec<ContestUpdate> {
        let day = self.live_day();
        match update {
            ContestUpdate::Info(info) => {
                let mut out = vec![ContestUpdate::Info(self.merged_info(&info))];
                if !self.replayed {
                    self.replayed = true;
                    out.extend(self.prior_runs.iter().cloned().map(ContestUpdate::Run));
                }
                out
            }
            ContestUpdate::Run(mut run) => {
                run.id = day_id(day, &run.id);
                run.problem_id = day_id(day, &run.problem_id);
                vec![ContestUpdate::Run(run)]
            }
            ContestUpdate::Commentary(mut msg) => {
                let prefixed: Vec<String> =
                    msg.run_ids.iter().map(|id| day_id(day, id)).collect();
                msg.run_ids = prefixed;
                vec![ContestUpdate::Commentary(msg)]
            }
        }
    }
}

fn day_id(day: usize, id: &str) -> String {
    format!("d{day}.{id}")
}
