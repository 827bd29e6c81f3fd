//! Problem color disclosure.
//!
//! Replaces problem colors with an undisclosed placeholder until the
//! configured policy's condition is met, and re-discloses as soon as it is.

use std::sync::Arc;

use hashbrown::HashSet;

use crate::adapters::AdapterStage;
use crate::model::contest::ContestInfo;
use crate::model::run::RunInfo;
use crate::types::{ColorPolicy, ProblemId};
use crate::update::ContestUpdate;

/// Withholds problem colors per the contest's disclosure policy.
pub struct ColorDisclosureStage {
    upstream: Option<Arc<ContestInfo>>,
    solved: HashSet<ProblemId>,
}

impl ColorDisclosureStage {
    /// Stage with no contest known yet.
    pub fn new() -> Self {
        Self {
            upstream: None,
            solved: HashSet::new(),
        }
    }

    fn masked(&self) -> Option<Arc<ContestInfo>> {
        let info = self.upstream.as_ref()?;
        let withhold_all = match info.color_policy {
            ColorPolicy::Always => return Some(Arc::clone(info)),
            ColorPolicy::AfterStart => info.status.is_before(),
            ColorPolicy::WhenSolved => false,
        };

        let needs_mask = info.problems.iter().any(|p| {
            p.color.is_some()
                && (withhold_all
                    || (info.color_policy == ColorPolicy::WhenSolved
                        && !self.solved.contains(&p.id)))
        });
        if !needs_mask {
            return Some(Arc::clone(info));
        }

        let mut adjusted = (**info).clone();
        for problem in &mut adjusted.problems {
            let withhold = withhold_all
                || (info.color_policy == ColorPolicy::WhenSolved
                    && !self.solved.contains(&problem.id));
            if withhold {
                problem.color = None;
            }
        }
        Some(Arc::new(adjusted))
    }

    fn note_solved(&mut self, run: &RunInfo) -> bool {
        if run.is_hidden || !run.result.is_accepted() {
            return false;
        }
        self.solved.insert(run.problem_id.clone())
    }
}

impl Default for ColorDisclosureStage {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterStage for ColorDisclosureStage {
    fn process(&mut self, update: ContestUpdate) -> Vec<ContestUpdate> {
        match update {
            ContestUpdate::Info(info) => {
                self.upstream = Some(info);
                match self.masked() {
                    Some(masked) => vec![ContestUpdate::Info(masked)],
                    None => Vec::new(),
                }
            }
            ContestUpdate::Run(run) => {
                let newly_solved = self.note_solved(&run);
                let mut out = vec![ContestUpdate::Run(run)];
                if newly_solved {
                    let discloses = self
                        .upstream
                        .as_ref()
                        .is_some_and(|i| i.color_policy == ColorPolicy::WhenSolved);
                    if discloses {
                        if let Some(masked) = self.masked() {
                            out.push(ContestUpdate::Info(masked));
                        }
                    }
                }
                out
            }
            other @ ContestUpdate::Commentary(_) => vec![other],
        }
    }
}
