//! Hidden-entity propagation.
//!
//! A team is hidden when explicitly flagged or when any of its groups is
//! hidden; a run is hidden when its team or problem is hidden. Runs ahead of
//! the first-to-solve and score stages so hidden runs never win derived marks.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};

use crate::adapters::AdapterStage;
use crate::model::contest::ContestInfo;
use crate::model::run::RunInfo;
use crate::types::{ProblemId, RunId, TeamId};
use crate::update::ContestUpdate;

/// Propagates hidden flags from groups to teams and from teams/problems to runs.
pub struct HiddenStage {
    raw_runs: HashMap<RunId, RunInfo>,
    hidden_teams: HashSet<TeamId>,
    hidden_problems: HashSet<ProblemId>,
}

impl HiddenStage {
    /// Stage with no contest known yet.
    pub fn new() -> Self {
        Self {
            raw_runs: HashMap::new(),
            hidden_teams: HashSet::new(),
            hidden_problems: HashSet::new(),
        }
    }

    fn effective(&self, run: &RunInfo) -> RunInfo {
        let mut out = run.clone();
        out.is_hidden = run.is_hidden
            || self.hidden_teams.contains(&run.team_id)
            || self.hidden_problems.contains(&run.problem_id);
        out
    }

    fn propagate_info(info: &ContestInfo) -> (Arc<ContestInfo>, HashSet<TeamId>, HashSet<ProblemId>) {
        let hidden_groups: HashSet<&str> = info
            .groups
            .iter()
            .filter(|g| g.is_hidden)
            .map(|g| g.id.as_str())
            .collect();

        let mut adjusted = info.clone();
        let mut hidden_teams = HashSet::new();
        for team in &mut adjusted.teams {
            let in_hidden_group = team.groups.iter().any(|g| hidden_groups.contains(g.as_str()));
            team.is_hidden = team.is_hidden || in_hidden_group;
            if team.is_hidden {
                hidden_teams.insert(team.id.clone());
            }
        }

        let hidden_problems = adjusted
            .problems
            .iter()
            .filter(|p| p.is_hidden)
            .map(|p| p.id.clone())
            .collect();

        (Arc::new(adjusted), hidden_teams, hidden_problems)
    }
}

impl Default for HiddenStage {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterStage for HiddenStage {
    fn process(&mut self, update: ContestUpdate) -> Vec<ContestUpdate> {
        match update {
            ContestUpdate::Info(info) => {
                let (adjusted, hidden_teams, hidden_problems) = Self::propagate_info(&info);

                let mut out = vec![ContestUpdate::Info(adjusted)];
                if hidden_teams != self.hidden_teams || hidden_problems != self.hidden_problems {
                    let old_teams = std::mem::replace(&mut self.hidden_teams, hidden_teams);
                    let old_problems =
                        std::mem::replace(&mut self.hidden_problems, hidden_problems);

                    let mut flipped: Vec<&RunInfo> = self
                        .raw_runs
                        .values()
                        .filter(|run| {
                            let was = run.is_hidden
                                || old_teams.contains(&run.team_id)
                                || old_problems.contains(&run.problem_id);
                            let now = run.is_hidden
                                || self.hidden_teams.contains(&run.team_id)
                                || self.hidden_problems.contains(&run.problem_id);
                            was != now
                        })
                        .collect();
                    flipped.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
                    let flipped: Vec<RunInfo> =
                        flipped.into_iter().map(|r| self.effective(r)).collect();
                    out.extend(flipped.into_iter().map(ContestUpdate::Run));
                }
                out
            }
            ContestUpdate::Run(run) => {
                let effective = self.effective(&run);
                self.raw_runs.insert(run.id.clone(), run);
                vec![ContestUpdate::Run(effective)]
            }
            other @ ContestUpdate::Commentary(_) => vec![other],
        }
    }
}
