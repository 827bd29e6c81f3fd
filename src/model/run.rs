//! Run lifecycle view and tagged judgement results.

use serde::{Deserialize, Serialize};

use crate::types::{LanguageId, ProblemId, RunId, TeamId, TimeMs, Verdict};

/// Latest known judgement state of one run.
///
/// A run moves `InProgress -> Icpc | Ioi` once per judgement outcome, but a
/// corrected upstream judgement may replace the whole value. Every update for
/// a run id supersedes the prior one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunResult {
    /// Judging has not finished.
    InProgress {
        /// Fraction of test data already run, in `[0, 1]`.
        tested_fraction: f64,
    },
    /// Final ICPC outcome.
    Icpc {
        /// Judged verdict.
        verdict: Verdict,
        /// True for the problem's earliest visible accepted run.
        is_first_to_solve: bool,
    },
    /// Final IOI outcome.
    Ioi {
        /// Score per subtask group.
        score: Vec<f64>,
        /// Set when the run was judged wrong rather than scored.
        wrong_verdict: Option<Verdict>,
        /// Change to the team's problem total contributed by this run.
        difference: f64,
        /// Team's problem total after this run.
        score_after: f64,
        /// True for the earliest run reaching the problem's best score.
        is_first_best_run: bool,
        /// True for the run with the largest improvement in its team group.
        is_first_best_team_run: bool,
    },
}

impl RunResult {
    /// Fresh in-progress result with no tests finished.
    pub fn pending() -> Self {
        RunResult::InProgress {
            tested_fraction: 0.0,
        }
    }

    /// True while judging has not finished.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, RunResult::InProgress { .. })
    }

    /// True for an accepted ICPC outcome.
    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            RunResult::Icpc {
                verdict: Verdict::Accepted,
                ..
            }
        )
    }

    /// Total score of an IOI outcome, zero otherwise.
    pub fn total_score(&self) -> f64 {
        match self {
            RunResult::Ioi { score, .. } => score.iter().sum(),
            _ => 0.0,
        }
    }
}

/// A single submission's current lifecycle view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    /// Stable feed id.
    pub id: RunId,
    /// Current result.
    pub result: RunResult,
    /// Problem the run was submitted to.
    pub problem_id: ProblemId,
    /// Submitting team.
    pub team_id: TeamId,
    /// Submission language, when declared.
    pub language_id: Option<LanguageId>,
    /// Contest-relative submission time.
    pub time_ms: TimeMs,
    /// True when the run is excluded from public view.
    pub is_hidden: bool,
}

impl RunInfo {
    /// Pending run with the given references.
    pub fn pending(
        id: impl Into<RunId>,
        problem_id: impl Into<ProblemId>,
        team_id: impl Into<TeamId>,
        time_ms: TimeMs,
    ) -> Self {
        Self {
            id: id.into(),
            result: RunResult::pending(),
            problem_id: problem_id.into(),
            team_id: team_id.into(),
            language_id: None,
            time_ms,
            is_hidden: false,
        }
    }

    /// Ordering key used by every grouped-run list: time, then id.
    pub fn order_key(&self) -> (TimeMs, &str) {
        (self.time_ms, self.id.as_str())
    }
}
