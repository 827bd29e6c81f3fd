//! Shared primitive ids, verdicts, and contest-wide enums.

use serde::{Deserialize, Serialize};

/// Feed-native team identifier.
pub type TeamId = String;
/// Feed-native problem identifier.
pub type ProblemId = String;
/// Feed-native run (submission) identifier.
pub type RunId = String;
/// Feed-native group identifier.
pub type GroupId = String;
/// Feed-native organization identifier.
pub type OrgId = String;
/// Feed-native language identifier.
pub type LanguageId = String;
/// Feed-native commentary message identifier.
pub type MessageId = String;

/// Contest-relative time in milliseconds.
pub type TimeMs = u64;
/// Wall-clock time in milliseconds since the unix epoch.
pub type UnixMs = u64;

/// How final results for a contest are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultKind {
    /// Pass-fail scoring with penalty time.
    Icpc,
    /// Per-subtask scoring with merge modes.
    Ioi,
}

/// Terminal outcome of a judged run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Solution accepted.
    Accepted,
    /// Wrong answer on some test.
    WrongAnswer,
    /// Time limit exceeded.
    TimeLimitExceeded,
    /// Memory limit exceeded.
    MemoryLimitExceeded,
    /// Runtime error or nonzero exit.
    RuntimeError,
    /// Output formatting rejected.
    PresentationError,
    /// Compilation failed.
    CompileError,
    /// Output limit exceeded.
    OutputLimitExceeded,
    /// No output produced in time.
    IdlenessLimitExceeded,
    /// Sandbox or security violation.
    SecurityViolation,
    /// Accepted result later challenged.
    Challenged,
    /// Submission ignored by the judges.
    Ignored,
    /// Rejected without a more specific cause.
    Rejected,
}

impl Verdict {
    /// True for outcomes that count as solving the problem.
    pub fn is_accepted(self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    /// True for outcomes that add penalty time under ICPC rules.
    pub fn adds_penalty(self) -> bool {
        !matches!(
            self,
            Verdict::Accepted | Verdict::CompileError | Verdict::Ignored
        )
    }
}

/// How per-run IOI scores fold into a team's problem total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoreMergeMode {
    /// Best score per subtask group across all runs.
    MaxPerGroup,
    /// Best single-run total.
    MaxTotal,
    /// Total of the latest run.
    Last,
    /// Total of the latest run without a wrong verdict.
    LastOk,
    /// Sum over all runs.
    Sum,
}

/// When a problem's display color becomes visible to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ColorPolicy {
    /// Colors are always disclosed.
    #[default]
    Always,
    /// Colors appear once the contest has started.
    AfterStart,
    /// A problem's color appears once it has an accepted visible run.
    WhenSolved,
}
