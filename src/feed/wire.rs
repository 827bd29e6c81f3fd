//! CLICS-like wire payload shapes.
//!
//! These are the protocol's own shapes; pure mapping functions in the
//! normalizer turn them into the flat model types, so protocol variance never
//! leaks past this module.

use serde::Deserialize;

use crate::types::Verdict;

/// Contest metadata payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WireContest {
    /// Contest id.
    pub id: String,
    /// Informal name.
    #[serde(default)]
    pub name: Option<String>,
    /// Formal name, preferred for display.
    #[serde(default)]
    pub formal_name: Option<String>,
    /// Scheduled start, RFC 3339.
    #[serde(default)]
    pub start_time: Option<String>,
    /// Countdown hold duration, relative.
    #[serde(default)]
    pub countdown_pause_time: Option<String>,
    /// Contest length, relative.
    #[serde(default)]
    pub duration: Option<String>,
    /// Freeze length before contest end, relative.
    #[serde(default)]
    pub scoreboard_freeze_duration: Option<String>,
    /// Penalty minutes per rejected attempt.
    #[serde(default)]
    pub penalty_time: Option<i64>,
    /// `pass-fail` or `score`.
    #[serde(default)]
    pub scoreboard_type: Option<String>,
}

/// Contest lifecycle payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WireState {
    /// Moment the contest started, RFC 3339.
    #[serde(default)]
    pub started: Option<String>,
    /// Moment the contest ended.
    #[serde(default)]
    pub ended: Option<String>,
    /// Moment the scoreboard froze.
    #[serde(default)]
    pub frozen: Option<String>,
    /// Moment results were finalized.
    #[serde(default)]
    pub finalized: Option<String>,
    /// Set once no further updates will ever follow.
    #[serde(default)]
    pub end_of_updates: Option<String>,
}

/// Judgement type row.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WireJudgementType {
    /// Type id, e.g. `AC` or `WA`.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// True when the outcome solves the problem.
    #[serde(default)]
    pub solved: Option<bool>,
    /// True when the outcome adds penalty time.
    #[serde(default)]
    pub penalty: Option<bool>,
}

/// Language row.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WireLanguage {
    /// Language id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// File extensions.
    #[serde(default)]
    pub extensions: Vec<String>,
}

/// Group row.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WireGroup {
    /// Group id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// True when member teams are hidden.
    #[serde(default)]
    pub hidden: Option<bool>,
}

/// Organization row.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WireOrganization {
    /// Organization id.
    pub id: String,
    /// Short display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Formal name.
    #[serde(default)]
    pub formal_name: Option<String>,
}

/// Team row.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WireTeam {
    /// Team id.
    pub id: String,
    /// Name used when no display name is present.
    #[serde(default)]
    pub name: Option<String>,
    /// Preferred display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Owning organization.
    #[serde(default)]
    pub organization_id: Option<String>,
    /// Group memberships.
    #[serde(default)]
    pub group_ids: Vec<String>,
    /// True when the team is hidden from public view.
    #[serde(default)]
    pub hidden: Option<bool>,
}

/// Problem row.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WireProblem {
    /// Problem id.
    pub id: String,
    /// Scoreboard label.
    #[serde(default)]
    pub label: Option<String>,
    /// Problem name.
    #[serde(default)]
    pub name: Option<String>,
    /// Position in the problem list.
    #[serde(default)]
    pub ordinal: Option<u32>,
    /// Display color as an RGB string.
    #[serde(default)]
    pub rgb: Option<String>,
    /// Display color as a named color.
    #[serde(default)]
    pub color: Option<String>,
    /// Declared test case count.
    #[serde(default)]
    pub test_data_count: Option<u32>,
    /// Maximum achievable score.
    #[serde(default)]
    pub max_score: Option<f64>,
}

/// Submission row.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WireSubmission {
    /// Submission id.
    pub id: String,
    /// Problem submitted to.
    pub problem_id: String,
    /// Submitting team.
    pub team_id: String,
    /// Submission language.
    #[serde(default)]
    pub language_id: Option<String>,
    /// Contest-relative submission time.
    #[serde(default)]
    pub contest_time: Option<String>,
    /// Absolute submission time, RFC 3339.
    #[serde(default)]
    pub time: Option<String>,
}

/// Judgement row.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WireJudgement {
    /// Judgement id.
    pub id: String,
    /// Judged submission.
    pub submission_id: String,
    /// Outcome type, absent while judging.
    #[serde(default)]
    pub judgement_type_id: Option<String>,
    /// Score awarded, for scored contests.
    #[serde(default)]
    pub score: Option<f64>,
    /// Contest-relative judging start.
    #[serde(default)]
    pub start_contest_time: Option<String>,
    /// Contest-relative judging end.
    #[serde(default)]
    pub end_contest_time: Option<String>,
}

/// Per-test-case run row.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WireRun {
    /// Run row id.
    pub id: String,
    /// Owning judgement.
    pub judgement_id: String,
    /// Test case ordinal.
    #[serde(default)]
    pub ordinal: Option<u64>,
    /// Per-test outcome.
    #[serde(default)]
    pub judgement_type_id: Option<String>,
}

/// Commentary row.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WireCommentary {
    /// Message id.
    pub id: String,
    /// Message text.
    #[serde(default)]
    pub message: String,
    /// Contest-relative time.
    #[serde(default)]
    pub contest_time: Option<String>,
    /// Absolute time, RFC 3339.
    #[serde(default)]
    pub time: Option<String>,
    /// Referenced teams.
    #[serde(default)]
    pub team_ids: Vec<String>,
    /// Referenced submissions.
    #[serde(default)]
    pub submission_ids: Vec<String>,
    /// Display priority.
    #[serde(default)]
    pub priority: Option<i32>,
    /// Routing tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Parses a relative `[-]H:MM:SS[.mmm]` duration into signed milliseconds.
pub fn parse_rel_time_ms(text: &str) -> Option<i64> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let mut parts = rest.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let (seconds, millis) = match seconds_part.split_once('.') {
        Some((s, frac)) => {
            let s: i64 = s.parse().ok()?;
            let frac = format!("{frac:0<3}");
            let ms: i64 = frac.get(..3)?.parse().ok()?;
            (s, ms)
        }
        None => (seconds_part.parse().ok()?, 0),
    };
    let total = hours * 3_600_000 + minutes * 60_000 + seconds * 1000 + millis;
    Some(if negative { -total } else { total })
}

/// Parses an RFC 3339 timestamp into unix milliseconds.
pub fn parse_abs_time_ms(text: &str) -> Option<u64> {
    let parsed = chrono::DateTime::parse_from_rfc3339(text).ok()?;
    let ms = parsed.timestamp_millis();
    (ms >= 0).then_some(ms as u64)
}

/// Maps a well-known judgement type id to a verdict.
pub fn verdict_from_type_id(id: &str) -> Option<Verdict> {
    let verdict = match id.to_ascii_uppercase().as_str() {
        "AC" | "CORRECT" => Verdict::Accepted,
        "WA" | "NO" => Verdict::WrongAnswer,
        "TLE" | "TLX" => Verdict::TimeLimitExceeded,
        "MLE" => Verdict::MemoryLimitExceeded,
        "RTE" | "RE" => Verdict::RuntimeError,
        "PE" | "OFE" => Verdict::PresentationError,
        "CE" => Verdict::CompileError,
        "OLE" => Verdict::OutputLimitExceeded,
        "ILE" | "IL" => Verdict::IdlenessLimitExceeded,
        "SV" => Verdict::SecurityViolation,
        "IGN" => Verdict::Ignored,
        _ => return None,
    };
    Some(verdict)
}
