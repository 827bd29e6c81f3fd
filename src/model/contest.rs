//! Contest metadata snapshot and the status state machine.

use serde::{Deserialize, Serialize};

use crate::model::entities::{GroupInfo, LanguageInfo, OrganizationInfo, ProblemInfo, TeamInfo};
use crate::types::{ColorPolicy, GroupId, OrgId, ResultKind, TimeMs, UnixMs};

/// Explicit contest lifecycle state machine.
///
/// Transitions are monotonic forward (`Before -> Running -> Over -> Finalized`);
/// regression only happens when an override forces a new authoritative schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContestStatus {
    /// The contest has not started.
    Before {
        /// Optional hold duration before a postponed start.
        hold_ms: Option<u64>,
        /// Scheduled start moment, when known.
        scheduled_start: Option<UnixMs>,
    },
    /// The contest is live.
    Running {
        /// Actual start moment.
        started_at: UnixMs,
        /// Moment the scoreboard froze, when frozen.
        frozen_at: Option<UnixMs>,
    },
    /// The contest ended but results may still change.
    Over {
        /// Actual start moment.
        started_at: UnixMs,
        /// Moment the contest ended.
        finished_at: UnixMs,
        /// Moment the scoreboard froze, when frozen.
        frozen_at: Option<UnixMs>,
    },
    /// Results are final; no further corrections are expected.
    Finalized {
        /// Actual start moment.
        started_at: UnixMs,
        /// Moment the contest ended.
        finished_at: UnixMs,
        /// Moment the scoreboard froze, when frozen.
        frozen_at: Option<UnixMs>,
        /// Moment results became final.
        finalized_at: UnixMs,
    },
}

impl ContestStatus {
    /// Position in the forward transition order.
    pub fn rank(&self) -> u8 {
        match self {
            ContestStatus::Before { .. } => 0,
            ContestStatus::Running { .. } => 1,
            ContestStatus::Over { .. } => 2,
            ContestStatus::Finalized { .. } => 3,
        }
    }

    /// Actual start moment, once running.
    pub fn started_at(&self) -> Option<UnixMs> {
        match self {
            ContestStatus::Before { .. } => None,
            ContestStatus::Running { started_at, .. }
            | ContestStatus::Over { started_at, .. }
            | ContestStatus::Finalized { started_at, .. } => Some(*started_at),
        }
    }

    /// True once results are final.
    pub fn is_finalized(&self) -> bool {
        matches!(self, ContestStatus::Finalized { .. })
    }

    /// True while the contest has not started.
    pub fn is_before(&self) -> bool {
        matches!(self, ContestStatus::Before { .. })
    }
}

impl Default for ContestStatus {
    fn default() -> Self {
        ContestStatus::Before {
            hold_ms: None,
            scheduled_start: None,
        }
    }
}

/// First-to-solve and award-related settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardsSettings {
    /// Enables first-to-solve computation.
    pub first_to_solve: bool,
}

impl Default for AwardsSettings {
    fn default() -> Self {
        Self {
            first_to_solve: true,
        }
    }
}

/// Judgement-queue display settings forwarded to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Maximum entries shown at once.
    pub max_queue_size: u32,
    /// How long a judged entry lingers, in milliseconds.
    pub wait_time_ms: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_queue_size: 15,
            wait_time_ms: 60_000,
        }
    }
}

/// Immutable snapshot of the entire contest's metadata.
///
/// The ordered entity lists are authoritative; any id-keyed map derived from
/// them downstream is a per-stage cache rebuilt on every new snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestInfo {
    /// Contest display name.
    pub name: String,
    /// Lifecycle state.
    pub status: ContestStatus,
    /// Scoring discipline.
    pub result_kind: ResultKind,
    /// Contest length in milliseconds.
    pub length_ms: u64,
    /// Freeze offset from contest start, when the scoreboard freezes.
    pub freeze_ms: Option<TimeMs>,
    /// Penalty added per rejected attempt under ICPC rules.
    pub penalty_per_wrong_ms: u64,
    /// Ordered problem list.
    pub problems: Vec<ProblemInfo>,
    /// Ordered team list.
    pub teams: Vec<TeamInfo>,
    /// Ordered group list.
    pub groups: Vec<GroupInfo>,
    /// Ordered organization list.
    pub organizations: Vec<OrganizationInfo>,
    /// Ordered language list.
    pub languages: Vec<LanguageInfo>,
    /// Award computation settings.
    pub awards: AwardsSettings,
    /// Queue display settings.
    pub queue: QueueSettings,
    /// Problem color disclosure policy.
    pub color_policy: ColorPolicy,
}

impl ContestInfo {
    /// Empty snapshot with the given name and scoring discipline.
    pub fn new(name: impl Into<String>, result_kind: ResultKind) -> Self {
        Self {
            name: name.into(),
            status: ContestStatus::default(),
            result_kind,
            length_ms: 5 * 60 * 60 * 1000,
            freeze_ms: None,
            penalty_per_wrong_ms: 20 * 60 * 1000,
            problems: Vec::new(),
            teams: Vec::new(),
            groups: Vec::new(),
            organizations: Vec::new(),
            languages: Vec::new(),
            awards: AwardsSettings::default(),
            queue: QueueSettings::default(),
            color_policy: ColorPolicy::default(),
        }
    }

    /// Linear lookup of a team by feed id.
    pub fn find_team(&self, id: &str) -> Option<&TeamInfo> {
        self.teams.iter().find(|t| t.id == id)
    }

    /// Linear lookup of a problem by feed id.
    pub fn find_problem(&self, id: &str) -> Option<&ProblemInfo> {
        self.problems.iter().find(|p| p.id == id)
    }

    /// Linear lookup of a group by feed id.
    pub fn find_group(&self, id: &str) -> Option<&GroupInfo> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Linear lookup of an organization by feed id.
    pub fn find_organization(&self, id: &str) -> Option<&OrganizationInfo> {
        self.organizations.iter().find(|o| o.id == id)
    }

    /// Group ids referenced by teams but absent from the group list.
    pub fn unresolved_groups(&self) -> Vec<GroupId> {
        let mut missing = Vec::new();
        for team in &self.teams {
            for gid in &team.groups {
                if self.find_group(gid).is_none() && !missing.contains(gid) {
                    missing.push(gid.clone());
                }
            }
        }
        missing
    }

    /// Organization ids referenced by teams but absent from the organization list.
    pub fn unresolved_organizations(&self) -> Vec<OrgId> {
        let mut missing = Vec::new();
        for team in &self.teams {
            if let Some(oid) = &team.organization {
                if self.find_organization(oid).is_none() && !missing.contains(oid) {
                    missing.push(oid.clone());
                }
            }
        }
        missing
    }

    /// Effective merge mode for a problem, defaulting per discipline.
    pub fn merge_mode_for(&self, problem: &ProblemInfo) -> crate::types::ScoreMergeMode {
        problem
            .score_merge_mode
            .unwrap_or(crate::types::ScoreMergeMode::MaxTotal)
    }

    /// True when `time_ms` falls at or past the freeze cutoff.
    pub fn is_after_freeze(&self, time_ms: TimeMs) -> bool {
        self.freeze_ms.is_some_and(|f| time_ms >= f)
    }
}
