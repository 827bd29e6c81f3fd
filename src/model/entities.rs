//! Display entities referenced by contest info.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::types::{GroupId, LanguageId, OrgId, ProblemId, ScoreMergeMode, TeamId};

/// A participating team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    /// Stable feed id.
    pub id: TeamId,
    /// Short display name.
    pub display_name: String,
    /// Full name, when distinct from the display name.
    pub full_name: String,
    /// Groups this team belongs to.
    pub groups: Vec<GroupId>,
    /// Owning organization, when declared.
    pub organization: Option<OrgId>,
    /// True when the team is excluded from public view.
    pub is_hidden: bool,
    /// True when the team participates outside the official standings.
    pub is_out_of_contest: bool,
    /// Free-form fields used for template substitution.
    pub custom_fields: HashMap<String, String>,
}

impl TeamInfo {
    /// Minimal visible team with the given id and name.
    pub fn new(id: impl Into<TeamId>, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        Self {
            id: id.into(),
            full_name: display_name.clone(),
            display_name,
            groups: Vec::new(),
            organization: None,
            is_hidden: false,
            is_out_of_contest: false,
            custom_fields: HashMap::new(),
        }
    }
}

/// A contest problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemInfo {
    /// Stable feed id.
    pub id: ProblemId,
    /// Short label shown in scoreboard columns, usually a letter.
    pub label: String,
    /// Problem name.
    pub name: String,
    /// Position within the ordered problem list.
    pub ordinal: u32,
    /// Display color, absent while a disclosure policy withholds it.
    pub color: Option<String>,
    /// Maximum achievable score for IOI problems.
    pub max_score: Option<f64>,
    /// Per-problem score merge mode for IOI problems.
    pub score_merge_mode: Option<ScoreMergeMode>,
    /// Declared number of test cases, used for in-progress fractions.
    pub test_data_count: Option<u32>,
    /// True when the problem is excluded from public view.
    pub is_hidden: bool,
}

impl ProblemInfo {
    /// Minimal visible problem with the given id and label.
    pub fn new(id: impl Into<ProblemId>, label: impl Into<String>, ordinal: u32) -> Self {
        let label = label.into();
        Self {
            id: id.into(),
            name: label.clone(),
            label,
            ordinal,
            color: None,
            max_score: None,
            score_merge_mode: None,
            test_data_count: None,
            is_hidden: false,
        }
    }
}

/// A team grouping such as a site, division, or award category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    /// Stable feed id.
    pub id: GroupId,
    /// Display name.
    pub display_name: String,
    /// True when every member team is excluded from public view.
    pub is_hidden: bool,
    /// True when member teams rank outside the official standings.
    pub is_out_of_contest: bool,
}

/// An organization (university, company) teams belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationInfo {
    /// Stable feed id.
    pub id: OrgId,
    /// Short display name.
    pub display_name: String,
    /// Full name, when distinct from the display name.
    pub full_name: String,
}

/// A submission language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageInfo {
    /// Stable feed id.
    pub id: LanguageId,
    /// Display name.
    pub name: String,
    /// File extensions associated with the language.
    pub extensions: Vec<String>,
}
