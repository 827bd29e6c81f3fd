//! Advanced property and tuning overrides.
//!
//! Externally supplied corrections layered atop the feed-derived truth:
//! sparse field patches per entity, regex-derived group/organization
//! membership, team display templating, and global schedule overrides. Rules
//! arrive as a live side channel and are re-applied whenever either the
//! upstream info or the rules change. A forced schedule arms a one-shot
//! deadline so wall-clock-derived status flips exactly on time.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::adapters::AdapterStage;
use crate::model::contest::{ContestInfo, ContestStatus};
use crate::types::{GroupId, OrgId, ProblemId, ScoreMergeMode, TeamId, UnixMs};
use crate::update::ContestUpdate;

/// Sparse team patch; each set field overwrites the feed value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamOverride {
    /// Replacement display name.
    pub display_name: Option<String>,
    /// Replacement full name.
    pub full_name: Option<String>,
    /// Replacement group memberships.
    pub groups: Option<Vec<GroupId>>,
    /// Replacement organization reference.
    pub organization: Option<OrgId>,
    /// Replacement hidden flag.
    pub is_hidden: Option<bool>,
    /// Replacement out-of-contest flag.
    pub is_out_of_contest: Option<bool>,
    /// Custom fields merged over the feed-provided ones.
    #[serde(default)]
    pub custom_fields: HashMap<String, String>,
}

/// Sparse problem patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemOverride {
    /// Replacement display name.
    pub name: Option<String>,
    /// Replacement scoreboard label.
    pub label: Option<String>,
    /// Replacement display color.
    pub color: Option<String>,
    /// Replacement maximum score.
    pub max_score: Option<f64>,
    /// Replacement merge mode.
    pub score_merge_mode: Option<ScoreMergeMode>,
    /// Replacement hidden flag.
    pub is_hidden: Option<bool>,
}

/// Sparse group patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupOverride {
    /// Replacement display name.
    pub display_name: Option<String>,
    /// Replacement hidden flag.
    pub is_hidden: Option<bool>,
    /// Replacement out-of-contest flag.
    pub is_out_of_contest: Option<bool>,
}

/// Sparse organization patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrgOverride {
    /// Replacement display name.
    pub display_name: Option<String>,
    /// Replacement full name.
    pub full_name: Option<String>,
}

/// The full live override rule set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TuningRules {
    /// Replacement contest name.
    pub name: Option<String>,
    /// Forced authoritative start moment.
    pub start_time_ms: Option<UnixMs>,
    /// Forced contest length.
    pub length_ms: Option<u64>,
    /// Forced freeze offset.
    pub freeze_ms: Option<u64>,
    /// Hold duration shown while before the forced start.
    pub hold_ms: Option<u64>,
    /// Per-team patches keyed by feed id.
    #[serde(default)]
    pub teams: HashMap<TeamId, TeamOverride>,
    /// Per-problem patches keyed by feed id.
    #[serde(default)]
    pub problems: HashMap<ProblemId, ProblemOverride>,
    /// Per-group patches keyed by feed id.
    #[serde(default)]
    pub groups: HashMap<GroupId, GroupOverride>,
    /// Per-organization patches keyed by feed id.
    #[serde(default)]
    pub organizations: HashMap<OrgId, OrgOverride>,
    /// Group memberships derived from team ids: group id -> pattern.
    #[serde(default)]
    pub group_regex: HashMap<GroupId, String>,
    /// Organization references derived from team ids: org id -> pattern.
    #[serde(default)]
    pub org_regex: HashMap<OrgId, String>,
    /// Team display-name template over `{id}`, `{name}`, `{org}`, and custom fields.
    pub team_name_template: Option<String>,
}

impl TuningRules {
    /// True when no override is set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Applies tuning rules to the upstream info stream.
pub struct OverridesStage {
    upstream: Option<Arc<ContestInfo>>,
    rules: TuningRules,
    group_regex: Vec<(GroupId, Regex)>,
    org_regex: Vec<(OrgId, Regex)>,
    deadline: Option<UnixMs>,
}

impl OverridesStage {
    /// Stage with an empty rule set.
    pub fn new() -> Self {
        Self {
            upstream: None,
            rules: TuningRules::default(),
            group_regex: Vec::new(),
            org_regex: Vec::new(),
            deadline: None,
        }
    }

    /// Stage with a pre-seeded rule set.
    pub fn with_rules(rules: TuningRules) -> Self {
        let mut stage = Self::new();
        stage.set_rules(rules);
        stage
    }

    fn set_rules(&mut self, rules: TuningRules) {
        self.group_regex = compile_rules(&rules.group_regex);
        self.org_regex = compile_rules(&rules.org_regex);
        self.rules = rules;
    }

    /// Rewrites the upstream info through the rule set and re-arms the
    /// schedule deadline.
    fn apply(&mut self, now: UnixMs) -> Option<ContestUpdate> {
        let upstream = self.upstream.as_ref()?;
        let mut info = (**upstream).clone();
        let rules = &self.rules;

        if let Some(name) = &rules.name {
            info.name = name.clone();
        }
        if let Some(length) = rules.length_ms {
            info.length_ms = length;
        }
        if let Some(freeze) = rules.freeze_ms {
            info.freeze_ms = Some(freeze);
        }

        for (id, patch) in &rules.teams {
            match info.teams.iter_mut().find(|t| t.id == *id) {
                Some(team) => {
                    if let Some(v) = &patch.display_name {
                        team.display_name = v.clone();
                    }
                    if let Some(v) = &patch.full_name {
                        team.full_name = v.clone();
                    }
                    if let Some(v) = &patch.groups {
                        team.groups = v.clone();
                    }
                    if let Some(v) = &patch.organization {
                        team.organization = Some(v.clone());
                    }
                    if let Some(v) = patch.is_hidden {
                        team.is_hidden = v;
                    }
                    if let Some(v) = patch.is_out_of_contest {
                        team.is_out_of_contest = v;
                    }
                    for (k, v) in &patch.custom_fields {
                        team.custom_fields.insert(k.clone(), v.clone());
                    }
                }
                None => warn!(team = %id, "tuning override references unknown team"),
            }
        }

        for (id, patch) in &rules.problems {
            match info.problems.iter_mut().find(|p| p.id == *id) {
                Some(problem) => {
                    if let Some(v) = &patch.name {
                        problem.name = v.clone();
                    }
                    if let Some(v) = &patch.label {
                        problem.label = v.clone();
                    }
                    if let Some(v) = &patch.color {
                        problem.color = Some(v.clone());
                    }
                    if let Some(v) = patch.max_score {
                        problem.max_score = Some(v);
                    }
                    if let Some(v) = patch.score_merge_mode {
                        problem.score_merge_mode = Some(v);
                    }
                    if let Some(v) = patch.is_hidden {
                        problem.is_hidden = v;
                    }
                }
                None => warn!(problem = %id, "tuning override references unknown problem"),
            }
        }

        for (id, patch) in &rules.groups {
            match info.groups.iter_mut().find(|g| g.id == *id) {
                Some(group) => {
                    if let Some(v) = &patch.display_name {
                        group.display_name = v.clone();
                    }
                    if let Some(v) = patch.is_hidden {
                        group.is_hidden = v;
                    }
                    if let Some(v) = patch.is_out_of_contest {
                        group.is_out_of_contest = v;
                    }
                }
                None => warn!(group = %id, "tuning override references unknown group"),
            }
        }

        for (id, patch) in &rules.organizations {
            match info.organizations.iter_mut().find(|o| o.id == *id) {
                Some(org) => {
                    if let Some(v) = &patch.display_name {
                        org.display_name = v.clone();
                    }
                    if let Some(v) = &patch.full_name {
                        org.full_name = v.clone();
                    }
                }
                None => warn!(organization = %id, "tuning override references unknown organization"),
            }
        }

        for team in &mut info.teams {
            for (gid, re) in &self.group_regex {
                if re.is_match(&team.id) && !team.groups.contains(gid) {
                    team.groups.push(gid.clone());
                }
            }
            for (oid, re) in &self.org_regex {
                if re.is_match(&team.id) {
                    team.organization = Some(oid.clone());
                    break;
                }
            }
        }

        if let Some(template) = &rules.team_name_template {
            let org_names: HashMap<&str, &str> = info
                .organizations
                .iter()
                .map(|o| (o.id.as_str(), o.display_name.as_str()))
                .collect();
            for team in &mut info.teams {
                team.display_name = render_template(template, team, &org_names);
            }
        }

        if let Some(start) = rules.start_time_ms {
            let length = info.length_ms;
            info.status = derive_status(now, start, length, rules.hold_ms);
            self.deadline = next_schedule_deadline(now, start, length);
        } else {
            self.deadline = None;
        }

        Some(ContestUpdate::Info(Arc::new(info)))
    }
}

impl Default for OverridesStage {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterStage for OverridesStage {
    fn process(&mut self, update: ContestUpdate) -> Vec<ContestUpdate> {
        let ContestUpdate::Info(info) = update else {
            return vec![update];
        };
        self.upstream = Some(Arc::clone(&info));
        if self.rules.is_empty() {
            return vec![ContestUpdate::Info(info)];
        }
        self.apply(now_ms()).into_iter().collect()
    }

    fn next_deadline(&self) -> Option<UnixMs> {
        self.deadline
    }

    fn on_timer(&mut self, now: UnixMs) -> Vec<ContestUpdate> {
        self.apply(now).into_iter().collect()
    }

    fn apply_tuning(&mut self, rules: &TuningRules) -> Vec<ContestUpdate> {
        self.set_rules(rules.clone());
        self.apply(now_ms()).into_iter().collect()
    }
}

fn compile_rules(patterns: &HashMap<String, String>) -> Vec<(String, Regex)> {
    let mut compiled: Vec<(String, Regex)> = patterns
        .iter()
        .filter_map(|(id, pattern)| match Regex::new(pattern) {
            Ok(re) => Some((id.clone(), re)),
            Err(err) => {
                warn!(id = %id, %err, "skipping invalid override pattern");
                None
            }
        })
        .collect();
    compiled.sort_by(|a, b| a.0.cmp(&b.0));
    compiled
}

fn render_template(
    template: &str,
    team: &crate::model::entities::TeamInfo,
    org_names: &HashMap<&str, &str>,
) -> String {
    let mut out = template.to_string();
    out = out.replace("{id}", &team.id);
    out = out.replace("{name}", &team.display_name);
    let org = team
        .organization
        .as_deref()
        .and_then(|id| org_names.get(id).copied())
        .unwrap_or("");
    out = out.replace("{org}", org);
    for (key, value) in &team.custom_fields {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

/// Status derived from the live wall clock against a forced schedule.
fn derive_status(now: UnixMs, start: UnixMs, length: u64, hold_ms: Option<u64>) -> ContestStatus {
    if now < start {
        ContestStatus::Before {
            hold_ms,
            scheduled_start: Some(start),
        }
    } else if now < start.saturating_add(length) {
        ContestStatus::Running {
            started_at: start,
            frozen_at: None,
        }
    } else {
        ContestStatus::Over {
            started_at: start,
            finished_at: start.saturating_add(length),
            frozen_at: None,
        }
    }
}

/// Next wall-clock moment the derived status changes, if one remains.
fn next_schedule_deadline(now: UnixMs, start: UnixMs, length: u64) -> Option<UnixMs> {
    if now < start {
        Some(start)
    } else {
        let end = start.saturating_add(length);
        (now < end).then_some(end)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
