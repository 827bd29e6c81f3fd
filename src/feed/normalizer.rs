//! Stateful feed normalizer.
//!
//! Holds per-entity-type tables keyed by the feed's native ids plus reverse
//! reference indices, and turns raw events into normalized contest-info, run,
//! and commentary updates. Link helpers mutate the reverse indices and return
//! the submission ids whose derived run view must be recomputed.

use std::collections::BTreeSet;
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::feed::event::{EventKind, RawFeedEvent};
use crate::feed::wire::{
    WireCommentary, WireContest, WireGroup, WireJudgement, WireJudgementType, WireLanguage,
    WireOrganization, WireProblem, WireRun, WireState, WireSubmission, WireTeam,
    parse_abs_time_ms, parse_rel_time_ms, verdict_from_type_id,
};
use crate::model::commentary::CommentaryMessage;
use crate::model::contest::{ContestInfo, ContestStatus};
use crate::model::entities::{GroupInfo, LanguageInfo, OrganizationInfo, ProblemInfo, TeamInfo};
use crate::model::run::{RunInfo, RunResult};
use crate::types::{ResultKind, Verdict};
use crate::update::ContestUpdate;

/// Ingestion failure taxonomy.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The event-level id disputes the payload's own id field. Fatal:
    /// accepting either side would corrupt cross-references.
    #[error("{kind:?} event id {event_id:?} disputes payload id {payload_id:?}")]
    IdMismatch {
        /// Event entity type.
        kind: EventKind,
        /// Id carried on the event envelope.
        event_id: String,
        /// Id carried inside the payload.
        payload_id: String,
    },
    /// The payload did not decode as the expected shape.
    #[error("malformed {kind:?} payload: {source}")]
    MalformedPayload {
        /// Event entity type.
        kind: EventKind,
        /// Decode failure.
        #[source]
        source: serde_json::Error,
    },
    /// A removal event without an id to remove.
    #[error("{kind:?} removal carries no id")]
    MissingId {
        /// Event entity type.
        kind: EventKind,
    },
}

/// Turns raw feed events into normalized updates.
#[derive(Debug, Default)]
pub struct FeedNormalizer {
    contest: Option<WireContest>,
    state: WireState,
    judgement_types: HashMap<String, WireJudgementType>,
    languages: HashMap<String, WireLanguage>,
    groups: HashMap<String, WireGroup>,
    organizations: HashMap<String, WireOrganization>,
    teams: HashMap<String, WireTeam>,
    problems: HashMap<String, WireProblem>,
    submissions: HashMap<String, WireSubmission>,
    removed_submissions: HashSet<String>,
    judgements: HashMap<String, WireJudgement>,
    test_runs: HashMap<String, WireRun>,
    commentary: HashMap<String, WireCommentary>,
    judgements_by_submission: HashMap<String, HashSet<String>>,
    judgement_submission: HashMap<String, String>,
    runs_by_judgement: HashMap<String, HashSet<String>>,
    run_judgement: HashMap<String, String>,
    seen_tokens: HashSet<String>,
}

impl FeedNormalizer {
    /// Empty normalizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event, returning the updates it produced.
    ///
    /// Events whose token was already processed are dropped, which keeps
    /// replayed lines across an outage boundary from producing work.
    pub fn apply_event(
        &mut self,
        event: RawFeedEvent,
    ) -> Result<Vec<ContestUpdate>, IngestError> {
        if let Some(token) = event.token.clone() {
            if !self.seen_tokens.insert(token) {
                return Ok(Vec::new());
            }
        }

        match event.kind {
            EventKind::Contest => {
                self.apply_contest(&event)?;
                Ok(vec![ContestUpdate::Info(self.build_info())])
            }
            EventKind::State => {
                self.apply_state(&event)?;
                Ok(vec![ContestUpdate::Info(self.build_info())])
            }
            EventKind::JudgementTypes => {
                apply_keyed(&mut self.judgement_types, &event, |r| r.id.as_str())?;
                Ok(vec![ContestUpdate::Info(self.build_info())])
            }
            EventKind::Languages => {
                apply_keyed(&mut self.languages, &event, |r| r.id.as_str())?;
                Ok(vec![ContestUpdate::Info(self.build_info())])
            }
            EventKind::Groups => {
                apply_keyed(&mut self.groups, &event, |r| r.id.as_str())?;
                Ok(vec![ContestUpdate::Info(self.build_info())])
            }
            EventKind::Organizations => {
                apply_keyed(&mut self.organizations, &event, |r| r.id.as_str())?;
                Ok(vec![ContestUpdate::Info(self.build_info())])
            }
            EventKind::Teams => {
                apply_keyed(&mut self.teams, &event, |r| r.id.as_str())?;
                Ok(vec![ContestUpdate::Info(self.build_info())])
            }
            EventKind::Problems => {
                apply_keyed(&mut self.problems, &event, |r| r.id.as_str())?;
                Ok(vec![ContestUpdate::Info(self.build_info())])
            }
            EventKind::Submissions => self.apply_submissions(&event),
            EventKind::Judgements => self.apply_judgements(&event),
            EventKind::Runs => self.apply_test_runs(&event),
            EventKind::Commentary => self.apply_commentary(&event),
            EventKind::Accounts
            | EventKind::Persons
            | EventKind::Clarifications
            | EventKind::Awards => {
                debug!(kind = ?event.kind, "ignoring feed event type");
                Ok(Vec::new())
            }
            EventKind::Unknown => {
                warn!("skipping event of unknown type");
                Ok(Vec::new())
            }
        }
    }

    /// Current normalized contest info.
    pub fn current_info(&self) -> Arc<ContestInfo> {
        self.build_info()
    }

    fn apply_contest(&mut self, event: &RawFeedEvent) -> Result<(), IngestError> {
        match &event.data {
            Some(data) => {
                let row: WireContest = decode(event.kind, data)?;
                check_id(event, &row.id)?;
                self.contest = Some(row);
            }
            None => {
                self.contest = None;
            }
        }
        Ok(())
    }

    fn apply_state(&mut self, event: &RawFeedEvent) -> Result<(), IngestError> {
        let Some(data) = &event.data else {
            return Ok(());
        };
        let row: WireState = decode(event.kind, data)?;
        // Field-wise monotonic merge: a state field never reverts to unset.
        if row.started.is_some() {
            self.state.started = row.started;
        }
        if row.ended.is_some() {
            self.state.ended = row.ended;
        }
        if row.frozen.is_some() {
            self.state.frozen = row.frozen;
        }
        if row.finalized.is_some() {
            self.state.finalized = row.finalized;
        }
        if row.end_of_updates.is_some() {
            self.state.end_of_updates = row.end_of_updates;
        }
        Ok(())
    }

    fn apply_submissions(
        &mut self,
        event: &RawFeedEvent,
    ) -> Result<Vec<ContestUpdate>, IngestError> {
        let mut touched = Vec::new();
        if event.batch {
            let rows: Vec<WireSubmission> =
                decode(event.kind, event.data.as_ref().unwrap_or(&serde_json::Value::Null))?;
            let fresh_ids: HashSet<String> = rows.iter().map(|r| r.id.clone()).collect();
            for row in rows {
                self.removed_submissions.remove(&row.id);
                touched.push(row.id.clone());
                self.submissions.insert(row.id.clone(), row);
            }
            let absent: Vec<String> = self
                .submissions
                .keys()
                .filter(|id| !fresh_ids.contains(*id))
                .cloned()
                .collect();
            for id in absent {
                if self.removed_submissions.insert(id.clone()) {
                    touched.push(id);
                }
            }
        } else {
            match &event.data {
                Some(data) => {
                    let row: WireSubmission = decode(event.kind, data)?;
                    check_id(event, &row.id)?;
                    self.removed_submissions.remove(&row.id);
                    touched.push(row.id.clone());
                    self.submissions.insert(row.id.clone(), row);
                }
                None => {
                    let id = event
                        .id
                        .clone()
                        .ok_or(IngestError::MissingId { kind: event.kind })?;
                    // Tombstone: the row is kept so the hidden view still resolves.
                    self.removed_submissions.insert(id.clone());
                    touched.push(id);
                }
            }
        }
        Ok(touched
            .iter()
            .filter_map(|id| self.run_update(id))
            .collect())
    }

    fn apply_judgements(
        &mut self,
        event: &RawFeedEvent,
    ) -> Result<Vec<ContestUpdate>, IngestError> {
        let touched = apply_keyed(&mut self.judgements, event, |r| r.id.as_str())?;
        let mut affected = BTreeSet::new();
        for jid in &touched {
            let linked = self.judgements.get(jid).map(|j| j.submission_id.clone());
            affected.extend(self.relink_judgement(jid, linked));
        }
        Ok(affected
            .iter()
            .filter_map(|sid| self.run_update(sid))
            .collect())
    }

    fn apply_test_runs(
        &mut self,
        event: &RawFeedEvent,
    ) -> Result<Vec<ContestUpdate>, IngestError> {
        let touched = apply_keyed(&mut self.test_runs, event, |r| r.id.as_str())?;
        let mut affected = BTreeSet::new();
        for rid in &touched {
            let linked = self.test_runs.get(rid).map(|r| r.judgement_id.clone());
            for jid in self.relink_test_run(rid, linked) {
                if let Some(sid) = self.judgement_submission.get(&jid) {
                    affected.insert(sid.clone());
                }
            }
        }
        Ok(affected
            .iter()
            .filter_map(|sid| self.run_update(sid))
            .collect())
    }

    fn apply_commentary(
        &mut self,
        event: &RawFeedEvent,
    ) -> Result<Vec<ContestUpdate>, IngestError> {
        let touched = apply_keyed(&mut self.commentary, event, |r| r.id.as_str())?;
        Ok(touched
            .iter()
            .filter_map(|id| self.commentary.get(id))
            .map(|row| ContestUpdate::Commentary(self.message_from(row)))
            .collect())
    }

    /// Moves a judgement's reverse link, returning the submissions whose run
    /// view must be recomputed.
    fn relink_judgement(&mut self, jid: &str, submission: Option<String>) -> Vec<String> {
        let mut affected = Vec::new();
        if let Some(old) = self.judgement_submission.get(jid).cloned() {
            if submission.as_deref() != Some(old.as_str()) {
                if let Some(set) = self.judgements_by_submission.get_mut(&old) {
                    set.remove(jid);
                }
                self.judgement_submission.remove(jid);
                affected.push(old);
            }
        }
        if let Some(sid) = submission {
            self.judgements_by_submission
                .entry(sid.clone())
                .or_default()
                .insert(jid.to_string());
            self.judgement_submission.insert(jid.to_string(), sid.clone());
            affected.push(sid);
        }
        affected
    }

    /// Moves a test run's reverse link, returning the affected judgements.
    fn relink_test_run(&mut self, rid: &str, judgement: Option<String>) -> Vec<String> {
        let mut affected = Vec::new();
        if let Some(old) = self.run_judgement.get(rid).cloned() {
            if judgement.as_deref() != Some(old.as_str()) {
                if let Some(set) = self.runs_by_judgement.get_mut(&old) {
                    set.remove(rid);
                }
                self.run_judgement.remove(rid);
                affected.push(old);
            }
        }
        if let Some(jid) = judgement {
            self.runs_by_judgement
                .entry(jid.clone())
                .or_default()
                .insert(rid.to_string());
            self.run_judgement.insert(rid.to_string(), jid.clone());
            affected.push(jid);
        }
        affected
    }

    /// Recomputes one submission's effective run view.
    fn run_update(&self, sid: &str) -> Option<ContestUpdate> {
        let Some(sub) = self.submissions.get(sid) else {
            warn!(submission = %sid, "update references unknown submission");
            return None;
        };
        let current = self
            .judgements_by_submission
            .get(sid)
            .into_iter()
            .flatten()
            .filter_map(|jid| self.judgements.get(jid))
            .max_by_key(|j| {
                (
                    j.start_contest_time
                        .as_deref()
                        .and_then(parse_rel_time_ms)
                        .unwrap_or(0),
                    j.id.clone(),
                )
            });

        let result = match current {
            None => RunResult::pending(),
            Some(judgement) => self.result_of(judgement, &sub.problem_id),
        };
        let time_ms = sub
            .contest_time
            .as_deref()
            .and_then(parse_rel_time_ms)
            .map(|t| t.max(0) as u64)
            .unwrap_or(0);

        Some(ContestUpdate::Run(RunInfo {
            id: sid.to_string(),
            result,
            problem_id: sub.problem_id.clone(),
            team_id: sub.team_id.clone(),
            language_id: sub.language_id.clone(),
            time_ms,
            is_hidden: self.removed_submissions.contains(sid),
        }))
    }

    fn result_of(&self, judgement: &WireJudgement, problem_id: &str) -> RunResult {
        match &judgement.judgement_type_id {
            Some(tid) => {
                let row = self.judgement_types.get(tid);
                if row.is_none() {
                    warn!(judgement_type = %tid, "judgement references unknown type");
                }
                let verdict = verdict_from_type_id(tid).or_else(|| {
                    row.and_then(|r| r.solved).map(|solved| {
                        if solved {
                            Verdict::Accepted
                        } else {
                            Verdict::Rejected
                        }
                    })
                });
                match (verdict, self.result_kind()) {
                    (None, _) => RunResult::pending(),
                    (Some(verdict), ResultKind::Icpc) => RunResult::Icpc {
                        verdict,
                        is_first_to_solve: false,
                    },
                    (Some(verdict), ResultKind::Ioi) => RunResult::Ioi {
                        score: vec![judgement.score.unwrap_or(0.0)],
                        wrong_verdict: (!verdict.is_accepted()).then_some(verdict),
                        difference: 0.0,
                        score_after: 0.0,
                        is_first_best_run: false,
                        is_first_best_team_run: false,
                    },
                }
            }
            None => {
                let done = self
                    .runs_by_judgement
                    .get(&judgement.id)
                    .map(|set| set.len())
                    .unwrap_or(0);
                let total = self
                    .problems
                    .get(problem_id)
                    .and_then(|p| p.test_data_count)
                    .unwrap_or(0);
                let tested_fraction = if total > 0 {
                    (done as f64 / total as f64).min(1.0)
                } else {
                    0.0
                };
                RunResult::InProgress { tested_fraction }
            }
        }
    }

    fn result_kind(&self) -> ResultKind {
        match self
            .contest
            .as_ref()
            .and_then(|c| c.scoreboard_type.as_deref())
        {
            Some("score") => ResultKind::Ioi,
            _ => ResultKind::Icpc,
        }
    }

    fn build_info(&self) -> Arc<ContestInfo> {
        let contest = self.contest.clone().unwrap_or_default();
        let name = contest
            .formal_name
            .clone()
            .or_else(|| contest.name.clone())
            .unwrap_or_else(|| contest.id.clone());

        let mut info = ContestInfo::new(name, self.result_kind());
        if let Some(length) = contest.duration.as_deref().and_then(parse_rel_time_ms) {
            info.length_ms = length.max(0) as u64;
        }
        if let Some(freeze_len) = contest
            .scoreboard_freeze_duration
            .as_deref()
            .and_then(parse_rel_time_ms)
        {
            info.freeze_ms = Some(info.length_ms.saturating_sub(freeze_len.max(0) as u64));
        }
        if let Some(penalty) = contest.penalty_time {
            info.penalty_per_wrong_ms = (penalty.max(0) as u64) * 60_000;
        }
        info.status = self.build_status(&contest);

        let mut problems: Vec<&WireProblem> = self.problems.values().collect();
        problems.sort_by_key(|p| (p.ordinal.unwrap_or(u32::MAX), p.id.clone()));
        info.problems = problems
            .into_iter()
            .enumerate()
            .map(|(idx, row)| ProblemInfo {
                id: row.id.clone(),
                label: row.label.clone().unwrap_or_else(|| row.id.clone()),
                name: row
                    .name
                    .clone()
                    .or_else(|| row.label.clone())
                    .unwrap_or_else(|| row.id.clone()),
                ordinal: row.ordinal.unwrap_or(idx as u32),
                color: row.rgb.clone().or_else(|| row.color.clone()),
                max_score: row.max_score,
                score_merge_mode: None,
                test_data_count: row.test_data_count,
                is_hidden: false,
            })
            .collect();

        let mut teams: Vec<&WireTeam> = self.teams.values().collect();
        teams.sort_by_key(|t| t.id.clone());
        info.teams = teams
            .into_iter()
            .map(|row| {
                let display = row
                    .display_name
                    .clone()
                    .or_else(|| row.name.clone())
                    .unwrap_or_else(|| row.id.clone());
                TeamInfo {
                    id: row.id.clone(),
                    full_name: row.name.clone().unwrap_or_else(|| display.clone()),
                    display_name: display,
                    groups: row.group_ids.clone(),
                    organization: row.organization_id.clone(),
                    is_hidden: row.hidden.unwrap_or(false),
                    is_out_of_contest: false,
                    custom_fields: HashMap::new(),
                }
            })
            .collect();

        let mut groups: Vec<&WireGroup> = self.groups.values().collect();
        groups.sort_by_key(|g| g.id.clone());
        info.groups = groups
            .into_iter()
            .map(|row| GroupInfo {
                id: row.id.clone(),
                display_name: row.name.clone().unwrap_or_else(|| row.id.clone()),
                is_hidden: row.hidden.unwrap_or(false),
                is_out_of_contest: false,
            })
            .collect();

        let mut orgs: Vec<&WireOrganization> = self.organizations.values().collect();
        orgs.sort_by_key(|o| o.id.clone());
        info.organizations = orgs
            .into_iter()
            .map(|row| {
                let display = row.name.clone().unwrap_or_else(|| row.id.clone());
                OrganizationInfo {
                    id: row.id.clone(),
                    full_name: row.formal_name.clone().unwrap_or_else(|| display.clone()),
                    display_name: display,
                }
            })
            .collect();

        let mut languages: Vec<&WireLanguage> = self.languages.values().collect();
        languages.sort_by_key(|l| l.id.clone());
        info.languages = languages
            .into_iter()
            .map(|row| LanguageInfo {
                id: row.id.clone(),
                name: row.name.clone().unwrap_or_else(|| row.id.clone()),
                extensions: row.extensions.clone(),
            })
            .collect();

        Arc::new(info)
    }

    fn build_status(&self, contest: &WireContest) -> ContestStatus {
        let started = self.state.started.as_deref().and_then(parse_abs_time_ms);
        let ended = self.state.ended.as_deref().and_then(parse_abs_time_ms);
        let frozen = self.state.frozen.as_deref().and_then(parse_abs_time_ms);
        let finalized = self.state.finalized.as_deref().and_then(parse_abs_time_ms);
        let archived = self.state.end_of_updates.is_some();

        match (started, ended) {
            (None, _) => ContestStatus::Before {
                hold_ms: contest
                    .countdown_pause_time
                    .as_deref()
                    .and_then(parse_rel_time_ms)
                    .map(|t| t.max(0) as u64),
                scheduled_start: contest.start_time.as_deref().and_then(parse_abs_time_ms),
            },
            (Some(started_at), None) => ContestStatus::Running {
                started_at,
                frozen_at: frozen,
            },
            (Some(started_at), Some(finished_at)) => {
                let finalized_at = finalized.or_else(|| archived.then_some(finished_at));
                match finalized_at {
                    Some(finalized_at) => ContestStatus::Finalized {
                        started_at,
                        finished_at,
                        frozen_at: frozen,
                        finalized_at,
                    },
                    None => ContestStatus::Over {
                        started_at,
                        finished_at,
                        frozen_at: frozen,
                    },
                }
            }
        }
    }

    fn message_from(&self, row: &WireCommentary) -> CommentaryMessage {
        CommentaryMessage {
            id: row.id.clone(),
            message: row.message.clone(),
            time_unix_ms: row.time.as_deref().and_then(parse_abs_time_ms).unwrap_or(0),
            time_ms: row
                .contest_time
                .as_deref()
                .and_then(parse_rel_time_ms)
                .map(|t| t.max(0) as u64)
                .unwrap_or(0),
            team_ids: row.team_ids.clone(),
            run_ids: row.submission_ids.clone(),
            priority: row.priority.unwrap_or(0),
            tags: row.tags.clone(),
        }
    }
}

/// Upserts into an id-keyed table, returning the touched ids.
///
/// Batch payloads replace the whole table; ids absent from the batch are
/// removed. A singular payload must agree with the event-level id.
fn apply_keyed<T: DeserializeOwned>(
    table: &mut HashMap<String, T>,
    event: &RawFeedEvent,
    id_of: impl Fn(&T) -> &str,
) -> Result<Vec<String>, IngestError> {
    if event.batch {
        let rows: Vec<T> = decode(
            event.kind,
            event.data.as_ref().unwrap_or(&serde_json::Value::Null),
        )?;
        let mut fresh: HashMap<String, T> = HashMap::with_capacity(rows.len());
        let mut touched: Vec<String> = Vec::with_capacity(rows.len());
        for row in rows {
            let id = id_of(&row).to_string();
            touched.push(id.clone());
            fresh.insert(id, row);
        }
        touched.extend(
            table
                .keys()
                .filter(|id| !fresh.contains_key(*id))
                .cloned(),
        );
        *table = fresh;
        Ok(touched)
    } else {
        match &event.data {
            Some(data) => {
                let row: T = decode(event.kind, data)?;
                let id = id_of(&row).to_string();
                check_id(event, &id)?;
                table.insert(id.clone(), row);
                Ok(vec![id])
            }
            None => {
                let id = event
                    .id
                    .clone()
                    .ok_or(IngestError::MissingId { kind: event.kind })?;
                table.remove(&id);
                Ok(vec![id])
            }
        }
    }
}

fn decode<T: DeserializeOwned>(
    kind: EventKind,
    data: &serde_json::Value,
) -> Result<T, IngestError> {
    serde_json::from_value(data.clone())
        .map_err(|source| IngestError::MalformedPayload { kind, source })
}

fn check_id(event: &RawFeedEvent, payload_id: &str) -> Result<(), IngestError> {
    match &event.id {
        Some(event_id) if event_id != payload_id => Err(IngestError::IdMismatch {
            kind: event.kind,
            event_id: event_id.clone(),
            payload_id: payload_id.to_string(),
        }),
        _ => Ok(()),
    }
}
