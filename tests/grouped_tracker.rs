use std::sync::Arc;

use scorefeed::{
    engine::{grouping::RunGrouping, tracker::GroupedRunTracker},
    model::{
        contest::ContestInfo,
        run::{RunInfo, RunResult},
    },
    types::{ResultKind, TeamId, Verdict},
};

/// Toy grouping: per team, the earliest accepted visible run carries the
/// first-to-solve mark.
struct PerTeamFirstAccepted;

impl RunGrouping for PerTeamFirstAccepted {
    type Key = TeamId;

    fn key_of(&self, run: &RunInfo, _info: Option<&ContestInfo>) -> Option<Self::Key> {
        (!run.is_hidden).then(|| run.team_id.clone())
    }

    fn transform(
        &self,
        _key: &Self::Key,
        mut runs: Vec<RunInfo>,
        _info_before: Option<&ContestInfo>,
        _info_after: Option<&ContestInfo>,
    ) -> Vec<RunInfo> {
        let mut marked = false;
        for run in runs.iter_mut() {
            if let RunResult::Icpc {
                verdict,
                is_first_to_solve,
            } = &mut run.result
            {
                let wins = !marked && verdict.is_accepted();
                *is_first_to_solve = wins;
                marked = marked || wins;
            }
        }
        runs
    }

    fn clear_marks(&self, mut run: RunInfo) -> RunInfo {
        if let RunResult::Icpc {
            is_first_to_solve, ..
        } = &mut run.result
        {
            *is_first_to_solve = false;
        }
        run
    }
}

fn judged(id: &str, team: &str, time_ms: u64, verdict: Verdict) -> RunInfo {
    RunInfo {
        id: id.to_string(),
        result: RunResult::Icpc {
            verdict,
            is_first_to_solve: false,
        },
        problem_id: "a".to_string(),
        team_id: team.to_string(),
        language_id: None,
        time_ms,
        is_hidden: false,
    }
}

fn marked(run: &RunInfo) -> bool {
    matches!(
        run.result,
        RunResult::Icpc {
            is_first_to_solve: true,
            ..
        }
    )
}

#[test]
fn earliest_accepted_wins_and_corrections_remark() {
    let mut tracker = GroupedRunTracker::new(PerTeamFirstAccepted);

    let out = tracker.process_run(judged("2", "t1", 120_000, Verdict::Accepted));
    assert_eq!(out.len(), 1);
    assert!(marked(&out[0]));

    // A later accepted run changes nothing but itself.
    let out = tracker.process_run(judged("3", "t1", 180_000, Verdict::Accepted));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, "3");
    assert!(!marked(&out[0]));

    // An earlier accepted correction takes the mark away from run 2.
    let out = tracker.process_run(judged("1", "t1", 60_000, Verdict::Accepted));
    let ids: Vec<&str> = out.iter().map(|r| r.id.as_str()).collect();
    assert!(ids.contains(&"1") && ids.contains(&"2"));
    for run in &out {
        assert_eq!(marked(run), run.id == "1");
    }

    let group = tracker.group(&"t1".to_string()).expect("group");
    let times: Vec<u64> = group.iter().map(|r| r.time_ms).collect();
    assert_eq!(times, vec![60_000, 120_000, 180_000]);
}

#[test]
fn redundant_update_emits_only_the_trigger() {
    let mut tracker = GroupedRunTracker::new(PerTeamFirstAccepted);
    tracker.process_run(judged("1", "t1", 60_000, Verdict::Accepted));
    tracker.process_run(judged("2", "t1", 120_000, Verdict::WrongAnswer));

    let out = tracker.process_run(judged("2", "t1", 120_000, Verdict::WrongAnswer));
    let ids: Vec<&str> = out.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["2"]);
}

#[test]
fn key_change_recomputes_the_vacated_group() {
    let mut tracker = GroupedRunTracker::new(PerTeamFirstAccepted);
    tracker.process_run(judged("1", "t1", 60_000, Verdict::Accepted));
    tracker.process_run(judged("2", "t1", 120_000, Verdict::Accepted));

    // Correction moves run 1 to another team; run 2 inherits the mark.
    let out = tracker.process_run(judged("1", "t2", 60_000, Verdict::Accepted));
    let mut emitted: Vec<(&str, bool)> =
        out.iter().map(|r| (r.id.as_str(), marked(r))).collect();
    emitted.sort();
    assert_eq!(emitted, vec![("1", true), ("2", true)]);
    assert_eq!(tracker.group(&"t1".to_string()).map(|g| g.len()), Some(1));
}

#[test]
fn hidden_runs_leave_tracking_with_marks_cleared() {
    let mut tracker = GroupedRunTracker::new(PerTeamFirstAccepted);
    tracker.process_run(judged("1", "t1", 60_000, Verdict::Accepted));

    let mut hidden = judged("1", "t1", 60_000, Verdict::Accepted);
    hidden.is_hidden = true;
    let out = tracker.process_run(hidden);
    assert!(out.iter().all(|r| !marked(r)));
    assert_eq!(tracker.tracked_len(), 0);
}

#[test]
fn info_recompute_follows_the_predicate() {
    struct RecomputeAll;
    impl RunGrouping for RecomputeAll {
        type Key = TeamId;
        fn key_of(&self, run: &RunInfo, _info: Option<&ContestInfo>) -> Option<Self::Key> {
            Some(run.team_id.clone())
        }
        fn transform(
            &self,
            _key: &Self::Key,
            mut runs: Vec<RunInfo>,
            _before: Option<&ContestInfo>,
            after: Option<&ContestInfo>,
        ) -> Vec<RunInfo> {
            // Derived fact: runs are hidden while the info names an IOI contest.
            let hide = after.map(|i| i.result_kind == ResultKind::Ioi).unwrap_or(false);
            for run in runs.iter_mut() {
                run.is_hidden = hide;
            }
            runs
        }
        fn needs_recompute(
            &self,
            new_info: &ContestInfo,
            old_info: Option<&ContestInfo>,
            _key: &Self::Key,
        ) -> bool {
            old_info.map(|o| o.result_kind != new_info.result_kind).unwrap_or(true)
        }
    }

    let mut tracker = GroupedRunTracker::new(RecomputeAll);
    tracker.process_info(Arc::new(ContestInfo::new("c", ResultKind::Icpc)));
    tracker.process_run(judged("1", "t1", 60_000, Verdict::Accepted));

    let out = tracker.process_info(Arc::new(ContestInfo::new("c", ResultKind::Ioi)));
    assert_eq!(out.len(), 1);
    assert!(out[0].is_hidden);

    // Same info again: predicate false, nothing recomputed.
    let out = tracker.process_info(Arc::new(ContestInfo::new("c", ResultKind::Ioi)));
    assert!(out.is_empty());
}
