use std::sync::Arc;

use hashbrown::HashMap;
use proptest::prelude::*;

use scorefeed::{
    adapters::{Pipeline, PipelineConfig},
    model::{
        contest::{ContestInfo, ContestStatus},
        entities::{GroupInfo, ProblemInfo, TeamInfo},
        run::{RunInfo, RunResult},
    },
    state::StateTracker,
    types::{ResultKind, RunId, Verdict},
    update::ContestUpdate,
};

const LENGTH_MS: u64 = 18_000_000;

#[derive(Debug, Clone)]
enum Action {
    Submit {
        run: u8,
        problem: u8,
        team: u8,
        time: u32,
        accepted: bool,
    },
    HideGroup(bool),
    MoveFreeze(u32),
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0u8..12, 0u8..3, 0u8..4, 0u32..6_100, any::<bool>()).prop_map(
            |(run, problem, team, time, accepted)| Action::Submit {
                run,
                problem,
                team,
                time,
                accepted,
            }
        ),
        any::<bool>().prop_map(Action::HideGroup),
        (0u32..6_000).prop_map(Action::MoveFreeze),
    ]
}

fn contest(hidden_group: bool, freeze_ms: u64) -> ContestInfo {
    let mut info = ContestInfo::new("prop", ResultKind::Icpc);
    info.length_ms = LENGTH_MS;
    info.freeze_ms = Some(freeze_ms);
    info.status = ContestStatus::Running {
        started_at: 1_700_000_000_000,
        frozen_at: None,
    };
    info.problems = (0..3)
        .map(|i| ProblemInfo::new(format!("p{i}"), format!("{i}"), i))
        .collect();
    info.teams = (0..4)
        .map(|i| {
            let mut team = TeamInfo::new(format!("t{i}"), format!("Team {i}"));
            if i % 2 == 0 {
                team.groups = vec!["even".to_string()];
            }
            team
        })
        .collect();
    info.groups = vec![GroupInfo {
        id: "even".to_string(),
        display_name: "Even".to_string(),
        is_hidden: hidden_group,
        is_out_of_contest: false,
    }];
    info
}

fn submit(run: u8, problem: u8, team: u8, time: u32, accepted: bool) -> RunInfo {
    RunInfo {
        id: format!("r{run}"),
        result: RunResult::Icpc {
            verdict: if accepted {
                Verdict::Accepted
            } else {
                Verdict::WrongAnswer
            },
            is_first_to_solve: false,
        },
        problem_id: format!("p{problem}"),
        team_id: format!("t{team}"),
        language_id: None,
        time_ms: u64::from(time) * 3_000,
        is_hidden: false,
    }
}

fn is_accepted_visible(run: &RunInfo) -> bool {
    !run.is_hidden && run.result.is_accepted()
}

fn fts_flag(run: &RunInfo) -> bool {
    matches!(
        run.result,
        RunResult::Icpc {
            is_first_to_solve: true,
            ..
        }
    )
}

proptest! {
    #[test]
    fn pipeline_invariants_hold_under_random_streams(
        actions in prop::collection::vec(action_strategy(), 1..120)
    ) {
        let mut pipeline = Pipeline::new(&PipelineConfig::default());
        let mut tracker = StateTracker::new();
        let mut hidden_group = false;
        let mut freeze_ms: u64 = 12_000_000;
        // What was actually fed upstream, latest value per run id.
        let mut upstream: HashMap<RunId, RunInfo> = HashMap::new();

        let feed = |pipeline: &mut Pipeline, tracker: &mut StateTracker, update: ContestUpdate| {
            for out in pipeline.process(update) {
                tracker.apply(out);
            }
        };

        feed(&mut pipeline, &mut tracker, ContestUpdate::Info(Arc::new(contest(hidden_group, freeze_ms))));

        for action in actions {
            match action {
                Action::Submit { run, problem, team, time, accepted } => {
                    let info = submit(run, problem, team, time, accepted);
                    upstream.insert(info.id.clone(), info.clone());
                    feed(&mut pipeline, &mut tracker, ContestUpdate::Run(info));
                }
                Action::HideGroup(hidden) => {
                    hidden_group = hidden;
                    feed(&mut pipeline, &mut tracker, ContestUpdate::Info(Arc::new(contest(hidden_group, freeze_ms))));
                }
                Action::MoveFreeze(raw) => {
                    freeze_ms = u64::from(raw) * 3_000;
                    feed(&mut pipeline, &mut tracker, ContestUpdate::Info(Arc::new(contest(hidden_group, freeze_ms))));
                }
            }

            let visible: Vec<&RunInfo> = tracker.runs().values().collect();

            // Hidden propagation closure: a run is hidden exactly when its
            // team sits in the hidden group or it falls past the contest end.
            for run in &visible {
                let source = &upstream[&run.id];
                let team_hidden = hidden_group
                    && source.team_id.trim_start_matches('t').parse::<u32>().unwrap() % 2 == 0;
                let past_end = source.time_ms > LENGTH_MS;
                prop_assert_eq!(run.is_hidden, team_hidden || past_end, "run {}", run.id);
            }

            // Freeze purity: redaction is a function of (time, freeze).
            for run in &visible {
                let source = &upstream[&run.id];
                if source.time_ms >= freeze_ms {
                    prop_assert!(run.result.is_in_progress(), "run {} not redacted", run.id);
                } else {
                    prop_assert_eq!(
                        std::mem::discriminant(&run.result),
                        std::mem::discriminant(&source.result),
                        "run {} result class changed",
                        run.id
                    );
                }
            }

            // First-to-solve uniqueness per problem, earliest by (time, id).
            for problem in ["p0", "p1", "p2"] {
                let marked: Vec<&&RunInfo> = visible
                    .iter()
                    .filter(|r| r.problem_id == problem && fts_flag(r))
                    .collect();
                prop_assert!(marked.len() <= 1, "{} has {} marks", problem, marked.len());
                if let Some(first) = marked.first() {
                    prop_assert!(is_accepted_visible(first));
                    for other in visible
                        .iter()
                        .filter(|r| r.problem_id == problem && is_accepted_visible(r))
                    {
                        prop_assert!(
                            first.order_key() <= other.order_key(),
                            "{} marked but {} is earlier",
                            first.id,
                            other.id
                        );
                    }
                }
            }
        }
    }
}
