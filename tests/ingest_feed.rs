use scorefeed::{
    feed::{
        event::{EventKind, RawFeedEvent},
        normalizer::{FeedNormalizer, IngestError},
        reorder::StartupReorderBuffer,
        wire::{parse_abs_time_ms, parse_rel_time_ms},
    },
    model::run::RunResult,
    types::Verdict,
    update::ContestUpdate,
};

fn event(line: &str) -> RawFeedEvent {
    RawFeedEvent::parse(line).expect("parse feed line")
}

fn apply(normalizer: &mut FeedNormalizer, line: &str) -> Vec<ContestUpdate> {
    normalizer.apply_event(event(line)).expect("apply event")
}

fn seed_contest(normalizer: &mut FeedNormalizer) {
    apply(
        normalizer,
        r#"{"type":"contest","id":"c1","data":{"id":"c1","formal_name":"Sample Cup","duration":"5:00:00","scoreboard_freeze_duration":"1:00:00","penalty_time":20,"start_time":"2024-03-01T09:00:00+00:00"}}"#,
    );
    apply(
        normalizer,
        r#"{"type":"judgement-types","id":"AC","data":{"id":"AC","name":"accepted","solved":true,"penalty":false}}"#,
    );
    apply(
        normalizer,
        r#"{"type":"judgement-types","id":"WA","data":{"id":"WA","name":"wrong answer","solved":false,"penalty":true}}"#,
    );
    apply(
        normalizer,
        r##"{"type":"problems","id":"a","data":{"id":"a","label":"A","name":"Apples","ordinal":0,"rgb":"#aa0000","test_data_count":4}}"##,
    );
    apply(
        normalizer,
        r#"{"type":"teams","id":"t1","data":{"id":"t1","name":"Rocket","organization_id":"org1","group_ids":["g1"]}}"#,
    );
}

#[test]
fn contest_events_build_normalized_info() {
    let mut normalizer = FeedNormalizer::new();
    seed_contest(&mut normalizer);

    let info = normalizer.current_info();
    assert_eq!(info.name, "Sample Cup");
    assert_eq!(info.length_ms, 5 * 3_600_000);
    assert_eq!(info.freeze_ms, Some(4 * 3_600_000));
    assert_eq!(info.penalty_per_wrong_ms, 20 * 60_000);
    assert_eq!(info.problems.len(), 1);
    assert_eq!(info.problems[0].label, "A");
    assert_eq!(info.teams[0].display_name, "Rocket");
    // Group/organization references are resolved by the adapter stage, not
    // dropped by the normalizer.
    assert_eq!(info.teams[0].groups, vec!["g1".to_string()]);
    assert!(info.status.is_before());

    let updates = apply(
        &mut normalizer,
        r#"{"type":"state","data":{"started":"2024-03-01T09:00:00+00:00"}}"#,
    );
    let info = updates[0].as_info().expect("info update");
    assert_eq!(
        info.status.started_at(),
        parse_abs_time_ms("2024-03-01T09:00:00+00:00")
    );
}

#[test]
fn judgement_linking_yields_run_lifecycle() {
    let mut normalizer = FeedNormalizer::new();
    seed_contest(&mut normalizer);

    let updates = apply(
        &mut normalizer,
        r#"{"type":"submissions","id":"s1","data":{"id":"s1","problem_id":"a","team_id":"t1","contest_time":"0:10:00"}}"#,
    );
    let run = updates[0].as_run().expect("run update");
    assert_eq!(run.id, "s1");
    assert_eq!(run.time_ms, 600_000);
    assert!(run.result.is_in_progress());

    // Judging starts without an outcome: progress comes from test runs.
    apply(
        &mut normalizer,
        r#"{"type":"judgements","id":"j1","data":{"id":"j1","submission_id":"s1","start_contest_time":"0:10:05"}}"#,
    );
    let updates = apply(
        &mut normalizer,
        r#"{"type":"runs","id":"tr1","data":{"id":"tr1","judgement_id":"j1","ordinal":1}}"#,
    );
    let run = updates[0].as_run().expect("run update");
    match run.result {
        RunResult::InProgress { tested_fraction } => assert_eq!(tested_fraction, 0.25),
        ref other => panic!("expected progress, got {other:?}"),
    }

    // The outcome lands.
    let updates = apply(
        &mut normalizer,
        r#"{"type":"judgements","id":"j1","data":{"id":"j1","submission_id":"s1","judgement_type_id":"AC","start_contest_time":"0:10:05"}}"#,
    );
    let run = updates[0].as_run().expect("run update");
    assert!(matches!(
        run.result,
        RunResult::Icpc {
            verdict: Verdict::Accepted,
            ..
        }
    ));

    // A corrected judgement with a later start supersedes the first.
    let updates = apply(
        &mut normalizer,
        r#"{"type":"judgements","id":"j2","data":{"id":"j2","submission_id":"s1","judgement_type_id":"WA","start_contest_time":"0:30:00"}}"#,
    );
    let run = updates[0].as_run().expect("run update");
    assert!(matches!(
        run.result,
        RunResult::Icpc {
            verdict: Verdict::WrongAnswer,
            ..
        }
    ));
}

#[test]
fn submission_removal_tombstones_and_batch_replaces() {
    let mut normalizer = FeedNormalizer::new();
    seed_contest(&mut normalizer);

    apply(
        &mut normalizer,
        r#"{"type":"submissions","id":"s1","data":{"id":"s1","problem_id":"a","team_id":"t1","contest_time":"0:10:00"}}"#,
    );
    let updates = apply(&mut normalizer, r#"{"type":"submissions","id":"s1","op":"delete"}"#);
    let run = updates[0].as_run().expect("run update");
    assert!(run.is_hidden);

    // A batch that re-lists s1 revives it and drops s2.
    apply(
        &mut normalizer,
        r#"{"type":"submissions","id":"s2","data":{"id":"s2","problem_id":"a","team_id":"t1","contest_time":"0:12:00"}}"#,
    );
    let updates = apply(
        &mut normalizer,
        r#"{"type":"submissions","data":[{"id":"s1","problem_id":"a","team_id":"t1","contest_time":"0:10:00"}]}"#,
    );
    let mut by_id: Vec<(&str, bool)> = updates
        .iter()
        .filter_map(|u| u.as_run())
        .map(|r| (r.id.as_str(), r.is_hidden))
        .collect();
    by_id.sort();
    assert_eq!(by_id, vec![("s1", false), ("s2", true)]);
}

#[test]
fn disputed_event_id_is_fatal() {
    let mut normalizer = FeedNormalizer::new();
    let err = normalizer
        .apply_event(event(
            r#"{"type":"teams","id":"t1","data":{"id":"t9","name":"Imposter"}}"#,
        ))
        .expect_err("id dispute must fail");
    assert!(matches!(err, IngestError::IdMismatch { .. }));
}

#[test]
fn duplicate_tokens_are_dropped_across_reconnects() {
    let mut normalizer = FeedNormalizer::new();
    let line = r#"{"type":"teams","id":"t1","data":{"id":"t1","name":"Rocket"},"token":"tok-17"}"#;
    assert!(!apply(&mut normalizer, line).is_empty());
    assert!(apply(&mut normalizer, line).is_empty());
}

#[test]
fn scored_contests_map_judgements_to_ioi_results() {
    let mut normalizer = FeedNormalizer::new();
    apply(
        &mut normalizer,
        r#"{"type":"contest","id":"c1","data":{"id":"c1","name":"Olympiad","duration":"5:00:00","scoreboard_type":"score"}}"#,
    );
    apply(
        &mut normalizer,
        r#"{"type":"judgement-types","id":"AC","data":{"id":"AC","solved":true}}"#,
    );
    apply(
        &mut normalizer,
        r#"{"type":"problems","id":"a","data":{"id":"a","label":"A","max_score":100}}"#,
    );
    apply(
        &mut normalizer,
        r#"{"type":"submissions","id":"s1","data":{"id":"s1","problem_id":"a","team_id":"t1","contest_time":"0:05:00"}}"#,
    );
    let updates = apply(
        &mut normalizer,
        r#"{"type":"judgements","id":"j1","data":{"id":"j1","submission_id":"s1","judgement_type_id":"AC","score":72.5}}"#,
    );
    let run = updates[0].as_run().expect("run update");
    match &run.result {
        RunResult::Ioi {
            score,
            wrong_verdict,
            ..
        } => {
            assert_eq!(score, &vec![72.5]);
            assert!(wrong_verdict.is_none());
        }
        other => panic!("expected ioi result, got {other:?}"),
    }
}

#[test]
fn end_of_updates_sentinel_finalizes() {
    let mut normalizer = FeedNormalizer::new();
    seed_contest(&mut normalizer);
    apply(
        &mut normalizer,
        r#"{"type":"state","data":{"started":"2024-03-01T09:00:00+00:00"}}"#,
    );
    let updates = apply(
        &mut normalizer,
        r#"{"type":"state","data":{"started":"2024-03-01T09:00:00+00:00","ended":"2024-03-01T14:00:00+00:00","end_of_updates":"2024-03-01T15:00:00+00:00"}}"#,
    );
    let info = updates[0].as_info().expect("info update");
    assert!(info.status.is_finalized());
}

#[test]
fn startup_prefix_sorts_info_types_first_and_defers_sentinel() {
    let mut buf = StartupReorderBuffer::new(16);
    let lines = [
        r#"{"type":"submissions","id":"s1","data":{"id":"s1","problem_id":"a","team_id":"t1"}}"#,
        r#"{"type":"state","data":{"ended":"2024-03-01T14:00:00+00:00","end_of_updates":"x"}}"#,
        r#"{"type":"teams","id":"t1","data":{"id":"t1"}}"#,
        r#"{"type":"contest","id":"c1","data":{"id":"c1"}}"#,
    ];
    for line in lines {
        assert!(buf.push(event(line)).is_empty());
    }

    let kinds: Vec<EventKind> = buf.flush().iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Contest,
            EventKind::Teams,
            EventKind::Submissions,
            EventKind::State,
        ]
    );

    // Strict passthrough once the prefix is flushed.
    let out = buf.push(event(r#"{"type":"teams","id":"t2","data":{"id":"t2"}}"#));
    assert_eq!(out.len(), 1);

    // A reconnection re-enters the window.
    buf.restart();
    assert!(buf.push(event(r#"{"type":"teams","id":"t3","data":{"id":"t3"}}"#)).is_empty());
    assert_eq!(buf.flush().len(), 1);
}

#[test]
fn time_parsers_cover_the_wire_formats() {
    assert_eq!(parse_rel_time_ms("5:00:00"), Some(18_000_000));
    assert_eq!(parse_rel_time_ms("0:01:02.5"), Some(62_500));
    assert_eq!(parse_rel_time_ms("-0:30:00"), Some(-1_800_000));
    assert_eq!(parse_rel_time_ms("junk"), None);

    assert_eq!(parse_abs_time_ms("1970-01-01T00:00:01+00:00"), Some(1000));
    assert!(parse_abs_time_ms("2024-02-29T10:00:00+02:00").is_some());
    assert_eq!(parse_abs_time_ms("not a time"), None);
}

#[test]
fn malformed_payloads_are_reported_not_panicked() {
    let mut normalizer = FeedNormalizer::new();
    let err = normalizer
        .apply_event(event(r#"{"type":"problems","id":"a","data":{"id":17}}"#))
        .expect_err("bad shape must fail");
    assert!(matches!(err, IngestError::MalformedPayload { .. }));
}
