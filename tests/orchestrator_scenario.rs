// tests/orchestrator_scenario.rs

mod common;
use crate::common::{a_then_b, finished, init_tracing, names, ScriptedGate};

use std::error::Error;
use std::fs;
use std::io::Cursor;

use cachedag::engine::{
    execute, AutoConfirm, BlockingGate, GateDecision, PromptGate, RunOutcome, RuntimeOptions,
};
use cachedag::output;
use cachedag::state::StateStore;
use cachedag_test_utils::builders::ForceFlag;
use cachedag_test_utils::recorder::Recorder;
use cachedag_test_utils::with_timeout;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn first_run_then_cached_then_forced() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let state_path = dir.path().join("state.json");
    let rec = Recorder::new();
    let force_a = ForceFlag::new();
    let registry = a_then_b(&rec, &force_a);

    // First run: nothing cached, both run.
    let outcome = with_timeout(execute(
        &registry,
        StateStore::load(&state_path),
        &mut AutoConfirm,
        RuntimeOptions::default(),
    ))
    .await?;
    let (report, store) = finished(outcome);
    assert_eq!(report.completed, names(&["A", "B"]));
    assert!(report.is_success());
    assert_eq!(store.output_of("A"), Some(&output([("value", 1.into())])));
    assert_eq!(store.output_of("B"), Some(&output([("value", 2.into())])));
    assert_eq!(rec.invoked(), vec!["A", "B"]);
    assert_eq!(rec.invocations_of("B")[0].inputs, vec![output([("value", 1.into())])]);
    store.persist(&state_path)?;

    // Second run, nothing changed: empty run set, file untouched.
    let before = fs::read(&state_path)?;
    let outcome = with_timeout(execute(
        &registry,
        StateStore::load(&state_path),
        &mut AutoConfirm,
        RuntimeOptions::default(),
    ))
    .await?;
    assert!(matches!(outcome, RunOutcome::NothingToRun));
    assert_eq!(rec.invoked().len(), 2);
    assert_eq!(fs::read(&state_path)?, before);

    // Force A: both re-run even though B's recorded inputs are unchanged.
    force_a.set(true);
    rec.clear();
    let mut gate = ScriptedGate::new(GateDecision::Proceed(names(&["A", "B"])));
    let outcome = with_timeout(execute(
        &registry,
        StateStore::load(&state_path),
        &mut gate,
        RuntimeOptions::default(),
    ))
    .await?;
    assert_eq!(gate.offered, Some(names(&["A", "B"])));
    let (report, _store) = finished(outcome);
    assert_eq!(report.completed, names(&["A", "B"]));
    assert_eq!(rec.invoked(), vec!["A", "B"]);

    Ok(())
}

#[tokio::test]
async fn persisted_state_is_rederivable() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let first = dir.path().join("first.json");
    let second = dir.path().join("second.json");
    let rec = Recorder::new();
    let registry = a_then_b(&rec, &ForceFlag::new());

    let outcome = with_timeout(execute(
        &registry,
        StateStore::new(),
        &mut AutoConfirm,
        RuntimeOptions::default(),
    ))
    .await?;
    let (_report, store) = finished(outcome);
    store.persist(&first)?;

    let reloaded = StateStore::load_strict(&first)?;
    assert_eq!(reloaded, store);
    reloaded.persist(&second)?;
    assert_eq!(fs::read(&first)?, fs::read(&second)?);

    Ok(())
}

#[tokio::test]
async fn aborting_at_the_gate_runs_nothing() -> TestResult {
    init_tracing();

    let rec = Recorder::new();
    let registry = a_then_b(&rec, &ForceFlag::new());
    let mut gate = ScriptedGate::new(GateDecision::Abort);

    let outcome = execute(&registry, StateStore::new(), &mut gate, RuntimeOptions::default()).await?;

    match outcome {
        RunOutcome::Aborted { run_set } => assert_eq!(run_set, names(&["A", "B"])),
        other => panic!("expected abort, got {other:?}"),
    }
    assert!(rec.invoked().is_empty());

    Ok(())
}

#[tokio::test]
async fn gate_can_shrink_the_run_set() -> TestResult {
    init_tracing();

    let rec = Recorder::new();
    let registry = a_then_b(&rec, &ForceFlag::new());
    let mut gate = ScriptedGate::new(GateDecision::Proceed(names(&["A"])));

    let outcome = with_timeout(execute(
        &registry,
        StateStore::new(),
        &mut gate,
        RuntimeOptions::default(),
    ))
    .await?;
    let (report, store) = finished(outcome);

    assert_eq!(report.completed, names(&["A"]));
    assert_eq!(report.up_to_date, names(&["B"]));
    assert_eq!(store.output_of("B"), None);
    assert_eq!(rec.invoked(), vec!["A"]);

    Ok(())
}

#[tokio::test]
async fn dependency_without_stored_output_fails_its_dependent() -> TestResult {
    init_tracing();

    let rec = Recorder::new();
    let registry = a_then_b(&rec, &ForceFlag::new());
    // Only B is approved, but A has never produced an output.
    let mut gate = ScriptedGate::new(GateDecision::Proceed(names(&["B"])));

    let outcome = with_timeout(execute(
        &registry,
        StateStore::new(),
        &mut gate,
        RuntimeOptions::default(),
    ))
    .await?;
    let (report, _store) = finished(outcome);

    assert!(report.failed.get("B").is_some_and(|r| r.contains("'A'")));
    assert!(rec.invoked().is_empty());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn prompt_gate_runs_off_the_async_workers() -> TestResult {
    init_tracing();

    let rec = Recorder::new();
    let registry = a_then_b(&rec, &ForceFlag::new());
    let mut prompt_output = Vec::new();
    let mut gate = BlockingGate::new(PromptGate::new(Cursor::new("-B\ny\n"), &mut prompt_output));

    let outcome = with_timeout(execute(
        &registry,
        StateStore::new(),
        &mut gate,
        RuntimeOptions::default(),
    ))
    .await?;
    let (report, _store) = finished(outcome);

    assert_eq!(report.completed, names(&["A"]));
    assert_eq!(rec.invoked(), vec!["A"]);
    drop(gate);
    assert!(String::from_utf8(prompt_output)?.contains("tasks to run (2)"));

    Ok(())
}
