// tests/failure_cascade.rs

mod common;
use crate::common::{finished, init_tracing, names, ScriptedGate};

use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cachedag::dag::Registry;
use cachedag::engine::{execute, AutoConfirm, GateDecision, RuntimeOptions};
use cachedag::state::{StateStore, TaskStateEntry};
use cachedag::{output, Output, Task};
use cachedag_test_utils::builders::{
    constant, failing, increment, panicking, sleeping, ForceFlag,
};
use cachedag_test_utils::recorder::Recorder;
use cachedag_test_utils::with_timeout;

type TestResult = Result<(), Box<dyn Error>>;

/// Task that fails while `fail` is set, otherwise behaves like `increment`.
fn flaky(name: &str, fail: Arc<AtomicBool>, rec: &Recorder) -> Task {
    let task_name = name.to_string();
    let rec = rec.clone();
    Task::from_fn(name, move |inputs: Vec<Output>| {
        let rec = rec.clone();
        let task_name = task_name.clone();
        let fail = fail.load(Ordering::SeqCst);
        async move {
            rec.record(&task_name, &inputs);
            if fail {
                anyhow::bail!("{task_name} reverted");
            }
            let base = inputs
                .first()
                .and_then(|o| o.get("value"))
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            Ok(output([("value", (base + 1).into())]))
        }
    })
}

#[tokio::test]
async fn failure_cancels_dependents_and_spares_independent_tasks() -> TestResult {
    init_tracing();

    let rec = Recorder::new();
    let mut registry = Registry::new();
    let a = registry.register(increment("A", &rec))?;
    let b = registry.register(failing("B", "out of gas", &rec).after(&a))?;
    let c = registry.register(increment("C", &rec).after(&b))?;
    registry.register(increment("D", &rec).after(&c))?;
    registry.register(constant("E", output([("ok", true.into())]), &rec))?;

    let outcome = with_timeout(execute(
        &registry,
        StateStore::new(),
        &mut AutoConfirm,
        RuntimeOptions::default(),
    ))
    .await?;
    let (report, store) = finished(outcome);

    assert_eq!(report.completed, names(&["A", "E"]));
    assert_eq!(report.failed.keys().cloned().collect::<Vec<_>>(), vec!["B"]);
    assert!(report.failed["B"].contains("out of gas"));
    assert_eq!(report.cancelled, names(&["C", "D"]));
    assert!(report.unfinished.is_empty());

    assert_eq!(rec.count("C"), 0);
    assert_eq!(rec.count("D"), 0);
    assert_eq!(store.output_of("B"), None);
    assert_eq!(store.output_of("C"), None);
    assert_eq!(store.output_of("D"), None);
    assert_eq!(store.output_of("A"), Some(&output([("value", 1.into())])));

    Ok(())
}

#[tokio::test]
async fn cancelled_dependents_keep_their_previous_output() -> TestResult {
    init_tracing();

    let rec = Recorder::new();
    let fail_b = Arc::new(AtomicBool::new(false));
    let force_b = ForceFlag::new();

    let mut registry = Registry::new();
    let a = registry.register(increment("A", &rec))?;
    let b = registry.register(force_b.attach(flaky("B", Arc::clone(&fail_b), &rec)).after(&a))?;
    registry.register(increment("C", &rec).after(&b))?;

    let (report, store) = finished(
        with_timeout(execute(&registry, StateStore::new(), &mut AutoConfirm, RuntimeOptions::default()))
            .await?,
    );
    assert!(report.is_success());
    let c_before = store.entry("C").cloned();
    assert_eq!(store.output_of("C"), Some(&output([("value", 3.into())])));

    fail_b.store(true, Ordering::SeqCst);
    force_b.set(true);
    rec.clear();

    let (report, store) = finished(
        with_timeout(execute(&registry, store, &mut AutoConfirm, RuntimeOptions::default())).await?,
    );
    assert_eq!(report.up_to_date, names(&["A"]));
    assert!(report.failed.contains_key("B"));
    assert_eq!(report.cancelled, names(&["C"]));
    assert_eq!(rec.invoked(), vec!["B"]);
    assert_eq!(store.entry("C").cloned(), c_before);
    assert_eq!(store.output_of("B"), Some(&output([("value", 2.into())])));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn deadline_fails_the_task_without_waiting_for_it() -> TestResult {
    init_tracing();

    let rec = Recorder::new();
    let mut registry = Registry::new();
    let slow = registry.register(sleeping(
        "slow",
        Duration::from_secs(600),
        output([("value", 1.into())]),
        &rec,
    ))?;
    registry.register(increment("after_slow", &rec).after(&slow))?;

    let options = RuntimeOptions {
        tick: Duration::from_millis(500),
        deadline: Duration::from_secs(180),
    };

    let start = tokio::time::Instant::now();
    let (report, store) =
        finished(execute(&registry, StateStore::new(), &mut AutoConfirm, options).await?);
    let elapsed = start.elapsed();

    assert!(report.failed["slow"].contains("deadline"));
    assert_eq!(report.cancelled, names(&["after_slow"]));
    assert_eq!(store.output_of("slow"), None);
    assert!(elapsed >= Duration::from_secs(180));
    assert!(elapsed < Duration::from_secs(600));

    Ok(())
}

#[tokio::test]
async fn failure_cancels_dependents_beyond_a_gap_in_the_run_set() -> TestResult {
    init_tracing();

    let rec = Recorder::new();
    let mut registry = Registry::new();
    let a = registry.register(failing("A", "reverted", &rec))?;
    let b = registry.register(increment("B", &rec).after(&a))?;
    registry.register(increment("C", &rec).after(&b))?;

    let mut store = StateStore::new();
    store.record_success("A", &[], output([("value", 1.into())]));
    store.record_success("B", &["A".to_string()], output([("value", 2.into())]));
    store.record_success("C", &["B".to_string()], output([("value", 3.into())]));
    store.insert("A", TaskStateEntry::fresh(&[]));
    let c_before = store.entry("C").cloned();

    // The gate drops B, leaving A and C with nothing in between.
    let mut gate = ScriptedGate::new(GateDecision::Proceed(names(&["A", "C"])));
    let outcome = with_timeout(execute(&registry, store, &mut gate, RuntimeOptions::default())).await?;
    assert_eq!(gate.offered, Some(names(&["A", "B", "C"])));
    let (report, store) = finished(outcome);

    assert_eq!(report.failed.keys().cloned().collect::<Vec<_>>(), vec!["A"]);
    assert_eq!(report.cancelled, names(&["C"]));
    assert_eq!(report.up_to_date, names(&["B"]));
    assert_eq!(rec.count("C"), 0);
    assert_eq!(store.entry("C").cloned(), c_before);

    Ok(())
}

#[tokio::test]
async fn task_behind_a_gap_waits_for_its_upstream() -> TestResult {
    init_tracing();

    let rec = Recorder::new();
    let mut registry = Registry::new();
    let a = registry.register(sleeping("A", Duration::from_millis(200), output([("value", 5.into())]), &rec))?;
    let b = registry.register(increment("B", &rec).after(&a))?;
    registry.register(increment("C", &rec).after(&b))?;

    let mut store = StateStore::new();
    store.record_success("A", &[], output([("value", 1.into())]));
    store.record_success("B", &["A".to_string()], output([("value", 2.into())]));

    let mut gate = ScriptedGate::new(GateDecision::Proceed(names(&["A", "C"])));
    let outcome = with_timeout(execute(&registry, store, &mut gate, RuntimeOptions::default())).await?;
    let (report, _store) = finished(outcome);

    assert_eq!(report.completed, names(&["A", "C"]));
    let a_started = rec.invocations_of("A")[0].at;
    let c_started = rec.invocations_of("C")[0].at;
    assert!(c_started >= a_started + Duration::from_millis(200));

    Ok(())
}

#[tokio::test]
async fn panicking_action_fails_and_cancels_dependents() -> TestResult {
    init_tracing();

    let rec = Recorder::new();
    let mut registry = Registry::new();
    let a = registry.register(panicking("A", &rec))?;
    registry.register(increment("B", &rec).after(&a))?;
    registry.register(constant("E", output([("ok", true.into())]), &rec))?;

    let outcome = with_timeout(execute(
        &registry,
        StateStore::new(),
        &mut AutoConfirm,
        RuntimeOptions::default(),
    ))
    .await?;
    let (report, store) = finished(outcome);

    assert!(report.failed["A"].contains("did not complete"), "{:?}", report.failed);
    assert_eq!(report.cancelled, names(&["B"]));
    assert_eq!(report.completed, names(&["E"]));
    assert_eq!(rec.count("B"), 0);
    assert_eq!(store.output_of("A"), None);

    Ok(())
}
