// tests/throttle_and_concurrency.rs

mod common;
use crate::common::{finished, init_tracing, names};

use std::error::Error;
use std::time::Duration;

use cachedag::dag::Registry;
use cachedag::engine::{execute, AutoConfirm, RuntimeOptions};
use cachedag::output;
use cachedag::state::StateStore;
use cachedag_test_utils::builders::{
    constant, increment, sleeping, slow_throttle, throttle_first,
};
use cachedag_test_utils::recorder::Recorder;
use tokio::time::Instant;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test(start_paused = true)]
async fn throttled_task_waits_then_launches_promptly() -> TestResult {
    init_tracing();

    let rec = Recorder::new();
    let mut registry = Registry::new();
    let confirm = registry.register(throttle_first(
        constant("confirm_blocks", output([("block", 100.into())]), &rec),
        1,
        Duration::from_millis(5000),
    ))?;
    registry.register(increment("verify", &rec).after(&confirm))?;
    registry.register(constant("unrelated", output([("ok", true.into())]), &rec))?;

    let options = RuntimeOptions::default();
    let start = Instant::now();
    let (report, _store) =
        finished(execute(&registry, StateStore::new(), &mut AutoConfirm, options).await?);

    assert_eq!(report.completed, names(&["confirm_blocks", "unrelated", "verify"]));
    assert!(report.failed.is_empty());
    assert!(report.cancelled.is_empty());

    let launched = rec.invocations_of("confirm_blocks")[0].at - start;
    assert!(launched >= Duration::from_millis(5000), "launched after {launched:?}");
    assert!(
        launched <= Duration::from_millis(5000) + 2 * options.tick,
        "launched after {launched:?}"
    );

    // Throttling one task does not hold up unrelated ones.
    let unrelated = rec.invocations_of("unrelated")[0].at - start;
    assert!(unrelated < options.tick);

    // The dependent only starts once its throttled dependency completed.
    let verify = rec.invocations_of("verify")[0].at - start;
    assert!(verify >= launched);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn independent_tasks_run_concurrently() -> TestResult {
    init_tracing();

    let rec = Recorder::new();
    let mut registry = Registry::new();
    registry.register(sleeping("x", Duration::from_secs(1), output([("v", 1.into())]), &rec))?;
    registry.register(sleeping("y", Duration::from_secs(1), output([("v", 2.into())]), &rec))?;

    let options = RuntimeOptions::default();
    let start = Instant::now();
    let (report, store) =
        finished(execute(&registry, StateStore::new(), &mut AutoConfirm, options).await?);
    let elapsed = start.elapsed();

    assert_eq!(report.completed, names(&["x", "y"]));
    assert_eq!(store.output_of("y"), Some(&output([("v", 2.into())])));

    let x_at = rec.invocations_of("x")[0].at;
    let y_at = rec.invocations_of("y")[0].at;
    let gap = if x_at > y_at { x_at - y_at } else { y_at - x_at };
    assert!(gap < options.tick, "x and y launched {gap:?} apart");
    assert!(elapsed < Duration::from_millis(1500), "run took {elapsed:?}");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn wide_fan_out_launches_every_eligible_task_in_one_tick() -> TestResult {
    init_tracing();

    let rec = Recorder::new();
    let mut registry = Registry::new();
    let root = registry.register(increment("root", &rec))?;
    for i in 0..32 {
        registry.register(
            sleeping(&format!("leaf_{i:02}"), Duration::from_secs(2), output([("i", i.into())]), &rec)
                .after(&root),
        )?;
    }

    let start = Instant::now();
    let (report, _store) = finished(
        execute(&registry, StateStore::new(), &mut AutoConfirm, RuntimeOptions::default()).await?,
    );

    assert_eq!(report.completed.len(), 33);
    let leaf_starts: Vec<_> = rec
        .invoked()
        .iter()
        .filter(|n| n.starts_with("leaf_"))
        .map(|n| rec.invocations_of(n)[0].at)
        .collect();
    assert_eq!(leaf_starts.len(), 32);
    let first = *leaf_starts.iter().min().unwrap();
    let last = *leaf_starts.iter().max().unwrap();
    assert!(last - first < RuntimeOptions::default().tick);
    assert!(start.elapsed() < Duration::from_secs(3));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn slow_throttle_predicate_does_not_hold_up_other_tasks() -> TestResult {
    init_tracing();

    let rec = Recorder::new();
    let mut registry = Registry::new();
    registry.register(slow_throttle(
        constant("a_slow_throttle", output([("v", 1.into())]), &rec),
        Duration::from_secs(10),
    ))?;
    let free = registry.register(constant("b_free", output([("v", 2.into())]), &rec))?;
    registry.register(increment("c_after_free", &rec).after(&free))?;

    let options = RuntimeOptions::default();
    let start = Instant::now();
    let (report, _store) =
        finished(execute(&registry, StateStore::new(), &mut AutoConfirm, options).await?);

    assert_eq!(report.completed.len(), 3);

    let free_at = rec.invocations_of("b_free")[0].at - start;
    assert!(free_at < options.tick, "b_free launched after {free_at:?}");
    let dependent_at = rec.invocations_of("c_after_free")[0].at - start;
    assert!(dependent_at < Duration::from_secs(1), "c_after_free launched after {dependent_at:?}");

    let slow_at = rec.invocations_of("a_slow_throttle")[0].at - start;
    assert!(slow_at >= Duration::from_secs(10));
    assert!(slow_at < Duration::from_secs(10) + options.tick, "launched after {slow_at:?}");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unanswered_throttle_predicate_gives_up_at_the_deadline() -> TestResult {
    init_tracing();

    let rec = Recorder::new();
    let mut registry = Registry::new();
    registry.register(slow_throttle(
        constant("stuck", output([("v", 1.into())]), &rec),
        Duration::from_secs(3600),
    ))?;

    let options = RuntimeOptions {
        deadline: Duration::from_secs(30),
        ..RuntimeOptions::default()
    };
    let start = Instant::now();
    let (report, _store) =
        finished(execute(&registry, StateStore::new(), &mut AutoConfirm, options).await?);

    assert_eq!(report.completed, names(&["stuck"]));
    let launched = rec.invocations_of("stuck")[0].at - start;
    assert!(launched >= Duration::from_secs(30));
    assert!(launched < Duration::from_secs(31), "launched after {launched:?}");

    Ok(())
}
