mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use loopvisor::{ForceCause, StopError, Termination, WorkerConfig, WorkerController};

use common::{Mode, Recorder};

const WAIT: Duration = Duration::from_secs(2);

fn controller(cfg: WorkerConfig, rec: &Arc<Recorder>) -> WorkerController {
    WorkerController::builder(cfg).build_arc(Arc::clone(rec) as _)
}

/// Counter body at full speed, stopped and awaited after ~50ms.
#[tokio::test(flavor = "multi_thread")]
async fn test_scenario_counter_stops_gracefully() {
    let rec = Arc::new(Recorder::new(Mode::Count));
    let cfg = WorkerConfig::new("counter").with_loop_interval(Duration::ZERO);
    let worker = controller(cfg, &rec);

    worker.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    tokio::time::timeout(WAIT, worker.stop_and_wait())
        .await
        .unwrap();

    assert!(!worker.is_running());
    assert!(rec.ticks() > 0);
    let reports = rec.reports();
    assert_eq!(reports.len(), 1);
    assert!(!reports[0].forced);
    assert_eq!(reports[0].iterations, rec.ticks());
}

/// A body sleeping far beyond the stop timeout is forced within one quantum.
#[tokio::test(flavor = "multi_thread")]
async fn test_scenario_unresponsive_body_is_forced() {
    let rec = Arc::new(Recorder::new(Mode::IgnoreStop(Duration::from_secs(5))));
    let cfg = WorkerConfig::new("sleeper").with_stop_timeout(Duration::from_millis(100));
    let worker = controller(cfg, &rec);

    worker.start().await.unwrap();
    assert!(rec.wait_ticks(1, WAIT).await);

    let stopped_at = Instant::now();
    worker.stop();
    assert!(worker.is_running());
    while worker.is_running() && stopped_at.elapsed() < WAIT {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    let not_running = stopped_at.elapsed();
    tokio::time::timeout(WAIT, worker.wait_stopped())
        .await
        .unwrap();
    let reported = stopped_at.elapsed();

    // timeout plus one watchdog quantum, with one more for scheduling
    assert!(not_running >= Duration::from_millis(100), "forced too early: {not_running:?}");
    assert!(not_running <= Duration::from_millis(120), "forced too late: {not_running:?}");
    // the exit confirmation adds at most one more quantum
    assert!(reported <= Duration::from_millis(130), "reported too late: {reported:?}");

    let reports = rec.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].forced);
    match &reports[0].error {
        Some(StopError::Forced(f)) => {
            assert_eq!(
                f.cause,
                ForceCause::StopTimeout {
                    timeout: Duration::from_millis(100)
                }
            );
            assert_eq!(f.state, Termination::Killed);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // the aborted context never reports a second time
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(rec.reports().len(), 1);
}

/// Restarting runs init again and starts with no leftover delay.
#[tokio::test(flavor = "multi_thread")]
async fn test_scenario_restart_runs_init_again() {
    let rec = Arc::new(Recorder::new(Mode::DelayAt(1, Duration::from_secs(10))));
    let worker = controller(WorkerConfig::new("restart"), &rec);

    worker.start().await.unwrap();
    assert!(rec.wait_ticks(1, WAIT).await);
    tokio::time::timeout(WAIT, worker.stop_and_wait())
        .await
        .unwrap();
    assert_eq!(rec.ticks(), 1);

    worker.start().await.unwrap();
    assert!(rec.wait_ticks(2, Duration::from_millis(300)).await);
    tokio::time::timeout(WAIT, worker.stop_and_wait())
        .await
        .unwrap();

    assert_eq!(rec.inits(), 2);
    let reports = rec.reports();
    assert_eq!(reports.len(), 2);
    assert_eq!((reports[0].run, reports[1].run), (1, 2));
    assert!(reports.iter().all(|r| r.is_clean()));
}

/// A delay added from the body pushes the next iteration past the interval.
#[tokio::test(flavor = "multi_thread")]
async fn test_scenario_added_delay_stacks_on_interval() {
    let interval = Duration::from_millis(20);
    let delay = Duration::from_millis(200);
    let rec = Arc::new(Recorder::new(Mode::DelayAt(2, delay)));
    let cfg = WorkerConfig::new("delayed").with_loop_interval(interval);
    let worker = controller(cfg, &rec);

    worker.start().await.unwrap();
    assert!(rec.wait_ticks(3, WAIT).await);
    tokio::time::timeout(WAIT, worker.stop_and_wait())
        .await
        .unwrap();

    let times = rec.tick_times();
    let at = |i: u64| {
        times
            .iter()
            .find(|(n, _)| *n == i)
            .map(|(_, t)| *t)
            .expect("iteration recorded")
    };
    let regular = at(2) - at(1);
    let delayed = at(3) - at(2);

    assert!(regular >= interval, "interval not honoured: {regular:?}");
    assert!(regular < delay, "delay leaked into the wrong gap: {regular:?}");
    assert!(
        delayed >= delay + interval - Duration::from_millis(5),
        "delay not applied: {delayed:?}"
    );
    assert!(delayed < delay + interval + Duration::from_millis(150));
}

/// A stopped run drops its pending delay immediately.
#[tokio::test(flavor = "multi_thread")]
async fn test_stop_drops_pending_delay() {
    let rec = Arc::new(Recorder::new(Mode::DelayAt(1, Duration::from_secs(30))));
    let cfg = WorkerConfig::new("pending").with_stop_timeout(Duration::ZERO);
    let worker = controller(cfg, &rec);

    worker.start().await.unwrap();
    assert!(rec.wait_ticks(1, WAIT).await);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let stopped_at = Instant::now();
    tokio::time::timeout(WAIT, worker.stop_and_wait())
        .await
        .unwrap();
    assert!(stopped_at.elapsed() < Duration::from_millis(100));
    assert!(rec.reports()[0].is_clean());
}
