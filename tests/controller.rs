mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use loopvisor::{
    CallbackError, CallbackPhase, ConfigError, Event, EventKind, ForceCause, LoopContext,
    LoopError, LoopFn, Phase, PreviousRun, StopError, Subscribe, Termination, WorkerConfig,
    WorkerController,
};
use tokio::sync::Mutex as AsyncMutex;

use common::{Mode, Recorder};

const WAIT: Duration = Duration::from_secs(2);

fn controller(cfg: WorkerConfig, rec: &Arc<Recorder>) -> WorkerController {
    WorkerController::builder(cfg).build_arc(Arc::clone(rec) as _)
}

async fn stop_within(worker: &WorkerController, limit: Duration) {
    tokio::time::timeout(limit, worker.stop_and_wait())
        .await
        .expect("stop_and_wait returned in time");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_start_sets_running_until_stopped() {
    let rec = Arc::new(Recorder::new(Mode::Count));
    let worker = controller(WorkerConfig::new("running"), &rec);

    assert!(!worker.is_running());
    assert_eq!(worker.phase(), None);
    worker.start().await.unwrap();
    assert!(worker.is_running());
    assert!(worker.keep_running());

    stop_within(&worker, WAIT).await;
    assert!(!worker.is_running());
    assert!(!worker.keep_running());
    assert_eq!(worker.phase(), Some(Phase::Terminated));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_double_start_creates_one_context() {
    let rec = Arc::new(Recorder::new(Mode::Count));
    let worker = controller(WorkerConfig::new("double"), &rec);

    worker.start().await.unwrap();
    worker.start().await.unwrap();
    worker.start_with(PreviousRun::Abort).await.unwrap();
    assert_eq!(worker.run_id(), 1);

    stop_within(&worker, WAIT).await;
    assert_eq!(rec.inits(), 1);
    assert_eq!(rec.reports().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_starts_launch_one_run() {
    let rec = Arc::new(Recorder::new(Mode::Count));
    let worker = Arc::new(controller(WorkerConfig::new("racing"), &rec));

    let starts: Vec<_> = (0..8)
        .map(|_| {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.start().await })
        })
        .collect();
    for start in starts {
        start.await.unwrap().unwrap();
    }

    assert!(worker.is_running());
    assert_eq!(worker.run_id(), 1);
    assert!(rec.wait_ticks(1, WAIT).await);
    stop_within(&worker, WAIT).await;
    assert_eq!(rec.inits(), 1);
    assert_eq!(rec.reports().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_without_start_is_noop() {
    let rec = Arc::new(Recorder::new(Mode::Count));
    let worker = controller(WorkerConfig::new("idle"), &rec);

    worker.stop();
    stop_within(&worker, Duration::from_millis(100)).await;
    assert!(!worker.is_running());
    assert_eq!(worker.run_id(), 0);
    assert!(rec.reports().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_zero_timeout_never_forces() {
    let rec = Arc::new(Recorder::new(Mode::IgnoreStop(Duration::from_millis(150))));
    let cfg = WorkerConfig::new("patient").with_stop_timeout(Duration::ZERO);
    let worker = controller(cfg, &rec);

    worker.start().await.unwrap();
    assert!(rec.wait_ticks(1, WAIT).await);
    let mut events = worker.subscribe();
    stop_within(&worker, WAIT).await;

    let reports = rec.reports();
    assert_eq!(reports.len(), 1);
    assert!(!reports[0].forced);
    assert!(reports[0].is_clean());
    while let Ok(ev) = events.try_recv() {
        assert_ne!(ev.kind, EventKind::WatchdogArmed);
        assert_ne!(ev.kind, EventKind::ForcedTermination);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_body_is_abandoned() {
    let rec = Arc::new(Recorder::new(Mode::Block(Duration::from_millis(600))));
    let cfg = WorkerConfig::new("blocker").with_stop_timeout(Duration::from_millis(50));
    let worker = controller(cfg, &rec);

    worker.start().await.unwrap();
    assert!(rec.wait_ticks(1, WAIT).await);
    stop_within(&worker, Duration::from_millis(400)).await;

    assert!(!worker.is_running());
    let reports = rec.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].forced);
    assert_eq!(reports[0].termination(), Some(Termination::Abandoned));

    // the detached context finishes its iteration without reporting again
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(rec.reports().len(), 1);
    assert_eq!(rec.ticks(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_negative_settings_are_rejected() {
    let rec = Arc::new(Recorder::new(Mode::Count));
    let worker = controller(WorkerConfig::new("config"), &rec);

    worker.set_loop_interval_ms(40).unwrap();
    let err = worker.set_loop_interval_ms(-1).unwrap_err();
    assert_eq!(
        err,
        ConfigError::Negative {
            field: "loop_interval",
            value: -1
        }
    );
    assert_eq!(worker.loop_interval(), Duration::from_millis(40));

    worker.set_stop_timeout_ms(250).unwrap();
    assert!(worker.set_stop_timeout_ms(-250).is_err());
    assert_eq!(worker.stop_timeout(), Duration::from_millis(250));

    assert!(worker.add_delay_ms(-3).is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_init_failure_skips_loop() {
    let rec = Arc::new(Recorder::failing_init());
    let worker = controller(WorkerConfig::new("bad-init"), &rec);
    let mut events = worker.subscribe();

    worker.start().await.unwrap();
    tokio::time::timeout(WAIT, worker.wait_stopped()).await.unwrap();

    assert!(!worker.is_running());
    assert_eq!(rec.ticks(), 0);
    let reports = rec.reports();
    assert_eq!(reports.len(), 1);
    assert!(!reports[0].forced);
    let err = reports[0].callback_error().expect("callback error");
    assert!(err.is_init());
    assert_eq!(
        err,
        &CallbackError::Init {
            error: "init refused".into()
        }
    );

    let kinds = drain_kinds(&mut events);
    assert!(kinds.contains(&EventKind::InitFailed));
    assert!(!kinds.contains(&EventKind::LoopFailed));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_loop_failure_ends_run() {
    let rec = Arc::new(Recorder::new(Mode::FailAt(3)));
    let worker = controller(WorkerConfig::new("bad-loop"), &rec);

    worker.start().await.unwrap();
    tokio::time::timeout(WAIT, worker.wait_stopped()).await.unwrap();

    assert!(!worker.is_running());
    assert_eq!(rec.ticks(), 3);
    let reports = rec.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].iterations, 3);
    assert_eq!(
        reports[0].callback_error(),
        Some(&CallbackError::Loop {
            iteration: 3,
            error: "body broke".into()
        })
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_loop_panic_is_reported() {
    let rec = Arc::new(Recorder::new(Mode::PanicAt(2)));
    let worker = controller(WorkerConfig::new("panicky"), &rec);

    worker.start().await.unwrap();
    tokio::time::timeout(WAIT, worker.wait_stopped()).await.unwrap();

    let reports = rec.reports();
    assert_eq!(reports.len(), 1);
    match reports[0].callback_error() {
        Some(CallbackError::Panicked { during, message }) => {
            assert_eq!(*during, CallbackPhase::Loop);
            assert_eq!(message, "body exploded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_canceled_body_exits_gracefully() {
    let rec = Arc::new(Recorder::new(Mode::CancelAt(2)));
    let worker = controller(WorkerConfig::new("quitter"), &rec);

    worker.start().await.unwrap();
    tokio::time::timeout(WAIT, worker.wait_stopped()).await.unwrap();

    assert!(!worker.is_running());
    let reports = rec.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].is_clean());
    assert_eq!(reports[0].iterations, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cooperative_body_stops_promptly() {
    let rec = Arc::new(Recorder::new(Mode::Cooperative));
    let cfg = WorkerConfig::new("polite").with_stop_timeout(Duration::ZERO);
    let worker = controller(cfg, &rec);

    worker.start().await.unwrap();
    assert!(rec.wait_ticks(1, WAIT).await);
    stop_within(&worker, Duration::from_millis(500)).await;

    let reports = rec.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].is_clean());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_abort_previous_run_reports_replaced() {
    let rec = Arc::new(Recorder::new(Mode::IgnoreStop(Duration::from_secs(5))));
    let cfg = WorkerConfig::new("replaced").with_stop_timeout(Duration::ZERO);
    let worker = controller(cfg, &rec);

    worker.start().await.unwrap();
    assert!(rec.wait_ticks(1, WAIT).await);
    worker.stop();
    assert!(worker.is_running());

    worker.start_with(PreviousRun::Abort).await.unwrap();
    assert!(worker.is_running());
    assert_eq!(worker.run_id(), 2);

    let reports = rec.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].run, 1);
    assert!(reports[0].forced);
    match &reports[0].error {
        Some(StopError::Forced(f)) => {
            assert_eq!(f.cause, ForceCause::Replaced);
            assert_eq!(f.state, Termination::Killed);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    worker.start_with(PreviousRun::Abort).await.unwrap();
    assert_eq!(worker.run_id(), 2);
    assert!(rec.wait_ticks(2, WAIT).await);
    worker.set_stop_timeout(Duration::from_millis(50));
    stop_within(&worker, WAIT).await;
    assert_eq!(rec.reports().len(), 2);
    assert_eq!(rec.inits(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_start_waits_for_previous_run() {
    let rec = Arc::new(Recorder::new(Mode::IgnoreStop(Duration::from_millis(150))));
    let cfg = WorkerConfig::new("sequential").with_stop_timeout(Duration::ZERO);
    let worker = controller(cfg, &rec);

    worker.start().await.unwrap();
    assert!(rec.wait_ticks(1, WAIT).await);
    worker.stop();

    tokio::time::timeout(WAIT, worker.start()).await.unwrap().unwrap();
    assert_eq!(worker.run_id(), 2);
    // the previous run was fully reported before the new one launched
    let reports = rec.reports();
    assert_eq!(reports.len(), 1);
    assert!(!reports[0].forced);

    stop_within(&worker, WAIT).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_start_waits_for_previous_stopped_callback() {
    let timeline = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
    let task = {
        let init_log = Arc::clone(&timeline);
        let stop_log = Arc::clone(&timeline);
        LoopFn::new(|ctx: LoopContext| async move {
            ctx.cancelled().await;
            Err::<(), _>(LoopError::Canceled)
        })
        .with_init(move |ctx: LoopContext| {
            let log = Arc::clone(&init_log);
            async move {
                log.lock().unwrap().push(format!("init{}", ctx.run()));
                Ok::<_, LoopError>(())
            }
        })
        .with_stopped(move |report| {
            stop_log.lock().unwrap().push(format!("stopped{}-begin", report.run));
            std::thread::sleep(Duration::from_millis(200));
            stop_log.lock().unwrap().push(format!("stopped{}-end", report.run));
        })
    };
    let cfg = WorkerConfig::new("handoff").with_stop_timeout(Duration::ZERO);
    let worker = WorkerController::builder(cfg).build(task);

    worker.start().await.unwrap();
    let deadline = Instant::now() + WAIT;
    while timeline.lock().unwrap().is_empty() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    worker.stop();
    tokio::time::timeout(WAIT, worker.start()).await.unwrap().unwrap();
    let deadline = Instant::now() + WAIT;
    while timeline.lock().unwrap().len() < 4 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    assert_eq!(
        *timeline.lock().unwrap(),
        vec!["init1", "stopped1-begin", "stopped1-end", "init2"]
    );
    stop_within(&worker, WAIT).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_foreground_runs_on_named_thread() {
    let rec = Arc::new(Recorder::new(Mode::Count));
    let worker = controller(WorkerConfig::new("named-worker"), &rec);

    worker.start().await.unwrap();
    assert!(rec.wait_ticks(1, WAIT).await);
    stop_within(&worker, WAIT).await;

    let threads = rec.threads.lock().unwrap().clone();
    assert_eq!(threads[0].as_deref(), Some("named-worker"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_background_runs_on_home_runtime() {
    let rec = Arc::new(Recorder::new(Mode::Count));
    let cfg = WorkerConfig::new("bg-worker").with_background(true);
    let worker = controller(cfg, &rec);
    assert!(worker.is_background());

    worker.start().await.unwrap();
    assert!(rec.wait_ticks(10, WAIT).await);
    stop_within(&worker, WAIT).await;

    let threads = rec.threads.lock().unwrap().clone();
    assert_ne!(threads[0].as_deref(), Some("bg-worker"));
    assert_eq!(rec.reports().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_name_and_placement_apply_at_next_start() {
    let rec = Arc::new(Recorder::new(Mode::Count));
    let worker = controller(WorkerConfig::new("first"), &rec);

    worker.start().await.unwrap();
    worker.set_name("second");
    assert_eq!(worker.name(), "second");
    assert!(rec.wait_ticks(1, WAIT).await);
    stop_within(&worker, WAIT).await;
    assert_eq!(&*rec.reports()[0].worker, "first");

    worker.start().await.unwrap();
    stop_within(&worker, WAIT).await;
    assert_eq!(&*rec.reports()[1].worker, "second");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_add_delay_before_start_is_noop() {
    let rec = Arc::new(Recorder::new(Mode::Count));
    let worker = controller(WorkerConfig::new("early-delay"), &rec);

    worker.add_delay(Duration::from_secs(10));
    worker.start().await.unwrap();
    assert!(rec.wait_ticks(1, Duration::from_millis(200)).await);
    stop_within(&worker, WAIT).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_events_follow_lifecycle_order() {
    let rec = Arc::new(Recorder::new(Mode::Count));
    let cfg = WorkerConfig::new("ordered").with_stop_timeout(Duration::ZERO);
    let worker = controller(cfg, &rec);
    let mut events = worker.subscribe();

    worker.start().await.unwrap();
    assert!(rec.wait_ticks(1, WAIT).await);
    stop_within(&worker, WAIT).await;

    let kinds = drain_kinds(&mut events);
    assert_eq!(
        kinds,
        vec![
            EventKind::WorkerStarting,
            EventKind::StopRequested,
            EventKind::WorkerStopped
        ]
    );
}

struct Collector {
    seen: AsyncMutex<Vec<Event>>,
}

#[async_trait]
impl Subscribe for Collector {
    async fn on_event(&self, ev: &Event) {
        self.seen.lock().await.push(ev.clone());
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_subscribers_receive_forced_termination() {
    let collector = Arc::new(Collector {
        seen: AsyncMutex::new(Vec::new()),
    });
    let cfg = WorkerConfig::new("observed").with_stop_timeout(Duration::from_millis(30));
    let subs: Vec<Arc<dyn Subscribe>> = vec![collector.clone()];
    let worker = WorkerController::builder(cfg)
        .with_subscribers(subs)
        .build(LoopFn::new(|_ctx: LoopContext| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, LoopError>(())
        }));

    worker.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    stop_within(&worker, WAIT).await;

    let deadline = Instant::now() + WAIT;
    loop {
        let forced = collector
            .seen
            .lock()
            .await
            .iter()
            .find(|ev| ev.kind == EventKind::ForcedTermination)
            .cloned();
        if let Some(ev) = forced {
            assert_eq!(ev.worker.as_deref(), Some("observed"));
            assert_eq!(ev.termination, Some(Termination::Killed));
            assert_eq!(ev.timeout_ms, Some(30));
            break;
        }
        assert!(Instant::now() < deadline, "forced termination not observed");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_drop_stops_the_run() {
    let rec = Arc::new(Recorder::new(Mode::Count));
    let worker = controller(WorkerConfig::new("dropped"), &rec);

    worker.start().await.unwrap();
    assert!(rec.wait_ticks(1, WAIT).await);
    drop(worker);

    assert!(rec.wait_reports(1, WAIT).await);
    assert!(rec.reports()[0].is_clean());
}

fn drain_kinds(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<EventKind> {
    let mut kinds = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        if ev.kind != EventKind::DelayAdded {
            kinds.push(ev.kind);
        }
    }
    kinds
}
