#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use loopvisor::{LoopContext, LoopError, LoopTask, StopReport};

/// Ticks beyond this are counted but not recorded.
const RECORD_LIMIT: u64 = 1000;

/// How the recorder's loop body behaves.
#[derive(Debug, Clone, Copy)]
pub enum Mode {
    /// Count and return.
    Count,
    /// Sleep (async) without looking at the token.
    IgnoreStop(Duration),
    /// Block the thread without yielding.
    Block(Duration),
    /// Sleep until cancelled, then return `Canceled`.
    Cooperative,
    /// Fail at the given iteration.
    FailAt(u64),
    /// Panic at the given iteration.
    PanicAt(u64),
    /// Return `Canceled` at the given iteration.
    CancelAt(u64),
    /// Add the given delay at the given iteration.
    DelayAt(u64, Duration),
}

/// Instrumented loop task.
pub struct Recorder {
    pub mode: Mode,
    pub fail_init: bool,
    pub inits: AtomicU64,
    pub ticks: AtomicU64,
    pub tick_times: Mutex<Vec<(u64, Instant)>>,
    pub threads: Mutex<Vec<Option<String>>>,
    pub reports: Mutex<Vec<StopReport>>,
}

impl Recorder {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            fail_init: false,
            inits: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            tick_times: Mutex::new(Vec::new()),
            threads: Mutex::new(Vec::new()),
            reports: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_init() -> Self {
        Self {
            fail_init: true,
            ..Self::new(Mode::Count)
        }
    }

    pub fn inits(&self) -> u64 {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn reports(&self) -> Vec<StopReport> {
        self.reports.lock().unwrap().clone()
    }

    pub fn tick_times(&self) -> Vec<(u64, Instant)> {
        self.tick_times.lock().unwrap().clone()
    }

    /// Polls until `n` ticks were observed or `within` elapsed.
    pub async fn wait_ticks(&self, n: u64, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if self.ticks() >= n {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        self.ticks() >= n
    }

    /// Polls until `n` reports were delivered or `within` elapsed.
    pub async fn wait_reports(&self, n: usize, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if self.reports.lock().unwrap().len() >= n {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        self.reports.lock().unwrap().len() >= n
    }
}

#[async_trait]
impl LoopTask for Recorder {
    async fn init(&self, _ctx: LoopContext) -> Result<(), LoopError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            return Err(LoopError::fail("init refused"));
        }
        Ok(())
    }

    async fn tick(&self, ctx: LoopContext) -> Result<(), LoopError> {
        let iteration = ctx.iteration();
        self.ticks.fetch_add(1, Ordering::SeqCst);
        if iteration <= RECORD_LIMIT {
            self.tick_times
                .lock()
                .unwrap()
                .push((iteration, Instant::now()));
            self.threads
                .lock()
                .unwrap()
                .push(std::thread::current().name().map(str::to_string));
        }

        match self.mode {
            Mode::Count => Ok(()),
            Mode::IgnoreStop(d) => {
                tokio::time::sleep(d).await;
                Ok(())
            }
            Mode::Block(d) => {
                std::thread::sleep(d);
                Ok(())
            }
            Mode::Cooperative => {
                tokio::select! {
                    _ = ctx.cancelled() => Err(LoopError::Canceled),
                    _ = tokio::time::sleep(Duration::from_secs(30)) => Ok(()),
                }
            }
            Mode::FailAt(n) if iteration == n => Err(LoopError::fail("body broke")),
            Mode::PanicAt(n) if iteration == n => panic!("body exploded"),
            Mode::CancelAt(n) if iteration == n => Err(LoopError::Canceled),
            Mode::DelayAt(n, d) => {
                if iteration == n {
                    ctx.add_delay(d);
                }
                Ok(())
            }
            Mode::FailAt(_) | Mode::PanicAt(_) | Mode::CancelAt(_) => Ok(()),
        }
    }

    fn stopped(&self, report: &StopReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
}
