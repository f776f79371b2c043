//! Periodic execution of the pipeline.
//!
//! The scheduler is a single-threaded polling loop: every `poll_interval` it
//! compares the clock with the next due time and, when due, runs one cycle of
//! all four stages. A failing stage is logged and the cycle moves on; nothing
//! a stage does can end the loop. Only a [`StopHandle`] does, and only between
//! cycles.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{Days, Local, NaiveDateTime, NaiveTime};

use crate::domain::{ScheduleConfig, Stage};
use crate::error::AppError;

pub mod runner;
pub mod signal;

pub use runner::{InProcessRunner, StageRunner, SubprocessRunner};

/// "Every `every_days` days at `at`" (local time).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub every_days: u32,
    pub at: NaiveTime,
}

impl Schedule {
    pub fn new(every_days: u32, at: NaiveTime) -> Result<Self, AppError> {
        if every_days == 0 {
            return Err(AppError::Config("schedule interval must be at least one day".into()));
        }
        Ok(Self { every_days, at })
    }

    /// The run following one that finished (or was first checked) at `now`.
    ///
    /// A daily schedule whose time of day is still ahead fires later the same
    /// day; every other case moves `every_days` forward first.
    pub fn next_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        if self.every_days == 1 && self.at > now.time() {
            return now.date().and_time(self.at);
        }
        let date = now
            .date()
            .checked_add_days(Days::new(u64::from(self.every_days)))
            .unwrap_or(now.date());
        date.and_time(self.at)
    }
}

/// Result of one stage within a cycle.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub stage: Stage,
    pub result: Result<String, AppError>,
    pub elapsed: Duration,
}

/// Result of one full cycle, one outcome per stage in execution order.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub outcomes: Vec<StageOutcome>,
}

impl CycleReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (Stage, &AppError)> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err().map(|e| (o.stage, e)))
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded() == self.outcomes.len()
    }

    /// Sum of per-stage run times. Overlapping sources are counted twice.
    pub fn stage_time(&self) -> Duration {
        self.outcomes.iter().map(|o| o.elapsed).sum()
    }
}

/// Cloneable handle that asks a running scheduler to stop.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    inner: Arc<StopState>,
}

#[derive(Debug, Default)]
struct StopState {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopHandle {
    pub fn stop(&self) {
        let mut stopped = self.inner.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        *stopped = true;
        self.inner.wake.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep up to `timeout`, returning early (with `true`) once stopped.
    fn wait(&self, timeout: Duration) -> bool {
        let guard = self.inner.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .inner
            .wake
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

pub struct Scheduler<R> {
    schedule: Schedule,
    runner: R,
    poll_interval: Duration,
    run_now: bool,
    parallel_sources: bool,
    next_due: Option<NaiveDateTime>,
    stop: StopHandle,
}

impl<R: StageRunner> Scheduler<R> {
    pub fn new(schedule: Schedule, runner: R, poll_interval: Duration) -> Self {
        Self {
            schedule,
            runner,
            poll_interval,
            run_now: false,
            parallel_sources: false,
            next_due: None,
            stop: StopHandle::default(),
        }
    }

    /// Apply the timing knobs of a [`ScheduleConfig`].
    pub fn from_config(config: &ScheduleConfig, runner: R) -> Result<Self, AppError> {
        let schedule = Schedule::new(config.every_days, config.at)?;
        Ok(Self::new(schedule, runner, config.poll_interval)
            .with_run_immediately(config.run_now)
            .with_parallel_sources(config.parallel_sources))
    }

    /// Make the first cycle due as soon as the loop starts.
    pub fn with_run_immediately(mut self, run_now: bool) -> Self {
        self.run_now = run_now;
        self
    }

    /// Run generate and fetch concurrently; merge still waits for both.
    pub fn with_parallel_sources(mut self, parallel: bool) -> Self {
        self.parallel_sources = parallel;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn next_due(&self) -> Option<NaiveDateTime> {
        self.next_due
    }

    /// Run a cycle if one is due. `clock` is read before the cycle to decide,
    /// and again after it so the next run is scheduled from the completion time.
    pub fn tick(&mut self, mut clock: impl FnMut() -> NaiveDateTime) -> Option<CycleReport> {
        let now = clock();
        let (run_now, schedule) = (self.run_now, self.schedule);
        let due = *self
            .next_due
            .get_or_insert_with(|| if run_now { now } else { schedule.next_after(now) });
        if now < due {
            return None;
        }

        let report = self.run_cycle();
        let next = self.schedule.next_after(clock());
        self.next_due = Some(next);
        tracing::info!("next pipeline run scheduled for {next}");
        Some(report)
    }

    /// Run all stages once, isolating each stage's failure.
    pub fn run_cycle(&self) -> CycleReport {
        tracing::info!("starting data pipeline");
        let mut outcomes = Vec::with_capacity(Stage::CYCLE.len());

        if self.parallel_sources {
            let (generated, fetched) = rayon::join(
                || self.run_isolated(Stage::Generate),
                || self.run_isolated(Stage::Fetch),
            );
            outcomes.push(generated);
            outcomes.push(fetched);
        } else {
            outcomes.push(self.run_isolated(Stage::Generate));
            outcomes.push(self.run_isolated(Stage::Fetch));
        }
        outcomes.push(self.run_isolated(Stage::Merge));
        outcomes.push(self.run_isolated(Stage::Check));

        let report = CycleReport { outcomes };
        tracing::info!(
            stage_ms = report.stage_time().as_millis() as u64,
            "data pipeline completed: {}/{} stages succeeded",
            report.succeeded(),
            report.outcomes.len()
        );
        report
    }

    fn run_isolated(&self, stage: Stage) -> StageOutcome {
        let started = Instant::now();
        let result = self.runner.run(stage);
        let elapsed = started.elapsed();
        match &result {
            Ok(detail) => tracing::info!(
                stage = %stage,
                elapsed_ms = elapsed.as_millis() as u64,
                "{} succeeded: {detail}",
                stage.display_name()
            ),
            Err(e) => tracing::error!(
                stage = %stage,
                elapsed_ms = elapsed.as_millis() as u64,
                "{} failed: {e}",
                stage.display_name()
            ),
        }
        StageOutcome { stage, result, elapsed }
    }

    /// Poll with the local wall clock until stopped. Returns the cycles run.
    pub fn run_until_stopped(&mut self) -> usize {
        self.run_until_stopped_with(|| Local::now().naive_local())
    }

    /// Poll loop with an injected clock.
    pub fn run_until_stopped_with(&mut self, mut clock: impl FnMut() -> NaiveDateTime) -> usize {
        let mut cycles = 0;
        tracing::info!(
            every_days = self.schedule.every_days,
            at = %self.schedule.at,
            poll_secs = self.poll_interval.as_secs_f64(),
            "scheduler started, waiting for the next scheduled run"
        );

        while !self.stop.is_stopped() {
            if self.tick(&mut clock).is_some() {
                cycles += 1;
            }
            if self.stop.wait(self.poll_interval) {
                break;
            }
        }

        tracing::info!(cycles, "scheduler stopped");
        cycles
    }
}
