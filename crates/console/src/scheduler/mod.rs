// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background job scheduler.
//!
//! Each job runs on its own task, either on a fixed interval (first run at
//! start-up) or once a day at a local wall-clock time ([`WallClock`]). All jobs share one
//! cancellation token; [`SchedulerHandle::shutdown`] cancels it and waits for
//! every task to finish, bounded by a timeout.

pub mod jobs;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::store::epoch_secs;

/// Longest single sleep while waiting for a daily run, so wall-clock jumps
/// are noticed.
pub const MAX_SLEEP_SLICE: Duration = Duration::from_secs(60);

/// Source of local wall-clock time for daily schedules.
pub type WallClock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// The host's local time.
pub fn local_clock() -> WallClock {
    Arc::new(|| Local::now().naive_local())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Run at start-up, then every period.
    Every(Duration),
    /// Run once a day at this local time.
    DailyAt(NaiveTime),
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Every(period) => write!(f, "every {}s", period.as_secs()),
            Self::DailyAt(at) => write!(f, "daily at {}", at.format("%H:%M")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Running,
    Stopped,
}

/// Per-advertiser outcome tally for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounts {
    pub success: u32,
    pub failure: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub name: String,
    pub schedule: String,
    pub state: JobState,
    pub runs: u64,
    pub last_counts: Option<RunCounts>,
    pub last_run_at: Option<i64>,
    pub last_error: Option<String>,
}

/// A unit of scheduled work.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Execute one run. An `Err` aborts this run only; the job stays scheduled.
    ///
    /// Implementations must check `cancel` before starting each item.
    async fn run(&self, cancel: &CancellationToken) -> anyhow::Result<RunCounts>;
}

/// Shared, ordered view of every job's status.
#[derive(Debug, Clone, Default)]
pub struct JobBoard {
    inner: Arc<RwLock<IndexMap<String, JobStatus>>>,
}

impl JobBoard {
    pub fn new() -> Self {
        Self::default()
    }

    async fn register(&self, name: &str, schedule: Schedule) {
        self.inner.write().await.insert(
            name.to_owned(),
            JobStatus {
                name: name.to_owned(),
                schedule: schedule.to_string(),
                state: JobState::Idle,
                runs: 0,
                last_counts: None,
                last_run_at: None,
                last_error: None,
            },
        );
    }

    async fn update(&self, name: &str, f: impl FnOnce(&mut JobStatus)) {
        if let Some(status) = self.inner.write().await.get_mut(name) {
            f(status);
        }
    }

    pub async fn snapshot(&self) -> Vec<JobStatus> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn get(&self, name: &str) -> Option<JobStatus> {
        self.inner.read().await.get(name).cloned()
    }
}

/// Next daily run strictly after `now`: today at `at` if still ahead,
/// otherwise tomorrow at `at`.
pub fn next_daily_run(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + TimeDelta::days(1)
    }
}

/// Collects jobs before they are started.
pub struct Scheduler {
    jobs: Vec<(Schedule, Arc<dyn Job>)>,
    clock: WallClock,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self { jobs: Vec::new(), clock: local_clock() }
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read wall-clock time for daily schedules from `clock`.
    pub fn with_clock(mut self, clock: WallClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn add(mut self, schedule: Schedule, job: impl Job) -> Self {
        self.jobs.push((schedule, Arc::new(job)));
        self
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Start every job on its own task.
    pub async fn spawn(self, shutdown: CancellationToken) -> SchedulerHandle {
        let board = JobBoard::new();
        let mut tasks = JoinSet::new();
        for (schedule, job) in self.jobs {
            board.register(job.name(), schedule).await;
            tracing::info!(job = job.name(), %schedule, "job scheduled");
            tasks.spawn(job_loop(
                job,
                schedule,
                board.clone(),
                shutdown.clone(),
                Arc::clone(&self.clock),
            ));
        }
        SchedulerHandle { tasks, board, shutdown }
    }
}

/// Owns the running job tasks.
pub struct SchedulerHandle {
    tasks: JoinSet<()>,
    board: JobBoard,
    shutdown: CancellationToken,
}

impl SchedulerHandle {
    pub fn board(&self) -> JobBoard {
        self.board.clone()
    }

    /// Cancel all jobs and wait for them to finish.
    ///
    /// Returns `false` if some job was still running when `timeout` elapsed;
    /// those tasks are aborted.
    pub async fn shutdown(mut self, timeout: Duration) -> bool {
        self.shutdown.cancel();
        match tokio::time::timeout(timeout, drain(&mut self.tasks)).await {
            Ok(()) => {
                tracing::info!("all jobs stopped");
                true
            }
            Err(_) => {
                tracing::warn!(
                    remaining = self.tasks.len(),
                    timeout_ms = timeout.as_millis() as u64,
                    "jobs did not stop in time, aborting"
                );
                self.tasks.abort_all();
                false
            }
        }
    }
}

async fn drain(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            tracing::error!(err = %e, "job task failed");
        }
    }
}

async fn job_loop(
    job: Arc<dyn Job>,
    schedule: Schedule,
    board: JobBoard,
    shutdown: CancellationToken,
    clock: WallClock,
) {
    match schedule {
        Schedule::Every(period) => {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = tick.tick() => {}
                }
                execute(job.as_ref(), &board, &shutdown).await;
            }
        }
        Schedule::DailyAt(at) => loop {
            let next = next_daily_run(clock(), at);
            tracing::debug!(job = job.name(), next = %next, "next daily run");
            if !sleep_until(next, &clock, &shutdown).await {
                break;
            }
            execute(job.as_ref(), &board, &shutdown).await;
        },
    }
    board.update(job.name(), |s| s.state = JobState::Stopped).await;
    tracing::debug!(job = job.name(), "job stopped");
}

/// Sleep until `clock` reaches `target`, in slices of at most
/// [`MAX_SLEEP_SLICE`]. Returns `false` if cancelled first.
async fn sleep_until(
    target: NaiveDateTime,
    clock: &WallClock,
    shutdown: &CancellationToken,
) -> bool {
    loop {
        let now = clock();
        if now >= target {
            return true;
        }
        let remaining = (target - now).to_std().unwrap_or(Duration::ZERO).min(MAX_SLEEP_SLICE);
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return false,
            _ = tokio::time::sleep(remaining) => {}
        }
    }
}

async fn execute(job: &dyn Job, board: &JobBoard, shutdown: &CancellationToken) {
    let name = job.name();
    board.update(name, |s| s.state = JobState::Running).await;
    let started = Instant::now();

    let result = job.run(shutdown).await;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(counts) => {
            tracing::info!(
                job = name,
                success = counts.success,
                failure = counts.failure,
                elapsed_ms,
                "job run finished"
            );
            board
                .update(name, |s| {
                    s.state = JobState::Idle;
                    s.runs += 1;
                    s.last_counts = Some(counts);
                    s.last_run_at = Some(epoch_secs());
                    s.last_error = None;
                })
                .await;
        }
        Err(e) => {
            tracing::error!(job = name, err = %e, elapsed_ms, "job run aborted");
            board
                .update(name, |s| {
                    s.state = JobState::Idle;
                    s.runs += 1;
                    s.last_counts = None;
                    s.last_run_at = Some(epoch_secs());
                    s.last_error = Some(format!("{e:#}"));
                })
                .await;
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
