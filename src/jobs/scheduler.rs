//! Job scheduler: registry of active jobs and their cron triggers.
//!
//! Each registered job gets one trigger task that sleeps until the next
//! recurrence boundary, fires, and repeats. The registry map and the set of
//! trigger tasks sit behind a single lock so they cannot diverge: a job is in
//! the map exactly when its trigger task is live.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::channels::MessageChannel;
use crate::error::JobError;
use crate::jobs::job::Job;

/// A registered job with its live trigger.
struct ActiveJob {
    job: Arc<Job>,
    /// Registration sequence; orders `list()` and guards self-retirement.
    seq: u64,
    /// Held while the job executes, so one job never runs twice at once.
    /// The flag records that the job has fired; a one-shot job whose flag is
    /// set never executes again.
    running: Arc<Mutex<bool>>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    jobs: HashMap<String, ActiveJob>,
    next_seq: u64,
    closed: bool,
}

/// Owns the active jobs and drives their recurrence triggers.
pub struct Scheduler {
    channel: Arc<dyn MessageChannel>,
    registry: Arc<Mutex<Registry>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    /// Create a scheduler that delivers through `channel`.
    pub fn new(channel: Arc<dyn MessageChannel>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            channel,
            registry: Arc::new(Mutex::new(Registry::default())),
            shutdown_tx,
        }
    }

    /// Register `job`, replacing any active job with the same id.
    ///
    /// The replaced job is only dropped once the new trigger is live; on
    /// error the registry is unchanged.
    pub async fn add(&self, job: Job) -> Result<String, JobError> {
        let id = job.id();

        if job.next_fire_after(Utc::now()).is_none() {
            return Err(JobError::NoUpcomingFire {
                expression: job.expression().to_string(),
            });
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| JobError::Trigger {
            id: id.clone(),
            reason: e.to_string(),
        })?;

        let mut registry = self.registry.lock().await;
        if registry.closed {
            return Err(JobError::ShutDown);
        }

        let seq = registry.next_seq;
        registry.next_seq += 1;

        let job = Arc::new(job);
        let running = Arc::new(Mutex::new(false));
        let handle = runtime.spawn(drive(TriggerContext {
            job: Arc::clone(&job),
            seq,
            running: Arc::clone(&running),
            channel: Arc::clone(&self.channel),
            registry: Arc::clone(&self.registry),
            shutdown: self.shutdown_tx.subscribe(),
        }));

        let replaced = registry.jobs.insert(
            id.clone(),
            ActiveJob {
                job,
                seq,
                running,
                handle,
            },
        );
        if let Some(previous) = replaced {
            previous.handle.abort();
            tracing::warn!(job_id = %id, "Job with this id already exists. Replaced it.");
        }

        tracing::info!(job_id = %id, "Added job");
        Ok(id)
    }

    /// Unregister a job. Returns whether it was active; unknown ids are a no-op.
    pub async fn remove(&self, job_id: &str) -> bool {
        let mut registry = self.registry.lock().await;
        match registry.jobs.remove(job_id) {
            Some(active) => {
                active.handle.abort();
                tracing::info!(job_id = %job_id, "Removed job");
                true
            }
            None => {
                tracing::warn!(job_id = %job_id, "Job not found");
                false
            }
        }
    }

    /// Ids of the active jobs, in registration order.
    pub async fn list(&self) -> Vec<String> {
        let registry = self.registry.lock().await;
        let mut active: Vec<(&String, u64)> =
            registry.jobs.iter().map(|(id, a)| (id, a.seq)).collect();
        active.sort_by_key(|(_, seq)| *seq);
        active.into_iter().map(|(id, _)| id.clone()).collect()
    }

    /// Look up an active job.
    pub async fn get(&self, job_id: &str) -> Option<Arc<Job>> {
        self.registry
            .lock()
            .await
            .jobs
            .get(job_id)
            .map(|a| Arc::clone(&a.job))
    }

    /// Execute an active job right away, outside its schedule.
    ///
    /// Waits for a scheduled firing of the same job to finish first. A
    /// one-shot job is retired after running; if its scheduled firing got
    /// there first, this returns [`JobError::NotFound`] without executing.
    pub async fn run_now(&self, job_id: &str) -> Result<(), JobError> {
        let (job, running, seq) = {
            let registry = self.registry.lock().await;
            let active = registry.jobs.get(job_id).ok_or_else(|| JobError::NotFound {
                id: job_id.to_string(),
            })?;
            (
                Arc::clone(&active.job),
                Arc::clone(&active.running),
                active.seq,
            )
        };

        let result = execute_once(&job, self.channel.as_ref(), &running)
            .await
            .ok_or_else(|| JobError::NotFound {
                id: job_id.to_string(),
            })?;

        if job.is_one_shot() {
            if let Some(active) = retire(&self.registry, job_id, seq).await {
                active.handle.abort();
            }
        }
        result
    }

    /// Stop all triggers.
    ///
    /// No new firings start. In-flight executions get `grace` to finish and
    /// are then aborted. Later `add` calls fail with [`JobError::ShutDown`].
    pub async fn shutdown(&self, grace: Duration) {
        self.shutdown_tx.send_replace(true);

        let handles: Vec<JoinHandle<()>> = {
            let mut registry = self.registry.lock().await;
            registry.closed = true;
            registry.jobs.drain().map(|(_, a)| a.handle).collect()
        };

        let count = handles.len();
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        if tokio::time::timeout(grace, futures::future::join_all(handles))
            .await
            .is_err()
        {
            tracing::warn!(grace = ?grace, "Grace period elapsed, aborting in-flight jobs");
            for abort in aborts {
                abort.abort();
            }
        }

        tracing::info!(jobs = count, "Scheduler shut down");
    }
}

/// Everything a trigger task needs.
struct TriggerContext {
    job: Arc<Job>,
    seq: u64,
    running: Arc<Mutex<bool>>,
    channel: Arc<dyn MessageChannel>,
    registry: Arc<Mutex<Registry>>,
    shutdown: watch::Receiver<bool>,
}

/// Trigger loop for one job.
///
/// The next fire time is computed after each execution finishes, so
/// occurrences missed during a slow execution are skipped rather than queued.
async fn drive(mut ctx: TriggerContext) {
    let id = ctx.job.id();
    let mut last_fire: Option<DateTime<Utc>> = None;

    loop {
        let now = Utc::now();
        // Never fire the same boundary twice if the timer wakes early.
        let from = match last_fire {
            Some(last) if last > now => last,
            _ => now,
        };
        let Some(next) = ctx.job.next_fire_after(from) else {
            tracing::info!(job_id = %id, "No further fire times");
            break;
        };

        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = ctx.shutdown.changed() => break,
        }
        if *ctx.shutdown.borrow() {
            break;
        }

        last_fire = Some(next);
        fire(&ctx.job, ctx.channel.as_ref(), &ctx.running).await;

        if ctx.job.is_one_shot() {
            retire(&ctx.registry, &id, ctx.seq).await;
            break;
        }
    }
}

/// Execute one occurrence. Failures are logged and the occurrence is skipped.
async fn fire(job: &Job, channel: &dyn MessageChannel, running: &Mutex<bool>) {
    let id = job.id();
    tracing::info!(job_id = %id, "Firing job");

    match execute_once(job, channel, running).await {
        Some(Ok(())) => tracing::info!(job_id = %id, "Job delivered"),
        Some(Err(e)) => tracing::error!(job_id = %id, "Job occurrence skipped: {}", e),
        None => tracing::debug!(job_id = %id, "One-shot job already fired"),
    }
}

/// Execute `job` while holding its execution lock.
///
/// The fired flag is checked and set under the same lock, so a one-shot job
/// executes at most once across scheduled firings and `run_now`. Returns
/// `None` when the one-shot job has already fired.
async fn execute_once(
    job: &Job,
    channel: &dyn MessageChannel,
    running: &Mutex<bool>,
) -> Option<Result<(), JobError>> {
    let mut fired = running.lock().await;
    if job.is_one_shot() && *fired {
        return None;
    }
    *fired = true;
    Some(job.execute(channel).await)
}

/// Drop `job_id` from the registry if it is still the registration `seq`.
///
/// A newer job registered under the same id is left alone.
async fn retire(registry: &Mutex<Registry>, job_id: &str, seq: u64) -> Option<ActiveJob> {
    let mut registry = registry.lock().await;
    if registry.jobs.get(job_id).is_some_and(|a| a.seq == seq) {
        tracing::info!(job_id = %job_id, "Retired one-shot job");
        registry.jobs.remove(job_id)
    } else {
        None
    }
}
