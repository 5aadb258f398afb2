//! Job scheduler
//!
//! One `tick` flushes the outbox, claims a batch of jobs and runs each in
//! its own task under the concurrency limiter. Execution failures and
//! reporting failures are handled at separate points: a job that ran
//! successfully is always reported (or buffered) as `complete`, even when
//! the coordinator could not be reached.

use anyhow::{Context, Result};
use fleet_core::domain::job::{Assignment, Job};
use fleet_core::domain::report::{ReportAction, ReportItem};
use fleet_core::dto::bot::RunningJob;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::repository::JobRepository;
use crate::scheduler::running::RunningJobs;
use crate::service::{ConcurrencyLimiter, ExecutionService, OutboxService};

/// Result of one outbox flush pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Buffered reports the coordinator accepted
    pub delivered: usize,
    /// Buffered reports put back after the first failure
    pub requeued: usize,
}

/// Counts for one tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub flushed: FlushReport,
    pub claimed: usize,
    /// Jobs whose handler returned a result
    pub completed: usize,
    /// Jobs whose handler failed or was missing
    pub failed: usize,
    /// Outcomes written to the outbox because the report call failed
    pub buffered: usize,
    /// Outcomes that could be neither reported nor buffered
    pub lost: usize,
}

/// How a single job's outcome left the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Reported,
    Buffered,
    Lost,
}

#[derive(Debug, Clone, Copy)]
struct JobOutcome {
    action: ReportAction,
    delivery: Delivery,
}

/// Assignment in force together with the limiter sized for it
struct ActiveAssignment {
    assignment: Assignment,
    limiter: ConcurrencyLimiter,
}

/// Per-job work: execute, then report, then buffer on report failure
struct JobPipeline {
    instance_id: String,
    jobs: Arc<dyn JobRepository>,
    executor: Arc<dyn ExecutionService>,
    outbox: Arc<dyn OutboxService>,
    running: RunningJobs,
}

impl JobPipeline {
    async fn process(&self, job: Job) -> JobOutcome {
        let executed = {
            let _running = self.running.start(&job);
            self.executor.run(&job).await
        };

        let (action, payload) = match executed {
            Ok(result) => {
                debug!("Job {} (op={}) succeeded", job.id, job.op);
                (
                    ReportAction::Complete,
                    json!({ "instance_id": self.instance_id, "result": result }),
                )
            }
            Err(e) => {
                warn!("Job {} (op={}) failed: {}", job.id, job.op, e);
                (
                    ReportAction::Failed,
                    json!({ "instance_id": self.instance_id, "error": e.to_string() }),
                )
            }
        };

        let delivery = self.deliver(&job.id, action, payload).await;
        JobOutcome { action, delivery }
    }

    async fn deliver(&self, job_id: &str, action: ReportAction, payload: Value) -> Delivery {
        let report_err = match self.jobs.report(job_id, action, &payload).await {
            Ok(()) => return Delivery::Reported,
            Err(e) => e,
        };

        warn!(
            "Could not report {} for job {}, buffering: {:#}",
            action, job_id, report_err
        );

        let item = ReportItem::new(job_id, action, payload);
        match self.outbox.append(&item).await {
            Ok(()) => Delivery::Buffered,
            Err(e) => {
                error!(
                    "Dropping {} report for job {}: outbox append failed: {}",
                    action, job_id, e
                );
                Delivery::Lost
            }
        }
    }
}

/// Drives claim, dispatch, reporting and outbox flushing
pub struct Scheduler {
    bot_id: String,
    claim_batch_size: usize,
    flush_limit: Option<usize>,
    pipeline: Arc<JobPipeline>,
    active: RwLock<ActiveAssignment>,
}

impl Scheduler {
    /// Creates a scheduler for a registered bot
    ///
    /// # Arguments
    /// * `config` - Batch size and outbox flush limit
    /// * `bot_id` - Coordinator-assigned id used when claiming
    /// * `instance_id` - Included in every report payload
    /// * `assignment` - Initial assignment (operations, concurrency, paused)
    pub fn new(
        config: &Config,
        bot_id: impl Into<String>,
        instance_id: impl Into<String>,
        jobs: Arc<dyn JobRepository>,
        executor: Arc<dyn ExecutionService>,
        outbox: Arc<dyn OutboxService>,
        assignment: Assignment,
    ) -> Self {
        let limiter = ConcurrencyLimiter::new(assignment.max_concurrency);

        Self {
            bot_id: bot_id.into(),
            claim_batch_size: config.claim_batch_size,
            flush_limit: config.outbox_flush_limit,
            pipeline: Arc::new(JobPipeline {
                instance_id: instance_id.into(),
                jobs,
                executor,
                outbox,
                running: RunningJobs::new(),
            }),
            active: RwLock::new(ActiveAssignment {
                assignment,
                limiter,
            }),
        }
    }

    pub fn bot_id(&self) -> &str {
        &self.bot_id
    }

    /// Jobs executing right now
    pub fn running_jobs(&self) -> Vec<RunningJob> {
        self.pipeline.running.snapshot()
    }

    /// Current assignment
    #[cfg(test)]
    pub async fn assignment(&self) -> Assignment {
        self.active.read().await.assignment.clone()
    }

    /// Applies a coordinator assignment
    ///
    /// A new concurrency limit takes effect from the next tick; jobs of a
    /// tick in flight keep the limiter they were dispatched under.
    pub async fn apply_assignment(&self, assignment: Assignment) {
        let mut active = self.active.write().await;
        if active.assignment == assignment {
            return;
        }

        if assignment.max_concurrency == 0 {
            warn!(
                "Ignoring max_concurrency=0 from coordinator, keeping {}",
                active.limiter.max()
            );
        } else if assignment.max_concurrency != active.limiter.max() {
            info!(
                "Max concurrency changed: {} -> {}",
                active.limiter.max(),
                assignment.max_concurrency
            );
            active.limiter = ConcurrencyLimiter::new(assignment.max_concurrency);
        }

        info!(
            "Assignment updated: operations={:?}, paused={}",
            assignment.operations, assignment.paused
        );
        active.assignment = assignment;
    }

    /// Operations to claim: everything executable, narrowed by the
    /// assignment when it names operations
    fn claimable_operations(&self, assignment: &Assignment) -> Vec<String> {
        let supported = self.pipeline.executor.supported_operations();
        if assignment.operations.is_empty() {
            return supported;
        }

        supported
            .into_iter()
            .filter(|op| assignment.operations.contains(op))
            .collect()
    }

    /// Runs one polling cycle
    ///
    /// Returns once every dispatched job has been reported or buffered.
    /// A claim failure is returned as an error; nothing is buffered for it
    /// and the next tick simply claims again.
    pub async fn tick(&self) -> Result<TickReport> {
        let mut report = TickReport {
            flushed: self.flush_outbox().await,
            ..TickReport::default()
        };

        let (assignment, limiter) = {
            let active = self.active.read().await;
            (active.assignment.clone(), active.limiter.clone())
        };

        if assignment.paused {
            debug!("Assignment is paused, not claiming");
            return Ok(report);
        }

        let operations = self.claimable_operations(&assignment);
        if operations.is_empty() {
            warn!("No claimable operations, skipping claim");
            return Ok(report);
        }

        let jobs = self
            .pipeline
            .jobs
            .claim(&self.bot_id, &operations, self.claim_batch_size)
            .await
            .context("Claim failed")?;

        if jobs.is_empty() {
            debug!("No jobs available");
            return Ok(report);
        }

        report.claimed = jobs.len();
        info!("Claimed {} job(s)", jobs.len());

        let mut handles = Vec::with_capacity(jobs.len());
        for job in jobs {
            let permit = limiter.acquire().await;
            debug!(
                "Dispatching job {} (op={}), {}/{} slots busy",
                job.id,
                job.op,
                limiter.in_flight(),
                limiter.max()
            );
            let pipeline = Arc::clone(&self.pipeline);
            let job_id = job.id.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                pipeline.process(job).await
            });
            handles.push((job_id, handle));
        }

        for (job_id, handle) in handles {
            match handle.await {
                Ok(outcome) => {
                    match outcome.action {
                        ReportAction::Complete => report.completed += 1,
                        ReportAction::Failed => report.failed += 1,
                    }
                    match outcome.delivery {
                        Delivery::Reported => {}
                        Delivery::Buffered => report.buffered += 1,
                        Delivery::Lost => report.lost += 1,
                    }
                }
                Err(e) => {
                    error!("Job task for {} did not finish: {}", job_id, e);
                    report.lost += 1;
                }
            }
        }

        info!(
            "Tick finished: flushed={}, claimed={}, completed={}, failed={}, buffered={}, lost={}",
            report.flushed.delivered,
            report.claimed,
            report.completed,
            report.failed,
            report.buffered,
            report.lost
        );

        Ok(report)
    }

    /// Retries buffered reports, oldest first
    ///
    /// Stops at the first report that fails and puts it back, together with
    /// everything after it, at the front of the outbox in the original
    /// order. Never returns an error: whatever could not be delivered waits
    /// for the next flush.
    pub async fn flush_outbox(&self) -> FlushReport {
        let outbox = &self.pipeline.outbox;

        let mut items = match outbox.drain(self.flush_limit).await {
            Ok(items) => items,
            Err(e) => {
                warn!("Could not read outbox: {}", e);
                return FlushReport::default();
            }
        };

        if items.is_empty() {
            return FlushReport::default();
        }

        debug!("Flushing {} buffered report(s)", items.len());

        let mut delivered = 0;
        for item in &items {
            if let Err(e) = self
                .pipeline
                .jobs
                .report(&item.job_id, item.action, &item.payload)
                .await
            {
                warn!(
                    "Outbox flush stopped at job {} ({}): {:#}",
                    item.job_id, item.action, e
                );
                break;
            }
            delivered += 1;
        }

        let remaining = items.split_off(delivered);
        let requeued = remaining.len();

        if !remaining.is_empty() {
            if let Err(e) = outbox.requeue(remaining).await {
                error!("Failed to requeue {} buffered report(s): {}", requeued, e);
            }
        }

        if delivered > 0 {
            info!("Delivered {} buffered report(s)", delivered);
        }

        FlushReport {
            delivered,
            requeued,
        }
    }
}
