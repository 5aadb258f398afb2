//! Tracks jobs currently executing, for heartbeats

use chrono::{DateTime, Utc};
use fleet_core::domain::job::Job;
use fleet_core::dto::bot::RunningJob;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct RunningEntry {
    op: String,
    lease_until: Option<String>,
    started_at: DateTime<Utc>,
}

/// Set of jobs whose handlers are executing right now
#[derive(Clone, Default)]
pub struct RunningJobs {
    inner: Arc<Mutex<HashMap<String, RunningEntry>>>,
}

/// Removes its job from the running set when dropped
pub struct RunningGuard {
    jobs: RunningJobs,
    job_id: String,
}

impl RunningJobs {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, RunningEntry>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks a job as running until the returned guard is dropped
    pub fn start(&self, job: &Job) -> RunningGuard {
        self.entries().insert(
            job.id.clone(),
            RunningEntry {
                op: job.op.clone(),
                lease_until: job.lease_until.clone(),
                started_at: Utc::now(),
            },
        );

        RunningGuard {
            jobs: self.clone(),
            job_id: job.id.clone(),
        }
    }

    /// Running jobs with elapsed time, oldest first
    pub fn snapshot(&self) -> Vec<RunningJob> {
        let now = Utc::now();
        let entries = self.entries();

        let mut running: Vec<(DateTime<Utc>, RunningJob)> = entries
            .iter()
            .map(|(job_id, entry)| {
                let elapsed_ms = (now - entry.started_at).num_milliseconds().max(0) as u64;
                (
                    entry.started_at,
                    RunningJob {
                        job_id: job_id.clone(),
                        op: entry.op.clone(),
                        elapsed_ms,
                        lease_until: entry.lease_until.clone(),
                    },
                )
            })
            .collect();
        running.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.job_id.cmp(&b.1.job_id)));

        running.into_iter().map(|(_, job)| job).collect()
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.jobs.entries().remove(&self.job_id);
    }
}
