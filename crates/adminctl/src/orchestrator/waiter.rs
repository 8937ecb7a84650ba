//! Job completion waiter
//!
//! Polls a named background job until the device reports it is no longer
//! running. The waiter is best-effort: a failed poll ends the wait instead
//! of failing the workflow, so whatever comes next (usually a refresh)
//! still runs. Unlike an open-ended loop it gives up after
//! [`PollPolicy::max_attempts`] polls and stops as soon as its
//! cancellation token fires.

use crate::backend::BackendContract;
use admin_common::{OperationFailure, PollingConfig};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How often and how long to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for PollPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            max_attempts: config.max_attempts.max(1),
        }
    }
}

/// How a wait ended
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    /// The job reported not running
    Completed { polls: u32 },
    /// A poll failed; the wait ended without knowing the job state
    PollFailed { polls: u32, failure: OperationFailure },
    /// Still running after the maximum number of polls
    Stalled { polls: u32 },
    /// The cancellation token fired
    Cancelled { polls: u32 },
}

impl WaitOutcome {
    /// Poll requests issued during the wait
    pub fn polls(&self) -> u32 {
        match self {
            WaitOutcome::Completed { polls }
            | WaitOutcome::PollFailed { polls, .. }
            | WaitOutcome::Stalled { polls }
            | WaitOutcome::Cancelled { polls } => *polls,
        }
    }

    /// Whether the workflow should carry on after this wait
    pub fn should_proceed(&self) -> bool {
        !matches!(self, WaitOutcome::Cancelled { .. })
    }
}

/// Counts concurrent waits per job name for the lifetime of one wait
struct InFlight {
    jobs: Arc<Mutex<HashMap<String, usize>>>,
    job: String,
}

impl InFlight {
    fn enter(jobs: &Arc<Mutex<HashMap<String, usize>>>, job: &str) -> Self {
        let mut waits = jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let count = waits.entry(job.to_string()).or_insert(0);
        *count += 1;
        if *count > 1 {
            warn!(job, waits = *count, "another wait on this job is already in flight");
        }
        drop(waits);
        Self {
            jobs: jobs.clone(),
            job: job.to_string(),
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut waits = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = waits.get_mut(&self.job) {
            *count -= 1;
            if *count == 0 {
                waits.remove(&self.job);
            }
        }
    }
}

/// Blocks a workflow until a background job has finished
///
/// Clones share one in-flight registry, so the concurrent-wait warning
/// covers every sequencer built from clones of the same waiter. Waiters
/// created separately with [`JobCompletionWaiter::new`] do not see each
/// other's waits.
#[derive(Clone)]
pub struct JobCompletionWaiter {
    backend: Arc<dyn BackendContract>,
    policy: PollPolicy,
    in_flight: Arc<Mutex<HashMap<String, usize>>>,
}

impl JobCompletionWaiter {
    pub fn new(backend: Arc<dyn BackendContract>, policy: PollPolicy) -> Self {
        Self {
            backend,
            policy,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Waits on `job` currently in flight across this waiter and its clones
    pub fn waits_in_flight(&self, job: &str) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job)
            .copied()
            .unwrap_or(0)
    }

    /// Poll `job` until it stops running, fails, stalls or is cancelled
    pub async fn wait(&self, job: &str, cancel: &CancellationToken) -> WaitOutcome {
        let _in_flight = InFlight::enter(&self.in_flight, job);
        let mut polls = 0;

        loop {
            if cancel.is_cancelled() {
                info!(job, polls, "wait cancelled");
                return WaitOutcome::Cancelled { polls };
            }

            polls += 1;
            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(job, polls, "wait cancelled during poll");
                    return WaitOutcome::Cancelled { polls };
                }
                status = self.backend.poll_job(job) => status,
            };

            match status {
                Ok(status) if !status.is_running => {
                    debug!(job, polls, "job finished");
                    return WaitOutcome::Completed { polls };
                }
                Ok(_) => debug!(job, polls, "job still running"),
                Err(failure) => {
                    warn!(job, polls, %failure, "job poll failed, proceeding");
                    return WaitOutcome::PollFailed { polls, failure };
                }
            }

            if polls >= self.policy.max_attempts {
                warn!(job, polls, "job still running after maximum polls, giving up");
                return WaitOutcome::Stalled { polls };
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(job, polls, "wait cancelled between polls");
                    return WaitOutcome::Cancelled { polls };
                }
                _ = tokio::time::sleep(self.policy.interval) => {}
            }
        }
    }

    /// Wait for `job`, then run `continuation` exactly once with the outcome
    pub async fn wait_then<F, Fut>(
        &self,
        job: &str,
        cancel: &CancellationToken,
        continuation: F,
    ) -> Fut::Output
    where
        F: FnOnce(WaitOutcome) -> Fut,
        Fut: Future,
    {
        let outcome = self.wait(job, cancel).await;
        continuation(outcome).await
    }
}
