//! Version workflow sequencer
//!
//! Version checks and upgrades are fire-and-continue: the trigger's own
//! reply carries nothing the console needs, since the work happens in the
//! `sam` job on the device. Each workflow therefore runs
//!
//! ```text
//! Idle -> Triggering -> WaitingForJob -> Refreshing -> Done
//! ```
//!
//! moving on from `Triggering` whatever the trigger returned, and refreshing
//! versions whatever the wait returned (except cancellation, which goes
//! straight to `Done`). The caller hears back exactly once per workflow.

use super::waiter::{JobCompletionWaiter, PollPolicy, WaitOutcome};
use crate::backend::{BackendContract, OpResult, RemoteOperation, SAM_JOB};
use admin_common::{OperationResult, VersionStatus};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Stage of one workflow instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowState {
    Idle,
    Triggering,
    WaitingForJob,
    Refreshing,
    Done,
}

/// The three version workflows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionWorkflow {
    CheckForUpdates,
    UpgradePlatform,
    UpgradeApp(String),
}

impl VersionWorkflow {
    /// Remote operation that starts the workflow
    pub fn trigger(&self) -> RemoteOperation {
        match self {
            VersionWorkflow::CheckForUpdates => RemoteOperation::CheckForVersionUpdates,
            VersionWorkflow::UpgradePlatform => RemoteOperation::UpgradePlatform,
            VersionWorkflow::UpgradeApp(app_id) => RemoteOperation::UpgradeApp {
                app_id: app_id.clone(),
            },
        }
    }

    /// Job the workflow waits on after triggering
    pub fn job(&self) -> &'static str {
        self.trigger().triggered_job().unwrap_or(SAM_JOB)
    }
}

impl fmt::Display for VersionWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionWorkflow::CheckForUpdates => f.write_str("check_for_updates"),
            VersionWorkflow::UpgradePlatform => f.write_str("upgrade_platform"),
            VersionWorkflow::UpgradeApp(app_id) => write!(f, "upgrade_app:{}", app_id),
        }
    }
}

/// Everything that happened during one workflow
#[derive(Debug, Clone)]
pub struct WorkflowReport {
    pub id: Uuid,
    pub workflow: VersionWorkflow,
    /// The trigger's own result; informational only
    pub trigger: OpResult<OperationResult>,
    pub wait: WaitOutcome,
    /// `None` when the workflow was cancelled before refreshing
    pub versions: Option<OpResult<Vec<VersionStatus>>>,
    /// States visited, starting at `Idle` and ending at `Done`
    pub states: Vec<WorkflowState>,
}

impl WorkflowReport {
    /// The refreshed version report, if the refresh ran and succeeded
    pub fn version_report(&self) -> Option<&[VersionStatus]> {
        match &self.versions {
            Some(Ok(versions)) => Some(versions),
            _ => None,
        }
    }
}

/// Progress update sent on each state change
pub type ProgressSender = mpsc::UnboundedSender<(Uuid, WorkflowState)>;

/// Per-run state tracking
struct Run<'a> {
    id: Uuid,
    states: Vec<WorkflowState>,
    progress: Option<&'a ProgressSender>,
}

impl Run<'_> {
    fn enter(&mut self, state: WorkflowState) {
        debug!(?state, "workflow state");
        self.states.push(state);
        if let Some(tx) = self.progress {
            // Receiver gone just means nobody is watching
            let _ = tx.send((self.id, state));
        }
    }
}

/// Drives trigger -> wait -> refresh for version workflows
pub struct OperationSequencer {
    backend: Arc<dyn BackendContract>,
    waiter: JobCompletionWaiter,
    progress: Option<ProgressSender>,
}

impl OperationSequencer {
    /// Sequencer with its own waiter
    ///
    /// Use [`with_waiter`](Self::with_waiter) with clones of one waiter when
    /// several sequencers should warn about each other's waits on a job.
    pub fn new(backend: Arc<dyn BackendContract>, policy: PollPolicy) -> Self {
        let waiter = JobCompletionWaiter::new(backend.clone(), policy);
        Self::with_waiter(backend, waiter)
    }

    pub fn with_waiter(backend: Arc<dyn BackendContract>, waiter: JobCompletionWaiter) -> Self {
        Self {
            backend,
            waiter,
            progress: None,
        }
    }

    pub fn waiter(&self) -> &JobCompletionWaiter {
        &self.waiter
    }

    /// Report every state change of every workflow on `tx`
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.progress = Some(tx);
        self
    }

    pub async fn check_for_version_updates(&self, cancel: &CancellationToken) -> WorkflowReport {
        self.run(VersionWorkflow::CheckForUpdates, cancel).await
    }

    pub async fn upgrade_platform(&self, cancel: &CancellationToken) -> WorkflowReport {
        self.run(VersionWorkflow::UpgradePlatform, cancel).await
    }

    pub async fn upgrade_app(&self, app_id: &str, cancel: &CancellationToken) -> WorkflowReport {
        self.run(VersionWorkflow::UpgradeApp(app_id.to_string()), cancel)
            .await
    }

    /// Run a workflow and hand its report to `on_complete`
    pub async fn run_with<F>(
        &self,
        workflow: VersionWorkflow,
        cancel: &CancellationToken,
        on_complete: F,
    ) where
        F: FnOnce(WorkflowReport),
    {
        let report = self.run(workflow, cancel).await;
        on_complete(report);
    }

    /// Run one workflow instance to `Done`
    pub async fn run(
        &self,
        workflow: VersionWorkflow,
        cancel: &CancellationToken,
    ) -> WorkflowReport {
        let id = Uuid::new_v4();
        let span = info_span!("workflow", %id, %workflow);
        self.run_instance(id, workflow, cancel).instrument(span).await
    }

    async fn run_instance(
        &self,
        id: Uuid,
        workflow: VersionWorkflow,
        cancel: &CancellationToken,
    ) -> WorkflowReport {
        let mut run = Run {
            id,
            states: Vec::new(),
            progress: self.progress.as_ref(),
        };
        run.enter(WorkflowState::Idle);

        run.enter(WorkflowState::Triggering);
        let trigger = self.trigger(&workflow).await;
        if let Err(failure) = &trigger {
            warn!(%failure, "trigger failed, waiting for job anyway");
        }

        run.enter(WorkflowState::WaitingForJob);
        let wait = self.waiter.wait(workflow.job(), cancel).await;

        let versions = if wait.should_proceed() {
            run.enter(WorkflowState::Refreshing);
            let versions = self.backend.fetch_versions().await;
            match &versions {
                Ok(report) => info!(
                    apps = report.len(),
                    upgrades = report.iter().filter(|v| v.upgrade_available()).count(),
                    "versions refreshed"
                ),
                Err(failure) => warn!(%failure, "version refresh failed"),
            }
            Some(versions)
        } else {
            info!("workflow cancelled, skipping refresh");
            None
        };

        run.enter(WorkflowState::Done);
        WorkflowReport {
            id,
            workflow,
            trigger,
            wait,
            versions,
            states: run.states,
        }
    }

    async fn trigger(&self, workflow: &VersionWorkflow) -> OpResult<OperationResult> {
        match workflow {
            VersionWorkflow::CheckForUpdates => self.backend.check_for_version_updates().await,
            VersionWorkflow::UpgradePlatform => self.backend.upgrade_platform().await,
            VersionWorkflow::UpgradeApp(app_id) => self.backend.upgrade_app(app_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_workflow_waits_on_sam() {
        assert_eq!(VersionWorkflow::CheckForUpdates.job(), "sam");
        assert_eq!(VersionWorkflow::UpgradePlatform.job(), "sam");
        assert_eq!(VersionWorkflow::UpgradeApp("files".into()).job(), "sam");
    }

    #[test]
    fn test_workflow_display() {
        assert_eq!(
            VersionWorkflow::UpgradeApp("sam".into()).to_string(),
            "upgrade_app:sam"
        );
        assert_eq!(
            VersionWorkflow::UpgradeApp("sam".into()).trigger().path(),
            "/rest/settings/sam_upgrade"
        );
    }
}
