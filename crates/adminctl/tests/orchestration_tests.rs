//! Orchestration tests
//!
//! Drive the sequencer, waiter and disk controller against a
//! SimulatedBackend on a paused clock. No network involved.

use admin_common::OperationFailure;
use adminctl::backend::{BackendContract, RemoteOperation, SimulatedBackend};
use adminctl::orchestrator::{
    DiskStateController, JobCompletionWaiter, OperationSequencer, PollPolicy, VersionWorkflow,
    WaitOutcome, WorkflowState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn policy(max_attempts: u32) -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(2000),
        max_attempts,
    }
}

fn sequencer(backend: &SimulatedBackend) -> OperationSequencer {
    OperationSequencer::new(Arc::new(backend.clone()), policy(150))
}

fn all_workflows() -> Vec<VersionWorkflow> {
    vec![
        VersionWorkflow::CheckForUpdates,
        VersionWorkflow::UpgradePlatform,
        VersionWorkflow::UpgradeApp("sam".to_string()),
    ]
}

// ============================================================================
// Version workflows
// ============================================================================

/// The completion callback fires once even when the trigger fails
#[tokio::test(start_paused = true)]
async fn test_workflow_completes_once_when_trigger_fails() {
    for workflow in all_workflows() {
        let backend = SimulatedBackend::new();
        backend.fail_next(
            workflow.trigger().name(),
            OperationFailure::Http {
                status: 500,
                error: None,
            },
        );
        let sequencer = sequencer(&backend);
        let cancel = CancellationToken::new();

        let mut completions = 0;
        let mut report = None;
        sequencer
            .run_with(workflow.clone(), &cancel, |r| {
                completions += 1;
                report = Some(r);
            })
            .await;

        assert_eq!(completions, 1, "{}", workflow);
        let report = report.unwrap();
        assert!(report.trigger.is_err());
        assert!(matches!(report.wait, WaitOutcome::Completed { polls: 1 }));
        assert!(report.version_report().is_some());
        assert_eq!(backend.call_count("poll_job"), 1);
        assert_eq!(backend.call_count("fetch_versions"), 1);
    }
}

/// Two running polls then a finished one: three polls, then a refresh
#[tokio::test(start_paused = true)]
async fn test_wait_polls_until_job_finishes() {
    let backend = SimulatedBackend::new();
    backend.script_job("sam", [true, true]);
    let sequencer = sequencer(&backend);

    let report = sequencer
        .check_for_version_updates(&CancellationToken::new())
        .await;

    assert_eq!(report.wait, WaitOutcome::Completed { polls: 3 });
    let calls = backend.calls();
    let sam = RemoteOperation::PollJob {
        job: "sam".to_string(),
    };
    assert_eq!(
        calls,
        vec![
            RemoteOperation::CheckForVersionUpdates,
            sam.clone(),
            sam.clone(),
            sam,
            RemoteOperation::FetchVersions,
        ]
    );
    assert_eq!(
        report.states,
        vec![
            WorkflowState::Idle,
            WorkflowState::Triggering,
            WorkflowState::WaitingForJob,
            WorkflowState::Refreshing,
            WorkflowState::Done,
        ]
    );
}

/// The simulated device never installs anything, so the mismatch remains
#[tokio::test(start_paused = true)]
async fn test_upgrade_platform_keeps_reported_mismatch() {
    let backend = SimulatedBackend::new();
    let report = sequencer(&backend)
        .upgrade_platform(&CancellationToken::new())
        .await;

    let versions = report.version_report().unwrap();
    let platform = versions
        .iter()
        .find(|v| v.application.id == "platform")
        .unwrap();
    assert_eq!(platform.installed_version, "876");
    assert_eq!(platform.current_version, "880");
    assert!(platform.upgrade_available());
}

#[tokio::test(start_paused = true)]
async fn test_check_for_updates_keeps_reported_mismatch() {
    let backend = SimulatedBackend::new();
    let report = sequencer(&backend)
        .check_for_version_updates(&CancellationToken::new())
        .await;

    let versions = report.version_report().unwrap();
    assert_eq!(versions, backend.fixture().versions.as_slice());
    assert!(versions.iter().all(|v| v.upgrade_available()));
}

#[tokio::test(start_paused = true)]
async fn test_upgrade_app_triggers_app_upgrade() {
    let backend = SimulatedBackend::new();
    sequencer(&backend)
        .upgrade_app("files", &CancellationToken::new())
        .await;

    assert_eq!(
        backend.calls()[0],
        RemoteOperation::UpgradeApp {
            app_id: "files".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_stalled_job_still_refreshes() {
    let backend = SimulatedBackend::new();
    backend.script_job("sam", std::iter::repeat(true).take(10));
    let sequencer = OperationSequencer::new(Arc::new(backend.clone()), policy(3));

    let report = sequencer
        .check_for_version_updates(&CancellationToken::new())
        .await;

    assert_eq!(report.wait, WaitOutcome::Stalled { polls: 3 });
    assert_eq!(backend.call_count("poll_job"), 3);
    assert!(report.version_report().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_poll_failure_proceeds_to_refresh() {
    let backend = SimulatedBackend::new();
    backend.script_job("sam", [true]);
    backend.fail_next("poll_job", OperationFailure::Network("reset".into()));

    let report = sequencer(&backend)
        .upgrade_platform(&CancellationToken::new())
        .await;

    assert!(matches!(report.wait, WaitOutcome::PollFailed { polls: 1, .. }));
    assert_eq!(backend.call_count("fetch_versions"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_failure_is_reported() {
    let backend = SimulatedBackend::new();
    backend.fail_next("fetch_versions", OperationFailure::rejected(200, "busy"));

    let report = sequencer(&backend)
        .check_for_version_updates(&CancellationToken::new())
        .await;

    assert!(matches!(report.versions, Some(Err(_))));
    assert!(report.version_report().is_none());
    assert_eq!(report.states.last(), Some(&WorkflowState::Done));
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_wait_skips_refresh() {
    let backend = SimulatedBackend::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = sequencer(&backend).check_for_version_updates(&cancel).await;

    assert_eq!(report.wait, WaitOutcome::Cancelled { polls: 0 });
    assert!(report.versions.is_none());
    assert_eq!(backend.call_count("poll_job"), 0);
    assert_eq!(backend.call_count("fetch_versions"), 0);
    assert_eq!(
        report.states,
        vec![
            WorkflowState::Idle,
            WorkflowState::Triggering,
            WorkflowState::WaitingForJob,
            WorkflowState::Done,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_poll() {
    let backend = SimulatedBackend::new();
    backend.script_job("sam", std::iter::repeat(true).take(100));
    let sequencer = sequencer(&backend);
    let cancel = CancellationToken::new();

    // Trigger ends at 2s, poll 1 ends at 4s, poll 2 is in flight from 6s to 8s
    let (report, _) = tokio::join!(sequencer.upgrade_platform(&cancel), async {
        tokio::time::sleep(Duration::from_millis(7000)).await;
        cancel.cancel();
    });

    assert_eq!(report.wait, WaitOutcome::Cancelled { polls: 2 });
    assert!(report.versions.is_none());
    assert_eq!(backend.call_count("fetch_versions"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_between_polls() {
    let backend = SimulatedBackend::new();
    backend.script_job("sam", std::iter::repeat(true).take(100));
    let waiter = JobCompletionWaiter::new(Arc::new(backend.clone()), policy(150));
    let cancel = CancellationToken::new();

    // Poll 1 ends at 2s, next poll would start at 4s
    let (outcome, _) = tokio::join!(waiter.wait("sam", &cancel), async {
        tokio::time::sleep(Duration::from_millis(3000)).await;
        cancel.cancel();
    });

    assert_eq!(outcome, WaitOutcome::Cancelled { polls: 1 });
    assert_eq!(backend.call_count("poll_job"), 1);
}

// ============================================================================
// Waiter
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_then_runs_continuation_once() {
    let backend = SimulatedBackend::new();
    backend.script_job("sam", [true]);
    let waiter = JobCompletionWaiter::new(Arc::new(backend.clone()), policy(150));

    let polls = waiter
        .wait_then("sam", &CancellationToken::new(), |outcome| async move {
            outcome.polls()
        })
        .await;

    assert_eq!(polls, 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_waits_on_same_job_both_finish() {
    let backend = SimulatedBackend::new();
    let waiter = JobCompletionWaiter::new(Arc::new(backend.clone()), policy(150));
    let cancel = CancellationToken::new();

    let (a, b) = tokio::join!(waiter.wait("sam", &cancel), waiter.wait("sam", &cancel));

    assert_eq!(a, WaitOutcome::Completed { polls: 1 });
    assert_eq!(b, WaitOutcome::Completed { polls: 1 });
}

#[tokio::test(start_paused = true)]
async fn test_sequencers_sharing_a_waiter_see_each_others_waits() {
    let backend = SimulatedBackend::new();
    backend.script_job("sam", [true, true, true, true]);
    let shared: Arc<dyn BackendContract> = Arc::new(backend.clone());
    let waiter = JobCompletionWaiter::new(shared.clone(), policy(150));
    let first = OperationSequencer::with_waiter(shared.clone(), waiter.clone());
    let second = OperationSequencer::with_waiter(shared, waiter.clone());
    let cancel = CancellationToken::new();

    assert_eq!(first.waiter().policy(), policy(150));

    // Both triggers end at 2s and both waits are polling by 3s
    let (a, b, during) = tokio::join!(
        first.check_for_version_updates(&cancel),
        second.upgrade_platform(&cancel),
        async {
            tokio::time::sleep(Duration::from_millis(3000)).await;
            waiter.waits_in_flight("sam")
        }
    );

    assert_eq!(during, 2);
    assert_eq!(waiter.waits_in_flight("sam"), 0);
    assert!(a.version_report().is_some());
    assert!(b.version_report().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_separate_waiters_track_waits_independently() {
    let backend = SimulatedBackend::new();
    backend.script_job("sam", [true, true]);
    let first = JobCompletionWaiter::new(Arc::new(backend.clone()), policy(150));
    let second = JobCompletionWaiter::new(Arc::new(backend.clone()), policy(150));
    let cancel = CancellationToken::new();

    let (_, _, counts) = tokio::join!(
        first.wait("sam", &cancel),
        second.wait("sam", &cancel),
        async {
            tokio::time::sleep(Duration::from_millis(1000)).await;
            (first.waits_in_flight("sam"), second.waits_in_flight("sam"))
        }
    );

    assert_eq!(counts, (1, 1));
}

// ============================================================================
// Progress reporting
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_progress_channel_mirrors_report_states() {
    let backend = SimulatedBackend::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sequencer = sequencer(&backend).with_progress(tx);

    let report = sequencer
        .check_for_version_updates(&CancellationToken::new())
        .await;

    let mut seen = Vec::new();
    while let Ok((id, state)) = rx.try_recv() {
        assert_eq!(id, report.id);
        seen.push(state);
    }
    assert_eq!(seen, report.states);
}

#[tokio::test(start_paused = true)]
async fn test_each_run_gets_its_own_id() {
    let backend = SimulatedBackend::new();
    let sequencer = sequencer(&backend);
    let cancel = CancellationToken::new();

    let first = sequencer.check_for_version_updates(&cancel).await;
    let second = sequencer.check_for_version_updates(&cancel).await;
    assert_ne!(first.id, second.id);
}

// ============================================================================
// Disks
// ============================================================================

/// A failed disk action must not trigger a refresh
#[tokio::test(start_paused = true)]
async fn test_failed_disk_action_skips_refresh() {
    let backend = SimulatedBackend::new();
    backend.fail_next(
        "disk_action",
        OperationFailure::Http {
            status: 500,
            error: None,
        },
    );
    let controller = DiskStateController::new(Arc::new(backend.clone()));

    let err = controller
        .activate_or_deactivate("/dev/sdc1", true)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(backend.call_count("disk_action"), 1);
    assert_eq!(backend.call_count("fetch_disks"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_activation_of_unknown_device() {
    let backend = SimulatedBackend::new();
    let controller = DiskStateController::new(Arc::new(backend.clone()));

    let err = controller
        .activate_or_deactivate("/dev/sdz9", true)
        .await
        .unwrap_err();

    assert!(err.is_application());
    assert_eq!(backend.call_count("fetch_disks"), 0);
}
