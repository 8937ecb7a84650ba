//! Simulated backend
//!
//! Answers every operation from a [`Fixture`] after a fixed latency, with no
//! network. The latency exists so UI code goes through its pending states;
//! tests run it on a paused tokio clock.
//!
//! Operations take effect on the fixture when the reply is delivered, not
//! when the call is made, the same way a real device changes state only
//! once the request has been handled.

use super::fixture::{EXTENDED_BOOT_SIZE, EXTERNAL_MOUNT_POINT};
use super::{ActivationRedirect, BackendContract, Fixture, OpResult, RemoteOperation};
use admin_common::{
    AccessSettings, BootDisk, Device, Disk, Job, OperationFailure, OperationResult, Protocol,
    SimulatedConfig, VersionStatus,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Default simulated reply latency
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(2000);

/// Page the UI navigates to for reactivation
pub const ACTIVATION_PAGE: &str = "activate.html";

/// Status used for simulated application-level rejections
const REJECTED_STATUS: u16 = 200;

#[derive(Debug, Default)]
struct SimState {
    fixture: Fixture,
    /// Every operation received, in call order
    calls: Vec<RemoteOperation>,
    /// Operation name -> failures to return on the next calls
    failures: HashMap<&'static str, VecDeque<OperationFailure>>,
    /// Job name -> `is_running` values to report on the next polls
    job_states: HashMap<String, VecDeque<bool>>,
}

/// In-memory backend for UI development and deterministic testing
///
/// Clones share the same fixture and call log.
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    state: Arc<Mutex<SimState>>,
    latency: Duration,
}

impl SimulatedBackend {
    /// Reference fixture with the default latency
    pub fn new() -> Self {
        SimulatedBackendBuilder::new().build()
    }

    pub fn builder() -> SimulatedBackendBuilder {
        SimulatedBackendBuilder::new()
    }

    pub fn from_config(config: &SimulatedConfig) -> Self {
        SimulatedBackendBuilder::new().latency(config.latency()).build()
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current fixture
    pub fn fixture(&self) -> Fixture {
        self.state().fixture.clone()
    }

    /// All operations received so far
    pub fn calls(&self) -> Vec<RemoteOperation> {
        self.state().calls.clone()
    }

    /// Number of calls to an operation, by [`RemoteOperation::name`]
    pub fn call_count(&self, operation: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|op| op.name() == operation)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.state().calls.len()
    }

    pub fn reset_calls(&self) {
        self.state().calls.clear();
    }

    /// Make the next call to `operation` fail with `failure`
    ///
    /// Queued failures are consumed one per call, in order.
    pub fn fail_next(&self, operation: &'static str, failure: OperationFailure) {
        self.state()
            .failures
            .entry(operation)
            .or_default()
            .push_back(failure);
    }

    /// Queue `is_running` values for the next polls of `job`
    ///
    /// Once the queue is drained the job reports not running.
    pub fn script_job(&self, job: &str, states: impl IntoIterator<Item = bool>) {
        self.state()
            .job_states
            .entry(job.to_string())
            .or_default()
            .extend(states);
    }

    /// Record the call, wait out the latency, then apply `effect`
    async fn reply<T>(
        &self,
        operation: RemoteOperation,
        effect: impl FnOnce(&mut SimState) -> OpResult<T> + Send,
    ) -> OpResult<T> {
        let name = operation.name();
        debug!(operation = name, "simulated request");
        self.state().calls.push(operation);

        tokio::time::sleep(self.latency).await;

        let mut state = self.state();
        if let Some(failure) = state.failures.get_mut(name).and_then(|q| q.pop_front()) {
            debug!(operation = name, %failure, "simulated failure");
            return Err(failure);
        }
        let result = effect(&mut state);
        debug!(operation = name, ok = result.is_ok(), "simulated reply");
        result
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_disk_action(fixture: &mut Fixture, device: &str, activate: bool) -> OpResult<()> {
    let target = fixture.partition_mut(device).ok_or_else(|| {
        OperationFailure::rejected(REJECTED_STATUS, format!("Unknown device {}", device))
    })?;

    if activate && !target.mountable {
        return Err(OperationFailure::rejected(
            REJECTED_STATUS,
            format!("{} is not mountable", device),
        ));
    }

    if !activate {
        target.active = false;
        target.mount_point.clear();
        return Ok(());
    }

    // One external storage location: activating a partition releases the other
    for partition in fixture.disks.iter_mut().flat_map(|d| d.partitions.iter_mut()) {
        if partition.device == device {
            partition.active = true;
            partition.mount_point = EXTERNAL_MOUNT_POINT.to_string();
        } else if partition.active {
            partition.active = false;
            partition.mount_point.clear();
        }
    }
    Ok(())
}

fn apply_boot_extend(fixture: &mut Fixture) -> OpResult<BootDisk> {
    if !fixture.boot_disk.extendable {
        return Err(OperationFailure::rejected(
            REJECTED_STATUS,
            "Boot disk is already extended",
        ));
    }
    fixture.boot_disk.extendable = false;
    fixture.boot_disk.size = EXTENDED_BOOT_SIZE.to_string();
    Ok(fixture.boot_disk.clone())
}

#[async_trait]
impl BackendContract for SimulatedBackend {
    async fn fetch_device_domain(&self) -> OpResult<Device> {
        self.reply(RemoteOperation::FetchDeviceDomain, |s| {
            Ok(s.fixture.device.clone())
        })
        .await
    }

    async fn send_diagnostic_logs(&self, include_support: bool) -> OpResult<OperationResult> {
        self.reply(
            RemoteOperation::SendDiagnosticLogs { include_support },
            |_| Ok(OperationResult::acknowledged()),
        )
        .await
    }

    fn reactivate(&self) -> ActivationRedirect {
        ActivationRedirect {
            url: ACTIVATION_PAGE.to_string(),
        }
    }

    async fn check_access(&self) -> OpResult<AccessSettings> {
        self.reply(RemoteOperation::CheckAccess, |s| Ok(s.fixture.access))
            .await
    }

    async fn set_external_access(&self, enabled: bool) -> OpResult<OperationResult> {
        self.reply(RemoteOperation::SetExternalAccess { enabled }, move |s| {
            s.fixture.access.external_access_enabled = enabled;
            Ok(OperationResult::acknowledged())
        })
        .await
    }

    async fn set_protocol(&self, protocol: Protocol) -> OpResult<OperationResult> {
        self.reply(RemoteOperation::SetProtocol { protocol }, move |s| {
            s.fixture.access.protocol = protocol;
            Ok(OperationResult::acknowledged())
        })
        .await
    }

    async fn fetch_disks(&self) -> OpResult<Vec<Disk>> {
        self.reply(RemoteOperation::FetchDisks, |s| Ok(s.fixture.disks.clone()))
            .await
    }

    async fn fetch_boot_disk(&self) -> OpResult<BootDisk> {
        self.reply(RemoteOperation::FetchBootDisk, |s| {
            Ok(s.fixture.boot_disk.clone())
        })
        .await
    }

    async fn disk_action(&self, device: &str, activate: bool) -> OpResult<OperationResult> {
        let operation = RemoteOperation::DiskAction {
            device: device.to_string(),
            activate,
        };
        self.reply(operation, move |s| {
            apply_disk_action(&mut s.fixture, device, activate)?;
            Ok(OperationResult::acknowledged())
        })
        .await
    }

    async fn boot_extend(&self) -> OpResult<BootDisk> {
        self.reply(RemoteOperation::BootExtend, |s| {
            apply_boot_extend(&mut s.fixture)
        })
        .await
    }

    async fn check_for_version_updates(&self) -> OpResult<OperationResult> {
        self.reply(RemoteOperation::CheckForVersionUpdates, |_| {
            Ok(OperationResult::acknowledged())
        })
        .await
    }

    async fn upgrade_platform(&self) -> OpResult<OperationResult> {
        self.reply(RemoteOperation::UpgradePlatform, |_| {
            Ok(OperationResult::acknowledged())
        })
        .await
    }

    async fn upgrade_app(&self, app_id: &str) -> OpResult<OperationResult> {
        let operation = RemoteOperation::UpgradeApp {
            app_id: app_id.to_string(),
        };
        self.reply(operation, |_| Ok(OperationResult::acknowledged()))
            .await
    }

    async fn fetch_versions(&self) -> OpResult<Vec<VersionStatus>> {
        self.reply(RemoteOperation::FetchVersions, |s| {
            Ok(s.fixture.versions.clone())
        })
        .await
    }

    async fn poll_job(&self, job: &str) -> OpResult<Job> {
        let operation = RemoteOperation::PollJob {
            job: job.to_string(),
        };
        self.reply(operation, move |s| {
            let is_running = s
                .job_states
                .get_mut(job)
                .and_then(|q| q.pop_front())
                .unwrap_or(false);
            Ok(Job::new(job, is_running))
        })
        .await
    }
}

// ============================================================================
// Builder for SimulatedBackend
// ============================================================================

/// Builder for SimulatedBackend with convenient test setup
pub struct SimulatedBackendBuilder {
    fixture: Fixture,
    latency: Duration,
    failures: HashMap<&'static str, VecDeque<OperationFailure>>,
    job_states: HashMap<String, VecDeque<bool>>,
}

impl SimulatedBackendBuilder {
    pub fn new() -> Self {
        Self {
            fixture: Fixture::reference(),
            latency: DEFAULT_LATENCY,
            failures: HashMap::new(),
            job_states: HashMap::new(),
        }
    }

    pub fn fixture(mut self, fixture: Fixture) -> Self {
        self.fixture = fixture;
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn fail_next(mut self, operation: &'static str, failure: OperationFailure) -> Self {
        self.failures.entry(operation).or_default().push_back(failure);
        self
    }

    pub fn job_states(mut self, job: &str, states: impl IntoIterator<Item = bool>) -> Self {
        self.job_states
            .entry(job.to_string())
            .or_default()
            .extend(states);
        self
    }

    pub fn build(self) -> SimulatedBackend {
        SimulatedBackend {
            state: Arc::new(Mutex::new(SimState {
                fixture: self.fixture,
                calls: Vec::new(),
                failures: self.failures,
                job_states: self.job_states,
            })),
            latency: self.latency,
        }
    }
}

impl Default for SimulatedBackendBuilder {
    fn default() -> Self {
        Self::new()
    }
}
