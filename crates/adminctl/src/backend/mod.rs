//! Backend contract abstraction
//!
//! Every remote operation the console can issue goes through
//! [`BackendContract`]. Two implementations exist:
//!
//! - [`LiveBackend`] issues real requests to the device-management service.
//! - [`SimulatedBackend`] answers from an in-memory fixture after a fixed
//!   delay, for UI work and tests without a device.
//!
//! Orchestrators only ever hold an `Arc<dyn BackendContract>`, so the two
//! are interchangeable.

pub mod fixture;
pub mod live;
pub mod simulated;

pub use fixture::Fixture;
pub use live::LiveBackend;
pub use simulated::{SimulatedBackend, SimulatedBackendBuilder};

use admin_common::{
    AccessSettings, BootDisk, Device, Disk, Job, OperationFailure, OperationResult, Protocol,
    VersionStatus,
};
use async_trait::async_trait;
use std::fmt;

/// Result of one backend operation
pub type OpResult<T> = Result<T, OperationFailure>;

/// Background job every version workflow waits on
pub const SAM_JOB: &str = "sam";

// ============================================================================
// Remote Operation
// ============================================================================

/// One request to the device-management service, with its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOperation {
    FetchDeviceDomain,
    SendDiagnosticLogs { include_support: bool },
    CheckAccess,
    SetExternalAccess { enabled: bool },
    SetProtocol { protocol: Protocol },
    FetchDisks,
    FetchBootDisk,
    DiskAction { device: String, activate: bool },
    BootExtend,
    CheckForVersionUpdates,
    UpgradePlatform,
    UpgradeApp { app_id: String },
    FetchVersions,
    PollJob { job: String },
}

impl RemoteOperation {
    /// Stable operation name, used for logging and call accounting
    pub fn name(&self) -> &'static str {
        match self {
            RemoteOperation::FetchDeviceDomain => "fetch_device_domain",
            RemoteOperation::SendDiagnosticLogs { .. } => "send_diagnostic_logs",
            RemoteOperation::CheckAccess => "check_access",
            RemoteOperation::SetExternalAccess { .. } => "set_external_access",
            RemoteOperation::SetProtocol { .. } => "set_protocol",
            RemoteOperation::FetchDisks => "fetch_disks",
            RemoteOperation::FetchBootDisk => "fetch_boot_disk",
            RemoteOperation::DiskAction { .. } => "disk_action",
            RemoteOperation::BootExtend => "boot_extend",
            RemoteOperation::CheckForVersionUpdates => "check_for_version_updates",
            RemoteOperation::UpgradePlatform => "upgrade_platform",
            RemoteOperation::UpgradeApp { .. } => "upgrade_app",
            RemoteOperation::FetchVersions => "fetch_versions",
            RemoteOperation::PollJob { .. } => "poll_job",
        }
    }

    /// Path on the device-management service
    pub fn path(&self) -> String {
        match self {
            RemoteOperation::FetchDeviceDomain => "/rest/settings/device_domain".to_string(),
            RemoteOperation::SendDiagnosticLogs { .. } => "/rest/send_log".to_string(),
            RemoteOperation::CheckAccess => "/rest/settings/access".to_string(),
            RemoteOperation::SetExternalAccess { .. } => {
                "/rest/settings/set_external_access".to_string()
            }
            RemoteOperation::SetProtocol { .. } => "/rest/settings/set_protocol".to_string(),
            RemoteOperation::FetchDisks => "/rest/settings/disks".to_string(),
            RemoteOperation::FetchBootDisk => "/rest/settings/boot_disk".to_string(),
            RemoteOperation::DiskAction { activate: true, .. } => {
                "/rest/settings/disk_activate".to_string()
            }
            RemoteOperation::DiskAction { activate: false, .. } => {
                "/rest/settings/disk_deactivate".to_string()
            }
            RemoteOperation::BootExtend => "/rest/settings/boot_extend".to_string(),
            RemoteOperation::CheckForVersionUpdates => "/rest/check".to_string(),
            RemoteOperation::UpgradePlatform => "/rest/settings/system_upgrade".to_string(),
            RemoteOperation::UpgradeApp { app_id } => format!("/rest/settings/{}_upgrade", app_id),
            RemoteOperation::FetchVersions => "/rest/settings/versions".to_string(),
            RemoteOperation::PollJob { .. } => "/rest/settings/job_status".to_string(),
        }
    }

    /// Query parameters of the request
    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            RemoteOperation::SendDiagnosticLogs { include_support } => {
                vec![("include_support", include_support.to_string())]
            }
            RemoteOperation::SetExternalAccess { enabled } => {
                vec![("external_access", enabled.to_string())]
            }
            RemoteOperation::SetProtocol { protocol } => {
                vec![("protocol", protocol.as_str().to_string())]
            }
            RemoteOperation::DiskAction { device, .. } => vec![("device", device.clone())],
            RemoteOperation::PollJob { job } => vec![("job", job.clone())],
            _ => Vec::new(),
        }
    }

    /// Background job this operation starts on the device, if any
    pub fn triggered_job(&self) -> Option<&'static str> {
        match self {
            RemoteOperation::CheckForVersionUpdates
            | RemoteOperation::UpgradePlatform
            | RemoteOperation::UpgradeApp { .. } => Some(SAM_JOB),
            _ => None,
        }
    }
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Backend Contract
// ============================================================================

/// Where the UI should navigate to re-run device activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRedirect {
    pub url: String,
}

/// Capability set every backend implementation provides
///
/// Each async operation resolves to exactly one of a payload or an
/// [`OperationFailure`]. Fetch operations always return a complete snapshot,
/// never a delta.
#[async_trait]
pub trait BackendContract: Send + Sync {
    async fn fetch_device_domain(&self) -> OpResult<Device>;

    async fn send_diagnostic_logs(&self, include_support: bool) -> OpResult<OperationResult>;

    /// Navigation side effect; not part of the async surface
    fn reactivate(&self) -> ActivationRedirect;

    async fn check_access(&self) -> OpResult<AccessSettings>;

    async fn set_external_access(&self, enabled: bool) -> OpResult<OperationResult>;

    async fn set_protocol(&self, protocol: Protocol) -> OpResult<OperationResult>;

    async fn fetch_disks(&self) -> OpResult<Vec<Disk>>;

    async fn fetch_boot_disk(&self) -> OpResult<BootDisk>;

    /// Mount or unmount a partition
    ///
    /// Resolves to an acknowledgement only; callers refresh the disk list
    /// with [`fetch_disks`](Self::fetch_disks).
    async fn disk_action(&self, device: &str, activate: bool) -> OpResult<OperationResult>;

    /// Grow the boot partition; resolves to the boot disk after the resize
    async fn boot_extend(&self) -> OpResult<BootDisk>;

    async fn check_for_version_updates(&self) -> OpResult<OperationResult>;

    async fn upgrade_platform(&self) -> OpResult<OperationResult>;

    async fn upgrade_app(&self, app_id: &str) -> OpResult<OperationResult>;

    async fn fetch_versions(&self) -> OpResult<Vec<VersionStatus>>;

    async fn poll_job(&self, job: &str) -> OpResult<Job>;
}
