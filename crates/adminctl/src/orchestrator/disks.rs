//! Disk and boot partition controller
//!
//! Disk actions finish on the device before the reply, so there is no job
//! to wait for: an action is followed directly by a full disk refresh. A
//! failed action is surfaced as-is and nothing is refreshed.

use crate::backend::{BackendContract, OpResult};
use admin_common::{BootDisk, Disk};
use std::sync::Arc;
use tracing::{info, warn};

/// Drives disk activation and boot partition extension
///
/// A disk action is exactly two requests: the action, then one
/// `fetch_disks`. When the refresh fails the action has still been applied
/// on the device; the returned failure is the refresh's own.
pub struct DiskStateController {
    backend: Arc<dyn BackendContract>,
}

impl DiskStateController {
    pub fn new(backend: Arc<dyn BackendContract>) -> Self {
        Self { backend }
    }

    /// Mount (`activate`) or unmount a partition, then return the fresh disk list
    pub async fn activate_or_deactivate(
        &self,
        device: &str,
        activate: bool,
    ) -> OpResult<Vec<Disk>> {
        let action = if activate { "activate" } else { "deactivate" };
        if let Err(failure) = self.backend.disk_action(device, activate).await {
            warn!(device, action, %failure, "disk action failed");
            return Err(failure);
        }
        info!(device, action, "disk action done, refreshing disks");
        self.backend.fetch_disks().await.map_err(|failure| {
            warn!(device, action, %failure, "disk refresh after action failed");
            failure
        })
    }

    /// Grow the boot partition
    ///
    /// The reply already carries the resized boot disk, so no refetch.
    pub async fn extend_boot(&self) -> OpResult<BootDisk> {
        let boot_disk = self.backend.boot_extend().await.map_err(|failure| {
            warn!(%failure, "boot extension failed");
            failure
        })?;
        info!(device = %boot_disk.device, size = %boot_disk.size, "boot disk extended");
        Ok(boot_disk)
    }

    pub async fn refresh_disks(&self) -> OpResult<Vec<Disk>> {
        self.backend.fetch_disks().await
    }

    pub async fn refresh_boot_disk(&self) -> OpResult<BootDisk> {
        self.backend.fetch_boot_disk().await
    }
}
