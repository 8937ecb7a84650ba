//! Canned device state served by the simulated backend

use admin_common::{
    AccessSettings, Application, BootDisk, Device, Disk, Partition, Protocol, VersionStatus,
};

/// Mount point of the single external storage location
pub const EXTERNAL_MOUNT_POINT: &str = "/opt/disk/external";

/// Boot disk size after a simulated extension
pub const EXTENDED_BOOT_SIZE: &str = "16G";

/// In-memory stand-in for a real device
///
/// Fields are public so tests can shape the device before handing it to a
/// [`SimulatedBackend`](super::SimulatedBackend).
#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    pub device: Device,
    pub access: AccessSettings,
    pub versions: Vec<VersionStatus>,
    pub disks: Vec<Disk>,
    pub boot_disk: BootDisk,
}

impl Fixture {
    /// An ODROID-C2 with two external drives and an unextended SD card
    pub fn reference() -> Self {
        Self {
            device: Device {
                domain: "test.syncloud.it".to_string(),
            },
            access: AccessSettings {
                external_access_enabled: true,
                protocol: Protocol::Https,
            },
            versions: vec![
                version_row(
                    "platform",
                    "Platform",
                    "http://platform.odroid-c2.syncloud.it",
                    "880",
                    "876",
                ),
                version_row(
                    "sam",
                    "Syncloud App Manager",
                    "http://sam.odroid-c2.syncloud.it",
                    "78",
                    "75",
                ),
            ],
            disks: vec![
                Disk {
                    name: "My Passport 0837".to_string(),
                    partitions: vec![Partition {
                        device: "/dev/sdb1".to_string(),
                        fs_type: "ntfs".to_string(),
                        mount_point: EXTERNAL_MOUNT_POINT.to_string(),
                        mountable: true,
                        active: true,
                        size: "931.5G".to_string(),
                    }],
                },
                Disk {
                    name: "My Passport 0990".to_string(),
                    partitions: vec![Partition {
                        device: "/dev/sdc1".to_string(),
                        fs_type: "ntfs".to_string(),
                        mount_point: String::new(),
                        mountable: true,
                        active: false,
                        size: "931.5G".to_string(),
                    }],
                },
            ],
            boot_disk: BootDisk {
                device: "/dev/mmcblk0p2".to_string(),
                size: "2G".to_string(),
                extendable: true,
            },
        }
    }

    pub fn partition_mut(&mut self, device: &str) -> Option<&mut Partition> {
        self.disks
            .iter_mut()
            .flat_map(|d| d.partitions.iter_mut())
            .find(|p| p.device == device)
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::reference()
    }
}

fn version_row(id: &str, name: &str, url: &str, current: &str, installed: &str) -> VersionStatus {
    VersionStatus {
        application: Application {
            id: id.to_string(),
            name: name.to_string(),
            required: true,
            has_ui: false,
            url: url.to_string(),
        },
        current_version: current.to_string(),
        installed_version: installed.to_string(),
    }
}
