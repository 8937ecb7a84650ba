//! Device data model.
//!
//! Field names on the wire follow the device-management service: snake_case
//! everywhere, `app` for a version row's application and `ui` for the
//! application's has-UI flag. Every list (disks, versions) is a complete
//! snapshot; nothing here is ever patched in place by the console.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Device identity as reported by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    #[serde(rename = "device_domain")]
    pub domain: String,
}

/// Protocol the device serves its web interface over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    #[default]
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a protocol name is neither `http` nor `https`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown protocol '{0}', expected http or https")]
pub struct UnknownProtocol(pub String);

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(UnknownProtocol(other.to_string())),
        }
    }
}

/// External access settings of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessSettings {
    #[serde(rename = "external_access")]
    pub external_access_enabled: bool,
    pub protocol: Protocol,
}

/// Static descriptor of an installable application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub name: String,
    pub required: bool,
    #[serde(rename = "ui")]
    pub has_ui: bool,
    pub url: String,
}

/// One row of the version report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStatus {
    #[serde(rename = "app")]
    pub application: Application,
    pub current_version: String,
    pub installed_version: String,
}

impl VersionStatus {
    /// True when the store offers a different version than the one installed
    pub fn upgrade_available(&self) -> bool {
        self.current_version != self.installed_version
    }
}

/// A partition on an attached disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub device: String,
    pub fs_type: String,
    pub mount_point: String,
    pub mountable: bool,
    /// Authoritative mount state, owned by the device
    pub active: bool,
    pub size: String,
}

/// An attached disk and its partitions, in device order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    pub name: String,
    #[serde(default)]
    pub partitions: Vec<Partition>,
}

impl Disk {
    pub fn partition(&self, device: &str) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.device == device)
    }

    /// Find a partition by device path across a disk list
    pub fn find_partition<'a>(disks: &'a [Disk], device: &str) -> Option<&'a Partition> {
        disks.iter().find_map(|d| d.partition(device))
    }
}

/// The device's boot disk
///
/// `extendable` goes from true to false once, when the boot partition is
/// grown to fill the card; `size` changes at the same moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootDisk {
    pub device: String,
    pub size: String,
    pub extendable: bool,
}

/// Status of a named background job on the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Not part of the status response; filled in from the request
    #[serde(default)]
    pub name: String,
    pub is_running: bool,
}

impl Job {
    pub fn new(name: impl Into<String>, is_running: bool) -> Self {
        Self {
            name: name.into(),
            is_running,
        }
    }
}
