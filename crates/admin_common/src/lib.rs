//! Shared types for the device administration console.
//!
//! Holds the device data model, the service response envelope, the failure
//! taxonomy and the console configuration. Nothing in here performs I/O
//! beyond reading the config file.

pub mod config;
pub mod envelope;
pub mod error;
pub mod model;

pub use config::{AdminConfig, BackendConfig, BackendMode, PollingConfig, SimulatedConfig};
pub use envelope::{Envelope, ErrorPayload, OperationResult};
pub use error::{ConfigError, OperationFailure};
pub use model::{
    AccessSettings, Application, BootDisk, Device, Disk, Job, Partition, Protocol,
    UnknownProtocol, VersionStatus,
};
