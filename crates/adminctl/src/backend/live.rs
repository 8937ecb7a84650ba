//! Live backend
//!
//! Maps each contract operation one-to-one onto a GET request against the
//! device-management service. Non-2xx replies become
//! [`OperationFailure::Http`] with whatever structured body came back; 2xx
//! replies with `success: false` become [`OperationFailure::Rejected`].

use super::{ActivationRedirect, BackendContract, OpResult, RemoteOperation};
use admin_common::{
    AccessSettings, BackendConfig, BootDisk, Device, Disk, Envelope, ErrorPayload, Job,
    OperationFailure, OperationResult, Protocol, VersionStatus,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Port of the device's internal (activation) web interface
pub const ACTIVATION_PORT: u16 = 81;

/// Backend talking to a real device
pub struct LiveBackend {
    http: reqwest::Client,
    base_url: Url,
}

impl LiveBackend {
    /// Create a client for the device at `base_url`
    pub fn new(base_url: &str, timeout: Duration, accept_invalid_certs: bool) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid device URL: {}", base_url))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .user_agent(concat!("adminctl/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            config.request_timeout(),
            config.accept_invalid_certs,
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Issue one operation and decode its envelope
    async fn send(&self, operation: &RemoteOperation) -> OpResult<Envelope> {
        let url = self
            .base_url
            .join(&operation.path())
            .map_err(|e| OperationFailure::Network(format!("bad request URL: {}", e)))?;
        debug!(operation = operation.name(), %url, "GET");

        let response = self
            .http
            .get(url)
            .query(&operation.query())
            .send()
            .await
            .map_err(|e| {
                warn!(operation = operation.name(), error = %e, "request failed");
                OperationFailure::Network(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| OperationFailure::Network(e.to_string()))?;

        if !status.is_success() {
            warn!(operation = operation.name(), status = status.as_u16(), "HTTP error");
            return Err(OperationFailure::Http {
                status: status.as_u16(),
                error: ErrorPayload::from_body(&body),
            });
        }

        // Some acknowledgements come back with an empty body
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Envelope {
                success: true,
                body: serde_json::Map::new(),
            });
        }

        let envelope = Envelope::parse(&body)?;
        if !envelope.success {
            warn!(operation = operation.name(), "request rejected by device");
            return Err(OperationFailure::Rejected {
                status: status.as_u16(),
                error: Some(envelope.into_error_payload()),
            });
        }
        Ok(envelope)
    }

    async fn acknowledge(&self, operation: RemoteOperation) -> OpResult<OperationResult> {
        self.send(&operation).await?;
        Ok(OperationResult::acknowledged())
    }
}

/// Payload under `key` when present, otherwise the envelope's top level
fn nested_or_top<T: DeserializeOwned>(envelope: &Envelope, key: &str) -> OpResult<T> {
    if envelope.body.contains_key(key) {
        envelope.field(key)
    } else {
        envelope.body()
    }
}

#[async_trait]
impl BackendContract for LiveBackend {
    async fn fetch_device_domain(&self) -> OpResult<Device> {
        self.send(&RemoteOperation::FetchDeviceDomain).await?.body()
    }

    async fn send_diagnostic_logs(&self, include_support: bool) -> OpResult<OperationResult> {
        self.acknowledge(RemoteOperation::SendDiagnosticLogs { include_support })
            .await
    }

    fn reactivate(&self) -> ActivationRedirect {
        let mut url = self.base_url.clone();
        // Only errors for URLs without a host
        let _ = url.set_port(Some(ACTIVATION_PORT));
        url.set_path("/");
        url.set_query(None);
        url.set_fragment(None);
        ActivationRedirect {
            url: url.to_string(),
        }
    }

    async fn check_access(&self) -> OpResult<AccessSettings> {
        let envelope = self.send(&RemoteOperation::CheckAccess).await?;
        nested_or_top(&envelope, "data")
    }

    async fn set_external_access(&self, enabled: bool) -> OpResult<OperationResult> {
        self.acknowledge(RemoteOperation::SetExternalAccess { enabled })
            .await
    }

    async fn set_protocol(&self, protocol: Protocol) -> OpResult<OperationResult> {
        self.acknowledge(RemoteOperation::SetProtocol { protocol })
            .await
    }

    async fn fetch_disks(&self) -> OpResult<Vec<Disk>> {
        self.send(&RemoteOperation::FetchDisks).await?.field("disks")
    }

    async fn fetch_boot_disk(&self) -> OpResult<BootDisk> {
        let envelope = self.send(&RemoteOperation::FetchBootDisk).await?;
        nested_or_top(&envelope, "data")
    }

    async fn disk_action(&self, device: &str, activate: bool) -> OpResult<OperationResult> {
        self.acknowledge(RemoteOperation::DiskAction {
            device: device.to_string(),
            activate,
        })
        .await
    }

    async fn boot_extend(&self) -> OpResult<BootDisk> {
        let envelope = self.send(&RemoteOperation::BootExtend).await?;
        if envelope.body.contains_key("data") {
            return envelope.field("data");
        }
        self.fetch_boot_disk().await
    }

    async fn check_for_version_updates(&self) -> OpResult<OperationResult> {
        self.acknowledge(RemoteOperation::CheckForVersionUpdates)
            .await
    }

    async fn upgrade_platform(&self) -> OpResult<OperationResult> {
        self.acknowledge(RemoteOperation::UpgradePlatform).await
    }

    async fn upgrade_app(&self, app_id: &str) -> OpResult<OperationResult> {
        self.acknowledge(RemoteOperation::UpgradeApp {
            app_id: app_id.to_string(),
        })
        .await
    }

    async fn fetch_versions(&self) -> OpResult<Vec<VersionStatus>> {
        self.send(&RemoteOperation::FetchVersions).await?.field("data")
    }

    async fn poll_job(&self, job: &str) -> OpResult<Job> {
        let envelope = self
            .send(&RemoteOperation::PollJob {
                job: job.to_string(),
            })
            .await?;
        let mut status: Job = envelope.body()?;
        status.name = job.to_string();
        Ok(status)
    }
}
