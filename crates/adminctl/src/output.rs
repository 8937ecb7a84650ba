//! Human-readable and JSON rendering for adminctl
//!
//! Every command produces one serializable value. With `--json` it is
//! printed as pretty JSON on stdout; otherwise the matching `*_text`
//! renderer formats it for a terminal.

use crate::orchestrator::{WaitOutcome, WorkflowReport};
use admin_common::{AccessSettings, BootDisk, Device, Disk, Job, OperationResult, VersionStatus};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::fmt::Write;

/// Chooses between JSON and text output
#[derive(Debug, Clone, Copy, Default)]
pub struct Printer {
    json: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Print `value`, using `text` to render it when not in JSON mode
    pub fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
        if self.json {
            let json = serde_json::to_string_pretty(value).context("Failed to encode output")?;
            println!("{}", json);
        } else {
            print!("{}", text(value));
        }
        Ok(())
    }
}

pub fn device_text(device: &Device) -> String {
    format!("Device domain: {}\n", device.domain.bold())
}

pub fn access_text(access: &AccessSettings) -> String {
    let state = if access.external_access_enabled {
        "enabled".green().to_string()
    } else {
        "disabled".yellow().to_string()
    };
    format!(
        "External access: {}\nProtocol:        {}\n",
        state, access.protocol
    )
}

pub fn ack_text(result: &OperationResult) -> String {
    match result.error.as_ref().and_then(|e| e.message()) {
        Some(message) => format!("{} ({})\n", "OK".green(), message),
        None => format!("{}\n", "OK".green()),
    }
}

pub fn disks_text(disks: &[Disk]) -> String {
    if disks.is_empty() {
        return "No disks attached\n".to_string();
    }
    let mut out = String::new();
    for disk in disks {
        let _ = writeln!(out, "{}", disk.name.bold());
        if disk.partitions.is_empty() {
            let _ = writeln!(out, "  (no partitions)");
        }
        for p in &disk.partitions {
            let state = if p.active {
                format!("active at {}", p.mount_point).green().to_string()
            } else if p.mountable {
                "inactive".to_string()
            } else {
                "not mountable".dimmed().to_string()
            };
            let _ = writeln!(out, "  {:<14} {:<6} {:>8}  {}", p.device, p.fs_type, p.size, state);
        }
    }
    out
}

pub fn boot_disk_text(boot: &BootDisk) -> String {
    let extend = if boot.extendable {
        "can be extended".yellow().to_string()
    } else {
        "fully extended".to_string()
    };
    format!("Boot disk: {} {} ({})\n", boot.device, boot.size, extend)
}

pub fn versions_text(versions: &[VersionStatus]) -> String {
    let mut out = String::new();
    for v in versions {
        let marker = if v.upgrade_available() {
            format!("upgrade to {}", v.current_version).yellow().to_string()
        } else {
            "up to date".green().to_string()
        };
        let _ = writeln!(
            out,
            "{:<20} {:>10}  {}",
            v.application.name, v.installed_version, marker
        );
    }
    if out.is_empty() {
        out.push_str("No version information\n");
    }
    out
}

pub fn job_text(job: &Job) -> String {
    let state = if job.is_running { "running" } else { "idle" };
    format!("Job {}: {}\n", job.name, state)
}

// ============================================================================
// Workflow report
// ============================================================================

/// Serializable view of a [`WorkflowReport`]
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSummary {
    pub id: String,
    pub workflow: String,
    pub trigger_error: Option<String>,
    pub wait: &'static str,
    pub polls: u32,
    pub versions: Option<Vec<VersionStatus>>,
    pub refresh_error: Option<String>,
    pub states: Vec<String>,
}

impl From<&WorkflowReport> for WorkflowSummary {
    fn from(report: &WorkflowReport) -> Self {
        let wait = match report.wait {
            WaitOutcome::Completed { .. } => "completed",
            WaitOutcome::PollFailed { .. } => "poll_failed",
            WaitOutcome::Stalled { .. } => "stalled",
            WaitOutcome::Cancelled { .. } => "cancelled",
        };
        let (versions, refresh_error) = match &report.versions {
            Some(Ok(versions)) => (Some(versions.clone()), None),
            Some(Err(failure)) => (None, Some(failure.to_string())),
            None => (None, None),
        };
        Self {
            id: report.id.to_string(),
            workflow: report.workflow.to_string(),
            trigger_error: report.trigger.as_ref().err().map(|f| f.to_string()),
            wait,
            polls: report.wait.polls(),
            versions,
            refresh_error,
            states: report.states.iter().map(|s| format!("{:?}", s)).collect(),
        }
    }
}

pub fn workflow_text(summary: &WorkflowSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Workflow {} ({})", summary.workflow.bold(), summary.id);
    if let Some(error) = &summary.trigger_error {
        let _ = writeln!(out, "  trigger failed: {}", error.yellow());
    }
    let _ = writeln!(out, "  job wait: {} after {} poll(s)", summary.wait, summary.polls);
    match (&summary.versions, &summary.refresh_error) {
        (Some(versions), _) => {
            for line in versions_text(versions).lines() {
                let _ = writeln!(out, "  {}", line);
            }
        }
        (None, Some(error)) => {
            let _ = writeln!(out, "  version refresh failed: {}", error.red());
        }
        (None, None) => {
            let _ = writeln!(out, "  versions not refreshed");
        }
    }
    out
}
