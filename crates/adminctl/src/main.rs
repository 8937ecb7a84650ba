//! adminctl - device settings console
//!
//! Runs one settings operation or version workflow against a device (or
//! the built-in simulated device) and prints the result.

use admin_common::{AdminConfig, BackendMode, Protocol};
use adminctl::backend::{BackendContract, LiveBackend, SimulatedBackend, SAM_JOB};
use adminctl::orchestrator::{
    DiskStateController, JobCompletionWaiter, OperationSequencer, PollPolicy, VersionWorkflow,
};
use adminctl::output::{self, Printer, WorkflowSummary};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "adminctl")]
#[command(about = "Device settings console", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: <config dir>/adminctl/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the built-in simulated device
    #[arg(long, global = true)]
    simulated: bool,

    /// Device URL, overrides the config file
    #[arg(long, global = true)]
    url: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the device domain
    Domain,

    /// Send diagnostic logs
    SendLogs {
        /// Also send them to support
        #[arg(long)]
        include_support: bool,
    },

    /// Show where to go to re-run device activation
    Reactivate,

    /// Show external access settings
    Access,

    /// Turn external access on or off
    SetExternalAccess {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Set the external access protocol (http or https)
    SetProtocol { protocol: Protocol },

    /// List attached disks
    Disks,

    /// Show the boot disk
    BootDisk,

    /// Activate a partition as external storage
    Activate { device: String },

    /// Deactivate a partition
    Deactivate { device: String },

    /// Grow the boot partition to fill the card
    BootExtend,

    /// Show installed and available versions
    Versions,

    /// Check for version updates and wait for the result
    Check,

    /// Upgrade the platform and wait for it to finish
    UpgradePlatform,

    /// Upgrade one application and wait for it to finish
    UpgradeApp { app_id: String },

    /// Show whether a background job is running
    Job {
        #[arg(default_value = SAM_JOB)]
        name: String,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<AdminConfig> {
    let mut config = match &cli.config {
        Some(path) => AdminConfig::load(path)?,
        None => AdminConfig::load_default()?,
    };
    if cli.simulated {
        config.backend.mode = BackendMode::Simulated;
    }
    if let Some(url) = &cli.url {
        config.backend.base_url = url.clone();
    }
    config.validate()?;
    Ok(config)
}

fn build_backend(config: &AdminConfig) -> Result<Arc<dyn BackendContract>> {
    match config.backend.mode {
        BackendMode::Simulated => {
            info!("Using simulated device");
            Ok(Arc::new(SimulatedBackend::from_config(&config.simulated)))
        }
        BackendMode::Live => {
            let backend = LiveBackend::from_config(&config.backend)?;
            info!("Using device at {}", backend.base_url());
            Ok(Arc::new(backend))
        }
    }
}

/// Token that fires on Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            token.cancel();
        }
    });
    cancel
}

async fn run_workflow(
    backend: Arc<dyn BackendContract>,
    policy: PollPolicy,
    workflow: VersionWorkflow,
    printer: Printer,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let progress = tokio::spawn(async move {
        while let Some((id, state)) = rx.recv().await {
            debug!(%id, ?state, "workflow progress");
        }
    });

    let waiter = JobCompletionWaiter::new(backend.clone(), policy);
    let sequencer = OperationSequencer::with_waiter(backend, waiter).with_progress(tx);
    let cancel = cancel_on_ctrl_c();

    let report = sequencer.run(workflow, &cancel).await;
    drop(sequencer);
    let _ = progress.await;

    printer.emit(&WorkflowSummary::from(&report), output::workflow_text)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli).context("Failed to load configuration")?;
    let backend = build_backend(&config)?;
    let policy = PollPolicy::from(&config.polling);
    let printer = Printer::new(cli.json);
    let disks = DiskStateController::new(backend.clone());

    match cli.command {
        Commands::Domain => {
            let device = backend
                .fetch_device_domain()
                .await
                .context("Failed to fetch device domain")?;
            printer.emit(&device, output::device_text)
        }
        Commands::SendLogs { include_support } => {
            let ack = backend
                .send_diagnostic_logs(include_support)
                .await
                .context("Failed to send logs")?;
            printer.emit(&ack, output::ack_text)
        }
        Commands::Reactivate => {
            let redirect = backend.reactivate();
            printer.emit(&redirect.url, |url| format!("{}\n", url))
        }
        Commands::Access => {
            let access = backend
                .check_access()
                .await
                .context("Failed to read access settings")?;
            printer.emit(&access, output::access_text)
        }
        Commands::SetExternalAccess { state } => {
            let ack = backend
                .set_external_access(matches!(state, Toggle::On))
                .await
                .context("Failed to change external access")?;
            printer.emit(&ack, output::ack_text)
        }
        Commands::SetProtocol { protocol } => {
            let ack = backend
                .set_protocol(protocol)
                .await
                .context("Failed to change protocol")?;
            printer.emit(&ack, output::ack_text)
        }
        Commands::Disks => {
            let list = disks.refresh_disks().await.context("Failed to list disks")?;
            printer.emit(&list, |d| output::disks_text(d))
        }
        Commands::BootDisk => {
            let boot = disks
                .refresh_boot_disk()
                .await
                .context("Failed to read boot disk")?;
            printer.emit(&boot, output::boot_disk_text)
        }
        Commands::Activate { device } => {
            let list = disks
                .activate_or_deactivate(&device, true)
                .await
                .with_context(|| format!("Failed to activate {} or refresh disks", device))?;
            printer.emit(&list, |d| output::disks_text(d))
        }
        Commands::Deactivate { device } => {
            let list = disks
                .activate_or_deactivate(&device, false)
                .await
                .with_context(|| format!("Failed to deactivate {} or refresh disks", device))?;
            printer.emit(&list, |d| output::disks_text(d))
        }
        Commands::BootExtend => {
            let boot = disks
                .extend_boot()
                .await
                .context("Failed to extend boot disk")?;
            printer.emit(&boot, output::boot_disk_text)
        }
        Commands::Versions => {
            let versions = backend
                .fetch_versions()
                .await
                .context("Failed to fetch versions")?;
            printer.emit(&versions, |v| output::versions_text(v))
        }
        Commands::Check => {
            run_workflow(backend, policy, VersionWorkflow::CheckForUpdates, printer).await
        }
        Commands::UpgradePlatform => {
            run_workflow(backend, policy, VersionWorkflow::UpgradePlatform, printer).await
        }
        Commands::UpgradeApp { app_id } => {
            run_workflow(backend, policy, VersionWorkflow::UpgradeApp(app_id), printer).await
        }
        Commands::Job { name } => {
            let job = backend
                .poll_job(&name)
                .await
                .with_context(|| format!("Failed to read job {}", name))?;
            printer.emit(&job, output::job_text)
        }
    }
}
