//! ONTAP NFS Provisioner CLI
//!
//! Provisions and maintains NFS volumes on an ONTAP cluster.
//!
//! ```text
//! ontap-nfs create-volume 10.0.0.5 admin - dc0_d000 aggr1 vol01 100 10.1.1.1 10.1.1.2
//! ontap-nfs resize-volume 10.0.0.5 admin - dc0_d000 vol01 200GB
//! ```
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ontap_nfs_provisioner::{
    capacity::parse_capacity, Error, JobWaiter, OntapClient, Orchestrator, PolicyMaintenance,
    ProvisionRequest, ProvisionerConfig, RemoteClientRef, Result, VolumeMaintenance,
};

/// Password argument value that defers to `ONTAP_PASSWORD`
const PASSWORD_FROM_ENV: &str = "-";

// =============================================================================
// CLI Arguments
// =============================================================================

/// ONTAP NFS Provisioner - export policies, rules and volumes over REST
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, global = true, env = "ONTAP_NFS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true, env = "LOG_JSON")]
    log_json: bool,

    /// Seconds between job and online-state polls
    #[arg(long, global = true)]
    poll_interval_secs: Option<u64>,

    /// Give up waiting after this many seconds
    #[arg(long, global = true)]
    poll_timeout_secs: Option<u64>,

    /// Accept self-signed cluster certificates
    #[arg(long, global = true, conflicts_with = "verify_tls")]
    insecure: bool,

    /// Verify the cluster certificate
    #[arg(long, global = true)]
    verify_tls: bool,

    #[command(subcommand)]
    command: Command,
}

/// Cluster connection and tenant, positional on every subcommand
#[derive(ClapArgs, Debug)]
struct Connection {
    /// Cluster management address or API base URL
    cluster: String,

    username: String,

    /// API password; `-` reads it from ONTAP_PASSWORD
    password: String,

    /// SVM the operation is scoped to
    svm: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an NFS volume with its export policy and rules
    CreateVolume {
        #[command(flatten)]
        conn: Connection,
        aggregate: String,
        volume: String,
        /// Volume size in GiB
        size_gb: u64,
        /// Clients allowed to mount the volume
        #[arg(required = true, num_args = 1..)]
        client_ips: Vec<String>,
    },

    /// Delete a volume
    DeleteVolume {
        #[command(flatten)]
        conn: Connection,
        volume: String,
    },

    /// Delete an export policy
    DeleteExportPolicy {
        #[command(flatten)]
        conn: Connection,
        policy: String,
    },

    /// Remove one client IP from an export policy's rules
    DeleteIp {
        #[command(flatten)]
        conn: Connection,
        policy: String,
        ip: String,
    },

    /// Change a volume's size (`200GB`, `10Gi` or bytes)
    ResizeVolume {
        #[command(flatten)]
        conn: Connection,
        volume: String,
        size: String,
    },
}

impl Command {
    fn connection(&self) -> &Connection {
        match self {
            Command::CreateVolume { conn, .. }
            | Command::DeleteVolume { conn, .. }
            | Command::DeleteExportPolicy { conn, .. }
            | Command::DeleteIp { conn, .. }
            | Command::ResizeVolume { conn, .. } => conn,
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(&args);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    match run(args, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            if e.is_retryable() {
                info!("Completed steps are idempotent; the command can be re-run");
            }
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(args: Args, cancel: CancellationToken) -> Result<()> {
    let config = build_config(&args)?;
    let conn = args.command.connection();

    info!("ONTAP NFS Provisioner {}", ontap_nfs_provisioner::VERSION);
    info!("  Cluster: {}", config.cluster.base_url());
    info!("  SVM: {}", conn.svm);

    let client: RemoteClientRef = Arc::new(OntapClient::new(&config.cluster)?);
    let jobs = || JobWaiter::new(client.clone(), &conn.svm, config.poll_config(), cancel.clone());

    match &args.command {
        Command::CreateVolume {
            aggregate,
            volume,
            size_gb,
            client_ips,
            ..
        } => {
            let request = ProvisionRequest::new(volume, aggregate, *size_gb, client_ips.clone())?;
            let orchestrator =
                Orchestrator::new(client.clone(), &conn.svm, &config, cancel.clone());
            let report = orchestrator.provision(&request).await?;

            if !report.is_clean() {
                warn!(
                    "Volume {} is usable but {} setting(s) need attention",
                    report.volume_name,
                    report.advisories.len()
                );
            }
            print_json(&report)
        }
        Command::DeleteVolume { volume, .. } => {
            let outcome = VolumeMaintenance::new(client.clone(), &conn.svm, jobs())
                .delete_volume(volume)
                .await?;
            print_json(&outcome)
        }
        Command::DeleteExportPolicy { policy, .. } => {
            let outcome = PolicyMaintenance::new(client.clone(), &conn.svm)
                .delete_export_policy(policy)
                .await?;
            print_json(&outcome)
        }
        Command::DeleteIp { policy, ip, .. } => {
            let edits = PolicyMaintenance::new(client.clone(), &conn.svm)
                .remove_client_ip(policy, ip)
                .await?;
            print_json(&edits)
        }
        Command::ResizeVolume { volume, size, .. } => {
            let size_bytes = parse_capacity(size)?;
            let outcome = VolumeMaintenance::new(client.clone(), &conn.svm, jobs())
                .resize_volume(volume, size_bytes)
                .await?;
            print_json(&outcome)
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// File values first, then command-line overrides
fn build_config(args: &Args) -> Result<ProvisionerConfig> {
    let mut config = match &args.config {
        Some(path) => ProvisionerConfig::from_yaml_file(path)?,
        None => ProvisionerConfig::default(),
    };

    let conn = args.command.connection();
    config.cluster.endpoint = conn.cluster.clone();
    config.cluster.username = conn.username.clone();
    config.cluster.password = if conn.password == PASSWORD_FROM_ENV {
        std::env::var("ONTAP_PASSWORD").map_err(|_| {
            Error::Configuration("password '-' given but ONTAP_PASSWORD is not set".into())
        })?
    } else {
        conn.password.clone()
    };

    if let Some(interval) = args.poll_interval_secs {
        config.polling.interval_secs = interval;
    }
    if let Some(timeout) = args.poll_timeout_secs {
        config.polling.timeout_secs = timeout;
    }
    if args.insecure {
        config.cluster.accept_invalid_certs = true;
    }
    if args.verify_tls {
        config.cluster.accept_invalid_certs = false;
    }

    config.validate()?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=info", "rustls=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
