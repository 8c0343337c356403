//! transitnet - provision two VPCs joined by AWS Transit Gateways.
//!
//! # Usage
//!
//! ```text
//! transitnet intra-region            # one region, one transit gateway
//! transitnet inter-region            # two regions, two peered gateways
//! transitnet cleanup intra-region    # delete everything recorded
//! transitnet show inter-region       # print the recorded resources
//! transitnet validate                # check the topology file
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `STATE_DIR` | `state` | Directory holding `<scenario>.json` state files |
//! | `TOPOLOGY_FILE` | `config/topology.yaml` | Topology constants |
//! | `DEFAULT_REGION` / `AWS_REGION` | `us-east-1` | Region for intra-region runs and bare records |
//! | `POLL_INTERVAL_SECS` | `10` | Delay between state polls |
//! | `POLL_TIMEOUT_SECS` | `600` | Give up waiting after this long |
//! | `EC2_ENDPOINT_URL` | *(unset)* | Endpoint override (local emulator) |
//! | `AUTO_APPROVE` | `false` | Skip the checkpoints between phases |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use transitnet_core::scenario::{inter_region, intra_region};
use transitnet_core::{
    AutoApprove, CancelHandle, Checkpoint, LineCheckpoint, Outcome, Provisioner, ResourceStore,
    Scenario, Teardown, TopologyFile, TransitNetConfig, cancellation,
};
use transitnet_ec2::AwsNetwork;

/// Exit code used when the run is interrupted with Ctrl-C.
const INTERRUPTED: u8 = 130;

#[derive(Debug, Parser)]
#[command(name = "transitnet", version)]
#[command(about = "Provision two VPCs joined by AWS Transit Gateways")]
struct Cli {
    /// Directory holding the per-scenario state files.
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Topology constants (YAML).
    #[arg(long)]
    topology: Option<PathBuf>,

    /// Endpoint override for EC2 and STS.
    #[arg(long, env = "EC2_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// Continue through every checkpoint without asking.
    #[arg(short = 'y', long)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Two VPCs in one region joined by one transit gateway.
    IntraRegion,
    /// Two VPCs in two regions joined by peered transit gateways.
    InterRegion,
    /// Delete everything recorded for a scenario.
    Cleanup {
        /// `intra-region` or `inter-region`.
        scenario: Scenario,
    },
    /// Print the resources recorded for a scenario.
    Show {
        /// `intra-region` or `inter-region`.
        scenario: Scenario,
    },
    /// Load and validate the topology file.
    Validate,
}

impl Cli {
    /// Environment configuration with command-line overrides applied.
    fn config(&self) -> TransitNetConfig {
        let mut config = TransitNetConfig::from_env();
        if let Some(dir) = &self.state_dir {
            config.state_dir.clone_from(dir);
        }
        if let Some(path) = &self.topology {
            config.topology_file.clone_from(path);
        }
        if let Some(url) = &self.endpoint_url {
            config.endpoint_url = Some(url.clone());
        }
        if self.yes {
            config.auto_approve = true;
        }
        config
    }
}

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    Ok(())
}

fn open_store(config: &TransitNetConfig, scenario: Scenario) -> Result<ResourceStore> {
    ResourceStore::open(&config.state_dir, scenario.state_name())
        .with_context(|| format!("failed to open state for {scenario}"))
}

fn checkpoint(config: &TransitNetConfig) -> Box<dyn Checkpoint> {
    if config.auto_approve {
        Box::new(AutoApprove)
    } else {
        Box::new(LineCheckpoint::new(
            BufReader::new(std::io::stdin()),
            std::io::stdout(),
        ))
    }
}

/// Cancel the run on the first Ctrl-C. The current step finishes and is
/// recorded before the run stops.
fn cancel_on_interrupt(handle: CancelHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current step");
            handle.cancel();
        }
    });
}

async fn provision(scenario: Scenario, config: &TransitNetConfig) -> Result<ExitCode> {
    let topology = TopologyFile::load(&config.topology_file)?;
    let store = open_store(config, scenario)?;
    let network = AwsNetwork::connect(config).await;
    let (handle, signal) = cancellation();
    let provisioner =
        Provisioner::new(&network, &store, config.poll_settings()).with_cancel(signal);
    let checkpoint = checkpoint(config);

    info!(
        %scenario,
        state = %store.path().display(),
        recorded = store.len(),
        "starting provisioning"
    );
    cancel_on_interrupt(handle);

    let outcome = match scenario {
        Scenario::IntraRegion => {
            intra_region::run(
                topology.intra_region()?,
                &config.default_region,
                &provisioner,
                checkpoint.as_ref(),
            )
            .await
        }
        Scenario::InterRegion => {
            inter_region::run(topology.inter_region()?, &provisioner, checkpoint.as_ref()).await
        }
    }
    .with_context(|| {
        format!(
            "{scenario} provisioning failed; run `transitnet cleanup {scenario}` to remove what was created"
        )
    })?;

    match outcome {
        Outcome::Completed => info!(%scenario, resources = store.len(), "provisioning complete"),
        Outcome::Stopped { after } => info!(
            %scenario,
            %after,
            "stopped; rerun to continue or run `transitnet cleanup {scenario}`"
        ),
        Outcome::Interrupted { during } => {
            warn!(
                %scenario,
                %during,
                state = %store.path().display(),
                "interrupted, everything created so far is recorded"
            );
            return Ok(ExitCode::from(INTERRUPTED));
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn cleanup(scenario: Scenario, config: &TransitNetConfig) -> Result<ExitCode> {
    let store = open_store(config, scenario)?;
    if store.is_empty() {
        info!(%scenario, state = %store.path().display(), "nothing recorded, nothing to delete");
        return Ok(ExitCode::SUCCESS);
    }

    let network = AwsNetwork::connect(config).await;
    let report = Teardown::new(
        &network,
        &store,
        config.default_region.clone(),
        config.poll_settings(),
    )
    .run()
    .await?;

    for (name, reason) in &report.failed {
        error!(%name, %reason, "not deleted");
    }
    for name in &report.unclassified {
        warn!(%name, "unknown resource kind, left in the state file");
    }

    if report.is_clean() {
        info!(
            %scenario,
            deleted = report.deleted.len(),
            skipped = report.skipped.len(),
            "teardown complete"
        );
        Ok(ExitCode::SUCCESS)
    } else {
        warn!(
            %scenario,
            remaining = store.len(),
            "teardown incomplete; rerun cleanup to retry"
        );
        Ok(ExitCode::FAILURE)
    }
}

fn show(scenario: Scenario, config: &TransitNetConfig) -> Result<ExitCode> {
    let store = open_store(config, scenario)?;
    println!("{}", store.to_json_pretty()?);
    Ok(ExitCode::SUCCESS)
}

fn validate(config: &TransitNetConfig) -> Result<ExitCode> {
    let topology = TopologyFile::load(&config.topology_file)?;
    topology.validate()?;
    for scenario in Scenario::ALL {
        let present = match scenario {
            Scenario::IntraRegion => topology.intra_region.is_some(),
            Scenario::InterRegion => topology.inter_region.is_some(),
        };
        info!(%scenario, present, "topology section");
    }
    println!("{} is valid", config.topology_file.display());
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli.config();
    init_tracing(&config.log_level)?;

    match cli.command {
        Command::IntraRegion => provision(Scenario::IntraRegion, &config).await,
        Command::InterRegion => provision(Scenario::InterRegion, &config).await,
        Command::Cleanup { scenario } => cleanup(scenario, &config).await,
        Command::Show { scenario } => show(scenario, &config),
        Command::Validate => validate(&config),
    }
}
