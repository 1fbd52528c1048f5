/// hostmon CLI - Host Inventory Monitoring Agent
///
/// Command line entry point for running and inspecting the agent.
///
/// Usage:
///   hostmon run [--config <path>]         - Start the agent loop
///   hostmon status [--data-dir <path>]    - Summarise the delta store
///   hostmon reset [--data-dir <path>]     - Drop all journalled deltas
///   hostmon compact [--threshold <bytes>] - Compact journal storage
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;

use hostmon::sampler::host::HostInfoSampler;
use hostmon::submission::{DeltaResponse, InventoryBackend, PostDeltaBody};
use hostmon::{Agent, AgentConfig, AgentResult, DeltaStore};

#[derive(Parser)]
#[command(name = "hostmon", version, about = "Host inventory monitoring agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the agent loop
    Run {
        /// Path to a JSON configuration document
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Summarise the delta store
    Status {
        /// Root of the on-disk inventory state
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Entity to inspect; empty selects the local entity
        #[arg(long, default_value = "")]
        entity: String,
    },
    /// Remove every journalled delta for an entity
    Reset {
        /// Root of the on-disk inventory state
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Entity to reset; empty selects the local entity
        #[arg(long, default_value = "")]
        entity: String,
    },
    /// Compact journal storage when it exceeds a threshold
    Compact {
        /// Root of the on-disk inventory state
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Entity to compact; empty selects the local entity
        #[arg(long, default_value = "")]
        entity: String,
        /// Cache-size threshold in bytes
        #[arg(long, default_value_t = 0)]
        threshold: u64,
    },
    /// List entity folders observed in the inventory trees
    Entities {
        /// Root of the on-disk inventory state
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Remove an entity's state from both inventory trees
    RemoveEntity {
        /// Root of the on-disk inventory state
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Entity to remove
        entity: String,
    },
}

/// Stand-in backend that acknowledges every delta locally.
///
/// Without a wire transport configured, submission still exercises the
/// full journal cycle: no hints means every posted delta is a plain
/// acknowledgement and gets archived.
struct AcknowledgingBackend;

#[async_trait]
impl InventoryBackend for AcknowledgingBackend {
    async fn post_deltas(&self, body: &PostDeltaBody) -> AgentResult<DeltaResponse> {
        info!(deltas = body.deltas.len(), "Acknowledging delta batch locally");
        Ok(DeltaResponse::default())
    }
}

/// Default state root, `~/.hostmon`.
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hostmon")
}

async fn open_store(data_dir: Option<PathBuf>) -> Result<DeltaStore> {
    let data_dir = data_dir.unwrap_or_else(default_data_dir);
    DeltaStore::open(&data_dir, "localhost", 0)
        .await
        .with_context(|| format!("opening delta store at {}", data_dir.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    hostmon::init_logging();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { config } => {
            let config = match config {
                Some(path) => AgentConfig::load(&path)
                    .await
                    .with_context(|| format!("loading config from {}", path.display()))?,
                None => AgentConfig {
                    data_dir: default_data_dir(),
                    ..AgentConfig::default()
                },
            };

            let system_interval =
                AgentConfig::sample_interval(config.metrics_system_sample_rate)
                    .unwrap_or(Duration::from_secs(60));

            let mut agent = Agent::new(config, AcknowledgingBackend)
                .await
                .context("starting agent")?;
            agent.register_sampler(Arc::new(HostInfoSampler::new(system_interval)));

            let shutdown = agent.shutdown_handle();
            tokio::spawn(async move {
                let _ = signal::ctrl_c().await;
                info!("Interrupt received, shutting down");
                shutdown.shutdown();
            });

            agent.run().await.context("agent loop")?;
        }
        Command::Status { data_dir, entity } => {
            let mut store = open_store(data_dir).await?;
            let blocks = store.read_deltas(&entity).await.context("reading deltas")?;
            let outstanding: usize = blocks.iter().map(|b| b.len()).sum();

            println!("plugins known:      {}", store.registry().len());
            println!("deltas outstanding: {outstanding}");
            for info in store.registry().iter() {
                let most_recent = info.delta_id(&entity);
                let last_sent = info.last_sent_id(&entity);
                println!("  {:<40} id={most_recent} acked={last_sent}", info.source);
            }
        }
        Command::Reset { data_dir, entity } => {
            let mut store = open_store(data_dir).await?;
            store.reset_all_deltas(&entity).await;
            store.save_state().await.context("persisting id registry")?;
            println!("Delta state reset for entity '{entity}'");
        }
        Command::Compact {
            data_dir,
            entity,
            threshold,
        } => {
            let mut store = open_store(data_dir).await?;
            store
                .compact_storage(&entity, threshold)
                .await
                .context("compacting storage")?;
            println!("Compaction complete");
        }
        Command::Entities { data_dir } => {
            let mut store = open_store(data_dir).await?;
            let mut folders: Vec<String> = store
                .scan_entity_folders()
                .await
                .context("scanning entity folders")?
                .into_iter()
                .collect();
            folders.sort();
            for folder in folders {
                println!("{folder}");
            }
        }
        Command::RemoveEntity { data_dir, entity } => {
            let mut store = open_store(data_dir).await?;
            store
                .remove_entity(&entity)
                .await
                .context("removing entity state")?;
            println!("Entity '{entity}' removed");
        }
    }

    Ok(())
}
