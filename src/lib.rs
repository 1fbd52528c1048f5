//! # hostmon — host inventory monitoring agent
//!
//! hostmon is a host-resident agent that samples telemetry on periodic
//! tickers, journals **inventory deltas** — the persistent, per-plugin,
//! per-entity diff stream a central ingest service consumes to mirror host
//! state — and submits those deltas reliably across restarts, honouring
//! backend reconciliation hints.
//!
//! ## Quick start
//!
//! ```ignore
//! use hostmon::{Agent, AgentConfig};
//! use hostmon::sampler::host::HostInfoSampler;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AgentConfig::default();
//!     let backend = my_backend(); // implements submission::InventoryBackend
//!
//!     let mut agent = Agent::new(config, backend).await?;
//!     agent.register_sampler(Arc::new(HostInfoSampler::new(Duration::from_secs(60))));
//!     agent.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The agent is built around three layers:
//!
//! 1. **Samplers** (`sampler`) — ticker tasks collecting telemetry and
//!    depositing JSON snapshots into a shared data directory, filtered by
//!    the process match chain.
//! 2. **Delta store** (`delta`) — the core: diffs each snapshot against
//!    its journalled state, appends RFC 7396 merge patches to per-plugin
//!    journals with per-entity monotonic ids, and reconciles the journals
//!    with backend acknowledgements (archive, reset, replay, compaction).
//! 3. **Submission** (`submission`) — assembles size-bounded delta
//!    batches, posts them through the [`submission::InventoryBackend`]
//!    contract, and gates the cycle on the last-submission stores.
//!
//! The store is single-writer by ownership: the agent loop owns it and
//! drains the sampler queue serially, so no store operation ever races
//! another.

pub mod agent;
pub mod config;
pub mod delta;
pub mod error;
pub mod sampler;
pub mod submission;

pub use agent::{Agent, ShutdownHandle};
pub use config::AgentConfig;
pub use delta::{DeltaState, DeltaStateMap, DeltaStore, PluginSource, RawDelta};
pub use error::{AgentError, AgentResult};
pub use submission::{DeltaResponse, InventoryBackend, PostDeltaBody};

// Re-export the JSON value macro; snapshot fixtures lean on it heavily.
pub use serde_json::json;

/// Initialize logging for the agent.
///
/// The log level can be controlled via the `HOSTMON_LOG` environment
/// variable:
/// - `HOSTMON_LOG=error` - Only errors
/// - `HOSTMON_LOG=warn` - Errors and warnings
/// - `HOSTMON_LOG=info` - General information (default)
/// - `HOSTMON_LOG=debug` - Debug information
/// - `HOSTMON_LOG=trace` - Verbose tracing
pub fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("HOSTMON_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
