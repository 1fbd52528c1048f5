/// Agent configuration.
///
/// Loaded from a JSON document; every field has a default so a minimal
/// config only needs the license key. Option names follow the wire
/// convention of the ingest service (camelCase).
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{AgentError, AgentResult};
use crate::sampler::{MatcherChain, ProcessFilter};

/// Top-level agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// Root of the on-disk inventory state
    pub data_dir: PathBuf,
    /// Entity key that maps to the local-entity folder
    pub default_entity_key: String,
    /// License the agent submits under
    pub license_key: String,
    /// Per-batch byte ceiling for delta submission; non-positive disables
    /// splitting
    pub max_inventory_size: i64,
    /// Tri-state gate for process samples: true/false/unset
    pub enable_process_metrics: Option<bool>,
    /// Feature flag consulted when the gate is unset and no include-chain
    /// is configured
    pub full_process_sampling: bool,
    /// Include-chain expressions, dimension → list
    pub include_metrics_matchers: HashMap<String, Vec<String>>,
    /// Exclude-chain expressions, dimension → list
    pub exclude_metrics_matchers: HashMap<String, Vec<String>>,
    /// Cache lifetime for the storage sampler's partition list, seconds
    #[serde(rename = "partitionsTTL")]
    pub partitions_ttl: u64,
    /// Storage sampler tick period, seconds; non-positive disables it
    pub metrics_storage_sample_rate: i64,
    /// Network sampler tick period, seconds; non-positive disables it
    pub metrics_network_sample_rate: i64,
    /// NFS sampler tick period, seconds; non-positive disables it
    #[serde(rename = "metricsNFSSampleRate")]
    pub metrics_nfs_sample_rate: i64,
    /// System sampler tick period, seconds; non-positive disables it
    pub metrics_system_sample_rate: i64,
    /// Extra filesystem types the storage sampler should accept
    pub custom_supported_file_systems: Vec<String>,
    /// Device names the storage sampler should skip
    pub file_devices_ignored: Vec<String>,
    /// Interface name filters for the network sampler, matcher → prefixes
    pub network_interface_filters: HashMap<String, Vec<String>>,
    /// Inventory reap period (snapshot diffing), seconds
    pub inventory_reap_interval: u64,
    /// Inventory send period (submission), seconds
    pub inventory_send_interval: u64,
    /// Cache-size threshold that triggers storage compaction, bytes
    pub compaction_threshold: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/db/hostmon"),
            default_entity_key: "localhost".to_string(),
            license_key: String::new(),
            max_inventory_size: 1_000_000,
            enable_process_metrics: None,
            full_process_sampling: false,
            include_metrics_matchers: HashMap::new(),
            exclude_metrics_matchers: HashMap::new(),
            partitions_ttl: 60,
            metrics_storage_sample_rate: 20,
            metrics_network_sample_rate: 10,
            metrics_nfs_sample_rate: 20,
            metrics_system_sample_rate: 5,
            custom_supported_file_systems: Vec::new(),
            file_devices_ignored: Vec::new(),
            network_interface_filters: HashMap::new(),
            inventory_reap_interval: 30,
            inventory_send_interval: 60,
            compaction_threshold: 20 * 1024 * 1024,
        }
    }
}

impl AgentConfig {
    /// Load a configuration document from disk.
    pub async fn load(path: &Path) -> AgentResult<Self> {
        let bytes = fs::read(path)
            .await
            .map_err(|e| AgentError::Storage(format!("Failed to read {}: {e}", path.display())))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Build the process include/exclude filter from the matcher options.
    pub fn process_filter(&self) -> ProcessFilter {
        ProcessFilter::new(
            MatcherChain::from_config(&self.include_metrics_matchers),
            MatcherChain::from_config(&self.exclude_metrics_matchers),
            self.enable_process_metrics,
            self.full_process_sampling,
        )
    }

    /// Tick period for a sampler rate option; None disables the sampler.
    pub fn sample_interval(rate_secs: i64) -> Option<Duration> {
        (rate_secs > 0).then(|| Duration::from_secs(rate_secs as u64))
    }

    /// The reap ticker period.
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.inventory_reap_interval.max(1))
    }

    /// The send ticker period.
    pub fn send_interval(&self) -> Duration {
        Duration::from_secs(self.inventory_send_interval.max(1))
    }

    /// The storage sampler's partition list cache lifetime.
    pub fn partitions_ttl(&self) -> Duration {
        Duration::from_secs(self.partitions_ttl)
    }
}
