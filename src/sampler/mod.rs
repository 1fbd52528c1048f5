/// Sampler capability surface.
///
/// Samplers collect host telemetry on their own cadence and hand batches
/// of samples to the agent loop, which folds them into inventory
/// snapshots. Every sampler exposes the same capability set — sample,
/// interval, name, disabled, on-startup — behind the [`Sampler`] trait;
/// sample payloads are a tagged sum over the known telemetry families plus
/// a flat-map escape hatch for integration-produced events.
///
/// OS counter acquisition lives outside this crate; the harness here only
/// schedules samplers and contains their failures.
pub mod harness;
pub mod host;
pub mod matcher;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::{AgentError, AgentResult};

pub use harness::{PluginOutput, SamplerHandle, spawn_sampler};
pub use matcher::{MatcherChain, ProcessFilter};

/// A process-level sample. The match chain dissects the display name and
/// command line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessSample {
    /// Display name, e.g. the binary name
    #[serde(rename = "processDisplayName")]
    pub process_display_name: String,
    /// Full command line
    #[serde(rename = "commandLine")]
    pub cmd_line: String,
    /// Process id
    #[serde(rename = "processId")]
    pub pid: i64,
    /// CPU share since the previous tick, percent
    #[serde(rename = "cpuPercent")]
    pub cpu_percent: f64,
    /// Resident memory, bytes
    #[serde(rename = "memoryResidentSizeBytes")]
    pub memory_resident_bytes: u64,
}

/// A network interface sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSample {
    /// Interface name
    #[serde(rename = "interfaceName")]
    pub interface_name: String,
    /// Receive throughput, bytes per second
    #[serde(rename = "receiveBytesPerSec")]
    pub receive_bytes_per_sec: f64,
    /// Transmit throughput, bytes per second
    #[serde(rename = "transmitBytesPerSec")]
    pub transmit_bytes_per_sec: f64,
}

/// A storage device sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSample {
    /// Mount point
    #[serde(rename = "mountPoint")]
    pub mount_point: String,
    /// Device name
    #[serde(rename = "device")]
    pub device: String,
    /// Filesystem type
    #[serde(rename = "fileSystemType")]
    pub fs_type: String,
    /// Used capacity, bytes
    #[serde(rename = "diskUsedBytes")]
    pub used_bytes: u64,
    /// Free capacity, bytes
    #[serde(rename = "diskFreeBytes")]
    pub free_bytes: u64,
}

/// A host-wide system sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSample {
    /// CPU utilisation, percent
    #[serde(rename = "cpuPercent")]
    pub cpu_percent: f64,
    /// Total memory, bytes
    #[serde(rename = "memoryTotalBytes")]
    pub memory_total_bytes: u64,
    /// Used memory, bytes
    #[serde(rename = "memoryUsedBytes")]
    pub memory_used_bytes: u64,
    /// Load average over one minute
    #[serde(rename = "loadAverageOneMinute")]
    pub load_average_one: f64,
}

/// An NFS mount sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NfsSample {
    /// Remote server address
    #[serde(rename = "serverAddress")]
    pub server_address: String,
    /// Local mount point
    #[serde(rename = "mountPoint")]
    pub mount_point: String,
    /// Round-trip latency, milliseconds
    #[serde(rename = "latencyMs")]
    pub latency_ms: f64,
}

/// One sampled event, tagged by telemetry family.
///
/// `Flat` carries integration-produced events as raw key/value maps; a
/// flat map whose `eventType` is `ProcessSample` is treated as a process
/// sample by the match chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sample {
    /// Structured process sample
    Process(ProcessSample),
    /// Structured network sample
    Network(NetworkSample),
    /// Structured storage sample
    Storage(StorageSample),
    /// Structured NFS sample
    Nfs(NfsSample),
    /// Structured host-wide sample
    System(SystemSample),
    /// Flat-map event from an integration
    Flat(Map<String, JsonValue>),
}

impl Sample {
    /// Whether this sample describes a process.
    pub fn is_process(&self) -> bool {
        match self {
            Sample::Process(_) => true,
            Sample::Flat(map) => {
                map.get("eventType").and_then(JsonValue::as_str) == Some("ProcessSample")
            }
            _ => false,
        }
    }

    /// Stable key for this sample inside an inventory snapshot object.
    pub fn inventory_key(&self) -> String {
        match self {
            Sample::Process(p) => format!("{}#{}", p.process_display_name, p.pid),
            Sample::Network(n) => n.interface_name.clone(),
            Sample::Storage(s) => s.mount_point.clone(),
            Sample::Nfs(n) => format!("{}:{}", n.server_address, n.mount_point),
            Sample::System(_) => "system".to_string(),
            Sample::Flat(map) => map
                .get("entityKey")
                .or_else(|| map.get("eventType"))
                .and_then(JsonValue::as_str)
                .unwrap_or("event")
                .to_string(),
        }
    }
}

/// The uniform capability set every sampler exposes.
#[async_trait]
pub trait Sampler: Send + Sync + 'static {
    /// Sampler name; doubles as the snapshot file stem.
    fn name(&self) -> &str;

    /// Inventory category the sampler's snapshots land under.
    fn category(&self) -> &str;

    /// Tick period. The harness disables the sampler when this is zero.
    fn interval(&self) -> Duration;

    /// Whether the sampler is configured off.
    fn disabled(&self) -> bool {
        false
    }

    /// Whether to sample once immediately at startup, before the first
    /// tick.
    fn on_startup(&self) -> bool {
        true
    }

    /// Collect one batch of samples.
    async fn sample(&self) -> AgentResult<Vec<Sample>>;
}

/// Run one sample collection with panic containment.
///
/// The sampler body runs on its own task; a panic surfaces as
/// [`AgentError::SamplerFailed`] instead of tearing down the agent loop.
pub async fn sample_guarded(sampler: Arc<dyn Sampler>) -> AgentResult<Vec<Sample>> {
    let name = sampler.name().to_string();
    let handle = tokio::spawn(async move { sampler.sample().await });
    match handle.await {
        Ok(result) => result,
        Err(join_err) if join_err.is_panic() => {
            let payload = join_err.into_panic();
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic with non-string payload".to_string());
            Err(AgentError::SamplerFailed { name, reason })
        }
        Err(join_err) => Err(AgentError::SamplerFailed {
            name,
            reason: join_err.to_string(),
        }),
    }
}
