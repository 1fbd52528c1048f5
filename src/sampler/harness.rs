/// Sampler scheduling.
///
/// Every sampler runs on its own cadence as an independent ticker task.
/// Collected samples pass through the process match chain, are folded into
/// a snapshot object keyed by sample identity, and delivered to the agent
/// loop over a shared bounded queue. Stopping a sampler flips its stop
/// channel; the loop observes it both between ticks and before submitting
/// a batch, so cancellation lands within one tick plus an in-flight
/// sample.
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, warn};

use crate::sampler::{sample_guarded, ProcessFilter, Sampler};

/// One inventory snapshot produced by a sampler, addressed to a
/// `(plugin, entity)` pair in the delta store.
#[derive(Debug, Clone)]
pub struct PluginOutput {
    /// Entity the snapshot belongs to
    pub entity_key: String,
    /// Plugin category (first path segment under the data dir)
    pub category: String,
    /// Snapshot file stem
    pub term: String,
    /// The snapshot object
    pub data: JsonValue,
}

/// Handle over a running sampler task.
pub struct SamplerHandle {
    name: String,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SamplerHandle {
    /// The sampler's registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signal the sampler to stop and wait for its loop to wind down.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}

/// Start a sampler's ticker task.
///
/// Returns None when the sampler is disabled or has a zero interval.
/// Sampler failures (panics included) are logged and the loop keeps
/// ticking; a closed queue ends the loop.
pub fn spawn_sampler(
    sampler: Arc<dyn Sampler>,
    entity_key: String,
    filter: Arc<ProcessFilter>,
    queue: mpsc::Sender<PluginOutput>,
) -> Option<SamplerHandle> {
    if sampler.disabled() || sampler.interval().is_zero() {
        debug!(sampler = sampler.name(), "Sampler disabled, not scheduling");
        return None;
    }

    let name = sampler.name().to_string();
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let task = tokio::spawn({
        let name = name.clone();
        async move {
            let mut ticker = interval(sampler.interval());

            // The first interval tick fires immediately; it doubles as the
            // startup sample when the sampler asks for one.
            ticker.tick().await;
            if sampler.on_startup() {
                collect_and_submit(&sampler, &entity_key, &filter, &queue, &stop_rx).await;
            }

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !collect_and_submit(&sampler, &entity_key, &filter, &queue, &stop_rx).await {
                            break;
                        }
                    }
                    _ = stop_rx.changed() => {
                        debug!(sampler = %name, "Sampler stopping");
                        break;
                    }
                }
            }
        }
    });

    Some(SamplerHandle {
        name,
        stop: stop_tx,
        task,
    })
}

/// Run one collection and deliver the snapshot. Returns false when the
/// loop should end (stop signalled or queue closed).
async fn collect_and_submit(
    sampler: &Arc<dyn Sampler>,
    entity_key: &str,
    filter: &ProcessFilter,
    queue: &mpsc::Sender<PluginOutput>,
    stop_rx: &watch::Receiver<bool>,
) -> bool {
    let samples = match sample_guarded(sampler.clone()).await {
        Ok(samples) => samples,
        Err(e) => {
            warn!(sampler = sampler.name(), error = %e, "Sample collection failed");
            return true;
        }
    };

    let mut data = Map::new();
    for sample in samples.into_iter().filter(|s| filter.accepts(s)) {
        match serde_json::to_value(&sample) {
            Ok(value) => {
                data.insert(sample.inventory_key(), value);
            }
            Err(e) => warn!(sampler = sampler.name(), error = %e, "Unencodable sample dropped"),
        }
    }
    if data.is_empty() {
        return true;
    }

    // Stop may have been requested while the sample was in flight.
    if *stop_rx.borrow() {
        return false;
    }

    let output = PluginOutput {
        entity_key: entity_key.to_string(),
        category: sampler.category().to_string(),
        term: sampler.name().to_string(),
        data: JsonValue::Object(data),
    };
    queue.send(output).await.is_ok()
}
