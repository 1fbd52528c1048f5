/// The agent loop.
///
/// Samplers run as independent ticker tasks and deliver snapshots to a
/// bounded queue; the loop here drains that queue serially into the delta
/// store, diffs the snapshots on the reap ticker, and submits the
/// outstanding deltas on the send ticker. The store is owned by the loop,
/// so every store operation is serialised by construction.
///
/// The reap and send tickers are independent. A failed submission
/// reschedules the send timer with the sender's exponential backoff; a
/// rate-limited one jumps straight to the maximum delay.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::delta::DeltaStore;
use crate::error::AgentResult;
use crate::sampler::{spawn_sampler, PluginOutput, ProcessFilter, Sampler, SamplerHandle};
use crate::submission::{InventoryBackend, InventorySender};

/// Capacity of the shared sampler queue.
const QUEUE_CAPACITY: usize = 128;

/// Period of the storage compaction ticker.
const COMPACT_PERIOD: Duration = Duration::from_secs(300);

/// Signals a running agent to wind down.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Request shutdown. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// The assembled monitoring agent.
pub struct Agent<B> {
    config: AgentConfig,
    store: DeltaStore,
    sender: InventorySender<B>,
    filter: Arc<ProcessFilter>,
    queue_tx: mpsc::Sender<PluginOutput>,
    queue_rx: mpsc::Receiver<PluginOutput>,
    samplers: Vec<SamplerHandle>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl<B: InventoryBackend> Agent<B> {
    /// Open the delta store and wire the submission machinery.
    pub async fn new(config: AgentConfig, backend: B) -> AgentResult<Self> {
        let store = DeltaStore::open(
            &config.data_dir,
            &config.default_entity_key,
            config.max_inventory_size,
        )
        .await?;

        // The local entity submits under the empty key; the layout maps it
        // to the reserved local-entity folder.
        let sender = InventorySender::new(store.layout(), "", &config.license_key, backend);
        let filter = Arc::new(config.process_filter());
        let (queue_tx, queue_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            store,
            sender,
            filter,
            queue_tx,
            queue_rx,
            samplers: Vec::new(),
            shutdown: Arc::new(shutdown),
        })
    }

    /// A handle that can stop the running loop from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown.clone(),
        }
    }

    /// Schedule a sampler for the local entity. Disabled samplers are
    /// skipped.
    pub fn register_sampler(&mut self, sampler: Arc<dyn Sampler>) {
        let name = sampler.name().to_string();
        match spawn_sampler(
            sampler,
            String::new(),
            self.filter.clone(),
            self.queue_tx.clone(),
        ) {
            Some(handle) => {
                info!(sampler = %name, "Sampler scheduled");
                self.samplers.push(handle);
            }
            None => debug!(sampler = %name, "Sampler not scheduled"),
        }
    }

    /// Run the loop until shutdown is requested, then stop the samplers
    /// and persist the id registry.
    pub async fn run(mut self) -> AgentResult<()> {
        info!(
            data_dir = %self.config.data_dir.display(),
            samplers = self.samplers.len(),
            "Agent loop starting"
        );

        let mut reap = interval(self.config.reap_interval());
        reap.tick().await;
        let mut compact = interval(COMPACT_PERIOD);
        compact.tick().await;

        let send_interval = self.config.send_interval();
        let mut next_send = Instant::now() + self.sender.next_due(send_interval).await;
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                Some(output) = self.queue_rx.recv() => {
                    if let Err(e) = self
                        .store
                        .save_plugin_source(
                            &output.entity_key,
                            &output.category,
                            &output.term,
                            &output.data,
                        )
                        .await
                    {
                        warn!(category = %output.category, term = %output.term, error = %e,
                            "Failed to save plugin snapshot");
                    }
                }
                _ = reap.tick() => {
                    if let Err(e) = self.store.update_plugins_inventory_cache("").await {
                        warn!(error = %e, "Inventory cache update failed, retrying next tick");
                    }
                }
                _ = sleep_until(next_send) => {
                    match self.sender.submit(&mut self.store).await {
                        Ok(()) => next_send = Instant::now() + send_interval,
                        Err(e) => {
                            warn!(error = %e, "Inventory submission failed");
                            let backoff = self.sender.backoff().delay();
                            let delay = if backoff.is_zero() { send_interval } else { backoff };
                            next_send = Instant::now() + delay;
                        }
                    }
                }
                _ = compact.tick() => {
                    if let Err(e) = self
                        .store
                        .compact_storage("", self.config.compaction_threshold)
                        .await
                    {
                        warn!(error = %e, "Storage compaction failed");
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        for handle in self.samplers.drain(..) {
            handle.stop().await;
        }
        self.store.save_state().await?;
        info!("Agent loop stopped");
        Ok(())
    }
}
