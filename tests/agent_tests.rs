/// Smoke test for the agent loop: a real sampler feeding the queue, the
/// reap and send tickers driving the store, and a clean shutdown that
/// persists the id registry.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use hostmon::sampler::host::HostInfoSampler;
use hostmon::submission::{DeltaResponse, InventoryBackend, PostDeltaBody};
use hostmon::{Agent, AgentConfig, AgentResult, DeltaStore, PluginSource};

struct AckBackend;

#[async_trait]
impl InventoryBackend for AckBackend {
    async fn post_deltas(&self, _body: &PostDeltaBody) -> AgentResult<DeltaResponse> {
        Ok(DeltaResponse::default())
    }
}

#[tokio::test]
async fn agent_samples_journals_and_submits() {
    let dir = TempDir::new().unwrap();
    let config = AgentConfig {
        data_dir: dir.path().to_path_buf(),
        default_entity_key: "local-host".to_string(),
        license_key: "test-license".to_string(),
        inventory_reap_interval: 1,
        inventory_send_interval: 1,
        ..AgentConfig::default()
    };

    let mut agent = Agent::new(config, AckBackend).await.unwrap();
    agent.register_sampler(Arc::new(HostInfoSampler::new(Duration::from_millis(200))));
    let shutdown = agent.shutdown_handle();

    let loop_task = tokio::spawn(agent.run());
    tokio::time::sleep(Duration::from_millis(2600)).await;
    shutdown.shutdown();
    loop_task.await.unwrap().unwrap();

    // The sampler's snapshot went through the full cycle: journalled,
    // submitted, acknowledged, and the registry survived shutdown.
    let store = DeltaStore::open(dir.path(), "local-host", 0).await.unwrap();
    let info = store
        .registry()
        .get(&PluginSource::new("metadata", "host_info"))
        .expect("host_info plugin should be registered");
    assert!(info.delta_id("") >= 1);
    assert!(info.last_sent_id("") >= 1);
}
