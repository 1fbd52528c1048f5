/// Tests for the submission cycle: gating, delivery, reconciliation, and
/// backoff, against an in-memory backend double.
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use tokio::fs;

use hostmon::delta::journal;
use hostmon::delta::layout::LOCAL_ENTITY_DIR;
use hostmon::submission::state::{
    fingerprint_of, LAST_ENTITY_ID_DIR, LAST_LICENSE_DIR, LAST_SUCCESS_DIR,
};
use hostmon::submission::{DeltaResponse, InventoryBackend, InventorySender, PostDeltaBody};
use hostmon::{AgentError, AgentResult, DeltaStore, PluginSource};

const DEFAULT_ENTITY: &str = "local-host";

/// What the fake backend answers with.
#[derive(Debug, Clone)]
enum Reply {
    Ack,
    WithEntityId(i64),
    RateLimited,
    Error(String),
}

#[derive(Clone)]
struct FakeBackend {
    reply: Reply,
    calls: Arc<Mutex<Vec<PostDeltaBody>>>,
}

impl FakeBackend {
    fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn calls(&self) -> Vec<PostDeltaBody> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl InventoryBackend for FakeBackend {
    async fn post_deltas(&self, body: &PostDeltaBody) -> AgentResult<DeltaResponse> {
        self.calls.lock().unwrap().push(body.clone());
        match &self.reply {
            Reply::Ack => Ok(DeltaResponse::default()),
            Reply::WithEntityId(id) => Ok(DeltaResponse {
                entity_id: Some(*id),
                delta_states: None,
            }),
            Reply::RateLimited => Err(AgentError::RateLimited),
            Reply::Error(msg) => Err(AgentError::Backend(msg.clone())),
        }
    }
}

async fn store_with_deltas(dir: &TempDir, versions: &[&str]) -> DeltaStore {
    let mut store = DeltaStore::open(dir.path(), DEFAULT_ENTITY, 0).await.unwrap();
    for version in versions {
        store
            .save_plugin_source("", "metadata", "plugin", &json!({"alias": version}))
            .await
            .unwrap();
        store.update_plugins_inventory_cache("").await.unwrap();
    }
    store
}

#[tokio::test]
async fn submit_posts_acks_and_records_the_clock() {
    let dir = TempDir::new().unwrap();
    let mut store = store_with_deltas(&dir, &["aaa", "bbb", "ccc"]).await;

    let backend = FakeBackend::new(Reply::Ack);
    let mut sender = InventorySender::new(store.layout(), "", "lic-a", backend.clone());
    sender.submit(&mut store).await.unwrap();

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].deltas.len(), 3);
    assert_eq!(calls[0].entity_keys, vec!["".to_string()]);

    // Everything acknowledged and archived.
    let pending = store.layout().pending_file("metadata", "", "plugin");
    let sent = store.layout().sent_file("metadata", "", "plugin");
    assert!(journal::read_records(&pending).await.unwrap().is_empty());
    assert_eq!(journal::read_records(&sent).await.unwrap().len(), 3);
    let info = store
        .registry()
        .get(&PluginSource::new("metadata", "plugin"))
        .unwrap();
    assert_eq!(info.last_sent_id(""), 3);

    // The submission clock landed under the local-entity name.
    let clock = dir.path().join(LAST_SUCCESS_DIR).join(LOCAL_ENTITY_DIR);
    let content = fs::read_to_string(&clock).await.unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(content.trim()).is_ok());
    assert_eq!(sender.backoff().delay(), std::time::Duration::ZERO);
}

#[tokio::test]
async fn nothing_outstanding_posts_nothing() {
    let dir = TempDir::new().unwrap();
    let mut store = DeltaStore::open(dir.path(), DEFAULT_ENTITY, 0).await.unwrap();

    let backend = FakeBackend::new(Reply::Ack);
    let mut sender = InventorySender::new(store.layout(), "", "lic-a", backend.clone());
    sender.submit(&mut store).await.unwrap();

    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn license_change_resets_journalled_state() {
    let dir = TempDir::new().unwrap();
    let mut store = store_with_deltas(&dir, &["aaa"]).await;

    // First submission under the old license seeds the fingerprint.
    let backend = FakeBackend::new(Reply::Ack);
    let mut sender = InventorySender::new(store.layout(), "", "lic-a", backend.clone());
    sender.submit(&mut store).await.unwrap();
    assert_eq!(backend.calls().len(), 1);

    // More deltas accrue, then the agent comes back with a new license.
    store
        .save_plugin_source("", "metadata", "plugin", &json!({"alias": "bbb"}))
        .await
        .unwrap();
    store.update_plugins_inventory_cache("").await.unwrap();

    let backend = FakeBackend::new(Reply::Ack);
    let mut sender = InventorySender::new(store.layout(), "", "lic-b", backend.clone());
    sender.submit(&mut store).await.unwrap();

    // The reset wiped the journals before anything could be posted.
    assert!(backend.calls().is_empty());
    assert!(!store.layout().pending_file("metadata", "", "plugin").exists());

    let fingerprint = dir.path().join(LAST_LICENSE_DIR).join(LOCAL_ENTITY_DIR);
    assert_eq!(
        fs::read_to_string(&fingerprint).await.unwrap(),
        fingerprint_of("lic-b")
    );
}

#[tokio::test]
async fn rate_limit_jumps_to_the_maximum_backoff() {
    let dir = TempDir::new().unwrap();
    let mut store = store_with_deltas(&dir, &["aaa"]).await;

    let backend = FakeBackend::new(Reply::RateLimited);
    let mut sender = InventorySender::new(store.layout(), "", "lic-a", backend.clone());

    assert!(matches!(
        sender.submit(&mut store).await,
        Err(AgentError::RateLimited)
    ));
    assert_eq!(sender.backoff().delay(), std::time::Duration::from_secs(300));

    // Nothing was acknowledged; the delta stays pending for the retry.
    let pending = store.layout().pending_file("metadata", "", "plugin");
    assert_eq!(journal::read_records(&pending).await.unwrap().len(), 1);
}

#[tokio::test]
async fn ordinary_errors_widen_backoff_gradually() {
    let dir = TempDir::new().unwrap();
    let mut store = store_with_deltas(&dir, &["aaa"]).await;

    let backend = FakeBackend::new(Reply::Error("bad gateway".to_string()));
    let mut sender = InventorySender::new(store.layout(), "", "lic-a", backend);

    assert!(sender.submit(&mut store).await.is_err());
    assert_eq!(sender.backoff().delay(), std::time::Duration::from_secs(1));
    assert!(sender.submit(&mut store).await.is_err());
    assert_eq!(sender.backoff().delay(), std::time::Duration::from_secs(2));
}

#[tokio::test]
async fn backend_assigned_entity_id_is_persisted_and_echoed() {
    let dir = TempDir::new().unwrap();
    let mut store = store_with_deltas(&dir, &["aaa"]).await;

    let backend = FakeBackend::new(Reply::WithEntityId(7001));
    let mut sender = InventorySender::new(store.layout(), "", "lic-a", backend.clone());
    sender.submit(&mut store).await.unwrap();

    let id_file = dir.path().join(LAST_ENTITY_ID_DIR).join(LOCAL_ENTITY_DIR);
    assert_eq!(fs::read_to_string(&id_file).await.unwrap(), "7001");

    // The next cycle echoes the assigned id back to the backend.
    store
        .save_plugin_source("", "metadata", "plugin", &json!({"alias": "bbb"}))
        .await
        .unwrap();
    store.update_plugins_inventory_cache("").await.unwrap();
    sender.submit(&mut store).await.unwrap();

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].entity_id, Some(7001));
}
