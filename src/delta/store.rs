/// Inventory delta store coordinator.
///
/// The store owns the cache directory and the plugin id registry, and
/// orchestrates the full delta lifecycle across plugins and entities:
///
/// 1. Samplers deposit JSON snapshots into the shared data directory via
///    [`DeltaStore::save_plugin_source`].
/// 2. [`DeltaStore::update_plugins_inventory_cache`] diffs each snapshot
///    against its cached twin, journals the non-empty deltas and bumps the
///    per-entity ids.
/// 3. The inventory sender assembles size-bounded batches with
///    [`DeltaStore::read_deltas`], posts them, and feeds the backend's
///    reconciliation hints back through [`DeltaStore::update_state`],
///    which archives acknowledged deltas.
///
/// The store is single-writer: every operation takes `&mut self`, and the
/// agent loop owns the store outright, so no two operations ever overlap.
/// Readers of the disk layout outside the store must tolerate files
/// appearing and disappearing.
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value as JsonValue;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::delta::journal::{self, RawDelta};
use crate::delta::layout::{self, Layout};
use crate::delta::patch;
use crate::delta::reconcile::{self, DeltaStateMap, HintOutcome};
use crate::delta::registry::{PluginRegistry, PluginSource};
use crate::error::{AgentError, AgentResult};

/// Coordinator for the journaled inventory delta stream.
#[derive(Debug)]
pub struct DeltaStore {
    layout: Layout,
    registry: PluginRegistry,
    max_inventory_size: i64,
}

impl DeltaStore {
    /// Open (or create) a store rooted at `data_dir`.
    ///
    /// Ensures the data, cache, and scratch directories exist and loads the
    /// persisted id registry. A corrupt registry file is deleted and the
    /// store starts fresh; failing to create the directories or to delete
    /// the corrupt file is fatal to the caller.
    pub async fn open(
        data_dir: impl Into<PathBuf>,
        default_entity_key: &str,
        max_inventory_size: i64,
    ) -> AgentResult<Self> {
        let layout = Layout::new(data_dir, default_entity_key)?;

        layout::ensure_dir(layout.data_dir()).await?;
        layout::ensure_dir(layout.cache_dir()).await?;
        layout::ensure_dir(layout.sampling_dir()).await?;

        let registry = PluginRegistry::load(&layout.plugin_id_map_file()).await?;
        info!(
            data_dir = %layout.data_dir().display(),
            plugins = registry.len(),
            "Inventory delta store opened"
        );

        Ok(Self {
            layout,
            registry,
            max_inventory_size,
        })
    }

    /// The store's path layout.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The in-memory id registry.
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Write a plugin snapshot into the shared data directory.
    ///
    /// The object is recursively scrubbed of null-valued keys when its
    /// marshalled form contains the `null` token. Fails when the marshalled
    /// size exceeds the configured inventory ceiling.
    pub async fn save_plugin_source(
        &mut self,
        entity_key: &str,
        category: &str,
        term: &str,
        obj: &JsonValue,
    ) -> AgentResult<()> {
        let mut bytes = serde_json::to_vec(obj)?;
        if patch::contains_null_token(&bytes) {
            let mut scrubbed: JsonValue = serde_json::from_slice(&bytes)?;
            patch::scrub_nulls(&mut scrubbed);
            bytes = serde_json::to_vec(&scrubbed)?;
        }

        if self.max_inventory_size > 0 && bytes.len() > self.max_inventory_size as usize {
            return Err(AgentError::PayloadTooLarge {
                plugin_source: format!("{category}/{term}"),
                size: bytes.len(),
                limit: self.max_inventory_size as usize,
            });
        }

        let path = self.layout.source_file(category, entity_key, term);
        layout::write_file_atomic(&path, &bytes).await
    }

    /// Diff every plugin snapshot for an entity against its cached twin,
    /// journalling the non-empty deltas.
    ///
    /// For each changed plugin the delta is appended to `.pending`, the
    /// cache twin is replaced with the source bytes, and the entity's
    /// `mostRecentID` is bumped. The id registry is persisted iff at least
    /// one plugin produced a delta. A plugin whose JSON cannot be parsed is
    /// purged (source, cache, and journals removed) and processing
    /// continues.
    pub async fn update_plugins_inventory_cache(&mut self, entity_key: &str) -> AgentResult<()> {
        let mut journalled = false;

        for category in sorted_dir_names(self.layout.data_dir()).await? {
            let source_dir = self.layout.source_dir(&category, entity_key);
            for stem in sorted_file_stems(&source_dir, ".json").await? {
                let source = PluginSource::new(category.clone(), stem.clone());
                match self.update_one_plugin(entity_key, &source).await {
                    Ok(true) => journalled = true,
                    Ok(false) => {}
                    Err(AgentError::Serialization(e)) => {
                        warn!(source = %source, error = %e,
                            "Malformed plugin JSON, purging its state");
                        self.purge_plugin(entity_key, &source).await?;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        if journalled {
            self.registry.save(&self.layout.plugin_id_map_file()).await?;
        }
        Ok(())
    }

    /// Diff one plugin snapshot against its cache. Returns whether a delta
    /// was journalled.
    async fn update_one_plugin(
        &mut self,
        entity_key: &str,
        source: &PluginSource,
    ) -> AgentResult<bool> {
        let source_path = self.layout.source_file(&source.category, entity_key, &source.stem);
        let cache_path = self.layout.cache_file(&source.category, entity_key, &source.stem);

        let source_bytes = fs::read(&source_path).await.map_err(|e| {
            AgentError::Storage(format!("Failed to read {}: {e}", source_path.display()))
        })?;

        let cached_bytes = match fs::read(&cache_path).await {
            Ok(b) => Some(b),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(AgentError::Storage(format!(
                    "Failed to read {}: {e}",
                    cache_path.display()
                )))
            }
        };

        let (diff, full_diff) = match &cached_bytes {
            // First sighting: the whole snapshot is the delta, decoded once
            // so the journalled form is normalised JSON.
            None => (serde_json::from_slice(&source_bytes)?, true),
            Some(cached) => (patch::diff_bytes(cached, &source_bytes)?, false),
        };

        if diff.as_object().is_some_and(|m| m.is_empty()) {
            return Ok(false);
        }

        let id = self.registry.get_or_create(source).next_delta_id(entity_key);
        let record = RawDelta {
            source: source.to_string(),
            id,
            timestamp: Utc::now().timestamp(),
            diff,
            full_diff,
        };

        let pending = self.layout.pending_file(&source.category, entity_key, &source.stem);
        journal::append_record(&pending, &record).await?;
        layout::write_file_atomic(&cache_path, &source_bytes).await?;

        debug!(source = %source, entity = entity_key, id, full = full_diff,
            "Journalled inventory delta");
        Ok(true)
    }

    /// Assemble the outstanding deltas for an entity into size-bounded
    /// blocks.
    ///
    /// Pending journals are concatenated greedily per plugin into buffers
    /// whose serialised size never exceeds the configured ceiling; a single
    /// plugin whose journal alone exceeds it is still returned as one
    /// block. A non-positive ceiling disables splitting. When a buffer
    /// fails to parse, every pending journal that contributed to it is
    /// truncated to empty and the parse error is surfaced.
    pub async fn read_deltas(&mut self, entity_key: &str) -> AgentResult<Vec<Vec<RawDelta>>> {
        let mut buffers: Vec<(Vec<u8>, Vec<PathBuf>)> = Vec::new();
        let mut current: (Vec<u8>, Vec<PathBuf>) = (Vec::new(), Vec::new());

        for category in sorted_dir_names(self.layout.cache_dir()).await? {
            let entity_dir = self.layout.cache_entity_dir(&category, entity_key);
            for stem in sorted_file_stems(&entity_dir, ".pending").await? {
                let path = self.layout.pending_file(&category, entity_key, &stem);
                let raw = journal::read_raw(&path).await?;
                if raw.is_empty() {
                    continue;
                }

                let over = self.max_inventory_size > 0
                    && !current.0.is_empty()
                    && current.0.len() + raw.len() > self.max_inventory_size as usize;
                if over {
                    buffers.push(std::mem::take(&mut current));
                }
                current.0.extend_from_slice(&raw);
                current.1.push(path);
            }
        }
        if !current.0.is_empty() {
            buffers.push(current);
        }

        let mut blocks = Vec::with_capacity(buffers.len());
        for (raw, contributors) in buffers {
            match journal::parse_raw(&raw) {
                Ok(records) => blocks.push(records),
                Err(e) => {
                    warn!(error = %e, "Pending journal batch failed to parse, truncating contributors");
                    for path in &contributors {
                        journal::truncate(path).await?;
                    }
                    return Err(AgentError::CorruptData {
                        plugin_source: contributors
                            .iter()
                            .map(|p| p.display().to_string())
                            .collect::<Vec<_>>()
                            .join(", "),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(blocks)
    }

    /// Apply the backend's reconciliation hints to a sent batch, then
    /// archive everything the backend has acknowledged.
    ///
    /// Hints are applied in ascending delta id order so the final
    /// `lastSentID` does not depend on map iteration order. Archive
    /// failures are logged and left for the next cycle.
    pub async fn update_state(
        &mut self,
        entity_key: &str,
        deltas: &[RawDelta],
        hints: Option<&DeltaStateMap>,
    ) -> AgentResult<()> {
        let mut ordered: Vec<&RawDelta> = deltas.iter().collect();
        ordered.sort_by_key(|d| d.id);

        // A hint describes the backend's view after the whole batch, so it
        // pairs with the highest delta id of its source; pairing it with
        // the earlier ids would read as spurious id gaps.
        let mut max_id: HashMap<&str, i64> = HashMap::new();
        for delta in &ordered {
            let entry = max_id.entry(delta.source.as_str()).or_insert(delta.id);
            *entry = (*entry).max(delta.id);
        }

        let mut touched: Vec<PluginSource> = Vec::new();
        for delta in ordered {
            let Some(source) = PluginSource::parse(&delta.source) else {
                warn!(source = %delta.source, "Malformed plugin source in sent batch");
                continue;
            };
            let hint = hints.and_then(|m| m.get(&delta.source));
            if hint.is_some() && max_id[delta.source.as_str()] != delta.id {
                continue;
            }
            let Some(info) = self.registry.get_mut(&source) else {
                debug!(source = %delta.source, "Hint for unknown plugin source, skipping");
                continue;
            };

            let outcome = reconcile::apply_hint(info, entity_key, delta.id, hint);
            if outcome == HintOutcome::ClearFiles {
                self.clear_plugin_files(entity_key, &source).await?;
            }
            if !touched.contains(&source) {
                touched.push(source);
            }
        }

        for source in touched {
            let Some(info) = self.registry.get(&source) else { continue };
            let last_sent = info.last_sent_id(entity_key);
            let pending = self.layout.pending_file(&source.category, entity_key, &source.stem);
            let sent = self.layout.sent_file(&source.category, entity_key, &source.stem);
            if let Err(e) = journal::archive(&pending, &sent, last_sent).await {
                warn!(source = %source, error = %e,
                    "Failed to archive acknowledged deltas, will retry next cycle");
            }
        }

        Ok(())
    }

    /// Remove cache, pending, and archive files for every known plugin.
    /// Registry entries are kept; the next inventory update journals full
    /// snapshots with continuing ids.
    pub async fn reset_all_deltas(&mut self, entity_key: &str) {
        for source in self.registry.sources() {
            if let Err(e) = self.clear_plugin_files(entity_key, &source).await {
                warn!(source = %source, error = %e, "Failed to reset plugin delta state");
            }
        }
    }

    /// Bound on-disk journal storage.
    ///
    /// When the cache directory holds more than `threshold` bytes, every
    /// plugin that has disappeared from the data directory loses all its
    /// cache state and its registry entry, and still-active plugins lose
    /// their `.sent` archives. The trimmed registry is persisted.
    pub async fn compact_storage(&mut self, entity_key: &str, threshold: u64) -> AgentResult<()> {
        let size = layout::dir_size(self.layout.cache_dir()).await?;
        if size <= threshold {
            return Ok(());
        }
        info!(size, threshold, "Cache directory over threshold, compacting");

        for source in self.registry.sources() {
            let source_path = self.layout.source_file(&source.category, entity_key, &source.stem);
            if source_path.exists() {
                let sent = self.layout.sent_file(&source.category, entity_key, &source.stem);
                layout::remove_file_if_exists(&sent).await?;
            } else {
                let entity_dir = self.layout.cache_entity_dir(&source.category, entity_key);
                layout::remove_dir_if_exists(&entity_dir).await?;
                // Drop the plugin's cache dir too once its last entity is gone.
                let _ = fs::remove_dir(self.layout.cache_dir().join(&source.category)).await;
                self.registry.remove(&source);
                debug!(source = %source, "Compacted away vanished plugin");
            }
        }

        self.registry.save(&self.layout.plugin_id_map_file()).await
    }

    /// Remove an entity's subtree from both the data and cache trees across
    /// every plugin. Failures are aggregated so one bad plugin does not
    /// shadow the rest.
    pub async fn remove_entity(&mut self, entity_key: &str) -> AgentResult<()> {
        let folder = self.layout.entity_folder(entity_key);
        let mut failures: Vec<String> = Vec::new();

        for root in [self.layout.data_dir(), self.layout.cache_dir()] {
            for category in sorted_dir_names(root).await? {
                // The submission state dirs keep per-entity files, not
                // folders, so removal has to handle both shapes.
                let path = root.join(&category).join(&folder);
                if let Err(e) = layout::remove_path_if_exists(&path).await {
                    failures.push(format!("{}: {e}", path.display()));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AgentError::Storage(failures.join("; ")))
        }
    }

    /// The union of entity folder names observed under any plugin directory
    /// in either tree.
    pub async fn scan_entity_folders(&mut self) -> AgentResult<HashSet<String>> {
        let mut folders = HashSet::new();
        for root in [self.layout.data_dir(), self.layout.cache_dir()] {
            for category in sorted_dir_names(root).await? {
                for folder in sorted_dir_names(&root.join(&category)).await? {
                    folders.insert(folder);
                }
            }
        }
        Ok(folders)
    }

    /// Persist the id registry, provided the cache directory still exists.
    pub async fn save_state(&mut self) -> AgentResult<()> {
        if !self.layout.cache_dir().exists() {
            return Ok(());
        }
        self.registry.save(&self.layout.plugin_id_map_file()).await
    }

    /// Remove the cached snapshot and both journals for one plugin/entity
    /// pair.
    async fn clear_plugin_files(&self, entity_key: &str, source: &PluginSource) -> AgentResult<()> {
        for path in [
            self.layout.cache_file(&source.category, entity_key, &source.stem),
            self.layout.pending_file(&source.category, entity_key, &source.stem),
            self.layout.sent_file(&source.category, entity_key, &source.stem),
        ] {
            layout::remove_file_if_exists(&path).await?;
        }
        Ok(())
    }

    /// Remove every trace of a plugin for an entity, source snapshot
    /// included. Recovery path for malformed plugin JSON.
    async fn purge_plugin(&mut self, entity_key: &str, source: &PluginSource) -> AgentResult<()> {
        self.clear_plugin_files(entity_key, source).await?;
        let source_path = self.layout.source_file(&source.category, entity_key, &source.stem);
        layout::remove_file_if_exists(&source_path).await
    }
}

/// Names of subdirectories of `root`, sorted, reserved names excluded.
/// A missing root reads as empty.
async fn sorted_dir_names(root: &Path) -> AgentResult<Vec<String>> {
    let mut entries = match fs::read_dir(root).await {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(AgentError::Storage(format!(
                "Failed to read {}: {e}",
                root.display()
            )))
        }
    };

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AgentError::Storage(format!("Failed to read {}: {e}", root.display())))?
    {
        let Ok(file_type) = entry.file_type().await else { continue };
        if !file_type.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if !layout::is_reserved(name) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Stems of files in `dir` carrying `suffix`, sorted. A missing dir reads
/// as empty.
async fn sorted_file_stems(dir: &Path, suffix: &str) -> AgentResult<Vec<String>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(AgentError::Storage(format!(
                "Failed to read {}: {e}",
                dir.display()
            )))
        }
    };

    let mut stems = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AgentError::Storage(format!("Failed to read {}: {e}", dir.display())))?
    {
        let Ok(file_type) = entry.file_type().await else { continue };
        if !file_type.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if let Some(stem) = name.strip_suffix(suffix) {
                stems.push(stem.to_string());
            }
        }
    }
    stems.sort();
    Ok(stems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const DEFAULT_ENTITY: &str = "local-host";

    async fn open_store(dir: &TempDir, max_size: i64) -> DeltaStore {
        DeltaStore::open(dir.path(), DEFAULT_ENTITY, max_size)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn oversized_snapshot_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir, 16).await;

        let obj = json!({"k": "a string well beyond sixteen bytes"});
        match store.save_plugin_source("", "metadata", "plugin", &obj).await {
            Err(AgentError::PayloadTooLarge { plugin_source, .. }) => {
                assert_eq!(plugin_source, "metadata/plugin");
            }
            other => panic!("expected PayloadTooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn saved_source_is_scrubbed_of_nulls() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir, 0).await;

        let obj = json!({"a": 1, "b": null, "c": {"d": null, "e": 2}});
        store.save_plugin_source("", "metadata", "plugin", &obj).await.unwrap();

        let path = store.layout().source_file("metadata", "", "plugin");
        let written: JsonValue =
            serde_json::from_slice(&fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(written, json!({"a": 1, "c": {"e": 2}}));
    }

    #[tokio::test]
    async fn unchanged_snapshot_journals_nothing() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir, 0).await;

        let obj = json!({"hostname": {"alias": "aaa"}});
        store.save_plugin_source("", "metadata", "plugin", &obj).await.unwrap();
        store.update_plugins_inventory_cache("").await.unwrap();
        let id_map_before = fs::read(store.layout().plugin_id_map_file()).await.unwrap();

        // Same snapshot again: no new record, no id bump, id map untouched.
        store.save_plugin_source("", "metadata", "plugin", &obj).await.unwrap();
        store.update_plugins_inventory_cache("").await.unwrap();

        let records =
            journal::read_records(&store.layout().pending_file("metadata", "", "plugin"))
                .await
                .unwrap();
        assert_eq!(records.len(), 1);
        let source = PluginSource::new("metadata", "plugin");
        assert_eq!(store.registry().get(&source).unwrap().delta_id(""), 1);
        let id_map_after = fs::read(store.layout().plugin_id_map_file()).await.unwrap();
        assert_eq!(id_map_before, id_map_after);
    }

    #[tokio::test]
    async fn malformed_snapshot_purges_the_plugin_and_continues() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir, 0).await;

        store
            .save_plugin_source("", "metadata", "good", &json!({"a": 1}))
            .await
            .unwrap();
        let bad_path = store.layout().source_file("metadata", "", "bad");
        layout::ensure_dir(bad_path.parent().unwrap()).await.unwrap();
        fs::write(&bad_path, b"{\"unterminated\": ").await.unwrap();

        store.update_plugins_inventory_cache("").await.unwrap();

        assert!(!bad_path.exists());
        assert!(store.layout().cache_file("metadata", "", "good").exists());
        let records =
            journal::read_records(&store.layout().pending_file("metadata", "", "good"))
                .await
                .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn entities_get_independent_id_sequences() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir, 0).await;

        let obj = json!({"a": 1});
        store.save_plugin_source("e1", "metadata", "plugin", &obj).await.unwrap();
        store.save_plugin_source("e2", "metadata", "plugin", &obj).await.unwrap();
        store.update_plugins_inventory_cache("e1").await.unwrap();
        store.update_plugins_inventory_cache("e2").await.unwrap();

        let source = PluginSource::new("metadata", "plugin");
        let info = store.registry().get(&source).unwrap();
        assert_eq!(info.delta_id("e1"), 1);
        assert_eq!(info.delta_id("e2"), 1);
    }

    #[tokio::test]
    async fn read_deltas_without_ceiling_returns_one_block() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir, 0).await;

        for term in ["one", "two", "three"] {
            store
                .save_plugin_source("", "metadata", term, &json!({"v": term}))
                .await
                .unwrap();
        }
        store.update_plugins_inventory_cache("").await.unwrap();

        let blocks = store.read_deltas("").await.unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].len(), 3);
    }

    #[tokio::test]
    async fn corrupt_pending_is_truncated_and_recovers() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir, 0).await;

        store
            .save_plugin_source("e", "metadata", "good", &json!({"a": 1}))
            .await
            .unwrap();
        store.update_plugins_inventory_cache("e").await.unwrap();
        let bad = store.layout().pending_file("metadata", "e", "bad");
        layout::ensure_dir(bad.parent().unwrap()).await.unwrap();
        fs::write(&bad, b"{\"source\":\"metadata/bad\",\"id\":").await.unwrap();

        match store.read_deltas("e").await {
            Err(AgentError::CorruptData { .. }) => {}
            other => panic!("expected CorruptData, got {other:?}"),
        }

        let good = store.layout().pending_file("metadata", "e", "good");
        assert!(journal::read_raw(&good).await.unwrap().is_empty());
        assert!(journal::read_raw(&bad).await.unwrap().is_empty());
        assert!(store.read_deltas("e").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scan_sees_entities_in_both_trees() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir, 0).await;

        store
            .save_plugin_source("e1", "metadata", "plugin", &json!({"a": 1}))
            .await
            .unwrap();
        store
            .save_plugin_source("e2", "metadata", "plugin", &json!({"a": 1}))
            .await
            .unwrap();
        store.update_plugins_inventory_cache("e1").await.unwrap();

        let folders = store.scan_entity_folders().await.unwrap();
        assert!(folders.contains("e1"));
        assert!(folders.contains("e2"));
        assert!(!folders.iter().any(|f| layout::is_reserved(f)));
    }

    #[tokio::test]
    async fn remove_entity_clears_both_trees() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir, 0).await;

        store
            .save_plugin_source("e1", "metadata", "plugin", &json!({"a": 1}))
            .await
            .unwrap();
        store.update_plugins_inventory_cache("e1").await.unwrap();
        store.remove_entity("e1").await.unwrap();

        assert!(!store.layout().source_dir("metadata", "e1").exists());
        assert!(!store.layout().cache_entity_dir("metadata", "e1").exists());
    }
}
