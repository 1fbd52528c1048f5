/// Plugin identity registry.
///
/// Every stream of inventory snapshots is identified by a plugin source
/// (`"<plugin>/<stem>"`). The registry keeps, per source and per entity, the
/// last delta id assigned locally and the highest id the backend has
/// acknowledged. It is persisted wholesale to `delta_id_cache.json` inside
/// the cache directory and reloaded on startup; a corrupt file is deleted
/// and the store starts fresh.
use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use crate::delta::layout;
use crate::error::{AgentError, AgentResult};

/// Identity of a stream of inventory snapshots.
///
/// `category` names the plugin; `stem` is the snapshot file name without
/// its extension. Rendered as `"<category>/<stem>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PluginSource {
    /// Plugin category name (first path segment under the data dir)
    pub category: String,
    /// Snapshot file stem (file name without extension)
    pub stem: String,
}

impl PluginSource {
    /// Create a source from its two components.
    pub fn new(category: impl Into<String>, stem: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            stem: stem.into(),
        }
    }

    /// Parse the `"<plugin>/<stem>"` rendering. Returns None when the
    /// string has no separator.
    pub fn parse(source: &str) -> Option<Self> {
        let (category, stem) = source.split_once('/')?;
        Some(Self::new(category, stem))
    }
}

impl std::fmt::Display for PluginSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.category, self.stem)
    }
}

/// Per-entity id bookkeeping inside a [`PluginInfo`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityLedger {
    /// Last id assigned to a stored delta
    #[serde(rename = "mostRecentID")]
    pub most_recent_id: i64,
    /// Highest id the backend has acknowledged
    #[serde(rename = "lastSentID")]
    pub last_sent_id: i64,
}

/// Identity record for one plugin source, persisted as JSON.
///
/// Invariant per entity: `most_recent_id >= last_sent_id >= 0`. All id
/// mutations go through the accessors here; reconciliation overwrites ids
/// through the same surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Rendered source, `"<plugin>/<stem>"`
    pub source: String,
    /// Plugin category name
    pub plugin: String,
    /// Snapshot file name (stem plus `.json`)
    #[serde(rename = "fileName")]
    pub file_name: String,
    /// Per-entity id ledger; tolerated missing in persisted form
    #[serde(default)]
    pub entities: HashMap<String, EntityLedger>,
}

impl PluginInfo {
    /// Create a fresh record for a source with no entity state yet.
    pub fn new(source: &PluginSource) -> Self {
        Self {
            source: source.to_string(),
            plugin: source.category.clone(),
            file_name: format!("{}.json", source.stem),
            entities: HashMap::new(),
        }
    }

    /// The source's file stem (file name without extension).
    pub fn stem(&self) -> &str {
        self.file_name.strip_suffix(".json").unwrap_or(&self.file_name)
    }

    /// Assign the next delta id for an entity. An absent entity starts
    /// at 1.
    pub fn next_delta_id(&mut self, entity_key: &str) -> i64 {
        let ledger = self.entities.entry(entity_key.to_string()).or_default();
        ledger.most_recent_id += 1;
        ledger.most_recent_id
    }

    /// Last id assigned to a stored delta; 0 when the entity is unknown.
    pub fn delta_id(&self, entity_key: &str) -> i64 {
        self.entities
            .get(entity_key)
            .map(|l| l.most_recent_id)
            .unwrap_or(0)
    }

    /// Highest backend-acknowledged id; 0 when the entity is unknown.
    pub fn last_sent_id(&self, entity_key: &str) -> i64 {
        self.entities
            .get(entity_key)
            .map(|l| l.last_sent_id)
            .unwrap_or(0)
    }

    /// Overwrite the most recent delta id, used by reconciliation.
    pub fn set_delta_id(&mut self, entity_key: &str, id: i64) {
        self.entities.entry(entity_key.to_string()).or_default().most_recent_id = id;
    }

    /// Overwrite the acknowledged id, used by reconciliation.
    pub fn set_last_sent_id(&mut self, entity_key: &str, id: i64) {
        self.entities.entry(entity_key.to_string()).or_default().last_sent_id = id;
    }
}

/// The set of known plugin sources and their id ledgers.
///
/// Serialised as a JSON object mapping the rendered source to its
/// [`PluginInfo`].
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, PluginInfo>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a source.
    pub fn get(&self, source: &PluginSource) -> Option<&PluginInfo> {
        self.plugins.get(&source.to_string())
    }

    /// Mutable lookup.
    pub fn get_mut(&mut self, source: &PluginSource) -> Option<&mut PluginInfo> {
        self.plugins.get_mut(&source.to_string())
    }

    /// Look up or lazily create the record for a source. Records are only
    /// created the first time a non-empty delta is stored.
    pub fn get_or_create(&mut self, source: &PluginSource) -> &mut PluginInfo {
        self.plugins
            .entry(source.to_string())
            .or_insert_with(|| PluginInfo::new(source))
    }

    /// Remove a source, returning its record if known.
    pub fn remove(&mut self, source: &PluginSource) -> Option<PluginInfo> {
        self.plugins.remove(&source.to_string())
    }

    /// Iterate all known records.
    pub fn iter(&self) -> impl Iterator<Item = &PluginInfo> {
        self.plugins.values()
    }

    /// Rendered sources of all known records.
    pub fn sources(&self) -> Vec<PluginSource> {
        self.plugins
            .keys()
            .filter_map(|s| PluginSource::parse(s))
            .collect()
    }

    /// Number of known sources.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// True when no source is known.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Load the registry from the persisted id map.
    ///
    /// A missing file yields an empty registry. A present but unparseable
    /// file is deleted and an empty registry returned; failing to delete it
    /// is surfaced so the constructor can abort.
    pub async fn load(path: &Path) -> AgentResult<Self> {
        let bytes = match fs::read(path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => {
                return Err(AgentError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        match serde_json::from_slice::<HashMap<String, PluginInfo>>(&bytes) {
            Ok(plugins) => Ok(Self { plugins }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Plugin id map is corrupt, discarding it");
                fs::remove_file(path).await.map_err(|e| {
                    AgentError::Storage(format!(
                        "Failed to remove corrupt id map {}: {e}",
                        path.display()
                    ))
                })?;
                Ok(Self::new())
            }
        }
    }

    /// Persist the registry wholesale to the id map file.
    pub async fn save(&self, path: &Path) -> AgentResult<()> {
        let bytes = serde_json::to_vec(&self.plugins)?;
        layout::write_file_atomic(path, &bytes).await
    }
}
