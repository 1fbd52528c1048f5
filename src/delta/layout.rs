/// Filesystem layout for the inventory delta store.
///
/// This module owns the deterministic mapping from `(plugin, entity, role)`
/// to file paths under the agent's data directory. The layout is:
///
/// ```text
/// <dataDir>/
/// ├── <plugin>/<entityFolder>/<file>.json   # snapshot source (samplers write)
/// ├── .delta_repo/                          # cache dir (store-owned)
/// │   ├── delta_id_cache.json               # persisted plugin id map
/// │   └── <plugin>/<entityFolder>/
/// │       ├── <file>.json                   # last journalled snapshot
/// │       ├── <file>.pending                # unacknowledged delta journal
/// │       └── <file>.sent                   # acknowledged delta archive
/// ├── .sampling_repo/                       # scratch; reserved
/// ├── last_success/<entityFsName>
/// ├── last_license_hash/<entityFsName>
/// └── last_entity_id/<entityFsName>
/// ```
///
/// The cache directory is exclusively owned by the store; the data directory
/// is a shared write surface where samplers deposit snapshots.
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{AgentError, AgentResult};

/// Cache directory name under the data dir. Store-owned.
pub const CACHE_DIR_NAME: &str = ".delta_repo";

/// Scratch directory name under the data dir. Reserved.
pub const SAMPLING_DIR_NAME: &str = ".sampling_repo";

/// File name of the persisted plugin id map inside the cache dir.
pub const PLUGIN_ID_MAP_FILE: &str = "delta_id_cache.json";

/// Folder name reserved for the local (default) entity.
pub const LOCAL_ENTITY_DIR: &str = "__nria_localentity";

/// Mode applied to every directory the store creates.
#[cfg(unix)]
const DIR_MODE: u32 = 0o755;

/// Mode applied to every data file the store writes.
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

/// Returns true for directory names that must never be treated as a plugin
/// or entity during scans.
pub fn is_reserved(name: &str) -> bool {
    name == CACHE_DIR_NAME || name == SAMPLING_DIR_NAME
}

/// Deterministic, total rendering of an entity key to a file-system-safe
/// folder name. ASCII alphanumerics, `.`, `_` and `-` pass through; every
/// other character becomes `_`.
pub fn fs_safe_name(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Path mapping for a delta store instance.
///
/// Rooted at a data directory, with the cache and scratch directories
/// nested inside it.
#[derive(Debug, Clone)]
pub struct Layout {
    data_dir: PathBuf,
    cache_dir: PathBuf,
    sampling_dir: PathBuf,
    default_entity_key: String,
}

impl Layout {
    /// Create a layout rooted at `data_dir`.
    ///
    /// Fails if `default_entity_key` is empty; the default key is what maps
    /// the empty entity string onto the local-entity folder.
    pub fn new(data_dir: impl Into<PathBuf>, default_entity_key: &str) -> AgentResult<Self> {
        if default_entity_key.is_empty() {
            return Err(AgentError::EmptyDefaultEntityKey);
        }
        let data_dir = data_dir.into();
        Ok(Self {
            cache_dir: data_dir.join(CACHE_DIR_NAME),
            sampling_dir: data_dir.join(SAMPLING_DIR_NAME),
            data_dir,
            default_entity_key: default_entity_key.to_string(),
        })
    }

    /// The shared data directory samplers write snapshots into.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The store-owned cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// The reserved scratch directory.
    pub fn sampling_dir(&self) -> &Path {
        &self.sampling_dir
    }

    /// Location of the persisted plugin id map.
    pub fn plugin_id_map_file(&self) -> PathBuf {
        self.cache_dir.join(PLUGIN_ID_MAP_FILE)
    }

    /// Folder name for an entity key. The empty string and the configured
    /// default key both resolve to the reserved local-entity folder.
    pub fn entity_folder(&self, entity_key: &str) -> String {
        if entity_key.is_empty() || entity_key == self.default_entity_key {
            LOCAL_ENTITY_DIR.to_string()
        } else {
            fs_safe_name(entity_key)
        }
    }

    /// Directory holding a plugin's snapshots for one entity in the data tree.
    pub fn source_dir(&self, plugin: &str, entity_key: &str) -> PathBuf {
        self.data_dir.join(plugin).join(self.entity_folder(entity_key))
    }

    /// Directory holding a plugin's cache and journals for one entity.
    pub fn cache_entity_dir(&self, plugin: &str, entity_key: &str) -> PathBuf {
        self.cache_dir.join(plugin).join(self.entity_folder(entity_key))
    }

    /// Snapshot source file written by a sampler.
    pub fn source_file(&self, plugin: &str, entity_key: &str, stem: &str) -> PathBuf {
        self.source_dir(plugin, entity_key).join(format!("{stem}.json"))
    }

    /// Cached copy of the last journalled snapshot.
    pub fn cache_file(&self, plugin: &str, entity_key: &str, stem: &str) -> PathBuf {
        self.cache_entity_dir(plugin, entity_key).join(format!("{stem}.json"))
    }

    /// Unacknowledged delta journal.
    pub fn pending_file(&self, plugin: &str, entity_key: &str, stem: &str) -> PathBuf {
        self.cache_entity_dir(plugin, entity_key).join(format!("{stem}.pending"))
    }

    /// Acknowledged delta archive.
    pub fn sent_file(&self, plugin: &str, entity_key: &str, stem: &str) -> PathBuf {
        self.cache_entity_dir(plugin, entity_key).join(format!("{stem}.sent"))
    }
}

/// Create a directory (and parents) with the store's directory mode.
pub async fn ensure_dir(path: &Path) -> AgentResult<()> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| AgentError::Storage(format!("Failed to create {}: {e}", path.display())))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(DIR_MODE))
            .await
            .map_err(|e| AgentError::Storage(format!("Failed to chmod {}: {e}", path.display())))?;
    }
    Ok(())
}

/// Write a data file atomically: parent dirs are created on demand, content
/// lands in a temp file in the same directory and is renamed over the
/// target, so a concurrent reader never observes a torn write.
///
/// The temp name keeps the target's full file name as a prefix
/// (`plugin.pending` writes through `plugin.pending.tmp`), so the cache
/// twin and the two journals of one plugin never share a temp file.
pub async fn write_file_atomic(path: &Path, content: &[u8]) -> AgentResult<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }
    let temp_path = PathBuf::from(format!("{}.tmp", path.display()));
    fs::write(&temp_path, content)
        .await
        .map_err(|e| AgentError::Storage(format!("Failed to write {}: {e}", temp_path.display())))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(FILE_MODE))
            .await
            .map_err(|e| {
                AgentError::Storage(format!("Failed to chmod {}: {e}", temp_path.display()))
            })?;
    }
    fs::rename(&temp_path, path)
        .await
        .map_err(|e| AgentError::Storage(format!("Failed to rename {}: {e}", path.display())))?;
    Ok(())
}

/// Remove a file, treating "not found" as success.
pub async fn remove_file_if_exists(path: &Path) -> AgentResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AgentError::Storage(format!(
            "Failed to remove {}: {e}",
            path.display()
        ))),
    }
}

/// Remove a directory tree, treating "not found" as success.
pub async fn remove_dir_if_exists(path: &Path) -> AgentResult<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AgentError::Storage(format!(
            "Failed to remove {}: {e}",
            path.display()
        ))),
    }
}

/// Remove whatever sits at `path`, file or directory tree. "Not found" is
/// success.
pub async fn remove_path_if_exists(path: &Path) -> AgentResult<()> {
    let meta = match fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(AgentError::Storage(format!(
                "Failed to stat {}: {e}",
                path.display()
            )))
        }
    };
    if meta.is_dir() {
        remove_dir_if_exists(path).await
    } else {
        remove_file_if_exists(path).await
    }
}

/// Total byte size of all regular files under `path`. Missing paths count
/// as zero.
pub async fn dir_size(path: &Path) -> AgentResult<u64> {
    let mut total = 0u64;
    let mut stack = vec![path.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(AgentError::Storage(format!(
                    "Failed to read {}: {e}",
                    dir.display()
                )))
            }
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AgentError::Storage(format!("Failed to read {}: {e}", dir.display())))?
        {
            let meta = entry.metadata().await.map_err(|e| {
                AgentError::Storage(format!("Failed to stat {}: {e}", entry.path().display()))
            })?;
            if meta.is_dir() {
                stack.push(entry.path());
            } else {
                total += meta.len();
            }
        }
    }

    Ok(total)
}
