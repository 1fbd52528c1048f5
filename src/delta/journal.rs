/// Append-only delta journals.
///
/// Each plugin source keeps two journals per entity next to its cached
/// snapshot: `.pending` holds deltas the backend has not acknowledged,
/// `.sent` archives acknowledged ones. Records are stored as JSON values
/// separated by a comma terminator with no surrounding brackets, which
/// makes appends O(1) and concatenation trivial: a reader wraps the
/// accumulated bytes in `[` `]` after stripping the trailing comma and
/// parses the result as an array.
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::delta::layout;
use crate::error::{AgentError, AgentResult};

/// One journalled inventory delta.
///
/// `diff` is an RFC 7396 merge patch from the previously cached snapshot to
/// the current one, except when `full_diff` is set: then it carries the
/// whole snapshot (first sighting of the plugin, or after a reset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDelta {
    /// Rendered plugin source, `"<plugin>/<stem>"`
    pub source: String,
    /// Per-entity monotonic id
    pub id: i64,
    /// Unix seconds at journalling time
    pub timestamp: i64,
    /// Merge patch, or the whole snapshot when `full_diff`
    pub diff: JsonValue,
    /// True when `diff` is the complete snapshot
    pub full_diff: bool,
}

/// Append one record to a journal file, creating it (and parent
/// directories) on first use.
pub async fn append_record(path: &Path, record: &RawDelta) -> AgentResult<()> {
    if let Some(parent) = path.parent() {
        layout::ensure_dir(parent).await?;
    }

    // Marshal as a one-element array, then strip the brackets so the
    // on-disk form stays concatenation-friendly.
    let array = serde_json::to_vec(&[record])?;
    let body = &array[1..array.len() - 1];

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| AgentError::Storage(format!("Failed to open {}: {e}", path.display())))?;
    file.write_all(body)
        .await
        .map_err(|e| AgentError::Storage(format!("Failed to write {}: {e}", path.display())))?;
    file.write_all(b",")
        .await
        .map_err(|e| AgentError::Storage(format!("Failed to write {}: {e}", path.display())))?;
    file.sync_data()
        .await
        .map_err(|e| AgentError::Storage(format!("Failed to sync {}: {e}", path.display())))?;
    Ok(())
}

/// Read a journal's raw bytes. A missing file reads as empty.
pub async fn read_raw(path: &Path) -> AgentResult<Vec<u8>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(AgentError::Storage(format!(
            "Failed to read {}: {e}",
            path.display()
        ))),
    }
}

/// Wrap raw journal bytes into a parseable JSON array document.
pub fn wrap_raw(raw: &[u8]) -> Vec<u8> {
    let trimmed: &[u8] = {
        let mut end = raw.len();
        while end > 0 && (raw[end - 1] == b',' || raw[end - 1].is_ascii_whitespace()) {
            end -= 1;
        }
        &raw[..end]
    };
    let mut doc = Vec::with_capacity(trimmed.len() + 2);
    doc.push(b'[');
    doc.extend_from_slice(trimmed);
    doc.push(b']');
    doc
}

/// Parse raw journal bytes into records.
pub fn parse_raw(raw: &[u8]) -> serde_json::Result<Vec<RawDelta>> {
    serde_json::from_slice(&wrap_raw(raw))
}

/// Read and parse a whole journal. A missing file yields no records.
pub async fn read_records(path: &Path) -> AgentResult<Vec<RawDelta>> {
    let raw = read_raw(path).await?;
    parse_raw(&raw).map_err(|e| AgentError::CorruptData {
        plugin_source: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Truncate a journal to empty contents. Creates the file if absent; this
/// is the recovery path for corrupt journals.
pub async fn truncate(path: &Path) -> AgentResult<()> {
    layout::write_file_atomic(path, b"").await
}

/// Rewrite a journal wholesale from a record list. The replacement lands
/// via temp file + rename so a crash never leaves a half-written journal.
pub async fn rewrite(path: &Path, records: &[RawDelta]) -> AgentResult<()> {
    let mut body = Vec::new();
    for record in records {
        let array = serde_json::to_vec(&[record])?;
        body.extend_from_slice(&array[1..array.len() - 1]);
        body.push(b',');
    }
    layout::write_file_atomic(path, &body).await
}

/// Move acknowledged records from the pending journal into the archive.
///
/// Records with `id <= last_sent_id` are appended to `sent_path`; the rest
/// are rewritten back to `pending_path`.
pub async fn archive(pending_path: &Path, sent_path: &Path, last_sent_id: i64) -> AgentResult<()> {
    let records = read_records(pending_path).await?;
    if records.is_empty() {
        return Ok(());
    }

    let (acknowledged, outstanding): (Vec<_>, Vec<_>) =
        records.into_iter().partition(|r| r.id <= last_sent_id);

    for record in &acknowledged {
        append_record(sent_path, record).await?;
    }
    rewrite(pending_path, &outstanding).await
}
