/// Disk-backed submission state.
///
/// Three small scalar caches gate the inventory submission cycle: the time
/// of the last successful submission, an MD5 fingerprint of the license the
/// agent last submitted under, and the entity id the backend last assigned.
/// Each is a single file under the data directory with an in-memory fast
/// path; disk is consulted only while the memory slot is empty.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};
use md5::{Digest, Md5};
use regex::Regex;
use tokio::fs;

use crate::delta::layout;
use crate::error::{AgentError, AgentResult};

/// Directory under the data dir holding last-success timestamps.
pub const LAST_SUCCESS_DIR: &str = "last_success";

/// Directory under the data dir holding license fingerprints.
pub const LAST_LICENSE_DIR: &str = "last_license_hash";

/// Directory under the data dir holding backend entity ids.
pub const LAST_ENTITY_ID_DIR: &str = "last_entity_id";

fn license_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| Regex::new("^[a-fA-F0-9]{32}$").expect("static pattern"))
}

/// Read a scalar file. Missing files read as `None`.
async fn read_scalar(path: &Path) -> AgentResult<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AgentError::Storage(format!(
            "Failed to read {}: {e}",
            path.display()
        ))),
    }
}

/// Time of the last successful inventory submission for one entity.
#[derive(Debug)]
pub struct LastSubmissionTime {
    path: PathBuf,
    cached: Option<DateTime<Utc>>,
}

impl LastSubmissionTime {
    /// Store for `entity_fs_name` under `data_dir`.
    pub fn new(data_dir: &Path, entity_fs_name: &str) -> Self {
        Self {
            path: data_dir.join(LAST_SUCCESS_DIR).join(entity_fs_name),
            cached: None,
        }
    }

    /// The recorded time.
    ///
    /// Returns `Ok(None)` when nothing was ever recorded; empty file
    /// content is the typed [`AgentError::NoPreviousSubmission`] sentinel.
    pub async fn time(&mut self) -> AgentResult<Option<DateTime<Utc>>> {
        if let Some(t) = self.cached {
            return Ok(Some(t));
        }
        let Some(content) = read_scalar(&self.path).await? else {
            return Ok(None);
        };
        if content.is_empty() {
            return Err(AgentError::NoPreviousSubmission);
        }
        let parsed = DateTime::parse_from_rfc3339(content.trim())
            .map_err(|e| AgentError::Storage(format!("Invalid submission time '{content}': {e}")))?
            .with_timezone(&Utc);
        self.cached = Some(parsed);
        Ok(Some(parsed))
    }

    /// Record a successful submission time on disk and in memory.
    pub async fn record(&mut self, time: DateTime<Utc>) -> AgentResult<()> {
        let text = time.to_rfc3339_opts(SecondsFormat::Secs, true);
        layout::write_file_atomic(&self.path, text.as_bytes()).await?;
        self.cached = Some(time);
        Ok(())
    }
}

/// MD5 fingerprint of the license the agent last submitted under.
///
/// A changed fingerprint means the agent is talking to the backend as a
/// different account and must resend full inventory.
#[derive(Debug)]
pub struct LicenseFingerprint {
    path: PathBuf,
    cached: Option<String>,
}

impl LicenseFingerprint {
    /// Store for `entity_fs_name` under `data_dir`.
    pub fn new(data_dir: &Path, entity_fs_name: &str) -> Self {
        Self {
            path: data_dir.join(LAST_LICENSE_DIR).join(entity_fs_name),
            cached: None,
        }
    }

    /// The stored fingerprint, validated as 32 hex chars.
    pub async fn load(&mut self) -> AgentResult<Option<String>> {
        if let Some(f) = &self.cached {
            return Ok(Some(f.clone()));
        }
        let Some(content) = read_scalar(&self.path).await? else {
            return Ok(None);
        };
        if !license_shape().is_match(content.trim()) {
            return Err(AgentError::InvalidLicenseFingerprint { content });
        }
        let fingerprint = content.trim().to_string();
        self.cached = Some(fingerprint.clone());
        Ok(Some(fingerprint))
    }

    /// Whether `license` differs from the one last recorded.
    ///
    /// The first call ever seeds the store with the current license and
    /// reports no change.
    pub async fn has_changed(&mut self, license: &str) -> AgentResult<bool> {
        let current = fingerprint_of(license);
        match self.load().await? {
            Some(stored) => Ok(stored != current),
            None => {
                self.store(&current).await?;
                Ok(false)
            }
        }
    }

    /// Persist a fingerprint on disk and in memory.
    pub async fn store(&mut self, fingerprint: &str) -> AgentResult<()> {
        layout::write_file_atomic(&self.path, fingerprint.as_bytes()).await?;
        self.cached = Some(fingerprint.to_string());
        Ok(())
    }
}

/// Lowercase MD5 hex of a license string.
pub fn fingerprint_of(license: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(license.as_bytes());
    hex::encode(hasher.finalize())
}

/// The entity id the backend last assigned to this host.
#[derive(Debug)]
pub struct LastEntityId {
    path: PathBuf,
    cached: Option<i64>,
}

impl LastEntityId {
    /// Store for `entity_fs_name` under `data_dir`.
    pub fn new(data_dir: &Path, entity_fs_name: &str) -> Self {
        Self {
            path: data_dir.join(LAST_ENTITY_ID_DIR).join(entity_fs_name),
            cached: None,
        }
    }

    /// The stored id, parsed as decimal i64.
    pub async fn load(&mut self) -> AgentResult<Option<i64>> {
        if let Some(id) = self.cached {
            return Ok(Some(id));
        }
        let Some(content) = read_scalar(&self.path).await? else {
            return Ok(None);
        };
        let id = content
            .trim()
            .parse::<i64>()
            .map_err(|_| AgentError::InvalidEntityId { content })?;
        self.cached = Some(id);
        Ok(Some(id))
    }

    /// Persist an id on disk and in memory.
    pub async fn store(&mut self, id: i64) -> AgentResult<()> {
        layout::write_file_atomic(&self.path, id.to_string().as_bytes()).await?;
        self.cached = Some(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn submission_time_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut store = LastSubmissionTime::new(dir.path(), "host");

        assert!(store.time().await.unwrap().is_none());

        let now = Utc::now();
        store.record(now).await.unwrap();
        let read = store.time().await.unwrap().unwrap();
        assert_eq!(read.timestamp(), now.timestamp());

        // A fresh instance must read the same value back from disk.
        let mut fresh = LastSubmissionTime::new(dir.path(), "host");
        let read = fresh.time().await.unwrap().unwrap();
        assert_eq!(read.timestamp(), now.timestamp());
    }

    #[tokio::test]
    async fn empty_submission_time_is_the_sentinel() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LAST_SUCCESS_DIR);
        fs::create_dir_all(&path).await.unwrap();
        fs::write(path.join("host"), b"").await.unwrap();

        let mut store = LastSubmissionTime::new(dir.path(), "host");
        assert!(matches!(
            store.time().await,
            Err(AgentError::NoPreviousSubmission)
        ));
    }

    #[tokio::test]
    async fn license_change_detection() {
        let dir = TempDir::new().unwrap();
        let mut store = LicenseFingerprint::new(dir.path(), "host");

        assert!(!store.has_changed("abc").await.unwrap());
        assert!(!store.has_changed("abc").await.unwrap());

        let mut fresh = LicenseFingerprint::new(dir.path(), "host");
        assert!(fresh.has_changed("xyz").await.unwrap());
    }

    #[tokio::test]
    async fn malformed_fingerprint_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LAST_LICENSE_DIR);
        fs::create_dir_all(&path).await.unwrap();
        fs::write(path.join("host"), b"not-a-digest").await.unwrap();

        let mut store = LicenseFingerprint::new(dir.path(), "host");
        match store.load().await {
            Err(AgentError::InvalidLicenseFingerprint { content }) => {
                assert_eq!(content, "not-a-digest");
            }
            other => panic!("expected InvalidLicenseFingerprint, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn entity_id_round_trips_and_validates() {
        let dir = TempDir::new().unwrap();
        let mut store = LastEntityId::new(dir.path(), "host");

        assert!(store.load().await.unwrap().is_none());
        store.store(424242).await.unwrap();

        let mut fresh = LastEntityId::new(dir.path(), "host");
        assert_eq!(fresh.load().await.unwrap(), Some(424242));

        fs::write(dir.path().join(LAST_ENTITY_ID_DIR).join("host"), b"4x2")
            .await
            .unwrap();
        let mut bad = LastEntityId::new(dir.path(), "host");
        assert!(matches!(
            bad.load().await,
            Err(AgentError::InvalidEntityId { .. })
        ));
    }

    #[test]
    fn fingerprint_is_lowercase_md5_hex() {
        // Well-known digest of "abc".
        assert_eq!(fingerprint_of("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }
}
