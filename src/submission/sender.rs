/// Inventory submission.
///
/// The sender assembles the outstanding deltas for an entity into
/// size-bounded batches, posts them to the backend, and feeds the returned
/// reconciliation hints back into the delta store. Submission is gated by
/// the last-submission stores: a changed license forces a full reset before
/// anything is sent.
///
/// The wire transport is abstracted behind [`InventoryBackend`]; only the
/// request/response contract is fixed here.
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::delta::layout::Layout;
use crate::delta::{DeltaStateMap, DeltaStore, RawDelta};
use crate::error::{AgentError, AgentResult};
use crate::submission::state::{LastEntityId, LastSubmissionTime, LicenseFingerprint};

/// Outbound submission body: one block of deltas plus entity metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDeltaBody {
    /// Keys identifying the entity the deltas belong to
    #[serde(rename = "entityKeys")]
    pub entity_keys: Vec<String>,
    /// Entity id previously assigned by the backend, when known
    #[serde(rename = "entityID", skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<i64>,
    /// The delta records
    pub deltas: Vec<RawDelta>,
}

/// Backend reply to a delta submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeltaResponse {
    /// Entity id assigned by the backend
    #[serde(rename = "entityID", default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<i64>,
    /// Reconciliation hints keyed by plugin source
    #[serde(rename = "deltaStates", default, skip_serializing_if = "Option::is_none")]
    pub delta_states: Option<DeltaStateMap>,
}

/// The request/response contract of the ingest service.
///
/// Implementations translate transport failures into [`AgentError`]:
/// an HTTP 429 must surface as [`AgentError::RateLimited`].
#[async_trait]
pub trait InventoryBackend: Send + Sync {
    /// Post one block of deltas, returning the backend's reply.
    async fn post_deltas(&self, body: &PostDeltaBody) -> AgentResult<DeltaResponse>;
}

/// Exponential backoff schedule for the send timer.
///
/// Failures widen the delay as `base * 2^failures` up to `max`; a rate
/// limit jumps straight to the maximum bucket; success resets the counter.
#[derive(Debug, Clone)]
pub struct SendBackoff {
    failures: u32,
    base: Duration,
    max: Duration,
}

impl Default for SendBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(300))
    }
}

impl SendBackoff {
    /// Schedule ranging from `base` (first failure) to `max`.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            failures: 0,
            base,
            max,
        }
    }

    /// Smallest failure count whose delay reaches the maximum.
    fn max_bucket(&self) -> u32 {
        let mut bucket = 1;
        while self.base * 2u32.saturating_pow(bucket - 1) < self.max {
            bucket += 1;
        }
        bucket
    }

    /// Reset after a successful submission.
    pub fn on_success(&mut self) {
        self.failures = 0;
    }

    /// Widen the delay after an ordinary failure.
    pub fn on_error(&mut self) {
        self.failures = (self.failures + 1).min(self.max_bucket());
    }

    /// Jump to the maximum bucket after a rate limit.
    pub fn on_rate_limit(&mut self) {
        self.failures = self.max_bucket();
    }

    /// Delay before the next send attempt; zero while healthy.
    pub fn delay(&self) -> Duration {
        if self.failures == 0 {
            return Duration::ZERO;
        }
        (self.base * 2u32.saturating_pow(self.failures - 1)).min(self.max)
    }
}

/// Drives the submission cycle for one entity.
pub struct InventorySender<B> {
    entity_key: String,
    license_key: String,
    backend: B,
    backoff: SendBackoff,
    submission_time: LastSubmissionTime,
    license: LicenseFingerprint,
    entity_id: LastEntityId,
}

impl<B: InventoryBackend> InventorySender<B> {
    /// Sender for `entity_key`, persisting its gate state under the
    /// layout's data directory.
    pub fn new(layout: &Layout, entity_key: &str, license_key: &str, backend: B) -> Self {
        let fs_name = layout.entity_folder(entity_key);
        Self {
            entity_key: entity_key.to_string(),
            license_key: license_key.to_string(),
            backend,
            backoff: SendBackoff::default(),
            submission_time: LastSubmissionTime::new(layout.data_dir(), &fs_name),
            license: LicenseFingerprint::new(layout.data_dir(), &fs_name),
            entity_id: LastEntityId::new(layout.data_dir(), &fs_name),
        }
    }

    /// The current backoff schedule.
    pub fn backoff(&self) -> &SendBackoff {
        &self.backoff
    }

    /// How long until the next submission is due, given the configured
    /// cadence. Resumes the cadence across restarts from the persisted
    /// submission clock; with no (readable) previous success, a submission
    /// is due immediately.
    pub async fn next_due(&mut self, cadence: Duration) -> Duration {
        match self.submission_time.time().await {
            Ok(Some(last)) => {
                let age = Utc::now()
                    .signed_duration_since(last)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                cadence.saturating_sub(age)
            }
            Ok(None) => Duration::ZERO,
            Err(e) => {
                debug!(error = %e, "No usable previous submission time");
                Duration::ZERO
            }
        }
    }

    /// Run one submission cycle against the store.
    ///
    /// Reads the outstanding delta blocks, posts each, and applies the
    /// returned hints. A changed license resets all journalled state first
    /// so the backend receives full snapshots under the new credentials.
    pub async fn submit(&mut self, store: &mut DeltaStore) -> AgentResult<()> {
        if self.license.has_changed(&self.license_key).await? {
            warn!(entity = %self.entity_key, "License changed, resetting delta state");
            store.reset_all_deltas(&self.entity_key).await;
            let fingerprint = super::state::fingerprint_of(&self.license_key);
            self.license.store(&fingerprint).await?;
        }

        let blocks = store.read_deltas(&self.entity_key).await?;
        if blocks.is_empty() {
            debug!(entity = %self.entity_key, "No outstanding deltas");
            return Ok(());
        }

        let entity_id = self.entity_id.load().await?;
        for block in blocks {
            let body = PostDeltaBody {
                entity_keys: vec![self.entity_key.clone()],
                entity_id,
                deltas: block.clone(),
            };

            let response = match self.backend.post_deltas(&body).await {
                Ok(r) => r,
                Err(AgentError::RateLimited) => {
                    self.backoff.on_rate_limit();
                    warn!(entity = %self.entity_key, delay = ?self.backoff.delay(),
                        "Backend rate limited the submission, backing off");
                    return Err(AgentError::RateLimited);
                }
                Err(e) => {
                    self.backoff.on_error();
                    return Err(e);
                }
            };

            if let Some(id) = response.entity_id {
                if entity_id != Some(id) {
                    info!(entity = %self.entity_key, id, "Backend assigned entity id");
                    self.entity_id.store(id).await?;
                }
            }

            store
                .update_state(&self.entity_key, &block, response.delta_states.as_ref())
                .await?;
        }

        self.submission_time.record(Utc::now()).await?;
        self.backoff.on_success();
        Ok(())
    }
}
