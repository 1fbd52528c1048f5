/// Submission gating and delivery.
///
/// Pairs the delta store with the backend: [`sender::InventorySender`]
/// runs the submission cycle, [`state`] holds the small disk-backed
/// scalars that gate it.
pub mod sender;
pub mod state;

pub use sender::{DeltaResponse, InventoryBackend, InventorySender, PostDeltaBody, SendBackoff};
pub use state::{LastEntityId, LastSubmissionTime, LicenseFingerprint};
