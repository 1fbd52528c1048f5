/// The inventory delta store.
///
/// Samplers write JSON snapshots into a shared data directory; this module
/// diffs them against their last journalled state, appends the resulting
/// merge patches to per-plugin journals, and reconciles the journals with
/// the backend's acknowledgements. See [`store::DeltaStore`] for the
/// coordinator that ties the pieces together.
pub mod journal;
pub mod layout;
pub mod patch;
pub mod reconcile;
pub mod registry;
pub mod store;

pub use journal::RawDelta;
pub use reconcile::{DeltaState, DeltaStateMap};
pub use registry::{EntityLedger, PluginInfo, PluginRegistry, PluginSource};
pub use store::DeltaStore;
