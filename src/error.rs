/// Error types for agent operations.
///
/// This module provides the error hierarchy covering every failure mode in
/// the agent. All errors are well-typed and can be pattern-matched for
/// precise handling by the agent loop.
use thiserror::Error;

/// The main error type for agent operations.
///
/// All fallible operations in the agent return `Result<T, AgentError>`.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Serialization error when converting data to/from JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// A journal or cached file contained malformed content
    #[error("Corrupt inventory data for '{plugin_source}': {reason}")]
    CorruptData {
        /// The plugin source whose files were malformed
        plugin_source: String,
        /// Description of the corruption
        reason: String,
    },

    /// A plugin snapshot exceeded the configured inventory payload ceiling
    #[error("Inventory payload for '{plugin_source}' is {size} bytes, limit is {limit}")]
    PayloadTooLarge {
        /// The plugin source that produced the oversized snapshot
        plugin_source: String,
        /// Marshalled size in bytes
        size: usize,
        /// The configured ceiling
        limit: usize,
    },

    /// The stored license fingerprint is not a 32-char hex digest
    #[error("Invalid license fingerprint on disk: '{content}'")]
    InvalidLicenseFingerprint {
        /// The offending file content, preserved verbatim for logging
        content: String,
    },

    /// The stored entity id is not a decimal 64-bit integer
    #[error("Invalid entity id on disk: '{content}'")]
    InvalidEntityId {
        /// The offending file content, preserved verbatim for logging
        content: String,
    },

    /// No successful submission has been recorded yet
    #[error("No previous successful submission time recorded")]
    NoPreviousSubmission,

    /// The store was constructed without a default entity key
    #[error("Default entity key must not be empty")]
    EmptyDefaultEntityKey,

    /// A sampler panicked or failed while collecting
    #[error("Sampler '{name}' failed: {reason}")]
    SamplerFailed {
        /// The sampler's registered name
        name: String,
        /// Panic payload or error description
        reason: String,
    },

    /// The backend rejected the submission with a rate limit
    #[error("Backend rate limited the submission")]
    RateLimited,

    /// The backend rejected the submission
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;
