//! Error types for the giveaway engine
//!
//! Only configuration and sizing errors are fatal to an execution attempt.
//! A single participant failing a filter is an exclusion, never an error.

use giveaway_common::events::DrawStatus;
use thiserror::Error;

/// Main error type for the giveaway engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed filter values, rejected before any evaluation runs
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Pre-scan over the tier ceiling, or no valid pre-scan for the source
    #[error("Capacity exceeded: {total} candidates, tier limit {limit}; upgrade required")]
    Capacity { total: u64, limit: u64 },

    /// Requested winner count exceeds the qualified pool
    #[error("Cannot draw {requested} winners from {available} qualified participants")]
    Sizing { requested: usize, available: usize },

    /// Lifecycle transition not permitted
    #[error("Invalid draw transition: {from} -> {to}")]
    InvalidTransition { from: DrawStatus, to: DrawStatus },

    /// Winner selection did not finish within the supervising timeout
    #[error("Execution timed out after {0} ms")]
    ExecutionTimeout(u64),

    /// A concurrent execution of the same draw failed; carries its reason
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Preview or pre-scan aborted by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Caller exceeded the execution attempt quota
    #[error("Rate limited: too many execution attempts for {0}")]
    RateLimited(String),

    /// Follow-verification collaborator failed (resolved to "unknown" by the engine)
    #[error("Verification unavailable: {0}")]
    Verification(String),

    /// Internal error (worker panicked, ledger inconsistency)
    #[error("Internal error: {0}")]
    Internal(String),

    /// giveaway-common error
    #[error("Common error: {0}")]
    Common(#[from] giveaway_common::Error),
}

/// Convenience Result type using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;
