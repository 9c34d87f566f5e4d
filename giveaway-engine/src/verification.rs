//! Follower verification collaborator
//!
//! In `verified` follow mode the engine asks an external service whether each
//! entrant follows each required account. Calls run in a bounded-concurrency
//! pre-pass before per-entry evaluation. A failed or timed-out call resolves
//! to [`FollowStatus::Unknown`]; it never aborts the batch.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::normalize_handle;

/// Answer from the verification collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowStatus {
    Following,
    NotFollowing,
    /// Could not be determined; treated as not following
    Unknown,
}

/// External follower-verification service
#[async_trait]
pub trait FollowerVerifier: Send + Sync {
    /// Does `handle` follow `target`? Both are normalized handles.
    async fn verify(&self, handle: &str, target: &str) -> Result<FollowStatus>;
}

/// Resolved follow relationships for one evaluation run
#[derive(Debug, Clone, Default)]
pub struct FollowLedger {
    statuses: HashMap<(String, String), FollowStatus>,
}

impl FollowLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: &str, target: &str, status: FollowStatus) {
        self.statuses
            .insert((normalize_handle(handle), normalize_handle(target)), status);
    }

    /// Unresolved pairs read as `Unknown`
    pub fn status(&self, handle: &str, target: &str) -> FollowStatus {
        self.statuses
            .get(&(normalize_handle(handle), normalize_handle(target)))
            .copied()
            .unwrap_or(FollowStatus::Unknown)
    }
}

/// Query the verifier for every (handle, target) pair
///
/// Duplicate handles are asked once. At most `concurrency` calls are in
/// flight; each is bounded by `timeout`.
pub async fn resolve_follows<I>(
    verifier: &dyn FollowerVerifier,
    handles: I,
    targets: &[String],
    timeout: Duration,
    concurrency: usize,
) -> FollowLedger
where
    I: IntoIterator<Item = String>,
{
    let handles: BTreeSet<String> = handles.into_iter().map(|h| normalize_handle(&h)).collect();
    let targets: BTreeSet<String> = targets.iter().map(|t| normalize_handle(t)).collect();

    let pairs: Vec<(String, String)> = handles
        .iter()
        .flat_map(|h| targets.iter().map(move |t| (h.clone(), t.clone())))
        .collect();
    let total = pairs.len();

    let results: Vec<(String, String, FollowStatus)> = stream::iter(pairs)
        .map(|(handle, target)| async move {
            let status = match tokio::time::timeout(timeout, verifier.verify(&handle, &target)).await {
                Ok(Ok(status)) => status,
                Ok(Err(e)) => {
                    warn!(handle = %handle, target = %target, error = %e, "Follow verification failed");
                    FollowStatus::Unknown
                }
                Err(_) => {
                    warn!(
                        handle = %handle,
                        target = %target,
                        timeout_ms = timeout.as_millis() as u64,
                        "Follow verification timed out"
                    );
                    FollowStatus::Unknown
                }
            };
            (handle, target, status)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut ledger = FollowLedger::new();
    let mut unknown = 0usize;
    for (handle, target, status) in results {
        if status == FollowStatus::Unknown {
            unknown += 1;
        }
        ledger.insert(&handle, &target, status);
    }

    debug!(pairs = total, unknown, "Follow verification resolved");
    ledger
}
