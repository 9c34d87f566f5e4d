//! Pre-scan guard
//!
//! Estimates candidate volume for a source before a full import is allowed,
//! and compares it to the tier ceiling. The estimate is cached per source
//! reference; a different reference discards the cached value. The verdict
//! itself is recomputed on every call so tier changes are never stale.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TierLimits;
use crate::error::{EngineError, Result};
use crate::model::Tier;

/// Where participants are imported from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum SourceRef {
    /// Platform post URL
    Url(String),
    /// Uploaded file name
    File(String),
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceRef::Url(url) => write!(f, "url:{}", url),
            SourceRef::File(name) => write!(f, "file:{}", name),
        }
    }
}

/// Raw count reported by the ingestion collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeEstimate {
    pub total_candidates: u64,
    /// Count is an estimate rather than exact
    pub is_estimate: bool,
    /// Source reported more entries beyond what was counted
    pub has_more: bool,
}

/// Pre-scan verdict for one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreScanResult {
    pub source: SourceRef,
    pub total_candidates: u64,
    pub is_estimate: bool,
    pub has_more: bool,
    pub within_limit: bool,
    /// Tier ceiling; `None` means unlimited
    pub tier_limit: Option<u64>,
    pub upgrade_required: bool,
    pub scanned_at: DateTime<Utc>,
}

impl PreScanResult {
    /// Compare an estimate against the tier ceiling
    pub fn evaluate(source: SourceRef, estimate: VolumeEstimate, tier_limit: Option<u64>) -> Self {
        let within_limit = tier_limit.map_or(true, |limit| estimate.total_candidates <= limit);
        Self {
            source,
            total_candidates: estimate.total_candidates,
            is_estimate: estimate.is_estimate,
            has_more: estimate.has_more,
            within_limit,
            tier_limit,
            upgrade_required: !within_limit,
            scanned_at: Utc::now(),
        }
    }

    /// Capacity error when over the ceiling
    pub fn ensure_within_limit(&self) -> Result<()> {
        if self.within_limit {
            return Ok(());
        }
        Err(EngineError::Capacity {
            total: self.total_candidates,
            limit: self.tier_limit.unwrap_or(u64::MAX),
        })
    }
}

/// Ingestion collaborator seam: counts candidates for a source
#[async_trait]
pub trait CandidateEstimator: Send + Sync {
    async fn estimate(&self, source: &SourceRef) -> Result<VolumeEstimate>;
}

/// Estimator for sources already loaded in memory (file imports)
pub struct ExactCount(pub u64);

#[async_trait]
impl CandidateEstimator for ExactCount {
    async fn estimate(&self, _source: &SourceRef) -> Result<VolumeEstimate> {
        Ok(VolumeEstimate {
            total_candidates: self.0,
            is_estimate: false,
            has_more: false,
        })
    }
}

/// Gate evaluated once per distinct source reference
pub struct PreScanGuard<E: CandidateEstimator> {
    estimator: E,
    limits: TierLimits,
    cache: Mutex<Option<(SourceRef, VolumeEstimate)>>,
}

impl<E: CandidateEstimator> PreScanGuard<E> {
    pub fn new(estimator: E, limits: TierLimits) -> Self {
        Self {
            estimator,
            limits,
            cache: Mutex::new(None),
        }
    }

    /// Scan `source` for a caller at `tier`
    ///
    /// Aborts with [`EngineError::Cancelled`] if `cancel` fires while the
    /// estimator is running; nothing is cached in that case.
    pub async fn scan(
        &self,
        source: &SourceRef,
        tier: Tier,
        cancel: Option<&CancellationToken>,
    ) -> Result<PreScanResult> {
        let tier_limit = self.limits.limit_for(tier);

        let cached = {
            let cache = self.cache.lock().await;
            match cache.as_ref() {
                Some((cached_source, estimate)) if cached_source == source => Some(*estimate),
                _ => None,
            }
        };

        let estimate = match cached {
            Some(estimate) => {
                debug!(source = %source, "Pre-scan cache hit");
                estimate
            }
            None => {
                let estimate = match cancel {
                    Some(token) => tokio::select! {
                        _ = token.cancelled() => return Err(EngineError::Cancelled),
                        estimate = self.estimator.estimate(source) => estimate?,
                    },
                    None => self.estimator.estimate(source).await?,
                };
                // A different source replaces whatever was cached
                *self.cache.lock().await = Some((source.clone(), estimate));
                estimate
            }
        };

        let result = PreScanResult::evaluate(source.clone(), estimate, tier_limit);
        if result.within_limit {
            info!(
                source = %source,
                total = result.total_candidates,
                estimate = result.is_estimate,
                "Pre-scan within tier limit"
            );
        } else {
            warn!(
                source = %source,
                total = result.total_candidates,
                limit = ?tier_limit,
                tier = %tier,
                "Pre-scan over tier limit, upgrade required"
            );
        }
        Ok(result)
    }

    /// Drop the cached estimate
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }
}
