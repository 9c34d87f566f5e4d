//! Draw snapshot and lifecycle
//!
//! A draw is owned by its creator and moves through
//! `DRAFT → CONFIGURED → READY → PROCESSING → {COMPLETED | FAILED}`, with
//! `FAILED → READY` as the retry path. Every transition goes through
//! [`Draw::transition_to`], which rejects anything else.
//!
//! Configuration, source, participants and selection are editable until the
//! draw enters PROCESSING; a completed draw is immutable.

use chrono::{DateTime, Utc};
use giveaway_common::events::{DrawEvent, DrawStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;

use super::capability::{CapabilityDescriptor, Platform};
use super::participant::Participant;
use super::tier::Tier;
use crate::config::TierLimits;
use crate::error::{EngineError, Result};
use crate::execution::seal::DrawSeal;
use crate::filters::{resolve_availability, EvaluationContext, FilterAvailability, FilterConfiguration};
use crate::prescan::{PreScanResult, SourceRef};
use crate::selection::SelectionRequest;

/// One ranked winner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerRecord {
    pub participant_id: String,
    /// 1-based
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draw {
    pub id: Uuid,
    pub owner_id: String,
    pub status: DrawStatus,
    pub tier: Tier,
    pub capabilities: CapabilityDescriptor,
    #[serde(default)]
    pub source: Option<SourceRef>,
    #[serde(default)]
    pub pre_scan: Option<PreScanResult>,
    #[serde(default)]
    pub filter_configuration: Option<FilterConfiguration>,
    #[serde(default)]
    pub context: EvaluationContext,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub selection: SelectionRequest,
    #[serde(default)]
    pub winners: Option<Vec<WinnerRecord>>,
    #[serde(default)]
    pub seed: Option<String>,
    #[serde(default)]
    pub seal: Option<DrawSeal>,
    #[serde(default)]
    pub executed_at: Option<DateTime<Utc>>,
    /// Reason of the last failed execution
    #[serde(default)]
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Draw {
    pub fn new(owner_id: impl Into<String>, tier: Tier, platform: Platform) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            status: DrawStatus::Draft,
            tier,
            capabilities: CapabilityDescriptor::for_platform(platform),
            source: None,
            pre_scan: None,
            filter_configuration: None,
            context: EvaluationContext::default(),
            participants: Vec::new(),
            selection: SelectionRequest::default(),
            winners: None,
            seed: None,
            seal: None,
            executed_at: None,
            failure: None,
            created_at: Utc::now(),
        }
    }

    /// Replace the built-in platform descriptor with one from ingestion
    pub fn with_capabilities(mut self, capabilities: CapabilityDescriptor) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Move to `new_status` if the lifecycle permits it
    pub fn transition_to(&mut self, new_status: DrawStatus) -> Result<DrawEvent> {
        if !self.status.can_transition_to(new_status) {
            return Err(EngineError::InvalidTransition {
                from: self.status,
                to: new_status,
            });
        }
        let event = DrawEvent::StatusChanged {
            draw_id: self.id,
            old_status: self.status,
            new_status,
            timestamp: Utc::now(),
        };
        info!(draw_id = %self.id, from = %self.status, to = %new_status, "Draw status changed");
        self.status = new_status;
        Ok(event)
    }

    pub fn is_editable(&self) -> bool {
        !matches!(self.status, DrawStatus::Processing | DrawStatus::Completed)
    }

    fn ensure_editable(&self) -> Result<()> {
        if self.is_editable() {
            Ok(())
        } else {
            Err(EngineError::Configuration(format!(
                "draw {} is {}; it can no longer be edited",
                self.id, self.status
            )))
        }
    }

    fn ensure_before_ready(&self, what: &str) -> Result<()> {
        match self.status {
            DrawStatus::Draft | DrawStatus::Configured => Ok(()),
            status => Err(EngineError::Configuration(format!(
                "{} can only change before the draw is ready (draw is {})",
                what, status
            ))),
        }
    }

    /// Availability for this draw's platform and tier, computed fresh
    pub fn availability(&self) -> Vec<FilterAvailability> {
        resolve_availability(&self.capabilities, self.tier)
    }

    /// Tier change from the subscription collaborator
    pub fn set_tier(&mut self, tier: Tier) -> Result<()> {
        self.ensure_editable()?;
        self.tier = tier;
        Ok(())
    }

    /// Attach a validated configuration; the first one moves DRAFT to CONFIGURED
    pub fn configure(&mut self, configuration: FilterConfiguration) -> Result<Option<DrawEvent>> {
        self.ensure_editable()?;
        configuration.validate()?;
        configuration.ensure_available(&self.availability())?;
        self.filter_configuration = Some(configuration);

        if self.status == DrawStatus::Draft {
            return self.transition_to(DrawStatus::Configured).map(Some);
        }
        Ok(None)
    }

    pub fn set_context(&mut self, context: EvaluationContext) -> Result<()> {
        self.ensure_editable()?;
        self.context = context;
        Ok(())
    }

    pub fn set_selection(&mut self, selection: SelectionRequest) -> Result<()> {
        self.ensure_editable()?;
        selection.validate()?;
        self.selection = selection;
        Ok(())
    }

    /// Point the draw at a source; a different source discards the pre-scan
    /// and any participants imported from the old one
    pub fn set_source(&mut self, source: SourceRef) -> Result<()> {
        self.ensure_before_ready("source")?;
        if self.source.as_ref() != Some(&source) {
            self.pre_scan = None;
            self.participants.clear();
            self.source = Some(source);
        }
        Ok(())
    }

    pub fn record_pre_scan(&mut self, result: PreScanResult) -> Result<()> {
        self.ensure_before_ready("pre-scan")?;
        if self.source.as_ref() != Some(&result.source) {
            return Err(EngineError::Configuration(format!(
                "pre-scan for {} does not match the draw source",
                result.source
            )));
        }
        self.pre_scan = Some(result);
        Ok(())
    }

    /// Import participants; requires a current pre-scan
    ///
    /// An over-limit pre-scan still accepts up to the tier limit so the
    /// imported subset can be previewed. READY stays blocked until the tier
    /// covers the whole scan.
    pub fn import_participants(&mut self, participants: Vec<Participant>, limits: &TierLimits) -> Result<()> {
        self.ensure_before_ready("participants")?;
        let scan_total = self.current_pre_scan(limits)?.total_candidates;

        let limit = limits.limit_for(self.tier);
        if let Some(limit) = limit {
            if participants.len() as u64 > limit {
                return Err(EngineError::Capacity {
                    total: participants.len() as u64,
                    limit,
                });
            }
            if scan_total > limit {
                warn!(
                    draw_id = %self.id,
                    scan_total,
                    limit,
                    "Pre-scan over tier limit; imported subset is preview-only until upgrade"
                );
            }
        }

        let mut seen = HashSet::with_capacity(participants.len());
        if let Some(dup) = participants.iter().find(|p| !seen.insert(p.id.as_str())) {
            return Err(EngineError::Configuration(format!(
                "duplicate participant id '{}'",
                dup.id
            )));
        }

        info!(draw_id = %self.id, count = participants.len(), "Participants imported");
        self.participants = participants;
        Ok(())
    }

    /// Pre-scan of the current source
    fn current_pre_scan(&self, limits: &TierLimits) -> Result<&PreScanResult> {
        match (&self.source, &self.pre_scan) {
            (Some(source), Some(scan)) if scan.source == *source => Ok(scan),
            // No valid pre-scan: nothing has been shown to fit the tier
            _ => Err(EngineError::Capacity {
                total: self.participants.len() as u64,
                limit: limits.limit_for(self.tier).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Current pre-scan exists, matches the source, and fits the current tier
    fn check_pre_scan(&self, limits: &TierLimits) -> Result<()> {
        let scan = self.current_pre_scan(limits)?;
        match limits.limit_for(self.tier) {
            Some(limit) if scan.total_candidates > limit => Err(EngineError::Capacity {
                total: scan.total_candidates,
                limit,
            }),
            _ => Ok(()),
        }
    }

    /// Capacity gate applied before READY and again before execution
    pub fn check_capacity(&self, limits: &TierLimits) -> Result<()> {
        self.check_pre_scan(limits)?;
        if let Some(limit) = limits.limit_for(self.tier) {
            if self.participants.len() as u64 > limit {
                return Err(EngineError::Capacity {
                    total: self.participants.len() as u64,
                    limit,
                });
            }
        }
        Ok(())
    }

    /// CONFIGURED → READY once pre-scan, import and availability all check out
    pub fn mark_ready(&mut self, limits: &TierLimits) -> Result<DrawEvent> {
        if !self.status.can_transition_to(DrawStatus::Ready) || self.status == DrawStatus::Failed {
            return Err(EngineError::InvalidTransition {
                from: self.status,
                to: DrawStatus::Ready,
            });
        }
        self.check_capacity(limits)?;
        if self.participants.is_empty() {
            return Err(EngineError::Configuration("no participants imported".to_string()));
        }
        if let Some(configuration) = &self.filter_configuration {
            configuration.ensure_available(&self.availability())?;
        }
        self.selection.validate()?;
        self.transition_to(DrawStatus::Ready)
    }

    /// FAILED → READY
    pub fn retry(&mut self) -> Result<DrawEvent> {
        if self.status != DrawStatus::Failed {
            return Err(EngineError::InvalidTransition {
                from: self.status,
                to: DrawStatus::Ready,
            });
        }
        let event = self.transition_to(DrawStatus::Ready)?;
        self.failure = None;
        Ok(event)
    }

    /// PROCESSING → COMPLETED with the sealed result
    pub fn complete(
        &mut self,
        winners: Vec<WinnerRecord>,
        seed: Option<String>,
        seal: DrawSeal,
    ) -> Result<DrawEvent> {
        let event = self.transition_to(DrawStatus::Completed)?;
        self.winners = Some(winners);
        self.seed = seed;
        self.seal = Some(seal);
        self.executed_at = Some(Utc::now());
        self.failure = None;
        Ok(event)
    }

    /// PROCESSING → FAILED; no winners are kept
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<DrawEvent> {
        let event = self.transition_to(DrawStatus::Failed)?;
        self.winners = None;
        self.seal = None;
        self.failure = Some(reason.into());
        Ok(event)
    }
}
