//! Preview engine
//!
//! Runs the evaluator over the currently imported participants without
//! touching any draw state. The random source is always seeded (caller seed,
//! else the draw id) so repeated previews of the same input agree, including
//! `commentSelection: random`.

use giveaway_common::events::{DrawEvent, EventBus};
use giveaway_common::time::elapsed_ms;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::config::EvaluationConfig;
use crate::error::{EngineError, Result};
use crate::filters::{EvaluationContext, EvaluationOutcome, Evaluator, FilterCategory, FilterConfiguration};
use crate::model::{Draw, Participant, ParticipantSummary};
use crate::random::RandomSource;

/// Seed used when neither a seed nor a draw id is available
const DEFAULT_PREVIEW_SEED: &str = "preview";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewOptions {
    pub sample_excluded_limit: usize,
    /// Evaluate only this many leading participants
    pub max_participants: Option<usize>,
    pub seed: Option<String>,
}

impl PreviewOptions {
    pub fn from_config(config: &EvaluationConfig) -> Self {
        Self {
            sample_excluded_limit: config.sample_excluded_limit,
            max_participants: None,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludedSample {
    pub participant: ParticipantSummary,
    pub category: FilterCategory,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    pub total_participants: usize,
    pub qualified: usize,
    pub excluded: usize,
    pub per_category_exclusion_counts: BTreeMap<FilterCategory, usize>,
    pub sample_excluded: Vec<ExcludedSample>,
    pub processing_time_ms: u64,
}

pub struct PreviewEngine {
    evaluator: Evaluator,
    events: Option<EventBus>,
}

impl PreviewEngine {
    pub fn new(evaluator: Evaluator) -> Self {
        Self {
            evaluator,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Preview a draw's current configuration against its imported participants
    pub async fn preview_draw(
        &self,
        draw: &Draw,
        options: &PreviewOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<PreviewResult> {
        let filters = draw.filter_configuration.as_ref().ok_or_else(|| {
            EngineError::Configuration("draw has no filter configuration".to_string())
        })?;
        self.preview(Some(draw.id), filters, &draw.participants, &draw.context, options, cancel)
            .await
    }

    /// Preview an explicit configuration snapshot
    pub async fn preview(
        &self,
        draw_id: Option<Uuid>,
        filters: &FilterConfiguration,
        participants: &[Participant],
        ctx: &EvaluationContext,
        options: &PreviewOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<PreviewResult> {
        let start = Instant::now();
        let sample = match options.max_participants {
            Some(max) => &participants[..max.min(participants.len())],
            None => participants,
        };

        let seed = options
            .seed
            .clone()
            .or_else(|| draw_id.map(|id| id.to_string()))
            .unwrap_or_else(|| DEFAULT_PREVIEW_SEED.to_string());
        let mut rng = RandomSource::seeded(&seed);

        info!(
            draw_id = ?draw_id,
            participants = sample.len(),
            active_filters = filters.active_filters().len(),
            "Preview started"
        );

        let report = self
            .evaluator
            .evaluate_all(filters, sample, ctx, &mut rng, cancel)
            .await?;

        let sample_excluded = sample
            .iter()
            .zip(&report.verdicts)
            .filter_map(|(participant, verdict)| match &verdict.outcome {
                EvaluationOutcome::Excluded { category, reason } => Some(ExcludedSample {
                    participant: ParticipantSummary::from(participant),
                    category: *category,
                    reason: reason.clone(),
                }),
                EvaluationOutcome::Qualified { .. } => None,
            })
            .take(options.sample_excluded_limit)
            .collect();

        let result = PreviewResult {
            total_participants: sample.len(),
            qualified: report.qualified_count(),
            excluded: report.excluded_count(),
            per_category_exclusion_counts: report.exclusion_counts(),
            sample_excluded,
            processing_time_ms: elapsed_ms(start),
        };

        info!(
            draw_id = ?draw_id,
            total = result.total_participants,
            qualified = result.qualified,
            excluded = result.excluded,
            elapsed_ms = result.processing_time_ms,
            "Preview completed"
        );

        if let Some(events) = &self.events {
            events.emit_lossy(DrawEvent::PreviewCompleted {
                draw_id,
                total_participants: result.total_participants,
                qualified: result.qualified,
                excluded: result.excluded,
                processing_time_ms: result.processing_time_ms,
                timestamp: chrono::Utc::now(),
            });
        }

        Ok(result)
    }
}
