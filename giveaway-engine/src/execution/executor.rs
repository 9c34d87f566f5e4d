//! Draw executor
//!
//! `execute` takes a draw snapshot and returns the sealed snapshot. The
//! READY → PROCESSING move is claimed through the [`DrawLedger`], so two
//! concurrent calls for the same draw draw winners once; the other call waits
//! and returns the same sealed draw. Once claimed, selection runs under a
//! supervising timeout and always settles as COMPLETED or FAILED. An attempt
//! whose claim was reclaimed after the lease expired discards its own result
//! and returns whatever the newer attempt settled.

use giveaway_common::events::{DrawEvent, EventBus};
use giveaway_common::time::millis_to_duration;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::ledger::{ClaimOutcome, DrawLedger, SettleOutcome, Settlement};
use super::rate_limit::ExecutionRateLimiter;
use super::seal::{DrawSeal, SealInput};
use crate::config::{ExecutionConfig, TierLimits};
use crate::error::{EngineError, Result};
use crate::filters::Evaluator;
use crate::model::{Draw, DrawStatus, WinnerRecord};
use crate::random::{generate_seed, RandomSource};
use crate::selection::{select_winners, SelectionMode, SelectionRequest};

/// Everything selection produced, ready to be written onto the draw
struct SealedSelection {
    winners: Vec<WinnerRecord>,
    seed: Option<String>,
    seal: DrawSeal,
}

pub struct DrawExecutor<L: DrawLedger> {
    evaluator: Evaluator,
    ledger: Arc<L>,
    execution: ExecutionConfig,
    limits: TierLimits,
    events: EventBus,
    rate_limiter: Option<ExecutionRateLimiter>,
}

impl<L: DrawLedger> DrawExecutor<L> {
    pub fn new(
        evaluator: Evaluator,
        ledger: Arc<L>,
        execution: ExecutionConfig,
        limits: TierLimits,
        events: EventBus,
    ) -> Self {
        Self {
            evaluator,
            ledger,
            execution,
            limits,
            events,
            rate_limiter: None,
        }
    }

    /// Cap execution attempts per draw owner
    ///
    /// Charged only when an attempt wins the claim; replays of a sealed draw
    /// and callers waiting on an in-flight attempt are free.
    pub fn with_rate_limit(mut self, limiter: ExecutionRateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    /// Execute winner selection for `draw`
    ///
    /// Re-executing a COMPLETED draw returns it unchanged. On failure the
    /// FAILED snapshot is recorded in the ledger and the error returned.
    pub async fn execute(&self, mut draw: Draw) -> Result<Draw> {
        match draw.status {
            DrawStatus::Completed => return Ok(draw),
            DrawStatus::Ready | DrawStatus::Processing => {}
            other => {
                return Err(EngineError::InvalidTransition {
                    from: other,
                    to: DrawStatus::Processing,
                })
            }
        }

        draw.check_capacity(&self.limits)?;

        let claim = match self.ledger.try_claim(draw.id).await? {
            ClaimOutcome::Sealed(sealed) => {
                info!(draw_id = %draw.id, "Draw already sealed, returning existing result");
                return Ok(*sealed);
            }
            ClaimOutcome::InFlight => return self.await_other(draw).await,
            ClaimOutcome::Claimed(claim) => claim,
        };

        if let Some(limiter) = &self.rate_limiter {
            if let Err(e) = limiter.check(&draw.owner_id) {
                self.ledger.release(draw.id, claim).await?;
                return Err(e);
            }
        }

        if draw.status == DrawStatus::Ready {
            let event = draw.transition_to(DrawStatus::Processing)?;
            self.events.emit_lossy(event);
        }

        let outcome = tokio::time::timeout(self.execution.timeout(), self.run_selection(&draw))
            .await
            .unwrap_or_else(|_| Err(EngineError::ExecutionTimeout(self.execution.timeout_ms)));

        match outcome {
            Ok(sealed) => {
                let winner_ids: Vec<String> = sealed.winners.iter().map(|w| w.participant_id.clone()).collect();
                let digest = sealed.seal.digest.clone();
                let event = draw.complete(sealed.winners, sealed.seed, sealed.seal)?;
                if self.ledger.complete(&draw, claim).await? == SettleOutcome::Superseded {
                    return self.await_other(draw).await;
                }
                self.events.emit_lossy(event);
                self.events.emit_lossy(DrawEvent::WinnersSealed {
                    draw_id: draw.id,
                    winner_ids,
                    digest: digest.clone(),
                    timestamp: chrono::Utc::now(),
                });
                info!(draw_id = %draw.id, digest = %digest, "Winners sealed");
                Ok(draw)
            }
            Err(e) => {
                let reason = e.to_string();
                error!(draw_id = %draw.id, error = %reason, "Draw execution failed");
                let event = draw.fail(reason.clone())?;
                if self.ledger.fail(&draw, claim).await? == SettleOutcome::Superseded {
                    return self.await_other(draw).await;
                }
                self.events.emit_lossy(event);
                self.events.emit_lossy(DrawEvent::ExecutionFailed {
                    draw_id: draw.id,
                    reason,
                    timestamp: chrono::Utc::now(),
                });
                Err(e)
            }
        }
    }

    /// Lost or superseded claim: wait for the current owner to settle and mirror its result
    async fn await_other(&self, draw: Draw) -> Result<Draw> {
        info!(draw_id = %draw.id, "Execution already in flight, waiting for result");
        // The owner's selection is bounded by the timeout, its claim by the lease
        let patience_ms = self.execution.processing_lease_ms.max(self.execution.timeout_ms);
        let settled = tokio::time::timeout(millis_to_duration(patience_ms), self.ledger.wait_settled(draw.id))
            .await
            .map_err(|_| EngineError::ExecutionTimeout(patience_ms))??;
        match settled {
            Settlement::Completed(sealed) => Ok(*sealed),
            Settlement::Failed(failed) => Err(EngineError::ExecutionFailed(
                failed.failure.unwrap_or_else(|| "unknown failure".to_string()),
            )),
        }
    }

    /// Evaluate the imported participants and draw winners
    async fn run_selection(&self, draw: &Draw) -> Result<SealedSelection> {
        let filters = draw
            .filter_configuration
            .as_ref()
            .ok_or_else(|| EngineError::Configuration("draw has no filter configuration".to_string()))?;
        // Tier may have dropped since READY
        filters.ensure_available(&draw.availability())?;

        // Fisher-Yates runs the whole pipeline off one recorded seed so it can be replayed
        let mut request: SelectionRequest = draw.selection.clone();
        let mut rng = match request.mode {
            SelectionMode::CryptoRandom => RandomSource::secure(),
            SelectionMode::FisherYates => {
                let seed = request.seed.clone().unwrap_or_else(generate_seed);
                let rng = RandomSource::seeded(&seed);
                request.seed = Some(seed);
                rng
            }
        };

        let report = self
            .evaluator
            .evaluate_all(filters, &draw.participants, &draw.context, &mut rng, None)
            .await?;
        let qualified_ids = report.qualified_ids();
        let weight_hints_present = report.weight_hints_present();
        if weight_hints_present {
            warn!(
                draw_id = %draw.id,
                "Story bonus weights present but not applied to selection"
            );
        }

        info!(
            draw_id = %draw.id,
            total = draw.participants.len(),
            qualified = qualified_ids.len(),
            requested = request.winner_count,
            mode = %request.mode,
            "Selecting winners"
        );

        let selection = select_winners(&qualified_ids, &request)?;
        let seal = DrawSeal::new(
            &SealInput {
                draw_id: draw.id,
                mode: request.mode,
                seed: selection.seed.as_deref(),
                qualified_ids: &qualified_ids,
                winners: &selection.winners,
            },
            weight_hints_present,
        );

        Ok(SealedSelection {
            winners: selection.winners,
            seed: selection.seed,
            seal,
        })
    }
}
