//! Draw ledger: the persistence seam that makes execution exactly-once
//!
//! `try_claim` is the atomic READY → PROCESSING guard. Exactly one caller per
//! draw id gets [`ClaimOutcome::Claimed`]; everyone else sees the draw in
//! flight or already sealed. A production ledger backs this with a unique
//! transition in the database; [`InMemoryDrawLedger`] does it under one lock.
//!
//! Every claim carries a [`ClaimToken`]. Only the holder of the current token
//! can settle or release the draw, so an attempt whose claim was reclaimed
//! after the lease expired cannot overwrite the newer attempt.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::model::Draw;

/// Fencing token for one claim; unique for the ledger's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimToken(u64);

#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// Caller now owns the execution
    Claimed(ClaimToken),
    /// Another caller is executing
    InFlight,
    /// Already completed; here is the sealed draw
    Sealed(Box<Draw>),
}

/// Final state of an execution attempt
#[derive(Debug, Clone)]
pub enum Settlement {
    Completed(Box<Draw>),
    /// Snapshot in FAILED with its failure reason
    Failed(Box<Draw>),
}

/// Result of settling a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    Recorded,
    /// The token was reclaimed by a newer attempt; nothing was written
    Superseded,
}

#[async_trait]
pub trait DrawLedger: Send + Sync {
    /// Atomically claim execution of `draw_id`
    async fn try_claim(&self, draw_id: Uuid) -> Result<ClaimOutcome>;

    /// Record the sealed draw
    async fn complete(&self, draw: &Draw, claim: ClaimToken) -> Result<SettleOutcome>;

    /// Record a failed attempt; the draw may be claimed again
    async fn fail(&self, draw: &Draw, claim: ClaimToken) -> Result<SettleOutcome>;

    /// Give a claim back without running; the draw returns to its prior state
    async fn release(&self, draw_id: Uuid, claim: ClaimToken) -> Result<()>;

    /// Last settlement of `draw_id`, if any
    async fn settled(&self, draw_id: Uuid) -> Result<Option<Settlement>>;

    /// Wait until the in-flight attempt for `draw_id` settles
    async fn wait_settled(&self, draw_id: Uuid) -> Result<Settlement>;
}

enum LedgerState {
    Processing {
        claimed_at: Instant,
        claim: ClaimToken,
        /// Settlement to restore on release
        previous: Option<Settlement>,
    },
    Settled(Settlement),
}

struct LedgerSlot {
    state: LedgerState,
    settled_tx: watch::Sender<Option<Settlement>>,
}

/// Single-process ledger
pub struct InMemoryDrawLedger {
    slots: Mutex<HashMap<Uuid, LedgerSlot>>,
    next_claim: AtomicU64,
    /// Claims older than this are treated as abandoned
    lease: Duration,
}

impl InMemoryDrawLedger {
    pub fn new(lease: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            next_claim: AtomicU64::new(1),
            lease,
        }
    }

    fn processing(&self, previous: Option<Settlement>) -> (LedgerState, ClaimToken) {
        let claim = ClaimToken(self.next_claim.fetch_add(1, Ordering::Relaxed));
        let state = LedgerState::Processing {
            claimed_at: Instant::now(),
            claim,
            previous,
        };
        (state, claim)
    }

    async fn settle(&self, draw_id: Uuid, claim: ClaimToken, settlement: Settlement) -> Result<SettleOutcome> {
        let mut slots = self.slots.lock().await;
        let slot = slots
            .get_mut(&draw_id)
            .ok_or_else(|| EngineError::Internal(format!("draw {} settled without a claim", draw_id)))?;
        match &slot.state {
            LedgerState::Processing { claim: current, .. } if *current == claim => {}
            _ => {
                warn!(draw_id = %draw_id, "Superseded claim tried to settle; result discarded");
                return Ok(SettleOutcome::Superseded);
            }
        }
        slot.state = LedgerState::Settled(settlement.clone());
        slot.settled_tx.send_replace(Some(settlement));
        Ok(SettleOutcome::Recorded)
    }
}

#[async_trait]
impl DrawLedger for InMemoryDrawLedger {
    async fn try_claim(&self, draw_id: Uuid) -> Result<ClaimOutcome> {
        let mut slots = self.slots.lock().await;
        let Some(slot) = slots.get_mut(&draw_id) else {
            let (settled_tx, _) = watch::channel(None);
            let (state, claim) = self.processing(None);
            slots.insert(draw_id, LedgerSlot { state, settled_tx });
            debug!(draw_id = %draw_id, "Execution claimed");
            return Ok(ClaimOutcome::Claimed(claim));
        };

        match &mut slot.state {
            LedgerState::Settled(Settlement::Completed(draw)) => Ok(ClaimOutcome::Sealed(draw.clone())),
            LedgerState::Processing { claimed_at, .. } if claimed_at.elapsed() < self.lease => {
                Ok(ClaimOutcome::InFlight)
            }
            LedgerState::Processing {
                claimed_at, previous, ..
            } => {
                warn!(
                    draw_id = %draw_id,
                    held_ms = claimed_at.elapsed().as_millis() as u64,
                    "Reclaiming abandoned execution"
                );
                let (state, claim) = self.processing(previous.take());
                slot.state = state;
                Ok(ClaimOutcome::Claimed(claim))
            }
            LedgerState::Settled(Settlement::Failed(failed)) => {
                let previous = Settlement::Failed(failed.clone());
                let (state, claim) = self.processing(Some(previous));
                slot.state = state;
                slot.settled_tx.send_replace(None);
                debug!(draw_id = %draw_id, "Execution re-claimed after failure");
                Ok(ClaimOutcome::Claimed(claim))
            }
        }
    }

    async fn complete(&self, draw: &Draw, claim: ClaimToken) -> Result<SettleOutcome> {
        self.settle(draw.id, claim, Settlement::Completed(Box::new(draw.clone())))
            .await
    }

    async fn fail(&self, draw: &Draw, claim: ClaimToken) -> Result<SettleOutcome> {
        self.settle(draw.id, claim, Settlement::Failed(Box::new(draw.clone())))
            .await
    }

    async fn release(&self, draw_id: Uuid, claim: ClaimToken) -> Result<()> {
        let mut slots = self.slots.lock().await;
        let Some(slot) = slots.get_mut(&draw_id) else {
            return Ok(());
        };
        let previous = match &mut slot.state {
            LedgerState::Processing {
                claim: current, previous, ..
            } if *current == claim => previous.take(),
            _ => return Ok(()),
        };
        match previous {
            Some(settlement) => {
                slot.state = LedgerState::Settled(settlement.clone());
                slot.settled_tx.send_replace(Some(settlement));
            }
            // Waiters see the channel close
            None => {
                slots.remove(&draw_id);
            }
        }
        debug!(draw_id = %draw_id, "Execution claim released");
        Ok(())
    }

    async fn settled(&self, draw_id: Uuid) -> Result<Option<Settlement>> {
        let slots = self.slots.lock().await;
        Ok(slots.get(&draw_id).and_then(|slot| match &slot.state {
            LedgerState::Settled(settlement) => Some(settlement.clone()),
            LedgerState::Processing { .. } => None,
        }))
    }

    async fn wait_settled(&self, draw_id: Uuid) -> Result<Settlement> {
        let mut rx = {
            let slots = self.slots.lock().await;
            let slot = slots
                .get(&draw_id)
                .ok_or_else(|| EngineError::Internal(format!("draw {} was never claimed", draw_id)))?;
            if let LedgerState::Settled(settlement) = &slot.state {
                return Ok(settlement.clone());
            }
            slot.settled_tx.subscribe()
        };

        loop {
            if let Some(settlement) = rx.borrow_and_update().clone() {
                return Ok(settlement);
            }
            rx.changed()
                .await
                .map_err(|_| EngineError::Internal(format!("ledger for draw {} closed", draw_id)))?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DrawStatus, Platform, Tier};
    use std::sync::Arc;

    fn draw_in(status: DrawStatus) -> Draw {
        let mut draw = Draw::new("owner", Tier::Free, Platform::Instagram);
        draw.status = status;
        draw
    }

    async fn claim(ledger: &InMemoryDrawLedger, id: Uuid) -> ClaimToken {
        match ledger.try_claim(id).await.unwrap() {
            ClaimOutcome::Claimed(token) => token,
            other => panic!("expected claim, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_single_claim_wins() {
        let ledger = InMemoryDrawLedger::new(Duration::from_secs(60));
        let id = Uuid::new_v4();
        claim(&ledger, id).await;
        assert!(matches!(ledger.try_claim(id).await.unwrap(), ClaimOutcome::InFlight));
        assert!(ledger.settled(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_waiter_sees_completion() {
        let ledger = Arc::new(InMemoryDrawLedger::new(Duration::from_secs(60)));
        let mut draw = draw_in(DrawStatus::Completed);
        let token = claim(&ledger, draw.id).await;

        let waiter = {
            let ledger = ledger.clone();
            let id = draw.id;
            tokio::spawn(async move { ledger.wait_settled(id).await })
        };
        tokio::task::yield_now().await;

        draw.owner_id = "sealed".into();
        assert_eq!(ledger.complete(&draw, token).await.unwrap(), SettleOutcome::Recorded);
        match waiter.await.unwrap().unwrap() {
            Settlement::Completed(sealed) => assert_eq!(sealed.owner_id, "sealed"),
            Settlement::Failed(_) => panic!("expected completion"),
        }
        assert!(matches!(
            ledger.try_claim(draw.id).await.unwrap(),
            ClaimOutcome::Sealed(_)
        ));

        // A sealed draw is never overwritten
        draw.owner_id = "overwritten".into();
        assert_eq!(ledger.complete(&draw, token).await.unwrap(), SettleOutcome::Superseded);
        match ledger.settled(draw.id).await.unwrap() {
            Some(Settlement::Completed(sealed)) => assert_eq!(sealed.owner_id, "sealed"),
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_draw_can_be_claimed_again() {
        let ledger = InMemoryDrawLedger::new(Duration::from_secs(60));
        let draw = draw_in(DrawStatus::Failed);
        let token = claim(&ledger, draw.id).await;
        ledger.fail(&draw, token).await.unwrap();
        assert!(matches!(
            ledger.settled(draw.id).await.unwrap(),
            Some(Settlement::Failed(_))
        ));
        let retry = claim(&ledger, draw.id).await;
        assert_ne!(retry, token);
        assert!(ledger.settled(draw.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_abandoned_claim_reclaimed_after_lease() {
        let ledger = InMemoryDrawLedger::new(Duration::from_millis(20));
        let id = Uuid::new_v4();
        claim(&ledger, id).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        claim(&ledger, id).await;
    }

    #[tokio::test]
    async fn test_reclaimed_token_cannot_settle() {
        let ledger = InMemoryDrawLedger::new(Duration::from_millis(20));
        let mut draw = draw_in(DrawStatus::Completed);
        let stale = claim(&ledger, draw.id).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        let current = claim(&ledger, draw.id).await;

        draw.owner_id = "stale".into();
        assert_eq!(ledger.complete(&draw, stale).await.unwrap(), SettleOutcome::Superseded);
        assert_eq!(ledger.fail(&draw, stale).await.unwrap(), SettleOutcome::Superseded);
        assert!(ledger.settled(draw.id).await.unwrap().is_none());

        draw.owner_id = "current".into();
        assert_eq!(ledger.complete(&draw, current).await.unwrap(), SettleOutcome::Recorded);
        match ledger.settled(draw.id).await.unwrap() {
            Some(Settlement::Completed(sealed)) => assert_eq!(sealed.owner_id, "current"),
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_release_restores_prior_state() {
        let ledger = InMemoryDrawLedger::new(Duration::from_secs(60));
        let draw = draw_in(DrawStatus::Failed);

        // Fresh claim released: the draw was never claimed
        let token = claim(&ledger, draw.id).await;
        ledger.release(draw.id, token).await.unwrap();
        assert!(ledger.settled(draw.id).await.unwrap().is_none());
        let token = claim(&ledger, draw.id).await;

        // Retry claim released: the earlier failure is back
        ledger.fail(&draw, token).await.unwrap();
        let retry = claim(&ledger, draw.id).await;
        ledger.release(draw.id, retry).await.unwrap();
        assert!(matches!(
            ledger.settled(draw.id).await.unwrap(),
            Some(Settlement::Failed(_))
        ));

        // Released token is dead
        assert_eq!(ledger.fail(&draw, retry).await.unwrap(), SettleOutcome::Superseded);
    }
}
