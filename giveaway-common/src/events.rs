//! Draw audit events
//!
//! Every state transition, completed preview, sealed result and failed
//! execution is broadcast as a [`DrawEvent`]. Subscribers (persistence,
//! audit log writers, live UIs) receive them through [`EventBus`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Lifecycle status of a draw
///
/// `Draft → Configured → Ready → Processing → {Completed | Failed}`,
/// with `Failed → Ready` as the retry path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DrawStatus {
    /// Created, participants may not be imported yet
    Draft,
    /// Filter configuration attached
    Configured,
    /// Pre-scan passed and participants imported
    Ready,
    /// Winner selection in flight
    Processing,
    /// Winners sealed, immutable
    Completed,
    /// Execution errored, may be retried
    Failed,
}

impl DrawStatus {
    /// Whether `self → next` is one of the permitted transitions
    pub fn can_transition_to(self, next: DrawStatus) -> bool {
        use DrawStatus::*;
        matches!(
            (self, next),
            (Draft, Configured)
                | (Configured, Ready)
                | (Ready, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Failed, Ready)
        )
    }
}

impl fmt::Display for DrawStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DrawStatus::Draft => "DRAFT",
            DrawStatus::Configured => "CONFIGURED",
            DrawStatus::Ready => "READY",
            DrawStatus::Processing => "PROCESSING",
            DrawStatus::Completed => "COMPLETED",
            DrawStatus::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// Draw audit event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DrawEvent {
    /// Draw moved between lifecycle states
    StatusChanged {
        draw_id: Uuid,
        old_status: DrawStatus,
        new_status: DrawStatus,
        timestamp: DateTime<Utc>,
    },

    /// A preview finished (no state was changed)
    PreviewCompleted {
        /// Draw the preview was run for, if any
        draw_id: Option<Uuid>,
        total_participants: usize,
        qualified: usize,
        excluded: usize,
        processing_time_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Winners were drawn and sealed
    WinnersSealed {
        draw_id: Uuid,
        /// Winner participant ids in rank order
        winner_ids: Vec<String>,
        /// Hex SHA-256 seal digest
        digest: String,
        timestamp: DateTime<Utc>,
    },

    /// Execution attempt failed; draw is FAILED and may be retried
    ExecutionFailed {
        draw_id: Uuid,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// Central distribution bus for draw events
///
/// Uses tokio::broadcast internally: publishing never blocks, slow
/// subscribers observe `Lagged` instead of stalling producers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DrawEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<DrawEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: DrawEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
