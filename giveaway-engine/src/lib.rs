//! Giveaway engine library
//!
//! Two engines over one draw model:
//! - Qualification: capability & tier resolution, the per-category filter
//!   evaluator, the pre-scan guard and the preview engine
//! - Execution: winner selection, the exactly-once draw executor and the
//!   sealed audit record
//!
//! Ingestion, persistence and notification live outside this crate and plug in
//! through [`verification::FollowerVerifier`], [`prescan::CandidateEstimator`]
//! and [`execution::DrawLedger`].

pub mod config;
pub mod error;
pub mod execution;
pub mod filters;
pub mod model;
pub mod prescan;
pub mod preview;
pub mod random;
pub mod selection;
pub mod verification;

pub use crate::config::EngineConfig;
pub use crate::error::{EngineError, Result};
pub use crate::execution::{DrawExecutor, DrawLedger, InMemoryDrawLedger};
pub use crate::filters::{Evaluator, FilterConfiguration};
pub use crate::model::{Draw, Participant, Tier};
pub use crate::preview::{PreviewEngine, PreviewOptions, PreviewResult};
pub use crate::selection::{SelectionMode, SelectionRequest};
