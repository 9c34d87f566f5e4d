//! Draw execution: exactly-once claim, supervised selection, sealing

pub mod executor;
pub mod ledger;
pub mod rate_limit;
pub mod seal;

pub use executor::DrawExecutor;
pub use ledger::{ClaimOutcome, ClaimToken, DrawLedger, InMemoryDrawLedger, SettleOutcome, Settlement};
pub use rate_limit::ExecutionRateLimiter;
pub use seal::{compute_digest, verify_seal, DrawSeal, SealInput};
