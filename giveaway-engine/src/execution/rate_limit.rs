//! Per-caller execution attempt quota
//!
//! Operational guard in front of the executor, not part of selection
//! correctness. Keyed by draw owner.

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use tracing::warn;

use crate::error::{EngineError, Result};

pub struct ExecutionRateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
    per_hour: u32,
}

impl ExecutionRateLimiter {
    pub fn per_hour(max_attempts: u32) -> Result<Self> {
        let burst = NonZeroU32::new(max_attempts).ok_or_else(|| {
            EngineError::Configuration("execution.max_executions_per_hour: must be greater than 0".to_string())
        })?;
        Ok(Self {
            limiter: RateLimiter::keyed(Quota::per_hour(burst)),
            per_hour: max_attempts,
        })
    }

    /// Consume one attempt for `caller`, or fail if the quota is spent
    pub fn check(&self, caller: &str) -> Result<()> {
        match self.limiter.check_key(&caller.to_string()) {
            Ok(()) => Ok(()),
            Err(_) => {
                warn!(caller = %caller, per_hour = self.per_hour, "Execution attempt rate limited");
                Err(EngineError::RateLimited(caller.to_string()))
            }
        }
    }
}
