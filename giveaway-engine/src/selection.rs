//! Winner selection
//!
//! Two sampling modes over the qualified pool:
//! - `crypto-random`: partial Fisher–Yates driven by the OS CSPRNG. Never
//!   seeded, never reproducible.
//! - `fisher-yates`: full Fisher–Yates shuffle driven by a seeded stream. The
//!   seed is recorded so the exact winner order can be replayed.
//!
//! Both modes draw indices through [`RandomSource::uniform_index`], which
//! rejection-samples to avoid modulo bias. Story bonus weights are never
//! consulted here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::model::WinnerRecord;
use crate::random::{generate_seed, RandomSource};

/// Sampling algorithm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionMode {
    #[default]
    CryptoRandom,
    FisherYates,
}

impl SelectionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionMode::CryptoRandom => "crypto-random",
            SelectionMode::FisherYates => "fisher-yates",
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crypto-random" => Ok(SelectionMode::CryptoRandom),
            "fisher-yates" => Ok(SelectionMode::FisherYates),
            other => Err(EngineError::Configuration(format!(
                "unknown selection mode '{}'",
                other
            ))),
        }
    }
}

/// What the organizer asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRequest {
    pub winner_count: usize,
    #[serde(default)]
    pub mode: SelectionMode,
    /// Only honored by `fisher-yates`
    #[serde(default)]
    pub seed: Option<String>,
}

impl Default for SelectionRequest {
    fn default() -> Self {
        Self {
            winner_count: 1,
            mode: SelectionMode::default(),
            seed: None,
        }
    }
}

impl SelectionRequest {
    pub fn validate(&self) -> Result<()> {
        if self.winner_count == 0 {
            return Err(EngineError::Configuration(
                "winnerCount: must be at least 1".to_string(),
            ));
        }
        if matches!(&self.seed, Some(seed) if seed.trim().is_empty()) {
            return Err(EngineError::Configuration("seed: must not be blank".to_string()));
        }
        Ok(())
    }
}

/// Ranked winners plus the seed actually used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionOutcome {
    pub winners: Vec<WinnerRecord>,
    /// Seed for `fisher-yates` (supplied or generated); `None` for `crypto-random`
    pub seed: Option<String>,
}

/// Draw `request.winner_count` distinct winners from `qualified_ids`
///
/// Fails with [`EngineError::Sizing`] before drawing anything if the pool is
/// too small; no partial winner list is ever produced.
pub fn select_winners(qualified_ids: &[String], request: &SelectionRequest) -> Result<SelectionOutcome> {
    request.validate()?;
    let n = request.winner_count;
    if n > qualified_ids.len() {
        return Err(EngineError::Sizing {
            requested: n,
            available: qualified_ids.len(),
        });
    }

    let mut order: Vec<usize> = (0..qualified_ids.len()).collect();

    let seed = match request.mode {
        SelectionMode::CryptoRandom => {
            if request.seed.is_some() {
                warn!("Seed ignored for crypto-random selection");
            }
            let mut rng = RandomSource::secure();
            partial_shuffle(&mut order, n, &mut rng);
            None
        }
        SelectionMode::FisherYates => {
            let seed = request.seed.clone().unwrap_or_else(generate_seed);
            let mut rng = RandomSource::seeded(&seed);
            full_shuffle(&mut order, &mut rng);
            Some(seed)
        }
    };

    let winners = order
        .iter()
        .take(n)
        .enumerate()
        .map(|(i, &index)| WinnerRecord {
            participant_id: qualified_ids[index].clone(),
            rank: (i + 1) as u32,
        })
        .collect();

    debug!(
        mode = %request.mode,
        pool = qualified_ids.len(),
        winners = n,
        "Winners selected"
    );

    Ok(SelectionOutcome { winners, seed })
}

/// Fisher-Yates over the first `n` positions only
///
/// Both shuffles are explicit loops over [`RandomSource::uniform_index`]
/// instead of `SliceRandom`, which pins the swap order a seed replays to.
fn partial_shuffle(items: &mut [usize], n: usize, rng: &mut RandomSource) {
    let len = items.len();
    for i in 0..n.min(len) {
        let j = i + rng.uniform_index(len - i);
        items.swap(i, j);
    }
}

/// Classic descending Fisher-Yates
fn full_shuffle(items: &mut [usize], rng: &mut RandomSource) {
    for i in (1..items.len()).rev() {
        let j = rng.uniform_index(i + 1);
        items.swap(i, j);
    }
}
