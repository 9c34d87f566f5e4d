//! Draw seal: tamper-evident digest over everything that determined the winners

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::model::WinnerRecord;
use crate::selection::SelectionMode;

// Domain separation tags, one per field group
const TAG_DRAW: u8 = 0x00;
const TAG_MODE: u8 = 0x01;
const TAG_SEED: u8 = 0x02;
const TAG_QUALIFIED: u8 = 0x03;
const TAG_WINNER: u8 = 0x04;

/// Audit record stored with a completed draw
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawSeal {
    /// Lowercase hex SHA-256
    pub digest: String,
    pub mode: SelectionMode,
    pub seed: Option<String>,
    pub qualified_count: usize,
    /// Story bonus weights were present but not applied
    pub weight_hints_present: bool,
    pub sealed_at: DateTime<Utc>,
}

/// Inputs covered by the digest
pub struct SealInput<'a> {
    pub draw_id: Uuid,
    pub mode: SelectionMode,
    pub seed: Option<&'a str>,
    pub qualified_ids: &'a [String],
    pub winners: &'a [WinnerRecord],
}

fn update_str(hasher: &mut Sha256, tag: u8, value: &str) {
    hasher.update([tag]);
    hasher.update((value.len() as u64).to_be_bytes());
    hasher.update(value.as_bytes());
}

/// Hex SHA-256 over draw id, mode, seed, qualified ids and ranked winners
///
/// Every string is length-prefixed so field boundaries cannot be shifted.
pub fn compute_digest(input: &SealInput<'_>) -> String {
    let mut hasher = Sha256::new();
    hasher.update([TAG_DRAW]);
    hasher.update(input.draw_id.as_bytes());
    update_str(&mut hasher, TAG_MODE, input.mode.as_str());
    update_str(&mut hasher, TAG_SEED, input.seed.unwrap_or(""));

    hasher.update((input.qualified_ids.len() as u64).to_be_bytes());
    for id in input.qualified_ids {
        update_str(&mut hasher, TAG_QUALIFIED, id);
    }

    hasher.update((input.winners.len() as u64).to_be_bytes());
    for winner in input.winners {
        hasher.update(winner.rank.to_be_bytes());
        update_str(&mut hasher, TAG_WINNER, &winner.participant_id);
    }

    format!("{:x}", hasher.finalize())
}

impl DrawSeal {
    pub fn new(input: &SealInput<'_>, weight_hints_present: bool) -> Self {
        Self {
            digest: compute_digest(input),
            mode: input.mode,
            seed: input.seed.map(str::to_string),
            qualified_count: input.qualified_ids.len(),
            weight_hints_present,
            sealed_at: Utc::now(),
        }
    }
}

/// Recompute the digest and compare it with the stored seal
pub fn verify_seal(seal: &DrawSeal, input: &SealInput<'_>) -> bool {
    seal.mode == input.mode
        && seal.seed.as_deref() == input.seed
        && seal.qualified_count == input.qualified_ids.len()
        && seal.digest == compute_digest(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn winners(ids: &[&str]) -> Vec<WinnerRecord> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| WinnerRecord {
                participant_id: id.to_string(),
                rank: i as u32 + 1,
            })
            .collect()
    }

    #[test]
    fn test_digest_deterministic_and_sensitive() {
        let draw_id = Uuid::new_v4();
        let qualified: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        let w = winners(&["b", "a"]);
        let input = SealInput {
            draw_id,
            mode: SelectionMode::FisherYates,
            seed: Some("s1"),
            qualified_ids: &qualified,
            winners: &w,
        };
        let digest = compute_digest(&input);
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, compute_digest(&input));

        let swapped = winners(&["a", "b"]);
        let changed = SealInput { winners: &swapped, ..input };
        assert_ne!(digest, compute_digest(&changed));

        let reseeded = SealInput { seed: Some("s2"), winners: &w, ..changed };
        assert_ne!(digest, compute_digest(&reseeded));
    }

    #[test]
    fn test_length_prefix_prevents_boundary_shift() {
        let draw_id = Uuid::new_v4();
        let w = winners(&[]);
        let left: Vec<String> = vec!["ab".into(), "c".into()];
        let right: Vec<String> = vec!["a".into(), "bc".into()];
        let a = SealInput {
            draw_id,
            mode: SelectionMode::CryptoRandom,
            seed: None,
            qualified_ids: &left,
            winners: &w,
        };
        let b = SealInput { qualified_ids: &right, ..a };
        assert_ne!(compute_digest(&a), compute_digest(&b));
    }

    #[test]
    fn test_verify_seal() {
        let qualified: Vec<String> = vec!["x".into(), "y".into()];
        let w = winners(&["y"]);
        let input = SealInput {
            draw_id: Uuid::new_v4(),
            mode: SelectionMode::CryptoRandom,
            seed: None,
            qualified_ids: &qualified,
            winners: &w,
        };
        let seal = DrawSeal::new(&input, false);
        assert!(verify_seal(&seal, &input));

        let forged = winners(&["x"]);
        assert!(!verify_seal(&seal, &SealInput { winners: &forged, ..input }));
    }
}
