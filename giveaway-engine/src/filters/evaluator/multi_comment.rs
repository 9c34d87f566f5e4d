//! Multi-comment pre-pass
//!
//! Operates on the whole set and must finish before any per-entry predicate
//! runs. Groups are visited in order of first appearance so a seeded random
//! source yields the same survivors every time.

use std::collections::{BTreeSet, HashMap};

use crate::filters::config::{CommentSelection, MultiCommentFilter};
use crate::model::{normalize_handle, Participant};
use crate::random::RandomSource;

/// Indices (into the input slice) kept and dropped by the pre-pass
pub(super) struct DedupOutcome {
    /// Ascending input order
    pub kept: Vec<usize>,
    pub dropped: Vec<(usize, String)>,
}

type GroupKey = (String, Option<BTreeSet<String>>);

/// Bucket indices by key, preserving first-appearance order of keys
fn group_by<K, F>(indices: &[usize], mut key: F) -> Vec<Vec<usize>>
where
    K: std::hash::Hash + Eq,
    F: FnMut(usize) -> K,
{
    let mut slots: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for &index in indices {
        let slot = *slots.entry(key(index)).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(index);
    }
    groups
}

pub(super) fn dedup(
    filter: &MultiCommentFilter,
    participants: &[Participant],
    rng: &mut RandomSource,
) -> DedupOutcome {
    let handles: Vec<String> = participants.iter().map(Participant::normalized_handle).collect();
    let mut kept: Vec<usize> = (0..participants.len()).collect();
    let mut dropped = Vec::new();

    if filter.remove_duplicate_comments {
        let mut survivors = Vec::with_capacity(kept.len());
        let groups = group_by(&kept, |i| {
            let text = participants[i].comment_text.as_deref().unwrap_or("");
            // Empty comments are never treated as duplicates of each other
            let text_key = if text.trim().is_empty() {
                format!("\u{0}{}", i)
            } else {
                text.to_string()
            };
            (handles[i].clone(), text_key)
        });
        for group in groups {
            let earliest = earliest(&group, participants);
            for index in group {
                if index == earliest {
                    survivors.push(index);
                } else {
                    dropped.push((index, "duplicate comment".to_string()));
                }
            }
        }
        survivors.sort_unstable();
        kept = survivors;
    }

    if let Some(cap) = filter.max_entries_per_user {
        let cap = cap as usize;
        let mut survivors = Vec::with_capacity(kept.len());
        let groups = group_by(&kept, |i| -> GroupKey {
            let mentions = filter.allow_if_different_mentions.then(|| {
                participants[i]
                    .mentions
                    .iter()
                    .map(|m| normalize_handle(m))
                    .collect::<BTreeSet<String>>()
            });
            (handles[i].clone(), mentions)
        });
        for group in groups {
            if group.len() <= cap {
                survivors.extend(group);
                continue;
            }
            let chosen = choose(&group, cap, filter.comment_selection, participants, rng);
            for index in group {
                if chosen.contains(&index) {
                    survivors.push(index);
                } else {
                    dropped.push((index, format!("exceeds {} entries per user", cap)));
                }
            }
        }
        survivors.sort_unstable();
        kept = survivors;
    }

    dropped.sort_unstable_by_key(|(index, _)| *index);
    DedupOutcome { kept, dropped }
}

fn earliest(group: &[usize], participants: &[Participant]) -> usize {
    group
        .iter()
        .copied()
        .min_by_key(|&i| (participants[i].posted_at, i))
        .unwrap_or(group[0])
}

/// Pick `cap` members of `group` according to the selection mode
fn choose(
    group: &[usize],
    cap: usize,
    selection: CommentSelection,
    participants: &[Participant],
    rng: &mut RandomSource,
) -> Vec<usize> {
    let mut ordered = group.to_vec();
    match selection {
        CommentSelection::First => {
            ordered.sort_by_key(|&i| (participants[i].posted_at, i));
        }
        CommentSelection::Last => {
            ordered.sort_by_key(|&i| (std::cmp::Reverse(participants[i].posted_at), i));
        }
        CommentSelection::Random => {
            for i in 0..cap.min(ordered.len()) {
                let j = i + rng.uniform_index(ordered.len() - i);
                ordered.swap(i, j);
            }
        }
    }
    ordered.truncate(cap);
    ordered
}
