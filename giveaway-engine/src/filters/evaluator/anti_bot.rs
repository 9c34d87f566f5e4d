//! Anti-bot rules
//!
//! Blacklist and pattern rules look at one handle in isolation and run in the
//! parallel per-entry pass. Similar usernames and linked accounts compare an
//! entry against earlier accepted entrants, so they run in the sequential
//! [`AcceptanceGate`] pass in input order.

use std::collections::{HashMap, HashSet};

use crate::filters::config::{AntiBotFilter, SimilarityMode};
use crate::model::normalize_handle;

const STRICT_THRESHOLD_DELTA: f64 = 0.1;

pub(super) fn check_static(filter: &AntiBotFilter, handle: &str) -> Result<(), String> {
    if filter.blacklist.iter().any(|b| normalize_handle(b) == handle) {
        return Err(format!("@{} is blacklisted", handle));
    }
    if let Some(pattern) = filter
        .exclude_patterns
        .iter()
        .find(|p| pattern_matches(&p.trim().to_lowercase(), handle))
    {
        return Err(format!("@{} matches excluded pattern '{}'", handle, pattern.trim()));
    }
    Ok(())
}

/// Substring match, or whole-handle glob when the pattern has `*` or `?`
fn pattern_matches(pattern: &str, handle: &str) -> bool {
    if pattern.contains(&['*', '?'][..]) {
        let pattern: Vec<char> = pattern.chars().collect();
        let text: Vec<char> = handle.chars().collect();
        glob_match(&pattern, &text)
    } else {
        handle.contains(pattern)
    }
}

/// Iterative wildcard match with single-star backtracking
fn glob_match(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}

/// Handle form used for similarity comparison
fn comparison_form(handle: &str, mode: SimilarityMode) -> String {
    match mode {
        SimilarityMode::Standard => handle.to_string(),
        SimilarityMode::Strict => {
            let stripped: String = handle
                .chars()
                .filter(|c| !c.is_ascii_digit() && *c != '_' && *c != '.')
                .collect();
            if stripped.is_empty() {
                handle.to_string()
            } else {
                stripped
            }
        }
    }
}

/// Sequential admission over accepted entrants
pub(super) struct AcceptanceGate {
    similarity: Option<(f64, SimilarityMode)>,
    /// Distinct accepted handles with their comparison form
    accepted: Vec<(String, String)>,
    accepted_set: HashSet<String>,
    cluster_of: HashMap<String, usize>,
    /// Cluster index to the handle that claimed it
    claimed: HashMap<usize, String>,
}

impl AcceptanceGate {
    pub(super) fn new(filter: &AntiBotFilter) -> Self {
        let similar = &filter.exclude_similar_usernames;
        let similarity = similar.enabled.then(|| {
            let threshold = match similar.mode {
                SimilarityMode::Standard => similar.threshold,
                SimilarityMode::Strict => (similar.threshold - STRICT_THRESHOLD_DELTA).max(0.0),
            };
            (threshold, similar.mode)
        });

        let mut cluster_of = HashMap::new();
        for (index, cluster) in filter.linked_accounts.iter().enumerate() {
            for handle in cluster {
                cluster_of.entry(normalize_handle(handle)).or_insert(index);
            }
        }

        Self {
            similarity,
            accepted: Vec::new(),
            accepted_set: HashSet::new(),
            cluster_of,
            claimed: HashMap::new(),
        }
    }

    pub(super) fn admit(&self, handle: &str) -> Result<(), String> {
        if let Some(cluster) = self.cluster_of.get(handle) {
            if let Some(owner) = self.claimed.get(cluster) {
                if owner != handle {
                    return Err(format!("@{} linked to accepted account @{}", handle, owner));
                }
            }
        }

        if let Some((threshold, mode)) = self.similarity {
            let form = comparison_form(handle, mode);
            for (other, other_form) in &self.accepted {
                if other == handle {
                    continue;
                }
                let score = strsim::normalized_levenshtein(&form, other_form);
                if score >= threshold {
                    return Err(format!(
                        "@{} similar to accepted @{} ({:.2})",
                        handle, other, score
                    ));
                }
            }
        }

        Ok(())
    }

    pub(super) fn record(&mut self, handle: &str) {
        if let Some(cluster) = self.cluster_of.get(handle) {
            self.claimed.entry(*cluster).or_insert_with(|| handle.to_string());
        }
        if self.similarity.is_some() && self.accepted_set.insert(handle.to_string()) {
            let mode = self.similarity.map(|(_, m)| m).unwrap_or_default();
            self.accepted
                .push((handle.to_string(), comparison_form(handle, mode)));
        }
    }
}
