use std::collections::HashSet;

use super::EvaluationContext;
use crate::filters::config::MentionsFilter;
use crate::model::{normalize_handle, Participant};

pub(super) fn check(
    filter: &MentionsFilter,
    participant: &Participant,
    ctx: &EvaluationContext,
) -> Result<(), String> {
    let mentions: Vec<String> = participant.mentions.iter().map(|m| normalize_handle(m)).collect();

    let author = ctx.post_author.as_deref().map(normalize_handle);
    let counted = mentions
        .iter()
        .filter(|m| !(filter.exclude_auto_mention && author.as_ref() == Some(*m)))
        .count();
    if counted < filter.min_mentions as usize {
        return Err(format!(
            "{} mentions, minimum {}",
            counted, filter.min_mentions
        ));
    }

    if filter.unique_mentions_only {
        let mut seen = HashSet::new();
        if let Some(dup) = mentions.iter().find(|m| !seen.insert(m.as_str())) {
            return Err(format!("duplicate mention @{}", dup));
        }
    }

    for required in &filter.required_mentions {
        let required = normalize_handle(required);
        if !mentions.contains(&required) {
            return Err(format!("missing required mention @{}", required));
        }
    }

    Ok(())
}
