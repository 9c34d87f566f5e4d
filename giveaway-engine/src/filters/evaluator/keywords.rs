use crate::filters::config::{KeywordMode, KeywordsFilter};
use crate::model::Participant;

pub(super) fn check(filter: &KeywordsFilter, participant: &Participant) -> Result<(), String> {
    if filter.required.is_empty() && filter.forbidden.is_empty() {
        return Ok(());
    }

    let fold = |s: &str| {
        if filter.case_sensitive {
            s.to_string()
        } else {
            s.to_lowercase()
        }
    };
    let text = fold(participant.comment());
    let contains = |term: &String| text.contains(&fold(term.trim()));

    if !filter.required.is_empty() {
        let matched = match filter.required_mode {
            KeywordMode::Any => filter.required.iter().any(contains),
            KeywordMode::All => filter.required.iter().all(contains),
        };
        if !matched {
            return Err(match filter.required_mode {
                KeywordMode::Any => "none of the required keywords present".to_string(),
                KeywordMode::All => "not all required keywords present".to_string(),
            });
        }
    }

    if let Some(term) = filter.forbidden.iter().find(|t| contains(*t)) {
        return Err(format!("forbidden keyword '{}'", term.trim()));
    }

    Ok(())
}
