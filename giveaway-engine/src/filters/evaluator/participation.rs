use crate::filters::config::{ParticipationFilter, ReplyHandling};
use crate::model::Participant;

pub(super) fn check(filter: &ParticipationFilter, participant: &Participant) -> Result<(), String> {
    if filter.require_comment && participant.comment().is_empty() {
        return Err("comment required".to_string());
    }

    match filter.reply_handling {
        ReplyHandling::Include => {}
        ReplyHandling::Exclude if participant.is_reply => {
            return Err("replies excluded".to_string());
        }
        ReplyHandling::Only if !participant.is_reply => {
            return Err("only replies accepted".to_string());
        }
        _ => {}
    }

    if let Some(range) = &filter.date_range {
        if !range.contains(participant.posted_at) {
            return Err(format!("posted at {} outside date range", participant.posted_at));
        }
    }

    Ok(())
}
