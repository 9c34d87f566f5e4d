use crate::filters::config::{FollowMode, FollowVerificationFilter};
use crate::model::{normalize_handle, Participant};
use crate::verification::{FollowLedger, FollowStatus};

pub(super) fn check(
    filter: &FollowVerificationFilter,
    participant: &Participant,
    follows: &FollowLedger,
) -> Result<(), String> {
    let required = &filter.required_follows;
    if required.accounts.is_empty() {
        return Ok(());
    }

    let handle = participant.normalized_handle();
    for account in &required.accounts {
        let account = normalize_handle(account);
        match required.mode {
            FollowMode::Declarative => {
                let declared = participant
                    .declared_follows
                    .iter()
                    .any(|f| normalize_handle(f) == account);
                if !declared {
                    return Err(format!("does not follow @{}", account));
                }
            }
            FollowMode::Verified => match follows.status(&handle, &account) {
                FollowStatus::Following => {}
                FollowStatus::NotFollowing => return Err(format!("does not follow @{}", account)),
                FollowStatus::Unknown => return Err(format!("follow of @{} unverified", account)),
            },
        }
    }
    Ok(())
}

/// Story bonus selection weight hint
pub(super) fn weight(filter: &FollowVerificationFilter, participant: &Participant) -> f64 {
    let bonus = &filter.story_bonus;
    if bonus.enabled && participant.shared_story {
        bonus.multiplier
    } else {
        1.0
    }
}
