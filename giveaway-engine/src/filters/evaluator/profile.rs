//! Profile predicates
//!
//! Every active rule fails closed: a field the source did not supply cannot
//! be verified, so the entrant does not qualify.

use crate::filters::config::ProfileFilter;
use crate::model::{Participant, Profile};

fn unknown(field: &str) -> String {
    format!("{} unavailable", field)
}

pub(super) fn check(filter: &ProfileFilter, participant: &Participant) -> Result<(), String> {
    let profile: &Profile = &participant.profile;

    if filter.require_bio {
        let bio = profile.bio.as_deref().map(str::trim).unwrap_or("");
        if bio.is_empty() {
            return Err("bio required".to_string());
        }
        if let Some(min) = filter.min_length {
            let len = bio.chars().count();
            if len < min as usize {
                return Err(format!("bio {} chars, minimum {}", len, min));
            }
        }
    }

    if filter.require_profile_picture {
        match profile.has_profile_picture {
            Some(true) => {}
            Some(false) => return Err("profile picture required".to_string()),
            None => return Err(unknown("profile picture")),
        }
    }

    if let Some(min) = filter.min_account_age {
        match profile.account_age_days {
            Some(days) if days >= min => {}
            Some(days) => return Err(format!("account {} days old, minimum {}", days, min)),
            None => return Err(unknown("account age")),
        }
    }

    if let Some(min) = filter.min_posts {
        match profile.post_count {
            Some(posts) if posts >= min => {}
            Some(posts) => return Err(format!("{} posts, minimum {}", posts, min)),
            None => return Err(unknown("post count")),
        }
    }

    if let Some(max) = filter.max_followings {
        match profile.following_count {
            Some(following) if following <= max => {}
            Some(following) => return Err(format!("following {}, maximum {}", following, max)),
            None => return Err(unknown("following count")),
        }
    }

    if !filter.bio_forbidden_words.is_empty() {
        let Some(bio) = profile.bio.as_deref() else {
            return Err(unknown("bio"));
        };
        let bio = bio.to_lowercase();
        if let Some(word) = filter
            .bio_forbidden_words
            .iter()
            .find(|w| bio.contains(&w.trim().to_lowercase()))
        {
            return Err(format!("bio contains forbidden word '{}'", word.trim()));
        }
    }

    if let Some(min) = filter.min_followers {
        match profile.follower_count {
            Some(followers) if followers >= min => {}
            Some(followers) => return Err(format!("{} followers, minimum {}", followers, min)),
            None => return Err(unknown("follower count")),
        }
    }

    if filter.require_verified {
        match profile.verified {
            Some(true) => {}
            Some(false) => return Err("verified account required".to_string()),
            None => return Err(unknown("verified flag")),
        }
    }

    Ok(())
}
