//! Filter configuration: seven independent categories of typed fields
//!
//! Absent numeric bounds mean "unlimited". Unsigned types keep bounds
//! non-negative; [`FilterConfiguration::validate`] covers the rest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::availability::FilterAvailability;
use super::registry::FilterId;
use crate::error::{EngineError, Result};

/// Complete filter configuration owned by a draw
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterConfiguration {
    pub participation: ParticipationFilter,
    pub mentions: MentionsFilter,
    pub keywords: KeywordsFilter,
    pub multi_comment: MultiCommentFilter,
    pub profile: ProfileFilter,
    pub anti_bot: AntiBotFilter,
    pub follow_verification: FollowVerificationFilter,
}

// ============================================================================
// Categories
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyHandling {
    #[default]
    Include,
    Exclude,
    Only,
}

/// Inclusive posting window; either end may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at <= e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParticipationFilter {
    pub require_comment: bool,
    pub reply_handling: ReplyHandling,
    pub date_range: Option<DateRange>,
}

impl Default for ParticipationFilter {
    fn default() -> Self {
        Self {
            require_comment: true,
            reply_handling: ReplyHandling::Include,
            date_range: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MentionsFilter {
    pub min_mentions: u32,
    pub unique_mentions_only: bool,
    pub exclude_auto_mention: bool,
    pub required_mentions: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordMode {
    #[default]
    Any,
    All,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeywordsFilter {
    pub required: Vec<String>,
    pub required_mode: KeywordMode,
    pub forbidden: Vec<String>,
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentSelection {
    #[default]
    First,
    Last,
    Random,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MultiCommentFilter {
    pub max_entries_per_user: Option<u32>,
    pub comment_selection: CommentSelection,
    pub allow_if_different_mentions: bool,
    pub remove_duplicate_comments: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileFilter {
    pub require_bio: bool,
    /// Minimum bio length in characters, only checked with `require_bio`
    pub min_length: Option<u32>,
    pub require_profile_picture: bool,
    /// Minimum account age in days
    pub min_account_age: Option<u32>,
    pub min_posts: Option<u64>,
    pub max_followings: Option<u64>,
    pub bio_forbidden_words: Vec<String>,
    pub min_followers: Option<u64>,
    pub require_verified: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMode {
    #[default]
    Standard,
    Strict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimilarUsernames {
    pub enabled: bool,
    /// Similarity in [0, 1] at or above which a handle is flagged
    pub threshold: f64,
    pub mode: SimilarityMode,
}

impl Default for SimilarUsernames {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 0.85,
            mode: SimilarityMode::Standard,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AntiBotFilter {
    pub exclude_similar_usernames: SimilarUsernames,
    /// Exact handle matches
    pub blacklist: Vec<String>,
    /// Substring or `*`/`?` glob patterns against the handle
    pub exclude_patterns: Vec<String>,
    /// Clusters of handles that count as one entrant
    pub linked_accounts: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowMode {
    /// Trust the entrant's self-reported follows
    #[default]
    Declarative,
    /// Ask the follower-verification collaborator
    Verified,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequiredFollows {
    pub accounts: Vec<String>,
    pub mode: FollowMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoryBonus {
    pub enabled: bool,
    pub multiplier: f64,
}

impl Default for StoryBonus {
    fn default() -> Self {
        Self {
            enabled: false,
            multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FollowVerificationFilter {
    pub required_follows: RequiredFollows,
    pub story_bonus: StoryBonus,
}

// ============================================================================
// Validation
// ============================================================================

fn invalid(msg: impl Into<String>) -> EngineError {
    EngineError::Configuration(msg.into())
}

fn check_entries(field: &str, entries: &[String]) -> Result<()> {
    if entries.iter().any(|e| e.trim().is_empty()) {
        return Err(invalid(format!("{}: blank entry", field)));
    }
    Ok(())
}

impl FilterConfiguration {
    /// Parse from JSON, mapping malformed values (negative bounds, wrong
    /// types) to a configuration error
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| invalid(format!("malformed filter configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject malformed values before any evaluation runs
    pub fn validate(&self) -> Result<()> {
        if let Some(range) = &self.participation.date_range {
            if let (Some(start), Some(end)) = (range.start, range.end) {
                if start > end {
                    return Err(invalid(format!(
                        "participation.dateRange: start {} after end {}",
                        start, end
                    )));
                }
            }
        }

        check_entries("mentions.requiredMentions", &self.mentions.required_mentions)?;
        check_entries("keywords.required", &self.keywords.required)?;
        check_entries("keywords.forbidden", &self.keywords.forbidden)?;

        if self.multi_comment.max_entries_per_user == Some(0) {
            return Err(invalid("multiComment.maxEntriesPerUser: must be at least 1"));
        }

        check_entries("profile.bioForbiddenWords", &self.profile.bio_forbidden_words)?;

        let similar = &self.anti_bot.exclude_similar_usernames;
        if !similar.threshold.is_finite() || !(0.0..=1.0).contains(&similar.threshold) {
            return Err(invalid(format!(
                "antiBot.excludeSimilarUsernames.threshold: value {} out of range [0.0, 1.0]",
                similar.threshold
            )));
        }
        check_entries("antiBot.blacklist", &self.anti_bot.blacklist)?;
        check_entries("antiBot.excludePatterns", &self.anti_bot.exclude_patterns)?;
        for cluster in &self.anti_bot.linked_accounts {
            if cluster.len() < 2 {
                return Err(invalid("antiBot.linkedAccounts: each cluster needs at least 2 handles"));
            }
            check_entries("antiBot.linkedAccounts", cluster)?;
        }

        check_entries(
            "followVerification.requiredFollows.accounts",
            &self.follow_verification.required_follows.accounts,
        )?;
        let multiplier = self.follow_verification.story_bonus.multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(invalid(format!(
                "followVerification.storyBonus.multiplier: value {} must be >= 1",
                multiplier
            )));
        }

        Ok(())
    }

    /// Leaf filters this configuration switches on, in registry order
    pub fn active_filters(&self) -> Vec<FilterId> {
        let p = &self.participation;
        let m = &self.mentions;
        let k = &self.keywords;
        let mc = &self.multi_comment;
        let pr = &self.profile;
        let ab = &self.anti_bot;
        let fv = &self.follow_verification;

        [
            (FilterId::RequireComment, p.require_comment),
            (FilterId::ReplyHandling, p.reply_handling != ReplyHandling::Include),
            (FilterId::DateRange, p.date_range.is_some()),
            (FilterId::MinMentions, m.min_mentions > 0),
            (FilterId::UniqueMentions, m.unique_mentions_only),
            (FilterId::ExcludeAutoMention, m.exclude_auto_mention),
            (FilterId::RequiredMentions, !m.required_mentions.is_empty()),
            (FilterId::RequiredKeywords, !k.required.is_empty()),
            (FilterId::ForbiddenKeywords, !k.forbidden.is_empty()),
            (FilterId::MaxEntriesPerUser, mc.max_entries_per_user.is_some()),
            (FilterId::RemoveDuplicateComments, mc.remove_duplicate_comments),
            (FilterId::RequireBio, pr.require_bio),
            (FilterId::RequireProfilePicture, pr.require_profile_picture),
            (FilterId::MinAccountAge, pr.min_account_age.is_some()),
            (FilterId::MinPosts, pr.min_posts.is_some()),
            (FilterId::MaxFollowings, pr.max_followings.is_some()),
            (FilterId::BioForbiddenWords, !pr.bio_forbidden_words.is_empty()),
            (FilterId::MinFollowers, pr.min_followers.is_some()),
            (FilterId::RequireVerified, pr.require_verified),
            (FilterId::SimilarUsernames, ab.exclude_similar_usernames.enabled),
            (FilterId::Blacklist, !ab.blacklist.is_empty()),
            (FilterId::ExcludePatterns, !ab.exclude_patterns.is_empty()),
            (FilterId::LinkedAccounts, !ab.linked_accounts.is_empty()),
            (FilterId::RequiredFollows, !fv.required_follows.accounts.is_empty()),
            (FilterId::StoryBonus, fv.story_bonus.enabled),
        ]
        .into_iter()
        .filter_map(|(id, active)| active.then_some(id))
        .collect()
    }

    /// Reject a configuration that switches on a filter the caller cannot use
    pub fn ensure_available(&self, availability: &[FilterAvailability]) -> Result<()> {
        for id in self.active_filters() {
            let verdict = availability.iter().find(|a| a.filter_id == id.as_str());
            match verdict {
                Some(v) if v.available => {}
                Some(v) => {
                    let reason = v
                        .reason
                        .map(|r| r.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    return Err(invalid(format!("filter {} unavailable: {}", id, reason)));
                }
                None => return Err(invalid(format!("filter {} unavailable: unknown", id))),
            }
        }
        Ok(())
    }
}
