//! Filter registry: every leaf filter with its tier, capability and platform requirements
//!
//! The registry is data. Availability resolution walks this table rather than
//! scattering tier checks through callers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::{Capability, Platform, Tier};

/// The seven filter categories, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterCategory {
    Participation,
    Mentions,
    Keywords,
    MultiComment,
    Profile,
    AntiBot,
    FollowVerification,
}

impl FilterCategory {
    /// Declaration (and short-circuit) order
    pub const ORDER: [FilterCategory; 7] = [
        FilterCategory::Participation,
        FilterCategory::Mentions,
        FilterCategory::Keywords,
        FilterCategory::MultiComment,
        FilterCategory::Profile,
        FilterCategory::AntiBot,
        FilterCategory::FollowVerification,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterCategory::Participation => "participation",
            FilterCategory::Mentions => "mentions",
            FilterCategory::Keywords => "keywords",
            FilterCategory::MultiComment => "multiComment",
            FilterCategory::Profile => "profile",
            FilterCategory::AntiBot => "antiBot",
            FilterCategory::FollowVerification => "followVerification",
        }
    }
}

impl fmt::Display for FilterCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of leaf filter identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterId {
    RequireComment,
    ReplyHandling,
    DateRange,
    MinMentions,
    UniqueMentions,
    ExcludeAutoMention,
    RequiredMentions,
    RequiredKeywords,
    ForbiddenKeywords,
    MaxEntriesPerUser,
    RemoveDuplicateComments,
    RequireBio,
    RequireProfilePicture,
    MinAccountAge,
    MinPosts,
    MaxFollowings,
    BioForbiddenWords,
    MinFollowers,
    RequireVerified,
    SimilarUsernames,
    Blacklist,
    ExcludePatterns,
    LinkedAccounts,
    RequiredFollows,
    StoryBonus,
}

impl FilterId {
    pub fn as_str(self) -> &'static str {
        self.spec().name
    }

    /// Registry entry for this filter
    ///
    /// The registry lists filters in enum declaration order.
    pub fn spec(self) -> &'static FilterSpec {
        &FILTER_REGISTRY[self as usize]
    }

    pub fn category(self) -> FilterCategory {
        self.spec().category
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFilter(pub String);

impl FromStr for FilterId {
    type Err = UnknownFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FILTER_REGISTRY
            .iter()
            .find(|spec| spec.name == s)
            .map(|spec| spec.id)
            .ok_or_else(|| UnknownFilter(s.to_string()))
    }
}

/// One row of the registry
#[derive(Debug, Clone)]
pub struct FilterSpec {
    pub id: FilterId,
    pub name: &'static str,
    pub category: FilterCategory,
    /// Minimum tier required
    pub min_tier: Tier,
    /// Raw field the filter reads, if it reads one the source might lack
    pub capability: Option<Capability>,
    /// Platforms the filter works on; `None` means all
    pub platforms: Option<&'static [Platform]>,
}

const STORY_PLATFORMS: &[Platform] = &[Platform::Instagram, Platform::Facebook];

const FOLLOW_PLATFORMS: &[Platform] = &[
    Platform::Instagram,
    Platform::Tiktok,
    Platform::Facebook,
    Platform::Twitter,
    Platform::FileImport,
];

macro_rules! filter {
    ($id:ident, $name:literal, $cat:ident, $tier:ident, $cap:expr, $platforms:expr) => {
        FilterSpec {
            id: FilterId::$id,
            name: $name,
            category: FilterCategory::$cat,
            min_tier: Tier::$tier,
            capability: $cap,
            platforms: $platforms,
        }
    };
}

/// The complete filter registry, in category declaration order
pub static FILTER_REGISTRY: &[FilterSpec] = &[
    // --- participation ---
    filter!(RequireComment, "require_comment", Participation, Free, Some(Capability::CommentText), None),
    filter!(ReplyHandling, "reply_handling", Participation, Free, Some(Capability::ReplyFlag), None),
    filter!(DateRange, "date_range", Participation, Basic, Some(Capability::Timestamps), None),
    // --- mentions ---
    filter!(MinMentions, "min_mentions", Mentions, Free, Some(Capability::Mentions), None),
    filter!(UniqueMentions, "unique_mentions", Mentions, Free, Some(Capability::Mentions), None),
    filter!(ExcludeAutoMention, "exclude_auto_mention", Mentions, Basic, Some(Capability::Mentions), None),
    filter!(RequiredMentions, "required_mentions", Mentions, Basic, Some(Capability::Mentions), None),
    // --- keywords ---
    filter!(RequiredKeywords, "required_keywords", Keywords, Basic, Some(Capability::CommentText), None),
    filter!(ForbiddenKeywords, "forbidden_keywords", Keywords, Basic, Some(Capability::CommentText), None),
    // --- multiComment ---
    filter!(MaxEntriesPerUser, "max_entries_per_user", MultiComment, Free, None, None),
    filter!(RemoveDuplicateComments, "remove_duplicate_comments", MultiComment, Basic, Some(Capability::CommentText), None),
    // --- profile ---
    filter!(RequireBio, "require_bio", Profile, Premium, Some(Capability::ProfileBio), None),
    filter!(RequireProfilePicture, "require_profile_picture", Profile, Premium, Some(Capability::ProfilePicture), None),
    filter!(MinAccountAge, "min_account_age", Profile, Premium, Some(Capability::AccountAge), None),
    filter!(MinPosts, "min_posts", Profile, Premium, Some(Capability::PostCount), None),
    filter!(MaxFollowings, "max_followings", Profile, Premium, Some(Capability::FollowingCount), None),
    filter!(BioForbiddenWords, "bio_forbidden_words", Profile, Enterprise, Some(Capability::ProfileBio), None),
    filter!(MinFollowers, "min_followers", Profile, Premium, Some(Capability::FollowerCount), None),
    filter!(RequireVerified, "require_verified", Profile, Premium, Some(Capability::VerifiedFlag), None),
    // --- antiBot ---
    filter!(SimilarUsernames, "similar_usernames", AntiBot, Premium, None, None),
    filter!(Blacklist, "blacklist", AntiBot, Free, None, None),
    filter!(ExcludePatterns, "exclude_patterns", AntiBot, Premium, None, None),
    filter!(LinkedAccounts, "linked_accounts", AntiBot, Enterprise, None, None),
    // --- followVerification ---
    filter!(RequiredFollows, "required_follows", FollowVerification, Basic, None, Some(FOLLOW_PLATFORMS)),
    filter!(StoryBonus, "story_bonus", FollowVerification, Premium, Some(Capability::StoryViews), Some(STORY_PLATFORMS)),
];
