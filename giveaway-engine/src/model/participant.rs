//! Normalized participant records
//!
//! Participants arrive from the ingestion collaborator already normalized.
//! The engine only ever reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::capability::Platform;

/// Profile facts the source may or may not supply
///
/// `None` means the source did not provide the field. Active profile rules
/// treat `None` as a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub has_profile_picture: Option<bool>,
    #[serde(default)]
    pub account_age_days: Option<u32>,
    #[serde(default)]
    pub post_count: Option<u64>,
    #[serde(default)]
    pub following_count: Option<u64>,
    #[serde(default)]
    pub follower_count: Option<u64>,
    #[serde(default)]
    pub verified: Option<bool>,
}

/// One normalized entry (a comment, like, or file row)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub handle: String,
    #[serde(default)]
    pub comment_text: Option<String>,
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default)]
    pub is_reply: bool,
    pub posted_at: DateTime<Utc>,
    #[serde(default)]
    pub profile: Profile,
    /// Accounts the entrant claims to follow (declarative verification)
    #[serde(default)]
    pub declared_follows: BTreeSet<String>,
    /// Entrant shared the post to their story (story bonus weight)
    #[serde(default)]
    pub shared_story: bool,
    pub source_platform: Platform,
}

impl Participant {
    /// Comment text, treating absent and whitespace-only as empty
    pub fn comment(&self) -> &str {
        self.comment_text.as_deref().map(str::trim).unwrap_or("")
    }

    /// Handle in comparison form
    pub fn normalized_handle(&self) -> String {
        normalize_handle(&self.handle)
    }
}

/// Lowercase, trimmed, leading `@` removed
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}

/// Short summary used in preview samples
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub id: String,
    pub handle: String,
    pub comment_excerpt: Option<String>,
    pub posted_at: DateTime<Utc>,
}

const EXCERPT_CHARS: usize = 80;

impl From<&Participant> for ParticipantSummary {
    fn from(p: &Participant) -> Self {
        let comment_excerpt = p
            .comment_text
            .as_ref()
            .map(|c| c.chars().take(EXCERPT_CHARS).collect());
        Self {
            id: p.id.clone(),
            handle: p.handle.clone(),
            comment_excerpt,
            posted_at: p.posted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_handle() {
        assert_eq!(normalize_handle("  @Alice_01 "), "alice_01");
        assert_eq!(normalize_handle("bob"), "bob");
    }

    #[test]
    fn test_deserialize_minimal_participant() {
        let json = r#"{
            "id": "c1",
            "handle": "@alice",
            "postedAt": "2026-01-01T10:00:00Z",
            "sourcePlatform": "instagram"
        }"#;
        let p: Participant = serde_json::from_str(json).unwrap();
        assert_eq!(p.comment(), "");
        assert!(p.mentions.is_empty());
        assert_eq!(p.profile, Profile::default());
        assert_eq!(p.source_platform, Platform::Instagram);
    }

    #[test]
    fn test_summary_truncates_comment() {
        let p = Participant {
            id: "1".into(),
            handle: "h".into(),
            comment_text: Some("x".repeat(200)),
            mentions: vec![],
            is_reply: false,
            posted_at: Utc::now(),
            profile: Profile::default(),
            declared_follows: BTreeSet::new(),
            shared_story: false,
            source_platform: Platform::Tiktok,
        };
        let summary = ParticipantSummary::from(&p);
        assert_eq!(summary.comment_excerpt.unwrap().len(), EXCERPT_CHARS);
    }
}
