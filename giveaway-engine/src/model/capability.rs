//! Source platforms and capability descriptors
//!
//! A capability descriptor is pure data: which raw fields a source can supply.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Where participants were imported from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Instagram,
    Tiktok,
    Facebook,
    Youtube,
    Twitter,
    FileImport,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::Instagram,
        Platform::Tiktok,
        Platform::Facebook,
        Platform::Youtube,
        Platform::Twitter,
        Platform::FileImport,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
            Platform::Facebook => "facebook",
            Platform::Youtube => "youtube",
            Platform::Twitter => "twitter",
            Platform::FileImport => "file_import",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::Configuration(format!("unknown platform '{}'", s)))
    }
}

/// A raw field a source may or may not supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    CommentText,
    Mentions,
    ReplyFlag,
    Timestamps,
    ProfileBio,
    ProfilePicture,
    AccountAge,
    PostCount,
    FollowingCount,
    FollowerCount,
    VerifiedFlag,
    FollowGraph,
    StoryViews,
}

/// Which raw fields a source can supply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub platform: Platform,
    pub capabilities: BTreeSet<Capability>,
}

impl CapabilityDescriptor {
    pub fn new(platform: Platform, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            platform,
            capabilities: capabilities.into_iter().collect(),
        }
    }

    /// Built-in descriptor for what each platform integration normally supplies
    pub fn for_platform(platform: Platform) -> Self {
        use Capability::*;
        let caps: &[Capability] = match platform {
            Platform::Instagram => &[
                CommentText, Mentions, ReplyFlag, Timestamps, ProfileBio, ProfilePicture,
                PostCount, FollowingCount, FollowerCount, VerifiedFlag, FollowGraph, StoryViews,
            ],
            Platform::Tiktok => &[
                CommentText, Mentions, ReplyFlag, Timestamps, ProfileBio, ProfilePicture,
                FollowingCount, FollowerCount, VerifiedFlag, FollowGraph,
            ],
            Platform::Facebook => &[
                CommentText, Mentions, ReplyFlag, Timestamps, ProfilePicture, StoryViews,
            ],
            Platform::Youtube => &[
                CommentText, ReplyFlag, Timestamps, ProfilePicture, AccountAge, FollowerCount,
                VerifiedFlag,
            ],
            Platform::Twitter => &[
                CommentText, Mentions, ReplyFlag, Timestamps, ProfileBio, ProfilePicture,
                AccountAge, PostCount, FollowingCount, FollowerCount, VerifiedFlag, FollowGraph,
            ],
            Platform::FileImport => &[CommentText, Mentions, Timestamps],
        };
        Self::new(platform, caps.iter().copied())
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}
