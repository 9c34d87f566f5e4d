//! Data model: tiers, platforms, participants and draws

pub mod capability;
pub mod draw;
pub mod participant;
pub mod tier;

pub use capability::{Capability, CapabilityDescriptor, Platform};
pub use draw::{Draw, WinnerRecord};
pub use giveaway_common::events::DrawStatus;
pub use participant::{normalize_handle, Participant, ParticipantSummary, Profile};
pub use tier::{has_tier_access, Tier};
