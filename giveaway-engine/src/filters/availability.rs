//! Capability & tier resolver
//!
//! Check order per filter is fixed: tier, then capability, then platform.
//! A free user on an unsupported platform hears about the tier gate first.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::registry::{FilterId, FilterSpec, FILTER_REGISTRY};
use crate::model::{has_tier_access, CapabilityDescriptor, Tier};

/// Why a filter is not available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    TierRequired,
    CapabilityMissing,
    PlatformUnsupported,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UnavailableReason::TierRequired => "tier_required",
            UnavailableReason::CapabilityMissing => "capability_missing",
            UnavailableReason::PlatformUnsupported => "platform_unsupported",
        };
        f.write_str(label)
    }
}

/// Availability verdict for one filter identifier
///
/// Derived on demand; never cached across capability or tier changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterAvailability {
    pub filter_id: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<UnavailableReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_tier: Option<Tier>,
}

impl FilterAvailability {
    fn available(spec: &FilterSpec) -> Self {
        Self {
            filter_id: spec.name.to_string(),
            available: true,
            reason: None,
            required_tier: None,
        }
    }

    fn blocked(spec: &FilterSpec, reason: UnavailableReason) -> Self {
        Self {
            filter_id: spec.name.to_string(),
            available: false,
            reason: Some(reason),
            required_tier: (reason == UnavailableReason::TierRequired).then_some(spec.min_tier),
        }
    }
}

fn resolve_spec(spec: &FilterSpec, descriptor: &CapabilityDescriptor, tier: Tier) -> FilterAvailability {
    if !has_tier_access(tier, spec.min_tier) {
        return FilterAvailability::blocked(spec, UnavailableReason::TierRequired);
    }
    if let Some(capability) = spec.capability {
        if !descriptor.supports(capability) {
            return FilterAvailability::blocked(spec, UnavailableReason::CapabilityMissing);
        }
    }
    if let Some(platforms) = spec.platforms {
        if !platforms.contains(&descriptor.platform) {
            return FilterAvailability::blocked(spec, UnavailableReason::PlatformUnsupported);
        }
    }
    FilterAvailability::available(spec)
}

/// Resolve one filter by its string identifier
///
/// Unknown identifiers resolve to unavailable with no reason.
pub fn resolve_filter(filter_id: &str, descriptor: &CapabilityDescriptor, tier: Tier) -> FilterAvailability {
    match filter_id.parse::<FilterId>() {
        Ok(id) => resolve_spec(id.spec(), descriptor, tier),
        Err(_) => FilterAvailability {
            filter_id: filter_id.to_string(),
            available: false,
            reason: None,
            required_tier: None,
        },
    }
}

/// Resolve availability for every registered filter
pub fn resolve_availability(descriptor: &CapabilityDescriptor, tier: Tier) -> Vec<FilterAvailability> {
    let resolved: Vec<FilterAvailability> = FILTER_REGISTRY
        .iter()
        .map(|spec| resolve_spec(spec, descriptor, tier))
        .collect();

    debug!(
        platform = %descriptor.platform,
        tier = %tier,
        available = resolved.iter().filter(|a| a.available).count(),
        total = resolved.len(),
        "Resolved filter availability"
    );

    resolved
}
