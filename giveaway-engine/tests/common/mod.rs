//! Shared builders for integration tests

#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use giveaway_engine::config::TierLimits;
use giveaway_engine::model::{Draw, Participant, Platform, Profile, Tier};
use giveaway_engine::prescan::{PreScanResult, SourceRef, VolumeEstimate};
use giveaway_engine::{FilterConfiguration, SelectionRequest};
use std::collections::BTreeSet;

/// Participant commenting `minutes` after 2026-03-01 12:00 UTC
pub fn participant_at(id: &str, handle: &str, minutes: i64) -> Participant {
    let base = Utc
        .with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .expect("valid base timestamp");
    Participant {
        id: id.to_string(),
        handle: handle.to_string(),
        comment_text: Some(format!("count me in! ({})", id)),
        mentions: Vec::new(),
        is_reply: false,
        posted_at: base + Duration::minutes(minutes),
        profile: Profile::default(),
        declared_follows: BTreeSet::new(),
        shared_story: false,
        source_platform: Platform::Instagram,
    }
}

pub fn participant(id: &str, handle: &str) -> Participant {
    participant_at(id, handle, 0)
}

/// `count` distinct entrants `p0..`, handles `entrant_0..`
pub fn crowd(count: usize) -> Vec<Participant> {
    (0..count)
        .map(|i| participant_at(&format!("p{}", i), &format!("entrant_{}", i), (i % 600) as i64))
        .collect()
}

pub fn exact(total: u64) -> VolumeEstimate {
    VolumeEstimate {
        total_candidates: total,
        is_estimate: false,
        has_more: false,
    }
}

/// Draw taken through configure, pre-scan and import to READY
pub fn ready_draw(
    participants: Vec<Participant>,
    filters: FilterConfiguration,
    selection: SelectionRequest,
    limits: &TierLimits,
) -> Draw {
    let tier = Tier::Premium;
    let mut draw = Draw::new("owner-1", tier, Platform::Instagram);
    draw.configure(filters).expect("configure");
    draw.set_selection(selection).expect("selection");

    let source = SourceRef::Url("https://example.test/p/launch".to_string());
    draw.set_source(source.clone()).expect("source");
    let scan = PreScanResult::evaluate(source, exact(participants.len() as u64), limits.limit_for(tier));
    draw.record_pre_scan(scan).expect("pre-scan");
    draw.import_participants(participants, limits).expect("import");
    draw.mark_ready(limits).expect("ready");
    draw
}
