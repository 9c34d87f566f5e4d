//! Qualification engine integration tests
//!
//! Availability resolution, per-category evaluation, the pre-scan guard and
//! preview, driven through the public API.

mod common;

use common::{crowd, exact, participant, participant_at};
use giveaway_engine::config::{EvaluationConfig, TierLimits};
use giveaway_engine::filters::config::{CommentSelection, KeywordMode};
use giveaway_engine::filters::{
    evaluate_participant, resolve_availability, resolve_filter, EvaluationContext, EvaluationOutcome, Evaluator,
    FilterCategory, FilterConfiguration, UnavailableReason,
};
use giveaway_engine::model::{has_tier_access, CapabilityDescriptor, Platform, Tier};
use giveaway_engine::prescan::{ExactCount, PreScanGuard, PreScanResult, SourceRef};
use giveaway_engine::preview::{PreviewEngine, PreviewOptions};
use giveaway_engine::random::RandomSource;
use giveaway_engine::verification::FollowLedger;
use giveaway_engine::EngineError;

fn evaluator() -> Evaluator {
    Evaluator::new(EvaluationConfig {
        worker_count: 3,
        chunk_size: 64,
        ..EvaluationConfig::default()
    })
}

// ============================================================================
// Capability & tier resolution
// ============================================================================

#[test]
fn test_tier_ordering() {
    assert!(has_tier_access(Tier::Premium, Tier::Basic));
    assert!(has_tier_access(Tier::Basic, Tier::Basic));
    assert!(!has_tier_access(Tier::Free, Tier::Basic));
    assert!(has_tier_access(Tier::Enterprise, Tier::Free));
}

#[test]
fn test_tier_gate_reported_before_platform_gate() {
    // story_bonus is premium-only and instagram/facebook-only
    let youtube = CapabilityDescriptor::for_platform(Platform::Youtube);
    let free = resolve_filter("story_bonus", &youtube, Tier::Free);
    assert!(!free.available);
    assert_eq!(free.reason, Some(UnavailableReason::TierRequired));
    assert_eq!(free.required_tier, Some(Tier::Premium));

    let premium = resolve_filter("story_bonus", &youtube, Tier::Premium);
    assert_eq!(premium.reason, Some(UnavailableReason::CapabilityMissing));
    assert_eq!(premium.required_tier, None);
}

#[test]
fn test_platform_gate_when_capability_present() {
    let youtube = CapabilityDescriptor::for_platform(Platform::Youtube);
    let verdict = resolve_filter("required_follows", &youtube, Tier::Enterprise);
    assert_eq!(verdict.reason, Some(UnavailableReason::PlatformUnsupported));
}

#[test]
fn test_availability_covers_every_filter() {
    let instagram = CapabilityDescriptor::for_platform(Platform::Instagram);
    let list = resolve_availability(&instagram, Tier::Enterprise);
    assert_eq!(list.len(), 25);
    let unavailable: Vec<&str> = list
        .iter()
        .filter(|a| !a.available)
        .map(|a| a.filter_id.as_str())
        .collect();
    // Instagram does not expose account age
    assert_eq!(unavailable, vec!["min_account_age"]);
}

// ============================================================================
// Category evaluation
// ============================================================================

#[tokio::test]
async fn test_default_participation_qualifies_everyone() {
    let participants = crowd(1000);
    let report = evaluator()
        .evaluate_all(
            &FilterConfiguration::default(),
            &participants,
            &EvaluationContext::default(),
            &mut RandomSource::secure(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(report.qualified_count(), 1000);
    assert_eq!(report.excluded_count(), 0);
    // Results come back in input order regardless of worker scheduling
    let ids: Vec<String> = participants.iter().map(|p| p.id.clone()).collect();
    assert_eq!(report.qualified_ids(), ids);
}

#[test]
fn test_min_mentions() {
    let mut filters = FilterConfiguration::default();
    filters.mentions.min_mentions = 2;
    let ctx = EvaluationContext::default();
    let follows = FollowLedger::new();

    let mut one = participant("1", "alice");
    one.mentions = vec!["@a".to_string()];
    let outcome = evaluate_participant(&filters, &one, &ctx, &follows);
    assert_eq!(outcome.category(), Some(FilterCategory::Mentions));

    let mut two = participant("2", "bob");
    two.mentions = vec!["@a".to_string(), "@b".to_string()];
    assert!(evaluate_participant(&filters, &two, &ctx, &follows).is_qualified());
}

#[test]
fn test_first_failing_category_is_reported() {
    let mut filters = FilterConfiguration::default();
    filters.mentions.min_mentions = 1;
    filters.keywords.required = vec!["giveaway".to_string()];
    filters.anti_bot.blacklist = vec!["spammer".to_string()];

    // Fails mentions, keywords and blacklist; only mentions is reported
    let p = participant("1", "@Spammer");
    let outcome = evaluate_participant(&filters, &p, &EvaluationContext::default(), &FollowLedger::new());
    match outcome {
        EvaluationOutcome::Excluded { category, .. } => assert_eq!(category, FilterCategory::Mentions),
        other => panic!("expected exclusion, got {:?}", other),
    }
}

#[test]
fn test_keywords_all_mode() {
    let mut filters = FilterConfiguration::default();
    filters.keywords.required = vec!["Love".to_string(), "win".to_string()];
    filters.keywords.required_mode = KeywordMode::All;
    let ctx = EvaluationContext::default();
    let follows = FollowLedger::new();

    let mut both = participant("1", "a");
    both.comment_text = Some("I would LOVE to WIN this".to_string());
    assert!(evaluate_participant(&filters, &both, &ctx, &follows).is_qualified());

    let mut one = participant("2", "b");
    one.comment_text = Some("love it".to_string());
    assert_eq!(
        evaluate_participant(&filters, &one, &ctx, &follows).category(),
        Some(FilterCategory::Keywords)
    );
}

#[test]
fn test_missing_profile_field_fails_closed() {
    let mut filters = FilterConfiguration::default();
    filters.profile.min_followers = Some(10);
    let p = participant("1", "quiet");
    let outcome = evaluate_participant(&filters, &p, &EvaluationContext::default(), &FollowLedger::new());
    assert_eq!(outcome.category(), Some(FilterCategory::Profile));
}

#[tokio::test]
async fn test_multi_comment_keeps_first_entry() {
    let mut filters = FilterConfiguration::default();
    filters.multi_comment.max_entries_per_user = Some(1);
    filters.multi_comment.comment_selection = CommentSelection::First;

    // Input order deliberately differs from posting order
    let participants = vec![
        participant_at("t3", "repeat", 30),
        participant_at("t1", "repeat", 10),
        participant_at("other", "someone", 20),
        participant_at("t2", "repeat", 20),
    ];
    let report = evaluator()
        .evaluate_all(
            &filters,
            &participants,
            &EvaluationContext::default(),
            &mut RandomSource::secure(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(report.qualified_ids(), vec!["t1".to_string(), "other".to_string()]);
    assert_eq!(report.exclusion_counts().get(&FilterCategory::MultiComment), Some(&2));
    assert_eq!(report.qualified_count() + report.excluded_count(), participants.len());
}

#[tokio::test]
async fn test_random_comment_selection_is_seed_deterministic() {
    let mut filters = FilterConfiguration::default();
    filters.multi_comment.max_entries_per_user = Some(1);
    filters.multi_comment.comment_selection = CommentSelection::Random;
    let participants: Vec<_> = (0..40)
        .map(|i| participant_at(&format!("e{}", i), &format!("user{}", i % 4), i))
        .collect();

    let mut runs = Vec::new();
    for _ in 0..2 {
        let report = evaluator()
            .evaluate_all(
                &filters,
                &participants,
                &EvaluationContext::default(),
                &mut RandomSource::seeded("spring-launch"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(report.qualified_count(), 4);
        runs.push(report.qualified_ids());
    }
    assert_eq!(runs[0], runs[1]);
}

#[tokio::test]
async fn test_similar_usernames_keep_the_earlier_handle() {
    let mut filters = FilterConfiguration::default();
    filters.anti_bot.exclude_similar_usernames.enabled = true;
    filters.anti_bot.exclude_similar_usernames.threshold = 0.8;

    let participants = vec![
        participant("1", "giveaway_hunter"),
        participant("2", "giveaway_hunter1"),
        participant("3", "completely_different"),
    ];
    let report = evaluator()
        .evaluate_all(
            &filters,
            &participants,
            &EvaluationContext::default(),
            &mut RandomSource::secure(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(report.qualified_ids(), vec!["1".to_string(), "3".to_string()]);
    assert_eq!(report.verdicts[1].outcome.category(), Some(FilterCategory::AntiBot));
}

#[tokio::test]
async fn test_malformed_configuration_rejected_before_evaluation() {
    let mut filters = FilterConfiguration::default();
    filters.anti_bot.exclude_similar_usernames.threshold = 1.5;
    let result = evaluator()
        .evaluate_all(
            &filters,
            &crowd(3),
            &EvaluationContext::default(),
            &mut RandomSource::secure(),
            None,
        )
        .await;
    assert!(matches!(result, Err(EngineError::Configuration(_))));
}

#[test]
fn test_negative_bound_in_json_is_configuration_error() {
    let result = FilterConfiguration::from_json(r#"{"mentions": {"minMentions": -1}}"#);
    assert!(matches!(result, Err(EngineError::Configuration(_))));
}

// ============================================================================
// Pre-scan guard
// ============================================================================

#[tokio::test]
async fn test_pre_scan_over_limit_requires_upgrade() {
    let limits = TierLimits::default();
    let guard = PreScanGuard::new(ExactCount(5000), limits);
    let source = SourceRef::Url("https://example.test/p/big".to_string());

    let result = guard.scan(&source, Tier::Free, None).await.unwrap();
    assert!(!result.within_limit);
    assert!(result.upgrade_required);
    assert_eq!(result.tier_limit, Some(1000));
    assert!(matches!(
        result.ensure_within_limit(),
        Err(EngineError::Capacity { total: 5000, limit: 1000 })
    ));

    // Same source, higher tier: same count, new verdict
    let premium = guard.scan(&source, Tier::Premium, None).await.unwrap();
    assert!(premium.within_limit);
}

#[test]
fn test_unlimited_tier_always_within_limit() {
    let result = PreScanResult::evaluate(SourceRef::File("rows.csv".to_string()), exact(u64::MAX), None);
    assert!(result.within_limit);
    assert!(!result.upgrade_required);
}

// ============================================================================
// Preview
// ============================================================================

#[tokio::test]
async fn test_preview_reports_per_category_counts() {
    let mut participants = crowd(20);
    for p in participants.iter_mut().take(5) {
        p.comment_text = None;
    }
    participants[10].handle = "banned_account".to_string();

    let mut filters = FilterConfiguration::default();
    filters.anti_bot.blacklist = vec!["@Banned_Account".to_string()];

    let engine = PreviewEngine::new(evaluator());
    let options = PreviewOptions {
        sample_excluded_limit: 3,
        max_participants: None,
        seed: Some("preview-seed".to_string()),
    };
    let result = engine
        .preview(None, &filters, &participants, &EvaluationContext::default(), &options, None)
        .await
        .unwrap();

    assert_eq!(result.total_participants, 20);
    assert_eq!(result.qualified, 14);
    assert_eq!(result.excluded, 6);
    assert_eq!(result.per_category_exclusion_counts.get(&FilterCategory::Participation), Some(&5));
    assert_eq!(result.per_category_exclusion_counts.get(&FilterCategory::AntiBot), Some(&1));
    assert_eq!(result.sample_excluded.len(), 3);
}

#[tokio::test]
async fn test_preview_honors_max_participants() {
    let engine = PreviewEngine::new(evaluator());
    let options = PreviewOptions {
        max_participants: Some(10),
        ..PreviewOptions::from_config(&EvaluationConfig::default())
    };
    let result = engine
        .preview(
            None,
            &FilterConfiguration::default(),
            &crowd(50),
            &EvaluationContext::default(),
            &options,
            None,
        )
        .await
        .unwrap();
    assert_eq!(result.total_participants, 10);
    assert_eq!(result.qualified, 10);
}
