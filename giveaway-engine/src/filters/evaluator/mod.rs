//! Filter category evaluator
//!
//! Categories run in declaration order and the first failure wins:
//! participation → mentions → keywords → multiComment → profile → antiBot →
//! followVerification.
//!
//! Over a whole participant set the run has four phases:
//! 1. multiComment pre-pass over the set (barrier)
//! 2. follow verification pre-pass, only in `verified` follow mode
//! 3. per-entry predicates, chunked across a bounded worker pool
//! 4. sequential acceptance gate (similar usernames, linked accounts) in input order
//!
//! Participant records are only ever read.

mod anti_bot;
mod follow;
mod keywords;
mod mentions;
mod multi_comment;
mod participation;
mod profile;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::EvaluationConfig;
use crate::error::{EngineError, Result};
use crate::filters::config::{FilterConfiguration, FollowMode};
use crate::filters::registry::FilterCategory;
use crate::model::Participant;
use crate::random::RandomSource;
use crate::verification::{resolve_follows, FollowLedger, FollowerVerifier};

use anti_bot::AcceptanceGate;

/// Facts about the post being evaluated that are not on any participant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluationContext {
    /// Handle of the account that published the post
    pub post_author: Option<String>,
}

/// Verdict for one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum EvaluationOutcome {
    /// `weight` is the story bonus hint (1.0 when none applies)
    Qualified { weight: f64 },
    Excluded { category: FilterCategory, reason: String },
}

impl EvaluationOutcome {
    pub fn is_qualified(&self) -> bool {
        matches!(self, EvaluationOutcome::Qualified { .. })
    }

    pub fn category(&self) -> Option<FilterCategory> {
        match self {
            EvaluationOutcome::Qualified { .. } => None,
            EvaluationOutcome::Excluded { category, .. } => Some(*category),
        }
    }

    fn excluded(category: FilterCategory, reason: String) -> Self {
        EvaluationOutcome::Excluded { category, reason }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantVerdict {
    pub participant_id: String,
    #[serde(flatten)]
    pub outcome: EvaluationOutcome,
}

/// Verdicts for a participant set, index-aligned with the input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualificationReport {
    pub verdicts: Vec<ParticipantVerdict>,
}

impl QualificationReport {
    /// Qualified participant ids in input order
    pub fn qualified_ids(&self) -> Vec<String> {
        self.verdicts
            .iter()
            .filter(|v| v.outcome.is_qualified())
            .map(|v| v.participant_id.clone())
            .collect()
    }

    pub fn qualified_count(&self) -> usize {
        self.verdicts.iter().filter(|v| v.outcome.is_qualified()).count()
    }

    pub fn excluded_count(&self) -> usize {
        self.verdicts.len() - self.qualified_count()
    }

    pub fn exclusion_counts(&self) -> BTreeMap<FilterCategory, usize> {
        let mut counts = BTreeMap::new();
        for category in self.verdicts.iter().filter_map(|v| v.outcome.category()) {
            *counts.entry(category).or_insert(0) += 1;
        }
        counts
    }

    /// Any qualified entry carries a story bonus weight above 1
    pub fn weight_hints_present(&self) -> bool {
        self.verdicts
            .iter()
            .any(|v| matches!(v.outcome, EvaluationOutcome::Qualified { weight } if weight > 1.0))
    }
}

/// Result of the per-entry phase for one survivor of the pre-pass
struct EntryCheck {
    index: usize,
    handle: String,
    pre: Option<(FilterCategory, String)>,
    follow: Option<String>,
    weight: f64,
}

/// Per-entry predicates other than the sequential gate
fn check_entry(
    filters: &FilterConfiguration,
    participant: &Participant,
    ctx: &EvaluationContext,
    follows: &FollowLedger,
    index: usize,
) -> EntryCheck {
    let handle = participant.normalized_handle();
    let pre = participation::check(&filters.participation, participant)
        .map_err(|r| (FilterCategory::Participation, r))
        .and_then(|_| {
            mentions::check(&filters.mentions, participant, ctx).map_err(|r| (FilterCategory::Mentions, r))
        })
        .and_then(|_| keywords::check(&filters.keywords, participant).map_err(|r| (FilterCategory::Keywords, r)))
        .and_then(|_| profile::check(&filters.profile, participant).map_err(|r| (FilterCategory::Profile, r)))
        .and_then(|_| anti_bot::check_static(&filters.anti_bot, &handle).map_err(|r| (FilterCategory::AntiBot, r)))
        .err();
    let follow = follow::check(&filters.follow_verification, participant, follows).err();
    let weight = follow::weight(&filters.follow_verification, participant);

    EntryCheck {
        index,
        handle,
        pre,
        follow,
        weight,
    }
}

/// Evaluate one participant in isolation
///
/// The multiComment pre-pass and the acceptance gate compare entries with
/// each other, so they have nothing to act on here.
pub fn evaluate_participant(
    filters: &FilterConfiguration,
    participant: &Participant,
    ctx: &EvaluationContext,
    follows: &FollowLedger,
) -> EvaluationOutcome {
    let entry = check_entry(filters, participant, ctx, follows, 0);
    if let Some((category, reason)) = entry.pre {
        return EvaluationOutcome::excluded(category, reason);
    }
    if let Some(reason) = entry.follow {
        return EvaluationOutcome::excluded(FilterCategory::FollowVerification, reason);
    }
    EvaluationOutcome::Qualified { weight: entry.weight }
}

/// Set-level evaluator with a bounded worker pool
#[derive(Clone)]
pub struct Evaluator {
    config: EvaluationConfig,
    verifier: Option<Arc<dyn FollowerVerifier>>,
}

impl Evaluator {
    pub fn new(config: EvaluationConfig) -> Self {
        Self {
            config,
            verifier: None,
        }
    }

    /// Attach the follower-verification collaborator used in `verified` mode
    pub fn with_verifier(mut self, verifier: Arc<dyn FollowerVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Evaluate every participant against a snapshot of `filters`
    ///
    /// Fails only on an invalid configuration or cancellation. A cancelled run
    /// has no side effects to undo.
    pub async fn evaluate_all(
        &self,
        filters: &FilterConfiguration,
        participants: &[Participant],
        ctx: &EvaluationContext,
        rng: &mut RandomSource,
        cancel: Option<&CancellationToken>,
    ) -> Result<QualificationReport> {
        filters.validate()?;
        let is_cancelled = || cancel.map_or(false, CancellationToken::is_cancelled);

        let filters = Arc::new(filters.clone());
        let snapshot: Arc<[Participant]> = participants.to_vec().into();
        let ctx = Arc::new(ctx.clone());

        // Phase 1: set-level pre-pass, a barrier for everything after it
        let dedup = multi_comment::dedup(&filters.multi_comment, &snapshot, rng);
        if is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        // Phase 2: follow verification for the survivors
        let follows = Arc::new(self.resolve_follows(&filters, &snapshot, &dedup.kept).await);
        if is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        // Phase 3: per-entry predicates
        let chunk_size = self.config.chunk_size.max(1);
        let chunks: Vec<Vec<usize>> = dedup.kept.chunks(chunk_size).map(<[usize]>::to_vec).collect();
        let mut pending = stream::iter(chunks)
            .map(|chunk| {
                let filters = filters.clone();
                let snapshot = snapshot.clone();
                let ctx = ctx.clone();
                let follows = follows.clone();
                tokio::task::spawn_blocking(move || {
                    chunk
                        .into_iter()
                        .map(|i| check_entry(&filters, &snapshot[i], &ctx, &follows, i))
                        .collect::<Vec<EntryCheck>>()
                })
            })
            .buffer_unordered(self.config.worker_count.max(1));

        let mut checks: Vec<EntryCheck> = Vec::with_capacity(dedup.kept.len());
        while let Some(joined) = pending.next().await {
            let batch = joined.map_err(|e| EngineError::Internal(format!("evaluation worker failed: {}", e)))?;
            checks.extend(batch);
            if is_cancelled() {
                debug!(evaluated = checks.len(), "Evaluation cancelled between chunks");
                return Err(EngineError::Cancelled);
            }
        }
        checks.sort_unstable_by_key(|c| c.index);

        // Phase 4: sequential gate in input order
        let mut outcomes: Vec<Option<EvaluationOutcome>> = vec![None; snapshot.len()];
        for (index, reason) in dedup.dropped {
            outcomes[index] = Some(EvaluationOutcome::excluded(FilterCategory::MultiComment, reason));
        }

        let mut gate = AcceptanceGate::new(&filters.anti_bot);
        for check in checks {
            let outcome = if let Some((category, reason)) = check.pre {
                EvaluationOutcome::excluded(category, reason)
            } else if let Err(reason) = gate.admit(&check.handle) {
                EvaluationOutcome::excluded(FilterCategory::AntiBot, reason)
            } else if let Some(reason) = check.follow {
                EvaluationOutcome::excluded(FilterCategory::FollowVerification, reason)
            } else {
                gate.record(&check.handle);
                EvaluationOutcome::Qualified { weight: check.weight }
            };
            outcomes[check.index] = Some(outcome);
        }

        let verdicts = snapshot
            .iter()
            .zip(outcomes)
            .map(|(participant, outcome)| ParticipantVerdict {
                participant_id: participant.id.clone(),
                outcome: outcome.unwrap_or_else(|| {
                    EvaluationOutcome::excluded(FilterCategory::Participation, "not evaluated".to_string())
                }),
            })
            .collect();

        Ok(QualificationReport { verdicts })
    }

    async fn resolve_follows(
        &self,
        filters: &FilterConfiguration,
        participants: &[Participant],
        survivors: &[usize],
    ) -> FollowLedger {
        let required = &filters.follow_verification.required_follows;
        if required.mode != FollowMode::Verified || required.accounts.is_empty() {
            return FollowLedger::new();
        }
        let Some(verifier) = self.verifier.as_deref() else {
            warn!("Verified follow mode without a verifier; every follow resolves to unknown");
            return FollowLedger::new();
        };
        resolve_follows(
            verifier,
            survivors.iter().map(|&i| participants[i].handle.clone()),
            &required.accounts,
            self.config.verification_timeout(),
            self.config.verification_concurrency,
        )
        .await
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{participant, participant_at};
    use super::*;
    use crate::filters::config::{MultiCommentFilter, SimilarUsernames};
    use crate::verification::FollowStatus;
    use async_trait::async_trait;

    fn evaluator() -> Evaluator {
        Evaluator::new(EvaluationConfig {
            chunk_size: 3,
            worker_count: 2,
            ..EvaluationConfig::default()
        })
    }

    #[test]
    fn test_first_failing_category_reported() {
        let mut filters = FilterConfiguration::default();
        filters.mentions.min_mentions = 1;
        filters.keywords.required = vec!["win".into()];

        let mut p = participant("1", "alice");
        p.comment_text = None;
        let outcome = evaluate_participant(&filters, &p, &EvaluationContext::default(), &FollowLedger::new());
        assert_eq!(outcome.category(), Some(FilterCategory::Participation));

        p.comment_text = Some("hello".into());
        let outcome = evaluate_participant(&filters, &p, &EvaluationContext::default(), &FollowLedger::new());
        assert_eq!(outcome.category(), Some(FilterCategory::Mentions));
    }

    #[test]
    fn test_participant_not_mutated() {
        let mut filters = FilterConfiguration::default();
        filters.mentions.exclude_auto_mention = true;
        filters.mentions.min_mentions = 1;
        let p = participant("1", "alice");
        let before = p.clone();
        let _ = evaluate_participant(&filters, &p, &EvaluationContext::default(), &FollowLedger::new());
        assert_eq!(p, before);
    }

    #[tokio::test]
    async fn test_report_preserves_input_order() {
        let participants: Vec<Participant> = (0..10)
            .map(|i| {
                let mut p = participant(&format!("p{}", i), &format!("user{}", i));
                if i % 3 == 0 {
                    p.comment_text = None;
                }
                p
            })
            .collect();
        let report = evaluator()
            .evaluate_all(
                &FilterConfiguration::default(),
                &participants,
                &EvaluationContext::default(),
                &mut RandomSource::seeded("order"),
                None,
            )
            .await
            .unwrap();

        let ids: Vec<&str> = report.verdicts.iter().map(|v| v.participant_id.as_str()).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("p{}", i)).collect();
        assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(report.excluded_count(), 4);
        assert_eq!(report.exclusion_counts().get(&FilterCategory::Participation), Some(&4));
    }

    #[tokio::test]
    async fn test_multi_comment_drops_counted_as_excluded() {
        let participants = vec![
            participant_at("a1", "alice", 1),
            participant_at("a2", "alice", 2),
            participant_at("b1", "bob", 3),
        ];
        let mut filters = FilterConfiguration::default();
        filters.multi_comment = MultiCommentFilter {
            max_entries_per_user: Some(1),
            ..MultiCommentFilter::default()
        };
        let report = evaluator()
            .evaluate_all(&filters, &participants, &EvaluationContext::default(), &mut RandomSource::seeded("x"), None)
            .await
            .unwrap();
        assert_eq!(report.qualified_ids(), vec!["a1".to_string(), "b1".to_string()]);
        assert_eq!(report.verdicts[1].outcome.category(), Some(FilterCategory::MultiComment));
    }

    #[tokio::test]
    async fn test_similarity_compares_only_accepted_entries() {
        // "jonathan1" fails participation, so "jonathan2" is compared only with "jonathan"
        let mut excluded = participant_at("2", "jonathan1", 2);
        excluded.comment_text = None;
        let participants = vec![
            participant_at("1", "maria", 1),
            excluded,
            participant_at("3", "jonathan", 3),
            participant_at("4", "jonathan2", 4),
        ];
        let mut filters = FilterConfiguration::default();
        filters.anti_bot.exclude_similar_usernames = SimilarUsernames {
            enabled: true,
            threshold: 0.8,
            ..SimilarUsernames::default()
        };
        let report = evaluator()
            .evaluate_all(&filters, &participants, &EvaluationContext::default(), &mut RandomSource::seeded("x"), None)
            .await
            .unwrap();
        assert_eq!(report.qualified_ids(), vec!["1".to_string(), "3".to_string()]);
        assert_eq!(report.verdicts[3].outcome.category(), Some(FilterCategory::AntiBot));
    }

    #[tokio::test]
    async fn test_invalid_configuration_rejected_before_evaluation() {
        let mut filters = FilterConfiguration::default();
        filters.anti_bot.exclude_similar_usernames.threshold = 2.0;
        let result = evaluator()
            .evaluate_all(&filters, &[participant("1", "a")], &EvaluationContext::default(), &mut RandomSource::secure(), None)
            .await;
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_cancelled_run() {
        let token = CancellationToken::new();
        token.cancel();
        let participants: Vec<Participant> = (0..20).map(|i| participant(&i.to_string(), "h")).collect();
        let result = evaluator()
            .evaluate_all(
                &FilterConfiguration::default(),
                &participants,
                &EvaluationContext::default(),
                &mut RandomSource::secure(),
                Some(&token),
            )
            .await;
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    struct FansOnly;

    #[async_trait]
    impl FollowerVerifier for FansOnly {
        async fn verify(&self, handle: &str, _target: &str) -> Result<FollowStatus> {
            if handle.starts_with("fan") {
                Ok(FollowStatus::Following)
            } else {
                Err(EngineError::Verification("rate limited upstream".into()))
            }
        }
    }

    #[tokio::test]
    async fn test_verified_follows_use_collaborator() {
        let participants = vec![participant_at("1", "fan_one", 1), participant_at("2", "lurker", 2)];
        let mut filters = FilterConfiguration::default();
        filters.follow_verification.required_follows.accounts = vec!["@brand".into()];
        filters.follow_verification.required_follows.mode = FollowMode::Verified;

        let report = evaluator()
            .with_verifier(Arc::new(FansOnly))
            .evaluate_all(&filters, &participants, &EvaluationContext::default(), &mut RandomSource::secure(), None)
            .await
            .unwrap();
        assert_eq!(report.qualified_ids(), vec!["1".to_string()]);
        assert_eq!(
            report.verdicts[1].outcome.category(),
            Some(FilterCategory::FollowVerification)
        );
    }
}
