//! The ordered matchers the engine tries for each transaction.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fincat_core::{Catalog, CategoryRef, Source, ValidatedRequest};
use tokio::sync::Semaphore;

use crate::ai::{AiBackend, AiError, AiPrompt};
use crate::cache::CandidateCache;
use crate::pattern::PatternMatcher;
use crate::rules::RuleMatcher;
use crate::store::ClassificationStore;
use crate::transfer::TransferDetector;

/// Everything loaded once per organization and shared by its transactions.
pub struct OrgContext {
    pub organization_id: Option<String>,
    pub rules: RuleMatcher,
    pub transfers: TransferDetector,
    pub catalog: Catalog,
}

pub struct MatchContext<'a> {
    pub request: &'a ValidatedRequest,
    pub normalized: &'a str,
    pub org: &'a OrgContext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyMatch {
    pub category: CategoryRef,
    pub cost_center: Option<CategoryRef>,
    pub score: f32,
    /// What matched, in words: the rule pattern, the historical description, the model's rationale.
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Matched(StrategyMatch),
    NoMatch(String),
    Failed(String),
}

#[async_trait]
pub trait Strategy: Send + Sync {
    fn source(&self) -> Source;

    async fn attempt(&self, ctx: &MatchContext<'_>) -> StrategyOutcome;
}

pub struct RuleStrategy;

#[async_trait]
impl Strategy for RuleStrategy {
    fn source(&self) -> Source {
        Source::Rule
    }

    async fn attempt(&self, ctx: &MatchContext<'_>) -> StrategyOutcome {
        if ctx.org.organization_id.is_none() {
            return StrategyOutcome::NoMatch("rules: no organization".to_string());
        }
        match ctx.org.rules.best_match(ctx.normalized, ctx.request) {
            Some(m) => StrategyOutcome::Matched(StrategyMatch {
                category: m.rule.category.clone(),
                cost_center: m.rule.cost_center.clone(),
                score: m.score,
                detail: format!("rule '{}' ({})", m.rule.pattern, m.rule.match_type),
            }),
            None => StrategyOutcome::NoMatch(format!(
                "rules: none of {} matched",
                ctx.org.rules.len()
            )),
        }
    }
}

/// History is fetched only when this strategy actually runs.
pub struct PatternStrategy {
    store: Arc<dyn ClassificationStore>,
    cache: Arc<CandidateCache>,
    matcher: PatternMatcher,
}

impl PatternStrategy {
    pub fn new(
        store: Arc<dyn ClassificationStore>,
        cache: Arc<CandidateCache>,
        matcher: PatternMatcher,
    ) -> Self {
        Self {
            store,
            cache,
            matcher,
        }
    }
}

#[async_trait]
impl Strategy for PatternStrategy {
    fn source(&self) -> Source {
        Source::Pattern
    }

    async fn attempt(&self, ctx: &MatchContext<'_>) -> StrategyOutcome {
        let Some(org) = ctx.org.organization_id.as_deref() else {
            return StrategyOutcome::NoMatch("history: no organization".to_string());
        };
        let index = match self
            .cache
            .get_or_load(org, || self.store.categorized_history(org))
            .await
        {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!(organization_id = org, "history read failed: {e}");
                return StrategyOutcome::Failed(format!("history unavailable ({e})"));
            }
        };

        match self.matcher.best_match(ctx.normalized, ctx.request, &index) {
            Some(m) => StrategyOutcome::Matched(StrategyMatch {
                category: m.category,
                cost_center: m.cost_center,
                score: m.score,
                detail: format!(
                    "history \"{}\" ({} similar)",
                    m.matched_description, m.support
                ),
            }),
            None => StrategyOutcome::NoMatch(format!(
                "history: no similar transaction among {}",
                index.len()
            )),
        }
    }
}

/// Model fallback. Calls share one semaphore and each has its own deadline.
pub struct AiStrategy {
    backend: Arc<dyn AiBackend>,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl AiStrategy {
    pub fn new(backend: Arc<dyn AiBackend>, max_concurrency: usize, timeout: Duration) -> Self {
        Self {
            backend,
            permits: Arc::new(Semaphore::new(max_concurrency)),
            timeout,
        }
    }

    async fn ask(&self, ctx: &MatchContext<'_>) -> Result<StrategyMatch, AiError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        let prompt = AiPrompt {
            description: &ctx.request.description,
            amount: ctx.request.amount,
            transaction_type: ctx.request.transaction_type,
            catalog: &ctx.org.catalog,
        };
        let suggestion = tokio::time::timeout(self.timeout, self.backend.suggest(&prompt))
            .await
            .map_err(|_| AiError::Timeout(self.timeout.as_millis() as u64))??;
        let catalog = ctx.org.organization_id.is_some().then_some(&ctx.org.catalog);
        let resolved = suggestion.resolve(catalog)?;

        Ok(StrategyMatch {
            category: resolved.category,
            cost_center: resolved.cost_center,
            score: resolved.confidence,
            detail: format!("AI ({}): {}", self.backend.id(), resolved.reasoning),
        })
    }
}

#[async_trait]
impl Strategy for AiStrategy {
    fn source(&self) -> Source {
        Source::Ai
    }

    async fn attempt(&self, ctx: &MatchContext<'_>) -> StrategyOutcome {
        match self.ask(ctx).await {
            Ok(m) => StrategyOutcome::Matched(m),
            Err(e) => {
                tracing::warn!(
                    backend = self.backend.id(),
                    organization_id = ?ctx.org.organization_id,
                    "AI fallback failed: {e}"
                );
                StrategyOutcome::Failed(format!("AI fallback failed: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockAiBackend;
    use crate::normalize::normalize;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use fincat_core::{
        HistoricalPattern, Money, PatternConfig, TransactionType, TransferConfig,
    };

    fn request(desc: &str) -> ValidatedRequest {
        ValidatedRequest {
            transaction_id: None,
            description: desc.to_string(),
            amount: Money::from_cents(2350),
            transaction_type: TransactionType::Expense,
            organization_id: Some("org".to_string()),
        }
    }

    fn org(catalog: Catalog) -> OrgContext {
        OrgContext {
            organization_id: Some("org".to_string()),
            rules: RuleMatcher::new(vec![], 0.8),
            transfers: TransferDetector::new(vec![], &TransferConfig::default()),
            catalog,
        }
    }

    async fn run(strategy: &dyn Strategy, org: &OrgContext, desc: &str) -> StrategyOutcome {
        let req = request(desc);
        let normalized = normalize(desc);
        strategy
            .attempt(&MatchContext {
                request: &req,
                normalized: &normalized,
                org,
            })
            .await
    }

    #[tokio::test]
    async fn pattern_strategy_reports_history_failure() {
        let store = Arc::new(MemoryStore::new());
        store.fail_history(true);
        let s = PatternStrategy::new(
            store.clone(),
            Arc::new(CandidateCache::new(Duration::from_secs(60))),
            PatternMatcher::new(0.8, PatternConfig::default()),
        );
        let outcome = run(&s, &org(Catalog::default()), "UBER TRIP").await;
        assert!(matches!(outcome, StrategyOutcome::Failed(note) if note.contains("history offline")));
    }

    #[tokio::test]
    async fn pattern_strategy_matches_history() {
        let store = Arc::new(MemoryStore::new().with_history(
            "org",
            HistoricalPattern {
                transaction_id: "h1".to_string(),
                description: "UBER* TRIP 1111".to_string(),
                amount: Money::from_cents(1800),
                transaction_type: TransactionType::Expense,
                category: CategoryRef::new("travel", "Travel"),
                cost_center: None,
                occurred_at: Utc::now(),
            },
        ));
        let s = PatternStrategy::new(
            store.clone(),
            Arc::new(CandidateCache::new(Duration::from_secs(60))),
            PatternMatcher::new(0.8, PatternConfig::default()),
        );
        match run(&s, &org(Catalog::default()), "UBER* TRIP 2222").await {
            StrategyOutcome::Matched(m) => {
                assert_eq!(m.category.id, "travel");
                assert_eq!(m.detail, "history \"uber trip\" (1 similar)");
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ai_strategy_times_out() {
        let backend = Arc::new(
            MockAiBackend::new("travel", "Travel", 0.9).with_delay(Duration::from_secs(5)),
        );
        let s = AiStrategy::new(backend.clone(), 1, Duration::from_millis(20));
        let outcome = run(&s, &org(Catalog::default()), "UBER TRIP").await;
        assert_eq!(
            outcome,
            StrategyOutcome::Failed("AI fallback failed: timed out after 20 ms".to_string())
        );
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn ai_strategy_rejects_unknown_category() {
        let backend = Arc::new(MockAiBackend::new("crypto", "Crypto", 0.9));
        let s = AiStrategy::new(backend, 1, Duration::from_secs(1));
        let catalog = Catalog {
            categories: vec![CategoryRef::new("travel", "Travel")],
            cost_centers: vec![],
        };
        let outcome = run(&s, &org(catalog), "UBER TRIP").await;
        assert!(matches!(outcome, StrategyOutcome::Failed(note) if note.contains("'crypto'")));
    }

    #[tokio::test]
    async fn stateless_context_skips_org_strategies() {
        let mut ctx = org(Catalog::default());
        ctx.organization_id = None;
        assert!(matches!(
            run(&RuleStrategy, &ctx, "UBER TRIP").await,
            StrategyOutcome::NoMatch(_)
        ));
    }
}
