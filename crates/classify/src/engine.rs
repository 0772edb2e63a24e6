use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use fincat_core::{
    ClassificationRequest, ClassificationResult, ClassifierConfig, PersistedDecision, RequestError,
    ValidatedRequest,
};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{self, JoinSet};

use crate::ai::AiBackend;
use crate::cache::CandidateCache;
use crate::normalize::normalize;
use crate::pattern::PatternMatcher;
use crate::policy::DecisionPolicy;
use crate::rules::RuleMatcher;
use crate::store::ClassificationStore;
use crate::strategy::{
    AiStrategy, MatchContext, OrgContext, PatternStrategy, RuleStrategy, Strategy, StrategyOutcome,
};
use crate::transfer::TransferDetector;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchItem {
    Classified { result: ClassificationResult },
    Rejected { error: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    /// One entry per request, in request order.
    pub results: Vec<BatchItem>,
    pub cancelled: bool,
}

/// Transfer check, then rule → pattern → AI, then the confidence policy.
pub struct ClassificationEngine {
    config: ClassifierConfig,
    store: Arc<dyn ClassificationStore>,
    strategies: Vec<Box<dyn Strategy>>,
    policy: DecisionPolicy,
    patterns: Arc<CandidateCache>,
}

impl ClassificationEngine {
    pub fn new(
        config: ClassifierConfig,
        store: Arc<dyn ClassificationStore>,
        ai: Option<Arc<dyn AiBackend>>,
    ) -> Self {
        let patterns = Arc::new(CandidateCache::new(Duration::from_secs(
            config.pattern.cache_ttl_secs,
        )));

        let mut strategies: Vec<Box<dyn Strategy>> = vec![
            Box::new(RuleStrategy),
            Box::new(PatternStrategy::new(
                store.clone(),
                patterns.clone(),
                PatternMatcher::new(config.thresholds.pattern_similarity, config.pattern),
            )),
        ];
        if let Some(backend) = ai {
            tracing::info!(backend = backend.id(), "AI fallback enabled");
            strategies.push(Box::new(AiStrategy::new(
                backend,
                config.ai.max_concurrency,
                Duration::from_millis(config.ai.timeout_ms),
            )));
        }

        Self {
            policy: DecisionPolicy::new(&config.thresholds),
            config,
            store,
            strategies,
            patterns,
        }
    }

    pub async fn classify(
        &self,
        request: ClassificationRequest,
    ) -> Result<ClassificationResult, RequestError> {
        let request = ValidatedRequest::validate(request)?;
        let org = self.load_context(request.organization_id.as_deref()).await;
        Ok(self.classify_validated(&request, &org).await)
    }

    /// Classifies every request concurrently. Org context is read once per
    /// organization. When `cancel` turns `true` or its sender goes away,
    /// unfinished work is dropped and reported as cancelled. A task that
    /// panics is reported as unclassified, never as cancelled.
    pub async fn classify_batch(
        self: &Arc<Self>,
        requests: Vec<ClassificationRequest>,
        mut cancel: watch::Receiver<bool>,
    ) -> BatchOutcome {
        let mut slots: Vec<Option<BatchItem>> = Vec::with_capacity(requests.len());
        let mut valid = Vec::new();
        for (i, request) in requests.into_iter().enumerate() {
            match ValidatedRequest::validate(request) {
                Ok(v) => {
                    slots.push(None);
                    valid.push((i, v));
                }
                Err(e) => slots.push(Some(BatchItem::Rejected {
                    error: e.to_string(),
                })),
            }
        }

        let mut contexts: HashMap<Option<String>, Arc<OrgContext>> = HashMap::new();
        for (_, request) in &valid {
            if !contexts.contains_key(&request.organization_id) {
                let org = self.load_context(request.organization_id.as_deref()).await;
                contexts.insert(request.organization_id.clone(), Arc::new(org));
            }
        }

        let mut tasks = JoinSet::new();
        let mut task_slots: HashMap<task::Id, usize> = HashMap::with_capacity(valid.len());
        for (i, request) in valid {
            let engine = Arc::clone(self);
            let org = contexts[&request.organization_id].clone();
            let handle =
                tasks.spawn(async move { (i, engine.classify_validated(&request, &org).await) });
            task_slots.insert(handle.id(), i);
        }

        let mut cancelled = false;
        while !tasks.is_empty() {
            tokio::select! {
                biased;
                _ = cancel.wait_for(|c| *c) => {
                    tasks.abort_all();
                    cancelled = true;
                    break;
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok((i, result))) => slots[i] = Some(BatchItem::Classified { result }),
                    Some(Err(e)) => {
                        tracing::error!("classification task failed: {e}");
                        if let Some(&i) = task_slots.get(&e.id()) {
                            slots[i] = Some(BatchItem::Classified {
                                result: ClassificationResult::unclassified(
                                    0.0,
                                    "classification failed: internal error",
                                ),
                            });
                        }
                    }
                    None => break,
                },
            }
        }
        if cancelled {
            tracing::info!(
                completed = slots.iter().filter(|s| s.is_some()).count(),
                total = slots.len(),
                "batch cancelled"
            );
        }

        BatchOutcome {
            results: slots
                .into_iter()
                .map(|s| s.unwrap_or(BatchItem::Cancelled))
                .collect(),
            cancelled,
        }
    }

    /// Forget the cached history index, e.g. after a reviewer confirms a batch.
    pub async fn invalidate_patterns(&self, organization_id: &str) {
        self.patterns.invalidate(organization_id).await;
    }

    async fn classify_validated(
        &self,
        request: &ValidatedRequest,
        org: &OrgContext,
    ) -> ClassificationResult {
        let result = self.decide(request, org).await;
        if let Some(id) = &request.transaction_id {
            self.persist(id, &result).await;
        }
        result
    }

    async fn decide(&self, request: &ValidatedRequest, org: &OrgContext) -> ClassificationResult {
        let normalized = normalize(&request.description);

        if let Some(transfer) = org.transfers.detect(&request.description) {
            tracing::debug!(account_id = %transfer.account_id, "transfer detected");
            return self.policy.transfer(&transfer).with_normalized(normalized);
        }

        let ctx = MatchContext {
            request,
            normalized: &normalized,
            org,
        };
        let mut notes = Vec::new();
        for strategy in &self.strategies {
            match strategy.attempt(&ctx).await {
                StrategyOutcome::Matched(m) => {
                    tracing::debug!(
                        source = %strategy.source(),
                        category_id = %m.category.id,
                        score = m.score,
                        "strategy matched"
                    );
                    return self
                        .policy
                        .decide(strategy.source(), m)
                        .with_normalized(normalized);
                }
                StrategyOutcome::NoMatch(note) | StrategyOutcome::Failed(note) => notes.push(note),
            }
        }
        self.policy.no_match(&notes).with_normalized(normalized)
    }

    async fn persist(&self, transaction_id: &str, result: &ClassificationResult) {
        let decision = PersistedDecision::from_result(transaction_id, result);
        if let Err(e) = self.store.save_decision(&decision).await {
            tracing::warn!(transaction_id, "failed to persist classification: {e}");
        }
    }

    /// Reads are independent; a failed one is logged and treated as empty.
    async fn load_context(&self, organization_id: Option<&str>) -> OrgContext {
        let thresholds = &self.config.thresholds;
        let Some(org) = organization_id else {
            return OrgContext {
                organization_id: None,
                rules: RuleMatcher::new(Vec::new(), thresholds.rule_similarity),
                transfers: TransferDetector::new(Vec::new(), &self.config.transfer),
                catalog: Default::default(),
            };
        };

        let (rules, accounts, catalog) = tokio::join!(
            self.store.active_rules(org),
            self.store.internal_accounts(org),
            self.store.catalog(org),
        );
        let rules = rules.unwrap_or_else(|e| {
            tracing::warn!(organization_id = org, "rules read failed: {e}");
            Vec::new()
        });
        let accounts = accounts.unwrap_or_else(|e| {
            tracing::warn!(organization_id = org, "internal accounts read failed: {e}");
            Vec::new()
        });
        let catalog = catalog.unwrap_or_else(|e| {
            tracing::warn!(organization_id = org, "catalog read failed: {e}");
            Default::default()
        });

        OrgContext {
            organization_id: Some(org.to_string()),
            rules: RuleMatcher::new(rules, thresholds.rule_similarity),
            transfers: TransferDetector::new(accounts, &self.config.transfer),
            catalog,
        }
    }
}
