use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use fincat_core::{Catalog, HistoricalPattern, InternalAccount, PersistedDecision, Rule};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(String),
}

/// The data the engine reads per organization and the single write it makes.
#[async_trait]
pub trait ClassificationStore: Send + Sync {
    async fn active_rules(&self, organization_id: &str) -> Result<Vec<Rule>, StoreError>;

    /// Transactions with a category and a settled validation status.
    async fn categorized_history(
        &self,
        organization_id: &str,
    ) -> Result<Vec<HistoricalPattern>, StoreError>;

    async fn internal_accounts(
        &self,
        organization_id: &str,
    ) -> Result<Vec<InternalAccount>, StoreError>;

    async fn catalog(&self, organization_id: &str) -> Result<Catalog, StoreError>;

    /// Must be idempotent: saving the same decision twice leaves one record.
    async fn save_decision(&self, decision: &PersistedDecision) -> Result<(), StoreError>;
}

/// In-memory store with per-call counters and failure switches.
#[derive(Default)]
pub struct MemoryStore {
    rules: HashMap<String, Vec<Rule>>,
    history: HashMap<String, Vec<HistoricalPattern>>,
    accounts: HashMap<String, Vec<InternalAccount>>,
    catalogs: HashMap<String, Catalog>,
    saved: Mutex<HashMap<String, PersistedDecision>>,
    rule_reads: AtomicUsize,
    history_reads: AtomicUsize,
    fail_history: AtomicBool,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules
            .entry(rule.organization_id.clone())
            .or_default()
            .push(rule);
        self
    }

    pub fn with_history(mut self, organization_id: &str, pattern: HistoricalPattern) -> Self {
        self.history
            .entry(organization_id.to_string())
            .or_default()
            .push(pattern);
        self
    }

    pub fn with_account(mut self, account: InternalAccount) -> Self {
        self.accounts
            .entry(account.organization_id.clone())
            .or_default()
            .push(account);
        self
    }

    pub fn with_catalog(mut self, organization_id: &str, catalog: Catalog) -> Self {
        self.catalogs.insert(organization_id.to_string(), catalog);
        self
    }

    pub fn fail_history(&self, fail: bool) {
        self.fail_history.store(fail, Ordering::SeqCst);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn rule_reads(&self) -> usize {
        self.rule_reads.load(Ordering::SeqCst)
    }

    pub fn history_reads(&self) -> usize {
        self.history_reads.load(Ordering::SeqCst)
    }

    pub fn saved(&self, transaction_id: &str) -> Option<PersistedDecision> {
        self.saved_map().get(transaction_id).cloned()
    }

    pub fn saved_count(&self) -> usize {
        self.saved_map().len()
    }

    fn saved_map(&self) -> std::sync::MutexGuard<'_, HashMap<String, PersistedDecision>> {
        self.saved.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ClassificationStore for MemoryStore {
    async fn active_rules(&self, organization_id: &str) -> Result<Vec<Rule>, StoreError> {
        self.rule_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rules
            .get(organization_id)
            .map(|rules| rules.iter().filter(|r| r.is_active).cloned().collect())
            .unwrap_or_default())
    }

    async fn categorized_history(
        &self,
        organization_id: &str,
    ) -> Result<Vec<HistoricalPattern>, StoreError> {
        self.history_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("history offline".to_string()));
        }
        Ok(self.history.get(organization_id).cloned().unwrap_or_default())
    }

    async fn internal_accounts(
        &self,
        organization_id: &str,
    ) -> Result<Vec<InternalAccount>, StoreError> {
        Ok(self.accounts.get(organization_id).cloned().unwrap_or_default())
    }

    async fn catalog(&self, organization_id: &str) -> Result<Catalog, StoreError> {
        Ok(self.catalogs.get(organization_id).cloned().unwrap_or_default())
    }

    async fn save_decision(&self, decision: &PersistedDecision) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Query("read-only replica".to_string()));
        }
        self.saved_map()
            .insert(decision.transaction_id.clone(), decision.clone());
        Ok(())
    }
}
