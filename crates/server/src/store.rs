use async_trait::async_trait;
use fincat_classify::{ClassificationStore, StoreError};
use fincat_core::{Catalog, HistoricalPattern, InternalAccount, PersistedDecision, Rule};
use fincat_storage::DbPool;

/// The engine's view of the SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn query_failed(e: sqlx::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

#[async_trait]
impl ClassificationStore for SqliteStore {
    async fn active_rules(&self, organization_id: &str) -> Result<Vec<Rule>, StoreError> {
        fincat_storage::get_active_rules(&self.pool, organization_id)
            .await
            .map_err(query_failed)
    }

    async fn categorized_history(
        &self,
        organization_id: &str,
    ) -> Result<Vec<HistoricalPattern>, StoreError> {
        fincat_storage::get_categorized_history(&self.pool, organization_id)
            .await
            .map_err(query_failed)
    }

    async fn internal_accounts(
        &self,
        organization_id: &str,
    ) -> Result<Vec<InternalAccount>, StoreError> {
        fincat_storage::get_internal_accounts(&self.pool, organization_id)
            .await
            .map_err(query_failed)
    }

    async fn catalog(&self, organization_id: &str) -> Result<Catalog, StoreError> {
        fincat_storage::get_catalog(&self.pool, organization_id)
            .await
            .map_err(query_failed)
    }

    async fn save_decision(&self, decision: &PersistedDecision) -> Result<(), StoreError> {
        let matched = fincat_storage::save_classification(&self.pool, decision)
            .await
            .map_err(query_failed)?;
        if !matched {
            return Err(StoreError::Query(format!(
                "no transaction with id '{}'",
                decision.transaction_id
            )));
        }
        Ok(())
    }
}
