use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fincat_core::HistoricalPattern;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::pattern::CandidateIndex;

struct CachedIndex {
    index: Arc<CandidateIndex>,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

type Slot = Arc<Mutex<Option<CachedIndex>>>;

/// Per-organization candidate indexes with a short expiry. Try the cache,
/// else fetch history and rebuild. Each organization has its own slot lock,
/// so concurrent lookups for one organization trigger a single fetch.
pub struct CandidateCache {
    ttl: Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

impl CandidateCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_or_load<F, Fut, E>(
        &self,
        organization_id: &str,
        load: F,
    ) -> Result<Arc<CandidateIndex>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<HistoricalPattern>, E>>,
    {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(organization_id.to_string()).or_default().clone()
        };

        let mut entry = slot.lock().await;
        if let Some(cached) = entry.as_ref() {
            if cached.expires_at.is_none_or(|at| Instant::now() < at) {
                return Ok(cached.index.clone());
            }
        }

        let history = load().await?;
        let index = Arc::new(CandidateIndex::from_history(history));
        tracing::debug!(
            organization_id,
            candidates = index.len(),
            "candidate index rebuilt"
        );
        *entry = Some(CachedIndex {
            index: index.clone(),
            expires_at: Instant::now().checked_add(self.ttl),
        });
        Ok(index)
    }

    pub async fn invalidate(&self, organization_id: &str) {
        self.slots.lock().await.remove(organization_id);
    }
}
