//! Scripted AI backend for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{AiBackend, AiError, AiPrompt, AiSuggestion};

pub struct MockAiBackend {
    response: Result<AiSuggestion, AiError>,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockAiBackend {
    /// Always answers `category_id` with the given confidence.
    pub fn new(category_id: &str, category_name: &str, confidence: f32) -> Self {
        Self::with_response(Ok(AiSuggestion {
            category_id: Some(category_id.to_string()),
            category_name: Some(category_name.to_string()),
            confidence,
            reasoning: format!("mock picked {category_name}"),
            ..AiSuggestion::default()
        }))
    }

    pub fn failing(error: AiError) -> Self {
        Self::with_response(Err(error))
    }

    pub fn with_response(response: Result<AiSuggestion, AiError>) -> Self {
        Self {
            response,
            delay: None,
            call_count: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AiBackend for MockAiBackend {
    fn id(&self) -> &str {
        "mock"
    }

    async fn suggest(&self, _prompt: &AiPrompt<'_>) -> Result<AiSuggestion, AiError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.response.clone()
    }
}
