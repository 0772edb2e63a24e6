pub mod ai;
pub mod cache;
pub mod engine;
pub mod normalize;
pub mod pattern;
pub mod policy;
pub mod rules;
pub mod store;
pub mod strategy;
pub mod transfer;
mod util;

pub use ai::{AiBackend, AiError, AiPrompt, AiSuggestion, MockAiBackend, OpenAiBackend};
pub use engine::{BatchItem, BatchOutcome, ClassificationEngine};
pub use normalize::normalize;
pub use store::{ClassificationStore, MemoryStore, StoreError};
pub use util::similarity;
