pub mod account;
pub mod classification;
pub mod config;
pub mod money;
pub mod rule;
pub mod transaction;

pub use account::{Catalog, CategoryRef, InternalAccount};
pub use classification::{ClassificationResult, PersistedDecision, Source, ValidationStatus};
pub use config::{
    AiConfig, ClassifierConfig, ConfigError, PatternConfig, SimilarityMetric, Thresholds,
    TieBreak, TransferConfig,
};
pub use money::Money;
pub use rule::{HistoricalPattern, Rule, RuleMatchType};
pub use transaction::{ClassificationRequest, RequestError, TransactionType, ValidatedRequest};
