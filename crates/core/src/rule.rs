use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::account::CategoryRef;
use super::money::Money;
use super::transaction::TransactionType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuleMatchType {
    #[default]
    Contains,
    Exact,
    StartsWith,
    Regex,
    Fuzzy,
}

impl fmt::Display for RuleMatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleMatchType::Contains => write!(f, "contains"),
            RuleMatchType::Exact => write!(f, "exact"),
            RuleMatchType::StartsWith => write!(f, "starts_with"),
            RuleMatchType::Regex => write!(f, "regex"),
            RuleMatchType::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

impl std::str::FromStr for RuleMatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "contains" => Ok(RuleMatchType::Contains),
            "exact" => Ok(RuleMatchType::Exact),
            "starts_with" => Ok(RuleMatchType::StartsWith),
            "regex" => Ok(RuleMatchType::Regex),
            "fuzzy" => Ok(RuleMatchType::Fuzzy),
            other => Err(format!("Unknown match type: '{other}'")),
        }
    }
}

/// An organization-authored mapping from a description pattern to a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub organization_id: String,
    pub pattern: String,
    pub match_type: RuleMatchType,
    pub category: CategoryRef,
    pub cost_center: Option<CategoryRef>,
    /// Per-rule acceptance threshold; the global rule threshold still acts as a floor.
    pub threshold: Option<f32>,
    pub amount_min: Option<Money>,
    pub amount_max: Option<Money>,
    pub transaction_type: Option<TransactionType>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A previously categorized transaction, used as a similarity candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalPattern {
    pub transaction_id: String,
    pub description: String,
    pub amount: Money,
    pub transaction_type: TransactionType,
    pub category: CategoryRef,
    pub cost_center: Option<CategoryRef>,
    pub occurred_at: DateTime<Utc>,
}
