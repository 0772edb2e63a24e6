use serde::{Deserialize, Serialize};
use std::fmt;

use super::account::CategoryRef;

/// Which strategy produced the decision. Transfers report `Rule`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Rule,
    Pattern,
    Ai,
    None,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Rule => write!(f, "rule"),
            Source::Pattern => write!(f, "pattern"),
            Source::Ai => write!(f, "ai"),
            Source::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rule" => Ok(Source::Rule),
            "pattern" => Ok(Source::Pattern),
            "ai" => Ok(Source::Ai),
            "none" => Ok(Source::None),
            other => Err(format!("Unknown classification source: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    AutoApproved,
    PendingReview,
    /// Set by a human reviewer; never written by the engine.
    Confirmed,
}

impl ValidationStatus {
    /// Whether a transaction in this state may serve as a historical pattern.
    pub fn is_settled(self) -> bool {
        matches!(self, ValidationStatus::AutoApproved | ValidationStatus::Confirmed)
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationStatus::AutoApproved => write!(f, "auto_approved"),
            ValidationStatus::PendingReview => write!(f, "pending_review"),
            ValidationStatus::Confirmed => write!(f, "confirmed"),
        }
    }
}

impl std::str::FromStr for ValidationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto_approved" => Ok(ValidationStatus::AutoApproved),
            "pending_review" => Ok(ValidationStatus::PendingReview),
            "confirmed" => Ok(ValidationStatus::Confirmed),
            other => Err(format!("Unknown validation status: '{other}'")),
        }
    }
}

/// The engine's decision for one transaction, in wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub cost_center_id: Option<String>,
    pub cost_center_name: Option<String>,
    pub confidence: f32,
    pub is_transfer: bool,
    pub reasoning: String,
    pub source: Source,
    pub auto_validated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_description: Option<String>,
}

impl ClassificationResult {
    pub fn unclassified(confidence: f32, reasoning: impl Into<String>) -> Self {
        ClassificationResult {
            category_id: None,
            category_name: None,
            cost_center_id: None,
            cost_center_name: None,
            confidence: confidence.clamp(0.0, 1.0),
            is_transfer: false,
            reasoning: reasoning.into(),
            source: Source::None,
            auto_validated: false,
            normalized_description: None,
        }
    }

    pub fn with_category(mut self, category: Option<&CategoryRef>) -> Self {
        self.category_id = category.map(|c| c.id.clone());
        self.category_name = category.map(|c| c.name.clone());
        self
    }

    pub fn with_cost_center(mut self, cost_center: Option<&CategoryRef>) -> Self {
        self.cost_center_id = cost_center.map(|c| c.id.clone());
        self.cost_center_name = cost_center.map(|c| c.name.clone());
        self
    }

    pub fn with_normalized(mut self, normalized: impl Into<String>) -> Self {
        self.normalized_description = Some(normalized.into());
        self
    }

    pub fn validation_status(&self) -> ValidationStatus {
        if self.auto_validated {
            ValidationStatus::AutoApproved
        } else {
            ValidationStatus::PendingReview
        }
    }
}

/// What gets written back for a persisted transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedDecision {
    pub transaction_id: String,
    pub category_id: Option<String>,
    pub cost_center_id: Option<String>,
    pub is_transfer: bool,
    pub validation_status: ValidationStatus,
    pub confidence: f32,
    pub source: Source,
    pub reasoning: String,
}

impl PersistedDecision {
    pub fn from_result(transaction_id: &str, result: &ClassificationResult) -> Self {
        PersistedDecision {
            transaction_id: transaction_id.to_string(),
            category_id: result.category_id.clone(),
            cost_center_id: result.cost_center_id.clone(),
            is_transfer: result.is_transfer,
            validation_status: result.validation_status(),
            confidence: result.confidence,
            source: result.source,
            reasoning: result.reasoning.clone(),
        }
    }
}
