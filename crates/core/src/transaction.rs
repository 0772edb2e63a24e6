use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Expense,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Income => write!(f, "income"),
            TransactionType::Expense => write!(f, "expense"),
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(format!("Unknown transaction type: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("description is required")]
    MissingDescription,
    #[error("type is required")]
    MissingType,
    #[error("{0}")]
    InvalidType(String),
    #[error("amount is required")]
    MissingAmount,
    #[error("amount must be non-negative, got {0}")]
    NegativeAmount(Money),
}

/// A classification request as it arrives on the wire. Every field is optional
/// here so that malformed input surfaces as a `RequestError` rather than a
/// deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationRequest {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(rename = "type", default)]
    pub transaction_type: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
}

/// A request that passed input validation. Only these enter the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub transaction_id: Option<String>,
    pub description: String,
    pub amount: Money,
    pub transaction_type: TransactionType,
    pub organization_id: Option<String>,
}

impl ValidatedRequest {
    pub fn validate(req: ClassificationRequest) -> Result<ValidatedRequest, RequestError> {
        let description = req
            .description
            .filter(|d| !d.trim().is_empty())
            .ok_or(RequestError::MissingDescription)?;

        let transaction_type = req
            .transaction_type
            .filter(|t| !t.trim().is_empty())
            .ok_or(RequestError::MissingType)?
            .parse::<TransactionType>()
            .map_err(RequestError::InvalidType)?;

        let amount = Money::from_decimal(req.amount.ok_or(RequestError::MissingAmount)?);
        if amount.is_negative() {
            return Err(RequestError::NegativeAmount(amount));
        }

        Ok(ValidatedRequest {
            transaction_id: non_blank(req.transaction_id),
            description,
            amount,
            transaction_type,
            organization_id: non_blank(req.organization_id),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
