//! Last-resort classification by a language model.
//!
//! Backends only talk to the model. Checking the answer against the
//! organization's catalog happens in [`AiSuggestion::resolve`], so a mock
//! and a real backend are held to the same rules.

mod mock;
mod openai;

pub use mock::MockAiBackend;
pub use openai::OpenAiBackend;

use async_trait::async_trait;
use fincat_core::{Catalog, CategoryRef, Money, TransactionType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AiError {
    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("rate limited by the model endpoint")]
    RateLimited,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("category '{0}' is not one of the organization's categories")]
    UnknownCategory(String),
}

/// What the model is told about one transaction.
#[derive(Debug, Clone)]
pub struct AiPrompt<'a> {
    pub description: &'a str,
    pub amount: Money,
    pub transaction_type: TransactionType,
    pub catalog: &'a Catalog,
}

/// The model's answer, as returned on the wire. Nothing here is trusted yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiSuggestion {
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    #[serde(default)]
    pub cost_center_id: Option<String>,
    #[serde(default)]
    pub cost_center_name: Option<String>,
    pub confidence: f32,
    #[serde(default)]
    pub reasoning: String,
}

/// A suggestion that passed catalog and range checks.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSuggestion {
    pub category: CategoryRef,
    pub cost_center: Option<CategoryRef>,
    pub confidence: f32,
    pub reasoning: String,
}

impl AiSuggestion {
    /// Validate against the organization's `catalog`. `None` means a
    /// stateless request: the model's own id/name pair is accepted as long as
    /// both halves exist. With an organization, the category must be in its
    /// catalog, so an empty catalog rejects every suggestion.
    pub fn resolve(self, catalog: Option<&Catalog>) -> Result<ResolvedSuggestion, AiError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(AiError::Malformed(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }

        let category = match (non_blank(self.category_id), non_blank(self.category_name)) {
            (Some(id), name) if catalog.is_some() => catalog
                .and_then(|c| c.category(&id))
                .cloned()
                .ok_or(AiError::UnknownCategory(id))
                .inspect(|c| {
                    if name.as_deref().is_some_and(|n| n != c.name) {
                        tracing::debug!(category_id = %c.id, "model renamed a known category; using catalog name");
                    }
                })?,
            (Some(id), Some(name)) => CategoryRef::new(id, name),
            _ => {
                return Err(AiError::Malformed(
                    "category id and name must both be present".to_string(),
                ))
            }
        };

        let cost_center = match (
            catalog,
            non_blank(self.cost_center_id),
            non_blank(self.cost_center_name),
        ) {
            (Some(catalog), Some(id), _) => {
                let known = catalog.cost_center(&id).cloned();
                if known.is_none() {
                    tracing::warn!(cost_center_id = %id, "dropping unknown cost center from AI suggestion");
                }
                known
            }
            (None, Some(id), Some(name)) => Some(CategoryRef::new(id, name)),
            _ => None,
        };

        Ok(ResolvedSuggestion {
            category,
            cost_center,
            confidence: self.confidence,
            reasoning: self.reasoning,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Model identifier, for logs.
    fn id(&self) -> &str;

    async fn suggest(&self, prompt: &AiPrompt<'_>) -> Result<AiSuggestion, AiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog {
            categories: vec![
                CategoryRef::new("travel", "Travel"),
                CategoryRef::new("meals", "Meals"),
            ],
            cost_centers: vec![CategoryRef::new("ops", "Operations")],
        }
    }

    fn suggestion(category_id: &str, confidence: f32) -> AiSuggestion {
        AiSuggestion {
            category_id: Some(category_id.to_string()),
            category_name: Some("whatever".to_string()),
            confidence,
            reasoning: "looks like a ride".to_string(),
            ..AiSuggestion::default()
        }
    }

    #[test]
    fn known_category_takes_catalog_name() {
        let r = suggestion("travel", 0.7).resolve(Some(&catalog())).unwrap();
        assert_eq!(r.category, CategoryRef::new("travel", "Travel"));
        assert_eq!(r.confidence, 0.7);
    }

    #[test]
    fn unknown_category_is_rejected() {
        let err = suggestion("crypto", 0.9).resolve(Some(&catalog())).unwrap_err();
        assert_eq!(err, AiError::UnknownCategory("crypto".to_string()));
    }

    #[test]
    fn confidence_out_of_range_is_malformed() {
        assert!(matches!(
            suggestion("travel", 1.5).resolve(Some(&catalog())),
            Err(AiError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_cost_center_is_dropped_not_fatal() {
        let mut s = suggestion("travel", 0.8);
        s.cost_center_id = Some("marketing".to_string());
        s.cost_center_name = Some("Marketing".to_string());
        assert!(s.resolve(Some(&catalog())).unwrap().cost_center.is_none());

        let mut s = suggestion("travel", 0.8);
        s.cost_center_id = Some("ops".to_string());
        assert_eq!(
            s.resolve(Some(&catalog())).unwrap().cost_center,
            Some(CategoryRef::new("ops", "Operations"))
        );
    }

    #[test]
    fn stateless_requires_both_halves() {
        let r = suggestion("travel", 0.8).resolve(None).unwrap();
        assert_eq!(r.category, CategoryRef::new("travel", "whatever"));

        let mut s = suggestion("travel", 0.8);
        s.category_name = Some("  ".to_string());
        assert!(matches!(s.resolve(None), Err(AiError::Malformed(_))));
    }

    #[test]
    fn organization_with_empty_catalog_rejects_everything() {
        let empty = Catalog::default();
        let err = suggestion("crypto_speculation", 0.95)
            .resolve(Some(&empty))
            .unwrap_err();
        assert_eq!(err, AiError::UnknownCategory("crypto_speculation".to_string()));

        let mut s = suggestion("travel", 0.8);
        s.cost_center_id = Some("ops".to_string());
        s.cost_center_name = Some("Operations".to_string());
        let r = s.resolve(Some(&catalog())).unwrap();
        assert_eq!(r.cost_center, Some(CategoryRef::new("ops", "Operations")));
    }
}
