use fincat_core::{ClassificationResult, Source, Thresholds};

use crate::strategy::StrategyMatch;
use crate::transfer::{TransferEvidence, TransferMatch};

/// Maps a match score to what the caller gets back: applied, suggested, or
/// withheld.
#[derive(Debug, Clone, Copy)]
pub struct DecisionPolicy {
    auto_validate: f32,
    suggest: f32,
}

impl DecisionPolicy {
    pub fn new(thresholds: &Thresholds) -> Self {
        Self {
            auto_validate: thresholds.auto_validate,
            suggest: thresholds.suggest,
        }
    }

    pub fn decide(&self, source: Source, m: StrategyMatch) -> ClassificationResult {
        let score = m.score.clamp(0.0, 1.0);
        let found = format!("{source} match: {}, score {score:.2}", m.detail);

        if score < self.suggest {
            return ClassificationResult::unclassified(
                score,
                format!("{found}; below suggest threshold {:.2}, left unclassified", self.suggest),
            );
        }

        let auto_validated = score >= self.auto_validate;
        let tier = if auto_validated {
            format!("auto-validated (>= {:.2})", self.auto_validate)
        } else {
            format!("suggested for review (< {:.2})", self.auto_validate)
        };

        let mut result = ClassificationResult::unclassified(score, format!("{found}; {tier}"))
            .with_category(Some(&m.category))
            .with_cost_center(m.cost_center.as_ref());
        result.source = source;
        result.auto_validated = auto_validated;
        result
    }

    /// Transfers carry no category and are always applied.
    pub fn transfer(&self, t: &TransferMatch) -> ClassificationResult {
        let evidence = match &t.evidence {
            TransferEvidence::Alias(alias) => format!("alias '{alias}'"),
            TransferEvidence::AccountNumber(number) => format!("account number {number}"),
        };
        let mut result = ClassificationResult::unclassified(
            1.0,
            format!("transfer with internal account '{}' ({evidence})", t.account_name),
        );
        result.is_transfer = true;
        result.source = Source::Rule;
        result.auto_validated = true;
        result
    }

    pub fn no_match(&self, notes: &[String]) -> ClassificationResult {
        let reasoning = if notes.is_empty() {
            "no match".to_string()
        } else {
            format!("no match: {}", notes.join("; "))
        };
        ClassificationResult::unclassified(0.0, reasoning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fincat_core::CategoryRef;

    fn policy() -> DecisionPolicy {
        DecisionPolicy::new(&Thresholds::default())
    }

    fn matched(score: f32) -> StrategyMatch {
        StrategyMatch {
            category: CategoryRef::new("travel", "Travel"),
            cost_center: Some(CategoryRef::new("ops", "Operations")),
            score,
            detail: "rule 'uber' (contains)".to_string(),
        }
    }

    #[test]
    fn high_confidence_is_auto_validated() {
        let r = policy().decide(Source::Rule, matched(0.90));
        assert!(r.auto_validated);
        assert_eq!(r.source, Source::Rule);
        assert_eq!(r.category_id.as_deref(), Some("travel"));
        assert_eq!(r.cost_center_name.as_deref(), Some("Operations"));
        assert_eq!(
            r.reasoning,
            "rule match: rule 'uber' (contains), score 0.90; auto-validated (>= 0.85)"
        );
    }

    #[test]
    fn middle_tier_is_a_suggestion() {
        let r = policy().decide(Source::Pattern, matched(0.70));
        assert!(!r.auto_validated);
        assert_eq!(r.source, Source::Pattern);
        assert_eq!(r.category_id.as_deref(), Some("travel"));
        assert!(r.reasoning.ends_with("suggested for review (< 0.85)"));
    }

    #[test]
    fn low_confidence_withholds_category() {
        let r = policy().decide(Source::Ai, matched(0.30));
        assert!(!r.auto_validated);
        assert_eq!(r.source, Source::None);
        assert!(r.category_id.is_none() && r.cost_center_id.is_none());
        assert_eq!(r.confidence, 0.30);
        assert!(r.reasoning.starts_with("ai match:"));
    }

    #[test]
    fn tier_boundaries_are_inclusive() {
        assert!(policy().decide(Source::Rule, matched(0.85)).auto_validated);
        assert_eq!(policy().decide(Source::Rule, matched(0.60)).source, Source::Rule);
    }

    #[test]
    fn transfer_has_no_category_and_full_confidence() {
        let r = policy().transfer(&TransferMatch {
            account_id: "acc-2".to_string(),
            account_name: "Savings".to_string(),
            evidence: TransferEvidence::Alias("reserva".to_string()),
        });
        assert!(r.is_transfer && r.auto_validated);
        assert_eq!(r.confidence, 1.0);
        assert_eq!(r.source, Source::Rule);
        assert!(r.category_id.is_none());
        assert_eq!(r.reasoning, "transfer with internal account 'Savings' (alias 'reserva')");
    }

    #[test]
    fn no_match_collects_notes() {
        let r = policy().no_match(&[
            "rules: none of 3 matched".to_string(),
            "AI fallback failed: timed out after 8000 ms".to_string(),
        ]);
        assert_eq!(r.confidence, 0.0);
        assert_eq!(r.source, Source::None);
        assert!(r.reasoning.contains("timed out"));
    }
}
