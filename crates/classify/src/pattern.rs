use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use fincat_core::{
    CategoryRef, HistoricalPattern, PatternConfig, TieBreak, TransactionType, ValidatedRequest,
};

use crate::normalize::normalize;
use crate::util::similarity;

/// A historical transaction reduced to what similarity matching needs.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub transaction_id: String,
    pub normalized: String,
    pub transaction_type: TransactionType,
    pub category: CategoryRef,
    pub cost_center: Option<CategoryRef>,
    pub occurred_at: DateTime<Utc>,
}

/// An organization's categorized history, with an inverted token index so a
/// lookup only scores candidates that share at least one token with the query.
#[derive(Debug, Default)]
pub struct CandidateIndex {
    candidates: Vec<Candidate>,
    by_token: HashMap<String, Vec<usize>>,
}

impl CandidateIndex {
    pub fn from_history(history: Vec<HistoricalPattern>) -> Self {
        let mut index = CandidateIndex::default();
        for h in history {
            let normalized = normalize(&h.description);
            if normalized.is_empty() {
                continue;
            }
            let idx = index.candidates.len();
            let tokens: BTreeSet<&str> = normalized.split_whitespace().collect();
            for token in tokens {
                index.by_token.entry(token.to_string()).or_default().push(idx);
            }
            index.candidates.push(Candidate {
                transaction_id: h.transaction_id,
                normalized,
                transaction_type: h.transaction_type,
                category: h.category,
                cost_center: h.cost_center,
                occurred_at: h.occurred_at,
            });
        }
        index
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Candidate positions sharing a token with `normalized`, ascending.
    fn prefilter(&self, normalized: &str) -> BTreeSet<usize> {
        normalized
            .split_whitespace()
            .filter_map(|t| self.by_token.get(t))
            .flatten()
            .copied()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub category: CategoryRef,
    pub cost_center: Option<CategoryRef>,
    pub score: f32,
    /// Normalized description of the best historical transaction in the winning group.
    pub matched_description: String,
    pub matched_transaction_id: String,
    /// How many near-tied historical transactions agreed on this category and
    /// cost center.
    pub support: usize,
}

pub struct PatternMatcher {
    threshold: f32,
    config: PatternConfig,
}

impl PatternMatcher {
    pub fn new(threshold: f32, config: PatternConfig) -> Self {
        Self { threshold, config }
    }

    pub fn best_match(
        &self,
        normalized: &str,
        request: &ValidatedRequest,
        index: &CandidateIndex,
    ) -> Option<PatternMatch> {
        let scored: Vec<(&Candidate, f32)> = index
            .prefilter(normalized)
            .into_iter()
            .map(|i| &index.candidates[i])
            .filter(|c| request.transaction_id.as_deref() != Some(c.transaction_id.as_str()))
            .filter(|c| !self.config.same_type_only || c.transaction_type == request.transaction_type)
            .map(|c| (c, similarity(self.config.metric, normalized, &c.normalized)))
            .filter(|(_, score)| *score >= self.threshold)
            .collect();

        let best = scored.iter().map(|(_, s)| *s).fold(f32::MIN, f32::max);
        let near_ties: Vec<(&Candidate, f32)> = scored
            .into_iter()
            .filter(|(_, s)| *s >= best - self.config.near_tie_epsilon)
            .collect();

        match self.config.tie_break {
            TieBreak::MostFrequent => most_frequent(near_ties),
            TieBreak::MostRecent => most_recent(near_ties),
        }
    }
}

type GroupKey<'a> = (&'a str, Option<&'a str>);

fn group_key(c: &Candidate) -> GroupKey<'_> {
    (&c.category.id, c.cost_center.as_ref().map(|cc| cc.id.as_str()))
}

fn most_frequent(near_ties: Vec<(&Candidate, f32)>) -> Option<PatternMatch> {
    let mut groups: BTreeMap<GroupKey, Vec<(&Candidate, f32)>> = BTreeMap::new();
    for (c, s) in near_ties {
        groups.entry(group_key(c)).or_default().push((c, s));
    }

    groups
        .into_values()
        .max_by(|a, b| {
            a.len()
                .cmp(&b.len())
                .then_with(|| latest(a).cmp(&latest(b)))
                .then_with(|| top_score(a).total_cmp(&top_score(b)))
        })
        .and_then(|group| {
            let support = group.len();
            let (c, s) = group
                .into_iter()
                .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.occurred_at.cmp(&b.0.occurred_at)))?;
            Some(to_match(c, s, support))
        })
}

fn most_recent(near_ties: Vec<(&Candidate, f32)>) -> Option<PatternMatch> {
    let support_of = |c: &Candidate| {
        near_ties
            .iter()
            .filter(|(o, _)| group_key(o) == group_key(c))
            .count()
    };
    near_ties
        .iter()
        .max_by(|a, b| {
            a.0.occurred_at
                .cmp(&b.0.occurred_at)
                .then_with(|| a.1.total_cmp(&b.1))
                .then_with(|| b.0.transaction_id.cmp(&a.0.transaction_id))
        })
        .map(|(c, s)| to_match(c, *s, support_of(*c)))
}

fn latest(group: &[(&Candidate, f32)]) -> Option<DateTime<Utc>> {
    group.iter().map(|(c, _)| c.occurred_at).max()
}

fn top_score(group: &[(&Candidate, f32)]) -> f32 {
    group.iter().map(|(_, s)| *s).fold(f32::MIN, f32::max)
}

fn to_match(c: &Candidate, score: f32, support: usize) -> PatternMatch {
    PatternMatch {
        category: c.category.clone(),
        cost_center: c.cost_center.clone(),
        score,
        matched_description: c.normalized.clone(),
        matched_transaction_id: c.transaction_id.clone(),
        support,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fincat_core::{Money, SimilarityMetric};

    fn hist(id: &str, desc: &str, category: &str, day: u32) -> HistoricalPattern {
        HistoricalPattern {
            transaction_id: id.to_string(),
            description: desc.to_string(),
            amount: Money::from_cents(1000),
            transaction_type: TransactionType::Expense,
            category: CategoryRef::new(category, category),
            cost_center: None,
            occurred_at: Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
        }
    }

    fn request(desc: &str) -> ValidatedRequest {
        ValidatedRequest {
            transaction_id: None,
            description: desc.to_string(),
            amount: Money::from_cents(1000),
            transaction_type: TransactionType::Expense,
            organization_id: Some("org".to_string()),
        }
    }

    fn lookup(matcher: &PatternMatcher, index: &CandidateIndex, desc: &str) -> Option<PatternMatch> {
        matcher.best_match(&normalize(desc), &request(desc), index)
    }

    fn matcher() -> PatternMatcher {
        PatternMatcher::new(0.8, PatternConfig::default())
    }

    #[test]
    fn recurring_description_matches_history() {
        let index = CandidateIndex::from_history(vec![hist("h1", "UBER* TRIP 4821 09/14", "travel", 1)]);
        let m = lookup(&matcher(), &index, "UBER* TRIP 9932 10/02").unwrap();
        assert_eq!(m.category.id, "travel");
        assert_eq!(m.score, 1.0);
        assert_eq!(m.matched_description, "uber trip");
    }

    #[test]
    fn no_match_below_threshold() {
        let index = CandidateIndex::from_history(vec![hist("h1", "UBER EATS PEDIDO", "meals", 1)]);
        assert!(lookup(&matcher(), &index, "UBER TRIP").is_none());
    }

    #[test]
    fn candidates_without_shared_tokens_are_never_scored() {
        let index = CandidateIndex::from_history(vec![hist("h1", "NETFLIX", "software", 1)]);
        assert!(lookup(&matcher(), &index, "NETFLX").is_none());
    }

    #[test]
    fn picks_best_of_multiple_candidates() {
        let index = CandidateIndex::from_history(vec![
            hist("h1", "POSTO IPIRANGA CENTRO", "fuel", 1),
            hist("h2", "POSTO IPIRANGA", "fuel-fleet", 2),
        ]);
        let m = lookup(&matcher(), &index, "POSTO IPIRANGA").unwrap();
        assert_eq!(m.category.id, "fuel-fleet");
        assert_eq!(m.matched_transaction_id, "h2");
    }

    #[test]
    fn excludes_the_transaction_being_classified() {
        let index = CandidateIndex::from_history(vec![hist("tx-1", "SPOTIFY", "software", 1)]);
        let mut req = request("SPOTIFY");
        req.transaction_id = Some("tx-1".to_string());
        assert!(matcher().best_match("spotify", &req, &index).is_none());
    }

    #[test]
    fn same_type_only_filters_direction() {
        let mut income = hist("h1", "STRIPE TRANSFER", "sales", 1);
        income.transaction_type = TransactionType::Income;
        let index = CandidateIndex::from_history(vec![income]);
        assert!(lookup(&matcher(), &index, "STRIPE TRANSFER").is_none());

        let lenient = PatternMatcher::new(
            0.8,
            PatternConfig {
                same_type_only: false,
                ..PatternConfig::default()
            },
        );
        assert!(lookup(&lenient, &index, "STRIPE TRANSFER").is_some());
    }

    #[test]
    fn most_frequent_category_wins_near_ties() {
        let index = CandidateIndex::from_history(vec![
            hist("h1", "MERCADO LIVRE", "office", 1),
            hist("h2", "MERCADO LIVRE", "office", 2),
            hist("h3", "MERCADO LIVRE", "equipment", 20),
        ]);
        let m = lookup(&matcher(), &index, "MERCADO LIVRE").unwrap();
        assert_eq!(m.category.id, "office");
        assert_eq!(m.support, 2);
    }

    #[test]
    fn most_recent_tie_break() {
        let index = CandidateIndex::from_history(vec![
            hist("h1", "MERCADO LIVRE", "office", 1),
            hist("h2", "MERCADO LIVRE", "office", 2),
            hist("h3", "MERCADO LIVRE", "equipment", 20),
        ]);
        let m = PatternMatcher::new(
            0.8,
            PatternConfig {
                tie_break: TieBreak::MostRecent,
                ..PatternConfig::default()
            },
        );
        let hit = lookup(&m, &index, "MERCADO LIVRE").unwrap();
        assert_eq!(hit.category.id, "equipment");
        assert_eq!(hit.matched_transaction_id, "h3");
    }

    #[test]
    fn most_recent_support_counts_matching_cost_center_only() {
        let mut sales = hist("h1", "GOOGLE ADS", "marketing", 1);
        sales.cost_center = Some(CategoryRef::new("sales", "Sales"));
        let mut ops = hist("h2", "GOOGLE ADS", "marketing", 2);
        ops.cost_center = Some(CategoryRef::new("ops", "Operations"));
        let index = CandidateIndex::from_history(vec![sales, ops]);
        let m = PatternMatcher::new(
            0.8,
            PatternConfig {
                tie_break: TieBreak::MostRecent,
                ..PatternConfig::default()
            },
        );
        let hit = lookup(&m, &index, "GOOGLE ADS").unwrap();
        assert_eq!(hit.cost_center.map(|cc| cc.id), Some("ops".to_string()));
        assert_eq!(hit.support, 1);

        let hit = lookup(&matcher(), &index, "GOOGLE ADS").unwrap();
        assert_eq!(hit.support, 1);
    }

    #[test]
    fn equal_frequency_falls_back_to_recency() {
        let index = CandidateIndex::from_history(vec![
            hist("h1", "KALUNGA", "office", 3),
            hist("h2", "KALUNGA", "supplies", 9),
        ]);
        let m = lookup(&matcher(), &index, "KALUNGA").unwrap();
        assert_eq!(m.category.id, "supplies");
    }

    #[test]
    fn token_jaccard_metric() {
        let index = CandidateIndex::from_history(vec![hist("h1", "TRIP UBER", "travel", 1)]);
        let jaccard = PatternMatcher::new(
            0.8,
            PatternConfig {
                metric: SimilarityMetric::TokenJaccard,
                ..PatternConfig::default()
            },
        );
        assert_eq!(lookup(&jaccard, &index, "UBER TRIP").unwrap().score, 1.0);
        assert!(lookup(&matcher(), &index, "UBER TRIP").is_none());
    }

    #[test]
    fn never_returns_score_below_threshold() {
        let index = CandidateIndex::from_history(vec![
            hist("h1", "POSTO SHELL AV PAULISTA", "fuel", 1),
            hist("h2", "POSTO SHELL", "fuel", 2),
            hist("h3", "SHELL SELECT LOJA", "meals", 3),
            hist("h4", "PADARIA DO POSTO", "meals", 4),
        ]);
        for threshold in [0.3_f32, 0.6, 0.8, 0.95] {
            for tie_break in [TieBreak::MostFrequent, TieBreak::MostRecent] {
                let m = PatternMatcher::new(
                    threshold,
                    PatternConfig {
                        tie_break,
                        near_tie_epsilon: 0.5,
                        ..PatternConfig::default()
                    },
                );
                for desc in ["POSTO SHELL", "SHELL", "POSTO", "SHELL SELECT", "PADARIA POSTO SHELL"] {
                    if let Some(hit) = lookup(&m, &index, desc) {
                        assert!(hit.score >= threshold, "{desc}: {} < {threshold}", hit.score);
                    }
                }
            }
        }
    }

    #[test]
    fn empty_description_never_matches() {
        let index = CandidateIndex::from_history(vec![hist("h1", "IOF", "fees", 1)]);
        assert!(matcher().best_match("", &request("12345"), &index).is_none());
        assert_eq!(index.len(), 1);
    }
}
