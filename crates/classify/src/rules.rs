use fincat_core::{Rule, RuleMatchType, ValidatedRequest};
use regex::{Regex, RegexBuilder};

use crate::normalize::normalize;
use crate::util::edit_ratio;

/// A rule that cleared its acceptance threshold for a given description.
#[derive(Debug, Clone)]
pub struct RuleMatch<'a> {
    pub rule: &'a Rule,
    pub score: f32,
}

/// Internal pairing of a rule with its normalized pattern and precompiled regex.
struct CompiledRule {
    rule: Rule,
    pattern: String,
    compiled_regex: Option<Regex>,
}

/// Evaluates one organization's active rules against normalized descriptions.
pub struct RuleMatcher {
    rules: Vec<CompiledRule>,
    threshold: f32,
}

impl RuleMatcher {
    pub fn new(rules: Vec<Rule>, threshold: f32) -> Self {
        let mut compiled: Vec<CompiledRule> = rules
            .into_iter()
            .filter(|rule| rule.is_active)
            .filter_map(compile)
            .collect();
        // Most recently created first, so a forward scan resolves score ties.
        compiled.sort_by(|a, b| {
            b.rule
                .created_at
                .cmp(&a.rule.created_at)
                .then_with(|| a.rule.id.cmp(&b.rule.id))
        });
        Self {
            rules: compiled,
            threshold,
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Highest-scoring rule whose score clears `max(global, rule.threshold)`.
    pub fn best_match(&self, normalized: &str, request: &ValidatedRequest) -> Option<RuleMatch<'_>> {
        let mut best: Option<RuleMatch<'_>> = None;
        for cr in &self.rules {
            if !applies_to(&cr.rule, request) {
                continue;
            }
            let score = score(cr, normalized);
            let required = cr.rule.threshold.map_or(self.threshold, |t| t.max(self.threshold));
            if score < required {
                continue;
            }
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(RuleMatch {
                    rule: &cr.rule,
                    score,
                });
            }
        }
        best
    }
}

fn compile(rule: Rule) -> Option<CompiledRule> {
    if let RuleMatchType::Regex = rule.match_type {
        return match RegexBuilder::new(&rule.pattern).case_insensitive(true).build() {
            Ok(re) => Some(CompiledRule {
                pattern: rule.pattern.clone(),
                compiled_regex: Some(re),
                rule,
            }),
            Err(e) => {
                tracing::warn!(rule_id = %rule.id, "skipping rule with invalid regex: {e}");
                None
            }
        };
    }

    let pattern = normalize(&rule.pattern);
    if pattern.is_empty() {
        tracing::warn!(rule_id = %rule.id, "skipping rule whose pattern normalizes to nothing");
        return None;
    }
    Some(CompiledRule {
        rule,
        pattern,
        compiled_regex: None,
    })
}

/// Amount range and direction filters, checked before any scoring.
fn applies_to(rule: &Rule, request: &ValidatedRequest) -> bool {
    if let Some(min) = rule.amount_min {
        if request.amount < min {
            return false;
        }
    }
    if let Some(max) = rule.amount_max {
        if request.amount > max {
            return false;
        }
    }
    rule.transaction_type
        .map_or(true, |t| t == request.transaction_type)
}

fn score(cr: &CompiledRule, text: &str) -> f32 {
    let hit = match cr.rule.match_type {
        RuleMatchType::Contains => text.contains(&cr.pattern),
        RuleMatchType::Exact => text == cr.pattern,
        RuleMatchType::StartsWith => text.starts_with(&cr.pattern),
        RuleMatchType::Regex => {
            return if cr.compiled_regex.as_ref().is_some_and(|re| re.is_match(text)) {
                1.0
            } else {
                0.0
            };
        }
        RuleMatchType::Fuzzy => false,
    };
    if hit {
        1.0
    } else {
        edit_ratio(text, &cr.pattern)
    }
}
