use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: '{value}'")]
    InvalidOverride { key: String, value: String },
    #[error("{0} must be within [0, 1], got {1}")]
    OutOfRange(&'static str, f32),
    #[error("suggest confidence ({suggest}) must not exceed auto-validate confidence ({auto})")]
    InvertedTiers { suggest: f32, auto: f32 },
    #[error("ai.max_concurrency must be at least 1")]
    ZeroConcurrency,
}

/// Deployment-wide knobs for the classification engine. Never varied per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClassifierConfig {
    pub thresholds: Thresholds,
    pub pattern: PatternConfig,
    pub transfer: TransferConfig,
    pub ai: AiConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub rule_similarity: f32,
    pub pattern_similarity: f32,
    pub auto_validate: f32,
    pub suggest: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            rule_similarity: 0.80,
            pattern_similarity: 0.80,
            auto_validate: 0.85,
            suggest: 0.60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// 1 - levenshtein / max length, over the whole normalized string.
    #[default]
    EditRatio,
    /// |A ∩ B| / |A ∪ B| over whitespace tokens.
    TokenJaccard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    #[default]
    MostFrequent,
    MostRecent,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub metric: SimilarityMetric,
    pub tie_break: TieBreak,
    /// Candidates scoring within this distance of the best count as tied.
    pub near_tie_epsilon: f32,
    /// Only compare against history of the same direction (income vs expense).
    pub same_type_only: bool,
    pub cache_ttl_secs: u64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            metric: SimilarityMetric::default(),
            tie_break: TieBreak::default(),
            near_tie_epsilon: 0.02,
            same_type_only: true,
            cache_ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Aliases shorter than this (after normalization) are too ambiguous to trust.
    pub min_alias_chars: usize,
    pub min_account_digits: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            min_alias_chars: 4,
            min_account_digits: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Base URL of an OpenAI-compatible API. No endpoint, no AI fallback.
    pub endpoint: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
    pub max_concurrency: usize,
    pub temperature: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            timeout_ms: 8_000,
            max_concurrency: 4,
            temperature: 0.0,
        }
    }
}

impl ClassifierConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_content)?)
    }

    /// File (if any) → environment overrides → validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_toml(&std::fs::read_to_string(p)?)?,
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let t = &mut self.thresholds;
        override_parsed(&lookup, "FINCAT_RULE_SIMILARITY_THRESHOLD", &mut t.rule_similarity)?;
        override_parsed(&lookup, "FINCAT_PATTERN_SIMILARITY_THRESHOLD", &mut t.pattern_similarity)?;
        override_parsed(&lookup, "FINCAT_AUTO_VALIDATE_CONFIDENCE", &mut t.auto_validate)?;
        override_parsed(&lookup, "FINCAT_SUGGEST_CONFIDENCE", &mut t.suggest)?;

        if let Some(endpoint) = lookup("FINCAT_AI_ENDPOINT") {
            self.ai.endpoint = Some(endpoint).filter(|e| !e.is_empty());
        }
        if let Some(model) = lookup("FINCAT_AI_MODEL") {
            self.ai.model = model;
        }
        if let Some(key) = lookup("FINCAT_AI_API_KEY") {
            self.ai.api_key = Some(key).filter(|k| !k.is_empty());
        }
        override_parsed(&lookup, "FINCAT_AI_TIMEOUT_MS", &mut self.ai.timeout_ms)?;
        override_parsed(&lookup, "FINCAT_AI_MAX_CONCURRENCY", &mut self.ai.max_concurrency)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        for (name, value) in [
            ("thresholds.rule_similarity", t.rule_similarity),
            ("thresholds.pattern_similarity", t.pattern_similarity),
            ("thresholds.auto_validate", t.auto_validate),
            ("thresholds.suggest", t.suggest),
            ("pattern.near_tie_epsilon", self.pattern.near_tie_epsilon),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange(name, value));
            }
        }
        if t.suggest > t.auto_validate {
            return Err(ConfigError::InvertedTiers {
                suggest: t.suggest,
                auto: t.auto_validate,
            });
        }
        if self.ai.max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = lookup(key) {
        *target = raw.trim().parse().map_err(|_| ConfigError::InvalidOverride {
            key: key.to_string(),
            value: raw.clone(),
        })?;
    }
    Ok(())
}
