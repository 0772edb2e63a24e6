use std::sync::OnceLock;

use fincat_core::{InternalAccount, TransferConfig};
use regex::Regex;

use crate::normalize::fold;

fn re_digit_run() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"\d(?:[\d.\-/]*\d)?").expect("invalid regex"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvidence {
    Alias(String),
    AccountNumber(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferMatch {
    pub account_id: String,
    pub account_name: String,
    pub evidence: TransferEvidence,
}

struct AliasKey {
    account: usize,
    alias: String,
    tokens: Vec<String>,
}

struct NumberKey {
    account: usize,
    digits: String,
}

/// Recognizes money moving between an organization's own accounts.
/// Only unambiguous evidence counts; anything else falls through to
/// normal classification.
pub struct TransferDetector {
    accounts: Vec<InternalAccount>,
    aliases: Vec<AliasKey>,
    numbers: Vec<NumberKey>,
}

impl TransferDetector {
    pub fn new(accounts: Vec<InternalAccount>, config: &TransferConfig) -> Self {
        let mut aliases = Vec::new();
        let mut numbers = Vec::new();

        for (i, account) in accounts.iter().enumerate() {
            for raw in &account.aliases {
                let alias = fold(raw);
                if alias.chars().filter(|c| !c.is_whitespace()).count() < config.min_alias_chars {
                    tracing::debug!(account_id = %account.id, alias = %raw, "ignoring ambiguous short alias");
                    continue;
                }
                aliases.push(AliasKey {
                    account: i,
                    tokens: alias.split_whitespace().map(str::to_string).collect(),
                    alias,
                });
            }
            if let Some(number) = &account.account_number {
                let digits: String = number.chars().filter(char::is_ascii_digit).collect();
                if digits.len() >= config.min_account_digits {
                    numbers.push(NumberKey { account: i, digits });
                }
            }
        }

        Self {
            accounts,
            aliases,
            numbers,
        }
    }

    /// Aliases match whole folded tokens of `raw`, digits included, so an
    /// alias carrying an account number never matches on its words alone.
    pub fn detect(&self, raw: &str) -> Option<TransferMatch> {
        let folded = fold(raw);
        let tokens: Vec<&str> = folded.split_whitespace().collect();
        let by_alias = self.aliases.iter().find(|key| {
            !key.tokens.is_empty()
                && tokens
                    .windows(key.tokens.len())
                    .any(|w| w.iter().zip(&key.tokens).all(|(a, b)| *a == b.as_str()))
        });
        if let Some(key) = by_alias {
            return Some(self.matched(key.account, TransferEvidence::Alias(key.alias.clone())));
        }

        let runs: Vec<String> = re_digit_run()
            .find_iter(raw)
            .map(|m| m.as_str().chars().filter(char::is_ascii_digit).collect())
            .collect();
        self.numbers
            .iter()
            .find(|key| runs.iter().any(|run| run.contains(&key.digits)))
            .map(|key| self.matched(key.account, TransferEvidence::AccountNumber(key.digits.clone())))
    }

    fn matched(&self, account: usize, evidence: TransferEvidence) -> TransferMatch {
        let account = &self.accounts[account];
        TransferMatch {
            account_id: account.id.clone(),
            account_name: account.name.clone(),
            evidence,
        }
    }
}
