//! Canonical matching key for free-text bank descriptions.
//!
//! Recurring charges from the same merchant differ month to month only in
//! reference numbers, dates and trailing IDs. Normalization folds case, strips
//! diacritics and drops those transient tokens so the key stays stable.

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// dd/mm, dd/mm/yy, yyyy-mm-dd, dd.mm.yyyy ...
re!(re_date, r"\b\d{1,4}[/.\-]\d{1,2}(?:[/.\-]\d{2,4})?\b");

/// Normalize a raw description. Pure: the same input always yields the same key.
pub fn normalize(description: &str) -> String {
    let folded = fold_case(description);
    let without_dates = re_date().replace_all(&folded, " ");

    spaced(&without_dates)
        .split_whitespace()
        .filter(|token| !is_transient(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Case, diacritic and punctuation folding only. Unlike [`normalize`], every
/// token survives, digits included.
pub fn fold(description: &str) -> String {
    spaced(&fold_case(description))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn fold_case(s: &str) -> String {
    s.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

fn spaced(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect()
}

/// Tokens that vary per occurrence: numbers, mostly-numeric tokens, and long
/// letter/digit mixes such as authorization codes.
fn is_transient(token: &str) -> bool {
    let len = token.chars().count();
    let digits = token.chars().filter(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return false;
    }
    digits * 2 >= len || len >= 6
}
