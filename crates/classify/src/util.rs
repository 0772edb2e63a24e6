use std::collections::HashSet;

use fincat_core::SimilarityMetric;

/// Levenshtein edit distance over chars, using the two-row O(min(m,n)) space algorithm.
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    let (m, n) = (a.len(), b.len());

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    // Keep the shorter string in the inner loop to minimise allocation.
    let (a, b, m, n) = if m <= n { (a, b, m, n) } else { (b, a, n, m) };

    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0usize; m + 1];

    for j in 1..=n {
        curr[0] = j;
        for i in 1..=m {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[i] = (prev[i] + 1).min(curr[i - 1] + 1).min(prev[i - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[m]
}

/// `1 - distance / max_len`, in [0.0, 1.0]. Two empty strings are identical.
pub fn edit_ratio(s1: &str, s2: &str) -> f32 {
    if s1 == s2 {
        return 1.0;
    }
    let max_len = s1.chars().count().max(s2.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (levenshtein_distance(s1, s2) as f32 / max_len as f32)
}

/// Jaccard index over whitespace-separated tokens.
pub fn token_jaccard(s1: &str, s2: &str) -> f32 {
    let a: HashSet<&str> = s1.split_whitespace().collect();
    let b: HashSet<&str> = s2.split_whitespace().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.intersection(&b).count();
    let total = a.union(&b).count();
    shared as f32 / total as f32
}

pub fn similarity(metric: SimilarityMetric, s1: &str, s2: &str) -> f32 {
    match metric {
        SimilarityMetric::EditRatio => edit_ratio(s1, s2),
        SimilarityMetric::TokenJaccard => token_jaccard(s1, s2),
    }
}
