//! Cheap deterministic label reconciliation.
//!
//! Model output rarely echoes canonical labels verbatim (casing, plurals,
//! paraphrase). These helpers map an extracted label onto a known list
//! without another model round-trip.

const WORD_OVERLAP_WEIGHT: f64 = 0.7;
const EDIT_DISTANCE_WEIGHT: f64 = 0.3;

/// Best canonical option for `candidate`.
///
/// Returns `None` only when `options` is empty. Matching order: exact
/// (case-insensitive), containment in either direction, word overlap, and
/// finally the first option as a deterministic fallback.
pub fn closest_match<'a, S: AsRef<str>>(candidate: &str, options: &'a [S]) -> Option<&'a str> {
    let first = options.first()?.as_ref();
    let needle = normalize(candidate);
    if needle.is_empty() {
        return Some(first);
    }

    let normalized: Vec<(String, &'a str)> = options
        .iter()
        .map(|o| (normalize(o.as_ref()), o.as_ref()))
        .collect();

    if let Some((_, original)) = normalized.iter().find(|(n, _)| *n == needle) {
        return Some(original);
    }

    if let Some((_, original)) = normalized
        .iter()
        .find(|(n, _)| {
            !n.is_empty() && (needle.contains(n.as_str()) || n.contains(needle.as_str()))
        })
    {
        return Some(original);
    }

    let candidate_words: Vec<&str> = needle.split_whitespace().collect();
    if let Some((_, original)) = normalized.iter().find(|(n, _)| {
        n.split_whitespace()
            .any(|ow| candidate_words.iter().any(|cw| words_overlap(cw, ow)))
    }) {
        return Some(original);
    }

    Some(first)
}

/// Similarity in `[0, 1]`: `0.7 * word overlap + 0.3 * normalized edit distance`.
///
/// Word overlap is counted from both sides and averaged, so the score is
/// symmetric. Identical (normalized) strings score 1, an empty side scores 0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let a_words: Vec<&str> = a.split_whitespace().collect();
    let b_words: Vec<&str> = b.split_whitespace().collect();
    let max_words = a_words.len().max(b_words.len()) as f64;
    let a_hits = count_overlapping_words(&a_words, &b_words) as f64;
    let b_hits = count_overlapping_words(&b_words, &a_words) as f64;
    let word_score = ((a_hits + b_hits) / 2.0) / max_words;

    let max_len = a.chars().count().max(b.chars().count()) as f64;
    let edit_score = 1.0 - levenshtein_distance(&a, &b) as f64 / max_len;

    (WORD_OVERLAP_WEIGHT * word_score + EDIT_DISTANCE_WEIGHT * edit_score).clamp(0.0, 1.0)
}

/// Classic dynamic-programming edit distance over chars (unit costs).
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0usize; b_chars.len() + 1];

    for (i, ac) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, bc) in b_chars.iter().enumerate() {
            let cost = usize::from(ac != bc);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

fn words_overlap(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

fn count_overlapping_words(from: &[&str], against: &[&str]) -> usize {
    from.iter()
        .filter(|w| against.iter().any(|o| words_overlap(w, o)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEGMENTS: [&str; 3] = ["Freelancers", "Small Agencies", "Corporate Teams"];

    #[test]
    fn levenshtein_known_values() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
        assert_eq!(levenshtein_distance("café", "cafe"), 1);
    }

    #[test]
    fn similarity_identity_is_one() {
        for s in ["Freelancers", "a", "Small Agencies", "  mixed Case  "] {
            assert_eq!(similarity(s, s), 1.0);
        }
        assert_eq!(similarity("FREELANCERS", "freelancers"), 1.0);
    }

    #[test]
    fn similarity_empty_is_zero() {
        assert_eq!(similarity("", "Freelancers"), 0.0);
        assert_eq!(similarity("Freelancers", "   "), 0.0);
    }

    #[test]
    fn similarity_is_symmetric() {
        let pairs = [
            ("a b c", "abc"),
            ("freelance workers", "Freelancers"),
            ("small agency owners", "Small Agencies"),
            ("Part-time hobbyists", "Corporate Teams"),
            ("x", "a much longer label"),
        ];
        for (a, b) in pairs {
            assert!((similarity(a, b) - similarity(b, a)).abs() < 1e-12, "{a} / {b}");
        }
    }

    #[test]
    fn similarity_stays_in_unit_range() {
        let score = similarity("a b c d e", "abcde");
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn fuzzy_plural_label_clears_threshold() {
        assert!(similarity("freelance workers", "Freelancers") > 0.5);
        assert!(similarity("Part-time hobbyists", "Freelancers") <= 0.5);
    }

    #[test]
    fn closest_match_prefers_exact() {
        assert_eq!(closest_match("small agencies", &SEGMENTS), Some("Small Agencies"));
    }

    #[test]
    fn closest_match_uses_containment() {
        assert_eq!(
            closest_match("Corporate Teams (enterprise)", &SEGMENTS),
            Some("Corporate Teams")
        );
        assert_eq!(closest_match("agencies", &SEGMENTS), Some("Small Agencies"));
    }

    #[test]
    fn closest_match_uses_word_overlap() {
        assert_eq!(closest_match("freelance workers", &SEGMENTS), Some("Freelancers"));
        assert_eq!(closest_match("corporate buyers", &SEGMENTS), Some("Corporate Teams"));
    }

    #[test]
    fn closest_match_is_total_for_non_empty_options() {
        for candidate in ["", "   ", "zzz", "Part-time hobbyists", "🚀"] {
            let found = closest_match(candidate, &SEGMENTS).unwrap();
            assert!(SEGMENTS.contains(&found));
        }
        assert_eq!(closest_match("zzz", &SEGMENTS), Some("Freelancers"));
    }

    #[test]
    fn closest_match_empty_options_is_none() {
        let empty: [&str; 0] = [];
        assert_eq!(closest_match("Freelancers", &empty), None);
    }

    #[test]
    fn closest_match_accepts_owned_strings() {
        let owned: Vec<String> = SEGMENTS.iter().map(|s| s.to_string()).collect();
        assert_eq!(closest_match("FREELANCERS", &owned), Some("Freelancers"));
    }
}
