// Text analysis helpers shared by the selector and the quality validator.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in whole seconds.
///
/// Store rows keep integer timestamps, matching the cache/memory schema.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Levenshtein edit distance over unicode scalar values.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Single-row DP, O(min) memory
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.iter().enumerate() {
        let mut prev = row[0];
        row[0] = i + 1;

        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            let next = (row[j] + 1).min(row[j + 1] + 1).min(prev + cost);
            prev = row[j + 1];
            row[j + 1] = next;
        }
    }

    row[b.len()]
}

/// Similarity of two strings in [0, 1] based on edit distance.
///
/// Two empty strings are considered identical (ratio 1.0).
pub fn similarity_ratio(a: &str, b: &str) -> f32 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f32 / max_len as f32
}

/// Split text into sentences on terminal punctuation, dropping empties.
pub fn sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Fraction of characters that are sentence punctuation.
pub fn punctuation_density(text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }
    let count = text.chars().filter(|c| ".!?,:;".contains(*c)).count();
    count as f32 / text.chars().count() as f32
}

/// True when the text contains a run of `min_run` or more identical
/// consecutive characters (a common sign of broken generation).
pub fn has_repeated_run(text: &str, min_run: usize) -> bool {
    let mut run = 0usize;
    let mut last: Option<char> = None;

    for c in text.chars() {
        if Some(c) == last {
            run += 1;
            if run >= min_run {
                return true;
            }
        } else {
            last = Some(c);
            run = 1;
            if run >= min_run {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("Hello", "He11o"), 2);
    }

    #[test]
    fn similarity_handles_unicode() {
        assert_eq!(similarity_ratio("", ""), 1.0);
        assert!(similarity_ratio("Привет мир", "Привет, мир!") > 0.7);
        assert_eq!(similarity_ratio("abc", "abc"), 1.0);
        assert_eq!(similarity_ratio("abc", "xyz"), 0.0);
    }

    #[test]
    fn sentence_split_drops_empties() {
        let s = sentences("One. Two!  Three?   ");
        assert_eq!(s, vec!["One", "Two", "Three"]);
        assert!(sentences("").is_empty());
    }

    #[test]
    fn repeated_run_detection() {
        assert!(has_repeated_run("aaaah", 4));
        assert!(!has_repeated_run("aaah", 4));
        assert!(!has_repeated_run("", 4));
        assert!(has_repeated_run("ха-ха-хааааа", 4));
    }

    #[test]
    fn punctuation_density_bounds() {
        assert_eq!(punctuation_density(""), 0.0);
        let d = punctuation_density("Hi, there. Ok!");
        assert!(d > 0.0 && d < 1.0);
    }
}
