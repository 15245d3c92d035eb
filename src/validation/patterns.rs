// Quality patterns: what broken OCR output and broken translations
// look like, encoded as data.

use once_cell::sync::Lazy;
use regex::Regex;

/// Regexes matching artifacts that rarely occur in clean recognized
/// text: case flips inside a token, digits glued to letters, and
/// symbols outside normal prose punctuation.
pub static SUSPICIOUS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"[a-zа-яё][A-ZА-ЯЁ]").expect("valid regex"),
        Regex::new(r"\d[a-zA-Zа-яА-ЯёЁ]").expect("valid regex"),
        Regex::new(r#"[^\w\s.,!?;:()"'-]"#).expect("valid regex"),
    ]
});

/// Density of suspicious artifacts in [0, 1], scaled so that roughly
/// one artifact per ten characters saturates the score.
pub fn suspicious_density(text: &str) -> f32 {
    if text.is_empty() {
        return 1.0;
    }
    let count: usize = SUSPICIOUS_PATTERNS
        .iter()
        .map(|re| re.find_iter(text).count())
        .sum();
    let ratio = count as f32 / text.chars().count() as f32;
    (ratio * 10.0).min(1.0)
}

/// Source-language stop-words that should not survive into the target
/// text of a translation.
pub fn stop_words(lang: &str) -> &'static [&'static str] {
    match lang {
        "en" => &["the", "and", "or", "but", "in", "on", "at", "to", "for"],
        "de" => &["der", "die", "das", "und", "oder", "aber"],
        "fr" => &["le", "la", "les", "et", "ou", "mais"],
        _ => &[],
    }
}

/// Deterministic table of confusion pairs OCR engines commonly emit.
/// Feedback-learned pairs extend this at runtime.
pub const COMMON_OCR_ERRORS: &[(&str, &str)] =
    &[("rn", "m"), ("cl", "d"), ("0", "O"), ("1", "I"), ("5", "S")];

/// Runs of this many identical characters signal broken generation.
pub const REPEATED_RUN_LEN: usize = 4;

/// Outputs shorter than this are near-empty and suspicious.
pub const MIN_TRANSLATION_CHARS: usize = 3;

/// Outputs longer than this are suspiciously verbose for a bubble.
pub const MAX_TRANSLATION_CHARS: usize = 200;

/// Punctuation density band that reads naturally.
pub const PUNCTUATION_BAND: (f32, f32) = (0.05, 0.15);

/// Below this cross-engine agreement, record an explicit issue.
pub const CONSISTENCY_WARN: f32 = 0.8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_has_low_density() {
        assert!(suspicious_density("Hello there, how are you?") < 0.1);
    }

    #[test]
    fn garbled_text_has_high_density() {
        assert!(suspicious_density("He11o w0rld @#$") > 0.5);
        assert_eq!(suspicious_density(""), 1.0);
    }

    #[test]
    fn mixed_case_mid_token_is_suspicious() {
        assert!(suspicious_density("heLLo woRld") > 0.0);
    }

    #[test]
    fn stop_word_tables() {
        assert!(stop_words("en").contains(&"the"));
        assert!(stop_words("ja").is_empty());
    }
}
