use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::store::FeedbackStore;
use crate::validation::patterns::COMMON_OCR_ERRORS;

static SPACE_BEFORE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([.!?,:;])").expect("valid regex"));
static MISSING_SPACE_AFTER_SENTENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.!?])\s*([A-Za-zА-Яа-яЁё])").expect("valid regex"));

/// Tiny synonym table for lexical translation variants.
const SYNONYMS: &[(&str, &str)] = &[
    ("хорошо", "отлично"),
    ("плохо", "ужасно"),
    ("большой", "огромный"),
    ("маленький", "крошечный"),
];

/// Produces replacement candidates for a winning text, in priority
/// order: user-approved corrections first, then deterministic error
/// fixes, then lexical variants.
pub struct AlternativeGenerator {
    feedback: Option<Arc<FeedbackStore>>,
    max_alternatives: usize,
}

impl AlternativeGenerator {
    pub fn new(feedback: Option<Arc<FeedbackStore>>, max_alternatives: usize) -> Self {
        Self {
            feedback,
            max_alternatives,
        }
    }

    /// Alternatives for one (source, current result) pair. Never
    /// includes the current text itself; capped at `max_alternatives`.
    pub fn generate(&self, original: &str, current: &str, is_translation: bool) -> Vec<String> {
        let mut alternatives: Vec<String> = Vec::new();

        // (a) corrections users rated >= 4/5 for this exact source
        if let Some(feedback) = &self.feedback {
            alternatives.extend(feedback.suggestions_for(original));
        }

        // (b) the common-error table, when applying it changes the text
        let corrected = self.apply_corrections(current);
        if corrected != current {
            alternatives.push(corrected);
        }

        // (c) cheap lexical variants, translations only
        if is_translation {
            alternatives.extend(lexical_variants(current));
        }

        // De-duplicate preserving priority order
        let mut unique: Vec<String> = Vec::new();
        for alt in alternatives {
            if alt != current && !alt.trim().is_empty() && !unique.contains(&alt) {
                unique.push(alt);
            }
            if unique.len() >= self.max_alternatives {
                break;
            }
        }
        unique
    }

    /// Apply the base confusion table, feedback-learned pairs, and
    /// punctuation normalization.
    pub fn apply_corrections(&self, text: &str) -> String {
        let mut corrected = text.to_string();

        for (wrong, right) in COMMON_OCR_ERRORS {
            corrected = corrected.replace(wrong, right);
        }
        if let Some(feedback) = &self.feedback {
            for (wrong, right) in feedback.corrections() {
                corrected = corrected.replace(&wrong, &right);
            }
        }

        let corrected = SPACE_BEFORE_PUNCT.replace_all(&corrected, "$1");
        let corrected = MISSING_SPACE_AFTER_SENTENCE.replace_all(&corrected, "$1 $2");
        corrected.into_owned()
    }
}

/// Word-order and synonym variations of a translation.
fn lexical_variants(text: &str) -> Vec<String> {
    let mut variants = Vec::new();

    // Swap the leading word pair
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() > 2 {
        let mut swapped: Vec<&str> = words.clone();
        swapped.swap(0, 1);
        variants.push(swapped.join(" "));
    }

    // First applicable synonym substitution
    for (word, synonym) in SYNONYMS {
        if text.contains(word) {
            variants.push(text.replace(word, synonym));
            break;
        }
    }

    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{FeedbackType, UserFeedback};
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn common_errors_produce_an_alternative() {
        let generator = AlternativeGenerator::new(None, 5);
        let alternatives = generator.generate("Hello", "He11o", false);
        assert_eq!(alternatives, vec!["HeIIo".to_string()]);
    }

    #[test]
    fn unchanged_text_produces_no_correction_alternative() {
        let generator = AlternativeGenerator::new(None, 5);
        assert!(generator.generate("Hello", "Hello", false).is_empty());
    }

    #[test]
    fn punctuation_spacing_is_normalized() {
        let generator = AlternativeGenerator::new(None, 5);
        assert_eq!(generator.apply_corrections("Wait , what ?"), "Wait, what?");
    }

    #[test]
    fn translation_variants_include_word_swap_and_synonyms() {
        let generator = AlternativeGenerator::new(None, 5);
        let alternatives = generator.generate("all good", "всё хорошо сегодня", true);
        assert!(alternatives.contains(&"хорошо всё сегодня".to_string()));
        assert!(alternatives.contains(&"всё отлично сегодня".to_string()));
    }

    #[test]
    fn feedback_corrections_come_first_and_cap_applies() {
        let dir = TempDir::new().unwrap();
        let feedback = FeedbackStore::open(&dir.path().join("feedback.db")).unwrap();
        feedback
            .record(&UserFeedback {
                original_text: "Hello world".to_string(),
                corrected_text: "Привет, мир!".to_string(),
                feedback_type: FeedbackType::TranslationCorrection,
                rating: 5,
                context: HashMap::new(),
            })
            .unwrap();

        let generator = AlternativeGenerator::new(Some(Arc::new(feedback)), 1);
        let alternatives = generator.generate("Hello world", "Привет мир", true);
        assert_eq!(alternatives, vec!["Привет, мир!".to_string()]);
    }
}
