use std::sync::Arc;
use tracing::warn;
use xxhash_rust::xxh3::xxh3_64;

use crate::core::config::ValidationConfig;
use crate::core::types::{
    EngineResult, QualityMetric, QualityScore, TranslationSample, ValidationResult,
    ValidationStatus,
};
use crate::store::{FeedbackStore, ValidationStore};
use crate::utils::text::{has_repeated_run, punctuation_density, sentences, similarity_ratio};
use crate::utils::now_secs;
use crate::validation::alternatives::AlternativeGenerator;
use crate::validation::patterns::{
    stop_words, suspicious_density, CONSISTENCY_WARN, MAX_TRANSLATION_CHARS,
    MIN_TRANSLATION_CHARS, PUNCTUATION_BAND, REPEATED_RUN_LEN,
};

/// How many translations alternatives are generated for per batch.
const ALTERNATIVE_SOURCES: usize = 3;

/// Independently scores OCR and translation batches for confidence,
/// internal consistency, and readability.
///
/// Operates on completed batches, not single items. Each call produces
/// one [`ValidationResult`], persisted for audit and never mutated.
pub struct QualityValidator {
    config: ValidationConfig,
    alternatives: AlternativeGenerator,
    store: Option<Arc<ValidationStore>>,
}

impl QualityValidator {
    pub fn new(
        config: ValidationConfig,
        feedback: Option<Arc<FeedbackStore>>,
        store: Option<Arc<ValidationStore>>,
    ) -> Self {
        let alternatives = AlternativeGenerator::new(feedback, config.max_alternatives);
        Self {
            config,
            alternatives,
            store,
        }
    }

    /// Validate a completed batch. Either slice may be empty; both empty
    /// is reported as a failure with an explicit issue, never an error.
    pub fn validate(
        &self,
        ocr_results: &[EngineResult],
        translations: &[TranslationSample],
    ) -> ValidationResult {
        if ocr_results.is_empty() && translations.is_empty() {
            let result = ValidationResult {
                status: ValidationStatus::Failed,
                overall_score: 0.0,
                metric_scores: Vec::new(),
                issues: vec!["empty text: no OCR or translation results to validate".to_string()],
                suggestions: Vec::new(),
                alternatives: Vec::new(),
                created_at: now_secs(),
            };
            self.persist("", &result);
            return result;
        }

        let mut metric_scores = Vec::new();
        let mut issues = Vec::new();
        let mut suggestions = Vec::new();

        if !ocr_results.is_empty() {
            let score = self.evaluate_ocr(ocr_results);
            if score.score < self.config.min_ocr_confidence {
                issues.push(format!("low OCR quality: {:.2}", score.score));
            }
            if let Some(consistency) = score.details.get("consistency_score").and_then(|v| v.as_f64())
            {
                if (consistency as f32) < CONSISTENCY_WARN {
                    issues.push(format!(
                        "OCR engines disagree on overlapping regions (consistency {consistency:.2})"
                    ));
                }
            }
            suggestions.extend(score.suggestions.clone());
            metric_scores.push(score);
        }

        if !translations.is_empty() {
            let score = self.evaluate_translation(translations);
            if score.score < self.config.min_translation_confidence {
                issues.push(format!("low translation quality: {:.2}", score.score));
            }
            suggestions.extend(score.suggestions.clone());
            metric_scores.push(score);

            if translations.iter().all(|t| t.translated_text.trim().is_empty()) {
                issues.push("empty text in every translation output".to_string());
            }

            let joined: Vec<String> =
                translations.iter().map(|t| t.translated_text.clone()).collect();
            let readability = self.evaluate_readability(&joined.join(" "));
            suggestions.extend(readability.suggestions.clone());
            metric_scores.push(readability);
        }

        let overall_score = if metric_scores.is_empty() {
            0.0
        } else {
            metric_scores.iter().map(|s| s.score).sum::<f32>() / metric_scores.len() as f32
        };

        let status = if overall_score >= self.config.min_overall_score {
            ValidationStatus::Passed
        } else if overall_score >= 0.5 {
            ValidationStatus::Warning
        } else if !issues.is_empty() {
            ValidationStatus::Failed
        } else {
            // Low score but no rule fired: ambiguous, hand it to a human
            ValidationStatus::NeedsReview
        };

        let mut alternatives = Vec::new();
        for sample in translations.iter().take(ALTERNATIVE_SOURCES) {
            alternatives.extend(self.alternatives.generate(
                &sample.source_text,
                &sample.translated_text,
                true,
            ));
        }
        dedup_preserving_order(&mut alternatives);
        alternatives.truncate(self.config.max_alternatives);

        dedup_preserving_order(&mut suggestions);

        let result = ValidationResult {
            status,
            overall_score: overall_score.clamp(0.0, 1.0),
            metric_scores,
            issues,
            suggestions,
            alternatives,
            created_at: now_secs(),
        };

        let hash_input: String = ocr_results
            .iter()
            .map(|r| r.text.as_str())
            .chain(translations.iter().map(|t| t.translated_text.as_str()))
            .collect::<Vec<_>>()
            .join("|");
        self.persist(&hash_input, &result);

        result
    }

    /// OCR quality: mean confidence (0.5), absence of suspicious
    /// artifacts (0.3), and cross-engine consistency (0.2).
    pub fn evaluate_ocr(&self, results: &[EngineResult]) -> QualityScore {
        let avg_confidence =
            results.iter().map(|r| r.confidence).sum::<f32>() / results.len() as f32;

        let all_text: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
        let all_text = all_text.join(" ");
        let suspicious = suspicious_density(&all_text);
        let consistency = ocr_consistency(results);

        let score = (avg_confidence * 0.5 + (1.0 - suspicious) * 0.3 + consistency * 0.2)
            .clamp(0.0, 1.0);

        let mut suggestions = Vec::new();
        if avg_confidence < self.config.min_ocr_confidence {
            suggestions.push("low OCR confidence, check the source image quality".to_string());
        }
        if suspicious > 0.3 {
            suggestions.push("suspicious characters detected, manual review recommended".to_string());
        }
        if consistency < 0.5 {
            suggestions.push("OCR engines strongly disagree, consider re-running with preprocessing".to_string());
        }

        QualityScore {
            metric: QualityMetric::OcrConfidence,
            score,
            confidence: 0.8,
            details: serde_json::json!({
                "avg_confidence": avg_confidence,
                "suspicious_score": suspicious,
                "consistency_score": consistency,
                "text_length": all_text.chars().count(),
                "result_count": results.len(),
            }),
            suggestions,
        }
    }

    /// Translation quality: mean confidence (0.4), heuristic per-output
    /// quality (0.4), and cross-engine consistency on shared sources (0.2).
    pub fn evaluate_translation(&self, samples: &[TranslationSample]) -> QualityScore {
        let avg_confidence =
            samples.iter().map(|s| s.confidence).sum::<f32>() / samples.len() as f32;

        let quality = samples
            .iter()
            .map(|s| translation_quality(&s.translated_text, &s.source_lang))
            .sum::<f32>()
            / samples.len() as f32;

        let consistency = translation_consistency(samples);

        let score =
            (avg_confidence * 0.4 + quality * 0.4 + consistency * 0.2).clamp(0.0, 1.0);

        let mut suggestions = Vec::new();
        if avg_confidence < self.config.min_translation_confidence {
            suggestions.push("low translation confidence, consider the listed alternatives".to_string());
        }
        if quality < 0.5 {
            suggestions.push("possible quality problems in the translated text".to_string());
        }
        if consistency < 0.4 {
            suggestions.push("translation engines diverge strongly on the same source".to_string());
        }

        QualityScore {
            metric: QualityMetric::TranslationConfidence,
            score,
            confidence: 0.7,
            details: serde_json::json!({
                "avg_confidence": avg_confidence,
                "quality_score": quality,
                "consistency_score": consistency,
                "translation_count": samples.len(),
            }),
            suggestions,
        }
    }

    /// Readability of the final target text: sentence and word length
    /// ceilings, rewarded punctuation density.
    pub fn evaluate_readability(&self, text: &str) -> QualityScore {
        if text.trim().is_empty() {
            return QualityScore {
                metric: QualityMetric::Readability,
                score: 0.0,
                confidence: 1.0,
                details: serde_json::json!({ "error": "empty text" }),
                suggestions: vec!["no text to analyze".to_string()],
            };
        }

        let sentence_lengths: Vec<usize> = sentences(text)
            .iter()
            .map(|s| s.split_whitespace().count())
            .collect();
        let avg_sentence_len = if sentence_lengths.is_empty() {
            0.0
        } else {
            sentence_lengths.iter().sum::<usize>() as f32 / sentence_lengths.len() as f32
        };

        let words: Vec<&str> = text.split_whitespace().collect();
        let avg_word_len = if words.is_empty() {
            0.0
        } else {
            words.iter().map(|w| w.chars().count()).sum::<usize>() as f32 / words.len() as f32
        };

        let mut score = 1.0f32;
        if avg_sentence_len > self.config.max_sentence_words as f32 {
            score -= 0.2;
        }
        if avg_word_len > self.config.max_word_chars as f32 {
            score -= 0.1;
        }

        let punctuation = punctuation_density(text);
        if (PUNCTUATION_BAND.0..=PUNCTUATION_BAND.1).contains(&punctuation) {
            score += 0.1;
        }

        let mut suggestions = Vec::new();
        if avg_sentence_len > self.config.max_sentence_words as f32 {
            suggestions.push("consider splitting long sentences".to_string());
        }
        if punctuation == 0.0 {
            suggestions.push("add punctuation to improve readability".to_string());
        }

        QualityScore {
            metric: QualityMetric::Readability,
            score: score.clamp(0.0, 1.0),
            confidence: 0.8,
            details: serde_json::json!({
                "avg_sentence_length": avg_sentence_len,
                "avg_word_length": avg_word_len,
                "punctuation_density": punctuation,
                "sentence_count": sentence_lengths.len(),
                "word_count": words.len(),
            }),
            suggestions,
        }
    }

    fn persist(&self, hash_input: &str, result: &ValidationResult) {
        if let Some(store) = &self.store {
            let text_hash = format!("{:016x}", xxh3_64(hash_input.as_bytes()));
            if let Err(e) = store.record(&text_hash, result) {
                warn!(error = %e, "failed to persist validation result");
            }
        }
    }
}

/// Per-output heuristic quality in [0, 1]: penalizes surviving source
/// stop-words, degenerate lengths, and repeated-character runs.
fn translation_quality(text: &str, source_lang: &str) -> f32 {
    if text.trim().is_empty() {
        return 0.0;
    }

    let mut score = 1.0f32;

    let stops = stop_words(source_lang);
    let words: Vec<String> = text
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .collect();
    if !words.is_empty() {
        let untranslated = words.iter().filter(|w| stops.contains(&w.as_str())).count();
        score -= untranslated as f32 / words.len() as f32 * 0.5;
    }

    let chars = text.chars().count();
    if chars < MIN_TRANSLATION_CHARS {
        score -= 0.3;
    } else if chars > MAX_TRANSLATION_CHARS {
        score -= 0.2;
    }

    if has_repeated_run(text, REPEATED_RUN_LEN) {
        score -= 0.3;
    }

    score.max(0.0)
}

/// Group OCR results whose boxes overlap and average pairwise text
/// similarity inside each group. No overlaps means nothing disagrees,
/// which scores a full 1.0.
fn ocr_consistency(results: &[EngineResult]) -> f32 {
    if results.len() < 2 {
        return 1.0;
    }

    let boxed: Vec<&EngineResult> = results.iter().filter(|r| r.bbox.is_some()).collect();
    let mut groups: Vec<Vec<&EngineResult>> = Vec::new();
    for result in boxed {
        let bbox = result.bbox.expect("filtered to boxed results");
        match groups.iter_mut().find(|group| {
            group
                .iter()
                .any(|member| member.bbox.expect("boxed").intersects(&bbox))
        }) {
            Some(group) => group.push(result),
            None => groups.push(vec![result]),
        }
    }

    let mut group_scores = Vec::new();
    for group in groups.iter().filter(|g| g.len() > 1) {
        let mut similarities = Vec::new();
        for i in 0..group.len() {
            for j in (i + 1)..group.len() {
                similarities.push(similarity_ratio(&group[i].text, &group[j].text));
            }
        }
        if !similarities.is_empty() {
            group_scores.push(similarities.iter().sum::<f32>() / similarities.len() as f32);
        }
    }

    if group_scores.is_empty() {
        1.0
    } else {
        group_scores.iter().sum::<f32>() / group_scores.len() as f32
    }
}

/// Same pairwise-similarity technique, grouped by identical source text.
fn translation_consistency(samples: &[TranslationSample]) -> f32 {
    if samples.len() < 2 {
        return 1.0;
    }

    let mut groups: std::collections::HashMap<&str, Vec<&str>> = std::collections::HashMap::new();
    for sample in samples {
        groups
            .entry(sample.source_text.as_str())
            .or_default()
            .push(sample.translated_text.as_str());
    }

    let mut group_scores = Vec::new();
    for translations in groups.values().filter(|t| t.len() > 1) {
        let mut similarities = Vec::new();
        for i in 0..translations.len() {
            for j in (i + 1)..translations.len() {
                similarities.push(similarity_ratio(translations[i], translations[j]));
            }
        }
        if !similarities.is_empty() {
            group_scores.push(similarities.iter().sum::<f32>() / similarities.len() as f32);
        }
    }

    if group_scores.is_empty() {
        1.0
    } else {
        group_scores.iter().sum::<f32>() / group_scores.len() as f32
    }
}

fn dedup_preserving_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}
