// Pipeline facade: request envelopes in, response envelopes out.

pub mod context;

pub use context::PipelineContext;

use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

use crate::consensus::{ConsensusCoordinator, ResultSelector};
use crate::core::config::Config;
use crate::core::errors::{PipelineError, StoreResult};
use crate::core::types::{
    ApiError, EngineResult, PipelineRequest, PipelineResponse, RecognitionRequest, Selection,
    TranslationRequest, TranslationSample, UserFeedback, ValidationResult,
};
use crate::engines::EngineCapabilities;
use crate::validation::QualityValidator;

/// Top-level entry point tying the coordinator and validator together.
pub struct Pipeline {
    context: PipelineContext,
    coordinator: ConsensusCoordinator,
    validator: QualityValidator,
}

impl Pipeline {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let context = PipelineContext::initialize(Arc::clone(&config))?;

        let selector = ResultSelector::new(
            config.engines.priorities.clone(),
            config.consensus.latency_penalty_ms,
            config.consensus.max_alternatives,
        );
        let coordinator = ConsensusCoordinator::new(
            Arc::clone(&context.registry),
            context.cache.clone(),
            context.memory.clone(),
            selector,
            config.consensus.clone(),
            context.metrics.clone(),
        );
        let validator = QualityValidator::new(
            config.validation.clone(),
            context.feedback.clone(),
            context.validation_store.clone(),
        );

        info!("Pipeline initialized");
        Ok(Self {
            context,
            coordinator,
            validator,
        })
    }

    pub fn metrics(&self) -> &crate::utils::Metrics {
        &self.context.metrics
    }

    /// Translate one text through the consensus pipeline and validate
    /// the surviving candidates.
    #[instrument(skip(self, request))]
    pub async fn translate(&self, request: &PipelineRequest) -> PipelineResponse {
        let start = Instant::now();

        let Some(content) = request.content.as_deref().filter(|c| !c.trim().is_empty()) else {
            return self.fail(
                "INVALID_REQUEST",
                "translation requests need non-empty `content`".to_string(),
                start,
            );
        };
        let Some(target_lang) = request.target_lang.as_deref() else {
            return self.fail(
                "INVALID_REQUEST",
                "translation requests need `target_lang`".to_string(),
                start,
            );
        };

        let translation_request = TranslationRequest {
            text: content.to_string(),
            source_lang: request.source_lang.clone(),
            target_lang: target_lang.to_string(),
            domain: request.domain.unwrap_or_default(),
            priority: 1,
        };

        match self
            .coordinator
            .translate(&translation_request, request.engine_override.as_deref())
            .await
        {
            Ok(selection) => {
                let samples = translation_samples(&translation_request, &selection);
                let validation = self.validator.validate(&[], &samples);
                self.context.metrics.record_validation(validation.status.as_str());
                self.respond(selection, Some(validation), start)
            }
            Err(e) => self.fail(e.code(), e.to_string(), start),
        }
    }

    /// Recognize text in one image region and validate the candidates.
    #[instrument(skip(self, request))]
    pub async fn recognize(&self, request: &PipelineRequest) -> PipelineResponse {
        let start = Instant::now();

        let Some(image_b64) = request.image.as_deref() else {
            return self.fail(
                "INVALID_REQUEST",
                "recognition requests need a base64 `image`".to_string(),
                start,
            );
        };
        let image_bytes = match general_purpose::STANDARD.decode(image_b64) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                return self.fail("INVALID_REQUEST", "empty image payload".to_string(), start)
            }
            Err(e) => {
                return self.fail(
                    "INVALID_REQUEST",
                    format!("image is not valid base64: {e}"),
                    start,
                )
            }
        };

        let languages = request
            .languages
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| vec![request.source_lang.clone()]);

        let recognition_request = RecognitionRequest {
            image_bytes,
            languages,
            bbox: request.regions.as_ref().and_then(|r| r.first().copied()),
            params: HashMap::new(),
        };

        match self
            .coordinator
            .recognize(&recognition_request, request.engine_override.as_deref())
            .await
        {
            Ok(selection) => {
                let mut batch = vec![selection.winner.clone()];
                batch.extend(selection.alternatives.iter().cloned());
                let validation = self.validator.validate(&batch, &[]);
                self.context.metrics.record_validation(validation.status.as_str());
                self.respond(selection, Some(validation), start)
            }
            Err(e) => self.fail(e.code(), e.to_string(), start),
        }
    }

    /// Score an externally assembled batch without dispatching engines.
    pub fn validate_batch(
        &self,
        ocr_results: &[EngineResult],
        translations: &[TranslationSample],
    ) -> ValidationResult {
        let result = self.validator.validate(ocr_results, translations);
        self.context.metrics.record_validation(result.status.as_str());
        result
    }

    /// Append user feedback; highly rated corrections start influencing
    /// alternatives immediately.
    pub fn submit_feedback(&self, feedback: &UserFeedback) -> Result<(), PipelineError> {
        if !(1..=5).contains(&feedback.rating) {
            return Err(PipelineError::InvalidRequest(format!(
                "rating must be 1-5, got {}",
                feedback.rating
            )));
        }
        match &self.context.feedback {
            Some(store) => store.record(feedback).map_err(PipelineError::Store),
            None => Err(PipelineError::InvalidRequest(
                "feedback store is unavailable".to_string(),
            )),
        }
    }

    pub fn engines(&self) -> Vec<EngineCapabilities> {
        self.context.registry.capabilities()
    }

    /// Reclaim expired cache and validation rows.
    pub fn sweep_stores(&self) -> StoreResult<usize> {
        let mut removed = 0;
        if let Some(cache) = &self.context.cache {
            removed += cache.sweep_expired()?;
        }
        if let Some(validation) = &self.context.validation_store {
            removed += validation.sweep_expired()?;
        }
        Ok(removed)
    }

    /// Combined runtime and store statistics for the /stats surface.
    pub fn stats(&self) -> serde_json::Value {
        let mut stats = serde_json::Map::new();
        stats.insert("runtime".to_string(), self.context.metrics.snapshot());

        if let Some(cache) = &self.context.cache {
            if let Ok(s) = cache.stats() {
                stats.insert("cache".to_string(), s);
            }
        }
        if let Some(memory) = &self.context.memory {
            if let Ok(len) = memory.len() {
                stats.insert("memory".to_string(), serde_json::json!({ "entries": len }));
            }
        }
        if let Some(feedback) = &self.context.feedback {
            if let Ok(s) = feedback.stats() {
                stats.insert("feedback".to_string(), s);
            }
        }
        if let Some(validation) = &self.context.validation_store {
            if let Ok(s) = validation.recent_stats() {
                stats.insert("validation".to_string(), s);
            }
        }

        serde_json::Value::Object(stats)
    }

    fn respond(
        &self,
        selection: Selection,
        validation: Option<ValidationResult>,
        start: Instant,
    ) -> PipelineResponse {
        let elapsed = start.elapsed();
        self.context.metrics.record_request(true, elapsed);

        let mut results = vec![selection.winner];
        results.extend(selection.alternatives);

        PipelineResponse {
            success: true,
            results,
            validation,
            processing_time_ms: elapsed.as_millis() as u64,
            errors: Vec::new(),
        }
    }

    fn fail(&self, code: &str, message: String, start: Instant) -> PipelineResponse {
        let elapsed = start.elapsed();
        self.context.metrics.record_request(false, elapsed);
        PipelineResponse {
            success: false,
            results: Vec::new(),
            validation: None,
            processing_time_ms: elapsed.as_millis() as u64,
            errors: vec![ApiError {
                code: code.to_string(),
                message,
            }],
        }
    }
}

/// Every surviving candidate becomes a validator sample, so consistency
/// is judged across the engines that actually voted.
fn translation_samples(request: &TranslationRequest, selection: &Selection) -> Vec<TranslationSample> {
    std::iter::once(&selection.winner)
        .chain(selection.alternatives.iter())
        .map(|result| TranslationSample {
            source_text: request.text.clone(),
            translated_text: result.text.clone(),
            source_lang: request.source_lang.clone(),
            confidence: result.confidence,
            engine_id: result.engine_id.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{
        ConsensusConfig, DispatchMode, EngineConfig, ServerConfig, StoreConfig, ValidationConfig,
    };
    use crate::core::types::{Domain, FeedbackType, ValidationStatus};
    use std::collections::HashMap as Map;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> Arc<Config> {
        Arc::new(Config {
            server: ServerConfig {
                port: 0,
                host: "127.0.0.1".to_string(),
                log_level: tracing::Level::WARN,
            },
            engines: EngineConfig {
                // No network endpoints: only the dictionary adapters
                // initialize, which keeps tests offline
                libre_url: String::new(),
                libre_api_key: None,
                ocr_url: String::new(),
                priorities: Map::from([
                    ("specialized".to_string(), 10),
                    ("dictionary".to_string(), 1),
                ]),
            },
            consensus: ConsensusConfig {
                mode: DispatchMode::Parallel,
                primary_engine: "specialized".to_string(),
                fallback_engines: vec!["dictionary".to_string()],
                max_workers: 4,
                engine_timeout_secs: 2,
                global_timeout_secs: 5,
                latency_penalty_ms: 5_000,
                quality_threshold: 0.7,
                max_alternatives: 5,
            },
            store: StoreConfig {
                data_dir: dir.path().join("data").display().to_string(),
                cache_ttl_days: 7,
                validation_ttl_days: 30,
                memory_capacity: 100,
            },
            validation: ValidationConfig {
                min_ocr_confidence: 0.7,
                min_translation_confidence: 0.6,
                min_overall_score: 0.75,
                max_alternatives: 5,
                max_sentence_words: 20,
                max_word_chars: 15,
            },
        })
    }

    fn translate_request(text: &str, domain: Domain) -> PipelineRequest {
        PipelineRequest {
            content: Some(text.to_string()),
            image: None,
            regions: None,
            languages: None,
            source_lang: "en".to_string(),
            target_lang: Some("ru".to_string()),
            domain: Some(domain),
            engine_override: None,
        }
    }

    #[tokio::test]
    async fn dictionary_backed_translation_end_to_end() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(test_config(&dir)).unwrap();

        let response = pipeline
            .translate(&translate_request("Wow!", Domain::Dialogue))
            .await;

        assert!(response.success, "errors: {:?}", response.errors);
        assert_eq!(response.results[0].text, "Вау!");
        assert_eq!(response.results[0].engine_id, "specialized");
        assert!(response.validation.is_some());
    }

    #[tokio::test]
    async fn unknown_text_with_no_usable_votes_reports_failure() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(test_config(&dir)).unwrap();

        let response = pipeline
            .translate(&translate_request("completely unknown sentence", Domain::General))
            .await;

        assert!(!response.success);
        assert_eq!(response.errors[0].code, "ALL_ENGINES_FAILED");
    }

    #[tokio::test]
    async fn missing_content_is_rejected() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(test_config(&dir)).unwrap();

        let mut request = translate_request("x", Domain::General);
        request.content = None;
        let response = pipeline.translate(&request).await;
        assert!(!response.success);
        assert_eq!(response.errors[0].code, "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn engine_override_routes_to_named_engine() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(test_config(&dir)).unwrap();

        let mut request = translate_request("hello", Domain::General);
        request.engine_override = Some("dictionary".to_string());
        let response = pipeline.translate(&request).await;

        assert!(response.success);
        assert_eq!(response.results[0].engine_id, "dictionary");
        assert_eq!(response.results[0].text, "привет");
    }

    #[tokio::test]
    async fn feedback_round_trip_influences_alternatives() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(test_config(&dir)).unwrap();

        pipeline
            .submit_feedback(&UserFeedback {
                original_text: "Wow!".to_string(),
                corrected_text: "Ух ты!".to_string(),
                feedback_type: FeedbackType::TranslationCorrection,
                rating: 5,
                context: Map::new(),
            })
            .unwrap();

        let response = pipeline
            .translate(&translate_request("Wow!", Domain::Dialogue))
            .await;
        let validation = response.validation.unwrap();
        assert!(validation.alternatives.contains(&"Ух ты!".to_string()));
    }

    #[tokio::test]
    async fn invalid_rating_is_rejected() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(test_config(&dir)).unwrap();

        let err = pipeline
            .submit_feedback(&UserFeedback {
                original_text: "a".to_string(),
                corrected_text: "b".to_string(),
                feedback_type: FeedbackType::TranslationCorrection,
                rating: 9,
                context: Map::new(),
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn standalone_validation_surface_works() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(test_config(&dir)).unwrap();

        let result = pipeline.validate_batch(&[], &[]);
        assert_eq!(result.status, ValidationStatus::Failed);
    }

    #[tokio::test]
    async fn recognize_without_ocr_engines_reports_no_usable_engines() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(test_config(&dir)).unwrap();

        let request = PipelineRequest {
            content: None,
            image: Some(general_purpose::STANDARD.encode(b"fake image bytes")),
            regions: None,
            languages: Some(vec!["en".to_string()]),
            source_lang: "en".to_string(),
            target_lang: None,
            domain: None,
            engine_override: None,
        };
        let response = pipeline.recognize(&request).await;
        assert!(!response.success);
        assert_eq!(response.errors[0].code, "NO_USABLE_ENGINES");
    }
}
