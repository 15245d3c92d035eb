use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Instant;

use crate::core::errors::EngineOutcome;
use crate::core::types::{EngineKind, EngineResult, TranslationRequest};
use crate::engines::{EngineCapabilities, TranslationEngine};

const ENGINE_ID: &str = "dictionary";
const DICTIONARY_CONFIDENCE: f32 = 0.6;

/// Last-resort word/phrase dictionary adapter.
///
/// Only covers very common standalone phrases; everything else is a
/// non-vote so the chain can continue.
pub struct FallbackDictEngine {
    entries: HashMap<&'static str, HashMap<&'static str, &'static str>>,
}

impl FallbackDictEngine {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            "en_ru",
            HashMap::from([
                ("yes", "да"),
                ("no", "нет"),
                ("hello", "привет"),
                ("goodbye", "пока"),
                ("thank you", "спасибо"),
                ("please", "пожалуйста"),
                ("sorry", "извините"),
                ("help", "помощь"),
                ("stop", "стоп"),
                ("go", "идти"),
            ]),
        );
        Self { entries }
    }
}

impl Default for FallbackDictEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranslationEngine for FallbackDictEngine {
    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            engine_id: ENGINE_ID.to_string(),
            kind: EngineKind::Translation,
            supported_languages: vec!["en".to_string(), "ru".to_string()],
            initialized: true,
            error: None,
        }
    }

    async fn translate(&self, request: &TranslationRequest) -> EngineOutcome<Option<EngineResult>> {
        let start = Instant::now();
        let pair = format!("{}_{}", request.source_lang, request.target_lang);

        let Some(table) = self.entries.get(pair.as_str()) else {
            return Ok(None);
        };

        let normalized = request.text.trim().to_lowercase();
        let Some(rendered) = table.get(normalized.as_str()) else {
            return Ok(None);
        };

        Ok(Some(EngineResult {
            text: rendered.to_string(),
            confidence: DICTIONARY_CONFIDENCE,
            engine_id: ENGINE_ID.to_string(),
            bbox: None,
            language: request.target_lang.clone(),
            processing_time_ms: start.elapsed().as_millis() as u64,
            metadata: HashMap::from([(
                "dictionary".to_string(),
                "basic_fallback".to_string(),
            )]),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Domain;

    #[tokio::test]
    async fn known_phrase_hits_with_low_confidence() {
        let engine = FallbackDictEngine::new();
        let request = TranslationRequest {
            text: "  Thank You ".to_string(),
            source_lang: "en".to_string(),
            target_lang: "ru".to_string(),
            domain: Domain::General,
            priority: 1,
        };
        let result = engine.translate(&request).await.unwrap().unwrap();
        assert_eq!(result.text, "спасибо");
        assert_eq!(result.confidence, DICTIONARY_CONFIDENCE);
    }

    #[tokio::test]
    async fn unknown_pair_is_a_non_vote() {
        let engine = FallbackDictEngine::new();
        let request = TranslationRequest {
            text: "hello".to_string(),
            source_lang: "ja".to_string(),
            target_lang: "en".to_string(),
            domain: Domain::General,
            priority: 1,
        };
        assert!(engine.translate(&request).await.unwrap().is_none());
    }
}
