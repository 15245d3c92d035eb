use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Instant;

use crate::core::errors::EngineOutcome;
use crate::core::types::{Domain, EngineKind, EngineResult, TranslationRequest};
use crate::engines::{EngineCapabilities, TranslationEngine};

const ENGINE_ID: &str = "specialized";

/// Dictionary hits are near-certain
const SOUND_EFFECT_CONFIDENCE: f32 = 0.95;
const INTERJECTION_CONFIDENCE: f32 = 0.9;

/// Domain dictionary adapter for comic-specific vocabulary.
///
/// Covers sound effects and short interjections that general MT engines
/// handle poorly. Misses are non-votes (`Ok(None)`), letting the rest of
/// the chain supply a result.
pub struct SpecializedDictEngine {
    // (lang pair "en_ru") -> uppercase onomatopoeia -> rendering
    sound_effects: HashMap<&'static str, HashMap<&'static str, &'static str>>,
    // (lang pair) -> exact interjection -> rendering
    interjections: HashMap<&'static str, HashMap<&'static str, &'static str>>,
}

impl SpecializedDictEngine {
    pub fn new() -> Self {
        let mut sound_effects = HashMap::new();
        sound_effects.insert(
            "en_ru",
            HashMap::from([
                ("BANG", "БАХ"),
                ("BOOM", "БУМ"),
                ("CRASH", "ГРОХОТ"),
                ("WHOOSH", "СВИСТ"),
                ("SPLASH", "ВСПЛЕСК"),
                ("THUD", "ГЛУХОЙ УДАР"),
                ("CRACK", "ТРЕСК"),
                ("SLAM", "ХЛОПОК"),
                ("BUZZ", "ЖУЖЖАНИЕ"),
                ("RING", "ЗВОНОК"),
            ]),
        );

        let mut interjections = HashMap::new();
        interjections.insert(
            "en_ru",
            HashMap::from([
                ("Wow!", "Вау!"),
                ("Oh no!", "О нет!"),
                ("Amazing!", "Потрясающе!"),
                ("Huh?", "А?"),
                ("What?!", "Что?!"),
                ("Awesome!", "Круто!"),
                ("Ouch!", "Ой!"),
                ("Yay!", "Ура!"),
            ]),
        );

        Self {
            sound_effects,
            interjections,
        }
    }

    fn pair_key(source: &str, target: &str) -> String {
        format!("{source}_{target}")
    }

    fn result(
        &self,
        request: &TranslationRequest,
        text: &str,
        confidence: f32,
        dictionary: &str,
        start: Instant,
    ) -> EngineResult {
        EngineResult {
            text: text.to_string(),
            confidence,
            engine_id: ENGINE_ID.to_string(),
            bbox: None,
            language: request.target_lang.clone(),
            processing_time_ms: start.elapsed().as_millis() as u64,
            metadata: HashMap::from([("dictionary".to_string(), dictionary.to_string())]),
        }
    }
}

impl Default for SpecializedDictEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranslationEngine for SpecializedDictEngine {
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
        let pair = Self::pair_key(&request.source_lang, &request.target_lang);

        // Sound effects match case-insensitively, biased by domain
        if request.domain == Domain::SoundEffect {
            if let Some(table) = self.sound_effects.get(pair.as_str()) {
                let key = request.text.trim().to_uppercase();
                if let Some(rendered) = table.get(key.as_str()) {
                    return Ok(Some(self.result(
                        request,
                        rendered,
                        SOUND_EFFECT_CONFIDENCE,
                        "sound_effects",
                        start,
                    )));
                }
            }
        }

        if let Some(table) = self.interjections.get(pair.as_str()) {
            if let Some(rendered) = table.get(request.text.trim()) {
                return Ok(Some(self.result(
                    request,
                    rendered,
                    INTERJECTION_CONFIDENCE,
                    "interjections",
                    start,
                )));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: &str, domain: Domain) -> TranslationRequest {
        TranslationRequest {
            text: text.to_string(),
            source_lang: "en".to_string(),
            target_lang: "ru".to_string(),
            domain,
            priority: 1,
        }
    }

    #[tokio::test]
    async fn sound_effects_hit_for_sound_domain() {
        let engine = SpecializedDictEngine::new();
        let result = engine
            .translate(&request("bang", Domain::SoundEffect))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.text, "БАХ");
        assert!(result.is_dictionary_hit());
        assert_eq!(result.confidence, SOUND_EFFECT_CONFIDENCE);
    }

    #[tokio::test]
    async fn sound_effects_ignored_outside_sound_domain() {
        let engine = SpecializedDictEngine::new();
        let result = engine
            .translate(&request("BANG", Domain::Dialogue))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn interjections_hit_in_any_domain() {
        let engine = SpecializedDictEngine::new();
        let result = engine
            .translate(&request("Wow!", Domain::Dialogue))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.text, "Вау!");
    }

    #[tokio::test]
    async fn miss_is_a_non_vote() {
        let engine = SpecializedDictEngine::new();
        assert!(engine
            .translate(&request("Good morning, detective", Domain::Dialogue))
            .await
            .unwrap()
            .is_none());
    }
}
