use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::core::errors::{EngineError, EngineOutcome};
use crate::core::types::{EngineKind, EngineResult, TranslationRequest};
use crate::engines::{EngineCapabilities, TranslationEngine};

const ENGINE_ID: &str = "libre";

/// Baseline confidence for LibreTranslate results; the service does not
/// report one itself.
const LIBRE_CONFIDENCE: f32 = 0.7;

#[derive(Debug, Deserialize)]
struct LibreResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

/// Translation adapter for a LibreTranslate-compatible HTTP service.
pub struct LibreTranslateEngine {
    base_url: String,
    api_key: Option<String>,
    client: Option<reqwest::Client>,
    init_error: Option<String>,
    languages: Vec<String>,
}

impl LibreTranslateEngine {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        if base_url.trim().is_empty() {
            return Self {
                base_url: String::new(),
                api_key: None,
                client: None,
                init_error: Some("no endpoint configured (set LIBRETRANSLATE_URL)".to_string()),
                languages: Vec::new(),
            };
        }

        let (client, init_error) = match reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
        {
            Ok(c) => (Some(c), None),
            Err(e) => (None, Some(format!("HTTP client construction failed: {e}"))),
        };

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            init_error,
            languages: ["en", "ru", "ja", "ko", "zh", "es", "fr", "de"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[async_trait]
impl TranslationEngine for LibreTranslateEngine {
    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            engine_id: ENGINE_ID.to_string(),
            kind: EngineKind::Translation,
            supported_languages: self.languages.clone(),
            initialized: self.init_error.is_none(),
            error: self.init_error.clone(),
        }
    }

    async fn translate(&self, request: &TranslationRequest) -> EngineOutcome<Option<EngineResult>> {
        let client = self.client.as_ref().ok_or_else(|| EngineError::Unavailable {
            engine_id: ENGINE_ID.to_string(),
            reason: self
                .init_error
                .clone()
                .unwrap_or_else(|| "not initialized".to_string()),
        })?;

        if !self
            .capabilities()
            .supports_pair(&request.source_lang, &request.target_lang)
        {
            return Err(EngineError::UnsupportedLanguage {
                engine_id: ENGINE_ID.to_string(),
                source_lang: request.source_lang.clone(),
                target: request.target_lang.clone(),
            });
        }

        let start = Instant::now();

        let mut form = vec![
            ("q", request.text.clone()),
            ("source", request.source_lang.clone()),
            ("target", request.target_lang.clone()),
            ("format", "text".to_string()),
        ];
        if let Some(key) = &self.api_key {
            form.push(("api_key", key.clone()));
        }

        let response = client
            .post(format!("{}/translate", self.base_url))
            .form(&form)
            .send()
            .await
            .map_err(|e| EngineError::Invocation {
                engine_id: ENGINE_ID.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Invocation {
                engine_id: ENGINE_ID.to_string(),
                message: format!("HTTP {status}"),
            });
        }

        let body: LibreResponse =
            response.json().await.map_err(|e| EngineError::InvalidResponse {
                engine_id: ENGINE_ID.to_string(),
                message: e.to_string(),
            })?;

        let elapsed = start.elapsed();
        debug!(elapsed_ms = elapsed.as_millis() as u64, "libre translation completed");

        Ok(Some(EngineResult {
            text: body.translated_text,
            confidence: LIBRE_CONFIDENCE,
            engine_id: ENGINE_ID.to_string(),
            bbox: None,
            language: request.target_lang.clone(),
            processing_time_ms: elapsed.as_millis() as u64,
            metadata: HashMap::from([("service".to_string(), "libretranslate".to_string())]),
        }))
    }
}
