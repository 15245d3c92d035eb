use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::core::errors::{EngineError, EngineOutcome};
use crate::core::types::{BoundingBox, EngineKind, EngineResult, RecognitionRequest};
use crate::engines::{EngineCapabilities, OcrEngine};

const ENGINE_ID: &str = "remote_ocr";

#[derive(Debug, Deserialize)]
struct OcrLine {
    text: String,
    confidence: f32,
    #[serde(default)]
    bbox: Option<[i32; 4]>,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    lines: Vec<OcrLine>,
}

/// OCR adapter for an HTTP sidecar service (tesseract-server style).
///
/// The region is uploaded base64-encoded; the service answers with one
/// JSON line entry per recognized text block.
pub struct RemoteOcrEngine {
    url: String,
    client: Option<reqwest::Client>,
    init_error: Option<String>,
    languages: Vec<String>,
}

impl RemoteOcrEngine {
    pub fn new(url: &str, timeout: Duration) -> Self {
        if url.trim().is_empty() {
            return Self {
                url: String::new(),
                client: None,
                init_error: Some("no endpoint configured (set OCR_SERVICE_URL)".to_string()),
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
            url: url.trim_end_matches('/').to_string(),
            client,
            init_error,
            languages: ["en", "ru", "ja", "ko", "zh"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl OcrEngine for RemoteOcrEngine {
    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            engine_id: ENGINE_ID.to_string(),
            kind: EngineKind::Ocr,
            supported_languages: self.languages.clone(),
            initialized: self.init_error.is_none(),
            error: self.init_error.clone(),
        }
    }

    async fn recognize(&self, request: &RecognitionRequest) -> EngineOutcome<Vec<EngineResult>> {
        let client = self.client.as_ref().ok_or_else(|| EngineError::Unavailable {
            engine_id: ENGINE_ID.to_string(),
            reason: self
                .init_error
                .clone()
                .unwrap_or_else(|| "not initialized".to_string()),
        })?;

        let start = Instant::now();
        let payload = serde_json::json!({
            "image": general_purpose::STANDARD.encode(&request.image_bytes),
            "languages": request.languages,
            "params": request.params,
        });

        let response = client
            .post(format!("{}/recognize", self.url))
            .json(&payload)
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

        let body: OcrResponse =
            response.json().await.map_err(|e| EngineError::InvalidResponse {
                engine_id: ENGINE_ID.to_string(),
                message: e.to_string(),
            })?;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        debug!(lines = body.lines.len(), elapsed_ms, "remote OCR completed");

        let fallback_lang = request
            .languages
            .first()
            .cloned()
            .unwrap_or_else(|| "en".to_string());

        Ok(body
            .lines
            .into_iter()
            .filter(|line| !line.text.trim().is_empty())
            .map(|line| EngineResult {
                text: line.text,
                confidence: line.confidence.clamp(0.0, 1.0),
                engine_id: ENGINE_ID.to_string(),
                bbox: line
                    .bbox
                    .map(|[x, y, width, height]| BoundingBox { x, y, width, height })
                    .or(request.bbox),
                language: line.language.unwrap_or_else(|| fallback_lang.clone()),
                processing_time_ms: elapsed_ms,
                metadata: HashMap::new(),
            })
            .collect())
    }
}
