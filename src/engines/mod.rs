// Engine adapters: uniform capability wrappers around concrete OCR and
// translation backends.
//
// Initialization failures are captured as adapter state, never raised:
// a failed adapter stays registered so its status can be reported, and
// the registry simply excludes it from dispatch.

pub mod dictionary;
pub mod libre;
pub mod registry;
pub mod remote_ocr;
pub mod specialized;

use async_trait::async_trait;
use serde::Serialize;

use crate::core::errors::EngineOutcome;
use crate::core::types::{EngineKind, EngineResult, RecognitionRequest, TranslationRequest};

// Re-export commonly used items
pub use registry::EngineRegistry;

/// What one adapter reports about itself.
#[derive(Debug, Clone, Serialize)]
pub struct EngineCapabilities {
    pub engine_id: String,
    pub kind: EngineKind,
    pub supported_languages: Vec<String>,
    pub initialized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EngineCapabilities {
    /// True when the adapter supports both ends of a language pair.
    /// An empty list means "no declared restriction".
    pub fn supports_pair(&self, source: &str, target: &str) -> bool {
        self.supported_languages.is_empty()
            || (self.supported_languages.iter().any(|l| l == source)
                && self.supported_languages.iter().any(|l| l == target))
    }

    pub fn supports_any(&self, languages: &[String]) -> bool {
        self.supported_languages.is_empty()
            || languages.iter().any(|l| self.supported_languages.contains(l))
    }
}

/// Uniform contract for translation backends.
///
/// `translate` returns `Ok(None)` when the engine has nothing to offer
/// for this input (e.g. a dictionary miss); that is a non-vote, not an
/// error. Failures are returned, never panicked.
#[async_trait]
pub trait TranslationEngine: Send + Sync {
    fn capabilities(&self) -> EngineCapabilities;

    async fn translate(&self, request: &TranslationRequest) -> EngineOutcome<Option<EngineResult>>;
}

/// Uniform contract for OCR backends.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn capabilities(&self) -> EngineCapabilities;

    async fn recognize(&self, request: &RecognitionRequest) -> EngineOutcome<Vec<EngineResult>>;
}
