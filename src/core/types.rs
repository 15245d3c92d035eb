// Shared data model for the recognition/translation consensus pipeline

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Categorical hint used to bias engine selection and dictionary lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    #[default]
    General,
    Dialogue,
    Narration,
    SoundEffect,
    ProperName,
    Slang,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::General => "general",
            Domain::Dialogue => "dialogue",
            Domain::Narration => "narration",
            Domain::SoundEffect => "sound_effect",
            Domain::ProperName => "proper_name",
            Domain::Slang => "slang",
        }
    }
}

impl std::str::FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(Domain::General),
            "dialogue" => Ok(Domain::Dialogue),
            "narration" => Ok(Domain::Narration),
            "sound_effect" => Ok(Domain::SoundEffect),
            "proper_name" => Ok(Domain::ProperName),
            "slang" => Ok(Domain::Slang),
            other => Err(format!("unknown domain: {other}")),
        }
    }
}

/// What a concrete engine backend does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Ocr,
    Translation,
}

/// Axis-aligned region on a page, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    /// True when the two rectangles share any area.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// A translation request. Immutable once dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
    #[serde(default)]
    pub domain: Domain,
    /// 1-5, 5 highest
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    1
}

/// A recognition request for one image region. Immutable once dispatched.
#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    pub image_bytes: Vec<u8>,
    pub languages: Vec<String>,
    pub bbox: Option<BoundingBox>,
    pub params: HashMap<String, String>,
}

/// Output of exactly one adapter invocation (or one cache replay of it).
///
/// Never mutated after creation; corrections create a new value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineResult {
    pub text: String,
    pub confidence: f32,
    pub engine_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
    pub language: String,
    pub processing_time_ms: u64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl EngineResult {
    /// True when this result came from a domain dictionary or model hit.
    pub fn is_dictionary_hit(&self) -> bool {
        self.metadata.contains_key("dictionary")
    }

    /// True when this result was replayed from the cache store.
    pub fn is_cached(&self) -> bool {
        self.metadata.contains_key("cached")
    }
}

/// Winner plus ranked alternatives produced by the result selector.
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub winner: EngineResult,
    pub alternatives: Vec<EngineResult>,
}

/// One translated unit as consumed by the quality validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationSample {
    pub source_text: String,
    pub translated_text: String,
    pub source_lang: String,
    pub confidence: f32,
    pub engine_id: String,
}

/// Metrics the validator can score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityMetric {
    OcrConfidence,
    TranslationConfidence,
    Consistency,
    Readability,
}

/// One scored quality metric.
#[derive(Debug, Clone, Serialize)]
pub struct QualityScore {
    pub metric: QualityMetric,
    /// 0.0 - 1.0
    pub score: f32,
    pub confidence: f32,
    pub details: serde_json::Value,
    pub suggestions: Vec<String>,
}

/// Outcome category of a validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Passed,
    Warning,
    Failed,
    NeedsReview,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Passed => "passed",
            ValidationStatus::Warning => "warning",
            ValidationStatus::Failed => "failed",
            ValidationStatus::NeedsReview => "needs_review",
        }
    }
}

/// Result of one validation call. Created once, persisted for audit,
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub overall_score: f32,
    pub metric_scores: Vec<QualityScore>,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub alternatives: Vec<String>,
    pub created_at: i64,
}

/// Kind of correction a user submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    OcrCorrection,
    TranslationCorrection,
    StylePreference,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::OcrCorrection => "ocr_correction",
            FeedbackType::TranslationCorrection => "translation_correction",
            FeedbackType::StylePreference => "style_preference",
        }
    }
}

/// User-submitted correction, appended to a persisted log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFeedback {
    pub original_text: String,
    pub corrected_text: String,
    pub feedback_type: FeedbackType,
    /// 1-5
    pub rating: u8,
    #[serde(default)]
    pub context: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Service boundary DTOs
// ---------------------------------------------------------------------------

/// Request envelope accepted by the service API.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineRequest {
    /// Source text for translation requests
    #[serde(default)]
    pub content: Option<String>,
    /// Base64-encoded image region for recognition requests
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub regions: Option<Vec<BoundingBox>>,
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    pub source_lang: String,
    #[serde(default)]
    pub target_lang: Option<String>,
    #[serde(default)]
    pub domain: Option<Domain>,
    /// Force dispatch to a single engine, bypassing the configured chain
    #[serde(default)]
    pub engine_override: Option<String>,
}

/// Request envelope for a standalone validation call.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateRequest {
    #[serde(default)]
    pub ocr_results: Vec<EngineResult>,
    #[serde(default)]
    pub translations: Vec<TranslationSample>,
}

/// Machine-readable error in a response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

/// Response envelope returned by the service API.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResponse {
    pub success: bool,
    pub results: Vec<EngineResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
    pub processing_time_ms: u64,
    pub errors: Vec<ApiError>,
}
