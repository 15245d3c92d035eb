// Library exports for the comic OCR/translation consensus pipeline

// Core modules
pub mod consensus;
pub mod core;
pub mod engines;
pub mod pipeline;
pub mod store;
pub mod utils;
pub mod validation;

// Re-export commonly used types and functions
pub use core::{
    config::{Config, DispatchMode},
    errors::{ConfigError, EngineError, PipelineError, StoreError},
    types::{
        BoundingBox, Domain, EngineKind, EngineResult, PipelineRequest, PipelineResponse,
        QualityMetric, QualityScore, RecognitionRequest, Selection, TranslationRequest,
        TranslationSample, UserFeedback, ValidateRequest, ValidationResult, ValidationStatus,
    },
};

pub use consensus::{ConsensusCoordinator, ResultSelector};
pub use engines::{EngineCapabilities, EngineRegistry, OcrEngine, TranslationEngine};
pub use pipeline::{Pipeline, PipelineContext};
pub use store::{CacheStore, FeedbackStore, MemoryStore, ValidationStore};
pub use utils::Metrics;
pub use validation::QualityValidator;
