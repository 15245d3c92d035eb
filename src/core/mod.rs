pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::{Config, DispatchMode};
pub use errors::{ConfigError, EngineError, PipelineError, StoreError};
pub use types::{
    BoundingBox, Domain, EngineKind, EngineResult, PipelineRequest, PipelineResponse,
    QualityMetric, QualityScore, RecognitionRequest, Selection, TranslationRequest,
    TranslationSample, UserFeedback, ValidationResult, ValidationStatus,
};
