// Custom error types for better error handling and debugging
//
// Using thiserror for ergonomic error definitions with:
// - Context preservation
// - Type-safe error matching
// - Source error chaining

use thiserror::Error;

/// Errors produced by a single engine adapter invocation.
///
/// Every adapter call returns `Result<_, EngineError>`; the coordinator
/// treats any variant as a failed vote and never aborts sibling engines.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine {engine_id} is not initialized: {reason}")]
    Unavailable { engine_id: String, reason: String },

    #[error("engine {engine_id} timed out after {elapsed_ms}ms")]
    Timeout { engine_id: String, elapsed_ms: u64 },

    #[error("engine {engine_id} invocation failed: {message}")]
    Invocation { engine_id: String, message: String },

    #[error("engine {engine_id} returned an invalid response: {message}")]
    InvalidResponse { engine_id: String, message: String },

    #[error("engine {engine_id} does not support language pair {source_lang}->{target}")]
    UnsupportedLanguage {
        engine_id: String,
        source_lang: String,
        target: String,
    },
}

impl EngineError {
    pub fn engine_id(&self) -> &str {
        match self {
            EngineError::Unavailable { engine_id, .. }
            | EngineError::Timeout { engine_id, .. }
            | EngineError::Invocation { engine_id, .. }
            | EngineError::InvalidResponse { engine_id, .. }
            | EngineError::UnsupportedLanguage { engine_id, .. } => engine_id,
        }
    }
}

/// Persistent store errors (cache, memory, feedback, validation audit).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store at {path}: {source}")]
    Open {
        path: String,
        source: rusqlite::Error,
    },

    #[error("store query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("store payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store directory creation failed: {0}")]
    DirectoryCreationFailed(std::io::Error),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("threshold {name} must be in [0.0, 1.0], got {value}")]
    InvalidThreshold { name: &'static str, value: f32 },

    #[error("worker count must be > 0, got {0}")]
    InvalidWorkerCount(usize),

    #[error("TTL days must be > 0, got {0}")]
    InvalidTtl(u64),

    #[error("memory capacity must be > 0, got {0}")]
    InvalidMemoryCapacity(usize),

    #[error("invalid dispatch mode: {0} (expected 'sequential' or 'parallel')")]
    InvalidDispatchMode(String),

    #[error("invalid engine priority entry: {0}")]
    InvalidPriorityEntry(String),

    #[error("environment variable parsing failed: {0}")]
    EnvVarError(String),
}

/// Pipeline orchestration errors surfaced to the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Not a single configured engine of the requested kind is usable.
    #[error("no usable {kind} engines are configured and initialized")]
    NoUsableEngines { kind: &'static str },

    /// Every dispatched engine failed, timed out, or returned nothing.
    /// Never silently replaced with a fabricated zero-confidence result.
    #[error("all {attempted} dispatched engines failed to produce a result")]
    AllEnginesFailed { attempted: usize },

    #[error("unknown engine id in override: {0}")]
    UnknownEngine(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Stable machine-readable code for the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::NoUsableEngines { .. } => "NO_USABLE_ENGINES",
            PipelineError::AllEnginesFailed { .. } => "ALL_ENGINES_FAILED",
            PipelineError::UnknownEngine(_) => "UNKNOWN_ENGINE",
            PipelineError::InvalidRequest(_) => "INVALID_REQUEST",
            PipelineError::Store(_) => "STORE_ERROR",
        }
    }
}

// Convenience type aliases for Results
pub type EngineOutcome<T> = Result<T, EngineError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type PipelineResult<T> = Result<T, PipelineError>;
