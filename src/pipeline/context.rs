use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::config::Config;
use crate::engines::dictionary::FallbackDictEngine;
use crate::engines::libre::LibreTranslateEngine;
use crate::engines::remote_ocr::RemoteOcrEngine;
use crate::engines::specialized::SpecializedDictEngine;
use crate::engines::EngineRegistry;
use crate::store::{CacheStore, FeedbackStore, MemoryStore, ValidationStore};
use crate::utils::Metrics;

/// Explicitly constructed bundle of everything the pipeline operates on:
/// the engine registry plus all store handles. Passed around instead of
/// process-wide singletons.
///
/// Any store that fails to open is dropped to `None` with a warning; the
/// pipeline then degrades to always-recompute for that concern rather
/// than refusing requests.
pub struct PipelineContext {
    pub config: Arc<Config>,
    pub registry: Arc<EngineRegistry>,
    pub cache: Option<Arc<CacheStore>>,
    pub memory: Option<Arc<MemoryStore>>,
    pub feedback: Option<Arc<FeedbackStore>>,
    pub validation_store: Option<Arc<ValidationStore>>,
    pub metrics: Metrics,
}

impl PipelineContext {
    pub fn initialize(config: Arc<Config>) -> Result<Self> {
        info!("Initializing pipeline context...");

        let data_dir = Path::new(&config.store.data_dir);

        let cache = match CacheStore::open(&data_dir.join("cache.db"), config.store.cache_ttl_days)
        {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                warn!(error = %e, "cache store unavailable, degrading to always-recompute");
                None
            }
        };

        let memory =
            match MemoryStore::open(&data_dir.join("memory.db"), config.store.memory_capacity) {
                Ok(store) => Some(Arc::new(store)),
                Err(e) => {
                    warn!(error = %e, "translation memory unavailable, continuing without it");
                    None
                }
            };

        let feedback = match FeedbackStore::open(&data_dir.join("feedback.db")) {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                warn!(error = %e, "feedback store unavailable, continuing without it");
                None
            }
        };

        let validation_store = match ValidationStore::open(
            &data_dir.join("validation.db"),
            config.store.validation_ttl_days,
        ) {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                warn!(error = %e, "validation audit store unavailable, continuing without it");
                None
            }
        };

        let engine_timeout = Duration::from_secs(config.consensus.engine_timeout_secs);
        let mut registry = EngineRegistry::new();
        registry.register_translation(Arc::new(LibreTranslateEngine::new(
            &config.engines.libre_url,
            config.engines.libre_api_key.clone(),
            engine_timeout,
        )));
        registry.register_translation(Arc::new(SpecializedDictEngine::new()));
        registry.register_translation(Arc::new(FallbackDictEngine::new()));
        registry.register_ocr(Arc::new(RemoteOcrEngine::new(
            &config.engines.ocr_url,
            engine_timeout,
        )));

        let initialized = registry
            .capabilities()
            .iter()
            .filter(|c| c.initialized)
            .count();
        info!(
            "✓ Context ready ({} adapters registered, {} initialized)",
            registry.capabilities().len(),
            initialized
        );

        Ok(Self {
            config,
            registry: Arc::new(registry),
            cache,
            memory,
            feedback,
            validation_store,
            metrics: Metrics::new(),
        })
    }
}
