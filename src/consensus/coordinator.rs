use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use crate::consensus::selector::ResultSelector;
use crate::core::config::{ConsensusConfig, DispatchMode};
use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::types::{EngineResult, RecognitionRequest, Selection, TranslationRequest};
use crate::engines::{EngineRegistry, OcrEngine, TranslationEngine};
use crate::store::cache::{CachedRecognition, CachedTranslation};
use crate::store::{CacheStore, MemoryStore};
use crate::store::memory::MemoryEntry;
use crate::utils::Metrics;

/// Engine id reported on results served straight from translation memory.
pub const MEMORY_ENGINE_ID: &str = "translation_memory";

/// Dispatches one request to one or more engine adapters and selects a
/// winning result.
///
/// Order of consultation: translation memory (exact match, short-circuit),
/// then the per-engine cache, then live engines. A cache hit counts as
/// that engine's vote without invoking it. Store failures degrade to
/// always-recompute with a warning; they never fail the request.
pub struct ConsensusCoordinator {
    registry: Arc<EngineRegistry>,
    cache: Option<Arc<CacheStore>>,
    memory: Option<Arc<MemoryStore>>,
    selector: ResultSelector,
    config: ConsensusConfig,
    metrics: Metrics,
}

impl ConsensusCoordinator {
    pub fn new(
        registry: Arc<EngineRegistry>,
        cache: Option<Arc<CacheStore>>,
        memory: Option<Arc<MemoryStore>>,
        selector: ResultSelector,
        config: ConsensusConfig,
        metrics: Metrics,
    ) -> Self {
        Self {
            registry,
            cache,
            memory,
            selector,
            config,
            metrics,
        }
    }

    fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.config.engine_timeout_secs)
    }

    fn global_timeout(&self) -> Duration {
        Duration::from_secs(self.config.global_timeout_secs)
    }

    // -----------------------------------------------------------------
    // Translation
    // -----------------------------------------------------------------

    #[instrument(skip(self, request), fields(source = %request.source_lang, target = %request.target_lang))]
    pub async fn translate(
        &self,
        request: &TranslationRequest,
        engine_override: Option<&str>,
    ) -> PipelineResult<Selection> {
        // Memory first: an exact curated match skips engines entirely
        if let Some(hit) = self.probe_memory(request) {
            self.metrics.record_memory_hit();
            debug!("translation served from memory");
            return Ok(Selection { winner: hit, alternatives: Vec::new() });
        }

        let engines = self.translation_candidates(engine_override)?;
        if engines.is_empty() {
            return Err(PipelineError::NoUsableEngines { kind: "translation" });
        }

        // An override pins a single engine, so the fallback-chain path
        // covers it regardless of the configured mode
        let mode = if engine_override.is_some() {
            DispatchMode::Sequential
        } else {
            self.config.mode
        };
        let (candidates, attempted) = match mode {
            DispatchMode::Sequential => self.translate_sequential(request, engines).await,
            DispatchMode::Parallel => self.translate_parallel(request, engines).await,
        };

        match self.selector.select(candidates) {
            Some(selection) => {
                self.write_back_translation(request, &selection.winner);
                Ok(selection)
            }
            None => Err(PipelineError::AllEnginesFailed { attempted }),
        }
    }

    /// Engines eligible for this request, in dispatch order.
    fn translation_candidates(
        &self,
        engine_override: Option<&str>,
    ) -> PipelineResult<Vec<Arc<dyn TranslationEngine>>> {
        if let Some(id) = engine_override {
            let engine = self
                .registry
                .translation_engine(id)
                .ok_or_else(|| PipelineError::UnknownEngine(id.to_string()))?;
            if !engine.capabilities().initialized {
                return Err(PipelineError::NoUsableEngines { kind: "translation" });
            }
            return Ok(vec![engine]);
        }

        match self.config.mode {
            DispatchMode::Sequential => {
                let mut engines = Vec::new();
                for id in std::iter::once(self.config.primary_engine.as_str())
                    .chain(self.config.fallback_engines.iter().map(String::as_str))
                {
                    match self.registry.translation_engine(id) {
                        Some(e) if e.capabilities().initialized => engines.push(e),
                        Some(_) => debug!(engine = id, "skipping uninitialized engine"),
                        None => warn!(engine = id, "configured engine is not registered"),
                    }
                }
                Ok(engines)
            }
            DispatchMode::Parallel => Ok(self.registry.initialized_translation()),
        }
    }

    /// Fallback chain: first non-null result wins, later engines are
    /// never consulted.
    async fn translate_sequential(
        &self,
        request: &TranslationRequest,
        engines: Vec<Arc<dyn TranslationEngine>>,
    ) -> (Vec<EngineResult>, usize) {
        let mut attempted = 0usize;

        for engine in engines {
            let engine_id = engine.capabilities().engine_id;

            if let Some(hit) = self.probe_translation_cache(request, &engine_id) {
                return (vec![hit], attempted);
            }

            attempted += 1;
            self.metrics.record_engine_call(&engine_id);
            match tokio::time::timeout(self.engine_timeout(), engine.translate(request)).await {
                Err(_) => {
                    self.metrics.record_engine_timeout(&engine_id);
                    warn!(engine = %engine_id, "engine timed out, trying next in chain");
                }
                Ok(Err(e)) => {
                    self.metrics.record_engine_failure(&engine_id);
                    warn!(engine = %engine_id, error = %e, "engine failed, trying next in chain");
                }
                Ok(Ok(None)) => {}
                Ok(Ok(Some(result))) => return (vec![result], attempted),
            }
        }

        (Vec::new(), attempted)
    }

    /// Bounded fan-out: every engine votes concurrently; whatever landed
    /// before the global timeout participates in selection. Slow engines
    /// simply contribute nothing; in-flight calls are abandoned, not
    /// aborted.
    async fn translate_parallel(
        &self,
        request: &TranslationRequest,
        engines: Vec<Arc<dyn TranslationEngine>>,
    ) -> (Vec<EngineResult>, usize) {
        let mut collected = Vec::new();
        let mut to_dispatch = Vec::new();

        for engine in engines {
            let engine_id = engine.capabilities().engine_id;
            match self.probe_translation_cache(request, &engine_id) {
                Some(hit) => collected.push(hit),
                None => to_dispatch.push(engine),
            }
        }

        let attempted = to_dispatch.len();
        if !to_dispatch.is_empty() {
            let accumulator: Arc<Mutex<Vec<EngineResult>>> = Arc::new(Mutex::new(Vec::new()));
            let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
            let per_call = self.engine_timeout();

            let handles: Vec<_> = to_dispatch
                .into_iter()
                .map(|engine| {
                    let request = request.clone();
                    let accumulator = Arc::clone(&accumulator);
                    let semaphore = Arc::clone(&semaphore);
                    let metrics = self.metrics.clone();
                    tokio::spawn(async move {
                        let Ok(_permit) = semaphore.acquire_owned().await else {
                            return;
                        };
                        let engine_id = engine.capabilities().engine_id;
                        metrics.record_engine_call(&engine_id);
                        match tokio::time::timeout(per_call, engine.translate(&request)).await {
                            Err(_) => {
                                metrics.record_engine_timeout(&engine_id);
                                warn!(engine = %engine_id, "engine timed out, excluded from consensus");
                            }
                            Ok(Err(e)) => {
                                metrics.record_engine_failure(&engine_id);
                                warn!(engine = %engine_id, error = %e, "engine failed, excluded from consensus");
                            }
                            Ok(Ok(None)) => {}
                            Ok(Ok(Some(result))) => accumulator.lock().push(result),
                        }
                    })
                })
                .collect();

            if tokio::time::timeout(self.global_timeout(), join_all(handles))
                .await
                .is_err()
            {
                warn!("global consensus timeout elapsed, proceeding with partial results");
            }

            collected.extend(accumulator.lock().iter().cloned());
        }

        (collected, attempted)
    }

    fn probe_memory(&self, request: &TranslationRequest) -> Option<EngineResult> {
        let memory = self.memory.as_ref()?;
        match memory.lookup(
            &request.text,
            &request.source_lang,
            &request.target_lang,
            request.domain,
        ) {
            Ok(Some(entry)) => Some(EngineResult {
                text: entry.target_text,
                confidence: entry.quality_score.clamp(0.0, 1.0),
                engine_id: MEMORY_ENGINE_ID.to_string(),
                bbox: None,
                language: request.target_lang.clone(),
                processing_time_ms: 0,
                metadata: HashMap::from([(
                    "source".to_string(),
                    "translation_memory".to_string(),
                )]),
            }),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "memory store unavailable, recomputing");
                None
            }
        }
    }

    fn probe_translation_cache(
        &self,
        request: &TranslationRequest,
        engine_id: &str,
    ) -> Option<EngineResult> {
        let cache = self.cache.as_ref()?;
        let key = CacheStore::translation_key(
            &request.text,
            &request.source_lang,
            &request.target_lang,
            engine_id,
        );
        match cache.get_translation(&key) {
            Ok(Some(entry)) => {
                self.metrics.record_cache_hit();
                Some(EngineResult {
                    text: entry.translated_text,
                    confidence: entry.confidence,
                    engine_id: entry.engine,
                    bbox: None,
                    language: entry.target_lang,
                    processing_time_ms: 0,
                    metadata: HashMap::from([
                        ("cached".to_string(), "true".to_string()),
                        ("cache_created".to_string(), entry.created_at.to_string()),
                    ]),
                })
            }
            Ok(None) => {
                self.metrics.record_cache_miss();
                None
            }
            Err(e) => {
                warn!(error = %e, "cache store unavailable, recomputing");
                None
            }
        }
    }

    /// Persist a fresh winner: always to the cache under its own engine
    /// key, and to memory when it clears the quality threshold.
    fn write_back_translation(&self, request: &TranslationRequest, winner: &EngineResult) {
        if winner.is_cached() || winner.engine_id == MEMORY_ENGINE_ID {
            return;
        }

        if let Some(cache) = &self.cache {
            let key = CacheStore::translation_key(
                &request.text,
                &request.source_lang,
                &request.target_lang,
                &winner.engine_id,
            );
            let entry = CachedTranslation {
                source_text: request.text.clone(),
                translated_text: winner.text.clone(),
                source_lang: request.source_lang.clone(),
                target_lang: request.target_lang.clone(),
                engine: winner.engine_id.clone(),
                domain: request.domain.as_str().to_string(),
                confidence: winner.confidence,
                created_at: 0,
            };
            if let Err(e) = cache.put_translation(&key, &entry) {
                warn!(error = %e, "failed to persist cache entry");
            }
        }

        if winner.confidence > self.config.quality_threshold {
            if let Some(memory) = &self.memory {
                let entry = MemoryEntry {
                    source_text: request.text.clone(),
                    target_text: winner.text.clone(),
                    source_lang: request.source_lang.clone(),
                    target_lang: request.target_lang.clone(),
                    domain: request.domain.as_str().to_string(),
                    quality_score: winner.confidence,
                    usage_count: 1,
                    last_used: 0,
                    created_at: 0,
                };
                if let Err(e) = memory.store(&entry) {
                    warn!(error = %e, "failed to promote winner into memory");
                }
            }
        }
    }

    // -----------------------------------------------------------------
    // Recognition
    // -----------------------------------------------------------------

    #[instrument(skip(self, request), fields(languages = ?request.languages))]
    pub async fn recognize(
        &self,
        request: &RecognitionRequest,
        engine_override: Option<&str>,
    ) -> PipelineResult<Selection> {
        let engines = match engine_override {
            Some(id) => {
                let engine = self
                    .registry
                    .ocr_engine(id)
                    .ok_or_else(|| PipelineError::UnknownEngine(id.to_string()))?;
                if !engine.capabilities().initialized {
                    return Err(PipelineError::NoUsableEngines { kind: "ocr" });
                }
                vec![engine]
            }
            None => self
                .registry
                .initialized_ocr()
                .into_iter()
                .filter(|e| e.capabilities().supports_any(&request.languages))
                .collect(),
        };
        if engines.is_empty() {
            return Err(PipelineError::NoUsableEngines { kind: "ocr" });
        }

        let mode = if engine_override.is_some() {
            DispatchMode::Sequential
        } else {
            self.config.mode
        };
        let (candidates, attempted) = match mode {
            DispatchMode::Sequential => self.recognize_sequential(request, engines).await,
            DispatchMode::Parallel => self.recognize_parallel(request, engines).await,
        };

        match self.selector.select(candidates) {
            Some(selection) => {
                self.write_back_recognition(request, &selection.winner);
                Ok(selection)
            }
            None => Err(PipelineError::AllEnginesFailed { attempted }),
        }
    }

    async fn recognize_sequential(
        &self,
        request: &RecognitionRequest,
        engines: Vec<Arc<dyn OcrEngine>>,
    ) -> (Vec<EngineResult>, usize) {
        let mut attempted = 0usize;

        for engine in engines {
            let engine_id = engine.capabilities().engine_id;

            if let Some(hit) = self.probe_recognition_cache(request, &engine_id) {
                return (vec![hit], attempted);
            }

            attempted += 1;
            self.metrics.record_engine_call(&engine_id);
            match tokio::time::timeout(self.engine_timeout(), engine.recognize(request)).await {
                Err(_) => {
                    self.metrics.record_engine_timeout(&engine_id);
                    warn!(engine = %engine_id, "OCR engine timed out, trying next in chain");
                }
                Ok(Err(e)) => {
                    self.metrics.record_engine_failure(&engine_id);
                    warn!(engine = %engine_id, error = %e, "OCR engine failed, trying next in chain");
                }
                Ok(Ok(results)) if results.is_empty() => {}
                Ok(Ok(results)) => return (results, attempted),
            }
        }

        (Vec::new(), attempted)
    }

    async fn recognize_parallel(
        &self,
        request: &RecognitionRequest,
        engines: Vec<Arc<dyn OcrEngine>>,
    ) -> (Vec<EngineResult>, usize) {
        let mut collected = Vec::new();
        let mut to_dispatch = Vec::new();

        for engine in engines {
            let engine_id = engine.capabilities().engine_id;
            match self.probe_recognition_cache(request, &engine_id) {
                Some(hit) => collected.push(hit),
                None => to_dispatch.push(engine),
            }
        }

        let attempted = to_dispatch.len();
        if !to_dispatch.is_empty() {
            let accumulator: Arc<Mutex<Vec<EngineResult>>> = Arc::new(Mutex::new(Vec::new()));
            let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
            let per_call = self.engine_timeout();

            let handles: Vec<_> = to_dispatch
                .into_iter()
                .map(|engine| {
                    let request = request.clone();
                    let accumulator = Arc::clone(&accumulator);
                    let semaphore = Arc::clone(&semaphore);
                    let metrics = self.metrics.clone();
                    tokio::spawn(async move {
                        let Ok(_permit) = semaphore.acquire_owned().await else {
                            return;
                        };
                        let engine_id = engine.capabilities().engine_id;
                        metrics.record_engine_call(&engine_id);
                        match tokio::time::timeout(per_call, engine.recognize(&request)).await {
                            Err(_) => {
                                metrics.record_engine_timeout(&engine_id);
                                warn!(engine = %engine_id, "OCR engine timed out, excluded from consensus");
                            }
                            Ok(Err(e)) => {
                                metrics.record_engine_failure(&engine_id);
                                warn!(engine = %engine_id, error = %e, "OCR engine failed, excluded from consensus");
                            }
                            Ok(Ok(results)) => accumulator.lock().extend(results),
                        }
                    })
                })
                .collect();

            if tokio::time::timeout(self.global_timeout(), join_all(handles))
                .await
                .is_err()
            {
                warn!("global consensus timeout elapsed, proceeding with partial results");
            }

            collected.extend(accumulator.lock().iter().cloned());
        }

        (collected, attempted)
    }

    fn probe_recognition_cache(
        &self,
        request: &RecognitionRequest,
        engine_id: &str,
    ) -> Option<EngineResult> {
        let cache = self.cache.as_ref()?;
        let key = CacheStore::recognition_key(&request.image_bytes, &request.languages, engine_id);
        match cache.get_recognition(&key) {
            Ok(Some(entry)) => {
                self.metrics.record_cache_hit();
                Some(EngineResult {
                    text: entry.text,
                    confidence: entry.confidence,
                    engine_id: entry.engine,
                    bbox: request.bbox,
                    language: entry.languages,
                    processing_time_ms: 0,
                    metadata: HashMap::from([
                        ("cached".to_string(), "true".to_string()),
                        ("cache_created".to_string(), entry.created_at.to_string()),
                    ]),
                })
            }
            Ok(None) => {
                self.metrics.record_cache_miss();
                None
            }
            Err(e) => {
                warn!(error = %e, "cache store unavailable, recomputing");
                None
            }
        }
    }

    fn write_back_recognition(&self, request: &RecognitionRequest, winner: &EngineResult) {
        if winner.is_cached() {
            return;
        }
        let Some(cache) = &self.cache else { return };

        let key =
            CacheStore::recognition_key(&request.image_bytes, &request.languages, &winner.engine_id);
        let entry = CachedRecognition {
            text: winner.text.clone(),
            languages: request.languages.join(","),
            engine: winner.engine_id.clone(),
            confidence: winner.confidence,
            created_at: 0,
        };
        if let Err(e) = cache.put_recognition(&key, &entry) {
            warn!(error = %e, "failed to persist OCR cache entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::{EngineError, EngineOutcome};
    use crate::core::types::{Domain, EngineKind};
    use crate::engines::{EngineCapabilities, TranslationEngine};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    // -----------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------

    /// Succeeds with a fixed text/confidence, counting invocations.
    struct StaticEngine {
        id: String,
        text: String,
        confidence: f32,
        calls: Arc<AtomicUsize>,
    }

    impl StaticEngine {
        fn new(id: &str, text: &str, confidence: f32) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Arc::new(Self {
                    id: id.to_string(),
                    text: text.to_string(),
                    confidence,
                    calls: Arc::clone(&calls),
                }),
                calls,
            )
        }
    }

    #[async_trait]
    impl TranslationEngine for StaticEngine {
        fn capabilities(&self) -> EngineCapabilities {
            EngineCapabilities {
                engine_id: self.id.clone(),
                kind: EngineKind::Translation,
                supported_languages: vec![],
                initialized: true,
                error: None,
            }
        }

        async fn translate(
            &self,
            request: &TranslationRequest,
        ) -> EngineOutcome<Option<EngineResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(EngineResult {
                text: self.text.clone(),
                confidence: self.confidence,
                engine_id: self.id.clone(),
                bbox: None,
                language: request.target_lang.clone(),
                processing_time_ms: 10,
                metadata: HashMap::new(),
            }))
        }
    }

    /// Always returns an invocation error.
    struct FailingEngine(String);

    #[async_trait]
    impl TranslationEngine for FailingEngine {
        fn capabilities(&self) -> EngineCapabilities {
            EngineCapabilities {
                engine_id: self.0.clone(),
                kind: EngineKind::Translation,
                supported_languages: vec![],
                initialized: true,
                error: None,
            }
        }

        async fn translate(
            &self,
            _request: &TranslationRequest,
        ) -> EngineOutcome<Option<EngineResult>> {
            Err(EngineError::Invocation {
                engine_id: self.0.clone(),
                message: "backend exploded".to_string(),
            })
        }
    }

    /// Sleeps far past any test timeout before answering.
    struct HangingEngine(String);

    #[async_trait]
    impl TranslationEngine for HangingEngine {
        fn capabilities(&self) -> EngineCapabilities {
            EngineCapabilities {
                engine_id: self.0.clone(),
                kind: EngineKind::Translation,
                supported_languages: vec![],
                initialized: true,
                error: None,
            }
        }

        async fn translate(
            &self,
            _request: &TranslationRequest,
        ) -> EngineOutcome<Option<EngineResult>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }
    }

    // -----------------------------------------------------------------
    // Harness
    // -----------------------------------------------------------------

    fn config(mode: DispatchMode) -> ConsensusConfig {
        ConsensusConfig {
            mode,
            primary_engine: "primary".to_string(),
            fallback_engines: vec!["backup".to_string()],
            max_workers: 4,
            engine_timeout_secs: 1,
            global_timeout_secs: 2,
            latency_penalty_ms: 5_000,
            quality_threshold: 0.7,
            max_alternatives: 5,
        }
    }

    fn coordinator(
        dir: &TempDir,
        engines: Vec<Arc<dyn TranslationEngine>>,
        mode: DispatchMode,
    ) -> ConsensusCoordinator {
        let mut registry = EngineRegistry::new();
        for engine in engines {
            registry.register_translation(engine);
        }
        let cache = CacheStore::open(&dir.path().join("cache.db"), 7).unwrap();
        let memory = MemoryStore::open(&dir.path().join("memory.db"), 100).unwrap();
        ConsensusCoordinator::new(
            Arc::new(registry),
            Some(Arc::new(cache)),
            Some(Arc::new(memory)),
            ResultSelector::new(HashMap::new(), 5_000, 5),
            config(mode),
            Metrics::new(),
        )
    }

    fn request(text: &str) -> TranslationRequest {
        TranslationRequest {
            text: text.to_string(),
            source_lang: "en".to_string(),
            target_lang: "ru".to_string(),
            domain: Domain::General,
            priority: 1,
        }
    }

    // -----------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------

    #[tokio::test]
    async fn two_surviving_votes_select_highest_confidence() {
        let dir = TempDir::new().unwrap();
        let (a, _) = StaticEngine::new("engine_a", "Привет мир", 0.9);
        let (b, _) = StaticEngine::new("engine_b", "Привет, мир!", 0.6);
        let coordinator = coordinator(&dir, vec![a, b], DispatchMode::Parallel);

        let selection = coordinator.translate(&request("Hello world"), None).await.unwrap();
        assert_eq!(selection.winner.text, "Привет мир");
        assert_eq!(selection.alternatives.len(), 1);
        assert_eq!(selection.alternatives[0].text, "Привет, мир!");
    }

    #[tokio::test]
    async fn partial_failure_still_selects_survivor() {
        let dir = TempDir::new().unwrap();
        let (ok, _) = StaticEngine::new("engine_ok", "Привет", 0.8);
        let coordinator = coordinator(
            &dir,
            vec![
                Arc::new(FailingEngine("engine_bad".to_string())),
                Arc::new(HangingEngine("engine_slow".to_string())),
                ok,
            ],
            DispatchMode::Parallel,
        );

        let selection = coordinator.translate(&request("Hello"), None).await.unwrap();
        assert_eq!(selection.winner.engine_id, "engine_ok");
        assert!(selection.alternatives.is_empty());
    }

    #[tokio::test]
    async fn zero_survivors_is_all_engines_failed() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(
            &dir,
            vec![
                Arc::new(FailingEngine("engine_bad".to_string())),
                Arc::new(HangingEngine("engine_slow".to_string())),
            ],
            DispatchMode::Parallel,
        );

        let err = coordinator.translate(&request("Hello"), None).await.unwrap_err();
        assert!(matches!(err, PipelineError::AllEnginesFailed { attempted: 2 }));
    }

    #[tokio::test]
    async fn no_engines_at_all_is_distinct_from_failure() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(&dir, vec![], DispatchMode::Parallel);

        let err = coordinator.translate(&request("Hello"), None).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoUsableEngines { .. }));
    }

    #[tokio::test]
    async fn repeated_request_is_served_from_cache_without_invocation() {
        let dir = TempDir::new().unwrap();
        // Below the quality threshold, so the winner lands in the cache
        // but is not promoted to memory
        let (engine, calls) = StaticEngine::new("engine_a", "Привет мир", 0.6);
        let coordinator = coordinator(&dir, vec![engine], DispatchMode::Parallel);

        let first = coordinator.translate(&request("Hello world"), None).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!first.winner.is_cached());

        let second = coordinator.translate(&request("Hello world"), None).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1, "engine must not run again");
        assert!(second.winner.is_cached());
        assert_eq!(second.winner.processing_time_ms, 0);
        assert_eq!(second.winner.text, first.winner.text);
    }

    #[tokio::test]
    async fn memory_hit_short_circuits_engines() {
        let dir = TempDir::new().unwrap();
        let (engine, calls) = StaticEngine::new("engine_a", "машинный перевод", 0.9);

        let mut registry = EngineRegistry::new();
        registry.register_translation(engine);
        let memory = MemoryStore::open(&dir.path().join("memory.db"), 100).unwrap();
        memory
            .store(&crate::store::memory::MemoryEntry {
                source_text: "Hello".to_string(),
                target_text: "Привет (одобрено)".to_string(),
                source_lang: "en".to_string(),
                target_lang: "ru".to_string(),
                domain: "general".to_string(),
                quality_score: 0.95,
                usage_count: 1,
                last_used: 0,
                created_at: 0,
            })
            .unwrap();

        let coordinator = ConsensusCoordinator::new(
            Arc::new(registry),
            None,
            Some(Arc::new(memory)),
            ResultSelector::new(HashMap::new(), 5_000, 5),
            config(DispatchMode::Parallel),
            Metrics::new(),
        );

        let selection = coordinator.translate(&request("Hello"), None).await.unwrap();
        assert_eq!(selection.winner.engine_id, MEMORY_ENGINE_ID);
        assert_eq!(selection.winner.text, "Привет (одобрено)");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn sequential_chain_falls_through_to_backup() {
        let dir = TempDir::new().unwrap();
        let (backup, backup_calls) = StaticEngine::new("backup", "из резерва", 0.7);
        let mut backup_engine: Vec<Arc<dyn TranslationEngine>> =
            vec![Arc::new(FailingEngine("primary".to_string()))];
        backup_engine.push(backup);
        let coordinator = coordinator(&dir, backup_engine, DispatchMode::Sequential);

        let selection = coordinator.translate(&request("Hello"), None).await.unwrap();
        assert_eq!(selection.winner.engine_id, "backup");
        assert_eq!(backup_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn high_confidence_winner_is_promoted_to_memory() {
        let dir = TempDir::new().unwrap();
        let (engine, calls) = StaticEngine::new("engine_a", "Привет мир", 0.9);
        let coordinator = coordinator(&dir, vec![engine], DispatchMode::Parallel);

        coordinator.translate(&request("Hello world"), None).await.unwrap();

        // Second round: memory outranks even the cache
        let selection = coordinator.translate(&request("Hello world"), None).await.unwrap();
        assert_eq!(selection.winner.engine_id, MEMORY_ENGINE_ID);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn engine_override_pins_dispatch() {
        let dir = TempDir::new().unwrap();
        let (a, a_calls) = StaticEngine::new("engine_a", "перевод А", 0.4);
        let (b, b_calls) = StaticEngine::new("engine_b", "перевод Б", 0.9);
        let coordinator = coordinator(&dir, vec![a, b], DispatchMode::Parallel);

        let selection = coordinator
            .translate(&request("Hello"), Some("engine_a"))
            .await
            .unwrap();
        assert_eq!(selection.winner.engine_id, "engine_a");
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);

        let err = coordinator
            .translate(&request("Hello"), Some("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownEngine(_)));
    }
}
