use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::engines::{EngineCapabilities, OcrEngine, TranslationEngine};

/// Tracks which adapters are configured, initialized, and healthy.
///
/// Adapters register once at startup, in dispatch order. The registry
/// never retries initialization; an adapter that failed to initialize is
/// kept for status reporting but excluded from dispatch candidates.
#[derive(Default)]
pub struct EngineRegistry {
    translation: Vec<Arc<dyn TranslationEngine>>,
    translation_by_id: HashMap<String, usize>,
    ocr: Vec<Arc<dyn OcrEngine>>,
    ocr_by_id: HashMap<String, usize>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_translation(&mut self, engine: Arc<dyn TranslationEngine>) {
        let caps = engine.capabilities();
        if let Some(err) = &caps.error {
            warn!(engine = %caps.engine_id, error = %err, "translation engine registered uninitialized");
        } else {
            info!(engine = %caps.engine_id, "translation engine registered");
        }
        self.translation_by_id
            .insert(caps.engine_id.clone(), self.translation.len());
        self.translation.push(engine);
    }

    pub fn register_ocr(&mut self, engine: Arc<dyn OcrEngine>) {
        let caps = engine.capabilities();
        if let Some(err) = &caps.error {
            warn!(engine = %caps.engine_id, error = %err, "OCR engine registered uninitialized");
        } else {
            info!(engine = %caps.engine_id, "OCR engine registered");
        }
        self.ocr_by_id.insert(caps.engine_id.clone(), self.ocr.len());
        self.ocr.push(engine);
    }

    pub fn translation_engine(&self, engine_id: &str) -> Option<Arc<dyn TranslationEngine>> {
        self.translation_by_id
            .get(engine_id)
            .map(|&i| Arc::clone(&self.translation[i]))
    }

    pub fn ocr_engine(&self, engine_id: &str) -> Option<Arc<dyn OcrEngine>> {
        self.ocr_by_id.get(engine_id).map(|&i| Arc::clone(&self.ocr[i]))
    }

    /// Initialized translation engines, in registration order.
    pub fn initialized_translation(&self) -> Vec<Arc<dyn TranslationEngine>> {
        self.translation
            .iter()
            .filter(|e| e.capabilities().initialized)
            .cloned()
            .collect()
    }

    /// Initialized OCR engines, in registration order.
    pub fn initialized_ocr(&self) -> Vec<Arc<dyn OcrEngine>> {
        self.ocr
            .iter()
            .filter(|e| e.capabilities().initialized)
            .cloned()
            .collect()
    }

    /// Current state of every registered adapter.
    pub fn capabilities(&self) -> Vec<EngineCapabilities> {
        self.translation
            .iter()
            .map(|e| e.capabilities())
            .chain(self.ocr.iter().map(|e| e.capabilities()))
            .collect()
    }
}
