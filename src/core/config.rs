use crate::core::errors::ConfigError;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
}

/// How the coordinator dispatches a request to engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Try the primary engine, then each fallback in order; stop at the
    /// first non-null result.
    Sequential,
    /// Fan out to every initialized engine concurrently and select among
    /// the results that arrive before the global timeout.
    Parallel,
}

impl FromStr for DispatchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(DispatchMode::Sequential),
            "parallel" => Ok(DispatchMode::Parallel),
            other => Err(ConfigError::InvalidDispatchMode(other.to_string())),
        }
    }
}

/// Engine backend configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// LibreTranslate-compatible endpoint; empty disables the adapter
    pub libre_url: String,
    pub libre_api_key: Option<String>,
    /// OCR sidecar endpoint; empty disables the adapter
    pub ocr_url: String,
    /// Engine rank table used by the selector (higher wins ties).
    /// Ranks are scaled by 0.01 into a [0, 0.1] score bonus.
    pub priorities: HashMap<String, u8>,
}

/// Consensus coordination configuration
#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    pub mode: DispatchMode,
    pub primary_engine: String,
    pub fallback_engines: Vec<String>,
    /// Bounded worker pool size for parallel consensus
    pub max_workers: usize,
    /// Per-engine-call timeout in seconds
    pub engine_timeout_secs: u64,
    /// Global deadline for a whole consensus round in seconds
    pub global_timeout_secs: u64,
    /// Results slower than this are penalized by the selector, in ms
    pub latency_penalty_ms: u64,
    /// Winners above this confidence are promoted into translation memory
    pub quality_threshold: f32,
    /// K: winner plus K-1 alternatives survive selection
    pub max_alternatives: usize,
}

/// Persistent store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub data_dir: String,
    pub cache_ttl_days: u64,
    pub validation_ttl_days: u64,
    pub memory_capacity: usize,
}

/// Quality validation configuration
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub min_ocr_confidence: f32,
    pub min_translation_confidence: f32,
    pub min_overall_score: f32,
    pub max_alternatives: usize,
    /// Readability ceiling: average words per sentence
    pub max_sentence_words: usize,
    /// Readability ceiling: average characters per word
    pub max_word_chars: usize,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub engines: EngineConfig,
    pub consensus: ConsensusConfig,
    pub store: StoreConfig,
    pub validation: ValidationConfig,
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn default_priorities() -> HashMap<String, u8> {
    // Domain-specialized engines outrank general API engines, which
    // outrank the dictionary fallback.
    HashMap::from([
        ("specialized".to_string(), 10),
        ("remote_ocr".to_string(), 8),
        ("libre".to_string(), 5),
        ("dictionary".to_string(), 1),
    ])
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Result<Self, ConfigError> {
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        let mode = match env::var("DISPATCH_MODE") {
            Ok(s) => s.parse()?,
            Err(_) => DispatchMode::Parallel,
        };

        // Priority table override: "ENGINE_PRIORITIES=specialized=10,libre=5"
        let mut priorities = default_priorities();
        if let Ok(raw) = env::var("ENGINE_PRIORITIES") {
            for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let (id, rank) = entry
                    .split_once('=')
                    .ok_or_else(|| ConfigError::InvalidPriorityEntry(entry.to_string()))?;
                let rank: u8 = rank
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidPriorityEntry(entry.to_string()))?;
                priorities.insert(id.trim().to_string(), rank.min(10));
            }
        }

        let fallback_engines = env::var("FALLBACK_ENGINES")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|e| e.trim().to_string())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["specialized".to_string(), "dictionary".to_string()]);

        Ok(Self {
            server: ServerConfig {
                port: env_parse("SERVER_PORT", 1430),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                log_level,
            },
            engines: EngineConfig {
                libre_url: env::var("LIBRETRANSLATE_URL")
                    .unwrap_or_else(|_| "https://libretranslate.de".to_string()),
                libre_api_key: env::var("LIBRETRANSLATE_API_KEY").ok().filter(|s| !s.is_empty()),
                ocr_url: env::var("OCR_SERVICE_URL").unwrap_or_default(),
                priorities,
            },
            consensus: ConsensusConfig {
                mode,
                primary_engine: env::var("PRIMARY_ENGINE")
                    .unwrap_or_else(|_| "libre".to_string()),
                fallback_engines,
                max_workers: env::var("CONSENSUS_WORKERS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| num_cpus::get().min(5)),
                engine_timeout_secs: env_parse("ENGINE_TIMEOUT_SECONDS", 10),
                global_timeout_secs: env_parse("CONSENSUS_TIMEOUT_SECONDS", 30),
                latency_penalty_ms: env_parse("LATENCY_PENALTY_MS", 5_000),
                quality_threshold: env_parse("QUALITY_THRESHOLD", 0.7),
                max_alternatives: env_parse("MAX_ALTERNATIVES", 5),
            },
            store: StoreConfig {
                data_dir: env::var("DATA_DIR").unwrap_or_else(|_| ".data".to_string()),
                cache_ttl_days: env_parse("CACHE_TTL_DAYS", 7),
                validation_ttl_days: env_parse("VALIDATION_TTL_DAYS", 30),
                memory_capacity: env_parse("MEMORY_CAPACITY", 10_000),
            },
            validation: ValidationConfig {
                min_ocr_confidence: env_parse("MIN_OCR_CONFIDENCE", 0.7),
                min_translation_confidence: env_parse("MIN_TRANSLATION_CONFIDENCE", 0.6),
                min_overall_score: env_parse("MIN_OVERALL_SCORE", 0.75),
                max_alternatives: env_parse("VALIDATION_MAX_ALTERNATIVES", 5),
                max_sentence_words: env_parse("MAX_SENTENCE_WORDS", 20),
                max_word_chars: env_parse("MAX_WORD_CHARS", 15),
            },
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("quality_threshold", self.consensus.quality_threshold),
            ("min_ocr_confidence", self.validation.min_ocr_confidence),
            (
                "min_translation_confidence",
                self.validation.min_translation_confidence,
            ),
            ("min_overall_score", self.validation.min_overall_score),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }

        if self.consensus.max_workers == 0 {
            return Err(ConfigError::InvalidWorkerCount(self.consensus.max_workers));
        }
        if self.store.cache_ttl_days == 0 {
            return Err(ConfigError::InvalidTtl(self.store.cache_ttl_days));
        }
        if self.store.validation_ttl_days == 0 {
            return Err(ConfigError::InvalidTtl(self.store.validation_ttl_days));
        }
        if self.store.memory_capacity == 0 {
            return Err(ConfigError::InvalidMemoryCapacity(self.store.memory_capacity));
        }

        Ok(())
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }
}

// Note: No Default implementation because Config::new() can fail
// Users should explicitly call Config::new()? and handle errors

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_priority_table_ranks_specialized_highest() {
        let table = default_priorities();
        assert_eq!(table["specialized"], 10);
        assert_eq!(table["dictionary"], 1);
        assert!(table["specialized"] > table["libre"]);
    }

    #[test]
    fn dispatch_mode_parsing() {
        assert_eq!("sequential".parse::<DispatchMode>().unwrap(), DispatchMode::Sequential);
        assert_eq!("Parallel".parse::<DispatchMode>().unwrap(), DispatchMode::Parallel);
        assert!("random".parse::<DispatchMode>().is_err());
    }
}
