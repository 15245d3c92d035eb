use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Global metrics collector for the pipeline.
///
/// Tracks engine dispatch outcomes, cache/memory performance and request
/// latencies. Thread-safe and cheap to clone.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

/// Per-engine dispatch counters.
#[derive(Default)]
pub struct EngineCounters {
    pub calls: AtomicUsize,
    pub failures: AtomicUsize,
    pub timeouts: AtomicUsize,
}

struct MetricsInner {
    // Request metrics
    requests_total: AtomicUsize,
    requests_failed: AtomicUsize,
    request_latency_ms: RwLock<Vec<u64>>,

    // Store metrics
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    memory_hits: AtomicUsize,

    // Per-engine dispatch counters
    engines: DashMap<String, EngineCounters>,

    // Validation outcomes by status label
    validations: DashMap<String, AtomicUsize>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                requests_total: AtomicUsize::new(0),
                requests_failed: AtomicUsize::new(0),
                request_latency_ms: RwLock::new(Vec::new()),
                cache_hits: AtomicUsize::new(0),
                cache_misses: AtomicUsize::new(0),
                memory_hits: AtomicUsize::new(0),
                engines: DashMap::new(),
                validations: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    pub fn record_request(&self, success: bool, duration: Duration) {
        self.inner.requests_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.inner.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.inner
            .request_latency_ms
            .write()
            .push(duration.as_millis() as u64);
    }

    pub fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.inner.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_memory_hit(&self) {
        self.inner.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_engine_call(&self, engine_id: &str) {
        self.engine_entry(engine_id).calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_engine_failure(&self, engine_id: &str) {
        self.engine_entry(engine_id)
            .failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_engine_timeout(&self, engine_id: &str) {
        self.engine_entry(engine_id)
            .timeouts
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validation(&self, status: &str) {
        self.inner
            .validations
            .entry(status.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    fn engine_entry(
        &self,
        engine_id: &str,
    ) -> dashmap::mapref::one::RefMut<'_, String, EngineCounters> {
        self.inner.engines.entry(engine_id.to_string()).or_default()
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.inner.cache_hits.load(Ordering::Relaxed);
        let misses = self.inner.cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn uptime(&self) -> Duration {
        self.inner.start_time.elapsed()
    }

    /// Render counters in Prometheus text exposition format.
    pub fn to_prometheus(&self) -> String {
        let mut out = String::with_capacity(1024);
        let i = &self.inner;

        out.push_str("# TYPE pipeline_requests_total counter\n");
        out.push_str(&format!(
            "pipeline_requests_total {}\n",
            i.requests_total.load(Ordering::Relaxed)
        ));
        out.push_str("# TYPE pipeline_requests_failed counter\n");
        out.push_str(&format!(
            "pipeline_requests_failed {}\n",
            i.requests_failed.load(Ordering::Relaxed)
        ));
        out.push_str("# TYPE pipeline_cache_hits counter\n");
        out.push_str(&format!(
            "pipeline_cache_hits {}\n",
            i.cache_hits.load(Ordering::Relaxed)
        ));
        out.push_str("# TYPE pipeline_cache_misses counter\n");
        out.push_str(&format!(
            "pipeline_cache_misses {}\n",
            i.cache_misses.load(Ordering::Relaxed)
        ));
        out.push_str("# TYPE pipeline_memory_hits counter\n");
        out.push_str(&format!(
            "pipeline_memory_hits {}\n",
            i.memory_hits.load(Ordering::Relaxed)
        ));

        out.push_str("# TYPE pipeline_engine_calls counter\n");
        for entry in i.engines.iter() {
            out.push_str(&format!(
                "pipeline_engine_calls{{engine=\"{}\"}} {}\n",
                entry.key(),
                entry.value().calls.load(Ordering::Relaxed)
            ));
            out.push_str(&format!(
                "pipeline_engine_failures{{engine=\"{}\"}} {}\n",
                entry.key(),
                entry.value().failures.load(Ordering::Relaxed)
            ));
            out.push_str(&format!(
                "pipeline_engine_timeouts{{engine=\"{}\"}} {}\n",
                entry.key(),
                entry.value().timeouts.load(Ordering::Relaxed)
            ));
        }

        out.push_str("# TYPE pipeline_validations counter\n");
        for entry in i.validations.iter() {
            out.push_str(&format!(
                "pipeline_validations{{status=\"{}\"}} {}\n",
                entry.key(),
                entry.value().load(Ordering::Relaxed)
            ));
        }

        out.push_str("# TYPE pipeline_uptime_seconds gauge\n");
        out.push_str(&format!(
            "pipeline_uptime_seconds {}\n",
            i.start_time.elapsed().as_secs()
        ));

        out
    }

    /// JSON snapshot for the /stats endpoint.
    pub fn snapshot(&self) -> serde_json::Value {
        let i = &self.inner;
        let latencies = i.request_latency_ms.read();
        let avg_latency = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<u64>() as f64 / latencies.len() as f64
        };

        let engines: serde_json::Map<String, serde_json::Value> = i
            .engines
            .iter()
            .map(|e| {
                (
                    e.key().clone(),
                    serde_json::json!({
                        "calls": e.value().calls.load(Ordering::Relaxed),
                        "failures": e.value().failures.load(Ordering::Relaxed),
                        "timeouts": e.value().timeouts.load(Ordering::Relaxed),
                    }),
                )
            })
            .collect();

        serde_json::json!({
            "requests_total": i.requests_total.load(Ordering::Relaxed),
            "requests_failed": i.requests_failed.load(Ordering::Relaxed),
            "avg_request_latency_ms": avg_latency,
            "cache_hits": i.cache_hits.load(Ordering::Relaxed),
            "cache_misses": i.cache_misses.load(Ordering::Relaxed),
            "cache_hit_rate": self.cache_hit_rate(),
            "memory_hits": i.memory_hits.load(Ordering::Relaxed),
            "engines": engines,
            "uptime_seconds": i.start_time.elapsed().as_secs(),
        })
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let m = Metrics::new();
        m.record_cache_hit();
        m.record_cache_hit();
        m.record_cache_miss();
        assert!((m.cache_hit_rate() - 2.0 / 3.0).abs() < 1e-9);

        m.record_engine_call("libre");
        m.record_engine_failure("libre");
        let text = m.to_prometheus();
        assert!(text.contains("pipeline_engine_calls{engine=\"libre\"} 1"));
        assert!(text.contains("pipeline_engine_failures{engine=\"libre\"} 1"));
    }
}
