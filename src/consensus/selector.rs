use std::collections::{HashMap, HashSet};

use crate::core::types::{EngineResult, Selection};

/// Scores and ranks candidate results from a consensus round.
///
/// Ranking is fully deterministic: the composite score decides first,
/// then the engine priority table, then the engine id. Repeated runs on
/// the same candidates always produce the same winner and the same
/// ordered alternatives.
pub struct ResultSelector {
    priorities: HashMap<String, u8>,
    latency_penalty_ms: u64,
    /// K: the winner plus K-1 alternatives survive selection
    max_results: usize,
}

impl ResultSelector {
    pub fn new(priorities: HashMap<String, u8>, latency_penalty_ms: u64, max_results: usize) -> Self {
        Self {
            priorities,
            latency_penalty_ms,
            max_results: max_results.max(1),
        }
    }

    fn priority(&self, engine_id: &str) -> u8 {
        self.priorities.get(engine_id).copied().unwrap_or(0)
    }

    /// Composite score for one candidate:
    /// half the reported confidence, plus the engine's rank scaled into
    /// [0, 0.1], plus 0.1 for a domain dictionary hit, minus 0.1 when
    /// the engine was slower than the latency threshold.
    pub fn score(&self, result: &EngineResult) -> f32 {
        let mut score = result.confidence * 0.5;
        score += f32::from(self.priority(&result.engine_id)) * 0.01;
        if result.is_dictionary_hit() {
            score += 0.1;
        }
        if result.processing_time_ms > self.latency_penalty_ms {
            score -= 0.1;
        }
        score
    }

    /// Pick the winner and up to K-1 alternatives, de-duplicated by
    /// exact text. Returns `None` only for an empty candidate list.
    pub fn select(&self, candidates: Vec<EngineResult>) -> Option<Selection> {
        if candidates.is_empty() {
            return None;
        }

        let mut scored: Vec<(f32, EngineResult)> = candidates
            .into_iter()
            .map(|r| (self.score(&r), r))
            .collect();

        scored.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .total_cmp(score_a)
                .then_with(|| self.priority(&b.engine_id).cmp(&self.priority(&a.engine_id)))
                .then_with(|| a.engine_id.cmp(&b.engine_id))
        });

        let mut iter = scored.into_iter().map(|(_, r)| r);
        let winner = iter.next()?;

        let mut seen: HashSet<String> = HashSet::from([winner.text.clone()]);
        let mut alternatives = Vec::new();
        for candidate in iter {
            if alternatives.len() + 1 >= self.max_results {
                break;
            }
            if seen.insert(candidate.text.clone()) {
                alternatives.push(candidate);
            }
        }

        Some(Selection { winner, alternatives })
    }
}
