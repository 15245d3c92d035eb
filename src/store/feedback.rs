use parking_lot::RwLock;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use xxhash_rust::xxh3::xxh3_64;

use crate::core::errors::StoreResult;
use crate::core::types::{FeedbackType, UserFeedback};
use crate::store::{open_database, SECS_PER_DAY};
use crate::utils::now_secs;

/// How many historical rows are replayed into the learned state at open.
const REPLAY_LIMIT: i64 = 1_000;

/// Corrections longer than this are too specific to generalize.
const MAX_CORRECTION_LEN: usize = 3;

/// Ratings at or above this update learned state.
const LEARN_RATING: u8 = 4;

/// Append-only log of user corrections plus the state learned from them.
///
/// Feedback never mutates past validation results; it only influences
/// future alternative generation through two learned structures:
/// a short-substring correction table (from OCR corrections) and
/// per-source suggestion buckets (from rated corrections).
pub struct FeedbackStore {
    conn: parking_lot::Mutex<Connection>,
    corrections: RwLock<Vec<(String, String)>>,
    suggestions: RwLock<HashMap<String, Vec<String>>>,
}

impl FeedbackStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = open_database(path)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS user_feedback (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                original_text  TEXT NOT NULL,
                corrected_text TEXT NOT NULL,
                feedback_type  TEXT NOT NULL,
                rating         INTEGER NOT NULL,
                context        TEXT NOT NULL,
                created_at     INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_feedback_created
                ON user_feedback (created_at);",
        )?;

        let store = Self {
            conn: parking_lot::Mutex::new(conn),
            corrections: RwLock::new(Vec::new()),
            suggestions: RwLock::new(HashMap::new()),
        };
        store.replay()?;
        Ok(store)
    }

    /// Rebuild learned state from the most recent high-rated feedback.
    fn replay(&self) -> StoreResult<()> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT original_text, corrected_text, feedback_type, rating
             FROM user_feedback
             WHERE rating >= ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![LEARN_RATING, REPLAY_LIMIT], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        for row in rows {
            let (original, corrected, feedback_type) = row?;
            self.learn(&original, &corrected, &feedback_type);
        }
        Ok(())
    }

    pub fn bucket_key(source_text: &str) -> String {
        format!("{:016x}", xxh3_64(source_text.as_bytes()))
    }

    /// Append one feedback record and absorb it into learned state when
    /// it is rated highly enough.
    pub fn record(&self, feedback: &UserFeedback) -> StoreResult<()> {
        let context = serde_json::to_string(&feedback.context)?;
        self.conn.lock().execute(
            "INSERT INTO user_feedback
             (original_text, corrected_text, feedback_type, rating, context, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                feedback.original_text,
                feedback.corrected_text,
                feedback.feedback_type.as_str(),
                feedback.rating,
                context,
                now_secs(),
            ],
        )?;

        if feedback.rating >= LEARN_RATING {
            self.learn(
                &feedback.original_text,
                &feedback.corrected_text,
                feedback.feedback_type.as_str(),
            );
        }
        Ok(())
    }

    fn learn(&self, original: &str, corrected: &str, feedback_type: &str) {
        if feedback_type == FeedbackType::OcrCorrection.as_str() {
            if let Some((wrong, right)) = short_diff(original, corrected) {
                let mut table = self.corrections.write();
                if !table.iter().any(|(w, _)| *w == wrong) {
                    table.push((wrong, right));
                }
            }
        }

        // Any highly rated correction becomes a suggestion for its
        // exact source text
        if original != corrected && !corrected.trim().is_empty() {
            let mut buckets = self.suggestions.write();
            let bucket = buckets.entry(Self::bucket_key(original)).or_default();
            if !bucket.iter().any(|s| s == corrected) {
                bucket.push(corrected.to_string());
            }
        }
    }

    /// Learned wrong→right substring pairs, oldest first.
    pub fn corrections(&self) -> Vec<(String, String)> {
        self.corrections.read().clone()
    }

    /// Approved replacement texts for this exact source text.
    pub fn suggestions_for(&self, source_text: &str) -> Vec<String> {
        self.suggestions
            .read()
            .get(&Self::bucket_key(source_text))
            .cloned()
            .unwrap_or_default()
    }

    /// Per-type counts and average rating over the trailing week.
    pub fn stats(&self) -> StoreResult<serde_json::Value> {
        let conn = self.conn.lock();
        let cutoff = now_secs() - 7 * SECS_PER_DAY;

        let mut stmt = conn.prepare(
            "SELECT feedback_type, COUNT(*), AVG(rating)
             FROM user_feedback
             WHERE created_at > ?1
             GROUP BY feedback_type",
        )?;
        let rows = stmt.query_map(params![cutoff], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?;

        let mut per_type = serde_json::Map::new();
        for row in rows {
            let (kind, count, avg) = row?;
            per_type.insert(
                kind,
                serde_json::json!({ "count": count, "avg_rating": avg }),
            );
        }

        Ok(serde_json::json!({
            "recent_by_type": per_type,
            "learned_corrections": self.corrections.read().len(),
            "suggestion_buckets": self.suggestions.read().len(),
        }))
    }
}

/// Extract the differing middle of two strings when it is short enough
/// to generalize (both sides at most [`MAX_CORRECTION_LEN`] chars).
///
/// Works on the common-prefix/common-suffix decomposition, which is
/// exact for the single-replacement corrections users actually submit.
fn short_diff(original: &str, corrected: &str) -> Option<(String, String)> {
    if original == corrected {
        return None;
    }

    let orig: Vec<char> = original.chars().collect();
    let corr: Vec<char> = corrected.chars().collect();

    let prefix = orig
        .iter()
        .zip(corr.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let max_suffix = orig.len().min(corr.len()) - prefix;
    let suffix = orig
        .iter()
        .rev()
        .zip(corr.iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
        .min(max_suffix);

    let wrong: String = orig[prefix..orig.len() - suffix].iter().collect();
    let right: String = corr[prefix..corr.len() - suffix].iter().collect();

    if wrong.is_empty()
        || right.is_empty()
        || wrong.chars().count() > MAX_CORRECTION_LEN
        || right.chars().count() > MAX_CORRECTION_LEN
    {
        return None;
    }

    Some((wrong, right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn feedback(original: &str, corrected: &str, kind: FeedbackType, rating: u8) -> UserFeedback {
        UserFeedback {
            original_text: original.to_string(),
            corrected_text: corrected.to_string(),
            feedback_type: kind,
            rating,
            context: HashMap::new(),
        }
    }

    #[test]
    fn short_diff_extracts_replacement() {
        assert_eq!(
            short_diff("He11o world", "Hello world"),
            Some(("11".to_string(), "ll".to_string()))
        );
        assert_eq!(short_diff("same", "same"), None);
        // Whole-sentence rewrites do not generalize
        assert_eq!(short_diff("completely different", "nothing alike"), None);
    }

    #[test]
    fn high_rated_ocr_correction_updates_table() {
        let dir = TempDir::new().unwrap();
        let store = FeedbackStore::open(&dir.path().join("feedback.db")).unwrap();

        store
            .record(&feedback("He11o", "Hello", FeedbackType::OcrCorrection, 5))
            .unwrap();
        assert_eq!(
            store.corrections(),
            vec![("11".to_string(), "ll".to_string())]
        );
    }

    #[test]
    fn low_rated_feedback_is_logged_but_not_learned() {
        let dir = TempDir::new().unwrap();
        let store = FeedbackStore::open(&dir.path().join("feedback.db")).unwrap();

        store
            .record(&feedback("He11o", "Hello", FeedbackType::OcrCorrection, 2))
            .unwrap();
        assert!(store.corrections().is_empty());
        assert!(store.suggestions_for("He11o").is_empty());
    }

    #[test]
    fn translation_correction_seeds_suggestion_bucket() {
        let dir = TempDir::new().unwrap();
        let store = FeedbackStore::open(&dir.path().join("feedback.db")).unwrap();

        store
            .record(&feedback(
                "Hello world",
                "Здравствуй, мир",
                FeedbackType::TranslationCorrection,
                4,
            ))
            .unwrap();

        assert_eq!(store.suggestions_for("Hello world"), vec!["Здравствуй, мир"]);
        assert!(store.suggestions_for("Other text").is_empty());
    }

    #[test]
    fn learned_state_is_rebuilt_on_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feedback.db");

        {
            let store = FeedbackStore::open(&path).unwrap();
            store
                .record(&feedback("He11o", "Hello", FeedbackType::OcrCorrection, 5))
                .unwrap();
        }

        let store = FeedbackStore::open(&path).unwrap();
        assert_eq!(
            store.corrections(),
            vec![("11".to_string(), "ll".to_string())]
        );
        assert_eq!(store.suggestions_for("He11o"), vec!["Hello"]);
    }
}
