use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;

use crate::core::errors::StoreResult;
use crate::core::types::ValidationResult;
use crate::store::{open_database, SECS_PER_DAY};
use crate::utils::now_secs;

/// Audit log of validation outcomes.
///
/// Rows are written once and never mutated. Records older than the
/// configured TTL are ignored by reads and reclaimed by `sweep_expired`.
pub struct ValidationStore {
    conn: Mutex<Connection>,
    ttl_secs: i64,
}

impl ValidationStore {
    pub fn open(path: &Path, ttl_days: u64) -> StoreResult<Self> {
        let conn = open_database(path)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS validation_results (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                text_hash     TEXT NOT NULL,
                overall_score REAL NOT NULL,
                status        TEXT NOT NULL,
                issues        TEXT NOT NULL,
                suggestions   TEXT NOT NULL,
                created_at    INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_validation_created
                ON validation_results (created_at);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            ttl_secs: ttl_days as i64 * SECS_PER_DAY,
        })
    }

    pub fn record(&self, text_hash: &str, result: &ValidationResult) -> StoreResult<()> {
        let issues = serde_json::to_string(&result.issues)?;
        let suggestions = serde_json::to_string(&result.suggestions)?;
        self.conn.lock().execute(
            "INSERT INTO validation_results
             (text_hash, overall_score, status, issues, suggestions, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                text_hash,
                result.overall_score as f64,
                result.status.as_str(),
                issues,
                suggestions,
                result.created_at,
            ],
        )?;
        Ok(())
    }

    /// Per-status counts and mean scores over the trailing week,
    /// ignoring rows past the record TTL.
    pub fn recent_stats(&self) -> StoreResult<serde_json::Value> {
        let conn = self.conn.lock();
        let now = now_secs();
        let cutoff = (now - 7 * SECS_PER_DAY).max(now - self.ttl_secs);

        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*), AVG(overall_score)
             FROM validation_results
             WHERE created_at > ?1
             GROUP BY status",
        )?;
        let rows = stmt.query_map(params![cutoff], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?;

        let mut per_status = serde_json::Map::new();
        for row in rows {
            let (status, count, avg) = row?;
            per_status.insert(
                status,
                serde_json::json!({ "count": count, "avg_score": avg }),
            );
        }

        Ok(serde_json::Value::Object(per_status))
    }

    /// Physically reclaim rows past the record TTL.
    pub fn sweep_expired(&self) -> StoreResult<usize> {
        let cutoff = now_secs() - self.ttl_secs;
        let removed = self.conn.lock().execute(
            "DELETE FROM validation_results WHERE created_at < ?1",
            params![cutoff],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ValidationStatus;
    use tempfile::TempDir;

    fn result(score: f32, status: ValidationStatus) -> ValidationResult {
        ValidationResult {
            status,
            overall_score: score,
            metric_scores: Vec::new(),
            issues: vec!["issue".to_string()],
            suggestions: Vec::new(),
            alternatives: Vec::new(),
            created_at: now_secs(),
        }
    }

    #[test]
    fn records_are_persisted_and_aggregated() {
        let dir = TempDir::new().unwrap();
        let store = ValidationStore::open(&dir.path().join("validation.db"), 30).unwrap();

        store.record("abc", &result(0.9, ValidationStatus::Passed)).unwrap();
        store.record("def", &result(0.6, ValidationStatus::Warning)).unwrap();
        store.record("ghi", &result(0.8, ValidationStatus::Passed)).unwrap();

        let stats = store.recent_stats().unwrap();
        assert_eq!(stats["passed"]["count"], 2);
        assert_eq!(stats["warning"]["count"], 1);
    }

    #[test]
    fn sweep_reclaims_old_rows() {
        let dir = TempDir::new().unwrap();
        let store = ValidationStore::open(&dir.path().join("validation.db"), 30).unwrap();

        store.record("abc", &result(0.9, ValidationStatus::Passed)).unwrap();
        store
            .conn
            .lock()
            .execute(
                "UPDATE validation_results SET created_at = created_at - ?1",
                params![31 * SECS_PER_DAY],
            )
            .unwrap();

        assert_eq!(store.sweep_expired().unwrap(), 1);
    }
}
