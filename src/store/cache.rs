use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use xxhash_rust::xxh3::xxh3_64;

use crate::core::errors::StoreResult;
use crate::store::{open_database, SECS_PER_DAY};
use crate::utils::now_secs;

/// A replayed translation cache row.
#[derive(Debug, Clone)]
pub struct CachedTranslation {
    pub source_text: String,
    pub translated_text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub engine: String,
    pub domain: String,
    pub confidence: f32,
    pub created_at: i64,
}

/// A replayed OCR cache row.
#[derive(Debug, Clone)]
pub struct CachedRecognition {
    pub text: String,
    pub languages: String,
    pub engine: String,
    pub confidence: f32,
    pub created_at: i64,
}

/// Content-addressed store of past engine outputs with TTL expiry.
///
/// At most one live entry per key; writes are replace-on-conflict.
/// Expired entries are treated as absent on read (lazy expiry) and
/// reclaimed only by an explicit [`CacheStore::sweep_expired`].
pub struct CacheStore {
    conn: Mutex<Connection>,
    ttl_secs: i64,
}

impl CacheStore {
    pub fn open(path: &Path, ttl_days: u64) -> StoreResult<Self> {
        let conn = open_database(path)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS translation_cache (
                hash            TEXT PRIMARY KEY,
                source_text     TEXT NOT NULL,
                translated_text TEXT NOT NULL,
                source_lang     TEXT NOT NULL,
                target_lang     TEXT NOT NULL,
                engine          TEXT NOT NULL,
                domain          TEXT NOT NULL,
                confidence      REAL NOT NULL,
                created_at      INTEGER NOT NULL,
                last_used       INTEGER NOT NULL,
                usage_count     INTEGER NOT NULL DEFAULT 1
            );
            CREATE INDEX IF NOT EXISTS idx_translation_cache_langs
                ON translation_cache (source_lang, target_lang);
            CREATE INDEX IF NOT EXISTS idx_translation_cache_created
                ON translation_cache (created_at);
            CREATE TABLE IF NOT EXISTS ocr_cache (
                hash        TEXT PRIMARY KEY,
                text        TEXT NOT NULL,
                languages   TEXT NOT NULL,
                engine      TEXT NOT NULL,
                confidence  REAL NOT NULL,
                created_at  INTEGER NOT NULL,
                last_used   INTEGER NOT NULL,
                usage_count INTEGER NOT NULL DEFAULT 1
            );
            CREATE INDEX IF NOT EXISTS idx_ocr_cache_created
                ON ocr_cache (created_at);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            ttl_secs: ttl_days as i64 * SECS_PER_DAY,
        })
    }

    /// Cache key for one (content, language pair, engine) combination.
    pub fn translation_key(text: &str, source_lang: &str, target_lang: &str, engine: &str) -> String {
        let input = format!("{text}|{source_lang}|{target_lang}|{engine}");
        format!("{:016x}", xxh3_64(input.as_bytes()))
    }

    /// Cache key for one (image region, languages, engine) combination.
    pub fn recognition_key(image_bytes: &[u8], languages: &[String], engine: &str) -> String {
        let mut input = Vec::with_capacity(image_bytes.len() + 64);
        input.extend_from_slice(image_bytes);
        input.push(b'|');
        input.extend_from_slice(languages.join(",").as_bytes());
        input.push(b'|');
        input.extend_from_slice(engine.as_bytes());
        format!("{:016x}", xxh3_64(&input))
    }

    fn is_expired(&self, created_at: i64, now: i64) -> bool {
        now - created_at > self.ttl_secs
    }

    /// Look up a translation entry. A live hit refreshes `last_used` and
    /// `usage_count`; an expired row reads as absent without deletion.
    pub fn get_translation(&self, key: &str) -> StoreResult<Option<CachedTranslation>> {
        let conn = self.conn.lock();
        let now = now_secs();

        let row = conn
            .query_row(
                "SELECT source_text, translated_text, source_lang, target_lang,
                        engine, domain, confidence, created_at
                 FROM translation_cache WHERE hash = ?1",
                params![key],
                |row| {
                    Ok(CachedTranslation {
                        source_text: row.get(0)?,
                        translated_text: row.get(1)?,
                        source_lang: row.get(2)?,
                        target_lang: row.get(3)?,
                        engine: row.get(4)?,
                        domain: row.get(5)?,
                        confidence: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                },
            )
            .optional()?;

        match row {
            Some(entry) if !self.is_expired(entry.created_at, now) => {
                conn.execute(
                    "UPDATE translation_cache
                     SET last_used = ?1, usage_count = usage_count + 1
                     WHERE hash = ?2",
                    params![now, key],
                )?;
                Ok(Some(entry))
            }
            _ => Ok(None),
        }
    }

    /// Upsert a translation entry (replace-on-conflict).
    pub fn put_translation(&self, key: &str, entry: &CachedTranslation) -> StoreResult<()> {
        let conn = self.conn.lock();
        let now = now_secs();
        conn.execute(
            "INSERT OR REPLACE INTO translation_cache
             (hash, source_text, translated_text, source_lang, target_lang,
              engine, domain, confidence, created_at, last_used, usage_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, 1)",
            params![
                key,
                entry.source_text,
                entry.translated_text,
                entry.source_lang,
                entry.target_lang,
                entry.engine,
                entry.domain,
                entry.confidence,
                now,
            ],
        )?;
        Ok(())
    }

    /// Probe a batch of texts for one engine and language pair. Returns
    /// per-input hits and the indices that still need computing.
    pub fn get_translation_batch(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
        engine: &str,
    ) -> StoreResult<(Vec<Option<CachedTranslation>>, Vec<usize>)> {
        let mut hits = Vec::with_capacity(texts.len());
        let mut missing = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            let key = Self::translation_key(text, source_lang, target_lang, engine);
            match self.get_translation(&key)? {
                Some(entry) => hits.push(Some(entry)),
                None => {
                    hits.push(None);
                    missing.push(i);
                }
            }
        }

        Ok((hits, missing))
    }

    pub fn get_recognition(&self, key: &str) -> StoreResult<Option<CachedRecognition>> {
        let conn = self.conn.lock();
        let now = now_secs();

        let row = conn
            .query_row(
                "SELECT text, languages, engine, confidence, created_at
                 FROM ocr_cache WHERE hash = ?1",
                params![key],
                |row| {
                    Ok(CachedRecognition {
                        text: row.get(0)?,
                        languages: row.get(1)?,
                        engine: row.get(2)?,
                        confidence: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()?;

        match row {
            Some(entry) if !self.is_expired(entry.created_at, now) => {
                conn.execute(
                    "UPDATE ocr_cache
                     SET last_used = ?1, usage_count = usage_count + 1
                     WHERE hash = ?2",
                    params![now, key],
                )?;
                Ok(Some(entry))
            }
            _ => Ok(None),
        }
    }

    pub fn put_recognition(&self, key: &str, entry: &CachedRecognition) -> StoreResult<()> {
        let conn = self.conn.lock();
        let now = now_secs();
        conn.execute(
            "INSERT OR REPLACE INTO ocr_cache
             (hash, text, languages, engine, confidence, created_at, last_used, usage_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, 1)",
            params![key, entry.text, entry.languages, entry.engine, entry.confidence, now],
        )?;
        Ok(())
    }

    /// Physically reclaim every expired row from both tables.
    pub fn sweep_expired(&self) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let cutoff = now_secs() - self.ttl_secs;
        let translations =
            conn.execute("DELETE FROM translation_cache WHERE created_at < ?1", params![cutoff])?;
        let recognitions =
            conn.execute("DELETE FROM ocr_cache WHERE created_at < ?1", params![cutoff])?;
        Ok(translations + recognitions)
    }

    /// Row counts, expired counts, and per-language-pair totals.
    pub fn stats(&self) -> StoreResult<serde_json::Value> {
        let conn = self.conn.lock();
        let cutoff = now_secs() - self.ttl_secs;

        let total: i64 =
            conn.query_row("SELECT COUNT(*) FROM translation_cache", [], |r| r.get(0))?;
        let expired: i64 = conn.query_row(
            "SELECT COUNT(*) FROM translation_cache WHERE created_at < ?1",
            params![cutoff],
            |r| r.get(0),
        )?;
        let ocr_total: i64 = conn.query_row("SELECT COUNT(*) FROM ocr_cache", [], |r| r.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT source_lang, target_lang, COUNT(*)
             FROM translation_cache GROUP BY source_lang, target_lang",
        )?;
        let mut pairs: HashMap<String, i64> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
        })?;
        for row in rows {
            let (source, target, count) = row?;
            pairs.insert(format!("{source}->{target}"), count);
        }

        Ok(serde_json::json!({
            "translation_entries": total,
            "translation_expired": expired,
            "ocr_entries": ocr_total,
            "language_pairs": pairs,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(text: &str, translated: &str, engine: &str) -> CachedTranslation {
        CachedTranslation {
            source_text: text.to_string(),
            translated_text: translated.to_string(),
            source_lang: "en".to_string(),
            target_lang: "ru".to_string(),
            engine: engine.to_string(),
            domain: "general".to_string(),
            confidence: 0.8,
            created_at: 0,
        }
    }

    fn open_store(dir: &TempDir, ttl_days: u64) -> CacheStore {
        CacheStore::open(&dir.path().join("cache.db"), ttl_days).unwrap()
    }

    #[test]
    fn round_trip_before_ttl() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, 7);

        let key = CacheStore::translation_key("Hello world", "en", "ru", "libre");
        store.put_translation(&key, &entry("Hello world", "Привет мир", "libre")).unwrap();

        let hit = store.get_translation(&key).unwrap().unwrap();
        assert_eq!(hit.translated_text, "Привет мир");
        assert_eq!(hit.engine, "libre");
    }

    #[test]
    fn expired_entry_reads_as_absent_until_swept() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, 7);

        let key = CacheStore::translation_key("old", "en", "ru", "libre");
        store.put_translation(&key, &entry("old", "старый", "libre")).unwrap();

        // Backdate past the TTL
        {
            let conn = store.conn.lock();
            conn.execute(
                "UPDATE translation_cache SET created_at = created_at - ?1",
                params![8 * SECS_PER_DAY],
            )
            .unwrap();
        }

        assert!(store.get_translation(&key).unwrap().is_none());

        // Lazy expiry: the row is still physically present
        let total: i64 = store
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM translation_cache", [], |r| r.get(0))
            .unwrap();
        assert_eq!(total, 1);

        assert_eq!(store.sweep_expired().unwrap(), 1);
        let total: i64 = store
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM translation_cache", [], |r| r.get(0))
            .unwrap();
        assert_eq!(total, 0);
    }

    #[test]
    fn upsert_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, 7);

        let key = CacheStore::translation_key("Hello", "en", "ru", "libre");
        store.put_translation(&key, &entry("Hello", "v1", "libre")).unwrap();
        store.put_translation(&key, &entry("Hello", "v2", "libre")).unwrap();

        let count: i64 = store
            .conn
            .lock()
            .query_row(
                "SELECT COUNT(*) FROM translation_cache WHERE hash = ?1",
                params![key],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.get_translation(&key).unwrap().unwrap().translated_text, "v2");
    }

    #[test]
    fn hit_refreshes_usage() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, 7);

        let key = CacheStore::translation_key("Hello", "en", "ru", "libre");
        store.put_translation(&key, &entry("Hello", "Привет", "libre")).unwrap();
        store.get_translation(&key).unwrap();
        store.get_translation(&key).unwrap();

        let usage: i64 = store
            .conn
            .lock()
            .query_row(
                "SELECT usage_count FROM translation_cache WHERE hash = ?1",
                params![key],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(usage, 3);
    }

    #[test]
    fn keys_are_engine_scoped() {
        let a = CacheStore::translation_key("Hello", "en", "ru", "libre");
        let b = CacheStore::translation_key("Hello", "en", "ru", "dictionary");
        assert_ne!(a, b);
        assert_eq!(a, CacheStore::translation_key("Hello", "en", "ru", "libre"));
    }

    #[test]
    fn batch_probe_reports_missing_indices() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, 7);

        let key = CacheStore::translation_key("one", "en", "ru", "libre");
        store.put_translation(&key, &entry("one", "один", "libre")).unwrap();

        let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let (hits, missing) = store
            .get_translation_batch(&texts, "en", "ru", "libre")
            .unwrap();

        assert!(hits[0].is_some());
        assert!(hits[1].is_none());
        assert_eq!(missing, vec![1, 2]);
    }

    #[test]
    fn recognition_cache_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, 7);

        let languages = vec!["en".to_string()];
        let key = CacheStore::recognition_key(b"region-bytes", &languages, "remote_ocr");
        store
            .put_recognition(
                &key,
                &CachedRecognition {
                    text: "Hello".to_string(),
                    languages: "en".to_string(),
                    engine: "remote_ocr".to_string(),
                    confidence: 0.9,
                    created_at: 0,
                },
            )
            .unwrap();

        let hit = store.get_recognition(&key).unwrap().unwrap();
        assert_eq!(hit.text, "Hello");

        let other = CacheStore::recognition_key(b"other-bytes", &languages, "remote_ocr");
        assert!(store.get_recognition(&other).unwrap().is_none());
    }
}
