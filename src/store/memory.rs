use lru::LruCache;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::num::NonZeroUsize;
use std::path::Path;
use xxhash_rust::xxh3::xxh3_64;

use crate::core::errors::StoreResult;
use crate::core::types::Domain;
use crate::store::open_database;
use crate::utils::now_secs;

/// One curated best-known translation.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    pub source_text: String,
    pub target_text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub domain: String,
    pub quality_score: f32,
    pub usage_count: i64,
    pub last_used: i64,
    pub created_at: i64,
}

/// Engine-independent store of approved translations, consulted before
/// any engine is invoked.
///
/// Rows persist in SQLite with no TTL; a bounded in-process LRU layer
/// serves the hot path and is warm-loaded at startup from the
/// best-rated rows. Above capacity, the least recently used rows are
/// evicted from disk as well.
pub struct MemoryStore {
    conn: Mutex<Connection>,
    hot: Mutex<LruCache<String, MemoryEntry>>,
    capacity: usize,
}

impl MemoryStore {
    pub fn open(path: &Path, capacity: usize) -> StoreResult<Self> {
        let conn = open_database(path)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS translation_memory (
                key           TEXT PRIMARY KEY,
                source_text   TEXT NOT NULL,
                target_text   TEXT NOT NULL,
                source_lang   TEXT NOT NULL,
                target_lang   TEXT NOT NULL,
                domain        TEXT NOT NULL,
                quality_score REAL NOT NULL,
                usage_count   INTEGER NOT NULL DEFAULT 1,
                last_used     INTEGER NOT NULL,
                created_at    INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_memory_quality
                ON translation_memory (quality_score DESC, usage_count DESC);",
        )?;

        let cap = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        let mut hot = LruCache::new(cap);

        // Warm-load the best entries so startup traffic hits memory
        {
            let mut stmt = conn.prepare(
                "SELECT key, source_text, target_text, source_lang, target_lang,
                        domain, quality_score, usage_count, last_used, created_at
                 FROM translation_memory
                 ORDER BY quality_score DESC, usage_count DESC
                 LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![capacity as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    MemoryEntry {
                        source_text: row.get(1)?,
                        target_text: row.get(2)?,
                        source_lang: row.get(3)?,
                        target_lang: row.get(4)?,
                        domain: row.get(5)?,
                        quality_score: row.get(6)?,
                        usage_count: row.get(7)?,
                        last_used: row.get(8)?,
                        created_at: row.get(9)?,
                    },
                ))
            })?;
            for row in rows {
                let (key, entry) = row?;
                hot.put(key, entry);
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
            hot: Mutex::new(hot),
            capacity,
        })
    }

    /// Memory key over (content, language pair, domain). Engines do not
    /// participate in the key.
    pub fn key(text: &str, source_lang: &str, target_lang: &str, domain: Domain) -> String {
        let input = format!("{text}|{source_lang}|{target_lang}|{}", domain.as_str());
        format!("{:016x}", xxh3_64(input.as_bytes()))
    }

    /// Exact-match lookup. A hit bumps usage statistics in both layers.
    pub fn lookup(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        domain: Domain,
    ) -> StoreResult<Option<MemoryEntry>> {
        let key = Self::key(text, source_lang, target_lang, domain);
        let now = now_secs();

        let mut hot = self.hot.lock();
        if let Some(entry) = hot.get_mut(&key) {
            entry.usage_count += 1;
            entry.last_used = now;
            let found = entry.clone();
            drop(hot);
            self.bump_usage(&key, now)?;
            return Ok(Some(found));
        }
        drop(hot);

        // Fall back to disk: the row may have been evicted from the hot
        // layer but still live in the store
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT source_text, target_text, source_lang, target_lang,
                        domain, quality_score, usage_count, last_used, created_at
                 FROM translation_memory WHERE key = ?1",
                params![key],
                |row| {
                    Ok(MemoryEntry {
                        source_text: row.get(0)?,
                        target_text: row.get(1)?,
                        source_lang: row.get(2)?,
                        target_lang: row.get(3)?,
                        domain: row.get(4)?,
                        quality_score: row.get(5)?,
                        usage_count: row.get(6)?,
                        last_used: row.get(7)?,
                        created_at: row.get(8)?,
                    })
                },
            )
            .optional()?;
        drop(conn);

        match row {
            Some(mut entry) => {
                entry.usage_count += 1;
                entry.last_used = now;
                self.bump_usage(&key, now)?;
                self.hot.lock().put(key, entry.clone());
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    fn bump_usage(&self, key: &str, now: i64) -> StoreResult<()> {
        self.conn.lock().execute(
            "UPDATE translation_memory
             SET usage_count = usage_count + 1, last_used = ?1
             WHERE key = ?2",
            params![now, key],
        )?;
        Ok(())
    }

    /// Upsert an approved translation and enforce the capacity bound by
    /// evicting the least recently used rows.
    pub fn store(&self, entry: &MemoryEntry) -> StoreResult<()> {
        let key = Self::key(
            &entry.source_text,
            &entry.source_lang,
            &entry.target_lang,
            entry.domain.parse().unwrap_or_default(),
        );
        let now = now_secs();

        {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO translation_memory
                 (key, source_text, target_text, source_lang, target_lang,
                  domain, quality_score, usage_count, last_used, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)
                 ON CONFLICT(key) DO UPDATE SET
                     target_text = excluded.target_text,
                     quality_score = excluded.quality_score,
                     usage_count = usage_count + 1,
                     last_used = excluded.last_used",
                params![
                    key,
                    entry.source_text,
                    entry.target_text,
                    entry.source_lang,
                    entry.target_lang,
                    entry.domain,
                    entry.quality_score,
                    now,
                ],
            )?;

            let total: i64 =
                conn.query_row("SELECT COUNT(*) FROM translation_memory", [], |r| r.get(0))?;
            let excess = total - self.capacity as i64;
            if excess > 0 {
                conn.execute(
                    "DELETE FROM translation_memory WHERE key IN (
                         SELECT key FROM translation_memory
                         ORDER BY last_used ASC, usage_count ASC
                         LIMIT ?1
                     )",
                    params![excess],
                )?;
            }
        }

        let mut stored = entry.clone();
        stored.last_used = now;
        self.hot.lock().put(key, stored);
        Ok(())
    }

    pub fn len(&self) -> StoreResult<usize> {
        let count: i64 =
            self.conn
                .lock()
                .query_row("SELECT COUNT(*) FROM translation_memory", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(text: &str, target: &str, quality: f32) -> MemoryEntry {
        MemoryEntry {
            source_text: text.to_string(),
            target_text: target.to_string(),
            source_lang: "en".to_string(),
            target_lang: "ru".to_string(),
            domain: "dialogue".to_string(),
            quality_score: quality,
            usage_count: 1,
            last_used: 0,
            created_at: 0,
        }
    }

    #[test]
    fn store_then_lookup_exact_match() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::open(&dir.path().join("memory.db"), 100).unwrap();

        store.store(&entry("Hello", "Привет", 0.9)).unwrap();

        let hit = store
            .lookup("Hello", "en", "ru", Domain::Dialogue)
            .unwrap()
            .unwrap();
        assert_eq!(hit.target_text, "Привет");

        // Domain participates in the key
        assert!(store
            .lookup("Hello", "en", "ru", Domain::SoundEffect)
            .unwrap()
            .is_none());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::open(&dir.path().join("memory.db"), 3).unwrap();

        for i in 0..3 {
            store.store(&entry(&format!("text-{i}"), &format!("tr-{i}"), 0.9)).unwrap();
        }
        // Touch text-0 so text-1 becomes the eviction candidate
        store.lookup("text-0", "en", "ru", Domain::Dialogue).unwrap();
        // Make last_used strictly ordered even within the same second
        store
            .conn
            .lock()
            .execute(
                "UPDATE translation_memory SET last_used = last_used - 100
                 WHERE source_text = 'text-1'",
                [],
            )
            .unwrap();

        store.store(&entry("text-3", "tr-3", 0.9)).unwrap();

        assert_eq!(store.len().unwrap(), 3);
        assert!(store.lookup("text-1", "en", "ru", Domain::Dialogue).unwrap().is_none());
        assert!(store.lookup("text-3", "en", "ru", Domain::Dialogue).unwrap().is_some());
    }

    #[test]
    fn warm_load_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memory.db");

        {
            let store = MemoryStore::open(&path, 100).unwrap();
            store.store(&entry("Hello", "Привет", 0.95)).unwrap();
        }

        let store = MemoryStore::open(&path, 100).unwrap();

        // The hot layer was warm-loaded at open
        let key = MemoryStore::key("Hello", "en", "ru", Domain::Dialogue);
        assert!(store.hot.lock().contains(&key));

        let hit = store
            .lookup("Hello", "en", "ru", Domain::Dialogue)
            .unwrap()
            .unwrap();
        assert_eq!(hit.target_text, "Привет");
    }
}
