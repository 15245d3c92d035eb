// Persistent stores backing the pipeline.
//
// Every store owns a single SQLite connection behind a mutex: worker
// threads completing concurrently serialize on it when persisting
// results for the same key. Writes are idempotent upserts, so duplicate
// work across concurrent requests is harmless.

pub mod cache;
pub mod feedback;
pub mod memory;
pub mod validation;

use rusqlite::Connection;
use std::path::Path;

use crate::core::errors::{StoreError, StoreResult};

// Re-export commonly used items
pub use cache::CacheStore;
pub use feedback::FeedbackStore;
pub use memory::MemoryStore;
pub use validation::ValidationStore;

/// Open (or create) a SQLite database file, creating parent directories.
pub(crate) fn open_database(path: &Path) -> StoreResult<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(StoreError::DirectoryCreationFailed)?;
        }
    }

    let conn = Connection::open(path).map_err(|e| StoreError::Open {
        path: path.display().to_string(),
        source: e,
    })?;

    // Reasonable local-store pragmas; failures here are non-fatal
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");

    Ok(conn)
}

pub(crate) const SECS_PER_DAY: i64 = 86_400;
