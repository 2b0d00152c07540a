//! Persisted disassembly cache.
//!
//! Re-entering the instruction view should not re-run the external
//! disassembler, so parsed images are cached in a small SQLite database
//! keyed by binary path. The stored hash lets callers detect a rebuilt
//! binary; an explicit reload invalidates the entry.

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::model::BinaryImage;

/// Minimum schema version we know how to handle.
///
/// `0` means "no schema yet" (fresh DB).
const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 0;

/// Latest schema version this crate knows about.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Error type for cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Underlying SQLite error.
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// The cached image payload could not be (de)serialized.
    #[error("Cache payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// The database was created with a newer schema version than we
    /// support. Explicit so callers surface a clear message instead of
    /// clobbering or misreading data.
    #[error(
        "Unsupported cache schema version {found}; supported range is {min_supported}..={max_supported}"
    )]
    UnsupportedSchemaVersion { found: i32, min_supported: i32, max_supported: i32 },
}

/// Convenience result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// One cached disassembly entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedImage {
    /// Hash of the binary file the image was parsed from, if recorded.
    pub hash: Option<String>,
    /// RFC 3339 timestamp of when the entry was stored.
    pub cached_at: String,
    pub image: BinaryImage,
}

/// SQLite-backed disassembly cache keyed by binary path.
#[derive(Debug)]
pub struct DisasmCache {
    conn: Connection,
}

impl DisasmCache {
    /// Open (or create) the cache database at `path` and ensure the
    /// schema exists.
    pub fn open(path: &Path) -> CacheResult<Self> {
        let conn = Connection::open(path)?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory cache, handy for tests.
    pub fn open_in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Store (or replace) the cached image for `binary_path`.
    pub fn store(
        &self,
        binary_path: &Path,
        hash: Option<&str>,
        image: &BinaryImage,
    ) -> CacheResult<()> {
        let payload = serde_json::to_string(image)?;
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO disasm_cache (path, hash, cached_at, image_json)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![path_key(binary_path), hash, Utc::now().to_rfc3339(), payload],
        )?;
        Ok(())
    }

    /// Load the cached image for `binary_path`, if present.
    pub fn load(&self, binary_path: &Path) -> CacheResult<Option<CachedImage>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT hash, cached_at, image_json
                FROM disasm_cache
                WHERE path = ?1
                "#,
                params![path_key(binary_path)],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((hash, cached_at, payload)) => {
                let image = serde_json::from_str(&payload)?;
                Ok(Some(CachedImage { hash, cached_at, image }))
            }
            None => Ok(None),
        }
    }

    /// Drop the entry for `binary_path` (explicit reload). Returns true
    /// if an entry existed.
    pub fn invalidate(&self, binary_path: &Path) -> CacheResult<bool> {
        let affected = self.conn.execute(
            "DELETE FROM disasm_cache WHERE path = ?1",
            params![path_key(binary_path)],
        )?;
        Ok(affected > 0)
    }

    /// Drop every cached entry.
    pub fn clear(&self) -> CacheResult<usize> {
        Ok(self.conn.execute("DELETE FROM disasm_cache", [])?)
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Apply schema migrations using `PRAGMA user_version` as the indicator.
///
/// Version map:
/// - 0: no schema
/// - 1: disasm_cache table
fn apply_migrations(conn: &Connection) -> CacheResult<()> {
    let current_version = current_schema_version(conn)?;

    if current_version > CURRENT_SCHEMA_VERSION {
        return Err(CacheError::UnsupportedSchemaVersion {
            found: current_version,
            min_supported: MIN_SUPPORTED_SCHEMA_VERSION,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if current_version == 0 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS disasm_cache (
                path       TEXT PRIMARY KEY,
                hash       TEXT,
                cached_at  TEXT NOT NULL,
                image_json TEXT NOT NULL
            );
            PRAGMA user_version = 1;
            COMMIT;
            "#,
        )?;
    }

    Ok(())
}

/// Read the SQLite schema version from `PRAGMA user_version`.
fn current_schema_version(conn: &Connection) -> CacheResult<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version)
}
