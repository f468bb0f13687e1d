//! Persistent store for packs, drafts, device identity, and photo blobs.
//!
//! Uses rusqlite (SQLite) with a thread-safe `Store` handle. All access is
//! serialized through a `Mutex<Connection>`. JSON documents live in a
//! `kv` table partitioned by collection name; photo blobs live in a
//! dedicated `photos` table (see `photos` submodule).
//!
//! Every write replaces a whole document under a single key in a single
//! collection; no cross-collection transactions exist or are needed.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub mod migrations;
pub mod photos;

use crate::error::StoreError;

/// JSON-document collections held in the `kv` table.
pub const META: &str = "meta";
pub const PACK: &str = "pack";
pub const DRAFTS: &str = "drafts";

/// Thread-safe store handle wrapping a single rusqlite connection.
///
/// Cloning is cheap (inner `Arc`). All access is serialized through
/// a `Mutex`, which is fine for SQLite (which serializes writes anyway).
/// WAL mode is enabled for concurrent read performance.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Opens (or creates) the store at the given path and runs all
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        log::info!("Store opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory store for testing. Runs all migrations.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Provides locked access to the underlying connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }

    /// Reads a JSON document, returning `None` when the key is absent.
    pub fn get_doc<T: DeserializeOwned>(
        &self,
        collection: &'static str,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        let raw: Option<String> = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM kv WHERE collection = ?1 AND key = ?2",
                    rusqlite::params![collection, key],
                    |r| r.get(0),
                )
                .optional()?)
        })?;

        match raw {
            Some(json) => {
                let doc =
                    serde_json::from_str(&json).map_err(|e| StoreError::CorruptDocument {
                        collection,
                        key: key.to_string(),
                        source: e,
                    })?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    /// Writes (upserts) a JSON document, replacing any previous value
    /// under the key atomically.
    pub fn set_doc<T: Serialize>(
        &self,
        collection: &'static str,
        key: &str,
        doc: &T,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(doc).map_err(|e| StoreError::CorruptDocument {
            collection,
            key: key.to_string(),
            source: e,
        })?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv (collection, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (collection, key) DO UPDATE SET value = ?3, updated_at = ?4",
                rusqlite::params![collection, key, json, chrono::Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
    }

    /// Deletes a document. Deleting a missing key is not an error.
    pub fn delete_doc(&self, collection: &'static str, key: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM kv WHERE collection = ?1 AND key = ?2",
                rusqlite::params![collection, key],
            )?;
            Ok(())
        })
    }

    /// Lists all keys in a collection, in key order.
    pub fn list_keys(&self, collection: &'static str) -> Result<Vec<String>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT key FROM kv WHERE collection = ?1 ORDER BY key")?;
            let keys = stmt
                .query_map([collection], |r| r.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(keys)
        })
    }
}

/// Returns the canonical store path: `~/.merchvisit/data/merchvisit.db`.
pub fn default_store_path() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .map(|h| h.join(".merchvisit").join("data").join("merchvisit.db"))
}
