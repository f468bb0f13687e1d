//! Photo blob repository — CRUD operations for the `photos` table.
//!
//! The `visit_id` column is a weak back-reference used only for bulk
//! cleanup; ownership always runs from a draft's photo-id lists to this
//! table, never the reverse.

use rusqlite::{params, OptionalExtension, Row};

use super::Store;
use crate::error::StoreError;

/// A stored photo: the re-encoded blob plus capture metadata.
#[derive(Debug, Clone)]
pub struct PhotoRow {
    pub photo_id: String,
    pub blob: Vec<u8>,
    pub mime: String,
    pub taken_at: String,
    pub visit_id: String,
    pub original_name: Option<String>,
    pub original_size: u64,
    pub stored_size: u64,
}

impl PhotoRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            photo_id: row.get("photo_id")?,
            blob: row.get("blob")?,
            mime: row.get("mime")?,
            taken_at: row.get("taken_at")?,
            visit_id: row.get("visit_id")?,
            original_name: row.get("original_name")?,
            original_size: row.get::<_, i64>("original_size")? as u64,
            stored_size: row.get::<_, i64>("stored_size")? as u64,
        })
    }
}

/// Inserts a new photo row.
pub fn insert(store: &Store, photo: &PhotoRow) -> Result<(), StoreError> {
    store.with_conn(|conn| {
        conn.execute(
            "INSERT INTO photos (photo_id, blob, mime, taken_at, visit_id, original_name,
             original_size, stored_size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                photo.photo_id,
                photo.blob,
                photo.mime,
                photo.taken_at,
                photo.visit_id,
                photo.original_name,
                photo.original_size as i64,
                photo.stored_size as i64,
            ],
        )?;
        Ok(())
    })
}

/// Fetches a photo by id.
pub fn get(store: &Store, photo_id: &str) -> Result<Option<PhotoRow>, StoreError> {
    store.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT photo_id, blob, mime, taken_at, visit_id, original_name,
                 original_size, stored_size FROM photos WHERE photo_id = ?1",
                [photo_id],
                PhotoRow::from_row,
            )
            .optional()?)
    })
}

/// Deletes a photo by id. Deleting a missing id is not an error.
pub fn delete(store: &Store, photo_id: &str) -> Result<(), StoreError> {
    store.with_conn(|conn| {
        conn.execute("DELETE FROM photos WHERE photo_id = ?1", [photo_id])?;
        Ok(())
    })
}

/// Deletes every photo captured for a visit. Returns the number removed.
pub fn delete_for_visit(store: &Store, visit_id: &str) -> Result<usize, StoreError> {
    store.with_conn(|conn| {
        let n = conn.execute("DELETE FROM photos WHERE visit_id = ?1", [visit_id])?;
        Ok(n)
    })
}

/// Lists all stored photo ids, in id order.
pub fn list_ids(store: &Store) -> Result<Vec<String>, StoreError> {
    store.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT photo_id FROM photos ORDER BY photo_id")?;
        let ids = stmt
            .query_map([], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    })
}
