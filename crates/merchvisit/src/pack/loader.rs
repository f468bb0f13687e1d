//! Pack import: parse, validate, persist.
//!
//! A pack is accepted wholesale or rejected wholesale. On success it fully
//! replaces any previously stored pack; on rejection the first validation
//! error is surfaced and the full list is logged.

use std::path::Path;

use crate::error::PackError;
use crate::pack::{validator::validate_pack, JobPack};
use crate::store::{Store, PACK};

/// Key of the singleton current pack in the `pack` collection.
pub const CURRENT_PACK_KEY: &str = "current";

pub fn import_pack_from_file<P: AsRef<Path>>(
    store: &Store,
    path: P,
) -> Result<JobPack, PackError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| PackError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    import_pack_from_str(store, &content)
}

pub fn import_pack_from_str(store: &Store, content: &str) -> Result<JobPack, PackError> {
    let doc: serde_json::Value = serde_json::from_str(content)?;

    let errors = validate_pack(&doc);
    if !errors.is_empty() {
        for error in &errors {
            log::warn!("Pack validation: {}", error);
        }
        return Err(PackError::Invalid {
            first: errors[0].clone(),
            all: errors,
        });
    }

    let pack: JobPack = serde_json::from_value(doc)?;

    store.set_doc(PACK, CURRENT_PACK_KEY, &pack)?;
    log::info!(
        "Imported pack '{}' ({} stores, {} templates, {} visits)",
        pack.pack_id,
        pack.stores.len(),
        pack.templates.len(),
        pack.visits.len()
    );

    Ok(pack)
}

/// Loads the currently stored pack, if any.
pub fn load_current_pack(store: &Store) -> Result<Option<JobPack>, PackError> {
    Ok(store.get_doc(PACK, CURRENT_PACK_KEY)?)
}
