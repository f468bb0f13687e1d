//! Day export: packages every terminal draft for a given date into a single
//! ZIP archive with a `manifest.json` and the referenced photo blobs under
//! `photos/`. The archive is built fully in memory and written with one
//! filesystem call, so a failed export never leaves a partial file behind.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::draft::{AnswerValue, Draft, DraftStatus, FurnitureObservation};
use crate::error::ExportError;
use crate::pack::JobPack;
use crate::store::{photos, Store, DRAFTS};

pub const RESULTS_SCHEMA: &str = "merch.results";
pub const RESULTS_SCHEMA_VERSION: u64 = 1;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema: String,
    pub schema_version: u64,
    pub export_id: String,
    pub device_id: String,
    pub merch_id: String,
    pub export_date: String,
    pub created_at: String,
    pub source_pack: SourcePack,
    pub visits: Vec<VisitResult>,
    pub photos: Vec<PhotoEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcePack {
    pub pack_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// One visit's results. Metadata comes from the draft's denormalized copy,
/// not from the pack, so an export stays truthful even after a pack swap.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitResult {
    pub visit_id: String,
    pub sap_id: String,
    pub store_name: String,
    pub retailer_id: String,
    pub template_id: String,
    pub template_version: u64,
    pub date: String,
    pub status: DraftStatus,
    pub started_at: String,
    pub submitted_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    pub answers: BTreeMap<String, AnswerValue>,
    pub furniture_observations: Vec<FurnitureObservation>,
}

impl From<Draft> for VisitResult {
    fn from(draft: Draft) -> Self {
        Self {
            visit_id: draft.visit_id,
            sap_id: draft.sap_id,
            store_name: draft.store_name,
            retailer_id: draft.retailer_id,
            template_id: draft.template_id,
            template_version: draft.template_version,
            date: draft.date,
            status: draft.status,
            started_at: draft.started_at,
            submitted_at: draft.submitted_at,
            cancel_reason: draft.cancel_reason,
            answers: draft.answers,
            furniture_observations: draft.furniture_observations,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoEntry {
    pub photo_id: String,
    pub file_name: String,
    pub mime: String,
    pub taken_at: String,
}

#[derive(Debug)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub visit_count: usize,
    pub photo_count: usize,
}

pub struct ExportPackager {
    store: Store,
}

impl ExportPackager {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Exports all terminal drafts dated `date` into
    /// `{out_dir}/merch_results_{date}_{merch_id}.zip`. Open drafts are left
    /// alone; with no terminal drafts for the date the export refuses rather
    /// than producing an empty archive.
    pub fn export_day(
        &self,
        pack: &JobPack,
        date: &str,
        out_dir: &Path,
    ) -> Result<ExportOutcome, ExportError> {
        let _span = tracing::info_span!("export.day", date).entered();

        let mut drafts = Vec::new();
        for key in self.store.list_keys(DRAFTS)? {
            if let Some(draft) = self.store.get_doc::<Draft>(DRAFTS, &key)? {
                if draft.date == date && draft.is_terminal() {
                    drafts.push(draft);
                }
            }
        }
        if drafts.is_empty() {
            return Err(ExportError::NothingToExport(date.to_string()));
        }

        let device = crate::device::device_identity(&self.store)?;

        // Photos referenced by several visits are packed once.
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut blobs = Vec::new();
        for draft in &drafts {
            for photo_id in draft.referenced_photo_ids() {
                if !seen.insert(photo_id.clone()) {
                    continue;
                }
                match photos::get(&self.store, &photo_id)? {
                    Some(row) => {
                        let file_name =
                            format!("photos/{}.{}", row.photo_id, ext_for_mime(&row.mime));
                        entries.push(PhotoEntry {
                            photo_id: row.photo_id.clone(),
                            file_name: file_name.clone(),
                            mime: row.mime.clone(),
                            taken_at: row.taken_at.clone(),
                        });
                        blobs.push((file_name, row.blob));
                    }
                    None => {
                        log::warn!(
                            "Photo '{}' referenced by visit '{}' is missing from the store",
                            photo_id,
                            draft.visit_id
                        );
                    }
                }
            }
        }

        let manifest = Manifest {
            schema: RESULTS_SCHEMA.to_string(),
            schema_version: RESULTS_SCHEMA_VERSION,
            export_id: Uuid::new_v4().to_string(),
            device_id: device.device_id,
            merch_id: pack.merch.id.clone(),
            export_date: date.to_string(),
            created_at: Utc::now().to_rfc3339(),
            source_pack: SourcePack {
                pack_id: pack.pack_id.clone(),
                checksum: pack.checksum.clone(),
            },
            visits: drafts.into_iter().map(VisitResult::from).collect(),
            photos: entries,
        };

        let archive = build_archive(&manifest, &blobs)?;

        let path = out_dir.join(format!("merch_results_{}_{}.zip", date, pack.merch.id));
        fs::create_dir_all(out_dir).map_err(|source| ExportError::WriteArchive {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, &archive).map_err(|source| ExportError::WriteArchive {
            path: path.clone(),
            source,
        })?;

        log::info!(
            "Exported {} visit(s) and {} photo(s) to '{}'",
            manifest.visits.len(),
            manifest.photos.len(),
            path.display()
        );
        Ok(ExportOutcome {
            path,
            visit_count: manifest.visits.len(),
            photo_count: manifest.photos.len(),
        })
    }
}

fn build_archive(manifest: &Manifest, blobs: &[(String, Vec<u8>)]) -> Result<Vec<u8>, ExportError> {
    let archive_err = |e: zip::result::ZipError| ExportError::Archive(e.to_string());
    let io_err = |e: std::io::Error| ExportError::Archive(e.to_string());

    let manifest_json =
        serde_json::to_vec_pretty(manifest).map_err(|e| ExportError::Archive(e.to_string()))?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    writer.start_file("manifest.json", options).map_err(archive_err)?;
    writer.write_all(&manifest_json).map_err(io_err)?;

    for (name, blob) in blobs {
        writer.start_file(name.as_str(), options).map_err(archive_err)?;
        writer.write_all(blob).map_err(io_err)?;
    }

    Ok(writer.finish().map_err(archive_err)?.into_inner())
}

fn ext_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first())
            .copied()
            .unwrap_or("bin"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ext_for_mime_known_and_fallback() {
        assert_eq!(ext_for_mime("image/jpeg"), "jpg");
        assert_eq!(ext_for_mime("image/png"), "png");
        assert_eq!(ext_for_mime("application/x-does-not-exist"), "bin");
    }

    #[test]
    fn test_archive_lists_manifest_first() {
        let manifest = Manifest {
            schema: RESULTS_SCHEMA.to_string(),
            schema_version: RESULTS_SCHEMA_VERSION,
            export_id: "e1".to_string(),
            device_id: "d1".to_string(),
            merch_id: "m1".to_string(),
            export_date: "2024-01-10".to_string(),
            created_at: "2024-01-10T18:00:00Z".to_string(),
            source_pack: SourcePack {
                pack_id: "p1".to_string(),
                checksum: None,
            },
            visits: vec![],
            photos: vec![],
        };
        let bytes =
            build_archive(&manifest, &[("photos/p1.jpg".to_string(), vec![1, 2, 3])]).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.by_index(0).unwrap().name(), "manifest.json");
        assert_eq!(archive.by_index(1).unwrap().name(), "photos/p1.jpg");
    }
}
