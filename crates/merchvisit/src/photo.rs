//! Photo attachment lifecycle.
//!
//! Incoming files are re-encoded through a `Downscaler` collaborator before
//! storage, then persisted under a freshly generated id. The manager never
//! reverse-indexes references: removing an id from whichever answer or
//! observation listed it is the caller's job (the draft repository owns
//! cascading deletes at its boundary).

use image::imageops::FilterType;
use image::GenericImageView;

use crate::error::PhotoError;
use crate::store::photos::{self, PhotoRow};
use crate::store::Store;

/// Longest-side cap applied before re-encoding.
pub const MAX_LONG_EDGE: u32 = 1600;
/// Fixed JPEG encode quality.
pub const JPEG_QUALITY: u8 = 80;
/// Fixed target mime for re-encoded photos.
pub const TARGET_MIME: &str = "image/jpeg";

/// A file handed in by the capture layer.
#[derive(Debug, Clone)]
pub struct PhotoInput {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Result of the downscale collaborator.
#[derive(Debug, Clone)]
pub struct DownscaledImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// External image-downscale collaborator: caps the longest side and
/// re-encodes at fixed quality/mime. Non-image inputs pass through unchanged.
pub trait Downscaler: Send + Sync {
    fn downscale(&self, input: &PhotoInput) -> Result<DownscaledImage, PhotoError>;
}

/// Default implementation backed by the `image` crate.
pub struct JpegDownscaler;

impl Downscaler for JpegDownscaler {
    fn downscale(&self, input: &PhotoInput) -> Result<DownscaledImage, PhotoError> {
        let img = match image::load_from_memory(&input.bytes) {
            Ok(img) => img,
            // Not a decodable image: pass through unchanged.
            Err(_) => {
                return Ok(DownscaledImage {
                    bytes: input.bytes.clone(),
                    mime: if input.mime.is_empty() {
                        "application/octet-stream".to_string()
                    } else {
                        input.mime.clone()
                    },
                })
            }
        };

        let (width, height) = img.dimensions();
        let img = if width.max(height) > MAX_LONG_EDGE {
            img.resize(MAX_LONG_EDGE, MAX_LONG_EDGE, FilterType::Lanczos3)
        } else {
            img
        };

        let rgb = img.to_rgb8();
        let mut out = Vec::new();
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
        encoder
            .encode_image(&rgb)
            .map_err(|e| PhotoError::Transcode {
                name: input.name.clone(),
                reason: e.to_string(),
            })?;

        Ok(DownscaledImage {
            bytes: out,
            mime: TARGET_MIME.to_string(),
        })
    }
}

/// Owns the stored-photo lifecycle.
pub struct PhotoManager {
    store: Store,
    downscaler: Box<dyn Downscaler>,
}

impl PhotoManager {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            downscaler: Box::new(JpegDownscaler),
        }
    }

    pub fn with_downscaler(store: Store, downscaler: Box<dyn Downscaler>) -> Self {
        Self { store, downscaler }
    }

    /// Re-encodes and stores each input, returning the new photo ids in
    /// input order. The caller appends them to the relevant answer or
    /// observation list.
    pub fn add_photos(
        &self,
        files: &[PhotoInput],
        visit_id: &str,
    ) -> Result<Vec<String>, PhotoError> {
        let _span = tracing::info_span!("photo.add", visit_id, count = files.len()).entered();

        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            let encoded = self.downscaler.downscale(file)?;
            let photo_id = uuid::Uuid::new_v4().to_string();

            let row = PhotoRow {
                photo_id: photo_id.clone(),
                mime: encoded.mime,
                taken_at: chrono::Utc::now().to_rfc3339(),
                visit_id: visit_id.to_string(),
                original_name: Some(file.name.clone()),
                original_size: file.bytes.len() as u64,
                stored_size: encoded.bytes.len() as u64,
                blob: encoded.bytes,
            };
            photos::insert(&self.store, &row)?;

            tracing::debug!(
                photo_id = %photo_id,
                original = row.original_size,
                stored = row.stored_size,
                "stored photo"
            );
            ids.push(photo_id);
        }

        Ok(ids)
    }

    pub fn get_photo(&self, photo_id: &str) -> Result<Option<PhotoRow>, PhotoError> {
        Ok(photos::get(&self.store, photo_id)?)
    }

    /// Deletes the stored blob. The caller must also drop the id from the
    /// list that referenced it.
    pub fn remove_photo(&self, photo_id: &str) -> Result<(), PhotoError> {
        photos::delete(&self.store, photo_id)?;
        Ok(())
    }

    /// Bulk cleanup over the weak visit back-reference; used when a whole
    /// draft is deleted.
    pub fn remove_all_for_visit(&self, visit_id: &str) -> Result<usize, PhotoError> {
        let removed = photos::delete_for_visit(&self.store, visit_id)?;
        if removed > 0 {
            log::info!("Removed {} photos for visit '{}'", removed, visit_id);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A downscaler stub that marks inputs as processed without invoking
    /// the image codec.
    struct PassthroughDownscaler;

    impl Downscaler for PassthroughDownscaler {
        fn downscale(&self, input: &PhotoInput) -> Result<DownscaledImage, PhotoError> {
            Ok(DownscaledImage {
                bytes: input.bytes.clone(),
                mime: TARGET_MIME.to_string(),
            })
        }
    }

    fn input(name: &str) -> PhotoInput {
        PhotoInput {
            name: name.to_string(),
            mime: "image/jpeg".to_string(),
            bytes: vec![1, 2, 3, 4],
        }
    }

    fn manager() -> PhotoManager {
        let store = Store::open_in_memory().unwrap();
        PhotoManager::with_downscaler(store, Box::new(PassthroughDownscaler))
    }

    #[test]
    fn test_add_photos_returns_ordered_fresh_ids() {
        let mgr = manager();
        let ids = mgr
            .add_photos(&[input("a.jpg"), input("b.jpg")], "v1")
            .unwrap();

        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);

        let first = mgr.get_photo(&ids[0]).unwrap().unwrap();
        assert_eq!(first.original_name.as_deref(), Some("a.jpg"));
        assert_eq!(first.visit_id, "v1");
        assert_eq!(first.mime, TARGET_MIME);
    }

    #[test]
    fn test_remove_photo_deletes_blob() {
        let mgr = manager();
        let ids = mgr.add_photos(&[input("a.jpg")], "v1").unwrap();

        mgr.remove_photo(&ids[0]).unwrap();
        assert!(mgr.get_photo(&ids[0]).unwrap().is_none());
    }

    #[test]
    fn test_remove_all_for_visit() {
        let mgr = manager();
        mgr.add_photos(&[input("a.jpg"), input("b.jpg")], "v1")
            .unwrap();
        let keep = mgr.add_photos(&[input("c.jpg")], "v2").unwrap();

        assert_eq!(mgr.remove_all_for_visit("v1").unwrap(), 2);
        assert!(mgr.get_photo(&keep[0]).unwrap().is_some());
    }

    #[test]
    fn test_non_image_bytes_pass_through_unchanged() {
        let downscaler = JpegDownscaler;
        let file = PhotoInput {
            name: "notes.txt".to_string(),
            mime: "text/plain".to_string(),
            bytes: b"not an image".to_vec(),
        };

        let out = downscaler.downscale(&file).unwrap();
        assert_eq!(out.bytes, file.bytes);
        assert_eq!(out.mime, "text/plain");
    }

    #[test]
    fn test_real_image_is_reencoded_as_jpeg() {
        // 1x1 PNG.
        let img = image::RgbImage::from_pixel(1, 1, image::Rgb([10, 20, 30]));
        let mut png = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut png),
            image::ImageFormat::Png,
        )
        .unwrap();

        let out = JpegDownscaler
            .downscale(&PhotoInput {
                name: "pixel.png".to_string(),
                mime: "image/png".to_string(),
                bytes: png,
            })
            .unwrap();

        assert_eq!(out.mime, TARGET_MIME);
        // JPEG magic bytes.
        assert_eq!(&out.bytes[..2], &[0xff, 0xd8]);
    }
}
