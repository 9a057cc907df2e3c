//! Upload storage for student-attached problem images.
//!
//! Originals are kept on disk as uploaded; the downscaled/re-encoded variant
//! exists only for the model call.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use chrono::Local;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Longest edge handed to the model; larger images are downscaled first.
const MODEL_MAX_EDGE: u32 = 1024;

/// Result of storing an upload.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub file_name: String,
    /// Path relative to the working directory, as persisted on messages.
    pub relative_path: String,
}

/// Image payload prepared for the generative model.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: &'static str,
    /// Base64 (standard alphabet) of the re-encoded JPEG bytes.
    pub data: String,
}

pub struct MediaStore {
    dir: PathBuf,
    public_base: String,
}

impl MediaStore {
    /// Create the managed upload directory if needed.
    pub fn new(dir: impl Into<PathBuf>, public_base: impl Into<String>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(MediaStore {
            dir,
            public_base: public_base.into(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the payload under a timestamped, uniquified name derived from
    /// the original file name. Storage keeps the bytes untouched.
    pub fn store(&self, bytes: &[u8], original_name: &str) -> std::io::Result<StoredImage> {
        let safe_name = sanitize_file_name(original_name);
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let unique = Uuid::new_v4().simple().to_string();
        let file_name = format!("{}_{}_{}", stamp, &unique[..8], safe_name);

        let path = self.dir.join(&file_name);
        std::fs::write(&path, bytes)?;
        tracing::info!("✅ Stored upload: {}", path.display());

        let relative_path = format!(
            "{}/{}",
            self.dir.file_name().and_then(|n| n.to_str()).unwrap_or("uploads"),
            file_name
        );
        Ok(StoredImage {
            file_name,
            relative_path,
        })
    }

    /// Best-effort removal of a stored file.
    pub fn delete(&self, file_name: &str) {
        let path = self.dir.join(file_name);
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::warn!("⚠️ Failed to remove upload {}: {}", path.display(), e);
        }
    }

    /// Decode a stored image and prepare it for the model: downscale when
    /// either edge exceeds 1024 px (aspect ratio preserved), convert to RGB,
    /// re-encode as JPEG, base64. Returns `None` when the file cannot be
    /// decoded so the message flow can proceed text-only.
    pub fn prepare_for_model(&self, file_name: &str) -> Option<InlineImage> {
        let path = self.dir.join(file_name);
        let img = match image::open(&path) {
            Ok(img) => img,
            Err(e) => {
                tracing::warn!("⚠️ Could not decode upload {}: {}", path.display(), e);
                return None;
            }
        };

        let img = if img.width() > MODEL_MAX_EDGE || img.height() > MODEL_MAX_EDGE {
            img.thumbnail(MODEL_MAX_EDGE, MODEL_MAX_EDGE)
        } else {
            img
        };

        let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());
        let mut buf = Vec::new();
        if let Err(e) = rgb.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg) {
            tracing::warn!("⚠️ Could not re-encode upload {}: {}", path.display(), e);
            return None;
        }

        Some(InlineImage {
            mime_type: "image/jpeg",
            data: BASE64_STANDARD.encode(&buf),
        })
    }

    /// Absolute URL a client can fetch the stored file from.
    pub fn public_url(&self, file_name: &str) -> String {
        format!("{}/uploads/{}", self.public_base.trim_end_matches('/'), file_name)
    }

    /// Server-relative URL for the stored file.
    pub fn relative_url(file_name: &str) -> String {
        format!("/uploads/{file_name}")
    }
}

/// Strip any path components and characters that don't belong in a stored
/// file name.
fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('_').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Extract the bare file name from a stored relative path.
pub fn file_name_of(stored_path: &str) -> &str {
    stored_path.rsplit('/').next().unwrap_or(stored_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> MediaStore {
        let dir = std::env::temp_dir().join(format!("aissam-media-{}", Uuid::new_v4().simple()));
        MediaStore::new(dir, "http://localhost:8000").unwrap()
    }

    #[test]
    fn store_keeps_original_bytes() {
        let store = temp_store();
        let stored = store.store(b"not really a png", "problem.png").unwrap();
        let on_disk = std::fs::read(store.dir().join(&stored.file_name)).unwrap();
        assert_eq!(on_disk, b"not really a png");
        assert!(stored.file_name.ends_with("problem.png"));
        assert!(stored.relative_path.ends_with(&stored.file_name));
    }

    #[test]
    fn sanitize_strips_paths_and_odd_characters() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("수학 문제.png"), "_____.png");
        assert_eq!(sanitize_file_name("a b?.png"), "a_b_.png");
        assert_eq!(sanitize_file_name("///"), "upload");
    }

    #[test]
    fn oversized_image_is_downscaled_for_model_only() {
        let store = temp_store();

        // 2048x512 solid image, stored as PNG.
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            2048,
            512,
            image::Rgb([200, 10, 10]),
        ));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let stored = store.store(&bytes, "wide.png").unwrap();

        // Storage keeps the original.
        let original = image::open(store.dir().join(&stored.file_name)).unwrap();
        assert_eq!((original.width(), original.height()), (2048, 512));

        // The model-side variant fits in 1024 with aspect preserved.
        let inline = store.prepare_for_model(&stored.file_name).unwrap();
        assert_eq!(inline.mime_type, "image/jpeg");
        let decoded = BASE64_STANDARD.decode(&inline.data).unwrap();
        let resized = image::load_from_memory(&decoded).unwrap();
        assert_eq!((resized.width(), resized.height()), (1024, 256));
    }

    #[test]
    fn small_image_is_not_resized() {
        let store = temp_store();
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            100,
            80,
            image::Rgb([0, 0, 0]),
        ));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let stored = store.store(&bytes, "small.png").unwrap();
        let inline = store.prepare_for_model(&stored.file_name).unwrap();
        let decoded = BASE64_STANDARD.decode(&inline.data).unwrap();
        let reloaded = image::load_from_memory(&decoded).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (100, 80));
    }

    #[test]
    fn delete_is_best_effort() {
        let store = temp_store();
        let stored = store.store(b"bytes", "gone.png").unwrap();
        store.delete(&stored.file_name);
        assert!(!store.dir().join(&stored.file_name).exists());
        // Deleting again only logs.
        store.delete(&stored.file_name);
    }

    #[test]
    fn undecodable_file_yields_none() {
        let store = temp_store();
        let stored = store.store(b"plain text, not an image", "fake.jpg").unwrap();
        assert!(store.prepare_for_model(&stored.file_name).is_none());
    }

    #[test]
    fn urls_point_at_uploads() {
        let store = temp_store();
        assert_eq!(
            store.public_url("a.png"),
            "http://localhost:8000/uploads/a.png"
        );
        assert_eq!(MediaStore::relative_url("a.png"), "/uploads/a.png");
        assert_eq!(file_name_of("uploads/a.png"), "a.png");
    }
}
