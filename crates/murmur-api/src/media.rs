use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;

/// 10 MB decoded limit per image
const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Accepted `image/<subtype>` values and the extension stored on disk.
const IMAGE_TYPES: &[(&str, &str)] = &[
    ("png", "png"),
    ("jpeg", "jpg"),
    ("jpg", "jpg"),
    ("gif", "gif"),
    ("webp", "webp"),
];

const EXTENSIONS: &[&str] = &["png", "jpg", "gif", "webp"];

/// Hosts uploaded images as flat files at `{dir}/{public_id}.{ext}` and hands
/// out URLs under `{public_url}/media/`.
pub struct ImageStore {
    dir: PathBuf,
    public_url: String,
}

impl ImageStore {
    pub async fn new(dir: PathBuf, public_url: impl Into<String>) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Image storage directory: {}", dir.display());
        Ok(Self {
            dir,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store a `data:image/<type>;base64,<payload>` URL and return its public URL.
    pub async fn upload(&self, data_url: &str) -> Result<String, ApiError> {
        let image = DecodedImage::from_data_url(data_url)?;
        self.store(image).await
    }

    /// Write an already-decoded image and return its public URL.
    pub async fn store(&self, image: DecodedImage) -> Result<String, ApiError> {
        let file_name = format!("{}.{}", Uuid::new_v4().simple(), image.ext);
        let path = self.dir.join(&file_name);
        fs::write(&path, &image.bytes)
            .await
            .map_err(|e| anyhow::anyhow!("failed to write image {}: {}", path.display(), e))?;

        info!("Stored image {} ({} bytes)", file_name, image.bytes.len());
        Ok(format!("{}/media/{}", self.public_url, file_name))
    }

    /// Delete the image with this public id. An already-missing file is fine.
    pub async fn destroy(&self, public_id: &str) -> Result<()> {
        // Reject anything that could escape the media directory
        if public_id.is_empty() || !public_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            bail!("refusing to destroy image with id '{}'", public_id);
        }

        for ext in EXTENSIONS {
            let path = self.dir.join(format!("{}.{}", public_id, ext));
            match fs::remove_file(&path).await {
                Ok(()) => {
                    info!("Destroyed image {}", public_id);
                    return Ok(());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }

        warn!("Image {} already gone", public_id);
        Ok(())
    }

    /// Best-effort removal of the image behind a stored URL. Failures are
    /// logged and swallowed.
    pub async fn discard(&self, url: &str) {
        let Some(public_id) = public_id_from_url(url) else {
            warn!("Cannot derive image id from '{}'", url);
            return;
        };
        if let Err(e) = self.destroy(public_id).await {
            warn!("Failed to destroy image {}: {:#}", public_id, e);
        }
    }
}

/// An upload that passed format and size checks but is not on disk yet.
#[derive(Debug)]
pub struct DecodedImage {
    ext: &'static str,
    bytes: Vec<u8>,
}

impl DecodedImage {
    pub fn from_data_url(data_url: &str) -> Result<Self, ApiError> {
        let (ext, bytes) = decode_data_url(data_url).ok_or(ApiError::InvalidImage)?;
        if bytes.len() > MAX_IMAGE_SIZE {
            return Err(ApiError::InvalidImage);
        }
        Ok(Self { ext, bytes })
    }
}

/// Last path segment up to the first dot: `.../media/abc.png` -> `abc`.
pub fn public_id_from_url(url: &str) -> Option<&str> {
    let last = url.rsplit('/').next()?;
    let id = last.split('.').next()?;
    (!id.is_empty()).then_some(id)
}

fn decode_data_url(data_url: &str) -> Option<(&'static str, Vec<u8>)> {
    let rest = data_url.strip_prefix("data:image/")?;
    let (subtype, payload) = rest.split_once(";base64,")?;
    let ext = IMAGE_TYPES
        .iter()
        .find(|(t, _)| t.eq_ignore_ascii_case(subtype))
        .map(|(_, ext)| *ext)?;
    let bytes = B64.decode(payload.trim()).ok()?;
    (!bytes.is_empty()).then_some((ext, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXEL: &str = "data:image/png;base64,iVBORw0KGgo=";

    #[test]
    fn public_id_from_urls() {
        assert_eq!(public_id_from_url("http://localhost:5000/media/abc123.png"), Some("abc123"));
        assert_eq!(public_id_from_url("https://cdn.example.com/a/b/c/jkl.jpg"), Some("jkl"));
        assert_eq!(public_id_from_url("noext"), Some("noext"));
        assert_eq!(public_id_from_url("http://host/media/"), None);
    }

    #[test]
    fn data_url_decoding() {
        let (ext, bytes) = decode_data_url(PIXEL).unwrap();
        assert_eq!(ext, "png");
        assert_eq!(&bytes[1..4], b"PNG");

        assert_eq!(decode_data_url("data:image/jpeg;base64,AAAA").unwrap().0, "jpg");
        assert!(decode_data_url("data:image/svg+xml;base64,AAAA").is_none());
        assert!(decode_data_url("data:text/plain;base64,AAAA").is_none());
        assert!(decode_data_url("data:image/png;base64,***").is_none());
        assert!(decode_data_url("https://example.com/cat.png").is_none());
    }

    #[tokio::test]
    async fn upload_then_destroy() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().to_path_buf(), "http://localhost:5000/")
            .await
            .unwrap();

        let url = store.upload(PIXEL).await.unwrap();
        assert!(url.starts_with("http://localhost:5000/media/"));
        assert!(url.ends_with(".png"));

        let id = public_id_from_url(&url).unwrap();
        assert!(dir.path().join(format!("{}.png", id)).exists());

        store.destroy(id).await.unwrap();
        assert!(!dir.path().join(format!("{}.png", id)).exists());

        // Second destroy is a no-op
        store.destroy(id).await.unwrap();
    }

    #[tokio::test]
    async fn destroy_refuses_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().to_path_buf(), "http://localhost").await.unwrap();
        assert!(store.destroy("../secrets").await.is_err());
        assert!(store.destroy("").await.is_err());
    }

    #[test]
    fn oversized_payload_is_rejected_before_writing() {
        let payload = B64.encode(vec![0u8; MAX_IMAGE_SIZE + 1]);
        let result = DecodedImage::from_data_url(&format!("data:image/png;base64,{}", payload));
        assert!(matches!(result, Err(ApiError::InvalidImage)));
    }

    #[tokio::test]
    async fn upload_rejects_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().to_path_buf(), "http://localhost").await.unwrap();
        let result = store.upload("not a data url").await;
        assert!(matches!(result, Err(ApiError::InvalidImage)));
    }
}
