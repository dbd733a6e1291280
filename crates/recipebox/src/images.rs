//! Content-addressed storage for recipe photos and avatars.
//!
//! Images are stored as `<blake3-hex>.<ext>` under a single root directory,
//! so uploading the same photo twice keeps one file. The key returned by
//! [`ImageStore::store`] is what recipes and profiles reference.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{Config, ImageConfig};
use crate::error::{Error, Result};

/// Length of a hex-encoded BLAKE3 digest.
const HASH_HEX_LEN: usize = 64;

/// File-system backed image store.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    max_bytes: u64,
    allowed_extensions: Vec<String>,
}

impl ImageStore {
    /// Open (and create if needed) an image store at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl AsRef<Path>, config: &ImageConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.exists() {
            fs::create_dir_all(&root).map_err(|source| Error::DirectoryCreate {
                path: root.clone(),
                source,
            })?;
        }

        Ok(Self {
            root,
            max_bytes: config.max_bytes,
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
        })
    }

    /// Open the image store configured in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::open(config.images_dir(), &config.images)
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy the image at `source` into the store and return its key.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, has a disallowed
    /// extension, is too large, or its contents do not match its extension.
    pub fn store(&self, source: &Path) -> Result<String> {
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| {
                Error::image(format!("{} has no file extension", source.display()))
            })?;
        self.check_extension(&extension)?;

        let size = fs::metadata(source)?.len();
        self.check_size(size)?;

        let bytes = fs::read(source)?;
        self.store_bytes(&bytes, &extension)
    }

    /// Store raw image bytes under the given extension and return the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is not allowed, the data is empty
    /// or too large, or the contents do not match the extension.
    pub fn store_bytes(&self, bytes: &[u8], extension: &str) -> Result<String> {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        self.check_extension(&extension)?;
        if bytes.is_empty() {
            return Err(Error::image("image is empty"));
        }
        self.check_size(bytes.len() as u64)?;

        if let Some(detected) = sniff_format(bytes) {
            if !format_matches(detected, &extension) {
                return Err(Error::image(format!(
                    "contents look like {detected} but the extension is .{extension}"
                )));
            }
        }

        let key = format!("{}.{extension}", blake3::hash(bytes).to_hex());
        let target = self.root.join(&key);

        if target.exists() {
            debug!("Image {} already stored", key);
            return Ok(key);
        }

        // Write to a temporary name first so a crash never leaves a
        // truncated file under a valid key.
        let partial = self.root.join(format!("{key}.partial"));
        fs::write(&partial, bytes)?;
        fs::rename(&partial, &target)?;

        info!("Stored image {} ({} bytes)", key, bytes.len());
        Ok(key)
    }

    /// Absolute path of the image with the given key.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is not a well-formed image key.
    pub fn path_of(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    /// Whether an image with this key is stored.
    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        self.path_of(key).is_ok_and(|p| p.is_file())
    }

    /// Delete the image with the given key.
    ///
    /// Returns `true` if a file was removed, `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is malformed or the file cannot be removed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let path = self.path_of(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed image {}", key);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn check_extension(&self, extension: &str) -> Result<()> {
        if self.allowed_extensions.iter().any(|e| e == extension) {
            Ok(())
        } else {
            Err(Error::image(format!(
                "unsupported extension '.{extension}' (allowed: {})",
                self.allowed_extensions.join(", ")
            )))
        }
    }

    fn check_size(&self, size: u64) -> Result<()> {
        if size > self.max_bytes {
            return Err(Error::image(format!(
                "image is {size} bytes, the limit is {} bytes",
                self.max_bytes
            )));
        }
        Ok(())
    }
}

/// Check that `key` is `<64 lower-case hex chars>.<alphanumeric ext>`.
///
/// This keeps keys from naming anything outside the store root.
fn validate_key(key: &str) -> Result<()> {
    let valid = key.split_once('.').is_some_and(|(hash, ext)| {
        hash.len() == HASH_HEX_LEN
            && hash
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
            && !ext.is_empty()
            && ext.chars().all(|c| c.is_ascii_alphanumeric())
    });

    if valid {
        Ok(())
    } else {
        Err(Error::image(format!("malformed image key: {key:?}")))
    }
}

/// Identify common image formats by their magic bytes.
fn sniff_format(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else {
        None
    }
}

fn format_matches(detected: &str, extension: &str) -> bool {
    match detected {
        "jpeg" => extension == "jpg" || extension == "jpeg",
        other => other == extension,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n-fake-png-body";
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 4];

    fn create_test_store() -> (tempfile::TempDir, ImageStore) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let store = ImageStore::open(dir.path().join("images"), &ImageConfig::default())
            .expect("failed to open image store");
        (dir, store)
    }

    #[test]
    fn test_open_creates_root() {
        let (_dir, store) = create_test_store();
        assert!(store.root().is_dir());
    }

    #[test]
    fn test_store_bytes_returns_content_key() {
        let (_dir, store) = create_test_store();
        let key = store.store_bytes(PNG, "png").unwrap();

        assert!(key.ends_with(".png"));
        assert_eq!(key.len(), HASH_HEX_LEN + 4);
        assert!(store.exists(&key));
        assert_eq!(fs::read(store.path_of(&key).unwrap()).unwrap(), PNG);
    }

    #[test]
    fn test_store_is_deduplicated() {
        let (_dir, store) = create_test_store();
        let a = store.store_bytes(PNG, "png").unwrap();
        let b = store.store_bytes(PNG, ".PNG").unwrap();

        assert_eq!(a, b);
        let files = fs::read_dir(store.root()).unwrap().count();
        assert_eq!(files, 1);
    }

    #[test]
    fn test_store_from_path() {
        let (dir, store) = create_test_store();
        let source = dir.path().join("photo.JPG");
        fs::write(&source, JPEG).unwrap();

        let key = store.store(&source).unwrap();
        assert!(key.ends_with(".jpg"));
        assert!(store.exists(&key));
    }

    #[test]
    fn test_store_rejects_extension() {
        let (dir, store) = create_test_store();
        let err = store.store_bytes(PNG, "bmp").unwrap_err();
        assert!(err.to_string().contains("unsupported extension"));

        let source = dir.path().join("noext");
        fs::write(&source, PNG).unwrap();
        assert!(store.store(&source).is_err());
    }

    #[test]
    fn test_store_rejects_oversized() {
        let dir = tempfile::tempdir().unwrap();
        let config = ImageConfig {
            max_bytes: 4,
            ..ImageConfig::default()
        };
        let store = ImageStore::open(dir.path(), &config).unwrap();

        let err = store.store_bytes(PNG, "png").unwrap_err();
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn test_store_rejects_empty_and_mismatched() {
        let (_dir, store) = create_test_store();
        assert!(store.store_bytes(&[], "png").is_err());

        let err = store.store_bytes(JPEG, "png").unwrap_err();
        assert!(err.to_string().contains("jpeg"));
    }

    #[test]
    fn test_unrecognized_contents_are_accepted() {
        let (_dir, store) = create_test_store();
        assert!(store.store_bytes(b"opaque image data", "webp").is_ok());
    }

    #[test]
    fn test_remove() {
        let (_dir, store) = create_test_store();
        let key = store.store_bytes(PNG, "png").unwrap();

        assert!(store.remove(&key).unwrap());
        assert!(!store.exists(&key));
        assert!(!store.remove(&key).unwrap());
    }

    #[test]
    fn test_malformed_keys_are_rejected() {
        let (_dir, store) = create_test_store();
        assert!(store.path_of("../../etc/passwd").is_err());
        assert!(store.path_of("abc.png").is_err());
        assert!(store.path_of(&format!("{}.png/x", "a".repeat(64))).is_err());
        assert!(store.path_of(&format!("{}.png", "A".repeat(64))).is_err());
        assert!(store.path_of(&format!("{}.png", "a".repeat(64))).is_ok());
        assert!(!store.exists("../secret"));
    }

    #[test]
    fn test_format_matches_jpeg_aliases() {
        assert!(format_matches("jpeg", "jpg"));
        assert!(format_matches("jpeg", "jpeg"));
        assert!(!format_matches("png", "jpg"));
    }
}
