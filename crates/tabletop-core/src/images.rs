//! Image storage interface for uploaded token images.

use crate::model::GameId;
use crate::store::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Location of a stored image, as handed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(pub String);

impl From<&str> for ImageRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
}

impl ImageFormat {
    /// File extension used when storing.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Gif => "gif",
            ImageFormat::WebP => "webp",
        }
    }

    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "gif" => Some(ImageFormat::Gif),
            "webp" => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    /// Detect format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Some(ImageFormat::Png);
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }
        if data.starts_with(b"GIF8") {
            return Some(ImageFormat::Gif);
        }
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Some(ImageFormat::WebP);
        }
        None
    }

    /// Detect from content first, falling back to the file name.
    pub fn detect(file_name: &str, data: &[u8]) -> Option<Self> {
        Self::from_magic_bytes(data).or_else(|| {
            file_name
                .rsplit_once('.')
                .and_then(|(_, ext)| Self::from_extension(ext))
        })
    }
}

/// A file received from an upload form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Public URL path of image `index` in `game`.
pub fn image_url(game: GameId, index: u64, format: ImageFormat) -> ImageRef {
    ImageRef(format!("/token/{}/{}.{}", game, index, format.extension()))
}

/// Backend holding uploaded images.
pub trait ImageStore: Send + Sync {
    /// Store an uploaded file and return its reference.
    fn store(&self, game: GameId, file_name: &str, bytes: &[u8]) -> StoreResult<ImageRef>;

    /// Size in bytes of a stored image.
    fn byte_size(&self, image: &ImageRef) -> StoreResult<u64>;

    /// Drop every image of a game.
    fn remove_game(&self, game: GameId) -> StoreResult<()>;
}

/// In-memory image store for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryImages {
    images: RwLock<HashMap<ImageRef, (GameId, u64)>>,
    next_index: AtomicU64,
}

impl MemoryImages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored images.
    pub fn len(&self) -> usize {
        self.images.read().map(|images| images.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ImageStore for MemoryImages {
    fn store(&self, game: GameId, file_name: &str, bytes: &[u8]) -> StoreResult<ImageRef> {
        let format = ImageFormat::detect(file_name, bytes)
            .ok_or_else(|| StoreError::InvalidData(format!("unsupported image: {}", file_name)))?;
        let index = self.next_index.fetch_add(1, Ordering::Relaxed);
        let url = image_url(game, index, format);

        let mut images = self
            .images
            .write()
            .map_err(|e| StoreError::Other(format!("Lock error: {}", e)))?;
        images.insert(url.clone(), (game, bytes.len() as u64));
        Ok(url)
    }

    fn byte_size(&self, image: &ImageRef) -> StoreResult<u64> {
        let images = self
            .images
            .read()
            .map_err(|e| StoreError::Other(format!("Lock error: {}", e)))?;
        images
            .get(image)
            .map(|(_, size)| *size)
            .ok_or_else(|| StoreError::NotFound(image.to_string()))
    }

    fn remove_game(&self, game: GameId) -> StoreResult<()> {
        let mut images = self
            .images
            .write()
            .map_err(|e| StoreError::Other(format!("Lock error: {}", e)))?;
        images.retain(|_, (owner, _)| *owner != game);
        Ok(())
    }
}
