//! Uploaded images stored on disk.

use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tabletop_core::images::{image_url, ImageFormat};
use tabletop_core::{GameId, ImageRef, ImageStore, StoreError, StoreResult};

/// Writes images to `<base>/<game>/<index>.<ext>` and hands out
/// `/token/<game>/<index>.<ext>` references.
pub struct DiskImages {
    base_path: PathBuf,
    // per-game index allocation
    game_locks: DashMap<GameId, Arc<Mutex<()>>>,
}

impl DiskImages {
    /// Create the store, creating `base_path` if needed.
    pub fn new(base_path: PathBuf) -> StoreResult<Self> {
        fs::create_dir_all(&base_path).map_err(|e| {
            StoreError::Other(format!("Failed to create image directory: {}", e))
        })?;
        Ok(Self {
            base_path,
            game_locks: DashMap::new(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn game_dir(&self, game: GameId) -> PathBuf {
        self.base_path.join(game.to_string())
    }

    /// File path behind an image reference, if it is one of ours.
    pub fn path_of(&self, image: &ImageRef) -> Option<PathBuf> {
        let rest = image.0.strip_prefix("/token/")?;
        let (game, file) = rest.split_once('/')?;
        let safe = |s: &str| {
            !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '.') && s != ".."
        };
        if !safe(game) || !safe(file) {
            return None;
        }
        Some(self.base_path.join(game).join(file))
    }
}

impl ImageStore for DiskImages {
    fn store(&self, game: GameId, file_name: &str, bytes: &[u8]) -> StoreResult<ImageRef> {
        let format = ImageFormat::detect(file_name, bytes)
            .ok_or_else(|| StoreError::InvalidData(format!("unsupported image: {}", file_name)))?;

        let dir = self.game_dir(game);
        let lock = self.game_locks.entry(game).or_default().clone();
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::Other(format!("Failed to create {}: {}", dir.display(), e)))?;

        let mut index = fs::read_dir(&dir)
            .map_err(|e| StoreError::Other(format!("Failed to read {}: {}", dir.display(), e)))?
            .count() as u64;
        let url = loop {
            let url = image_url(game, index, format);
            match self.path_of(&url) {
                Some(path) if path.exists() => index += 1,
                Some(_) => break url,
                None => return Err(StoreError::Other(format!("bad image path {}", url))),
            }
        };

        let path = self
            .path_of(&url)
            .ok_or_else(|| StoreError::Other(format!("bad image path {}", url)))?;
        fs::write(&path, bytes)
            .map_err(|e| StoreError::Other(format!("Failed to write {}: {}", path.display(), e)))?;
        Ok(url)
    }

    fn byte_size(&self, image: &ImageRef) -> StoreResult<u64> {
        let path = self
            .path_of(image)
            .ok_or_else(|| StoreError::NotFound(image.to_string()))?;
        fs::metadata(&path)
            .map(|m| m.len())
            .map_err(|_| StoreError::NotFound(image.to_string()))
    }

    fn remove_game(&self, game: GameId) -> StoreResult<()> {
        self.game_locks.remove(&game);
        let dir = self.game_dir(game);
        if !dir.exists() {
            return Ok(());
        }
        fs::remove_dir_all(&dir)
            .map_err(|e| StoreError::Other(format!("Failed to remove {}: {}", dir.display(), e)))
    }
}
