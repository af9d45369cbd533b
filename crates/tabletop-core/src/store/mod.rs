//! Token store adapter: the interface to the durable record store.
//!
//! The sync engine reads and writes games, scenes and tokens only through
//! [`TokenStore`]. Deletion ordering is enforced by implementations: a scene
//! cannot be deleted while it still has tokens or a background reference, a
//! token cannot be deleted while a scene points at it, and a game cannot be
//! deleted while it still owns scenes.

mod memory;

pub use memory::MemoryStore;

use crate::clock::Stamp;
use crate::model::{Game, GameId, NewToken, Scene, SceneId, Token, TokenId};
use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for record store backends.
///
/// Calls are synchronous and expected to be fast; the engine holds its
/// per-game exclusion scope across them.
pub trait TokenStore: Send + Sync {
    /// Create a game together with its first scene, which becomes active.
    fn create_game(&self, host: &str, slug: &str, stamp: Stamp) -> StoreResult<Game>;

    /// Load a game.
    fn game(&self, id: GameId) -> StoreResult<Game>;

    /// Find a game by host and slug.
    fn find_game(&self, host: &str, slug: &str) -> StoreResult<Game>;

    /// Point the game at another of its scenes.
    fn set_active_scene(&self, game: GameId, scene: SceneId) -> StoreResult<()>;

    /// Delete a game record. Fails while the game still owns scenes.
    fn delete_game(&self, game: GameId) -> StoreResult<()>;

    /// Create an empty scene in a game.
    fn create_scene(&self, game: GameId, stamp: Stamp) -> StoreResult<Scene>;

    /// Load a scene.
    fn scene(&self, id: SceneId) -> StoreResult<Scene>;

    /// All scenes of a game, ordered by id.
    fn scenes(&self, game: GameId) -> StoreResult<Vec<Scene>>;

    /// Bump a scene's stamp.
    fn touch_scene(&self, scene: SceneId, stamp: Stamp) -> StoreResult<()>;

    /// Set or clear the scene's background reference.
    fn set_background(&self, scene: SceneId, token: Option<TokenId>) -> StoreResult<()>;

    /// Delete a scene record. Fails while it still has tokens or a background.
    fn delete_scene(&self, scene: SceneId) -> StoreResult<()>;

    /// Load a token if it belongs to `scene`.
    fn token(&self, scene: SceneId, id: TokenId) -> StoreResult<Option<Token>>;

    /// Load a token from any scene.
    fn find_token(&self, id: TokenId) -> StoreResult<Option<Token>>;

    /// All tokens of a scene, ordered by id.
    fn tokens(&self, scene: SceneId) -> StoreResult<Vec<Token>>;

    /// Insert a token.
    fn create_token(&self, token: NewToken, stamp: Stamp) -> StoreResult<Token>;

    /// Overwrite a stored token.
    fn update_token(&self, token: &Token) -> StoreResult<()>;

    /// Delete a token. Fails while a scene uses it as background.
    fn delete_token(&self, id: TokenId) -> StoreResult<()>;

    /// The game's active scene.
    fn active_scene(&self, game: GameId) -> StoreResult<Scene> {
        let game = self.game(game)?;
        self.scene(game.active)
    }
}
