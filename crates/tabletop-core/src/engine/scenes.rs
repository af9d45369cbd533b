//! Host commands: game and scene lifecycle.
//!
//! Deletion is ownership-aware: non-owning background references are cleared
//! before the owned tokens are destroyed, then the scene, then the game.

use super::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::images::ImageStore;
use crate::model::{GameId, GameSummary, NewToken, Scene, SceneId};
use crate::store::TokenStore;

/// Lower-case a slug and check it is 3+ characters of `[a-z0-9_-]`.
pub fn normalize_slug(slug: &str) -> SyncResult<String> {
    let slug = slug.trim().to_lowercase();
    let valid = slug.len() >= 3
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(slug)
    } else {
        Err(SyncError::InvalidArgument(format!("invalid game slug '{}'", slug)))
    }
}

impl<S: TokenStore, I: ImageStore> SyncEngine<S, I> {
    /// Create a game with one empty, active scene.
    pub fn create_game(&self, host: &str, slug: &str) -> SyncResult<GameSummary> {
        let host = host.trim().to_lowercase();
        if host.is_empty() {
            return Err(SyncError::InvalidArgument("host name is empty".to_string()));
        }
        let slug = normalize_slug(slug)?;
        let game = self.store.create_game(&host, &slug, self.clock.now())?;
        log::info!("Created game {}/{} ({})", host, slug, game.id);
        self.summary(game.id)
    }

    /// Current overview of a game.
    pub fn summary(&self, game: GameId) -> SyncResult<GameSummary> {
        let record = self.store.game(game)?;
        let scenes = self.store.scenes(game)?.into_iter().map(|s| s.id).collect();
        Ok(GameSummary {
            id: record.id,
            host: record.host,
            slug: record.slug,
            active: record.active,
            scenes,
        })
    }

    /// Add an empty scene and make it active.
    pub fn create_scene(&self, game: GameId) -> SyncResult<GameSummary> {
        self.exclusive(game, || {
            let scene = self.store.create_scene(game, self.clock.now())?;
            self.store.set_active_scene(game, scene.id)?;
            Ok(())
        })?;
        self.summary(game)
    }

    /// Show another scene to everyone.
    pub fn activate_scene(&self, game: GameId, scene: SceneId) -> SyncResult<GameSummary> {
        self.exclusive(game, || {
            self.owned_scene(game, scene)?;
            self.store.set_active_scene(game, scene)?;
            Ok(())
        })?;
        self.summary(game)
    }

    /// Copy a scene without its background and make the copy active.
    pub fn clone_scene(&self, game: GameId, scene: SceneId) -> SyncResult<GameSummary> {
        self.exclusive(game, || {
            let source = self.owned_scene(game, scene)?;
            let stamp = self.clock.now();
            let clone = self.store.create_scene(game, stamp)?;
            for token in self.store.tokens(source.id)? {
                if token.is_background() {
                    continue;
                }
                let mut copy = NewToken::cloned_from(&token, token.posx, token.posy);
                copy.scene = clone.id;
                self.store.create_token(copy, stamp)?;
            }
            self.store.set_active_scene(game, clone.id)?;
            Ok(())
        })?;
        self.summary(game)
    }

    /// Delete a scene. The game always keeps a valid active scene.
    pub fn delete_scene(&self, game: GameId, scene: SceneId) -> SyncResult<GameSummary> {
        self.exclusive(game, || {
            let record = self.store.game(game)?;
            self.owned_scene(game, scene)?;
            self.remove_scene(game, scene)?;

            if record.active == scene {
                let next = match self.store.scenes(game)?.into_iter().next() {
                    Some(remaining) => remaining.id,
                    None => self.store.create_scene(game, self.clock.now())?.id,
                };
                self.store.set_active_scene(game, next)?;
            }
            Ok(())
        })?;
        self.summary(game)
    }

    /// Delete a game with everything it owns and its ephemeral state.
    pub fn delete_game(&self, game: GameId) -> SyncResult<()> {
        self.exclusive(game, || {
            let scenes = self.store.scenes(game)?;
            for scene in &scenes {
                self.store.set_background(scene.id, None)?;
            }
            for scene in &scenes {
                self.remove_scene(game, scene.id)?;
            }
            self.store.delete_game(game)?;
            self.images.remove_game(game)?;
            self.rolls.drop_game(game);
            self.presence.drop_game(game);
            self.removals.drop_game(game);
            Ok(())
        })?;
        self.locks.remove(&game);
        log::info!("Deleted game {}", game);
        Ok(())
    }

    fn owned_scene(&self, game: GameId, scene: SceneId) -> SyncResult<Scene> {
        let record = self.store.scene(scene)?;
        if record.game != game {
            return Err(SyncError::NotFound(format!("scene {} in game {}", scene, game)));
        }
        Ok(record)
    }

    /// Clear the background reference, delete tokens, then the scene.
    fn remove_scene(&self, game: GameId, scene: SceneId) -> SyncResult<()> {
        self.store.set_background(scene, None)?;
        for token in self.store.tokens(scene)? {
            self.store.delete_token(token.id)?;
        }
        self.store.delete_scene(scene)?;
        self.removals.drop_scene(game, scene);
        Ok(())
    }
}
