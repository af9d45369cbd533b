//! In-memory store implementation.

use super::{StoreError, StoreResult, TokenStore};
use crate::clock::Stamp;
use crate::model::{Game, GameId, NewToken, Scene, SceneId, Token, TokenId};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Tables {
    games: BTreeMap<GameId, Game>,
    scenes: BTreeMap<SceneId, Scene>,
    tokens: BTreeMap<TokenId, Token>,
    next_id: u64,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn scene_mut(&mut self, id: SceneId) -> StoreResult<&mut Scene> {
        self.scenes
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("scene {}", id)))
    }

    fn insert_scene(&mut self, game: GameId, stamp: Stamp) -> Scene {
        let scene = Scene {
            id: SceneId(self.next_id()),
            game,
            backing: None,
            stamp,
        };
        self.scenes.insert(scene.id, scene.clone());
        scene
    }
}

/// In-memory store for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|e| StoreError::Other(format!("Lock error: {}", e)))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|e| StoreError::Other(format!("Lock error: {}", e)))
    }
}

impl TokenStore for MemoryStore {
    fn create_game(&self, host: &str, slug: &str, stamp: Stamp) -> StoreResult<Game> {
        let mut tables = self.write()?;
        if tables
            .games
            .values()
            .any(|g| g.host == host && g.slug == slug)
        {
            return Err(StoreError::Conflict(format!(
                "game {}/{} already exists",
                host, slug
            )));
        }

        let id = GameId(tables.next_id());
        let scene = tables.insert_scene(id, stamp);
        let game = Game {
            id,
            host: host.to_string(),
            slug: slug.to_string(),
            active: scene.id,
        };
        tables.games.insert(id, game.clone());
        Ok(game)
    }

    fn game(&self, id: GameId) -> StoreResult<Game> {
        self.read()?
            .games
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("game {}", id)))
    }

    fn find_game(&self, host: &str, slug: &str) -> StoreResult<Game> {
        self.read()?
            .games
            .values()
            .find(|g| g.host == host && g.slug == slug)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("game {}/{}", host, slug)))
    }

    fn set_active_scene(&self, game: GameId, scene: SceneId) -> StoreResult<()> {
        let mut tables = self.write()?;
        match tables.scenes.get(&scene) {
            Some(s) if s.game == game => {}
            _ => {
                return Err(StoreError::NotFound(format!(
                    "scene {} in game {}",
                    scene, game
                )));
            }
        }
        let game = tables
            .games
            .get_mut(&game)
            .ok_or_else(|| StoreError::NotFound(format!("game {}", game)))?;
        game.active = scene;
        Ok(())
    }

    fn delete_game(&self, game: GameId) -> StoreResult<()> {
        let mut tables = self.write()?;
        if tables.scenes.values().any(|s| s.game == game) {
            return Err(StoreError::Conflict(format!("game {} still owns scenes", game)));
        }
        tables.games.remove(&game);
        Ok(())
    }

    fn create_scene(&self, game: GameId, stamp: Stamp) -> StoreResult<Scene> {
        let mut tables = self.write()?;
        if !tables.games.contains_key(&game) {
            return Err(StoreError::NotFound(format!("game {}", game)));
        }
        Ok(tables.insert_scene(game, stamp))
    }

    fn scene(&self, id: SceneId) -> StoreResult<Scene> {
        self.read()?
            .scenes
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("scene {}", id)))
    }

    fn scenes(&self, game: GameId) -> StoreResult<Vec<Scene>> {
        Ok(self
            .read()?
            .scenes
            .values()
            .filter(|s| s.game == game)
            .cloned()
            .collect())
    }

    fn touch_scene(&self, scene: SceneId, stamp: Stamp) -> StoreResult<()> {
        let mut tables = self.write()?;
        tables.scene_mut(scene)?.stamp = stamp;
        Ok(())
    }

    fn set_background(&self, scene: SceneId, token: Option<TokenId>) -> StoreResult<()> {
        let mut tables = self.write()?;
        if let Some(id) = token {
            match tables.tokens.get(&id) {
                Some(t) if t.scene == scene => {}
                _ => {
                    return Err(StoreError::NotFound(format!(
                        "token {} in scene {}",
                        id, scene
                    )));
                }
            }
        }
        tables.scene_mut(scene)?.backing = token;
        Ok(())
    }

    fn delete_scene(&self, scene: SceneId) -> StoreResult<()> {
        let mut tables = self.write()?;
        let record = tables.scene_mut(scene)?;
        if record.backing.is_some() {
            return Err(StoreError::Conflict(format!(
                "scene {} still has a background",
                scene
            )));
        }
        if tables.tokens.values().any(|t| t.scene == scene) {
            return Err(StoreError::Conflict(format!("scene {} still has tokens", scene)));
        }
        tables.scenes.remove(&scene);
        Ok(())
    }

    fn token(&self, scene: SceneId, id: TokenId) -> StoreResult<Option<Token>> {
        Ok(self
            .read()?
            .tokens
            .get(&id)
            .filter(|t| t.scene == scene)
            .cloned())
    }

    fn find_token(&self, id: TokenId) -> StoreResult<Option<Token>> {
        Ok(self.read()?.tokens.get(&id).cloned())
    }

    fn tokens(&self, scene: SceneId) -> StoreResult<Vec<Token>> {
        Ok(self
            .read()?
            .tokens
            .values()
            .filter(|t| t.scene == scene)
            .cloned()
            .collect())
    }

    fn create_token(&self, token: NewToken, stamp: Stamp) -> StoreResult<Token> {
        let mut tables = self.write()?;
        if !tables.scenes.contains_key(&token.scene) {
            return Err(StoreError::NotFound(format!("scene {}", token.scene)));
        }
        let id = TokenId(tables.next_id());
        let token = token.into_token(id, stamp);
        tables.tokens.insert(id, token.clone());
        Ok(token)
    }

    fn update_token(&self, token: &Token) -> StoreResult<()> {
        let mut tables = self.write()?;
        let stored = tables
            .tokens
            .get_mut(&token.id)
            .ok_or_else(|| StoreError::NotFound(format!("token {}", token.id)))?;
        if stored.scene != token.scene {
            return Err(StoreError::Conflict(format!(
                "token {} cannot move between scenes",
                token.id
            )));
        }
        *stored = token.clone();
        Ok(())
    }

    fn delete_token(&self, id: TokenId) -> StoreResult<()> {
        let mut tables = self.write()?;
        if tables.scenes.values().any(|s| s.backing == Some(id)) {
            return Err(StoreError::Conflict(format!(
                "token {} is still a scene background",
                id
            )));
        }
        tables.tokens.remove(&id);
        Ok(())
    }
}
