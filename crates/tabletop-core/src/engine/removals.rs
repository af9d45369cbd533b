//! Records of deleted tokens, so incremental rounds can report removals.

use crate::clock::Stamp;
use crate::model::{GameId, SceneId, TokenId};
use dashmap::DashMap;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy)]
struct Removal {
    scene: SceneId,
    token: TokenId,
    stamp: Stamp,
}

#[derive(Debug, Default)]
struct GameRemovals {
    entries: VecDeque<Removal>,
    /// Stamp of the newest record evicted to respect the cap.
    horizon: Stamp,
}

/// Bounded per-game history of token deletions.
///
/// A client whose cursor predates the eviction horizon can no longer be told
/// about every removal and must receive a full round instead.
#[derive(Debug)]
pub struct Removals {
    games: DashMap<GameId, GameRemovals>,
    capacity: usize,
}

impl Removals {
    pub fn new(capacity: usize) -> Self {
        Self {
            games: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record that `token` was deleted from `scene`.
    pub fn record(&self, game: GameId, scene: SceneId, token: TokenId, stamp: Stamp) {
        let mut removals = self.games.entry(game).or_default();
        removals.entries.push_back(Removal {
            scene,
            token,
            stamp,
        });
        while removals.entries.len() > self.capacity {
            if let Some(evicted) = removals.entries.pop_front() {
                removals.horizon = removals.horizon.max(evicted.stamp);
            }
        }
    }

    /// Tokens of `scene` deleted at or after `since`.
    pub fn since(&self, game: GameId, scene: SceneId, since: Stamp) -> Vec<TokenId> {
        self.games
            .get(&game)
            .map(|removals| {
                removals
                    .entries
                    .iter()
                    .filter(|r| r.scene == scene && r.stamp >= since)
                    .map(|r| r.token)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether removals relevant to `cursor` may have been evicted.
    pub fn is_beyond_horizon(&self, game: GameId, cursor: Stamp) -> bool {
        self.games
            .get(&game)
            .is_some_and(|removals| cursor <= removals.horizon)
    }

    /// Drop the records of a deleted scene.
    pub fn drop_scene(&self, game: GameId, scene: SceneId) {
        if let Some(mut removals) = self.games.get_mut(&game) {
            removals.entries.retain(|r| r.scene != scene);
        }
    }

    /// Forget a game.
    pub fn drop_game(&self, game: GameId) {
        self.games.remove(&game);
    }
}
