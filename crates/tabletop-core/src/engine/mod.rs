//! Sync engine: applies client commands and assembles sync snapshots.
//!
//! Every command that touches a game runs inside that game's exclusion scope,
//! a mutex keyed by game id. Rounds for different games never wait on each
//! other; rounds for the same game run one at a time, so a mutation batch,
//! its background swaps and the presence updates are applied as a unit.

mod removals;
mod round;
mod scenes;
mod tokens;

pub use removals::Removals;
pub use round::{RollEvent, SyncRequest, SyncResponse};
pub use scenes::normalize_slug;

use crate::clock::{Stamp, VersionClock};
use crate::error::{SyncError, SyncResult};
use crate::geometry::tokens_in_rect;
use crate::images::ImageStore;
use crate::model::{GameId, Roll, TokenId};
use crate::presence::{PlayerInfo, PresenceCache, normalize_color, normalize_name, random_color};
use crate::rolls::{RollLog, roll_die};
use crate::store::TokenStore;
use dashmap::DashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Default look-back for rolls shown to a freshly joined client.
pub const DEFAULT_ROLL_WINDOW: Duration = Duration::from_secs(10);

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How far back a client with an initial cursor sees rolls.
    pub roll_window: Duration,
    /// Uploads below this size become tokens; larger ones become decorations.
    pub token_threshold_bytes: u64,
    /// Display size of decoration uploads.
    pub decoration_size: i32,
    /// Deleted-token records kept per game for incremental rounds.
    pub max_removals: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            roll_window: DEFAULT_ROLL_WINDOW,
            token_threshold_bytes: 250 * 1024,
            decoration_size: 300,
            max_removals: 1024,
        }
    }
}

/// The synchronization engine for all games of a process.
pub struct SyncEngine<S, I> {
    store: S,
    images: I,
    presence: PresenceCache,
    rolls: RollLog,
    removals: Removals,
    clock: VersionClock,
    config: EngineConfig,
    locks: DashMap<GameId, Arc<Mutex<()>>>,
}

impl<S: TokenStore, I: ImageStore> SyncEngine<S, I> {
    /// Create an engine with default configuration.
    pub fn new(store: S, images: I) -> Self {
        Self::with_config(store, images, EngineConfig::default())
    }

    pub fn with_config(store: S, images: I, config: EngineConfig) -> Self {
        Self::with_clock(store, images, config, VersionClock::new())
    }

    /// Create an engine around an existing clock.
    pub fn with_clock(store: S, images: I, config: EngineConfig, clock: VersionClock) -> Self {
        Self {
            store,
            images,
            presence: PresenceCache::new(),
            rolls: RollLog::new(),
            removals: Removals::new(config.max_removals),
            clock,
            config,
            locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn images(&self) -> &I {
        &self.images
    }

    pub fn presence(&self) -> &PresenceCache {
        &self.presence
    }

    pub fn rolls(&self) -> &RollLog {
        &self.rolls
    }

    pub fn clock(&self) -> &VersionClock {
        &self.clock
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `f` inside the game's exclusion scope.
    fn exclusive<T>(&self, game: GameId, f: impl FnOnce() -> SyncResult<T>) -> SyncResult<T> {
        let lock = self.locks.entry(game).or_default().clone();
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Resolve a game by host and slug.
    pub fn find_game(&self, host: &str, slug: &str) -> SyncResult<GameId> {
        Ok(self.store.find_game(host, slug)?.id)
    }

    /// Register a participant. Picks a palette color if none is given.
    pub fn join(&self, game: GameId, name: &str, color: Option<&str>) -> SyncResult<PlayerInfo> {
        let name = normalize_name(name);
        if name.is_empty() {
            return Err(SyncError::InvalidArgument("player name is empty".to_string()));
        }
        let color = match color {
            Some(color) => normalize_color(color)
                .ok_or_else(|| SyncError::InvalidArgument(format!("malformed color {}", color)))?,
            None => random_color(&mut fastrand::Rng::new()),
        };

        self.exclusive(game, || {
            self.store.game(game)?;
            self.presence.join(game, name, &color);
            log::info!("{} joined game {}", name, game);
            Ok(PlayerInfo {
                name: name.to_string(),
                color: color.clone(),
            })
        })
    }

    /// Remove a participant. Idempotent.
    pub fn leave(&self, game: GameId, name: &str) -> SyncResult<()> {
        self.exclusive(game, || {
            self.presence.leave(game, normalize_name(name));
            log::info!("{} left game {}", name, game);
            Ok(())
        })
    }

    /// Roll a die for `player` and log it.
    pub fn roll(&self, game: GameId, player: &str, sides: i64) -> SyncResult<Roll> {
        let player = normalize_name(player);
        let result = roll_die(&mut fastrand::Rng::new(), sides).inspect_err(|e| {
            log::warn!("Rejected roll by {} in game {}: {}", player, game, e);
        })?;

        self.exclusive(game, || {
            let scene = self.store.active_scene(game)?;
            let stamp = self.clock.now();
            self.store.touch_scene(scene.id, stamp)?;
            self.rolls.append(game, player, sides, result, stamp)
        })
    }

    /// Ids of non-background tokens of the active scene inside the rectangle.
    pub fn range_query(&self, game: GameId, x: i32, y: i32, w: i32, h: i32) -> SyncResult<Vec<TokenId>> {
        let scene = self.store.active_scene(game)?;
        let tokens = self.store.tokens(scene.id)?;
        Ok(tokens_in_rect(&tokens, x, y, w, h))
    }

    /// Cursor a client should treat as "everything up to now".
    pub fn now(&self) -> Stamp {
        self.clock.now()
    }
}
