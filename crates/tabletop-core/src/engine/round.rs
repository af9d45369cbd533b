//! One synchronization round.

use super::SyncEngine;
use crate::clock::Stamp;
use crate::error::{SyncError, SyncResult};
use crate::images::ImageStore;
use crate::model::{BACKGROUND_SIZE, GameId, RollId, SceneId, Token, TokenId, TokenMutation};
use crate::presence::{PlayerInfo, normalize_name};
use crate::store::TokenStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a client sends on every poll.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Participant name.
    pub player: String,
    /// Last cursor received, or zero.
    #[serde(default)]
    pub cursor: Stamp,
    /// Ask for every token of the scene.
    #[serde(default)]
    pub full_update: bool,
    /// Scene the client currently shows.
    #[serde(default)]
    pub scene_id: Option<SceneId>,
    /// Tokens the participant has selected.
    #[serde(default)]
    pub selected: Vec<TokenId>,
    /// Token mutations. Decoded one by one so a malformed item only rejects itself.
    #[serde(default)]
    pub changes: Vec<serde_json::Value>,
}

/// A roll as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollEvent {
    pub player: String,
    pub color: String,
    pub sides: u32,
    pub result: u32,
    pub id: RollId,
    pub cursor: Stamp,
}

/// Snapshot returned for a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    /// The game's active scene.
    pub active_scene: SceneId,
    /// Cursor to echo on the next poll.
    pub cursor: Stamp,
    /// Whether `tokens` holds the complete scene.
    pub full: bool,
    pub tokens: Vec<Token>,
    /// Tokens deleted since the client's cursor (empty on full rounds).
    pub removed: Vec<TokenId>,
    pub rolls: Vec<RollEvent>,
    pub presence: Vec<PlayerInfo>,
    pub selections: BTreeMap<String, Vec<TokenId>>,
}

impl<S: TokenStore, I: ImageStore> SyncEngine<S, I> {
    /// Run one synchronization round for `request.player` in `game`.
    pub fn sync(&self, game: GameId, request: &SyncRequest) -> SyncResult<SyncResponse> {
        self.exclusive(game, || {
            let scene = self.store.active_scene(game)?;
            let mut full = request.full_update
                || request.scene_id != Some(scene.id)
                || self.removals.is_beyond_horizon(game, request.cursor);

            for change in &request.changes {
                match self.apply_change(scene.id, change) {
                    Ok(()) => {}
                    Err(SyncError::StaleReference { token, scene: owner }) => {
                        log::debug!(
                            "Skipping stale change to token {} (scene {}) from {}",
                            token,
                            owner,
                            request.player
                        );
                        full = true;
                    }
                    Err(SyncError::Store(err)) => return Err(SyncError::Store(err)),
                    Err(err) => {
                        log::debug!("Skipping change from {}: {}", request.player, err);
                    }
                }
            }

            self.presence
                .set_selection(game, normalize_name(&request.player), request.selected.clone());

            let tokens: Vec<Token> = self
                .store
                .tokens(scene.id)?
                .into_iter()
                .filter(|t| full || t.stamp >= request.cursor)
                .collect();
            let removed = if full {
                Vec::new()
            } else {
                self.removals.since(game, scene.id, request.cursor)
            };

            let since = if request.cursor.is_initial() {
                self.clock.now().saturating_sub(self.config.roll_window)
            } else {
                request.cursor
            };
            let rolls = self
                .rolls
                .query(game, since)
                .into_iter()
                .map(|roll| RollEvent {
                    color: self.presence.color_of(game, &roll.player),
                    player: roll.player,
                    sides: roll.sides,
                    result: roll.result,
                    id: roll.id,
                    cursor: roll.stamp,
                })
                .collect();

            Ok(SyncResponse {
                active_scene: scene.id,
                cursor: self.clock.now(),
                full,
                tokens,
                removed,
                rolls,
                presence: self.presence.list(game),
                selections: self.presence.selections(game),
            })
        })
    }

    /// Apply one client change to a token of `scene`.
    fn apply_change(&self, scene: SceneId, change: &serde_json::Value) -> SyncResult<()> {
        let change: TokenMutation = serde_json::from_value(change.clone())
            .map_err(|e| SyncError::InvalidArgument(format!("malformed change: {}", e)))?;

        let Some(mut token) = self.store.token(scene, change.id)? else {
            return Err(match self.store.find_token(change.id)? {
                Some(other) => SyncError::StaleReference {
                    token: change.id,
                    scene: other.scene,
                },
                None => SyncError::NotFound(format!("token {}", change.id)),
            });
        };

        let stamp = self.clock.now();
        if change.size == BACKGROUND_SIZE {
            self.make_background(scene, token.id, stamp)?;
        } else if self.store.scene(scene)?.backing == Some(token.id) {
            self.store.set_background(scene, None)?;
        }

        change.apply(&mut token, stamp);
        self.store.update_token(&token)?;
        Ok(())
    }

    /// Make `token` the scene background, demoting the previous holder first.
    ///
    /// The previous holder is not deleted: it stays on the scene as a normal
    /// token of [`Token::DEFAULT_SIZE`], restamped so every client sees it change.
    pub(super) fn make_background(&self, scene: SceneId, token: TokenId, stamp: Stamp) -> SyncResult<()> {
        let current = self.store.scene(scene)?.backing;
        if current == Some(token) {
            return Ok(());
        }
        if let Some(previous) = current {
            self.store.set_background(scene, None)?;
            if let Some(mut old) = self.store.token(scene, previous)? {
                old.size = Token::DEFAULT_SIZE;
                old.stamp = stamp;
                self.store.update_token(&old)?;
            }
            log::debug!("Scene {} background moves from token {} to {}", scene, previous, token);
        }
        self.store.set_background(scene, Some(token))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{add_token, engine_with_game};
    use super::*;
    use crate::clock::VersionClock;
    use crate::images::MemoryImages;
    use crate::store::MemoryStore;
    use crate::engine::EngineConfig;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn change(token: &Token, posx: i32, posy: i32, size: i32) -> serde_json::Value {
        json!({
            "id": token.id, "posx": posx, "posy": posy, "zorder": token.zorder,
            "size": size, "rotate": 0.0, "flipx": false, "locked": false
        })
    }

    fn request(scene: SceneId, cursor: Stamp) -> SyncRequest {
        SyncRequest {
            player: "Alice".to_string(),
            cursor,
            scene_id: Some(scene),
            ..Default::default()
        }
    }

    fn background_count(tokens: &[Token]) -> usize {
        tokens.iter().filter(|t| t.is_background()).count()
    }

    #[test]
    fn test_first_round_is_full() {
        let (engine, game) = engine_with_game();
        add_token(&engine, &game, 0, 0);
        add_token(&engine, &game, 10, 10);

        let response = engine
            .sync(game.id, &SyncRequest { player: "Alice".into(), ..Default::default() })
            .unwrap();

        assert!(response.full);
        assert_eq!(response.tokens.len(), 2);
        assert_eq!(response.active_scene, game.active);
    }

    #[test]
    fn test_incremental_omits_unchanged() {
        let (engine, game) = engine_with_game();
        let a = add_token(&engine, &game, 0, 0);
        add_token(&engine, &game, 10, 10);

        let first = engine.sync(game.id, &request(game.active, Stamp::ZERO)).unwrap();
        let mut bob = request(game.active, Stamp::ZERO);
        bob.player = "Bob".into();
        bob.changes = vec![change(&a, 5, 5, 20)];
        engine.sync(game.id, &bob).unwrap();

        let second = engine.sync(game.id, &request(game.active, first.cursor)).unwrap();
        assert!(!second.full);
        assert_eq!(second.tokens.len(), 1);
        assert_eq!(second.tokens[0].id, a.id);
        assert_eq!((second.tokens[0].posx, second.tokens[0].posy), (5, 5));

        let third = engine.sync(game.id, &request(game.active, second.cursor)).unwrap();
        assert!(third.tokens.is_empty());
    }

    #[test]
    fn test_scene_switch_forces_full() {
        let (engine, game) = engine_with_game();
        add_token(&engine, &game, 0, 0);
        let first = engine.sync(game.id, &request(game.active, Stamp::ZERO)).unwrap();

        let stale_scene = request(SceneId(9999), first.cursor);
        let response = engine.sync(game.id, &stale_scene).unwrap();

        assert!(response.full);
        assert_eq!(response.tokens.len(), 1);
    }

    #[test]
    fn test_same_batch_twice_is_idempotent() {
        let (engine, game) = engine_with_game();
        let token = add_token(&engine, &game, 0, 0);
        let mut req = request(game.active, Stamp::ZERO);
        req.changes = vec![change(&token, 42, 24, 30)];

        engine.sync(game.id, &req).unwrap();
        let once = engine.store().find_token(token.id).unwrap().unwrap();
        engine.sync(game.id, &req).unwrap();
        let twice = engine.store().find_token(token.id).unwrap().unwrap();

        assert_eq!((once.posx, once.posy, once.size), (twice.posx, twice.posy, twice.size));
        assert_eq!((twice.posx, twice.posy, twice.size), (42, 24, 30));
    }

    #[test]
    fn test_background_exclusive() {
        let (engine, game) = engine_with_game();
        let a = add_token(&engine, &game, 0, 0);
        let b = add_token(&engine, &game, 10, 10);

        let mut req = request(game.active, Stamp::ZERO);
        req.changes = vec![change(&a, 0, 0, BACKGROUND_SIZE)];
        engine.sync(game.id, &req).unwrap();
        assert_eq!(engine.store().scene(game.active).unwrap().backing, Some(a.id));

        req.changes = vec![change(&b, 10, 10, BACKGROUND_SIZE)];
        let response = engine.sync(game.id, &req).unwrap();

        assert_eq!(engine.store().scene(game.active).unwrap().backing, Some(b.id));
        let tokens = engine.store().tokens(game.active).unwrap();
        assert_eq!(background_count(&tokens), 1);
        let old = engine.store().find_token(a.id).unwrap().unwrap();
        assert_eq!(old.size, Token::DEFAULT_SIZE);
        // demoted holder is restamped so other clients see it
        assert!(response.tokens.iter().any(|t| t.id == a.id && !t.is_background()));
    }

    #[test]
    fn test_background_swap_within_one_batch() {
        let (engine, game) = engine_with_game();
        let a = add_token(&engine, &game, 0, 0);
        let b = add_token(&engine, &game, 10, 10);

        let mut req = request(game.active, Stamp::ZERO);
        req.changes = vec![
            change(&a, 0, 0, BACKGROUND_SIZE),
            change(&b, 10, 10, BACKGROUND_SIZE),
        ];
        engine.sync(game.id, &req).unwrap();

        let tokens = engine.store().tokens(game.active).unwrap();
        assert_eq!(background_count(&tokens), 1);
        assert_eq!(engine.store().scene(game.active).unwrap().backing, Some(b.id));
    }

    #[test]
    fn test_unsetting_background_clears_reference() {
        let (engine, game) = engine_with_game();
        let a = add_token(&engine, &game, 0, 0);
        let mut req = request(game.active, Stamp::ZERO);
        req.changes = vec![change(&a, 0, 0, BACKGROUND_SIZE)];
        engine.sync(game.id, &req).unwrap();

        req.changes = vec![change(&a, 0, 0, 40)];
        engine.sync(game.id, &req).unwrap();

        assert_eq!(engine.store().scene(game.active).unwrap().backing, None);
    }

    #[test]
    fn test_stale_scene_change_skipped_and_forces_full() {
        let (engine, game) = engine_with_game();
        let old = add_token(&engine, &game, 0, 0);
        let first = engine.sync(game.id, &request(game.active, Stamp::ZERO)).unwrap();
        let new_scene = engine.create_scene(game.id).unwrap().active;

        let mut req = request(new_scene, first.cursor);
        req.changes = vec![change(&old, 77, 77, 20)];
        let response = engine.sync(game.id, &req).unwrap();

        assert!(response.full);
        assert_eq!(response.active_scene, new_scene);
        let stored = engine.store().find_token(old.id).unwrap().unwrap();
        assert_eq!(stored.posx, 0);
    }

    #[test]
    fn test_malformed_change_rejects_only_itself() {
        let (engine, game) = engine_with_game();
        let a = add_token(&engine, &game, 0, 0);
        let b = add_token(&engine, &game, 0, 0);

        let mut req = request(game.active, Stamp::ZERO);
        req.changes = vec![
            json!({"id": a.id, "posx": 1.5, "posy": 2, "zorder": 0, "size": 20}),
            json!({"id": 4242, "posx": 1, "posy": 2, "zorder": 0, "size": 20}),
            change(&b, 8, 9, 20),
        ];
        engine.sync(game.id, &req).unwrap();

        assert_eq!(engine.store().find_token(a.id).unwrap().unwrap().posx, 0);
        assert_eq!(engine.store().find_token(b.id).unwrap().unwrap().posx, 8);
    }

    #[test]
    fn test_selection_replaced_and_reported() {
        let (engine, game) = engine_with_game();
        let a = add_token(&engine, &game, 0, 0);
        let b = add_token(&engine, &game, 0, 0);
        engine.join(game.id, "Alice", Some("#102030")).unwrap();

        let mut req = request(game.active, Stamp::ZERO);
        req.selected = vec![a.id, b.id];
        engine.sync(game.id, &req).unwrap();
        req.selected = vec![b.id];
        let response = engine.sync(game.id, &req).unwrap();

        assert_eq!(response.selections["Alice"], vec![b.id]);
        assert_eq!(response.presence[0].color, "#102030");
    }

    #[test]
    fn test_selection_from_absent_player_ignored() {
        let (engine, game) = engine_with_game();
        let a = add_token(&engine, &game, 0, 0);
        let mut req = request(game.active, Stamp::ZERO);
        req.selected = vec![a.id];

        let response = engine.sync(game.id, &req).unwrap();
        assert!(response.selections.is_empty());
        assert!(response.presence.is_empty());
    }

    #[test]
    fn test_roll_window_for_fresh_client() {
        let clock = VersionClock::starting_at(Stamp(1_000_000_000));
        let engine = SyncEngine::with_clock(
            MemoryStore::new(),
            MemoryImages::new(),
            EngineConfig::default(),
            clock,
        );
        let game = engine.create_game("gm", "Window").unwrap();
        engine.join(game.id, "Alice", Some("#aa0000")).unwrap();

        let now = engine.now();
        let old = now.saturating_sub(Duration::from_secs(60));
        engine.rolls().append(game.id, "Alice", 6, 2, old).unwrap();
        let recent = engine.roll(game.id, "Alice", 20).unwrap();

        let fresh = engine.sync(game.id, &request(game.active, Stamp::ZERO)).unwrap();
        assert_eq!(fresh.rolls.len(), 1);
        assert_eq!(fresh.rolls[0].id, recent.id);
        assert_eq!(fresh.rolls[0].color, "#aa0000");

        let resumed = engine.sync(game.id, &request(game.active, old)).unwrap();
        assert_eq!(resumed.rolls.len(), 2);
    }

    #[test]
    fn test_roll_color_unknown_after_leave() {
        let (engine, game) = engine_with_game();
        engine.join(game.id, "Bob", Some("#00aa00")).unwrap();
        engine.roll(game.id, "Bob", 6).unwrap();
        engine.leave(game.id, "Bob").unwrap();

        let response = engine.sync(game.id, &request(game.active, Stamp::ZERO)).unwrap();
        assert_eq!(response.rolls[0].color, crate::presence::UNKNOWN_COLOR);
    }

    #[test]
    fn test_incremental_union_matches_full() {
        let (engine, game) = engine_with_game();
        let tokens: Vec<_> = (0..5).map(|i| add_token(&engine, &game, i, i)).collect();
        let start = engine.sync(game.id, &request(game.active, Stamp::ZERO)).unwrap().cursor;

        let mut cursor = start;
        let mut seen = std::collections::BTreeMap::new();
        for (round, token) in tokens.iter().enumerate().take(3) {
            let mut writer = request(game.active, Stamp::ZERO);
            writer.player = "Bob".into();
            writer.changes = vec![change(token, 100 + round as i32, 0, 20)];
            engine.sync(game.id, &writer).unwrap();

            let response = engine.sync(game.id, &request(game.active, cursor)).unwrap();
            for t in response.tokens {
                seen.insert(t.id, t);
            }
            cursor = response.cursor;
        }

        let mut full = request(game.active, Stamp::ZERO);
        full.full_update = true;
        let expected: std::collections::BTreeMap<_, _> = engine
            .sync(game.id, &full)
            .unwrap()
            .tokens
            .into_iter()
            .filter(|t| t.stamp >= start)
            .map(|t| (t.id, t))
            .collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_concurrent_background_swaps() {
        let (engine, game) = engine_with_game();
        let tokens: Vec<_> = (0..4).map(|i| add_token(&engine, &game, i, i)).collect();
        let engine = Arc::new(engine);

        let handles: Vec<_> = tokens
            .into_iter()
            .enumerate()
            .map(|(i, token)| {
                let engine = Arc::clone(&engine);
                let scene = game.active;
                thread::spawn(move || {
                    for _ in 0..200 {
                        let mut swap = request(scene, Stamp::ZERO);
                        swap.player = format!("player-{}", i);
                        swap.changes = vec![change(&token, token.posx, token.posy, BACKGROUND_SIZE)];
                        engine.sync(game.id, &swap).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let tokens = engine.store().tokens(game.active).unwrap();
        assert_eq!(background_count(&tokens), 1);
        let holder = tokens.iter().find(|t| t.is_background()).unwrap();
        assert_eq!(engine.store().scene(game.active).unwrap().backing, Some(holder.id));
    }

    #[test]
    fn test_concurrent_games_progress_independently() {
        let (engine, first) = engine_with_game();
        let second = engine.create_game("gm", "second").unwrap();
        let second = engine.store().game(second.id).unwrap();
        let a = add_token(&engine, &first, 0, 0);
        let b = add_token(&engine, &second, 0, 0);
        let engine = Arc::new(engine);

        let handles: Vec<_> = [(first.clone(), a), (second.clone(), b)]
            .into_iter()
            .map(|(game, token)| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for step in 1..=100 {
                        let mut mv = request(game.active, Stamp::ZERO);
                        mv.changes = vec![change(&token, step, step, 20)];
                        engine.sync(game.id, &mv).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for game in [&first, &second] {
            let tokens = engine.store().tokens(game.active).unwrap();
            assert_eq!(tokens.len(), 1);
            assert_eq!((tokens[0].posx, tokens[0].posy), (100, 100));
        }
    }

    #[test]
    fn test_unknown_game() {
        let (engine, _) = engine_with_game();
        let result = engine.sync(GameId(4040), &SyncRequest::default());
        assert!(matches!(result, Err(SyncError::NotFound(_))));
    }
}
