//! Presence of connected participants.
//!
//! Presence is ephemeral: it lives only in process memory and is rebuilt as
//! participants join. No operation here fails; missing entries degrade to
//! no-ops or [`UNKNOWN_COLOR`].

use crate::model::{GameId, TokenId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Color reported for a participant who is no longer present.
pub const UNKNOWN_COLOR: &str = "#000000";

/// Colors handed out to participants who did not pick one.
pub const PALETTE: [&str; 6] = [
    "#ff0000", "#00ff00", "#0000ff", "#ffff00", "#ff00ff", "#00ffff",
];

/// Brightest value a color channel may keep.
const MAX_CHANNEL: u8 = 200;

/// A connected participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEntry {
    pub name: String,
    pub color: String,
    pub selection: Vec<TokenId>,
}

/// Name and color of a present participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub name: String,
    pub color: String,
}

/// Clamp every channel of a `#rrggbb` color so it stays readable on a map.
///
/// Returns `None` for anything that is not a six-digit hex color.
pub fn normalize_color(color: &str) -> Option<String> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let mut normalized = String::with_capacity(7);
    normalized.push('#');
    for i in 0..3 {
        let channel = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        normalized.push_str(&format!("{:02x}", channel.min(MAX_CHANNEL)));
    }
    Some(normalized)
}

/// Canonical form of a participant name, used as the presence key.
pub fn normalize_name(name: &str) -> &str {
    name.trim()
}

/// Random pick from [`PALETTE`], already normalized.
pub fn random_color(rng: &mut fastrand::Rng) -> String {
    let color = PALETTE[rng.usize(..PALETTE.len())];
    normalize_color(color).unwrap_or_else(|| color.to_string())
}

/// Per-game table of connected participants.
///
/// Each game's sub-map sits behind its own shard entry, so operations on one
/// game never wait on operations for another.
#[derive(Debug, Default)]
pub struct PresenceCache {
    games: DashMap<GameId, HashMap<String, PresenceEntry>>,
}

impl PresenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a participant.
    pub fn join(&self, game: GameId, name: &str, color: &str) {
        let mut players = self.games.entry(game).or_default();
        players.insert(
            name.to_string(),
            PresenceEntry {
                name: name.to_string(),
                color: color.to_string(),
                selection: Vec::new(),
            },
        );
    }

    /// Remove a participant. No-op if absent.
    pub fn leave(&self, game: GameId, name: &str) {
        self.games.remove_if_mut(&game, |_, players| {
            players.remove(name);
            players.is_empty()
        });
    }

    /// Replace a participant's selection. Ignored if the participant is gone.
    pub fn set_selection(&self, game: GameId, name: &str, ids: Vec<TokenId>) {
        if let Some(mut players) = self.games.get_mut(&game) {
            if let Some(entry) = players.get_mut(name) {
                entry.selection = ids;
            }
        }
    }

    /// Display color of a participant, or [`UNKNOWN_COLOR`].
    pub fn color_of(&self, game: GameId, name: &str) -> String {
        self.games
            .get(&game)
            .and_then(|players| players.get(name).map(|p| p.color.clone()))
            .unwrap_or_else(|| UNKNOWN_COLOR.to_string())
    }

    /// Present participants, ordered by name.
    pub fn list(&self, game: GameId) -> Vec<PlayerInfo> {
        let Some(players) = self.games.get(&game) else {
            return Vec::new();
        };
        let mut list: Vec<PlayerInfo> = players
            .values()
            .map(|p| PlayerInfo {
                name: p.name.clone(),
                color: p.color.clone(),
            })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// Current selection of every present participant.
    pub fn selections(&self, game: GameId) -> BTreeMap<String, Vec<TokenId>> {
        self.games
            .get(&game)
            .map(|players| {
                players
                    .values()
                    .map(|p| (p.name.clone(), p.selection.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether anyone is present in the game.
    pub fn contains(&self, game: GameId) -> bool {
        self.games.contains_key(&game)
    }

    /// Forget a game entirely.
    pub fn drop_game(&self, game: GameId) {
        self.games.remove(&game);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const G: GameId = GameId(1);

    #[test]
    fn test_join_and_leave() {
        let cache = PresenceCache::new();
        cache.join(G, "Alice", "#aa0000");

        assert_eq!(
            cache.list(G),
            vec![PlayerInfo {
                name: "Alice".to_string(),
                color: "#aa0000".to_string()
            }]
        );

        cache.leave(G, "Alice");
        assert!(cache.list(G).is_empty());
        assert!(!cache.contains(G));
    }

    #[test]
    fn test_join_is_idempotent() {
        let cache = PresenceCache::new();
        cache.join(G, "Alice", "#aa0000");
        cache.join(G, "Alice", "#00aa00");

        let list = cache.list(G);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].color, "#00aa00");
    }

    #[test]
    fn test_leave_absent_is_noop() {
        let cache = PresenceCache::new();
        cache.leave(G, "Nobody");
        cache.join(G, "Alice", "#aa0000");
        cache.leave(G, "Nobody");
        assert_eq!(cache.list(G).len(), 1);
    }

    #[test]
    fn test_selection_replaces() {
        let cache = PresenceCache::new();
        cache.join(G, "Alice", "#aa0000");
        cache.set_selection(G, "Alice", vec![TokenId(1), TokenId(2)]);
        cache.set_selection(G, "Alice", vec![TokenId(3)]);

        assert_eq!(cache.selections(G)["Alice"], vec![TokenId(3)]);
    }

    #[test]
    fn test_selection_does_not_resurrect() {
        let cache = PresenceCache::new();
        cache.join(G, "Alice", "#aa0000");
        cache.leave(G, "Alice");
        cache.set_selection(G, "Alice", vec![TokenId(1)]);

        assert!(cache.list(G).is_empty());
        assert!(cache.selections(G).is_empty());
    }

    #[test]
    fn test_color_of_unknown() {
        let cache = PresenceCache::new();
        cache.join(G, "Alice", "#aa0000");

        assert_eq!(cache.color_of(G, "Alice"), "#aa0000");
        assert_eq!(cache.color_of(G, "Bob"), UNKNOWN_COLOR);
        assert_eq!(cache.color_of(GameId(2), "Alice"), UNKNOWN_COLOR);
    }

    #[test]
    fn test_games_are_independent() {
        let cache = PresenceCache::new();
        cache.join(G, "Alice", "#aa0000");
        cache.join(GameId(2), "Bob", "#0000aa");
        cache.drop_game(G);

        assert!(cache.list(G).is_empty());
        assert_eq!(cache.list(GameId(2)).len(), 1);
    }

    #[test]
    fn test_list_sorted_by_name() {
        let cache = PresenceCache::new();
        cache.join(G, "Carol", "#000001");
        cache.join(G, "Alice", "#000002");
        cache.join(G, "Bob", "#000003");

        let names: Vec<_> = cache.list(G).into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
    }

    #[test]
    fn test_normalize_color() {
        assert_eq!(normalize_color("#ff0000").as_deref(), Some("#c80000"));
        assert_eq!(normalize_color("#0A0b0C").as_deref(), Some("#0a0b0c"));
        assert_eq!(normalize_color("#c8c8c8").as_deref(), Some("#c8c8c8"));
        assert_eq!(normalize_color("red"), None);
        assert_eq!(normalize_color("#12345"), None);
        assert_eq!(normalize_color("#gg0000"), None);
    }

    #[test]
    fn test_random_color_from_palette() {
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..20 {
            let color = random_color(&mut rng);
            assert!(normalize_color(&color).as_deref() == Some(color.as_str()));
        }
    }
}
