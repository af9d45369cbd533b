//! Append-only dice roll log.

use crate::clock::Stamp;
use crate::error::{SyncError, SyncResult};
use crate::model::{GameId, Roll, RollId};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Roll a die with `sides` faces. Uniform over `1..=sides`.
pub fn roll_die(rng: &mut fastrand::Rng, sides: i64) -> SyncResult<u32> {
    let sides = validate_sides(sides)?;
    Ok(rng.u32(1..=sides))
}

fn validate_sides(sides: i64) -> SyncResult<u32> {
    u32::try_from(sides)
        .ok()
        .filter(|&s| s > 0)
        .ok_or_else(|| SyncError::InvalidArgument(format!("die sides must be positive, got {}", sides)))
}

/// Per-game roll history ordered by stamp.
#[derive(Debug, Default)]
pub struct RollLog {
    games: DashMap<GameId, Vec<Roll>>,
    next_id: AtomicU64,
}

impl RollLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a roll. `result` must lie in `1..=sides`.
    pub fn append(
        &self,
        game: GameId,
        player: &str,
        sides: i64,
        result: u32,
        stamp: Stamp,
    ) -> SyncResult<Roll> {
        let sides = validate_sides(sides)?;
        if result == 0 || result > sides {
            return Err(SyncError::InvalidArgument(format!(
                "result {} out of range for d{}",
                result, sides
            )));
        }

        let roll = Roll {
            id: RollId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1),
            game,
            player: player.to_string(),
            sides,
            result,
            stamp,
        };

        let mut rolls = self.games.entry(game).or_default();
        let at = rolls.partition_point(|r| r.stamp <= stamp);
        rolls.insert(at, roll.clone());
        Ok(roll)
    }

    /// Rolls with `stamp >= since`, oldest first.
    pub fn query(&self, game: GameId, since: Stamp) -> Vec<Roll> {
        self.games
            .get(&game)
            .map(|rolls| {
                let start = rolls.partition_point(|r| r.stamp < since);
                rolls[start..].to_vec()
            })
            .unwrap_or_default()
    }

    /// Forget a game's history.
    pub fn drop_game(&self, game: GameId) {
        self.games.remove(&game);
    }
}
