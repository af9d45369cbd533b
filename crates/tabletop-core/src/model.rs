//! Games, scenes, tokens and rolls.

use crate::clock::Stamp;
use crate::images::ImageRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token size value marking the token as the scene background.
pub const BACKGROUND_SIZE: i32 = -1;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Game identifier.
    GameId
);
record_id!(
    /// Scene identifier.
    SceneId
);
record_id!(
    /// Token identifier.
    TokenId
);
record_id!(
    /// Roll identifier.
    RollId
);

/// A game owned by a host. Owns its scenes; exactly one is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    /// Host (game master) name.
    pub host: String,
    /// URL slug, unique per host.
    pub slug: String,
    /// Scene currently shown to players.
    pub active: SceneId,
}

/// A scene within a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    pub game: GameId,
    /// Token currently acting as backdrop. Non-owning.
    pub backing: Option<TokenId>,
    /// Bumped by uploads, clones, deletes and rolls.
    pub stamp: Stamp,
}

/// A positioned image on a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub scene: SceneId,
    pub url: ImageRef,
    pub posx: i32,
    pub posy: i32,
    /// Render order, back to front.
    pub zorder: i32,
    /// Display size in pixels, or [`BACKGROUND_SIZE`].
    pub size: i32,
    /// Rotation in degrees.
    pub rotate: f64,
    pub flipx: bool,
    pub locked: bool,
    /// Last modification.
    pub stamp: Stamp,
}

impl Token {
    /// Display size of a freshly uploaded token.
    pub const DEFAULT_SIZE: i32 = 20;

    pub fn is_background(&self) -> bool {
        self.size == BACKGROUND_SIZE
    }
}

/// Fields for a token that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewToken {
    pub scene: SceneId,
    pub url: ImageRef,
    pub posx: i32,
    pub posy: i32,
    pub zorder: i32,
    pub size: i32,
    pub rotate: f64,
    pub flipx: bool,
    pub locked: bool,
}

impl NewToken {
    /// Unrotated, unlocked token of default size at `(posx, posy)`.
    pub fn new(scene: SceneId, url: ImageRef, posx: i32, posy: i32) -> Self {
        Self {
            scene,
            url,
            posx,
            posy,
            zorder: 0,
            size: Token::DEFAULT_SIZE,
            rotate: 0.0,
            flipx: false,
            locked: false,
        }
    }

    /// Copy of `token`'s appearance, moved to `(posx, posy)`.
    pub fn cloned_from(token: &Token, posx: i32, posy: i32) -> Self {
        Self {
            scene: token.scene,
            url: token.url.clone(),
            posx,
            posy,
            zorder: token.zorder,
            size: token.size,
            rotate: token.rotate,
            flipx: token.flipx,
            locked: token.locked,
        }
    }

    pub(crate) fn into_token(self, id: TokenId, stamp: Stamp) -> Token {
        Token {
            id,
            scene: self.scene,
            url: self.url,
            posx: self.posx,
            posy: self.posy,
            zorder: self.zorder,
            size: self.size,
            rotate: self.rotate,
            flipx: self.flipx,
            locked: self.locked,
            stamp,
        }
    }
}

/// Absolute token state sent by a client. Applying it twice is a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMutation {
    pub id: TokenId,
    pub posx: i32,
    pub posy: i32,
    pub zorder: i32,
    pub size: i32,
    #[serde(default)]
    pub rotate: f64,
    #[serde(default)]
    pub flipx: bool,
    #[serde(default)]
    pub locked: bool,
}

impl TokenMutation {
    /// Overwrite the mutable fields of `token` and restamp it.
    pub fn apply(&self, token: &mut Token, stamp: Stamp) {
        token.posx = self.posx;
        token.posy = self.posy;
        token.zorder = self.zorder;
        token.size = self.size;
        token.rotate = self.rotate;
        token.flipx = self.flipx;
        token.locked = self.locked;
        token.stamp = stamp;
    }
}

/// A dice roll. Immutable once logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roll {
    pub id: RollId,
    pub game: GameId,
    pub player: String,
    pub sides: u32,
    pub result: u32,
    pub stamp: Stamp,
}

/// Overview of a game for the host's management views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    pub id: GameId,
    pub host: String,
    pub slug: String,
    pub active: SceneId,
    pub scenes: Vec<SceneId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> Token {
        NewToken::new(SceneId(1), ImageRef::from("/token/1/0.png"), 10, 20)
            .into_token(TokenId(7), Stamp(3))
    }

    #[test]
    fn test_new_token_defaults() {
        let token = token();
        assert_eq!(token.size, Token::DEFAULT_SIZE);
        assert!(!token.is_background());
        assert!(!token.locked);
        assert_eq!(token.stamp, Stamp(3));
    }

    #[test]
    fn test_mutation_is_absolute() {
        let mutation = TokenMutation {
            id: TokenId(7),
            posx: 100,
            posy: -40,
            zorder: 3,
            size: BACKGROUND_SIZE,
            rotate: 90.0,
            flipx: true,
            locked: true,
        };

        let mut once = token();
        mutation.apply(&mut once, Stamp(9));
        let mut twice = once.clone();
        mutation.apply(&mut twice, Stamp(9));

        assert_eq!(once, twice);
        assert!(once.is_background());
        assert_eq!((once.posx, once.posy), (100, -40));
    }

    #[test]
    fn test_mutation_rejects_fractional_position() {
        let json = serde_json::json!({
            "id": 1, "posx": 10.5, "posy": 3, "zorder": 0, "size": 20
        });
        assert!(serde_json::from_value::<TokenMutation>(json).is_err());
    }

    #[test]
    fn test_mutation_optional_fields() {
        let json = serde_json::json!({
            "id": 1, "posx": 10, "posy": 3, "zorder": 0, "size": 20
        });
        let mutation: TokenMutation = serde_json::from_value(json).unwrap();
        assert_eq!(mutation.rotate, 0.0);
        assert!(!mutation.flipx);
    }
}
