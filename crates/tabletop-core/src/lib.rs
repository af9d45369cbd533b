//! Tabletop Core Library
//!
//! Scene model and incremental state-synchronization engine for shared
//! battlemaps. Clients poll the [`SyncEngine`] with their local token changes
//! and the last cursor they received, and get back only what changed since.

pub mod clock;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod images;
pub mod model;
pub mod presence;
pub mod rolls;
pub mod store;

pub use clock::{Stamp, VersionClock};
pub use engine::{EngineConfig, RollEvent, SyncEngine, SyncRequest, SyncResponse};
pub use error::{SyncError, SyncResult};
pub use geometry::{position_on_circle, tokens_in_rect};
pub use images::{ImageFormat, ImageRef, ImageStore, MemoryImages, UploadedFile};
pub use model::{
    BACKGROUND_SIZE, Game, GameId, GameSummary, NewToken, Roll, RollId, Scene, SceneId, Token,
    TokenId, TokenMutation,
};
pub use presence::{PlayerInfo, PresenceCache};
pub use rolls::RollLog;
pub use store::{MemoryStore, StoreError, StoreResult, TokenStore};
