//! Tabletop HTTP Server
//!
//! Serves the shared battlemap sync protocol over plain HTTP polling.
//!
//! ## Protocol
//!
//! Every client polls `POST /{host}/{slug}/update` with its local token
//! changes and the cursor from its previous poll:
//! ```json
//! { "player": "Alice", "cursor": 0, "scene_id": 3, "selected": [7],
//!   "changes": [{ "id": 7, "posx": 10, "posy": 20, "zorder": 1, "size": 20,
//!                 "rotate": 0.0, "flipx": false, "locked": false }] }
//! ```
//! and receives the tokens changed since that cursor, recent dice rolls, who
//! is present and what each participant has selected.

pub mod config;
pub mod error;
pub mod images;
pub mod routes;

pub use config::ServerConfig;
pub use error::ApiError;
pub use images::DiskImages;
pub use routes::build_router;

use std::sync::Arc;
use tabletop_core::{MemoryStore, StoreResult, SyncEngine};

/// Engine type served by this binary.
pub type Engine = SyncEngine<MemoryStore, DiskImages>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

impl AppState {
    /// Build the engine described by `config`.
    pub fn new(config: &ServerConfig) -> StoreResult<Self> {
        let images = DiskImages::new(config.image_dir())?;
        let engine = SyncEngine::with_config(MemoryStore::new(), images, config.engine());
        Ok(Self {
            engine: Arc::new(engine),
        })
    }
}
