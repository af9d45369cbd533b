//! HTTP routes.

use crate::error::ApiError;
use crate::{AppState, Engine, ServerConfig};
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tabletop_core::{
    GameId, GameSummary, PlayerInfo, SceneId, SyncError, SyncRequest, SyncResponse, TokenId,
    UploadedFile,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

type ApiResult<T> = Result<T, ApiError>;

/// Host names that would shadow server routes.
const RESERVED_HOSTS: [&str; 3] = ["vtt", "token", "static"];

#[derive(Debug, Deserialize)]
pub struct CreateGameRequest {
    pub host: String,
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlayerRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenIds {
    pub ids: Vec<TokenId>,
}

/// Build the application router.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/vtt/games", post(create_game))
        .route("/vtt/games/{game}", get(game_summary))
        .route("/vtt/games/{game}/delete", post(delete_game))
        .route("/vtt/games/{game}/scenes", post(create_scene))
        .route("/vtt/games/{game}/scenes/{scene}/activate", post(activate_scene))
        .route("/vtt/games/{game}/scenes/{scene}/clone", post(clone_scene))
        .route("/vtt/games/{game}/scenes/{scene}/delete", post(delete_scene))
        .route("/{host}/{slug}/join", post(join))
        .route("/{host}/{slug}/disconnect", post(disconnect))
        .route("/{host}/{slug}/update", post(update))
        .route(
            "/{host}/{slug}/range_query/{x}/{y}/{w}/{h}",
            get(range_query),
        )
        .route("/{host}/{slug}/roll/{sides}", post(roll))
        .route("/{host}/{slug}/upload/{x}/{y}", post(upload))
        .route("/{host}/{slug}/clone/{x}/{y}", post(clone_tokens))
        .route("/{host}/{slug}/delete", post(delete_tokens))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// Run an engine call on the blocking pool.
///
/// The engine takes a per-game lock and may touch the filesystem, so a busy
/// game must never park the async workers serving other games.
async fn blocking<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Engine) -> Result<T, SyncError> + Send + 'static,
    T: Send + 'static,
{
    let engine = Arc::clone(&state.engine);
    let result = tokio::task::spawn_blocking(move || f(engine.as_ref()))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(result?)
}

// --- Host routes ---

async fn create_game(
    State(state): State<AppState>,
    Json(req): Json<CreateGameRequest>,
) -> ApiResult<Json<GameSummary>> {
    if RESERVED_HOSTS.contains(&req.host.trim().to_lowercase().as_str()) {
        return Err(SyncError::InvalidArgument(format!("host name '{}' is reserved", req.host)).into());
    }
    let summary = blocking(&state, move |engine| engine.create_game(&req.host, &req.slug)).await?;
    info!("Game {}/{} created", summary.host, summary.slug);
    Ok(Json(summary))
}

async fn game_summary(
    State(state): State<AppState>,
    Path(game): Path<u64>,
) -> ApiResult<Json<GameSummary>> {
    Ok(Json(
        blocking(&state, move |engine| engine.summary(GameId(game))).await?,
    ))
}

async fn delete_game(
    State(state): State<AppState>,
    Path(game): Path<u64>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |engine| engine.delete_game(GameId(game))).await?;
    info!("Game {} deleted", game);
    Ok(StatusCode::NO_CONTENT)
}

async fn create_scene(
    State(state): State<AppState>,
    Path(game): Path<u64>,
) -> ApiResult<Json<GameSummary>> {
    Ok(Json(
        blocking(&state, move |engine| engine.create_scene(GameId(game))).await?,
    ))
}

async fn activate_scene(
    State(state): State<AppState>,
    Path((game, scene)): Path<(u64, u64)>,
) -> ApiResult<Json<GameSummary>> {
    Ok(Json(
        blocking(&state, move |engine| {
            engine.activate_scene(GameId(game), SceneId(scene))
        })
        .await?,
    ))
}

async fn clone_scene(
    State(state): State<AppState>,
    Path((game, scene)): Path<(u64, u64)>,
) -> ApiResult<Json<GameSummary>> {
    Ok(Json(
        blocking(&state, move |engine| {
            engine.clone_scene(GameId(game), SceneId(scene))
        })
        .await?,
    ))
}

async fn delete_scene(
    State(state): State<AppState>,
    Path((game, scene)): Path<(u64, u64)>,
) -> ApiResult<Json<GameSummary>> {
    Ok(Json(
        blocking(&state, move |engine| {
            engine.delete_scene(GameId(game), SceneId(scene))
        })
        .await?,
    ))
}

// --- Player routes ---

async fn join(
    State(state): State<AppState>,
    Path((host, slug)): Path<(String, String)>,
    Json(req): Json<JoinRequest>,
) -> ApiResult<Json<PlayerInfo>> {
    let player = blocking(&state, move |engine| {
        let game = engine.find_game(&host, &slug)?;
        engine.join(game, &req.name, req.color.as_deref())
    })
    .await?;
    Ok(Json(player))
}

async fn disconnect(
    State(state): State<AppState>,
    Path((host, slug)): Path<(String, String)>,
    Json(req): Json<PlayerRequest>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |engine| {
        let game = engine.find_game(&host, &slug)?;
        engine.leave(game, &req.name)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update(
    State(state): State<AppState>,
    Path((host, slug)): Path<(String, String)>,
    Json(req): Json<SyncRequest>,
) -> ApiResult<Json<SyncResponse>> {
    let (req, response) = blocking(&state, move |engine| {
        let game = engine.find_game(&host, &slug)?;
        let response = engine.sync(game, &req)?;
        Ok((req, response))
    })
    .await?;
    debug!(
        "Sync {}: {} tokens, {} rolls, full={}",
        req.player,
        response.tokens.len(),
        response.rolls.len(),
        response.full
    );
    Ok(Json(response))
}

async fn range_query(
    State(state): State<AppState>,
    Path((host, slug, x, y, w, h)): Path<(String, String, i32, i32, i32, i32)>,
) -> ApiResult<Json<Vec<TokenId>>> {
    let ids = blocking(&state, move |engine| {
        let game = engine.find_game(&host, &slug)?;
        engine.range_query(game, x, y, w, h)
    })
    .await?;
    Ok(Json(ids))
}

async fn roll(
    State(state): State<AppState>,
    Path((host, slug, sides)): Path<(String, String, i64)>,
    Json(req): Json<PlayerRequest>,
) -> ApiResult<StatusCode> {
    let roll = blocking(&state, move |engine| {
        let game = engine.find_game(&host, &slug)?;
        engine.roll(game, &req.name, sides)
    })
    .await?;
    debug!("{} rolled d{}: {}", roll.player, roll.sides, roll.result);
    Ok(StatusCode::NO_CONTENT)
}

async fn upload(
    State(state): State<AppState>,
    Path((host, slug, x, y)): Path<(String, String, i32, i32)>,
    mut multipart: Multipart,
) -> ApiResult<Json<Vec<TokenId>>> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Upload(e.to_string()))?
    {
        if !matches!(field.name(), Some("file[]") | Some("file")) {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Upload(e.to_string()))?;
        files.push(UploadedFile {
            name,
            bytes: bytes.to_vec(),
        });
    }
    if files.is_empty() {
        return Err(ApiError::Upload("no files".to_string()));
    }

    let received = files.len();
    let target = format!("{}/{}", host, slug);
    let ids = blocking(&state, move |engine| {
        let game = engine.find_game(&host, &slug)?;
        engine.upload(game, x, y, &files)
    })
    .await?;
    info!("Uploaded {} of {} files to {}", ids.len(), received, target);
    Ok(Json(ids))
}

async fn clone_tokens(
    State(state): State<AppState>,
    Path((host, slug, x, y)): Path<(String, String, i32, i32)>,
    Json(req): Json<TokenIds>,
) -> ApiResult<Json<Vec<TokenId>>> {
    let ids = blocking(&state, move |engine| {
        let game = engine.find_game(&host, &slug)?;
        engine.clone_tokens(game, x, y, &req.ids)
    })
    .await?;
    Ok(Json(ids))
}

async fn delete_tokens(
    State(state): State<AppState>,
    Path((host, slug)): Path<(String, String)>,
    Json(req): Json<TokenIds>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |engine| {
        let game = engine.find_game(&host, &slug)?;
        engine.delete_tokens(game, &req.ids)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
