use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::{HeaderMap, Method},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use herald_shared::{ChatId, Content, PostId, SettingField, Surface, UserId, UserSettings};
use herald_store::Post;

use crate::auth::{ConnectOutcome, Resolution, Verifier};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::fanout::{FanOut, FanOutReport, RepostReport, RetractReport};
use crate::report;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub verifier: Arc<Verifier>,
    pub fanout: Arc<FanOut>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let protected = Router::new()
        .route(
            "/users/:user/connections",
            post(connect).get(resolve).delete(disconnect_all),
        )
        .route("/users/:user/connections/:chat", delete(disconnect))
        .route(
            "/users/:user/settings",
            get(get_settings).patch(update_setting).delete(reset_settings),
        )
        .route("/users/:user/posts", get(list_posts))
        .route("/posts", post(distribute))
        .route("/posts/drafts", post(draft))
        .route("/posts/:post_id", get(get_post).delete(retract))
        .route("/posts/:post_id/send", post(send))
        .route("/posts/:post_id/repost", post(repost))
        .route("/posts/:post_id/edit", post(edit))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            require_token,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected)
        .layer(GlobalConcurrencyLimitLayer::new(
            state.config.max_concurrent_actions,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct ConnectRequest {
    chats: Vec<ChatId>,
}

#[derive(Serialize)]
struct ConnectResponse {
    outcomes: Vec<ConnectOutcome>,
}

#[derive(Serialize)]
struct ResolutionResponse {
    resolution: Resolution,
    message: String,
}

#[derive(Deserialize)]
struct SettingUpdate {
    field: String,
    /// Absent means flip the current value.
    #[serde(default)]
    value: Option<bool>,
}

/// Body of every fan-out action.
#[derive(Deserialize)]
struct ActionRequest {
    author: UserId,
    #[serde(default)]
    surface: Surface,
    content: Content,
}

#[derive(Deserialize)]
struct DraftRequest {
    author: UserId,
    content: Content,
}

#[derive(Serialize)]
struct DraftResponse {
    post: Post,
    summary: String,
}

#[derive(Deserialize)]
struct SendRequest {
    author: UserId,
    #[serde(default)]
    surface: Surface,
}

/// Repost body. Without `content` the stored content is sent again.
#[derive(Deserialize)]
struct RepostRequest {
    author: UserId,
    #[serde(default)]
    surface: Surface,
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Deserialize)]
struct AuthorQuery {
    author: UserId,
    #[serde(default)]
    chat: Option<ChatId>,
}

/// Either the action ran, or destination resolution stopped it.
#[derive(Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
enum ActionResponse<T: Serialize> {
    Done { report: T, summary: String },
    Unresolved { resolution: Resolution, message: String },
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

fn verify_api_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ServerError> {
    let Some(ref expected) = config.api_token else {
        return Err(ServerError::Forbidden(
            "API is disabled (no API_TOKEN configured)".into(),
        ));
    };

    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    use subtle::ConstantTimeEq;
    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return Err(ServerError::Unauthorized);
    }

    Ok(())
}

async fn require_token(
    State(config): State<Arc<ServerConfig>>,
    req: Request,
    next: Next,
) -> Result<Response, ServerError> {
    verify_api_token(req.headers(), &config)?;
    Ok(next.run(req).await)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn connect(
    State(state): State<AppState>,
    Path(user): Path<UserId>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<ConnectResponse>, ServerError> {
    if req.chats.is_empty() {
        return Err(ServerError::BadRequest("no chats given".into()));
    }
    let outcomes = state.verifier.connect(user, &req.chats).await?;
    Ok(Json(ConnectResponse { outcomes }))
}

async fn resolve(
    State(state): State<AppState>,
    Path(user): Path<UserId>,
) -> Result<Json<ResolutionResponse>, ServerError> {
    let resolution = state
        .verifier
        .resolve_authorized_destinations(Surface::Private, user)
        .await?;
    Ok(Json(ResolutionResponse {
        message: resolution.message(),
        resolution,
    }))
}

async fn disconnect(
    State(state): State<AppState>,
    Path((user, chat)): Path<(UserId, ChatId)>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let removed = state.store.remove_connection(user, chat).await?;
    info!(user = %user, chat = %chat, removed, "Disconnect requested");
    Ok(Json(serde_json::json!({ "removed": removed })))
}

async fn disconnect_all(
    State(state): State<AppState>,
    Path(user): Path<UserId>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let removed = state.store.clear_connections(user).await?;
    info!(user = %user, removed, "Disconnected all chats");
    Ok(Json(serde_json::json!({ "removed": removed })))
}

async fn get_settings(State(state): State<AppState>, Path(user): Path<UserId>) -> Json<UserSettings> {
    Json(state.store.settings(user).await)
}

async fn update_setting(
    State(state): State<AppState>,
    Path(user): Path<UserId>,
    Json(req): Json<SettingUpdate>,
) -> Result<Json<UserSettings>, ServerError> {
    let field: SettingField = req.field.parse()?;
    let current = state.store.settings(user).await;
    let value = req.value.unwrap_or(!current.get(field));
    state.store.update_setting(user, field, value).await?;

    let mut updated = current;
    updated.set(field, value);
    Ok(Json(updated))
}

async fn reset_settings(
    State(state): State<AppState>,
    Path(user): Path<UserId>,
) -> Result<Json<UserSettings>, ServerError> {
    state.store.reset_settings(user).await?;
    Ok(Json(UserSettings::default()))
}

async fn list_posts(
    State(state): State<AppState>,
    Path(user): Path<UserId>,
) -> Result<Json<Vec<Post>>, ServerError> {
    Ok(Json(state.store.posts_by_author(user).await?))
}

async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<PostId>,
) -> Result<Json<Post>, ServerError> {
    state
        .store
        .post(post_id.clone())
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::PostNotFound(post_id.to_string()))
}

/// Resolve the destinations for an action, or explain why there are none.
async fn destinations(
    state: &AppState,
    surface: Surface,
    author: UserId,
) -> Result<Result<Vec<ChatId>, Resolution>, ServerError> {
    let resolution = state
        .verifier
        .resolve_authorized_destinations(surface, author)
        .await?;
    Ok(match resolution.destinations() {
        Some(chats) => Ok(chats.to_vec()),
        None => Err(resolution),
    })
}

fn unresolved<T: Serialize>(resolution: Resolution) -> Json<ActionResponse<T>> {
    Json(ActionResponse::Unresolved {
        message: resolution.message(),
        resolution,
    })
}

async fn distribute(
    State(state): State<AppState>,
    Json(req): Json<ActionRequest>,
) -> Result<Json<ActionResponse<FanOutReport>>, ServerError> {
    let chats = match destinations(&state, req.surface, req.author).await? {
        Ok(chats) => chats,
        Err(resolution) => return Ok(unresolved(resolution)),
    };
    let settings = state.store.settings(req.author).await;
    let report = state
        .fanout
        .distribute(req.author, &chats, &req.content, &settings)
        .await?;
    Ok(Json(ActionResponse::Done {
        summary: report::distribute_summary(&report),
        report,
    }))
}

async fn draft(
    State(state): State<AppState>,
    Json(req): Json<DraftRequest>,
) -> Result<Json<DraftResponse>, ServerError> {
    let post = state.fanout.draft(req.author, &req.content).await?;
    Ok(Json(DraftResponse {
        summary: report::draft_summary(&post),
        post,
    }))
}

async fn send(
    State(state): State<AppState>,
    Path(post_id): Path<PostId>,
    Json(req): Json<SendRequest>,
) -> Result<Json<ActionResponse<FanOutReport>>, ServerError> {
    let chats = match destinations(&state, req.surface, req.author).await? {
        Ok(chats) => chats,
        Err(resolution) => return Ok(unresolved(resolution)),
    };
    let settings = state.store.settings(req.author).await;
    let report = state
        .fanout
        .send(req.author, &post_id, &chats, &settings)
        .await?;
    Ok(Json(ActionResponse::Done {
        summary: report::distribute_summary(&report),
        report,
    }))
}

async fn retract(
    State(state): State<AppState>,
    Path(post_id): Path<PostId>,
    Query(query): Query<AuthorQuery>,
) -> Result<Json<ActionResponse<RetractReport>>, ServerError> {
    let surface = query.chat.map(Surface::Chat).unwrap_or_default();
    if let Err(resolution) = destinations(&state, surface, query.author).await? {
        return Ok(unresolved(resolution));
    }
    let report = state.fanout.retract(query.author, &post_id).await?;
    Ok(Json(ActionResponse::Done {
        summary: report::retract_summary(&report),
        report,
    }))
}

async fn repost(
    State(state): State<AppState>,
    Path(post_id): Path<PostId>,
    Json(req): Json<RepostRequest>,
) -> Result<Json<ActionResponse<RepostReport>>, ServerError> {
    let chats = match destinations(&state, req.surface, req.author).await? {
        Ok(chats) => chats,
        Err(resolution) => return Ok(unresolved(resolution)),
    };
    let settings = state.store.settings(req.author).await;
    let report = state
        .fanout
        .repost(req.author, &post_id, &chats, req.content.as_ref(), &settings)
        .await?;
    Ok(Json(ActionResponse::Done {
        summary: report::repost_summary(&report),
        report,
    }))
}

async fn edit(
    State(state): State<AppState>,
    Path(post_id): Path<PostId>,
    Json(req): Json<ActionRequest>,
) -> Result<Json<ActionResponse<FanOutReport>>, ServerError> {
    let chats = match destinations(&state, req.surface, req.author).await? {
        Ok(chats) => chats,
        Err(resolution) => return Ok(unresolved(resolution)),
    };
    let settings = state.store.settings(req.author).await;
    let report = state
        .fanout
        .mutate(req.author, &post_id, &chats, &req.content, &settings)
        .await?;
    Ok(Json(ActionResponse::Done {
        summary: report::edit_summary(&report),
        report,
    }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
