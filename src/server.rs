use axum::extract::{Form, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::OAuthRelay;
use crate::error::{AppError, Result};
use crate::music::MusicProvider;
use crate::pipeline;
use crate::session::SessionStore;
use crate::storage::UploadStore;
use crate::vibe::VibeProvider;

#[derive(Clone)]
pub struct AppState {
    pub oauth: Arc<OAuthRelay>,
    pub storage: Arc<dyn UploadStore>,
    pub vibe: Arc<dyn VibeProvider>,
    pub music: Arc<dyn MusicProvider>,
    pub sessions: SessionStore,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/upload", post(upload))
        .route("/get_playlist", get(get_playlist))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Moodlist API v0.1.0"
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Redirect the browser to the music provider's consent screen.
async fn login(State(state): State<AppState>) -> Response {
    let url = state.oauth.authorize_url();
    tracing::debug!("Redirecting to authorize endpoint");
    found(&url)
}

/// Receive the authorization code, exchange it, and bounce the browser
/// back to the front-end with the access token.
async fn callback(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response> {
    let code = query.get("code").ok_or(AppError::MissingCode)?;

    let access_token = state.oauth.exchange_code(code).await?;
    tracing::info!("Token exchange succeeded");

    Ok(found(&state.oauth.frontend_redirect(&access_token)))
}

#[derive(Debug, Deserialize)]
struct UploadRequest {
    #[serde(rename = "imagePath")]
    image_path: String,
    #[serde(rename = "accessToken")]
    access_token: String,
}

/// Resolve the uploaded image, extract its vibe, and stash the result
/// under a fresh session token for the playlist call.
async fn upload(
    State(state): State<AppState>,
    Form(request): Form<UploadRequest>,
) -> Result<Json<serde_json::Value>> {
    tracing::debug!("Upload received for key: {}", request.image_path);

    let image_url = state.storage.resolve_upload(&request.image_path).await?;
    let analysis = state.vibe.describe_image(&image_url).await?;

    let session = state
        .sessions
        .insert(image_url, analysis.sample_tracks, request.access_token)
        .await;

    Ok(Json(json!({
        "description": analysis.description,
        "session": session,
    })))
}

#[derive(Debug, Deserialize)]
struct PlaylistQuery {
    session: String,
}

/// Resolve the stashed candidate tracks and assemble the playlist.
async fn get_playlist(
    State(state): State<AppState>,
    Query(query): Query<PlaylistQuery>,
) -> Result<Json<serde_json::Value>> {
    // Parsed by hand so a malformed token gets the same JSON error body
    // as every other failure, not the extractor's plain-text rejection.
    let token = Uuid::parse_str(&query.session)
        .map_err(|_| AppError::NotFound(format!("session {}", query.session)))?;

    let session = state
        .sessions
        .get(&token)
        .await
        .ok_or_else(|| AppError::NotFound(format!("session {}", token)))?;

    let resolved =
        pipeline::resolve_tracks(state.music.as_ref(), session.tracks, &session.access_token)
            .await?;

    let result = pipeline::build_playlist(
        state.music.as_ref(),
        &resolved,
        &session.access_token,
        &session.image_url,
    )
    .await?;

    state.sessions.remove(&token).await;

    Ok(Json(json!({
        "playlist": result.playlist_id,
        "cover_image": result.cover_image_url,
        "user": result.owner_id,
    })))
}
