use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::HeaderValue,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::{
    catalog::{AVAILABLE_GENRES, AVAILABLE_THEMES},
    config::AppConfig,
    error::ServiceError,
    story::{StoryGenerator, StoryRequest, StoryResponse},
};

#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<StoryGenerator>,
}

#[derive(Debug, Serialize)]
pub struct ThemeGenreList {
    pub themes: Vec<&'static str>,
    pub genres: Vec<&'static str>,
}

pub fn build_router(config: Arc<AppConfig>, generator: Arc<StoryGenerator>) -> Router {
    let cors = cors_layer(config.cors_allowed_origin.as_deref());
    let state = AppState { generator };

    Router::new()
        .route("/health", get(health))
        .route("/themes-genres", get(themes_genres))
        .route("/generate", post(generate))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
        Some(Err(err)) => {
            warn!(%err, "invalid CORS_ALLOWED_ORIGIN, allowing any origin");
            CorsLayer::permissive()
        }
        None => CorsLayer::permissive(),
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn themes_genres() -> Json<ThemeGenreList> {
    Json(ThemeGenreList {
        themes: AVAILABLE_THEMES.to_vec(),
        genres: AVAILABLE_GENRES.to_vec(),
    })
}

async fn generate(
    State(state): State<AppState>,
    Json(request): Json<StoryRequest>,
) -> Result<Json<StoryResponse>, ServiceError> {
    let response = state.generator.clone().respond_async(request).await?;
    Ok(Json(response))
}
