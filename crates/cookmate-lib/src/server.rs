//! HTTP control API for a running narration session.
//!
//! CORS-permissive so a browser recipe page on another port can start
//! narration and push transcripts from its own speech recognition.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

use cookmate_core::navigator::NarrationError;
use cookmate_core::substitutions::substitutes_for;
use cookmate_core::types::{NavigatorStatus, Recipe};

use crate::api::{ApiError, CookmateClient};
use crate::session::NarrationHandle;

#[derive(Clone)]
pub struct ControlState {
    pub narrator: NarrationHandle,
    pub backend: CookmateClient,
}

pub fn router(state: ControlState) -> Router {
    Router::new()
        .route("/narrate/start", post(start))
        .route("/narrate/stop", post(stop))
        .route("/narrate/transcript", post(transcript))
        .route("/status", get(status))
        .route("/substitutes/{ingredient}", get(substitutes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
enum ControlError {
    #[error("request needs either recipeId or recipe")]
    MissingRecipe,

    #[error("recipe {0} not found")]
    RecipeNotFound(String),

    #[error("no substitutions found for {0}")]
    NoSubstitutes(String),

    #[error(transparent)]
    Backend(#[from] ApiError),

    #[error(transparent)]
    Narration(#[from] NarrationError),
}

#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    error: String,
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MissingRecipe => StatusCode::BAD_REQUEST,
            Self::RecipeNotFound(_) | Self::NoSubstitutes(_) => StatusCode::NOT_FOUND,
            Self::Backend(_) => StatusCode::BAD_GATEWAY,
            Self::Narration(NarrationError::EmptyRecipe) => StatusCode::BAD_REQUEST,
            Self::Narration(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = ErrorBody {
            ok: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ─── Handlers ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct OkResponse {
    ok: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest {
    #[serde(default, alias = "recipe_id")]
    recipe_id: Option<String>,
    #[serde(default)]
    recipe: Option<Recipe>,
}

async fn start(
    State(state): State<ControlState>,
    Json(req): Json<StartRequest>,
) -> Result<Json<OkResponse>, ControlError> {
    let recipe = match (req.recipe, req.recipe_id) {
        (Some(recipe), _) => recipe,
        (None, Some(id)) => state.backend.recipe(&id).await.map_err(|e| {
            if e.is_not_found() {
                ControlError::RecipeNotFound(id.clone())
            } else {
                ControlError::Backend(e)
            }
        })?,
        (None, None) => return Err(ControlError::MissingRecipe),
    };

    info!("control: start '{}'", recipe.display_name());
    state.narrator.start(recipe).await?;
    Ok(Json(OkResponse { ok: true }))
}

async fn stop(State(state): State<ControlState>) -> Json<OkResponse> {
    state.narrator.stop();
    Json(OkResponse { ok: true })
}

#[derive(Deserialize)]
struct TranscriptRequest {
    text: String,
}

async fn transcript(
    State(state): State<ControlState>,
    Json(req): Json<TranscriptRequest>,
) -> Json<OkResponse> {
    state.narrator.handle_transcript(&req.text);
    Json(OkResponse { ok: true })
}

async fn status(State(state): State<ControlState>) -> Json<NavigatorStatus> {
    Json(state.narrator.status())
}

#[derive(Serialize)]
struct SubstitutesResponse {
    ingredient: String,
    substitutes: &'static [&'static str],
}

async fn substitutes(
    Path(ingredient): Path<String>,
) -> Result<Json<SubstitutesResponse>, ControlError> {
    let substitutes =
        substitutes_for(&ingredient).ok_or_else(|| ControlError::NoSubstitutes(ingredient.clone()))?;
    Ok(Json(SubstitutesResponse {
        ingredient,
        substitutes,
    }))
}
