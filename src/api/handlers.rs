//! HTTP request handlers

use super::types::{ErrorResponse, HealthResponse, IntentRequest, IntentResponse, ReplyBody};
use super::AppState;
use crate::engine::{Intent, IntentKind};
use crate::gemini::InlineImage;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine as _;

/// Largest accepted request body. Uploads arrive base64 encoded, so this
/// sits well above the gateway's request size limit.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/intents", post(submit_intent))
        .route("/api/health", get(health))
        .route("/version", get(get_version))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

// ============================================================
// Intents
// ============================================================

async fn submit_intent(
    State(state): State<AppState>,
    Json(req): Json<IntentRequest>,
) -> Result<Json<IntentResponse>, AppError> {
    let intent = build_intent(req)?;
    let mut rx = state.engine.dispatch(intent);

    let mut replies = Vec::new();
    while let Some(reply) = rx.recv().await {
        replies.push(ReplyBody::from(reply));
    }
    Ok(Json(IntentResponse { replies }))
}

fn build_intent(req: IntentRequest) -> Result<Intent, AppError> {
    let user = req.user.trim();
    if user.is_empty() {
        return Err(AppError::BadRequest("user is required".to_string()));
    }

    let image = match req.image_base64 {
        Some(encoded) => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| AppError::BadRequest(format!("image_base64 is not valid base64: {e}")))?;
            let image = InlineImage::sniff(bytes).ok_or_else(|| {
                AppError::BadRequest("Unsupported image format".to_string())
            })?;
            Some(image)
        }
        None => None,
    };
    if req.kind == IntentKind::ImageUpload && image.is_none() {
        return Err(AppError::BadRequest(
            "image_upload requires image_base64".to_string(),
        ));
    }

    let mut intent = Intent::new(user, req.kind, req.text);
    intent.image = image;
    match req.session {
        Some(session) if !session.trim().is_empty() && session.trim() != user => {
            Ok(intent.in_group(session.trim()))
        }
        _ => Ok(intent),
    }
}

// ============================================================
// Status
// ============================================================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        api_key_configured: state.engine.has_api_key(),
        conversations: state.engine.sessions().len().await,
        cached_images: state.engine.cache().len().await,
    })
}

async fn get_version() -> &'static str {
    concat!("gemini-canvas ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
