//! HTTP API for the admin dashboard.
//!
//! Every route except the landing page, health check, signup and login requires an
//! `Authorization: Bearer <token>` header issued by `/admin/login`.

mod handlers;

use crate::error::CampusError;
use crate::orchestrator::Orchestrator;
use crate::store::Admin;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

/// Shared application state.
pub struct AppState {
    pub orchestrator: Orchestrator,
}

/// Build the application router.
pub fn router(orchestrator: Orchestrator) -> Router {
    let state = Arc::new(AppState { orchestrator });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/admin/signup", post(handlers::signup))
        .route("/admin/login", post(handlers::login))
        .route("/chat", get(handlers::chat))
        .route("/chat/stream", get(handlers::chat_stream))
        .route("/chat/history", get(handlers::chat_history))
        .route("/chat/threads", get(handlers::chat_threads))
        .route(
            "/students",
            post(handlers::create_student)
                .get(handlers::get_student)
                .put(handlers::update_student)
                .delete(handlers::delete_student),
        )
        .route("/students/list", get(handlers::list_students))
        .route("/students/activity", post(handlers::record_activity))
        .route("/analytics/total", get(handlers::analytics_total))
        .route("/analytics/by-department", get(handlers::analytics_by_department))
        .route("/analytics/recent", get(handlers::analytics_recent))
        .route("/analytics/active", get(handlers::analytics_active))
        .route("/analytics/dashboard", get(handlers::analytics_dashboard))
        .route("/faq/cafeteria", get(handlers::faq_cafeteria))
        .route("/faq/library", get(handlers::faq_library))
        .route("/faq/events", get(handlers::faq_events))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
    /// Best-effort answer when the agent stopped at its round limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    partial: Option<String>,
}

/// A `CampusError` rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub CampusError);

impl From<CampusError> for ApiError {
    fn from(e: CampusError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CampusError::NotFound(_) => StatusCode::NOT_FOUND,
            CampusError::Conflict(_) => StatusCode::CONFLICT,
            CampusError::Validation(_) | CampusError::ToolNotFound(_) => StatusCode::BAD_REQUEST,
            CampusError::Auth(_) => StatusCode::UNAUTHORIZED,
            CampusError::UpstreamModel(_) => StatusCode::BAD_GATEWAY,
            CampusError::RoundLimitExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        let partial = match &self.0 {
            CampusError::RoundLimitExceeded { partial, .. } => Some(partial.clone()),
            _ => None,
        };
        let body = ErrorResponse {
            error: self.0.to_string(),
            code: self.0.kind(),
            partial,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// The admin authenticated by the request's bearer token.
pub struct CurrentAdmin(pub Admin);

impl FromRequestParts<Arc<AppState>> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| CampusError::Auth("Missing bearer token".to_string()))?;

        let token = bearer_token(header)
            .ok_or_else(|| CampusError::Auth("Malformed authorization header".to_string()))?;

        let admin = state.orchestrator.auth().verify(token).await?;
        Ok(CurrentAdmin(admin))
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
