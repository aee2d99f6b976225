use crate::config::MAX_EVENT_BYTES;
use crate::error::ReconcileError;
use crate::gateway::auth::authorize_request;
use crate::gateway::server::GatewayState;
use crate::reconcile::LifecycleEvent;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Json, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, Instrument};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build all routes for the gateway.
pub fn build_routes(state: GatewayState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/events", post(events_handler))
        .layer(DefaultBodyLimit::max(MAX_EVENT_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime: u64,
}

async fn health_handler(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let uptime = state.start_time.elapsed().as_secs();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: state.version.clone(),
        uptime,
    })
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// An error response in the gateway's JSON envelope.
pub struct ApiError {
    status: StatusCode,
    code: String,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        Self::new(status_for(&err), err.code(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// HTTP status for a reconcile failure.
pub fn status_for(err: &ReconcileError) -> StatusCode {
    match err {
        ReconcileError::Validation(_) => StatusCode::BAD_REQUEST,
        ReconcileError::NotFound { .. } => StatusCode::NOT_FOUND,
        ReconcileError::AlreadyExists { .. } => StatusCode::CONFLICT,
        ReconcileError::EvictionInvariantViolation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        ReconcileError::Provider(_) | ReconcileError::Secret(_) => StatusCode::BAD_GATEWAY,
    }
}

async fn events_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Result<Json<LifecycleEvent>, JsonRejection>,
) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = info_span!("event_request", %request_id);

    let mut response = async {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let auth = authorize_request(state.token.as_deref(), authorization);
        if !auth.is_allowed() {
            let message = match auth {
                crate::gateway::GatewayAuthResult::Rejected(reason) => reason,
                _ => "Unauthorized",
            };
            return ApiError::new(StatusCode::UNAUTHORIZED, "Unauthorized", message).into_response();
        }

        let event = match body {
            Ok(Json(event)) => event,
            Err(rejection) => {
                let status = match rejection.status() {
                    StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
                    _ => StatusCode::BAD_REQUEST,
                };
                return ApiError::new(status, "ValidationError", rejection.body_text()).into_response();
            }
        };

        info!(request_type = %event.request_type, "Received lifecycle event");
        match state.dispatcher.handle_event(&event).await {
            Ok(response) => (StatusCode::OK, Json(response)).into_response(),
            Err(err) => ApiError::from(err).into_response(),
        }
    }
    .instrument(span)
    .await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
