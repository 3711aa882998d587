//! HTTP mapping for flow errors

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// A flow error on its way out of a JSON handler.
///
/// Client faults become 400 (404 for missing credentials), upstream faults
/// 502, store faults 500. The body is `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub hubspot_flow::Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            hubspot_flow::Error::NotFound(_) => StatusCode::NOT_FOUND,
            hubspot_flow::Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<hubspot_flow::Error> for ApiError {
    fn from(err: hubspot_flow::Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "detail": public_detail(&self.0) }))).into_response()
    }
}

/// Message safe to show the caller. Store faults may carry backend details.
pub fn public_detail(err: &hubspot_flow::Error) -> String {
    match err {
        hubspot_flow::Error::Store(_) => "session store unavailable".to_string(),
        e => e.to_string(),
    }
}

/// Result alias for JSON handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
