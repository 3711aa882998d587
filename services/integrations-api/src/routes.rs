//! HTTP surface for the HubSpot integration
//!
//! Endpoints:
//! - POST /integrations/hubspot/authorize            - start a flow, return the consent URL
//! - GET  /integrations/hubspot/oauth2callback       - provider redirect target
//! - POST /integrations/hubspot/credentials          - one-shot credential retrieval
//! - POST /integrations/hubspot/credentials/archived - durable snapshot from the archive
//! - POST /integrations/hubspot/load                 - list contacts as integration items
//! - GET  /health, GET /metrics

use std::time::Instant;

use axum::extract::{MatchedPath, Query, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use hubspot_auth::TokenBundle;
use hubspot_flow::{CallbackParams, IntegrationItem, OAuthFlow};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tracing::{Instrument, info, info_span, warn};

use crate::error::{ApiError, Result, public_detail};

/// Page served to the consent popup after a successful callback.
const CLOSE_WINDOW_HTML: &str = "<html><script>window.close();</script></html>";

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub flow: OAuthFlow,
    pub started_at: Instant,
    pub prometheus: PrometheusHandle,
}

impl AppState {
    pub fn new(flow: OAuthFlow, prometheus: PrometheusHandle) -> Self {
        Self {
            flow,
            started_at: Instant::now(),
            prometheus,
        }
    }
}

/// Build the router with all routes and shared state.
///
/// Request metrics are recorded per matched route; the concurrency limit
/// caps in-flight requests at `max_connections`.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/integrations/hubspot/authorize", post(authorize))
        .route("/integrations/hubspot/oauth2callback", get(oauth2_callback))
        .route("/integrations/hubspot/credentials", post(credentials))
        .route(
            "/integrations/hubspot/credentials/archived",
            post(archived_credentials),
        )
        .route("/integrations/hubspot/load", post(load_items))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn(track_request))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

/// Attach a request id span and record request metrics.
async fn track_request(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let method = request.method().to_string();
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let span = info_span!("request", %request_id, %method, %route);

    let start = Instant::now();
    let response = next.run(request).instrument(span).await;
    crate::metrics::record_request(
        &route,
        response.status().as_u16(),
        &method,
        start.elapsed().as_secs_f64(),
    );
    response
}

/// Form body identifying the caller.
#[derive(Debug, Deserialize)]
struct IdentityForm {
    user_id: String,
    org_id: String,
}

/// POST /integrations/hubspot/authorize - returns the authorization URL as a JSON string.
async fn authorize(
    State(state): State<AppState>,
    Form(form): Form<IdentityForm>,
) -> Result<Json<String>> {
    let url = state.flow.authorize(&form.user_id, &form.org_id).await?;
    Ok(Json(url))
}

/// GET /integrations/hubspot/oauth2callback - close the popup or explain the rejection.
///
/// Rejections are plain text so the popup shows something readable.
async fn oauth2_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    match state.flow.callback(&params).await {
        Ok(outcome) => {
            info!(org_id = %outcome.org_id, user_id = %outcome.user_id, "callback accepted");
            Html(CLOSE_WINDOW_HTML).into_response()
        }
        Err(e) => {
            let status = if e.is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            warn!(status = status.as_u16(), error = %e, "callback rejected");
            (
                status,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                public_detail(&e),
            )
                .into_response()
        }
    }
}

/// POST /integrations/hubspot/credentials - the token response, readable once.
async fn credentials(
    State(state): State<AppState>,
    Form(form): Form<IdentityForm>,
) -> Result<Json<TokenBundle>> {
    let tokens = state.flow.credentials(&form.user_id, &form.org_id).await?;
    Ok(Json(tokens))
}

/// POST /integrations/hubspot/credentials/archived - the last archived token response.
async fn archived_credentials(
    State(state): State<AppState>,
    Form(form): Form<IdentityForm>,
) -> Result<Json<TokenBundle>> {
    let tokens = state
        .flow
        .archived_credentials(&form.user_id, &form.org_id)
        .await?;
    Ok(Json(tokens))
}

/// Form body for `/load`: the credentials as a JSON string.
#[derive(Debug, Deserialize)]
struct LoadForm {
    credentials: String,
}

/// POST /integrations/hubspot/load - contacts as integration items.
async fn load_items(
    State(state): State<AppState>,
    Form(form): Form<LoadForm>,
) -> Result<Json<Vec<IntegrationItem>>> {
    let tokens: TokenBundle = serde_json::from_str(&form.credentials).map_err(|e| {
        ApiError(hubspot_flow::Error::InvalidCredentials(format!(
            "credentials are not JSON: {e}"
        )))
    })?;
    let items = state.flow.load_items(&tokens).await?;
    Ok(Json(items))
}

/// GET /health - liveness plus a few facts useful when debugging a deployment.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "integration": hubspot_auth::INTEGRATION_NAME,
        "archive_enabled": state.flow.archive_enabled(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

/// GET /metrics - Prometheus text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use common::Secret;
    use hubspot_auth::{ClientConfig, FileArchive};
    use session_store::{MemoryStore, SessionStore, StoreFuture};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    /// PrometheusHandle without installing a global recorder.
    fn test_prometheus_handle() -> PrometheusHandle {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle()
    }

    /// Mock HubSpot: token endpoint issues `at_<code>` for any code, the
    /// contacts endpoint requires `Bearer at_good`.
    async fn start_hubspot_mock() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = axum::Router::new()
            .route(
                "/oauth/v1/token",
                axum::routing::post(|Form(form): Form<HashMap<String, String>>| async move {
                    match form.get("code").map(String::as_str) {
                        Some("bad") | None => {
                            (StatusCode::BAD_REQUEST, "invalid_grant").into_response()
                        }
                        Some(code) => Json(serde_json::json!({
                            "access_token": format!("at_{code}"),
                            "refresh_token": "rt",
                            "expires_in": 1800
                        }))
                        .into_response(),
                    }
                }),
            )
            .route(
                "/crm/v3/objects/contacts",
                axum::routing::get(|headers: axum::http::HeaderMap| async move {
                    let auth = headers
                        .get(header::AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("");
                    if auth != "Bearer at_good" {
                        return (StatusCode::UNAUTHORIZED, "expired").into_response();
                    }
                    Json(serde_json::json!({
                        "results": [
                            {
                                "id": "101",
                                "createdAt": "2024-01-01T00:00:00Z",
                                "updatedAt": "2024-02-01T00:00:00Z",
                                "properties": {"firstname": "Ada", "lastname": "Lovelace"}
                            },
                            {"id": "102", "properties": {"email": "grace@example.com"}}
                        ]
                    }))
                    .into_response()
                }),
            );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn test_flow(base: &str) -> OAuthFlow {
        let mut config = ClientConfig::new(
            "client-id".into(),
            Secret::new("client-secret".to_string()),
            "http://localhost:8000/integrations/hubspot/oauth2callback".into(),
        );
        config.token_url = format!("{base}/oauth/v1/token");
        config.contacts_url = format!("{base}/crm/v3/objects/contacts");
        OAuthFlow::new(config, Arc::new(MemoryStore::new()), reqwest::Client::new()).unwrap()
    }

    async fn test_app() -> Router {
        let base = start_hubspot_mock().await;
        build_router(AppState::new(test_flow(&base), test_prometheus_handle()), 1000)
    }

    fn form_request(uri: &str, body: String) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    fn get_request(uri: &str) -> HttpRequest<Body> {
        HttpRequest::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn query_param(url: &str, name: &str) -> String {
        let query = url.split_once('?').map(|(_, q)| q).unwrap_or("");
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default()
    }

    async fn start_flow(app: &Router, user: &str, org: &str) -> String {
        let response = app
            .clone()
            .oneshot(form_request(
                "/integrations/hubspot/authorize",
                format!("user_id={user}&org_id={org}"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    fn callback_uri(code: &str, state: &str) -> String {
        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("code", code)
            .append_pair("state", state)
            .finish();
        format!("/integrations/hubspot/oauth2callback?{query}")
    }

    #[tokio::test]
    async fn full_flow_over_http() {
        let app = test_app().await;

        let url = start_flow(&app, "user-1", "org-1").await;
        assert!(url.contains("code_challenge_method=S256"));

        let response = app
            .clone()
            .oneshot(get_request(&callback_uri("good", &query_param(&url, "state"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );
        assert_eq!(body_text(response).await, CLOSE_WINDOW_HTML);

        let response = app
            .clone()
            .oneshot(form_request(
                "/integrations/hubspot/credentials",
                "user_id=user-1&org_id=org-1".into(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let tokens: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(tokens["access_token"], "at_good");

        // Single read
        let response = app
            .clone()
            .oneshot(form_request(
                "/integrations/hubspot/credentials",
                "user_id=user-1&org_id=org-1".into(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(body["detail"].as_str().unwrap().contains("no credentials found"));

        // Contacts with the retrieved tokens
        let credentials = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("credentials", &tokens.to_string())
            .finish();
        let response = app
            .oneshot(form_request("/integrations/hubspot/load", credentials))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let items: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        let items = items.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["name"], "Ada Lovelace");
        assert_eq!(items[0]["type"], "Contact");
        assert_eq!(items[1]["name"], "grace@example.com");
    }

    #[tokio::test]
    async fn callback_without_parameters_is_400_text() {
        let app = test_app().await;
        let response = app
            .oneshot(get_request("/integrations/hubspot/oauth2callback"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
        assert!(body_text(response).await.contains("missing parameters"));
    }

    #[tokio::test]
    async fn callback_with_provider_error_shows_description() {
        let app = test_app().await;
        let response = app
            .oneshot(get_request(
                "/integrations/hubspot/oauth2callback?error=access_denied&error_description=User%20said%20no",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("User said no"));
    }

    #[tokio::test]
    async fn callback_with_rejected_code_is_400() {
        let app = test_app().await;
        let url = start_flow(&app, "user-1", "org-1").await;
        let response = app
            .oneshot(get_request(&callback_uri("bad", &query_param(&url, "state"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("failed to exchange code"));
    }

    /// Store whose backend is down; errors carry a connection string.
    struct UnreachableStore;

    impl UnreachableStore {
        fn refused<T>() -> session_store::Result<T> {
            Err(session_store::Error::Unavailable(
                "redis://10.0.0.5:6379 connection refused".into(),
            ))
        }
    }

    impl SessionStore for UnreachableStore {
        fn set<'a>(&'a self, _key: &'a str, _value: Vec<u8>, _ttl: Duration) -> StoreFuture<'a, ()> {
            Box::pin(async { Self::refused::<()>() })
        }

        fn get<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>> {
            Box::pin(async { Self::refused::<Option<Vec<u8>>>() })
        }

        fn delete<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, ()> {
            Box::pin(async { Self::refused::<()>() })
        }
    }

    #[tokio::test]
    async fn callback_store_failure_hides_backend_details() {
        let config = ClientConfig::new(
            "client-id".into(),
            Secret::new("client-secret".to_string()),
            "http://localhost:8000/integrations/hubspot/oauth2callback".into(),
        );
        let flow = OAuthFlow::new(config, Arc::new(UnreachableStore), reqwest::Client::new())
            .unwrap();
        let app = build_router(AppState::new(flow, test_prometheus_handle()), 1000);

        let state = hubspot_auth::FlowState::new("user-1", "org-1").encode();
        let response = app
            .oneshot(get_request(&callback_uri("code", &state)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_text(response).await;
        assert_eq!(body, "session store unavailable");
        assert!(!body.contains("10.0.0.5"), "got: {body}");
    }

    #[tokio::test]
    async fn authorize_with_empty_identity_is_400() {
        let app = test_app().await;
        let response = app
            .oneshot(form_request(
                "/integrations/hubspot/authorize",
                "user_id=&org_id=org".into(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn load_with_expired_token_is_502() {
        let app = test_app().await;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("credentials", r#"{"access_token":"at_stale"}"#)
            .finish();
        let response = app
            .oneshot(form_request("/integrations/hubspot/load", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn load_with_garbage_credentials_is_400() {
        let app = test_app().await;
        let response = app
            .oneshot(form_request(
                "/integrations/hubspot/load",
                "credentials=not-json".into(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let app = test_app().await;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("credentials", r#"{"refresh_token":"rt"}"#)
            .finish();
        let response = app
            .oneshot(form_request("/integrations/hubspot/load", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn archived_credentials_survive_single_read() {
        let dir = tempfile::tempdir().unwrap();
        let base = start_hubspot_mock().await;
        let flow = test_flow(&base).with_archive(Arc::new(FileArchive::new(dir.path())));
        let app = build_router(AppState::new(flow, test_prometheus_handle()), 1000);

        let url = start_flow(&app, "user-1", "org-1").await;
        let response = app
            .clone()
            .oneshot(get_request(&callback_uri("good", &query_param(&url, "state"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(form_request(
                    "/integrations/hubspot/credentials/archived",
                    "user_id=user-1&org_id=org-1".into(),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let tokens: serde_json::Value =
                serde_json::from_str(&body_text(response).await).unwrap();
            assert_eq!(tokens["access_token"], "at_good");
        }
    }

    #[tokio::test]
    async fn archived_credentials_when_disabled_is_404() {
        let app = test_app().await;
        let response = app
            .oneshot(form_request(
                "/integrations/hubspot/credentials/archived",
                "user_id=u&org_id=o".into(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_endpoint_returns_json() {
        let app = test_app().await;
        let response = app.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["integration"], "HubSpot");
        assert_eq!(json["archive_enabled"], false);
        assert!(json["uptime_seconds"].is_u64());
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_prometheus_format() {
        let app = test_app().await;
        let response = app.oneshot(get_request("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/plain"), "got: {content_type}");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = test_app().await;
        let response = app.oneshot(get_request("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
