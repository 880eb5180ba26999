//! HTTP gateway.
//!
//! Every route is `POST` with a JSON body and requires
//! `Authorization: Bearer <token>`. Requests that fail authentication are
//! answered with 401 before any proxy logic runs.

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use scalegate::{ProxyError, ScaleProxy, session_message, status_message};
use scalegate_common::ErrorKind;
use scalegate_tools::{KillSessionParams, QueryApiParams, RunApiParams};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use subtle::ConstantTimeEq;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::error::Result;

/// Shared handler state.
#[derive(Clone)]
struct AppState {
    proxy: Arc<ScaleProxy>,
}

/// The expected inbound bearer token.
#[derive(Clone)]
struct BearerAuth {
    token: Arc<SecretString>,
}

/// Builds the gateway router.
#[must_use]
pub fn router(proxy: Arc<ScaleProxy>, token: SecretString) -> Router {
    let auth = BearerAuth {
        token: Arc::new(token),
    };

    Router::new()
        .route("/run_api", post(run_api))
        .route("/query_api", post(query_api))
        .route("/generate_session", post(generate_session))
        .route("/get_session", post(get_session))
        .route("/kill_session", post(kill_session))
        .route_layer(middleware::from_fn_with_state(auth, require_bearer))
        .with_state(AppState { proxy })
}

/// Serves `app` on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the listener fails.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    info!(addr = ?listener.local_addr().ok(), "HTTP gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn require_bearer(State(auth): State<BearerAuth>, request: Request, next: Next) -> Response {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token);

    let authorized = presented.is_some_and(|token| {
        token
            .as_bytes()
            .ct_eq(auth.token.expose_secret().as_bytes())
            .into()
    });

    if !authorized {
        warn!(path = %request.uri().path(), "Rejected request with invalid bearer token");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Invalid bearer token"})),
        )
            .into_response();
    }

    next.run(request).await
}

/// Handler failure rendered as a JSON response.
enum ApiError {
    Proxy(ProxyError),
    BadRequest(String),
}

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        Self::Proxy(err)
    }
}

/// HTTP status for a proxy failure.
const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NoSession | ErrorKind::StaleSession => StatusCode::CONFLICT,
        ErrorKind::InvalidPath | ErrorKind::InvalidMethod | ErrorKind::InvalidRequest => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Proxy(err) => {
                warn!(kind = %err.kind(), "{err}");
                (status_for(err.kind()), Json(err.to_json())).into_response()
            }
            Self::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": message,
                    "kind": ErrorKind::InvalidRequest,
                })),
            )
                .into_response(),
        }
    }
}

/// Decodes a JSON body. An empty body counts as `{}`.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> std::result::Result<T, ApiError> {
    let bytes: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };
    serde_json::from_slice(bytes)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))
}

type ApiResult = std::result::Result<Json<Value>, ApiError>;

#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
async fn run_api(State(state): State<AppState>, body: Bytes) -> ApiResult {
    let params: RunApiParams = parse_body(&body)?;
    info!(method = %params.method, path = %params.query, "run_api");
    let value = state
        .proxy
        .run_api(&params.query, &params.method, params.payload, params.params)
        .await?;
    Ok(Json(value))
}

#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
async fn query_api(State(state): State<AppState>, body: Bytes) -> ApiResult {
    let params: QueryApiParams = parse_body(&body)?;
    info!(path = %params.query, "query_api");
    Ok(Json(state.proxy.query_api(&params.query).await?))
}

#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
async fn generate_session(State(state): State<AppState>) -> ApiResult {
    let generated = state.proxy.generate_session().await?;
    info!("Session generated");
    Ok(Json(session_message(&generated, &generated.session_id)))
}

#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
async fn get_session(State(state): State<AppState>) -> ApiResult {
    let status = state.proxy.get_session().await?;
    Ok(Json(status_message(&status)))
}

#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
async fn kill_session(State(state): State<AppState>, body: Bytes) -> ApiResult {
    let params: KillSessionParams = parse_body(&body)?;
    let killed = state
        .proxy
        .kill_session(params.session_id.as_deref())
        .await?;
    info!("Session killed");
    Ok(Json(session_message(&killed, &killed.session_id)))
}
