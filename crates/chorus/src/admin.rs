// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Administrative HTTP surface.
//!
//! A thin axum layer over [`SessionRegistry`]: start and stop account
//! sessions, send a message by hand, and feed login input to a waiting
//! handshake. Account records themselves are managed elsewhere.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self as axum_middleware, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chorus_agent::{SessionRegistry, SessionSnapshot};
use chorus_config::AdminConfig;
use chorus_core::{AccountId, AdminStore, ChorusError};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state for the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<dyn SessionRegistry>,
    pub store: Arc<dyn AdminStore>,
}

#[derive(Clone)]
struct BearerToken(Arc<str>);

#[derive(Debug, Deserialize)]
struct SendRequest {
    text: String,
}

#[derive(Debug, Serialize)]
struct SendResponse {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct CodeRequest {
    code: String,
}

#[derive(Deserialize)]
struct PasswordRequest {
    password: String,
}

#[derive(Debug, Serialize)]
struct HandshakeResponse {
    account_id: AccountId,
    phase: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// A `ChorusError` rendered as an HTTP response.
struct ApiError(ChorusError);

impl From<ChorusError> for ApiError {
    fn from(err: ChorusError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ChorusError::NotFound { .. } | ChorusError::SessionNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ChorusError::SubmissionTimeout { .. } => StatusCode::CONFLICT,
            ChorusError::Config(_) => StatusCode::BAD_REQUEST,
            ChorusError::Transport { .. }
            | ChorusError::RetriesExhausted { .. }
            | ChorusError::AddressResolution { .. }
            | ChorusError::Timeout { .. } => StatusCode::BAD_GATEWAY,
            ChorusError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %self.0, "admin request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Build the admin router. With `api_token` set, every `/v1` route requires it
/// as a bearer token; `/health` stays public.
pub fn router(state: AdminState, api_token: Option<String>) -> Router {
    let mut api = Router::new()
        .route(
            "/v1/accounts/{account_id}/session",
            post(start_session).delete(stop_session).get(get_session),
        )
        .route(
            "/v1/accounts/{account_id}/conversations/{conversation_id}/messages",
            post(send_message),
        )
        .route("/v1/accounts/{account_id}/handshake", get(get_handshake))
        .route("/v1/accounts/{account_id}/handshake/code", post(submit_code))
        .route(
            "/v1/accounts/{account_id}/handshake/password",
            post(submit_password),
        );

    if let Some(token) = api_token {
        api = api.route_layer(axum_middleware::from_fn_with_state(
            BearerToken(token.into()),
            require_bearer,
        ));
    }

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve the admin router until `shutdown` fires.
pub async fn serve(
    config: &AdminConfig,
    state: AdminState,
    shutdown: CancellationToken,
) -> Result<(), ChorusError> {
    let app = router(state, config.api_token.clone());
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ChorusError::Internal(format!("failed to bind admin surface to {addr}: {e}")))?;

    info!("admin surface listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ChorusError::Internal(format!("admin server error: {e}")))
}

async fn require_bearer(
    State(expected): State<BearerToken>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == &*expected.0 => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn start_session(
    State(state): State<AdminState>,
    Path(account_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let account = state
        .store
        .get_account(AccountId(account_id))
        .await?
        .ok_or(ChorusError::NotFound {
            entity: "account",
            id: account_id,
        })?;
    state.registry.add_client(account).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn stop_session(
    State(state): State<AdminState>,
    Path(account_id): Path<i64>,
) -> StatusCode {
    state.registry.remove_client(AccountId(account_id)).await;
    StatusCode::NO_CONTENT
}

async fn get_session(
    State(state): State<AdminState>,
    Path(account_id): Path<i64>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let account_id = AccountId(account_id);
    state
        .registry
        .session_snapshot(account_id)
        .await
        .map(Json)
        .ok_or(ApiError(ChorusError::SessionNotFound(account_id)))
}

async fn send_message(
    State(state): State<AdminState>,
    Path((account_id, conversation_id)): Path<(i64, i64)>,
    Json(body): Json<SendRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    if body.text.trim().is_empty() {
        return Err(ChorusError::Config("message text must not be empty".into()).into());
    }
    let message_id = state
        .registry
        .send_message_to_group(AccountId(account_id), conversation_id, &body.text)
        .await?;
    Ok(Json(SendResponse {
        message_id: message_id.0,
    }))
}

async fn get_handshake(
    State(state): State<AdminState>,
    Path(account_id): Path<i64>,
) -> Result<Json<HandshakeResponse>, ApiError> {
    let account_id = AccountId(account_id);
    let handshake = state
        .registry
        .auth_handshake(account_id)
        .await
        .ok_or(ChorusError::SessionNotFound(account_id))?;
    Ok(Json(HandshakeResponse {
        account_id,
        phase: handshake.phase().to_string(),
    }))
}

async fn submit_code(
    State(state): State<AdminState>,
    Path(account_id): Path<i64>,
    Json(body): Json<CodeRequest>,
) -> Result<StatusCode, ApiError> {
    let account_id = AccountId(account_id);
    let handshake = state
        .registry
        .auth_handshake(account_id)
        .await
        .ok_or(ChorusError::SessionNotFound(account_id))?;
    handshake.submit_code(body.code.trim()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn submit_password(
    State(state): State<AdminState>,
    Path(account_id): Path<i64>,
    Json(body): Json<PasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let account_id = AccountId(account_id);
    let handshake = state
        .registry
        .auth_handshake(account_id)
        .await
        .ok_or(ChorusError::SessionNotFound(account_id))?;
    handshake
        .submit_password(SecretString::from(body.password))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request as HttpRequest};
    use chorus_agent::AuthHandshake;
    use chorus_config::HandshakeConfig;
    use chorus_core::{AccountConfig, AccountStatus, MessageId};
    use chorus_test_utils::{MemoryStore, fixtures};
    use tower::ServiceExt;

    use super::*;

    #[derive(Default)]
    struct FakeRegistry {
        added: Mutex<Vec<AccountId>>,
        removed: Mutex<Vec<AccountId>>,
        handshake: Option<Arc<AuthHandshake>>,
    }

    #[async_trait]
    impl SessionRegistry for FakeRegistry {
        async fn add_client(&self, account: AccountConfig) -> Result<(), ChorusError> {
            self.added.lock().unwrap().push(account.id);
            Ok(())
        }

        async fn remove_client(&self, account_id: AccountId) {
            self.removed.lock().unwrap().push(account_id);
        }

        async fn send_message_to_group(
            &self,
            account_id: AccountId,
            conversation_id: i64,
            _text: &str,
        ) -> Result<MessageId, ChorusError> {
            match (account_id.0, conversation_id) {
                (1, 10) => Ok(MessageId(4242)),
                (1, _) => Err(ChorusError::NotFound {
                    entity: "conversation",
                    id: conversation_id,
                }),
                _ => Err(ChorusError::SessionNotFound(account_id)),
            }
        }

        async fn auth_handshake(&self, account_id: AccountId) -> Option<Arc<AuthHandshake>> {
            self.handshake
                .clone()
                .filter(|h| h.account_id() == account_id)
        }

        async fn session_snapshot(&self, account_id: AccountId) -> Option<SessionSnapshot> {
            (account_id.0 == 1).then(|| SessionSnapshot {
                account_id,
                status: AccountStatus::Online,
                connected: true,
                handshake: "completed".into(),
            })
        }
    }

    async fn setup(token: Option<&str>) -> (Router, Arc<FakeRegistry>) {
        let store = Arc::new(MemoryStore::new());
        store.add_account(fixtures::account("+15550001")).await;

        let handshake = AuthHandshake::new(
            AccountId(1),
            "+15550001",
            Arc::clone(&store) as Arc<dyn AdminStore>,
            &HandshakeConfig {
                input_timeout_secs: 300,
                submit_timeout_secs: 1,
            },
            CancellationToken::new(),
        );
        let registry = Arc::new(FakeRegistry {
            handshake: Some(Arc::new(handshake)),
            ..FakeRegistry::default()
        });
        let state = AdminState {
            registry: Arc::clone(&registry) as Arc<dyn SessionRegistry>,
            store: store as Arc<dyn AdminStore>,
        };
        (router(state, token.map(str::to_string)), registry)
    }

    fn request(method: Method, uri: &str, body: Option<serde_json::Value>) -> HttpRequest<Body> {
        let builder = HttpRequest::builder().method(method).uri(uri);
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public_even_with_a_token() {
        let (app, _) = setup(Some("secret")).await;
        let response = app
            .oneshot(request(Method::GET, "/health", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn api_routes_require_the_bearer_token() {
        let (app, _) = setup(Some("secret")).await;

        let denied = app
            .clone()
            .oneshot(request(Method::GET, "/v1/accounts/1/session", None))
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let mut authorized = request(Method::GET, "/v1/accounts/1/session", None);
        authorized
            .headers_mut()
            .insert("authorization", "Bearer secret".parse().unwrap());
        let response = app.oneshot(authorized).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "online");
        assert_eq!(body["connected"], true);
    }

    #[tokio::test]
    async fn starting_a_session_loads_the_account_from_the_store() {
        let (app, registry) = setup(None).await;

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/v1/accounts/1/session", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(*registry.added.lock().unwrap(), vec![AccountId(1)]);

        let missing = app
            .oneshot(request(Method::POST, "/v1/accounts/99/session", None))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stopping_a_session_removes_the_client() {
        let (app, registry) = setup(None).await;
        let response = app
            .oneshot(request(Method::DELETE, "/v1/accounts/3/session", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(*registry.removed.lock().unwrap(), vec![AccountId(3)]);
    }

    #[tokio::test]
    async fn manual_send_returns_the_message_id() {
        let (app, _) = setup(None).await;
        let response = app
            .oneshot(request(
                Method::POST,
                "/v1/accounts/1/conversations/10/messages",
                Some(serde_json::json!({ "text": "hello" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["message_id"], 4242);
    }

    #[tokio::test]
    async fn manual_send_maps_missing_targets_to_not_found() {
        let (app, _) = setup(None).await;
        for uri in [
            "/v1/accounts/2/conversations/10/messages",
            "/v1/accounts/1/conversations/11/messages",
        ] {
            let response = app
                .clone()
                .oneshot(request(
                    Method::POST,
                    uri,
                    Some(serde_json::json!({ "text": "hello" })),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn blank_manual_send_is_rejected() {
        let (app, _) = setup(None).await;
        let response = app
            .oneshot(request(
                Method::POST,
                "/v1/accounts/1/conversations/10/messages",
                Some(serde_json::json!({ "text": "   " })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn handshake_phase_is_reported() {
        let (app, _) = setup(None).await;
        let response = app
            .oneshot(request(Method::GET, "/v1/accounts/1/handshake", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["phase"], "unauthenticated");
    }

    #[tokio::test(start_paused = true)]
    async fn code_without_a_waiting_login_conflicts() {
        let (app, _) = setup(None).await;
        let response = app
            .oneshot(request(
                Method::POST,
                "/v1/accounts/1/handshake/code",
                Some(serde_json::json!({ "code": "12345" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn handshake_input_for_unknown_session_is_not_found() {
        let (app, _) = setup(None).await;
        let response = app
            .oneshot(request(
                Method::POST,
                "/v1/accounts/7/handshake/password",
                Some(serde_json::json!({ "password": "hunter2" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
