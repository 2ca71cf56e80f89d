//! End-to-end tests of `ApiClient`, `SessionManager` and
//! `ConfigSyncController` against an in-process HTTP server that mimics
//! the streamie backend.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use serde_json::{json, Value};

use streamie_core::api::{AuthBackend, ConfigBackend};
use streamie_core::auth::{MemoryTokenStore, TokenStore};
use streamie_core::{
    ApiClient, ApiError, ConfigSyncController, Credentials, DestinationConfig, Platform,
    SessionError, SessionManager, SessionState, StreamConfig, SyncError, SystemClock,
};

#[derive(Default)]
struct ServerState {
    config: Option<Value>,
    revoked: bool,
    issued: Vec<String>,
}

type Shared = Arc<Mutex<ServerState>>;

fn issue_token(username: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let exp = chrono::Utc::now().timestamp() + 3600;
    let payload = URL_SAFE_NO_PAD.encode(json!({"username": username, "exp": exp}).to_string());
    format!("{}.{}.c2ln", header, payload)
}

fn authorized(state: &ServerState, headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    match value.strip_prefix("Bearer ") {
        Some(token) => !state.revoked && state.issued.iter().any(|t| t == token),
        None => false,
    }
}

async fn auth_handler(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    if body["username"] == "alice" && body["password"] == "secret1" {
        let token = issue_token("alice");
        state.lock().issued.push(token.clone());
        Json(json!({ "token": token })).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
    }
}

async fn getconf_handler(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = state.lock();
    if !authorized(&state, &headers) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    match &state.config {
        Some(config) => Json(config.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, "Configuration file not found").into_response(),
    }
}

async fn update_handler(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock();
    if !authorized(&state, &headers) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    state.config = Some(body);
    (StatusCode::OK, "Configuration updated successfully").into_response()
}

async fn spawn_server() -> (String, Shared) {
    let state: Shared = Arc::default();
    let app = Router::new()
        .route("/auth", post(auth_handler))
        .route("/getconf", get(getconf_handler))
        .route("/update", post(update_handler))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), state)
}

fn wire(base_url: &str) -> (Arc<SessionManager>, Arc<ConfigSyncController>, Arc<MemoryTokenStore>) {
    let api = Arc::new(ApiClient::new(base_url).unwrap());
    let store = Arc::new(MemoryTokenStore::new());
    let session = Arc::new(SessionManager::new(
        api.clone(),
        store.clone(),
        Arc::new(SystemClock),
    ));
    let sync = Arc::new(ConfigSyncController::new(session.clone(), api));
    (session, sync, store)
}

#[tokio::test]
async fn test_authenticate_decodes_token() {
    let (url, _) = spawn_server().await;
    let client = ApiClient::new(&url).unwrap();

    let token = client.authenticate("alice", "secret1").await.unwrap();
    assert_eq!(token.subject(), "alice");
    assert!(!token.is_expired(chrono::Utc::now().timestamp_millis()));
}

#[tokio::test]
async fn test_authenticate_bad_password() {
    let (url, _) = spawn_server().await;
    let client = ApiClient::new(&url).unwrap();

    assert_eq!(
        client.authenticate("alice", "nope").await.unwrap_err(),
        ApiError::AuthenticationFailed
    );
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ApiClient::new(&format!("http://{}", addr)).unwrap();
    assert!(matches!(
        client.authenticate("alice", "secret1").await,
        Err(ApiError::Transport(_))
    ));
}

#[tokio::test]
async fn test_fetch_and_submit_wire_format() {
    let (url, state) = spawn_server().await;
    let client = ApiClient::new(&url).unwrap();
    let token = client.authenticate("alice", "secret1").await.unwrap();

    assert!(matches!(
        client.fetch_config(&token).await,
        Err(ApiError::NotFound(_))
    ));

    let config = StreamConfig {
        youtube: DestinationConfig::new("abc", true),
        twitch: DestinationConfig::new("xyz", false),
        facebook: DestinationConfig::new("", false),
    };
    client.submit_config(&token, &config).await.unwrap();

    let stored = state.lock().config.clone().unwrap();
    assert_eq!(
        stored,
        json!({
            "streamkey_youtube": "abc",
            "streamkey_twitch": "xyz",
            "streamkey_facebook": "",
            "enable_youtube": true,
            "enable_twitch": false,
            "enable_facebook": false,
        })
    );

    assert_eq!(client.fetch_config(&token).await.unwrap(), config);
}

#[tokio::test]
async fn test_full_session_flow() {
    let (url, state) = spawn_server().await;
    let (session, sync, store) = wire(&url);

    let subject = session
        .login(Credentials::new("alice", "secret1"))
        .await
        .unwrap();
    assert_eq!(subject, "alice");
    assert!(store.load().unwrap().is_some());

    // First run: nothing stored on the server yet
    sync.load_for_session().await.unwrap();
    assert_eq!(sync.snapshot(), Some(StreamConfig::default()));
    assert_eq!(sync.submit().await, Err(SyncError::NotDirty));

    sync.set_stream_key(Platform::YouTube, "abc").unwrap();
    sync.set_enabled(Platform::YouTube, true).unwrap();
    sync.submit().await.unwrap();
    assert!(!sync.is_dirty());
    assert_eq!(state.lock().config.as_ref().unwrap()["streamkey_youtube"], "abc");

    // Reload reflects what the server now holds
    sync.load_for_session().await.unwrap();
    assert_eq!(sync.snapshot().unwrap().youtube, DestinationConfig::new("abc", true));

    // Server revokes the token: next call logs the user out
    state.lock().revoked = true;
    sync.set_stream_key(Platform::Twitch, "xyz").unwrap();
    assert_eq!(
        sync.submit().await,
        Err(SyncError::Api(ApiError::Unauthorized))
    );
    assert_eq!(session.state(), SessionState::LoggedOut);
    assert_eq!(store.load().unwrap(), None);
    assert_eq!(sync.draft(), None);
}

#[tokio::test]
async fn test_login_failure_leaves_logged_out() {
    let (url, _) = spawn_server().await;
    let (session, _, store) = wire(&url);

    let err = session
        .login(Credentials::new("alice", "wrong"))
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::Api(ApiError::AuthenticationFailed));
    assert_eq!(session.state(), SessionState::LoggedOut);
    assert_eq!(store.load().unwrap(), None);
}
