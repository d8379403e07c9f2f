use http_body_util::BodyExt;

use axum::{
    body::Body,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
            ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, AUTHORIZATION,
            CONTENT_TYPE, ORIGIN,
        },
        Method, Request, StatusCode,
    },
    response::IntoResponse,
    Router,
};
use backchannel_api::{build_router, ApiError, AppState, ClientEvent, ServerEvent};
use backchannel_auth::{AuthError, Authenticator};
use backchannel_chats::{
    Broadcaster, ChatError, CodecError, EncryptionCodec, LiveEventKind, MessagePipeline,
    RoomManager,
};
use backchannel_config::{AuthConfig, DatabaseConfig};
use backchannel_database::initialize_database;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

struct TestContext {
    _temp_dir: TempDir,
    pool: SqlitePool,
    state: AppState,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let config = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("backend_api.sqlite").display()),
            max_connections: 5,
        };
        let pool = initialize_database(&config).await?;

        let auth = AuthConfig {
            jwt_secret: Some("api-test-secret-that-is-long-enough".into()),
            ..AuthConfig::default()
        };
        let authenticator = Authenticator::new(pool.clone(), &auth);
        let broadcaster = Broadcaster::new(32);
        let rooms = RoomManager::new(pool.clone(), broadcaster.clone());
        let messages = MessagePipeline::new(
            pool.clone(),
            rooms.clone(),
            EncryptionCodec::generate(),
            broadcaster.clone(),
        );
        let state = AppState::new(authenticator, rooms, messages, broadcaster);

        Ok(Self {
            _temp_dir: temp_dir,
            pool,
            state,
        })
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResult<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router().oneshot(request).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        let payload = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, payload))
    }

    /// Registers and signs in, returning the access token and user id.
    async fn sign_up(&self, username: &str) -> TestResult<(String, i64)> {
        let (status, _) = self
            .send(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": "password123",
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED);

        let (status, session) = self
            .send(
                Method::POST,
                "/api/auth/signin",
                None,
                Some(json!({ "username": username, "password": "password123" })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK);

        let token = session["tokens"]["access_token"]
            .as_str()
            .ok_or("missing access token")?
            .to_string();
        let user_id = session["user"]["id"].as_i64().ok_or("missing user id")?;
        Ok((token, user_id))
    }

    async fn create_room(&self, token: &str, name: &str, visibility: &str) -> TestResult<String> {
        let (status, payload) = self
            .send(
                Method::POST,
                "/api/rooms",
                Some(token),
                Some(json!({ "name": name, "visibility": visibility })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED);
        Ok(payload["room"]["id"]
            .as_str()
            .ok_or("missing room id")?
            .to_string())
    }

    async fn message_count(&self) -> TestResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[tokio::test]
async fn health_reports_ok() -> TestResult {
    let ctx = TestContext::new().await?;
    let (status, payload) = ctx.send(Method::GET, "/health", None, None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["live_rooms"], 0);
    Ok(())
}

#[tokio::test]
async fn cors_layer_allows_configured_methods_and_headers() -> TestResult {
    let ctx = TestContext::new().await?;
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/health")
        .header(ORIGIN, "https://example.com")
        .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(ACCESS_CONTROL_REQUEST_HEADERS, "authorization, content-type")
        .body(Body::empty())?;

    let response = ctx.router().oneshot(request).await?;
    assert!(matches!(
        response.status(),
        StatusCode::NO_CONTENT | StatusCode::OK
    ));

    let allow_origin = response
        .headers()
        .get(ACCESS_CONTROL_ALLOW_ORIGIN)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    assert_eq!(allow_origin, "*");

    let allow_methods = response
        .headers()
        .get(ACCESS_CONTROL_ALLOW_METHODS)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_uppercase();
    assert!(allow_methods.contains("POST") && allow_methods.contains("DELETE"));
    Ok(())
}

#[tokio::test]
async fn api_error_into_response_sets_status_and_body() -> TestResult {
    let response = ApiError::new(StatusCode::BAD_REQUEST, "missing payload").into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await?.to_bytes();
    let payload: Value = serde_json::from_slice(&body)?;
    assert_eq!(payload["error"], "missing payload");
    Ok(())
}

#[test]
fn auth_errors_map_to_semantic_status_codes() {
    let cases = [
        (AuthError::Unauthenticated, StatusCode::UNAUTHORIZED),
        (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
        (AuthError::TokenRevoked, StatusCode::UNAUTHORIZED),
        (AuthError::TokenExpired, StatusCode::UNAUTHORIZED),
        (AuthError::TokenNotFound, StatusCode::UNAUTHORIZED),
        (AuthError::InvalidToken, StatusCode::UNAUTHORIZED),
        (AuthError::UsernameTaken, StatusCode::CONFLICT),
        (AuthError::EmailTaken, StatusCode::CONFLICT),
        (AuthError::InvalidInput("short".into()), StatusCode::BAD_REQUEST),
        (
            AuthError::Database(sqlx::Error::RowNotFound),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (error, expected) in cases {
        assert_eq!(ApiError::from(error).status, expected);
    }
}

#[test]
fn chat_errors_map_to_semantic_status_codes() {
    let cases = [
        (ChatError::room_not_found("r"), StatusCode::NOT_FOUND),
        (ChatError::forbidden("no"), StatusCode::FORBIDDEN),
        (ChatError::AlreadyMember { user_id: 1 }, StatusCode::CONFLICT),
        (ChatError::LastAdmin, StatusCode::BAD_REQUEST),
        (ChatError::validation("empty"), StatusCode::BAD_REQUEST),
        (
            ChatError::Codec(CodecError::AuthenticationFailure),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (error, expected) in cases {
        assert_eq!(ApiError::from(error).status, expected);
    }

    let hidden = ApiError::from(ChatError::Codec(CodecError::AuthenticationFailure));
    assert_eq!(hidden.message, "internal server error");
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() -> TestResult {
    let ctx = TestContext::new().await?;

    let (status, payload) = ctx.send(Method::GET, "/api/rooms", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(payload["error"].is_string());

    let (status, _) = ctx
        .send(Method::GET, "/api/auth/me", Some("not-a-jwt"), None)
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn signup_signin_and_profile() -> TestResult {
    let ctx = TestContext::new().await?;
    let (token, user_id) = ctx.sign_up("alice").await?;

    let (status, payload) = ctx.send(Method::GET, "/api/auth/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["user"]["id"], user_id);
    assert_eq!(payload["user"]["username"], "alice");

    let (status, _) = ctx
        .send(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({
                "username": "alice",
                "email": "again@example.com",
                "password": "password123",
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = ctx
        .send(
            Method::POST,
            "/api/auth/signin",
            None,
            Some(json!({ "username": "alice", "password": "wrong-password" })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn refresh_rotates_and_logout_revokes() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.sign_up("alice").await?;

    let (_, session) = ctx
        .send(
            Method::POST,
            "/api/auth/signin",
            None,
            Some(json!({ "username": "alice", "password": "password123" })),
        )
        .await?;
    let refresh = session["tokens"]["refresh_token"].clone();

    let (status, rotated) = ctx
        .send(
            Method::POST,
            "/api/auth/refresh-token",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(rotated["refresh_token"], refresh);

    let (status, _) = ctx
        .send(
            Method::POST,
            "/api/auth/refresh-token",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let access = rotated["access_token"].as_str().ok_or("missing access token")?;
    let (status, payload) = ctx
        .send(Method::POST, "/api/auth/logout", Some(access), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(payload["revoked"].as_u64().ok_or("missing count")? >= 1);

    let (status, _) = ctx
        .send(
            Method::POST,
            "/api/auth/refresh-token",
            None,
            Some(json!({ "refresh_token": rotated["refresh_token"] })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn room_lifecycle_over_http() -> TestResult {
    let ctx = TestContext::new().await?;
    let (alice, _) = ctx.sign_up("alice").await?;
    let (bob, bob_id) = ctx.sign_up("bob").await?;

    let lobby = ctx.create_room(&alice, "lobby", "public").await?;
    let staff = ctx.create_room(&alice, "staff", "private").await?;

    let (status, _) = ctx
        .send(Method::POST, "/api/rooms", Some(&alice), Some(json!({ "name": "x" })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, page) = ctx
        .send(Method::GET, "/api/rooms/public?page=0&size=10", Some(&bob), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], lobby.as_str());

    let (status, _) = ctx
        .send(Method::GET, &format!("/api/rooms/{staff}"), Some(&bob), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .send(Method::POST, &format!("/api/rooms/{staff}/join"), Some(&bob), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, joined) = ctx
        .send(Method::POST, &format!("/api/rooms/{lobby}/join"), Some(&bob), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(joined["joined"], true);

    let (_, again) = ctx
        .send(Method::POST, &format!("/api/rooms/{lobby}/join"), Some(&bob), None)
        .await?;
    assert_eq!(again["joined"], false);

    let (status, _) = ctx
        .send(
            Method::POST,
            &format!("/api/rooms/{staff}/members"),
            Some(&alice),
            Some(json!({ "user_id": bob_id })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = ctx
        .send(
            Method::POST,
            &format!("/api/rooms/{staff}/members"),
            Some(&alice),
            Some(json!({ "user_id": bob_id })),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, mine) = ctx.send(Method::GET, "/api/rooms", Some(&bob), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["rooms"].as_array().map(Vec::len), Some(2));

    let (status, _) = ctx
        .send(
            Method::DELETE,
            &format!("/api/rooms/{staff}/members/{bob_id}"),
            Some(&bob),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn last_admin_cannot_leave() -> TestResult {
    let ctx = TestContext::new().await?;
    let (alice, alice_id) = ctx.sign_up("alice").await?;
    let room = ctx.create_room(&alice, "lobby", "public").await?;

    let (status, payload) = ctx
        .send(
            Method::DELETE,
            &format!("/api/rooms/{room}/members/{alice_id}"),
            Some(&alice),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(payload["error"].as_str().unwrap_or_default().contains("last admin"));
    Ok(())
}

#[tokio::test]
async fn messages_flow_through_http_and_live_fan_out() -> TestResult {
    let ctx = TestContext::new().await?;
    let (alice, _) = ctx.sign_up("alice").await?;
    let (mallory, _) = ctx.sign_up("mallory").await?;
    let room = ctx.create_room(&alice, "general", "public").await?;
    let mut live = ctx.state.broadcaster().subscribe(&room);

    let (status, _) = ctx
        .send(
            Method::POST,
            &format!("/api/rooms/{room}/messages"),
            Some(&mallory),
            Some(json!({ "content": "let me in" })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(ctx.message_count().await?, 0);

    let (status, posted) = ctx
        .send(
            Method::POST,
            &format!("/api/rooms/{room}/messages"),
            Some(&alice),
            Some(json!({ "content": "hello secret world", "encrypt": true })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(posted["message"]["content"], "hello secret world");
    assert_eq!(posted["message"]["encrypted"], true);

    let event = live.recv().await.ok_or("no live event")?;
    assert_eq!(event.kind, LiveEventKind::Chat);
    assert_eq!(event.content.as_deref(), Some("hello secret world"));

    ctx.send(
        Method::POST,
        &format!("/api/rooms/{room}/messages"),
        Some(&alice),
        Some(json!({ "content": "plain hello" })),
    )
    .await?;

    let (status, history) = ctx
        .send(Method::GET, &format!("/api/rooms/{room}/messages"), Some(&alice), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["messages"][0]["content"], "hello secret world");
    assert_eq!(history["messages"][1]["content"], "plain hello");

    let (_, recent) = ctx
        .send(
            Method::GET,
            &format!("/api/rooms/{room}/messages/recent?size=1"),
            Some(&alice),
            None,
        )
        .await?;
    assert_eq!(recent["total"], 2);
    assert_eq!(recent["items"][0]["content"], "plain hello");

    let (_, found) = ctx
        .send(
            Method::GET,
            &format!("/api/rooms/{room}/messages/search?q=hello"),
            Some(&alice),
            None,
        )
        .await?;
    assert_eq!(found["total"], 1);
    assert_eq!(found["items"][0]["content"], "plain hello");

    let (status, _) = ctx
        .send(
            Method::GET,
            &format!("/api/rooms/{room}/messages/search?q=hello"),
            Some(&mallory),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn joining_over_http_announces_the_member() -> TestResult {
    let ctx = TestContext::new().await?;
    let (alice, _) = ctx.sign_up("alice").await?;
    let (bob, bob_id) = ctx.sign_up("bob").await?;
    let room = ctx.create_room(&alice, "general", "public").await?;
    let mut live = ctx.state.broadcaster().subscribe(&room);

    ctx.send(Method::POST, &format!("/api/rooms/{room}/members"), Some(&bob), None)
        .await?;

    let event = live.recv().await.ok_or("no live event")?;
    assert_eq!(event.kind, LiveEventKind::Join);
    assert_eq!(event.sender.id, bob_id);
    assert!(event.content.is_none());
    Ok(())
}

#[test]
fn client_events_use_a_type_tag() -> TestResult {
    let subscribe: ClientEvent = serde_json::from_str(r#"{"type":"subscribe","room_id":"r1"}"#)?;
    assert_eq!(
        subscribe,
        ClientEvent::Subscribe {
            room_id: "r1".into()
        }
    );

    let ping: ClientEvent = serde_json::from_str(r#"{"type":"ping"}"#)?;
    assert_eq!(ping, ClientEvent::Ping);

    assert!(serde_json::from_str::<ClientEvent>(r#"{"type":"teleport"}"#).is_err());
    Ok(())
}

#[test]
fn server_events_serialize_with_snake_case_tags() -> TestResult {
    let hello = serde_json::to_value(ServerEvent::Hello {
        user_id: 7,
        username: "alice".into(),
    })?;
    assert_eq!(hello, json!({ "type": "hello", "user_id": 7, "username": "alice" }));

    let pong = serde_json::to_value(ServerEvent::Pong)?;
    assert_eq!(pong, json!({ "type": "pong" }));
    Ok(())
}
