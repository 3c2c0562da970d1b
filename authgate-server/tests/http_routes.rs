//! Route-level tests for login and validation endpoints

use authgate_core::auth::{AuthEngine, CredentialStore, RolePolicy};
use authgate_core::clock::ManualClock;
use authgate_core::AuthConfig;
use authgate_server::server::Acceptor;
use authgate_server::{handle_request, AppState, AuthServer};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE, WWW_AUTHENTICATE};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::{json, Value};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const CREDENTIALS: &str = "\
USRSAB1234=hunter2pass
MNTR0001=monitor
ADMN0001=rootpass
AGNRxyz=reasoner
AGNFquick=fast
AGIAmind=deep
";

fn state_with_clock() -> (AppState, ManualClock) {
    let clock = ManualClock::starting_now();
    let engine = AuthEngine::with_clock(
        &AuthConfig::default(),
        CredentialStore::parse(CREDENTIALS).unwrap(),
        RolePolicy::default(),
        Arc::new(clock.clone()),
    )
    .unwrap();
    (
        AppState {
            engine,
            secure_cookies: false,
        },
        clock,
    )
}

fn state() -> AppState {
    state_with_clock().0
}

fn request(method: Method, uri: &str, body: impl Into<Bytes>) -> Request<Full<Bytes>> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Full::new(body.into()))
        .unwrap()
}

fn form_login(username: &str, password: &str) -> Request<Full<Bytes>> {
    let body = format!("username={}&password={}", username, password);
    let mut req = request(Method::POST, "/login", body);
    req.headers_mut().insert(
        CONTENT_TYPE,
        "application/x-www-form-urlencoded".parse().unwrap(),
    );
    req
}

fn agent_login(principal: &str, secret: &str) -> Request<Full<Bytes>> {
    let mut req = request(Method::POST, "/llm/login", Bytes::new());
    let encoded = STANDARD.encode(format!("{principal}:{secret}"));
    req.headers_mut()
        .insert(AUTHORIZATION, format!("Basic {encoded}").parse().unwrap());
    req
}

fn validate_body(token: &str) -> Request<Full<Bytes>> {
    request(Method::POST, "/validate", json!({ "token": token }).to_string())
}

async fn call(req: Request<Full<Bytes>>, state: &AppState) -> Response<Full<Bytes>> {
    handle_request(req, state.clone()).await.unwrap()
}

async fn body_json(response: Response<Full<Bytes>>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn cookie_token(response: &Response<Full<Bytes>>) -> String {
    let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
    let pair = cookie.split(';').next().unwrap();
    pair.strip_prefix("auth_token=").unwrap().to_string()
}

#[tokio::test]
async fn health_reports_healthy() {
    let response = call(request(Method::GET, "/health", Bytes::new()), &state()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let response = call(request(Method::GET, "/admin", Bytes::new()), &state()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn web_login_sets_cookie_and_redirects() {
    let state = state();
    let response = call(form_login("USRSAB1234", "hunter2pass"), &state).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[LOCATION], "/");
    let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(!cookie.contains("Secure"));

    let token = cookie_token(&response);
    assert!(state.engine.is_token_valid(&token));
}

#[tokio::test]
async fn web_login_secure_cookie_flag() {
    let state = AppState {
        secure_cookies: true,
        ..state()
    };
    let response = call(form_login("MNTR0001", "monitor"), &state).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(response.headers()[SET_COOKIE].to_str().unwrap().contains("Secure"));
}

#[tokio::test]
async fn web_login_failures_look_identical() {
    let state = state();
    let unknown = body_json(call(form_login("USRSnobody", "hunter2pass"), &state).await).await;
    let mismatch = body_json(call(form_login("USRSAB1234", "wrong"), &state).await).await;

    assert_eq!(unknown, mismatch);
    assert_eq!(unknown["code"], "AUTH_INVALID_CREDENTIALS");

    let response = call(form_login("USRSAB1234", "wrong"), &state).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn web_login_rejects_agent_and_admin_roles() {
    let state = state();
    for (principal, secret) in [("AGNRxyz", "reasoner"), ("ADMN0001", "rootpass")] {
        let response = call(form_login(principal, secret), &state).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["code"], "ROLE_NOT_ALLOWED");
    }
}

#[tokio::test]
async fn web_login_requires_both_fields() {
    let response = call(request(Method::POST, "/login", "username=USRSAB1234"), &state()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn agent_login_returns_token_and_relative_expiry() {
    let state = state();
    let response = call(agent_login("AGNRxyz", "reasoner"), &state).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["expires_in"], 120);

    let token = body["token"].as_str().unwrap();
    assert!(state.engine.is_token_valid(token));
}

#[tokio::test]
async fn agent_login_rejects_interactive_roles() {
    let state = state();
    for (principal, secret) in [("USRSAB1234", "hunter2pass"), ("AGIAmind", "deep")] {
        let response = call(agent_login(principal, secret), &state).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}

#[tokio::test]
async fn agent_login_challenges_without_credentials() {
    let state = state();

    let response = call(request(Method::POST, "/llm/login", Bytes::new()), &state).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[WWW_AUTHENTICATE], "Basic");

    let response = call(agent_login("AGNFquick", "slow"), &state).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "AUTH_INVALID_CREDENTIALS");
}

#[tokio::test]
async fn validate_body_tracks_token_lifetime() {
    let (state, clock) = state_with_clock();
    let login = body_json(call(agent_login("AGNFquick", "fast"), &state).await).await;
    let token = login["token"].as_str().unwrap().to_string();

    let response = call(validate_body(&token), &state).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"valid": true}));

    clock.advance(Duration::from_secs(60));
    let response = call(validate_body(&token), &state).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await, json!({"valid": false}));
}

#[tokio::test]
async fn validate_body_without_token_is_unauthorized() {
    let state = state();
    for body in [json!({}), json!({"token": ""}), json!({"token": 5})] {
        let response = call(request(Method::POST, "/validate", body.to_string()), &state).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = call(request(Method::POST, "/validate", "not json"), &state).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn validate_subrequest_reads_cookie_or_bearer() {
    let state = state();
    let login = call(form_login("USRSAB1234", "hunter2pass"), &state).await;
    let token = cookie_token(&login);

    let mut with_cookie = request(Method::GET, "/validate", Bytes::new());
    with_cookie
        .headers_mut()
        .insert(COOKIE, format!("auth_token={token}").parse().unwrap());
    assert_eq!(call(with_cookie, &state).await.status(), StatusCode::OK);

    let mut with_bearer = request(Method::GET, "/validate", Bytes::new());
    with_bearer
        .headers_mut()
        .insert(AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
    assert_eq!(call(with_bearer, &state).await.status(), StatusCode::OK);

    let bare = request(Method::GET, "/validate", Bytes::new());
    assert_eq!(call(bare, &state).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_from_other_instance_is_rejected() {
    let issuing = state();
    let other = state();
    let login = body_json(call(agent_login("AGNRxyz", "reasoner"), &issuing).await).await;
    let token = login["token"].as_str().unwrap();

    let response = call(validate_body(token), &other).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

async fn get_health(addr: SocketAddr) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    String::from_utf8_lossy(&raw).into_owned()
}

#[tokio::test]
async fn serves_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(AuthServer::new(state()).serve_listener(listener));

    let text = get_health(addr).await;
    assert!(text.starts_with("HTTP/1.1 200"), "{text}");
    assert!(text.contains("\"healthy\""));

    server.abort();
}

/// Fails the first `failures` accepts the way an exhausted fd table does
struct FailingAcceptor {
    inner: TcpListener,
    failures: usize,
}

impl Acceptor for FailingAcceptor {
    type Io = TcpStream;

    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(io::Error::from_raw_os_error(24));
        }
        self.inner.accept().await
    }
}

#[tokio::test]
async fn accept_errors_do_not_stop_the_server() {
    let inner = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = inner.local_addr().unwrap();
    let acceptor = FailingAcceptor { inner, failures: 3 };
    let server = tokio::spawn(AuthServer::new(state()).serve_incoming(acceptor));

    let text = get_health(addr).await;
    assert!(text.starts_with("HTTP/1.1 200"), "{text}");
    assert!(!server.is_finished());

    server.abort();
}
