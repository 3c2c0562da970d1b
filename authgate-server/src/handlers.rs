//! HTTP request handlers for the authgate server

use crate::credentials_header::{auth_cookie, extract_basic, extract_token};
use authgate_core::auth::{AuthEngine, IssuedToken, RolePolicy};
use authgate_core::{LoginSurface, Principal, TokenError};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Body;
use hyper::header::{HeaderValue, CONTENT_TYPE, LOCATION, SET_COOKIE, WWW_AUTHENTICATE};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::{json, Value};
use std::convert::Infallible;
use tracing::{debug, error, info, warn};

pub type BoxBody = Full<Bytes>;

/// Largest request body accepted by any endpoint
pub const MAX_BODY_BYTES: usize = 16 * 1024;

/// Per-server state shared by every request
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: AuthEngine,
    /// Add `Secure` to the auth cookie
    pub secure_cookies: bool,
}

/// Main request handler
pub async fn handle_request<B>(
    req: Request<B>,
    state: AppState,
) -> Result<Response<BoxBody>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("Handling {} {}", method, path);

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/health") => handle_health(),
        (&Method::POST, "/login") => handle_web_login(req, &state).await,
        (&Method::POST, "/llm/login") => handle_agent_login(req, &state),
        (&Method::POST, "/validate") => handle_validate_body(req, &state).await,
        (&Method::GET, "/validate") => handle_validate_subrequest(req, &state),
        _ => json_response(StatusCode::NOT_FOUND, json!({"error": "Not found"})),
    };

    info!("{} {} -> {}", method, path, response.status());
    Ok(response)
}

/// JSON response with the given status
pub fn json_response(status: StatusCode, body: Value) -> Response<BoxBody> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response<BoxBody> {
    json_response(status, json!({"code": code, "message": message}))
}

fn invalid_credentials() -> Response<BoxBody> {
    error_response(
        StatusCode::UNAUTHORIZED,
        "AUTH_INVALID_CREDENTIALS",
        "Invalid credentials",
    )
}

fn validation_response(valid: bool) -> Response<BoxBody> {
    let status = if valid {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    };
    json_response(status, json!({"valid": valid}))
}

fn token_error_response(err: &TokenError) -> Response<BoxBody> {
    match err {
        TokenError::Role(role_err) => {
            warn!("Token issuance refused: {}", role_err);
            error_response(StatusCode::BAD_REQUEST, "INVALID_ROLE", "Invalid role")
        }
        other => {
            error!("Token issuance failed: {}", other);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error",
            )
        }
    }
}

async fn read_body<B>(req: Request<B>) -> Option<Bytes>
where
    B: Body<Data = Bytes>,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(collected) => Some(collected.to_bytes()),
        Err(e) => {
            warn!("Failed to read request body: {}", e);
            None
        }
    }
}

/// Health check handler
fn handle_health() -> Response<BoxBody> {
    json_response(
        StatusCode::OK,
        json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "service": "authgate"
        }),
    )
}

/// Shared tail of both login surfaces: gate the role, then issue
fn issue_for_surface(
    state: &AppState,
    surface: LoginSurface,
    principal: &Principal,
) -> Result<IssuedToken, Response<BoxBody>> {
    let Some(role) = state.engine.role_of(principal.as_str()) else {
        return Err(invalid_credentials());
    };

    if let Err(err) = RolePolicy::gate(surface, role) {
        warn!("Login refused for {}: {}", principal, err);
        return Err(error_response(
            StatusCode::FORBIDDEN,
            "ROLE_NOT_ALLOWED",
            &format!("Role not allowed for {} login", surface),
        ));
    }

    state
        .engine
        .issue_token(principal, role)
        .map_err(|err| token_error_response(&err))
}

/// Form-based login for interactive principals
async fn handle_web_login<B>(req: Request<B>, state: &AppState) -> Response<BoxBody>
where
    B: Body<Data = Bytes>,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let Some(body) = read_body(req).await else {
        return error_response(StatusCode::BAD_REQUEST, "INVALID_REQUEST", "Unreadable body");
    };

    let mut username = None;
    let mut password = None;
    for (name, value) in url::form_urlencoded::parse(&body) {
        match name.as_ref() {
            "username" => username = Some(value.into_owned()),
            "password" => password = Some(value.into_owned()),
            _ => {}
        }
    }

    let (Some(username), Some(password)) = (username, password) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "INVALID_REQUEST",
            "username and password are required",
        );
    };

    debug!("Attempting web login for {}", username);
    if let Err(err) = state.engine.verify_password(&username, &password) {
        warn!("Web login failed for {}: {}", username, err.diagnostic_code());
        return invalid_credentials();
    }

    let issued = match issue_for_surface(state, LoginSurface::Web, &Principal::from(username.as_str())) {
        Ok(issued) => issued,
        Err(response) => return response,
    };

    let cookie = match HeaderValue::from_str(&auth_cookie(issued.token(), state.secure_cookies)) {
        Ok(cookie) => cookie,
        Err(e) => {
            error!("Token not representable as a cookie: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error",
            );
        }
    };

    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::FOUND;
    response
        .headers_mut()
        .insert(LOCATION, HeaderValue::from_static("/"));
    response.headers_mut().insert(SET_COOKIE, cookie);
    response
}

/// Basic-auth login for automated agents
fn handle_agent_login<B>(req: Request<B>, state: &AppState) -> Response<BoxBody> {
    let Some(credentials) = extract_basic(req.headers()) else {
        let mut response = invalid_credentials();
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Basic"));
        return response;
    };

    debug!("Attempting agent login for {}", credentials.principal);
    let principal = match state
        .engine
        .verify_challenge(&credentials.principal, &credentials.secret)
    {
        Ok(principal) => principal,
        Err(err) => {
            warn!(
                "Agent login failed for {}: {}",
                credentials.principal,
                err.diagnostic_code()
            );
            let mut response = invalid_credentials();
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Basic"));
            return response;
        }
    };

    match issue_for_surface(state, LoginSurface::Agent, &principal) {
        Ok(issued) => json_response(
            StatusCode::OK,
            json!({
                "token": issued.token(),
                "expires_in": issued.expires_in(state.engine.now_unix()),
            }),
        ),
        Err(response) => response,
    }
}

/// Validation with the token in a JSON body
async fn handle_validate_body<B>(req: Request<B>, state: &AppState) -> Response<BoxBody>
where
    B: Body<Data = Bytes>,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    debug!("Validating token from request body");

    let Some(body) = read_body(req).await else {
        return error_response(StatusCode::BAD_REQUEST, "INVALID_REQUEST", "Unreadable body");
    };

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            debug!("Validation body is not JSON: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "INVALID_REQUEST", "Expected JSON");
        }
    };

    match payload.get("token").and_then(Value::as_str) {
        Some(token) if !token.is_empty() => validation_response(state.engine.is_token_valid(token)),
        _ => validation_response(false),
    }
}

/// Validation for reverse-proxy auth subrequests: token from cookie or bearer header
fn handle_validate_subrequest<B>(req: Request<B>, state: &AppState) -> Response<BoxBody> {
    debug!("Validating token from subrequest headers");

    match extract_token(req.headers()) {
        Some(token) => validation_response(state.engine.is_token_valid(&token)),
        None => validation_response(false),
    }
}
