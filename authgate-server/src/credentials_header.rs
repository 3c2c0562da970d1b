//! Extraction of credentials and tokens from request headers

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hyper::header::{AUTHORIZATION, COOKIE};
use hyper::HeaderMap;

/// Cookie set by the web login and read back by auth subrequests
pub const AUTH_COOKIE: &str = "auth_token";

/// Principal and secret decoded from an `Authorization: Basic` header
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub principal: String,
    pub secret: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("principal", &self.principal)
            .finish_non_exhaustive()
    }
}

/// Decode `Authorization: Basic <base64(principal:secret)>`
pub fn extract_basic(headers: &HeaderMap) -> Option<BasicCredentials> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (principal, secret) = decoded.split_once(':')?;

    Some(BasicCredentials {
        principal: principal.to_string(),
        secret: secret.to_string(),
    })
}

/// Token from `Authorization: Bearer`, if present and non-empty
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Value of the auth cookie, if present and non-empty
pub fn extract_cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == AUTH_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Token presented on an auth subrequest: cookie first, then bearer header
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    extract_cookie_token(headers).or_else(|| extract_bearer(headers))
}

/// `Set-Cookie` value for a freshly issued token
pub fn auth_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!("{}={}; HttpOnly; SameSite=Lax; Path=/", AUTH_COOKIE, token);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
