//! Signed session cookies.
//!
//! A cookie value is `username|expiration|signature`: the username and the
//! HTTP-date expiration are URL-encoded in place, and the signature is an
//! HMAC-SHA256 over the first two fields, base64url encoded. Anything that
//! fails to verify or parse reads back as absent identity rather than as an
//! error the client can observe, since a tampered cookie and an expired one
//! must be indistinguishable to the caller.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, TimeZone, Utc};
use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::warn;

use super::error::Error;

type HmacSha256 = Hmac<Sha256>;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

pub const KEY_LENGTH: usize = 32;

pub fn format_http_date(when: DateTime<Utc>) -> String {
    when.format(HTTP_DATE_FORMAT).to_string()
}

pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, HTTP_DATE_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Expiration embedded in a cookie value as its second `|`-delimited field.
///
/// Malformed or legacy values parse as "now", which downstream code treats
/// as already expired.
pub fn parse_expiration(value: &str) -> DateTime<Utc> {
    if let Some(field) = value.split('|').nth(1) {
        if let Ok(decoded) = urlencoding::decode(field) {
            if let Some(parsed) = parse_http_date(&decoded) {
                return parsed;
            }
        }
    }
    Utc::now()
}

/// Issues and reads signed, time-bounded cookie values.
///
/// All server processes sharing a revocation list must share the signing
/// key, otherwise cookies issued by one process read as absent on another.
pub struct CookieCodec {
    key: Vec<u8>,
}

impl CookieCodec {
    #[must_use]
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// Bind `username` to `now + ttl` and sign the pair.
    #[must_use]
    pub fn issue(&self, username: &str, ttl: Duration) -> String {
        // Truncate to whole seconds so the HTTP-date round-trips exactly.
        let expires = (Utc::now() + ttl).trunc_subsecs(0);
        let payload = format!(
            "{}|{}",
            urlencoding::encode(username),
            urlencoding::encode(&format_http_date(expires))
        );
        let signature = self.sign(&payload);
        format!("{payload}|{signature}")
    }

    /// Verify a cookie value and return the username it binds.
    ///
    /// Returns `None` for tampered, malformed, expired, or empty-identity
    /// values.
    #[must_use]
    pub fn read(&self, value: &str) -> Option<String> {
        let mut parts = value.splitn(3, '|');
        let user_field = parts.next()?;
        let expires_field = parts.next()?;
        let signature = parts.next()?;

        let payload = format!("{user_field}|{expires_field}");
        let presented = URL_SAFE_NO_PAD.decode(signature).ok()?;
        if !constant_time_eq(&self.sign_bytes(&payload), &presented) {
            return None;
        }

        let expires = parse_http_date(&urlencoding::decode(expires_field).ok()?)?;
        if expires <= Utc::now() {
            return None;
        }

        let username = urlencoding::decode(user_field).ok()?.into_owned();
        if username.is_empty() {
            None
        } else {
            Some(username)
        }
    }

    fn sign(&self, payload: &str) -> String {
        URL_SAFE_NO_PAD.encode(self.sign_bytes(payload))
    }

    fn sign_bytes(&self, payload: &str) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length");
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

/// Read the shared signing key from `path`, creating it (owner-only) on
/// first use so cooperating processes on the host pick up the same key.
pub fn load_or_create_key(path: &Path) -> Result<Vec<u8>, Error> {
    if path.exists() {
        let encoded = fs::read_to_string(path)?;
        if let Ok(key) = URL_SAFE_NO_PAD.decode(encoded.trim()) {
            if key.len() == KEY_LENGTH {
                return Ok(key);
            }
        }
        warn!(
            "Secure cookie key at {} is malformed; generating a new one",
            path.display()
        );
    }
    let mut key = vec![0u8; KEY_LENGTH];
    OsRng
        .try_fill_bytes(&mut key)
        .map_err(|_| Error::TokenGeneration)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, URL_SAFE_NO_PAD.encode(&key))?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(key)
}

/// Build a `Set-Cookie` header value scoped to the web root.
///
/// `max_age` of `None` yields a session cookie. CSRF tokens are the only
/// cookies set without `HttpOnly`, since the sign-in form must read them.
pub fn set_cookie(
    name: &str,
    value: &str,
    max_age: Option<std::time::Duration>,
    http_only: bool,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}={value}; Path=/; SameSite=Lax");
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    if let Some(age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", age.as_secs()));
    }
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub fn clear_cookie(name: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Extract a named cookie from the request headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == name {
            return Some(val.to_string());
        }
    }
    None
}

/// Whether the request arrived over TLS, judged by proxy headers.
pub fn request_is_secure(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}
