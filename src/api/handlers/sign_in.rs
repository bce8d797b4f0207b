use axum::{
    extract::{Extension, Query},
    http::{
        header::{CACHE_CONTROL, SET_COOKIE},
        HeaderMap, HeaderName, HeaderValue,
    },
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use crate::api::Services;
use crate::auth::constants::{APP_URI_PARAM, CSRF_TOKEN_FIELD, DO_SIGN_IN, USER_ID_COOKIE};
use crate::auth::{cookie, SignInError};

#[derive(Debug, Deserialize, Default)]
pub struct SignInQuery {
    #[serde(rename = "appUri")]
    app_uri: Option<String>,
    error: Option<String>,
}

/// Render the sign-in page.
///
/// Any auth cookie the browser still holds is cleared here so a failed or
/// abandoned session never lingers behind the form.
#[instrument(skip(services, headers, query))]
pub async fn sign_in(
    Extension(services): Extension<Services>,
    headers: HeaderMap,
    Query(query): Query<SignInQuery>,
) -> Response {
    let secure = services.auth.config().cookies_force_secure()
        || cookie::request_is_secure(&headers);

    let error_message = query
        .error
        .as_deref()
        .and_then(SignInError::from_code)
        .map(SignInError::message);

    let body = render_page(
        query.app_uri.as_deref(),
        error_message,
        services.auth.config().encrypt_password(),
    );

    let mut response = Html(body).into_response();
    let response_headers = response.headers_mut();
    // The page embeds the credential form; never allow it to be framed.
    response_headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    response_headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Ok(cleared) = cookie::clear_cookie(USER_ID_COOKIE, secure) {
        response_headers.append(SET_COOKIE, cleared);
    }
    response
}

/// Client-side PKCS#1 v1.5 encryption against the key served by
/// `/auth-public-key`. The plain inputs carry no `name` attribute, so only
/// the `v` payload and the `persist` flag ever reach the wire.
const ENCRYPT_SCRIPT: &str = r#"<script>
document.querySelector("form").addEventListener("submit", async function (event) {
  event.preventDefault();
  const form = event.target;
  const response = await fetch("/auth-public-key", { cache: "no-store" });
  const [exponent, modulus] = (await response.text()).split(":");
  const payload = document.getElementById("username").value + "\n" +
    document.getElementById("password").value;
  form.elements["v"].value = encryptPayload(payload, exponent, modulus);
  form.elements["persist"].value =
    document.getElementById("staySignedIn").checked ? "1" : "0";
  form.submit();
});

function encryptPayload(text, exponentHex, modulusHex) {
  const modulus = BigInt("0x" + modulusHex);
  const exponent = BigInt("0x" + exponentHex);
  const size = modulusHex.length / 2;
  const message = new TextEncoder().encode(text);
  const block = new Uint8Array(size);
  block[1] = 2;
  const padding = block.subarray(2, size - message.length - 1);
  crypto.getRandomValues(padding);
  padding.forEach(function (byte, index) {
    while (padding[index] === 0) {
      padding[index] = crypto.getRandomValues(new Uint8Array(1))[0];
    }
  });
  block.set(message, size - message.length);
  let m = 0n;
  block.forEach(function (byte) { m = (m << 8n) | BigInt(byte); });
  let c = 1n;
  let base = m;
  let exp = exponent;
  while (exp > 0n) {
    if (exp & 1n) { c = (c * base) % modulus; }
    base = (base * base) % modulus;
    exp >>= 1n;
  }
  const out = new Uint8Array(size);
  for (let i = size - 1; i >= 0; i--) { out[i] = Number(c & 0xffn); c >>= 8n; }
  return btoa(String.fromCharCode.apply(null, out));
}
</script>"#;

fn render_page(app_uri: Option<&str>, error_message: Option<&str>, encrypt: bool) -> String {
    let error_block = error_message.map_or(String::new(), |message| {
        format!(r#"<p class="error">{}</p>"#, escape_html(message))
    });
    let app_uri_value = escape_html(app_uri.unwrap_or(""));

    let credential_fields = if encrypt {
        r#"  <input type="hidden" name="v">
  <input type="hidden" name="persist" value="0">
  <label>Username <input type="text" id="username" autofocus></label>
  <label>Password <input type="password" id="password"></label>
  <label><input type="checkbox" id="staySignedIn"> Stay signed in</label>"#
    } else {
        r#"  <label>Username <input type="text" name="username" autofocus></label>
  <label>Password <input type="password" name="password"></label>
  <label><input type="checkbox" name="staySignedIn" value="1"> Stay signed in</label>"#
    };
    let script = if encrypt { ENCRYPT_SCRIPT } else { "" };

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Sign In</title></head>
<body>
{error_block}
<form method="post" action="{DO_SIGN_IN}">
  <input type="hidden" name="{APP_URI_PARAM}" value="{app_uri_value}">
  <input type="hidden" name="{CSRF_TOKEN_FIELD}" value="">
{credential_fields}
  <button type="submit">Sign In</button>
</form>
{script}
</body>
</html>
"#
    )
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_render_their_message() {
        let page = render_page(None, Some(SignInError::InvalidLogin.message()), false);
        assert!(page.contains("Incorrect or invalid username/password"));

        let page = render_page(None, None, false);
        assert!(!page.contains("class=\"error\""));
    }

    #[test]
    fn app_uri_is_escaped_into_the_form() {
        let page = render_page(Some("/files\"><script>"), None, false);
        assert!(page.contains("/files&quot;&gt;&lt;script&gt;"));
        assert!(!page.contains("\"><script>"));
    }

    #[test]
    fn plain_mode_submits_named_credential_fields() {
        let page = render_page(None, None, false);
        assert!(page.contains(r#"name="username""#));
        assert!(page.contains(r#"name="password""#));
        assert!(page.contains(r#"name="staySignedIn""#));
        assert!(!page.contains(r#"name="v""#));
    }

    #[test]
    fn encrypted_mode_never_names_the_plain_inputs() {
        let page = render_page(None, None, true);
        assert!(page.contains(r#"name="v""#));
        assert!(page.contains(r#"name="persist""#));
        assert!(page.contains("/auth-public-key"));
        // The cleartext inputs must not be submittable.
        assert!(!page.contains(r#"name="username""#));
        assert!(!page.contains(r#"name="password""#));
        assert!(!page.contains(r#"name="staySignedIn""#));
    }
}
