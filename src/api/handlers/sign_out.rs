use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use tracing::instrument;

use crate::api::handlers::found;
use crate::api::Services;
use crate::auth::constants::{PERSIST_AUTH_COOKIE, USER_ID_COOKIE, USER_LIST_COOKIE};
use crate::auth::{cookie, csrf, sign_in_url};
use crate::monitor::AuthEvent;

#[derive(Debug, Deserialize, Default)]
pub struct SignOutForm {
    #[serde(rename = "csrf-token")]
    csrf_token: Option<String>,
}

/// End the session: revoke the auth cookie server-side, then clear the
/// browser's copies. A forged cross-site POST cannot reach the revocation
/// step because the CSRF token gate comes first.
#[instrument(skip(services, headers, form))]
pub async fn sign_out(
    Extension(services): Extension<Services>,
    headers: HeaderMap,
    Form(form): Form<SignOutForm>,
) -> Response {
    if !csrf::validate_form(&headers, form.csrf_token.as_deref().unwrap_or("")) {
        return (StatusCode::BAD_REQUEST, "Missing or invalid CSRF token").into_response();
    }

    if let Some(identifier) = services.auth.user_identifier(&headers) {
        if let Some(username) = services.auth.local_username(&identifier) {
            services
                .auth
                .monitor()
                .log_event(&AuthEvent::SignOut, &username);
        }
    }

    // Revoke before clearing; a cleared cookie the client kept a copy of
    // must still be dead on the next request.
    services.auth.invalidate_auth_cookie(&headers);

    let secure = services.auth.config().cookies_force_secure()
        || cookie::request_is_secure(&headers);
    let mut response = found(&sign_in_url(None, None));
    for name in [USER_ID_COOKIE, USER_LIST_COOKIE, PERSIST_AUTH_COOKIE] {
        if let Ok(cleared) = cookie::clear_cookie(name, secure) {
            response.headers_mut().append(SET_COOKIE, cleared);
        }
    }
    response
}
