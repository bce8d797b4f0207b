use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap},
    response::Response,
    Form,
};
use secrecy::SecretString;
use serde::Deserialize;
use tracing::{error, instrument, warn};

use crate::api::handlers::{found, normalize_app_uri};
use crate::api::Services;
use crate::auth::{crypto, sign_in_url, SignInError};
use crate::monitor::AuthEvent;

#[derive(Debug, Deserialize, Default)]
pub struct DoSignInForm {
    #[serde(rename = "appUri")]
    app_uri: Option<String>,
    username: Option<String>,
    password: Option<String>,
    #[serde(rename = "staySignedIn")]
    stay_signed_in: Option<String>,
    /// Persistence flag set by the encrypting sign-in page.
    persist: Option<String>,
    /// Encrypted `username\npassword` payload produced by the sign-in page.
    v: Option<String>,
}

/// Process a sign-in attempt. Every failure leaves through the same
/// redirect so the response shape never reveals which check rejected it.
#[instrument(skip(services, headers, form))]
pub async fn do_sign_in(
    Extension(services): Extension<Services>,
    headers: HeaderMap,
    Form(form): Form<DoSignInForm>,
) -> Response {
    let app_uri = normalize_app_uri(form.app_uri.as_deref());
    let fail = |error: SignInError| found(&sign_in_url(Some(&app_uri), Some(error)));

    let (submitted, password) = match extract_credentials(&services, &form) {
        Ok(credentials) => credentials,
        Err(error) => return fail(error),
    };

    let Some(username) = services.auth.local_username(&submitted) else {
        services
            .auth
            .monitor()
            .log_event(&AuthEvent::LoginFailed, &submitted);
        return fail(SignInError::InvalidLogin);
    };

    if services.auth.is_sign_in_throttled(&username) {
        warn!(username, "sign-in attempt throttled");
        return fail(SignInError::Server);
    }

    if !services.verifier.verify(&username, &password).await
        || !services.verifier.local_account_exists(&username)
    {
        services
            .auth
            .monitor()
            .log_event(&AuthEvent::LoginFailed, &username);
        return fail(SignInError::InvalidLogin);
    }

    match services.auth.overlay().is_user_licensed(&username) {
        Ok(true) => {}
        Ok(false) => return fail(SignInError::LicenseLimitReached),
        Err(err) => {
            error!("License check failed for {username}: {err}");
            return fail(SignInError::LicenseSystemUnavailable);
        }
    }

    // The encrypting page carries the choice in `persist`; the plain form
    // submits its checkbox directly.
    let persist_field = if services.auth.config().encrypt_password() {
        form.persist.as_deref()
    } else {
        form.stay_signed_in.as_deref()
    };
    let persist = matches!(persist_field, Some("1" | "on" | "true"));
    let cookies = match services
        .auth
        .handler()
        .set_sign_in_cookies(&headers, &username, persist)
    {
        Ok(cookies) => cookies,
        Err(err) => {
            error!("Unable to issue sign-in cookies: {err}");
            return fail(SignInError::Server);
        }
    };

    services.auth.monitor().log_event(&AuthEvent::Login, &username);

    let mut response = found(&app_uri);
    for cookie in cookies {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    response
}

fn extract_credentials(
    services: &Services,
    form: &DoSignInForm,
) -> Result<(String, SecretString), SignInError> {
    if services.auth.config().encrypt_password() {
        // Failure to decrypt is the server's problem (or a hostile client),
        // never a credentials verdict.
        let Some(payload) = form.v.as_deref() else {
            warn!("Sign-in request without encrypted credentials payload");
            return Err(SignInError::Server);
        };
        let plaintext = services.keypair.decrypt_payload(payload).map_err(|err| {
            warn!("Unable to decrypt sign-in payload: {err}");
            SignInError::Server
        })?;
        // A payload that decrypts but has no separator points at a broken
        // or hostile client, not at bad credentials.
        crypto::split_credentials(&plaintext).map_err(|err| {
            warn!("Malformed sign-in payload: {err}");
            SignInError::Server
        })
    } else {
        let username = form.username.clone().ok_or(SignInError::InvalidLogin)?;
        let password = SecretString::from(form.password.clone().unwrap_or_default());
        Ok((username, password))
    }
}
