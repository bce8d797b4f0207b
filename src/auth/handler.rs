//! Pluggable authentication handlers and the service that fronts them.
//!
//! An [`AuthHandler`] knows how a particular mechanism binds identity to a
//! request; [`AuthService`] wraps the active handler with the concerns every
//! mechanism shares, namely revocation, sign-in throttling, user-list
//! enforcement, and audit events.

use axum::http::{HeaderMap, HeaderValue};
use std::sync::Arc;
use std::time::Duration;

use crate::monitor::MonitorClient;

use super::config::AuthConfig;
use super::constants::{
    APP_URI_PARAM, ERROR_PARAM, PERSIST_AUTH_COOKIE, SIGN_IN, USER_ID_COOKIE, USER_LIST_COOKIE,
};
use super::cookie;
use super::error::Error;
use super::overlay::Overlay;
use super::revocation::RevocationStore;
use super::throttle::SignInThrottle;

pub trait AuthHandler: Send + Sync {
    /// Identity bound to the request's auth cookie, if any.
    fn user_identifier(&self, headers: &HeaderMap) -> Option<String>;

    /// Map an identifier to the canonical local account name.
    fn user_identifier_to_local_username(&self, identifier: &str) -> Option<String>;

    /// Cookies to set on a successful sign-in. Issues a fresh CSRF token.
    ///
    /// # Errors
    ///
    /// Returns an error when a cookie cannot be built or the token source
    /// fails.
    fn set_sign_in_cookies(
        &self,
        headers: &HeaderMap,
        username: &str,
        persist: bool,
    ) -> Result<Vec<HeaderValue>, Error>;

    /// Re-issue auth cookies on an authenticated request, sliding the
    /// expiration window forward. Keeps the CSRF token already in play so
    /// in-flight forms stay valid.
    ///
    /// # Errors
    ///
    /// Returns an error when a cookie cannot be built.
    fn refresh_auth_cookies(
        &self,
        headers: &HeaderMap,
        username: &str,
        persist: bool,
    ) -> Result<Vec<HeaderValue>, Error>;

    fn supports_refresh(&self) -> bool;

    fn supports_update_credentials(&self) -> bool;
}

/// User-facing sign-in failure, carried as a numeric `error` query
/// parameter so the sign-in page can render the matching message without
/// leaking detail in the URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignInError {
    InvalidLogin,
    Server,
    LicenseLimitReached,
    LicenseSystemUnavailable,
}

impl SignInError {
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::InvalidLogin => 1,
            Self::Server => 2,
            Self::LicenseLimitReached => 3,
            Self::LicenseSystemUnavailable => 4,
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::InvalidLogin),
            "2" => Some(Self::Server),
            "3" => Some(Self::LicenseLimitReached),
            "4" => Some(Self::LicenseSystemUnavailable),
            _ => None,
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidLogin => "Incorrect or invalid username/password",
            Self::Server => "Temporary server error, please try again",
            Self::LicenseLimitReached => {
                "The user limit for this license has been reached, or you are not allowed access."
            }
            Self::LicenseSystemUnavailable => {
                "The license system is temporarily unavailable. Please try again later."
            }
        }
    }
}

/// URL of the sign-in page, optionally carrying the page to return to and
/// an error to display.
#[must_use]
pub fn sign_in_url(app_uri: Option<&str>, error: Option<SignInError>) -> String {
    let mut url = SIGN_IN.to_string();
    let mut separator = '?';
    if let Some(app_uri) = app_uri {
        if !app_uri.is_empty() && app_uri != "/" {
            url.push(separator);
            url.push_str(APP_URI_PARAM);
            url.push('=');
            url.push_str(&urlencoding::encode(app_uri));
            separator = '&';
        }
    }
    if let Some(error) = error {
        url.push(separator);
        url.push_str(ERROR_PARAM);
        url.push('=');
        url.push_str(&error.code().to_string());
    }
    url
}

pub struct AuthService {
    handler: Arc<dyn AuthHandler>,
    revocation: RevocationStore,
    throttle: SignInThrottle,
    overlay: Arc<dyn Overlay>,
    monitor: Arc<dyn MonitorClient>,
    config: AuthConfig,
}

impl AuthService {
    #[must_use]
    pub fn new(
        handler: Arc<dyn AuthHandler>,
        revocation: RevocationStore,
        overlay: Arc<dyn Overlay>,
        monitor: Arc<dyn MonitorClient>,
        config: AuthConfig,
    ) -> Self {
        let throttle = SignInThrottle::new(Duration::from_secs(config.throttle_seconds()));
        Self {
            handler,
            revocation,
            throttle,
            overlay,
            monitor,
            config,
        }
    }

    /// Authenticated identity carried by this request, or `None`.
    ///
    /// Revocation is checked against the raw cookie value before the
    /// handler ever sees it, so a signed-out cookie stays dead even while
    /// its signature and expiration remain valid.
    #[must_use]
    pub fn user_identifier(&self, headers: &HeaderMap) -> Option<String> {
        let raw = cookie::cookie_value(headers, USER_ID_COOKIE)?;
        if self.revocation.is_revoked(&raw) {
            return None;
        }
        let identifier = self.handler.user_identifier(headers)?;
        if self.config.require_user_list_cookie() {
            let fingerprint = cookie::cookie_value(headers, USER_LIST_COOKIE)?;
            if fingerprint != self.overlay.user_list_fingerprint() {
                return None;
            }
        }
        Some(identifier)
    }

    #[must_use]
    pub fn local_username(&self, identifier: &str) -> Option<String> {
        self.handler.user_identifier_to_local_username(identifier)
    }

    /// Gate for application pages: the local username when the request is
    /// authenticated, otherwise the sign-in URL to redirect to.
    ///
    /// # Errors
    ///
    /// The error value is the redirect target, with `requested_uri` carried
    /// so sign-in can return the user to where they were headed.
    pub fn main_page_filter(
        &self,
        headers: &HeaderMap,
        requested_uri: &str,
    ) -> Result<String, String> {
        let redirect = || sign_in_url(Some(requested_uri), None);
        let Some(identifier) = self.user_identifier(headers) else {
            return Err(redirect());
        };
        self.local_username(&identifier).ok_or_else(redirect)
    }

    /// Re-issue auth cookies for an authenticated request, preserving the
    /// persistence choice recorded at sign-in.
    ///
    /// Only meaningful under a sliding idle-timeout window: with a zero
    /// timeout the expiration is fixed at issue time, so nothing is
    /// re-issued. Strategies without refresh support get nothing either.
    ///
    /// # Errors
    ///
    /// Returns an error when a cookie cannot be built.
    pub fn refresh_auth_cookies(
        &self,
        headers: &HeaderMap,
        username: &str,
    ) -> Result<Vec<HeaderValue>, Error> {
        if !self.handler.supports_refresh() || self.config.timeout_minutes() == 0 {
            return Ok(Vec::new());
        }
        let persist =
            cookie::cookie_value(headers, PERSIST_AUTH_COOKIE).as_deref() == Some("1");
        self.handler.refresh_auth_cookies(headers, username, persist)
    }

    /// Revoke the request's auth cookie, if it carries one.
    pub fn invalidate_auth_cookie(&self, headers: &HeaderMap) {
        if let Some(raw) = cookie::cookie_value(headers, USER_ID_COOKIE) {
            self.revocation.invalidate(&raw);
        }
    }

    /// Whether `username` must wait before another sign-in attempt. An
    /// allowed call records the attempt.
    #[must_use]
    pub fn is_sign_in_throttled(&self, username: &str) -> bool {
        !self.throttle.check_and_record(username)
    }

    #[must_use]
    pub fn handler(&self) -> &Arc<dyn AuthHandler> {
        &self.handler
    }

    #[must_use]
    pub fn overlay(&self) -> &Arc<dyn Overlay> {
        &self.overlay
    }

    #[must_use]
    pub fn monitor(&self) -> &Arc<dyn MonitorClient> {
        &self.monitor
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::overlay::DefaultOverlay;
    use crate::monitor::LogMonitorClient;
    use axum::http::header::COOKIE;

    struct StaticHandler;

    impl AuthHandler for StaticHandler {
        fn user_identifier(&self, headers: &HeaderMap) -> Option<String> {
            cookie::cookie_value(headers, USER_ID_COOKIE)
        }

        fn user_identifier_to_local_username(&self, identifier: &str) -> Option<String> {
            Some(identifier.to_string())
        }

        fn set_sign_in_cookies(
            &self,
            _headers: &HeaderMap,
            _username: &str,
            _persist: bool,
        ) -> Result<Vec<HeaderValue>, Error> {
            Ok(Vec::new())
        }

        fn refresh_auth_cookies(
            &self,
            _headers: &HeaderMap,
            _username: &str,
            _persist: bool,
        ) -> Result<Vec<HeaderValue>, Error> {
            Ok(vec![HeaderValue::from_static("user-id=refreshed")])
        }

        fn supports_refresh(&self) -> bool {
            true
        }

        fn supports_update_credentials(&self) -> bool {
            false
        }
    }

    fn service(dir: &std::path::Path, config: AuthConfig) -> AuthService {
        let store = RevocationStore::open(dir).unwrap();
        AuthService::new(
            Arc::new(StaticHandler),
            store,
            Arc::new(DefaultOverlay),
            Arc::new(LogMonitorClient),
            config,
        )
    }

    fn headers_with(cookies: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookies).unwrap());
        headers
    }

    #[test]
    fn sign_in_url_formatting() {
        assert_eq!(sign_in_url(None, None), "/auth-sign-in");
        assert_eq!(sign_in_url(Some("/"), None), "/auth-sign-in");
        assert_eq!(
            sign_in_url(Some("/files"), None),
            "/auth-sign-in?appUri=%2Ffiles"
        );
        assert_eq!(
            sign_in_url(Some("/files"), Some(SignInError::InvalidLogin)),
            "/auth-sign-in?appUri=%2Ffiles&error=1"
        );
        assert_eq!(
            sign_in_url(None, Some(SignInError::Server)),
            "/auth-sign-in?error=2"
        );
    }

    #[test]
    fn sign_in_error_codes_round_trip() {
        for error in [
            SignInError::InvalidLogin,
            SignInError::Server,
            SignInError::LicenseLimitReached,
            SignInError::LicenseSystemUnavailable,
        ] {
            assert_eq!(SignInError::from_code(&error.code().to_string()), Some(error));
        }
        assert_eq!(SignInError::from_code("9"), None);
    }

    #[tokio::test]
    async fn revoked_cookie_reads_as_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let config = AuthConfig::new(dir.path(), "/bin/true");
        let service = service(dir.path(), config);

        let headers = headers_with("user-id=alice-token");
        assert_eq!(
            service.user_identifier(&headers),
            Some("alice-token".to_string())
        );

        service.invalidate_auth_cookie(&headers);
        assert_eq!(service.user_identifier(&headers), None);
        assert!(service.main_page_filter(&headers, "/files").is_err());
    }

    #[tokio::test]
    async fn user_list_mismatch_blocks_identity() {
        let dir = tempfile::tempdir().unwrap();
        let config = AuthConfig::new(dir.path(), "/bin/true").with_require_user_list_cookie(true);
        let service = service(dir.path(), config);

        // Fingerprint cookie missing entirely.
        let headers = headers_with("user-id=alice-token");
        assert_eq!(service.user_identifier(&headers), None);

        // Stale fingerprint.
        let headers = headers_with("user-id=alice-token; user-list-id=stale");
        assert_eq!(service.user_identifier(&headers), None);

        let current = DefaultOverlay.user_list_fingerprint();
        let headers = headers_with(&format!("user-id=alice-token; user-list-id={current}"));
        assert_eq!(
            service.user_identifier(&headers),
            Some("alice-token".to_string())
        );
    }

    #[tokio::test]
    async fn main_page_filter_redirects_with_app_uri() {
        let dir = tempfile::tempdir().unwrap();
        let config = AuthConfig::new(dir.path(), "/bin/true");
        let service = service(dir.path(), config);

        let target = service
            .main_page_filter(&HeaderMap::new(), "/workspace")
            .unwrap_err();
        assert_eq!(target, "/auth-sign-in?appUri=%2Fworkspace");
    }

    #[tokio::test]
    async fn refresh_is_suppressed_without_an_idle_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let headers = headers_with("user-id=alice-token");

        let sliding = service(dir.path(), AuthConfig::new(dir.path(), "/bin/true"));
        assert_eq!(
            sliding.refresh_auth_cookies(&headers, "alice").unwrap().len(),
            1
        );

        // Zero idle timeout: the expiration was fixed at issue time.
        let fixed = service(
            dir.path(),
            AuthConfig::new(dir.path(), "/bin/true").with_timeout_minutes(0),
        );
        assert!(fixed.refresh_auth_cookies(&headers, "alice").unwrap().is_empty());
    }

    #[tokio::test]
    async fn throttle_denies_within_window() {
        let dir = tempfile::tempdir().unwrap();
        let config = AuthConfig::new(dir.path(), "/bin/true").with_throttle_seconds(5);
        let service = service(dir.path(), config);

        assert!(!service.is_sign_in_throttled("alice"));
        assert!(service.is_sign_in_throttled("alice"));
        assert!(!service.is_sign_in_throttled("bob"));
    }
}
