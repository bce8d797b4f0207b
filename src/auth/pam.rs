//! PAM-backed credential checks and the cookie strategy built on them.
//!
//! PAM conversations must run with privileges this process does not keep,
//! so verification shells out to a small setuid helper. The helper takes
//! the username as its first argument and reads the password, newline
//! terminated, from stdin; its exit status is the verdict.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{error, warn};

use super::config::AuthConfig;
use super::constants::{CSRF_TOKEN_COOKIE, PERSIST_AUTH_COOKIE, USER_ID_COOKIE, USER_LIST_COOKIE};
use super::cookie::{self, CookieCodec};
use super::csrf;
use super::error::Error;
use super::handler::AuthHandler;
use super::overlay::Overlay;
use super::system;

#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Check `password` for `username` against the system auth database.
    async fn verify(&self, username: &str, password: &SecretString) -> bool;

    fn local_account_exists(&self, username: &str) -> bool;

    fn resolve_local_username(&self, identifier: &str) -> Option<String>;
}

pub struct PamVerifier {
    helper_path: PathBuf,
    require_password_prompt: bool,
}

impl PamVerifier {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            helper_path: config.pam_helper_path().to_path_buf(),
            require_password_prompt: config.pam_require_password_prompt(),
        }
    }
}

#[async_trait]
impl CredentialVerifier for PamVerifier {
    async fn verify(&self, username: &str, password: &SecretString) -> bool {
        // PAM treats an empty password as "prompt me"; refuse it here so a
        // permissive helper stack cannot admit blank logins.
        if password.expose_secret().is_empty() {
            warn!(username, "refusing sign-in attempt with empty password");
            return false;
        }

        let mut child = match Command::new(&self.helper_path)
            .arg(username)
            .arg(if self.require_password_prompt { "1" } else { "0" })
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                error!(
                    "unable to run PAM helper {}: {err}",
                    self.helper_path.display()
                );
                return false;
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            let payload = format!("{}\n", password.expose_secret());
            if let Err(err) = stdin.write_all(payload.as_bytes()).await {
                error!("unable to write password to PAM helper: {err}");
                let _ = child.kill().await;
                return false;
            }
            // Dropping stdin closes the pipe so the helper sees EOF.
        }

        match child.wait().await {
            Ok(status) => status.success(),
            Err(err) => {
                error!("unable to collect PAM helper exit status: {err}");
                false
            }
        }
    }

    fn local_account_exists(&self, username: &str) -> bool {
        system::user_exists(username)
    }

    fn resolve_local_username(&self, identifier: &str) -> Option<String> {
        system::user_from_identifier(identifier)
    }
}

/// Auth handler that binds PAM-verified identities to signed cookies.
pub struct PamStrategy {
    codec: CookieCodec,
    verifier: Arc<dyn CredentialVerifier>,
    overlay: Arc<dyn Overlay>,
    config: AuthConfig,
    // Memoizes identifier lookups, failures included, so repeated requests
    // do not hammer the system user database.
    username_cache: Mutex<HashMap<String, Option<String>>>,
}

impl PamStrategy {
    #[must_use]
    pub fn new(
        codec: CookieCodec,
        verifier: Arc<dyn CredentialVerifier>,
        overlay: Arc<dyn Overlay>,
        config: AuthConfig,
    ) -> Self {
        Self {
            codec,
            verifier,
            overlay,
            config,
            username_cache: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn verifier(&self) -> &Arc<dyn CredentialVerifier> {
        &self.verifier
    }

    /// Signed validity window for an auth cookie. A zero idle timeout
    /// selects the multi-day stay-signed-in policy instead.
    fn cookie_validity(&self) -> chrono::Duration {
        let minutes = self.config.timeout_minutes();
        if minutes == 0 {
            chrono::Duration::days(i64::from(self.config.stay_signed_in_days()))
        } else {
            chrono::Duration::minutes(i64::from(minutes))
        }
    }

    fn issue_cookies(
        &self,
        headers: &HeaderMap,
        username: &str,
        persist: bool,
        reuse_csrf: bool,
    ) -> Result<Vec<HeaderValue>, Error> {
        let secure = self.config.cookies_force_secure() || cookie::request_is_secure(headers);
        let validity = self.cookie_validity();
        // Without persistence the browser holds a session cookie; the signed
        // expiration still bounds its life.
        let max_age = if persist { validity.to_std().ok() } else { None };

        let token = self.codec.issue(username, validity);
        let mut cookies = vec![
            cookie::set_cookie(USER_ID_COOKIE, &token, max_age, true, secure)?,
            cookie::set_cookie(
                USER_LIST_COOKIE,
                &self.overlay.user_list_fingerprint(),
                max_age,
                true,
                secure,
            )?,
            cookie::set_cookie(
                PERSIST_AUTH_COOKIE,
                if persist { "1" } else { "0" },
                max_age,
                true,
                secure,
            )?,
        ];

        let csrf_token = if reuse_csrf {
            cookie::cookie_value(headers, CSRF_TOKEN_COOKIE)
        } else {
            None
        };
        let csrf_token = match csrf_token {
            Some(token) => token,
            None => csrf::generate_token()?,
        };
        cookies.push(cookie::set_cookie(
            CSRF_TOKEN_COOKIE,
            &csrf_token,
            max_age,
            false,
            secure,
        )?);
        Ok(cookies)
    }
}

impl AuthHandler for PamStrategy {
    fn user_identifier(&self, headers: &HeaderMap) -> Option<String> {
        let raw = cookie::cookie_value(headers, USER_ID_COOKIE)?;
        self.codec.read(&raw)
    }

    fn user_identifier_to_local_username(&self, identifier: &str) -> Option<String> {
        let mut cache = self
            .username_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.get(identifier) {
            return cached.clone();
        }
        let resolved = self.verifier.resolve_local_username(identifier);
        cache.insert(identifier.to_string(), resolved.clone());
        resolved
    }

    fn set_sign_in_cookies(
        &self,
        headers: &HeaderMap,
        username: &str,
        persist: bool,
    ) -> Result<Vec<HeaderValue>, Error> {
        self.issue_cookies(headers, username, persist, false)
    }

    fn refresh_auth_cookies(
        &self,
        headers: &HeaderMap,
        username: &str,
        persist: bool,
    ) -> Result<Vec<HeaderValue>, Error> {
        self.issue_cookies(headers, username, persist, true)
    }

    fn supports_refresh(&self) -> bool {
        true
    }

    fn supports_update_credentials(&self) -> bool {
        false
    }
}
