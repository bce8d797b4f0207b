//! Auth subsystem configuration.

use std::path::{Path, PathBuf};

const DEFAULT_TIMEOUT_MINUTES: u32 = 60;
const DEFAULT_STAY_SIGNED_IN_DAYS: u32 = 30;
const DEFAULT_THROTTLE_SECONDS: u64 = 5;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    revocation_dir: PathBuf,
    pam_helper_path: PathBuf,
    pam_require_password_prompt: bool,
    timeout_minutes: u32,
    stay_signed_in_days: u32,
    throttle_seconds: u64,
    encrypt_password: bool,
    cookies_force_secure: bool,
    require_user_list_cookie: bool,
    secure_cookie_key_file: Option<PathBuf>,
}

impl AuthConfig {
    #[must_use]
    pub fn new(revocation_dir: impl Into<PathBuf>, pam_helper_path: impl Into<PathBuf>) -> Self {
        Self {
            revocation_dir: revocation_dir.into(),
            pam_helper_path: pam_helper_path.into(),
            pam_require_password_prompt: true,
            timeout_minutes: DEFAULT_TIMEOUT_MINUTES,
            stay_signed_in_days: DEFAULT_STAY_SIGNED_IN_DAYS,
            throttle_seconds: DEFAULT_THROTTLE_SECONDS,
            encrypt_password: true,
            cookies_force_secure: false,
            require_user_list_cookie: false,
            secure_cookie_key_file: None,
        }
    }

    #[must_use]
    pub fn with_pam_require_password_prompt(mut self, require: bool) -> Self {
        self.pam_require_password_prompt = require;
        self
    }

    /// Idle timeout in minutes; `0` selects the legacy multi-day
    /// stay-signed-in expiration instead of a sliding window.
    #[must_use]
    pub fn with_timeout_minutes(mut self, minutes: u32) -> Self {
        self.timeout_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_stay_signed_in_days(mut self, days: u32) -> Self {
        self.stay_signed_in_days = days;
        self
    }

    #[must_use]
    pub fn with_throttle_seconds(mut self, seconds: u64) -> Self {
        self.throttle_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_encrypt_password(mut self, encrypt: bool) -> Self {
        self.encrypt_password = encrypt;
        self
    }

    #[must_use]
    pub fn with_cookies_force_secure(mut self, force: bool) -> Self {
        self.cookies_force_secure = force;
        self
    }

    #[must_use]
    pub fn with_require_user_list_cookie(mut self, require: bool) -> Self {
        self.require_user_list_cookie = require;
        self
    }

    #[must_use]
    pub fn with_secure_cookie_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.secure_cookie_key_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn revocation_dir(&self) -> &Path {
        &self.revocation_dir
    }

    #[must_use]
    pub fn pam_helper_path(&self) -> &Path {
        &self.pam_helper_path
    }

    #[must_use]
    pub fn pam_require_password_prompt(&self) -> bool {
        self.pam_require_password_prompt
    }

    #[must_use]
    pub fn timeout_minutes(&self) -> u32 {
        self.timeout_minutes
    }

    #[must_use]
    pub fn stay_signed_in_days(&self) -> u32 {
        self.stay_signed_in_days
    }

    #[must_use]
    pub fn throttle_seconds(&self) -> u64 {
        self.throttle_seconds
    }

    #[must_use]
    pub fn encrypt_password(&self) -> bool {
        self.encrypt_password
    }

    #[must_use]
    pub fn cookies_force_secure(&self) -> bool {
        self.cookies_force_secure
    }

    #[must_use]
    pub fn require_user_list_cookie(&self) -> bool {
        self.require_user_list_cookie
    }

    #[must_use]
    pub fn secure_cookie_key_file(&self) -> Option<&Path> {
        self.secure_cookie_key_file.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_overrides() {
        let config = AuthConfig::new("/var/lib/guardpost", "/usr/lib/guardpost/pam-helper");
        assert_eq!(config.timeout_minutes(), DEFAULT_TIMEOUT_MINUTES);
        assert_eq!(config.stay_signed_in_days(), DEFAULT_STAY_SIGNED_IN_DAYS);
        assert_eq!(config.throttle_seconds(), DEFAULT_THROTTLE_SECONDS);
        assert!(config.encrypt_password());
        assert!(config.pam_require_password_prompt());
        assert!(!config.cookies_force_secure());
        assert!(!config.require_user_list_cookie());
        assert!(config.secure_cookie_key_file().is_none());

        let config = config
            .with_timeout_minutes(0)
            .with_stay_signed_in_days(7)
            .with_throttle_seconds(10)
            .with_encrypt_password(false)
            .with_cookies_force_secure(true)
            .with_require_user_list_cookie(true)
            .with_secure_cookie_key_file("/etc/guardpost/key");

        assert_eq!(config.timeout_minutes(), 0);
        assert_eq!(config.stay_signed_in_days(), 7);
        assert_eq!(config.throttle_seconds(), 10);
        assert!(!config.encrypt_password());
        assert!(config.cookies_force_secure());
        assert!(config.require_user_list_cookie());
        assert_eq!(
            config.secure_cookie_key_file(),
            Some(Path::new("/etc/guardpost/key"))
        );
    }
}
