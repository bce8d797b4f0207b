//! Hooks the hosting product layers over the open core.
//!
//! Licensing and user-list tracking live outside this subsystem; the
//! defaults here admit every local account and present a fixed user-list
//! fingerprint, which is correct for unmanaged installations.

use super::error::Error;

/// Fingerprint presented when no managed user list exists.
const DEFAULT_USER_LIST_FINGERPRINT: &str = "d41d8cd98f00b204e9800998ecf8427e";

pub trait Overlay: Send + Sync {
    /// Whether `username` is licensed to use the product.
    ///
    /// # Errors
    ///
    /// Returns an error when the licensing system cannot be reached; the
    /// caller maps that to its own user-facing failure code.
    fn is_user_licensed(&self, _username: &str) -> Result<bool, Error> {
        Ok(true)
    }

    /// Fingerprint of the current server-side user list. Sessions carry
    /// this in a secondary cookie so out-of-band list changes (e.g. an
    /// account lock) invalidate otherwise-still-valid sessions.
    fn user_list_fingerprint(&self) -> String {
        DEFAULT_USER_LIST_FINGERPRINT.to_string()
    }
}

/// Open-core behavior: everyone licensed, one stable fingerprint.
pub struct DefaultOverlay;

impl Overlay for DefaultOverlay {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_overlay_licenses_everyone() {
        assert!(DefaultOverlay.is_user_licensed("alice").unwrap());
        assert_eq!(
            DefaultOverlay.user_list_fingerprint(),
            DEFAULT_USER_LIST_FINGERPRINT
        );
    }
}
