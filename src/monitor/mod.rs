//! Audit events for the authentication lifecycle.

/// Scope tag carried on every event this subsystem emits, so a shared
/// monitoring pipeline can tell auth records from other producers.
pub const AUTH_SCOPE: &str = "auth";

pub enum AuthEvent {
    Login,
    LoginFailed,
    SignOut,
}

impl AuthEvent {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::LoginFailed => "login-failed",
            Self::SignOut => "sign-out",
        }
    }
}

pub trait MonitorClient: Send + Sync {
    fn log_event(&self, event: &AuthEvent, username: &str);
}

/// Default sink: structured log records, one per event.
pub struct LogMonitorClient;

impl MonitorClient for LogMonitorClient {
    fn log_event(&self, event: &AuthEvent, username: &str) {
        tracing::info!(
            scope = AUTH_SCOPE,
            event = event.as_str(),
            username,
            "auth event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_are_stable() {
        assert_eq!(AUTH_SCOPE, "auth");
        assert_eq!(AuthEvent::Login.as_str(), "login");
        assert_eq!(AuthEvent::LoginFailed.as_str(), "login-failed");
        assert_eq!(AuthEvent::SignOut.as_str(), "sign-out");
    }
}
