//! Authentication core: signed cookies, revocation, throttling, and the
//! PAM sign-in strategy.

pub mod config;
pub mod constants;
pub mod cookie;
pub mod crypto;
pub mod csrf;
pub mod error;
pub mod file_lock;
pub mod handler;
pub mod overlay;
pub mod pam;
pub mod revocation;
pub mod system;
pub mod throttle;

pub use config::AuthConfig;
pub use cookie::CookieCodec;
pub use error::Error;
pub use handler::{sign_in_url, AuthHandler, AuthService, SignInError};
pub use overlay::{DefaultOverlay, Overlay};
pub use pam::{CredentialVerifier, PamStrategy, PamVerifier};
pub use revocation::RevocationStore;
pub use throttle::SignInThrottle;
