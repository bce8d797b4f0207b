//! URI and cookie name constants shared across the auth subsystem.
//!
//! Endpoint paths must live at the web root so cookies are set and cleared
//! at the correct scope.

pub const SIGN_IN: &str = "/auth-sign-in";
pub const DO_SIGN_IN: &str = "/auth-do-sign-in";
pub const SIGN_OUT: &str = "/auth-sign-out";
pub const REFRESH_CREDENTIALS: &str = "/auth-refresh-credentials";
pub const UPDATE_CREDENTIALS: &str = "/auth-update-credentials";
pub const PUBLIC_KEY: &str = "/auth-public-key";

pub const USER_ID_COOKIE: &str = "user-id";
pub const USER_LIST_COOKIE: &str = "user-list-id";
pub const PERSIST_AUTH_COOKIE: &str = "persist-auth";
pub const CSRF_TOKEN_COOKIE: &str = "csrf-token";

/// Form field carrying the CSRF token; must match the cookie to mutate state.
pub const CSRF_TOKEN_FIELD: &str = "csrf-token";

pub const APP_URI_PARAM: &str = "appUri";
pub const ERROR_PARAM: &str = "error";
