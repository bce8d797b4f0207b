pub mod do_sign_in;
pub mod public_key;
pub mod refresh;
pub mod root;
pub mod sign_in;
pub mod sign_out;
pub mod update_credentials;

use axum::http::{header::LOCATION, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// 302 redirect. Sign-in flows need FOUND semantics; a 307 would replay
/// the POST body against the target.
pub fn found(location: &str) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(LOCATION, value);
    }
    response
}

/// Constrain a client-supplied return path to this origin.
pub fn normalize_app_uri(app_uri: Option<&str>) -> String {
    match app_uri {
        None | Some("") => "/".to_string(),
        Some(uri) if uri.starts_with('/') && !uri.starts_with("//") => uri.to_string(),
        Some(uri) => format!("/{uri}"),
    }
}
