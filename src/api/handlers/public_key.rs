use axum::{
    extract::Extension,
    http::{header::CACHE_CONTROL, HeaderMap, HeaderValue},
    response::IntoResponse,
};
use tracing::instrument;

use crate::api::Services;

/// Expose the RSA public key as `exponent:modulus` hex so the sign-in page
/// can encrypt credentials before submitting them.
#[instrument(skip(services))]
pub async fn public_key(Extension(services): Extension<Services>) -> impl IntoResponse {
    let (exponent, modulus) = services.keypair.public_key_fields();
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    (headers, format!("{exponent}:{modulus}"))
}
