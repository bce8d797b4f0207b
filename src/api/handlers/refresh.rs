use axum::{extract::OriginalUri, response::Response};
use tracing::instrument;

use crate::api::handlers::found;
use crate::auth::sign_in_url;

/// PAM cannot renew credentials without seeing the password again, so a
/// refresh request becomes a trip through the sign-in page with the
/// original destination preserved.
#[instrument]
pub async fn refresh_credentials(OriginalUri(uri): OriginalUri) -> Response {
    let requested = uri.path_and_query().map_or("/", |pq| pq.as_str());
    found(&sign_in_url(Some(requested), None))
}
