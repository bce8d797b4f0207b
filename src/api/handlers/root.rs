use axum::{
    extract::{Extension, OriginalUri},
    http::{header::SET_COOKIE, HeaderMap},
    response::{Html, IntoResponse, Response},
};
use tracing::{error, instrument};

use crate::api::handlers::found;
use crate::api::Services;

/// Application page behind the auth filter. Authenticated requests also
/// get their cookies re-issued, keeping the sliding window moving.
#[instrument(skip(services, headers))]
pub async fn root(
    Extension(services): Extension<Services>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let requested = uri.path_and_query().map_or("/", |pq| pq.as_str());
    match services.auth.main_page_filter(&headers, requested) {
        Ok(username) => {
            let mut response = Html(format!("<p>Signed in as {username}</p>")).into_response();
            match services.auth.refresh_auth_cookies(&headers, &username) {
                Ok(cookies) => {
                    for cookie in cookies {
                        response.headers_mut().append(SET_COOKIE, cookie);
                    }
                }
                Err(err) => error!("Unable to refresh auth cookies: {err}"),
            }
            response
        }
        Err(redirect) => found(&redirect),
    }
}
