use axum::{extract::Extension, response::IntoResponse, Json};
use serde_json::json;

use crate::api::Services;

/// Re-derive downstream credentials for the active session. The PAM
/// strategy has none to renew, so callers get a JSON-RPC method-not-found
/// and degrade cleanly.
pub async fn update_credentials(Extension(services): Extension<Services>) -> impl IntoResponse {
    if services.auth.handler().supports_update_credentials() {
        Json(json!({ "result": null }))
    } else {
        Json(json!({
            "error": {
                "code": -32601,
                "message": "Method not found",
            }
        }))
    }
}
