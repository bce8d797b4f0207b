use crate::{
    auth::{
        cookie::{self, CookieCodec},
        crypto::RsaKeyPair,
        pam::{CredentialVerifier, PamStrategy, PamVerifier},
        AuthConfig, AuthService, DefaultOverlay, Overlay, RevocationStore,
    },
    monitor::{LogMonitorClient, MonitorClient},
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;

use crate::auth::constants;

pub mod handlers;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct Services {
    pub auth: Arc<AuthService>,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub keypair: Arc<RsaKeyPair>,
}

/// Wire the auth stack from already-constructed parts.
///
/// Split out from [`build`] so tests can inject a stub verifier and
/// monitor while exercising the real routing and cookie paths.
///
/// # Errors
/// Returns an error if the sign-in key pair cannot be generated
pub fn assemble(
    config: AuthConfig,
    store: RevocationStore,
    verifier: Arc<dyn CredentialVerifier>,
    monitor: Arc<dyn MonitorClient>,
    key: Vec<u8>,
) -> Result<Services> {
    let keypair = Arc::new(RsaKeyPair::generate().context("Failed to generate sign-in key pair")?);
    let overlay: Arc<dyn Overlay> = Arc::new(DefaultOverlay);
    let strategy = Arc::new(PamStrategy::new(
        CookieCodec::new(key),
        verifier.clone(),
        overlay.clone(),
        config.clone(),
    ));
    let auth = Arc::new(AuthService::new(
        strategy,
        store,
        overlay,
        monitor,
        config,
    ));
    Ok(Services {
        auth,
        verifier,
        keypair,
    })
}

/// Construct the production service stack from configuration.
///
/// # Errors
/// Returns an error if the revocation store or signing key cannot be opened
pub async fn build(config: AuthConfig) -> Result<Services> {
    // Startup blocks on the revocation list lock; keep that off the
    // async workers.
    let dir = config.revocation_dir().to_path_buf();
    let store = tokio::task::spawn_blocking(move || RevocationStore::open(&dir))
        .await
        .context("Revocation store startup task failed")??;

    let key_path = match config.secure_cookie_key_file() {
        Some(path) => path.to_path_buf(),
        None => config.revocation_dir().join("secure-cookie-key"),
    };
    let key = cookie::load_or_create_key(&key_path)?;

    let verifier: Arc<dyn CredentialVerifier> = Arc::new(PamVerifier::new(&config));

    assemble(
        config,
        store,
        verifier,
        Arc::new(LogMonitorClient),
        key,
    )
}

#[must_use]
pub fn router(services: Services) -> Router {
    Router::new()
        .route(constants::SIGN_IN, get(handlers::sign_in::sign_in))
        .route(constants::DO_SIGN_IN, post(handlers::do_sign_in::do_sign_in))
        .route(constants::SIGN_OUT, post(handlers::sign_out::sign_out))
        .route(
            constants::REFRESH_CREDENTIALS,
            get(handlers::refresh::refresh_credentials),
        )
        .route(
            constants::UPDATE_CREDENTIALS,
            post(handlers::update_credentials::update_credentials),
        )
        .route(constants::PUBLIC_KEY, get(handlers::public_key::public_key))
        .route("/", get(handlers::root::root))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(services)),
        )
}

/// server
/// # Errors
/// Returns an error if the server fails to start
pub async fn new(port: u16, config: AuthConfig) -> Result<()> {
    let services = build(config).await?;
    let app = router(services);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, request_id)
}
