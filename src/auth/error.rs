use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("revocation list lock at {0} is held by another process")]
    LockContended(PathBuf),
    #[error("could not acquire revocation list lock at {path} after {attempts} attempts")]
    LockUnavailable { path: PathBuf, attempts: u32 },
    #[error("revocation list i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("rsa error: {0}")]
    Rsa(#[from] rsa::errors::Error),
    #[error("invalid base64 payload")]
    Base64,
    #[error("decrypted payload is not valid utf-8")]
    PayloadEncoding,
    #[error("missing newline separator in decrypted payload")]
    PayloadFormat,
    #[error("failed to generate random token")]
    TokenGeneration,
    #[error("cookie is not a valid header value: {0}")]
    CookieHeader(#[from] axum::http::header::InvalidHeaderValue),
}
