//! RSA key pair for encrypted password submission.
//!
//! Lets the sign-in form encrypt `username\npassword` so credentials do not
//! cross the wire in cleartext even without TLS. Defense in depth only -
//! this is not a replacement for transport security.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use secrecy::SecretString;

use super::error::Error;

const KEY_BITS: usize = 2048;

pub struct RsaKeyPair {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl RsaKeyPair {
    /// Generate a fresh per-process key pair.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation fails.
    pub fn generate() -> Result<Self, Error> {
        let mut rng = rand::rngs::OsRng;
        let private = RsaPrivateKey::new(&mut rng, KEY_BITS)?;
        let public = RsaPublicKey::from(&private);
        Ok(Self { private, public })
    }

    /// Public exponent and modulus as lowercase hex, the format the sign-in
    /// page consumes from the public-key endpoint.
    #[must_use]
    pub fn public_key_fields(&self) -> (String, String) {
        (
            format!("{:x}", self.public.e()),
            format!("{:x}", self.public.n()),
        )
    }

    /// Decrypt a base64 ciphertext submitted by the sign-in form.
    ///
    /// # Errors
    ///
    /// Returns an error for bad base64, a ciphertext this key cannot
    /// decrypt, or plaintext that is not UTF-8.
    pub fn decrypt_payload(&self, encrypted: &str) -> Result<String, Error> {
        let ciphertext = STANDARD
            .decode(encrypted.trim())
            .map_err(|_| Error::Base64)?;
        let plaintext = self.private.decrypt(Pkcs1v15Encrypt, &ciphertext)?;
        String::from_utf8(plaintext).map_err(|_| Error::PayloadEncoding)
    }
}

/// Split a decrypted `username\npassword` payload.
///
/// # Errors
///
/// Returns an error when the newline separator is missing; the caller maps
/// that to a generic sign-in failure, never to a crash.
pub fn split_credentials(plaintext: &str) -> Result<(String, SecretString), Error> {
    let Some((username, password)) = plaintext.split_once('\n') else {
        return Err(Error::PayloadFormat);
    };
    Ok((username.to_string(), SecretString::from(password.to_string())))
}
