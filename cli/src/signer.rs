//! HMAC-SHA1 request signing.
//!
//! The signature header value is `sha1=<lowercase hex>` over the exact body bytes, keyed with the
//! API token.

use std::fmt;

use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::SignError;

type HmacSha1 = Hmac<Sha1>;

const PREFIX: &str = "sha1=";

/// Rendered signature header value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature(String);

impl Signature {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex digest without the `sha1=` prefix.
    pub fn hex(&self) -> &str {
        &self.0[PREFIX.len()..]
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signs `payload` with `secret`.
///
/// # Errors
///
/// `SignError::EmptySecret` when `secret` is empty.
pub fn sign(payload: &[u8], secret: &[u8]) -> Result<Signature, SignError> {
    if secret.is_empty() {
        return Err(SignError::EmptySecret);
    }
    // HMAC accepts keys of any length; the error arm is unreachable for Hmac<Sha1>.
    let mut mac = HmacSha1::new_from_slice(secret).map_err(|_| SignError::EmptySecret)?;
    mac.update(payload);
    let digest = mac.finalize().into_bytes();
    Ok(Signature(format!("{PREFIX}{}", hex::encode(digest))))
}

/// Checks a received `sha1=<hex>` header against `payload`. Comparison is constant time.
pub fn verify_signature(payload: &[u8], header: &str, secret: &[u8]) -> bool {
    let Some(received) = header.strip_prefix(PREFIX) else {
        return false;
    };
    match sign(payload, secret) {
        Ok(expected) => constant_time_eq(received.as_bytes(), expected.hex().as_bytes()),
        Err(_) => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
