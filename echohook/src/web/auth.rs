//! Shared-secret verification for inbound webhooks.
//!
//! Two independent checks, each active only when its secret is configured:
//! - a token header that must equal the configured token exactly
//! - an HMAC-SHA256 signature over the raw request body

use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Outcome of comparing the token header against the configured secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCheck {
    Valid,
    Missing,
    Invalid,
    /// No token configured; every request passes.
    NotConfigured,
}

impl TokenCheck {
    pub fn is_authorized(self) -> bool {
        matches!(self, TokenCheck::Valid | TokenCheck::NotConfigured)
    }
}

/// Check if a secret is set to something other than blanks.
pub fn is_secret_configured(secret: &Option<String>) -> bool {
    secret
        .as_ref()
        .map(|k| !k.trim().is_empty())
        .unwrap_or(false)
}

/// Compare the provided header value to the configured token.
///
/// The comparison is byte-exact and runs in constant time for equal-length
/// inputs. The provided value is not trimmed, and a header present with
/// non-text bytes counts as invalid rather than missing.
pub fn verify_token<P: AsRef<[u8]>>(
    expected: &Option<String>,
    provided: Option<P>,
) -> TokenCheck {
    if !is_secret_configured(expected) {
        return TokenCheck::NotConfigured;
    }
    let expected = expected.as_deref().unwrap_or_default();

    match provided {
        None => TokenCheck::Missing,
        Some(p) if constant_time_eq(p.as_ref(), expected.as_bytes()) => TokenCheck::Valid,
        Some(_) => TokenCheck::Invalid,
    }
}

/// Verify an `X-Webhook-Signature: sha256=<hex>` header against the raw body.
pub fn verify_body_signature(signing_key: &str, body: &[u8], header: Option<&str>) -> bool {
    let Some(header) = header else {
        warn!("webhook_signature_missing");
        return false;
    };

    let Some(hex_sig) = header.trim().strip_prefix(SIGNATURE_PREFIX) else {
        warn!("webhook_signature_bad_format");
        return false;
    };

    let provided = match hex::decode(hex_sig) {
        Ok(bytes) => bytes,
        Err(_) => {
            warn!(signature_length = hex_sig.len(), "webhook_signature_not_hex");
            return false;
        }
    };

    let mut mac = match HmacSha256::new_from_slice(signing_key.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("webhook_signature_invalid_key");
            return false;
        }
    };
    mac.update(body);

    // verify_slice compares in constant time
    let valid = mac.verify_slice(&provided).is_ok();
    if !valid {
        warn!(body_length = body.len(), "webhook_signature_mismatch");
    }
    valid
}

/// Compute the header value a sender would attach for `body`.
pub fn sign_body(signing_key: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(signing_key.as_bytes()).ok()?;
    mac.update(body);
    Some(format!(
        "{}{}",
        SIGNATURE_PREFIX,
        hex::encode(mac.finalize().into_bytes())
    ))
}
