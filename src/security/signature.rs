//! HMAC-SHA256 request signatures with dual-key rotation.
//!
//! Callers sign the raw request body and send the hex digest in the
//! `X-Signature` header. Two secrets may be live at once: the active
//! secret and an optional next secret deployed for a migration window,
//! so consumers can switch over without downtime. The verifier reports
//! which key matched so rotation progress is observable in logs.

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Hex length of a SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Which configured secret matched the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsed {
    Active,
    Next,
}

impl KeyUsed {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyUsed::Active => "active",
            KeyUsed::Next => "next",
        }
    }
}

/// Outcome of a signature verification. Computed per request, never
/// stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureResult {
    pub valid: bool,
    pub key_used: Option<KeyUsed>,
}

impl SignatureResult {
    fn invalid() -> Self {
        Self {
            valid: false,
            key_used: None,
        }
    }

    fn matched(key: KeyUsed) -> Self {
        Self {
            valid: true,
            key_used: Some(key),
        }
    }
}

/// Extract the hex digest from an `X-Signature` header value.
///
/// Accepts `<64-hex>` or `sha256=<64-hex>` (hex case-insensitive).
/// Returns `None` for anything else so malformed input fails before any
/// MAC computation.
pub fn parse_header(value: &str) -> Option<&str> {
    let hex_part = value.strip_prefix("sha256=").unwrap_or(value);
    if hex_part.len() == DIGEST_HEX_LEN && hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
        Some(hex_part)
    } else {
        None
    }
}

/// Verify a signature over the raw request body against one or two
/// candidate secrets.
///
/// The active secret is tried first; the next secret only if present and
/// distinct. Every failure mode (malformed hex, wrong body, wrong
/// secret) collapses to `valid == false` so callers cannot build an
/// oracle out of the response.
pub fn verify(
    signature_hex: &str,
    raw_body: &[u8],
    active_secret: &str,
    next_secret: Option<&str>,
) -> SignatureResult {
    if signature_hex.len() != DIGEST_HEX_LEN {
        return SignatureResult::invalid();
    }
    let signature = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return SignatureResult::invalid(),
    };

    if digest_matches(&signature, raw_body, active_secret) {
        return SignatureResult::matched(KeyUsed::Active);
    }
    if let Some(next) = next_secret {
        if next != active_secret && digest_matches(&signature, raw_body, next) {
            return SignatureResult::matched(KeyUsed::Next);
        }
    }

    SignatureResult::invalid()
}

/// Compute the hex signature for a body. Exposed for consumers of the
/// API (SDKs, test harnesses) so both sides share one definition.
pub fn sign(raw_body: &[u8], secret: &str) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(raw_body);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison of the supplied signature against the
/// expected MAC for one secret.
fn digest_matches(signature: &[u8], raw_body: &[u8], secret: &str) -> bool {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(raw_body);
    // verify_slice compares in constant time.
    mac.verify_slice(signature).is_ok()
}
