use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-BrandLens-Signature";
pub const EVENT_HEADER: &str = "X-BrandLens-Event";

/// `sha256=<hex>` HMAC-SHA256 of the exact request body.
#[must_use]
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// `Authorization` value for a configured auth header.
///
/// A value that already names a scheme (`Bearer abc`, `Basic dXNlcg==`) is
/// sent verbatim; a bare token becomes `Bearer <token>`.
#[must_use]
pub fn authorization_header(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let has_scheme = raw
        .split_once(' ')
        .is_some_and(|(scheme, rest)| {
            !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                && !rest.trim().is_empty()
        });
    if has_scheme {
        Some(raw.to_string())
    } else {
        Some(format!("Bearer {raw}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_known_vector() {
        // RFC 4231 test case 2.
        assert_eq!(
            sign_payload("Jefe", b"what do ya want for nothing?"),
            "sha256=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn signature_depends_on_secret() {
        assert_ne!(sign_payload("a", b"{}"), sign_payload("b", b"{}"));
    }

    #[test]
    fn auth_header_passthrough_and_bearer() {
        assert_eq!(authorization_header("Bearer abc").as_deref(), Some("Bearer abc"));
        assert_eq!(authorization_header("Basic dXNlcjpwdw==").as_deref(), Some("Basic dXNlcjpwdw=="));
        assert_eq!(authorization_header("  tok_123 ").as_deref(), Some("Bearer tok_123"));
        assert_eq!(authorization_header("   "), None);
    }
}
