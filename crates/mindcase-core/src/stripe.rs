use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of the signature timestamp, bounding replay of a
/// captured signed payload.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Stripe webhook signature verification.
///
/// Stripe signs the raw request body and sends the result in the
/// `Stripe-Signature` header as `t=<unix>,v1=<hex>[,v1=<hex>...,v0=...]`.
/// The signed payload is `"{t}.{body}"` and the scheme is HMAC-SHA256 with the
/// endpoint's webhook secret.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// Header missing `t=` or any `v1=` entry, or otherwise unparseable.
    MalformedHeader,

    /// No `v1` signature matched the expected HMAC.
    NoMatchingSignature,

    /// The header timestamp is further than the tolerance from now.
    TimestampOutOfTolerance,
}

impl std::fmt::Display for SignatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureError::MalformedHeader => write!(f, "Malformed Stripe-Signature header"),
            SignatureError::NoMatchingSignature => {
                write!(f, "No matching v1 signature in Stripe-Signature header")
            }
            SignatureError::TimestampOutOfTolerance => {
                write!(f, "Stripe-Signature timestamp outside the accepted window")
            }
        }
    }
}

impl std::error::Error for SignatureError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1_signatures: Vec<String>,
}

/// Parse a `Stripe-Signature` header value.
pub fn parse_signature_header(header: &str) -> Result<SignatureHeader, SignatureError> {
    let mut timestamp = None;
    let mut v1_signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => v1_signatures.push(value.to_string()),
            _ => {}
        }
    }

    match (timestamp, v1_signatures.is_empty()) {
        (Some(timestamp), false) => Ok(SignatureHeader {
            timestamp,
            v1_signatures,
        }),
        _ => Err(SignatureError::MalformedHeader),
    }
}

/// Compute the expected `v1` signature (lowercase hex) for a payload.
pub fn expected_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);

    mac.finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Verify a raw webhook body against a `Stripe-Signature` header. The
/// timestamp must fall within [`SIGNATURE_TOLERANCE_SECS`] of `now`.
pub fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let parsed = parse_signature_header(header)?;
    if (now - parsed.timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::TimestampOutOfTolerance);
    }
    let expected = expected_signature(secret, parsed.timestamp, payload);

    if parsed
        .v1_signatures
        .iter()
        .any(|candidate| constant_time_eq(candidate, &expected))
    {
        Ok(())
    } else {
        Err(SignatureError::NoMatchingSignature)
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_signature_header() {
        let parsed = parse_signature_header("t=1492774577,v1=abc123,v0=legacy").unwrap();
        assert_eq!(parsed.timestamp, 1492774577);
        assert_eq!(parsed.v1_signatures, vec!["abc123".to_string()]);
    }

    #[test]
    fn test_parse_rejects_missing_parts() {
        assert_eq!(
            parse_signature_header("v1=abc123"),
            Err(SignatureError::MalformedHeader)
        );
        assert_eq!(
            parse_signature_header("t=1492774577"),
            Err(SignatureError::MalformedHeader)
        );
        assert_eq!(
            parse_signature_header("garbage"),
            Err(SignatureError::MalformedHeader)
        );
    }

    #[test]
    fn test_verify_roundtrip() {
        let secret = "whsec_test";
        let payload = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;
        let sig = expected_signature(secret, 1700000000, payload);
        let header = format!("t=1700000000,v1={sig}");
        let now = 1700000010;

        assert!(verify_signature(secret, &header, payload, now).is_ok());
        assert_eq!(
            verify_signature("whsec_other", &header, payload, now),
            Err(SignatureError::NoMatchingSignature)
        );
        assert_eq!(
            verify_signature(secret, &header, b"tampered", now),
            Err(SignatureError::NoMatchingSignature)
        );
    }

    #[test]
    fn test_verify_accepts_any_matching_v1() {
        let secret = "whsec_test";
        let payload = b"body";
        let sig = expected_signature(secret, 42, payload);
        let header = format!("t=42,v1=deadbeef,v1={sig}");
        assert!(verify_signature(secret, &header, payload, 42).is_ok());
    }

    #[test]
    fn test_verify_rejects_replayed_timestamp() {
        let secret = "whsec_test";
        let payload = b"body";
        let sig = expected_signature(secret, 1700000000, payload);
        let header = format!("t=1700000000,v1={sig}");

        // A correctly signed payload replayed outside the window fails.
        assert_eq!(
            verify_signature(secret, &header, payload, 1700000000 + SIGNATURE_TOLERANCE_SECS + 1),
            Err(SignatureError::TimestampOutOfTolerance)
        );
        // The boundary itself is still accepted.
        assert!(verify_signature(
            secret,
            &header,
            payload,
            1700000000 + SIGNATURE_TOLERANCE_SECS
        )
        .is_ok());
    }
}
