use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::errors::ServiceError;

type HmacSha256 = Hmac<Sha256>;

/// Parsed `Stripe-Signature` header: `t=<unix>,v1=<hex>[,v1=<hex>...]`
#[derive(Debug, Default)]
struct SignatureHeader<'a> {
    timestamp: Option<i64>,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> SignatureHeader<'_> {
    let mut parsed = SignatureHeader::default();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", ts)) => parsed.timestamp = ts.parse().ok(),
            Some(("v1", sig)) => parsed.signatures.push(sig),
            _ => {}
        }
    }
    parsed
}

fn invalid() -> ServiceError {
    ServiceError::Unauthorized("invalid webhook signature".to_string())
}

/// Computes the `v1` signature for `payload` signed at `timestamp`.
pub fn sign_payload(payload: &[u8], timestamp: i64, secret: &str) -> Result<String, ServiceError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ServiceError::Internal("invalid webhook secret".to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a `Stripe-Signature` header against `payload`.
///
/// The timestamp must be within `tolerance_secs` of `now`, and at least one
/// `v1` entry must match HMAC-SHA256 over `"{t}.{payload}"`.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: u64,
    now: i64,
) -> Result<(), ServiceError> {
    let parsed = parse_header(header);
    let timestamp = parsed.timestamp.ok_or_else(invalid)?;
    if parsed.signatures.is_empty() {
        return Err(invalid());
    }

    if (now - timestamp).unsigned_abs() > tolerance_secs {
        return Err(ServiceError::Unauthorized(
            "webhook timestamp outside tolerance".to_string(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ServiceError::Internal("invalid webhook secret".to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = parsed.signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_unit_test";
    const PAYLOAD: &[u8] = br#"{"type":"checkout.session.completed"}"#;

    #[test]
    fn accepts_valid_signature() {
        let sig = sign_payload(PAYLOAD, 1_700_000_000, SECRET).unwrap();
        let header = format!("t=1700000000,v1={}", sig);
        assert!(verify_signature(PAYLOAD, &header, SECRET, 300, 1_700_000_100).is_ok());
    }

    #[test]
    fn accepts_any_matching_v1_entry() {
        let sig = sign_payload(PAYLOAD, 1_700_000_000, SECRET).unwrap();
        let header = format!("t=1700000000,v1=deadbeef,v1={}", sig);
        assert!(verify_signature(PAYLOAD, &header, SECRET, 300, 1_700_000_000).is_ok());
    }

    #[test]
    fn rejects_tampered_payload() {
        let sig = sign_payload(PAYLOAD, 1_700_000_000, SECRET).unwrap();
        let header = format!("t=1700000000,v1={}", sig);
        let result = verify_signature(b"{}", &header, SECRET, 300, 1_700_000_000);
        assert!(matches!(result, Err(ServiceError::Unauthorized(_))));
    }

    #[test]
    fn rejects_stale_timestamp() {
        let sig = sign_payload(PAYLOAD, 1_700_000_000, SECRET).unwrap();
        let header = format!("t=1700000000,v1={}", sig);
        assert!(verify_signature(PAYLOAD, &header, SECRET, 300, 1_700_000_301).is_err());
    }

    #[test]
    fn rejects_malformed_headers() {
        assert!(verify_signature(PAYLOAD, "", SECRET, 300, 0).is_err());
        assert!(verify_signature(PAYLOAD, "t=abc,v1=00", SECRET, 300, 0).is_err());
        assert!(verify_signature(PAYLOAD, "t=0", SECRET, 300, 0).is_err());
        assert!(verify_signature(PAYLOAD, "t=0,v1=zz", SECRET, 300, 0).is_err());
    }
}
