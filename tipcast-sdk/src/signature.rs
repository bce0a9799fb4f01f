//! Signature algorithm and verification for tipcast HTTP surfaces.
//!
//! The provider's inbound webhooks and our outbound hook deliveries both
//! carry an HMAC-SHA256 signature over the JSON body:
//!
//! ```text
//! Tipcast-Signature: {unix_timestamp}.{base64_signature}
//! ```
//!
//! where the signature is `HMAC-SHA256("{timestamp}.{json_body}", secret)`.
//! A signature older than [`MAX_SIGNATURE_AGE`] is rejected even if the
//! HMAC verifies, which bounds replay of captured requests.

/// Header name for the HMAC signature.
pub const SIGNATURE_HEADER: &str = "Tipcast-Signature";

/// Header name for admin API authentication (plaintext secret).
pub const ADMIN_AUTH_HEADER: &str = "Tipcast-Admin-Authorization";

/// Maximum allowed age of a signature (in seconds).
pub const MAX_SIGNATURE_AGE: i64 = 5 * 60;

/// Marker trait for payloads that can be carried inside a [`SignedObject`].
pub trait Signature: for<'de> serde::Deserialize<'de> + serde::Serialize {}

/// Errors produced by signature operations.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid header format")]
    InvalidFormat,
    #[error("invalid base64 encoding")]
    InvalidBase64,
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid signature")]
    SignatureMismatch,
    #[error("signature expired")]
    Expired,
}

impl From<ring::error::Unspecified> for SignatureError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

/// A signed JSON body: the typed payload, its timestamp, the exact JSON
/// string the signature covers, and the raw HMAC bytes.
///
/// The JSON string is kept verbatim rather than re-serialized because the
/// signature is over bytes on the wire, not over our struct field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedObject<T: Signature> {
    pub body: T,
    pub timestamp: i64,
    pub json: String,
    pub signature: Box<[u8]>,
}

impl<T: Signature> SignedObject<T> {
    /// Sign `body` with `key`, stamping the current time.
    pub fn new(body: T, key: &[u8]) -> Result<Self, serde_json::Error> {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let json = serde_json::to_string(&body)?;
        let data = format!("{now}.{json}");
        let signature = ring::hmac::sign(
            &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
            data.as_bytes(),
        );
        let signature = signature.as_ref().to_owned().into_boxed_slice();
        Ok(Self {
            body,
            timestamp: now,
            json,
            signature,
        })
    }

    /// Reassemble a [`SignedObject`] from a `Tipcast-Signature` header value
    /// and the raw JSON request body.
    ///
    /// Parses and deserializes only — call [`verify`](Self::verify) to
    /// actually check the HMAC and freshness.
    pub fn from_header_and_body(
        header_value: &str,
        body_json: String,
    ) -> Result<Self, SignatureError> {
        let (timestamp, signature) = parse_signature_header(header_value)?;
        let body: T = serde_json::from_str(&body_json)?;
        Ok(Self {
            body,
            timestamp,
            json: body_json,
            signature,
        })
    }

    /// Verify the HMAC and timestamp freshness, consuming `self` and
    /// returning the authenticated payload.
    pub fn verify(self, key: &[u8]) -> Result<T, SignatureError> {
        let data = format!("{}.{}", self.timestamp, self.json);
        ring::hmac::verify(
            &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
            data.as_bytes(),
            self.signature.as_ref(),
        )?;
        check_timestamp(self.timestamp)?;
        Ok(self.body)
    }

    /// Format the full `Tipcast-Signature` header value (`{ts}.{b64}`).
    pub fn to_header(&self) -> String {
        format_signature_header(self.timestamp, &self.signature)
    }
}

/// Parse a `Tipcast-Signature` header value (`{timestamp}.{base64}`) into
/// `(timestamp, raw_signature_bytes)`.
pub fn parse_signature_header(value: &str) -> Result<(i64, Box<[u8]>), SignatureError> {
    let dot_pos = value.find('.').ok_or(SignatureError::InvalidFormat)?;
    let timestamp: i64 = value[..dot_pos]
        .parse()
        .map_err(|_| SignatureError::InvalidFormat)?;
    let signature_bytes = fast32::base64::RFC4648_NOPAD
        .decode_str(&value[dot_pos + 1..])
        .map_err(|_| SignatureError::InvalidBase64)?
        .into_boxed_slice();
    Ok((timestamp, signature_bytes))
}

/// Format a `{timestamp}.{base64}` header value from its parts.
pub fn format_signature_header(timestamp: i64, signature: &[u8]) -> String {
    format!(
        "{}.{}",
        timestamp,
        fast32::base64::RFC4648_NOPAD.encode(signature)
    )
}

/// Check that a signature timestamp is within [`MAX_SIGNATURE_AGE`].
pub fn check_timestamp(timestamp: i64) -> Result<(), SignatureError> {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    if now - timestamp > MAX_SIGNATURE_AGE {
        return Err(SignatureError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Ping {
        value: u32,
    }

    impl Signature for Ping {}

    const KEY: &[u8] = b"test-secret-key";

    #[test]
    fn sign_and_verify_round_trip() {
        let signed = SignedObject::new(Ping { value: 7 }, KEY).unwrap();
        let header = signed.to_header();
        let json = signed.json.clone();

        let reassembled = SignedObject::<Ping>::from_header_and_body(&header, json).unwrap();
        let body = reassembled.verify(KEY).unwrap();
        assert_eq!(body, Ping { value: 7 });
    }

    #[test]
    fn tampered_body_is_rejected() {
        let signed = SignedObject::new(Ping { value: 7 }, KEY).unwrap();
        let header = signed.to_header();

        let tampered = SignedObject::<Ping>::from_header_and_body(
            &header,
            r#"{"value":9}"#.to_string(),
        )
        .unwrap();
        assert!(matches!(
            tampered.verify(KEY),
            Err(SignatureError::SignatureMismatch)
        ));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let signed = SignedObject::new(Ping { value: 7 }, KEY).unwrap();
        assert!(matches!(
            signed.verify(b"other-key"),
            Err(SignatureError::SignatureMismatch)
        ));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        // Build a signature that is valid but MAX_SIGNATURE_AGE+ old.
        let timestamp = time::OffsetDateTime::now_utc().unix_timestamp() - MAX_SIGNATURE_AGE - 10;
        let json = serde_json::to_string(&Ping { value: 7 }).unwrap();
        let data = format!("{timestamp}.{json}");
        let signature = ring::hmac::sign(
            &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, KEY),
            data.as_bytes(),
        );
        let stale = SignedObject::<Ping> {
            body: Ping { value: 7 },
            timestamp,
            json,
            signature: signature.as_ref().to_owned().into_boxed_slice(),
        };
        assert!(matches!(stale.verify(KEY), Err(SignatureError::Expired)));
    }

    #[test]
    fn header_without_dot_is_invalid() {
        assert!(matches!(
            parse_signature_header("123456789abcdef"),
            Err(SignatureError::InvalidFormat)
        ));
    }

    #[test]
    fn header_round_trip() {
        let header = format_signature_header(1700000000, &[1, 2, 3, 4]);
        let (ts, sig) = parse_signature_header(&header).unwrap();
        assert_eq!(ts, 1700000000);
        assert_eq!(sig.as_ref(), &[1, 2, 3, 4]);
    }
}
