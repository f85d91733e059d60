use anyhow::{anyhow, Result};
use base64::prelude::*;
use hmac::{Hmac, Mac};
use rand::RngExt;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::storage::ListCursor;

/// Cursor data for pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorData {
    pub created_at: i64,
    pub id: i64,
}

impl From<CursorData> for ListCursor {
    fn from(data: CursorData) -> Self {
        ListCursor {
            created_at: data.created_at,
            id: data.id,
        }
    }
}

/// Signs and verifies opaque listing cursors.
///
/// Without a configured secret a random key is generated, so cursors do not
/// survive restarts.
pub struct CursorSigner {
    key: Vec<u8>,
}

impl CursorSigner {
    pub fn new(secret: Option<&str>) -> Self {
        let key = match secret {
            Some(s) => s.as_bytes().to_vec(),
            None => rand::rng().random::<[u8; 32]>().to_vec(),
        };
        Self { key }
    }

    fn mac(&self) -> Result<Hmac<Sha256>> {
        Hmac::<Sha256>::new_from_slice(&self.key).map_err(|e| anyhow!("Failed to create HMAC: {}", e))
    }

    /// Create a signed cursor from data
    pub fn create(&self, data: &CursorData) -> Result<String> {
        let json = serde_json::to_string(data)?;
        let payload = BASE64_URL_SAFE_NO_PAD.encode(json.as_bytes());

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature_b64 = BASE64_URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", payload, signature_b64))
    }

    /// Verify and decode a cursor
    pub fn verify(&self, cursor: &str) -> Result<CursorData> {
        let (payload, signature_b64) = cursor
            .split_once('.')
            .filter(|(_, sig)| !sig.contains('.'))
            .ok_or_else(|| anyhow!("Invalid cursor format"))?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let expected_bytes = mac.finalize().into_bytes();

        let provided_bytes = BASE64_URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| anyhow!("Invalid cursor signature encoding"))?;

        // Constant-time comparison
        if !bool::from(expected_bytes.ct_eq(&provided_bytes[..])) {
            return Err(anyhow!("Cursor signature verification failed"));
        }

        let json_bytes = BASE64_URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| anyhow!("Invalid cursor payload encoding"))?;
        serde_json::from_slice(&json_bytes).map_err(|_| anyhow!("Invalid cursor data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> CursorSigner {
        CursorSigner::new(Some("test_secret_key_for_hmac_signing"))
    }

    #[test]
    fn test_cursor_create_and_verify() {
        let data = CursorData {
            created_at: 1234567890,
            id: 42,
        };

        let cursor = signer().create(&data).unwrap();
        assert_eq!(signer().verify(&cursor).unwrap(), data);
    }

    #[test]
    fn test_cursor_tampering_detection() {
        let signer = signer();
        let cursor = signer
            .create(&CursorData {
                created_at: 1234567890,
                id: 42,
            })
            .unwrap();

        let (_, signature) = cursor.split_once('.').unwrap();
        let forged_payload = BASE64_URL_SAFE_NO_PAD.encode(br#"{"created_at":1,"id":1}"#);

        assert!(signer.verify(&format!("{}.invalid_signature", forged_payload)).is_err());
        assert!(signer.verify(&format!("{}.{}", forged_payload, signature)).is_err());
    }

    #[test]
    fn test_cursor_from_other_key_rejected() {
        let data = CursorData { created_at: 1, id: 1 };
        let cursor = CursorSigner::new(Some("other")).create(&data).unwrap();
        assert!(signer().verify(&cursor).is_err());
    }

    #[test]
    fn test_cursor_invalid_format() {
        let signer = signer();
        assert!(signer.verify("invalid").is_err());
        assert!(signer.verify("invalid.format.extra").is_err());
    }

    #[test]
    fn test_random_keys_differ() {
        let data = CursorData { created_at: 5, id: 6 };
        let cursor = CursorSigner::new(None).create(&data).unwrap();
        assert!(CursorSigner::new(None).verify(&cursor).is_err());
    }
}
