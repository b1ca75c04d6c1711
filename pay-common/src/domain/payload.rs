//! The 93-byte plaintext payload sealed inside every wallet's encrypted
//! blob: `magic | version | timestamp | user_id | secret_key`.
//!
//! Binding the payload to `user_id` is what turns a decryption success
//! into an *ownership* proof: a row-swap attack that points one user's
//! wallet row at another user's blob still fails `UserMismatch` even if
//! both blobs decrypt cleanly under the same master key.

use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

const MAGIC: [u8; 4] = *b"PPWK";
const VERSION: u8 = 1;

pub const PAYLOAD_LEN: usize = 4 + 1 + 8 + 16 + 64;

#[derive(thiserror::Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum PayloadError {
    #[error("encrypted payload has the wrong length: expected {PAYLOAD_LEN}, got {0}")]
    WrongLength(usize),
    #[error("encrypted payload has an unrecognized magic value")]
    BadMagic,
    #[error("encrypted payload version {0} is not supported")]
    UnsupportedVersion(u8),
}

/// The decrypted secret material. Zeroized on drop; callers must not clone
/// it out into a longer-lived buffer.
#[derive(ZeroizeOnDrop)]
pub struct EncryptedPayload {
    #[zeroize(skip)]
    pub timestamp: i64,
    #[zeroize(skip)]
    pub user_id: Uuid,
    pub secret_key: [u8; 64],
}

impl EncryptedPayload {
    pub fn new(timestamp: i64, user_id: Uuid, secret_key: [u8; 64]) -> Self {
        Self {
            timestamp,
            user_id,
            secret_key,
        }
    }

    pub fn encode(&self) -> [u8; PAYLOAD_LEN] {
        let mut out = [0u8; PAYLOAD_LEN];
        let mut offset = 0;
        out[offset..offset + 4].copy_from_slice(&MAGIC);
        offset += 4;
        out[offset] = VERSION;
        offset += 1;
        out[offset..offset + 8].copy_from_slice(&self.timestamp.to_be_bytes());
        offset += 8;
        out[offset..offset + 16].copy_from_slice(self.user_id.as_bytes());
        offset += 16;
        out[offset..offset + 64].copy_from_slice(&self.secret_key);
        out
    }

    /// Decodes and validates magic/version, but does NOT check `user_id`
    /// against an expected owner — that binding check belongs to the
    /// wallet-crypto layer, which knows which user it decrypted on behalf
    /// of.
    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        if bytes.len() != PAYLOAD_LEN {
            return Err(PayloadError::WrongLength(bytes.len()));
        }
        let mut offset = 0;
        if bytes[offset..offset + 4] != MAGIC {
            return Err(PayloadError::BadMagic);
        }
        offset += 4;
        let version = bytes[offset];
        offset += 1;
        if version != VERSION {
            return Err(PayloadError::UnsupportedVersion(version));
        }
        let timestamp = i64::from_be_bytes(bytes[offset..offset + 8].try_into().unwrap());
        offset += 8;
        let user_id = Uuid::from_slice(&bytes[offset..offset + 16])
            .expect("slice is exactly 16 bytes");
        offset += 16;
        let mut secret_key = [0u8; 64];
        secret_key.copy_from_slice(&bytes[offset..offset + 64]);

        Ok(Self {
            timestamp,
            user_id,
            secret_key,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let user_id = Uuid::new_v4();
        let secret_key = [7u8; 64];
        let payload = EncryptedPayload::new(1_700_000_000, user_id, secret_key);
        let encoded = payload.encode();
        assert_eq!(encoded.len(), PAYLOAD_LEN);

        let decoded = EncryptedPayload::decode(&encoded).unwrap();
        assert_eq!(decoded.timestamp, 1_700_000_000);
        assert_eq!(decoded.user_id, user_id);
        assert_eq!(decoded.secret_key, secret_key);
    }

    #[test]
    fn rejects_wrong_length() {
        let err = EncryptedPayload::decode(&[0u8; 10]).unwrap_err();
        assert_eq!(err, PayloadError::WrongLength(10));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = EncryptedPayload::new(0, Uuid::new_v4(), [0u8; 64]).encode();
        bytes[0] = b'X';
        assert_eq!(EncryptedPayload::decode(&bytes).unwrap_err(), PayloadError::BadMagic);
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut bytes = EncryptedPayload::new(0, Uuid::new_v4(), [0u8; 64]).encode();
        bytes[4] = 2;
        assert_eq!(
            EncryptedPayload::decode(&bytes).unwrap_err(),
            PayloadError::UnsupportedVersion(2)
        );
    }
}
