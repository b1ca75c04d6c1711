//! The on-wire envelope blob layout (§6.4): base64 of
//! `u32 LE dek_len | wrapped_dek | iv(12) | ciphertext | tag(16)`.
//!
//! Stable across providers — only the wrapping of the DEK differs between
//! `LocalDev`, `AzureKeyVault`, and `AwsKms`; the outer envelope and the
//! AES-256-GCM framing around the plaintext are identical.

use base64::Engine;

pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum BlobError {
    #[error("envelope blob is not valid base64")]
    BadBase64,
    #[error("envelope blob is shorter than the minimum framing overhead")]
    Truncated,
    #[error("envelope blob's declared dek_len does not match the remaining bytes")]
    BadDekLen,
}

/// The parsed envelope, borrowing from the decoded byte buffer.
pub struct Envelope<'a> {
    pub wrapped_dek: &'a [u8],
    pub iv: [u8; IV_LEN],
    pub ciphertext_and_tag: &'a [u8],
}

/// Encodes `wrapped_dek | iv | ciphertext_and_tag` into the base64 wire
/// format.
pub fn encode(wrapped_dek: &[u8], iv: [u8; IV_LEN], ciphertext_and_tag: &[u8]) -> String {
    let mut raw = Vec::with_capacity(4 + wrapped_dek.len() + IV_LEN + ciphertext_and_tag.len());
    raw.extend_from_slice(&(wrapped_dek.len() as u32).to_le_bytes());
    raw.extend_from_slice(wrapped_dek);
    raw.extend_from_slice(&iv);
    raw.extend_from_slice(ciphertext_and_tag);
    base64::engine::general_purpose::STANDARD.encode(raw)
}

/// Decodes a blob string into its raw owned bytes, then hands back a view
/// into it. Callers that need the parts beyond the borrow's lifetime should
/// copy what they need immediately.
pub fn decode(blob: &str) -> Result<Vec<u8>, BlobError> {
    base64::engine::general_purpose::STANDARD
        .decode(blob)
        .map_err(|_| BlobError::BadBase64)
}

pub fn parse(raw: &[u8]) -> Result<Envelope<'_>, BlobError> {
    if raw.len() < 4 {
        return Err(BlobError::Truncated);
    }
    let dek_len = u32::from_le_bytes(raw[0..4].try_into().unwrap()) as usize;
    let rest = &raw[4..];
    if rest.len() < dek_len + IV_LEN + TAG_LEN {
        return Err(BlobError::BadDekLen);
    }
    let (wrapped_dek, rest) = rest.split_at(dek_len);
    let (iv, ciphertext_and_tag) = rest.split_at(IV_LEN);
    Ok(Envelope {
        wrapped_dek,
        iv: iv.try_into().expect("split_at(IV_LEN) guarantees this length"),
        ciphertext_and_tag,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips() {
        let wrapped_dek = vec![1u8, 2, 3, 4, 5];
        let iv = [9u8; IV_LEN];
        let ciphertext_and_tag = vec![7u8; 32 + TAG_LEN];

        let blob = encode(&wrapped_dek, iv, &ciphertext_and_tag);
        let raw = decode(&blob).unwrap();
        let parsed = parse(&raw).unwrap();

        assert_eq!(parsed.wrapped_dek, wrapped_dek.as_slice());
        assert_eq!(parsed.iv, iv);
        assert_eq!(parsed.ciphertext_and_tag, ciphertext_and_tag.as_slice());
    }

    #[test]
    fn rejects_truncated_blob() {
        let raw = decode(&base64::engine::general_purpose::STANDARD.encode([1u8, 2])).unwrap();
        assert_eq!(parse(&raw).unwrap_err(), BlobError::Truncated);
    }

    #[test]
    fn rejects_bad_base64() {
        assert_eq!(decode("not base64!!").unwrap_err(), BlobError::BadBase64);
    }

    #[test]
    fn rejects_inconsistent_dek_len() {
        let mut raw = vec![];
        raw.extend_from_slice(&100u32.to_le_bytes());
        raw.extend_from_slice(&[1, 2, 3]);
        assert_eq!(parse(&raw).unwrap_err(), BlobError::BadDekLen);
    }
}
