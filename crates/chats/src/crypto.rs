//! Authenticated encryption for message bodies at rest.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::types::CodecError;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// AES-256-GCM sealing of message content.
///
/// Output is `base64(nonce || ciphertext || tag)` with a fresh nonce per call.
#[derive(Clone)]
pub struct EncryptionCodec {
    cipher: Aes256Gcm,
}

impl EncryptionCodec {
    /// Builds a codec from a base64 encoded 32-byte key.
    pub fn from_base64_key(encoded: &str) -> Result<Self, CodecError> {
        let key = STANDARD
            .decode(encoded.trim())
            .map_err(|_| CodecError::InvalidKey)?;
        Self::from_key_bytes(&key)
    }

    pub fn from_key_bytes(key: &[u8]) -> Result<Self, CodecError> {
        if key.len() != KEY_LEN {
            return Err(CodecError::InvalidKey);
        }
        let key = Key::<Aes256Gcm>::from_slice(key);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// A codec with a random key that lives only as long as the process.
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CodecError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CodecError::Encryption)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(blob))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CodecError> {
        let blob = STANDARD
            .decode(encoded)
            .map_err(|_| CodecError::MalformedBlob)?;
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(CodecError::MalformedBlob);
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CodecError::AuthenticationFailure)?;

        String::from_utf8(plaintext).map_err(|_| CodecError::MalformedBlob)
    }
}

impl std::fmt::Debug for EncryptionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionCodec").finish_non_exhaustive()
    }
}
