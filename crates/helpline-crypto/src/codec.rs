use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encryption failed")]
    Encrypt,
    /// The stored ciphertext was not produced under this codec's key, or was
    /// tampered with. Must be surfaced to the caller — silently skipping a
    /// broken message would misrepresent chat history.
    #[error("decryption failed: ciphertext corrupt or wrong key")]
    Decrypt,
}

/// Symmetric codec for message bodies. Constructed once at process start and
/// threaded through the chat engine, so tests can use doubles with distinct
/// keys and key rotation stays possible without global mutable state.
#[derive(Clone)]
pub struct Codec {
    key: [u8; 32],
}

impl Codec {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Encrypt a plaintext message body. Returns (ciphertext, nonce).
    pub fn encrypt(&self, plaintext: &str) -> Result<(Vec<u8>, Vec<u8>), CodecError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));

        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CodecError::Encrypt)?;

        Ok((ciphertext, nonce_bytes.to_vec()))
    }

    /// Decrypt a stored message body back to plaintext.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &[u8]) -> Result<String, CodecError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));

        let nonce = Nonce::from_slice(nonce);

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CodecError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| CodecError::Decrypt)
    }
}
