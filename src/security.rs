//! Field-level encryption for PII at rest.
//!
//! Every sensitive attribute (names, addresses, document numbers, account
//! numbers) is stored as an individually encrypted field so a leaked record
//! never exposes plaintext. The cipher is injected through [`FieldCipher`] so
//! tests can substitute a cheap reversible implementation and deployments can
//! move to envelope encryption without touching the services.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;

/// Opaque ciphertext wrapper. The inner string is base64(nonce || ciphertext)
/// and is safe to persist or serialize; it never appears decrypted in logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encrypted(pub String);

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("encryption failed")]
    Encrypt,
    #[error("ciphertext malformed or key mismatch")]
    Decrypt,
}

/// Symmetric field cipher. Implementations must round-trip every valid
/// string: `decrypt(encrypt(s)) == s`, including the empty string.
pub trait FieldCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<Encrypted, CipherError>;
    fn decrypt(&self, ciphertext: &Encrypted) -> Result<String, CipherError>;
}

/// AES-256-GCM cipher keyed by SHA-256 of the configured secret.
pub struct AesFieldCipher {
    key: [u8; 32],
}

impl AesFieldCipher {
    pub fn new(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }

    fn cipher(&self) -> Result<Aes256Gcm, CipherError> {
        Aes256Gcm::new_from_slice(&self.key).map_err(|_| CipherError::Encrypt)
    }
}

impl FieldCipher for AesFieldCipher {
    fn encrypt(&self, plaintext: &str) -> Result<Encrypted, CipherError> {
        let cipher = self.cipher()?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::Encrypt)?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);
        Ok(Encrypted(BASE64.encode(payload)))
    }

    fn decrypt(&self, ciphertext: &Encrypted) -> Result<String, CipherError> {
        let raw = BASE64
            .decode(ciphertext.0.as_bytes())
            .map_err(|_| CipherError::Decrypt)?;
        if raw.len() < NONCE_LEN {
            return Err(CipherError::Decrypt);
        }
        let (nonce_raw, body) = raw.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| CipherError::Decrypt)?;
        let nonce = Nonce::from_slice(nonce_raw);
        let plaintext = cipher
            .decrypt(nonce, body)
            .map_err(|_| CipherError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| CipherError::Decrypt)
    }
}
