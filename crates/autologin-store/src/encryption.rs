//! Master-password key derivation and blob encryption.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use crate::error::StoreError;

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;
const PBKDF2_ITERATIONS: u32 = 600_000;

/// AES-256-GCM cipher over the credential blob. Ciphertext layout:
/// 12-byte random nonce followed by the authenticated payload.
pub struct VaultCipher {
    cipher: Aes256Gcm,
}

impl VaultCipher {
    /// Derive the cipher key from a master password and salt.
    pub fn from_password(master_password: &str, salt: &[u8]) -> Result<Self, StoreError> {
        let mut key = [0u8; KEY_SIZE];
        pbkdf2_hmac::<Sha256>(master_password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|err| StoreError::Encryption(format!("invalid key length: {err:?}")))?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, StoreError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let mut ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|err| StoreError::Encryption(format!("encrypt failed: {err:?}")))?;
        let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        output.extend_from_slice(&nonce_bytes);
        output.append(&mut ciphertext);
        Ok(output)
    }

    /// Decrypt a nonce-prefixed blob. An authentication failure means
    /// the master password is wrong or the file was tampered with.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, StoreError> {
        if ciphertext.len() < NONCE_SIZE {
            return Err(StoreError::Encryption("ciphertext too short".to_string()));
        }

        let (nonce_bytes, payload) = ciphertext.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher
            .decrypt(nonce, payload)
            .map_err(|_| StoreError::InvalidMasterPassword)
    }
}

/// Generate a fresh 32-byte salt for key derivation.
pub(crate) fn generate_salt() -> [u8; 32] {
    let mut salt = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher(password: &str) -> VaultCipher {
        VaultCipher::from_password(password, b"test-salt-test-salt-test-salt-32").unwrap()
    }

    #[test]
    fn roundtrip() {
        let c = cipher("hunter2");
        let plaintext = b"{\"sites\":{}}";
        let ciphertext = c.encrypt(plaintext).unwrap();
        let decrypted = c.decrypt(&ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn wrong_password_fails() {
        let ciphertext = cipher("correct").encrypt(b"secret").unwrap();
        let result = cipher("incorrect").decrypt(&ciphertext);
        assert!(matches!(result, Err(StoreError::InvalidMasterPassword)));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let c = cipher("hunter2");
        let mut ciphertext = c.encrypt(b"sensitive data").unwrap();
        let idx = NONCE_SIZE + 1;
        ciphertext[idx] ^= 0xFF;
        assert!(c.decrypt(&ciphertext).is_err());
    }

    #[test]
    fn nonce_uniqueness() {
        let c = cipher("hunter2");
        let ct1 = c.encrypt(b"same input").unwrap();
        let ct2 = c.encrypt(b"same input").unwrap();
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn short_ciphertext_rejected() {
        let c = cipher("hunter2");
        assert!(c.decrypt(b"short").is_err());
    }
}
