//! At-rest encryption for carrier credentials.
//!
//! Carrier passwords and license keys are stored encrypted with AES-256-GCM.
//! The key is derived from the configured master passphrase with
//! PBKDF2-SHA256, using a fresh random salt and nonce for every encryption.
//! Stored format: `base64(salt || nonce || ciphertext || auth_tag)`.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use pbkdf2::pbkdf2_hmac_array;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::ShippingError;

/// Size of the salt for key derivation (16 bytes)
const SALT_SIZE: usize = 16;
/// Size of the nonce for AES-GCM (12 bytes)
const NONCE_SIZE: usize = 12;
/// Number of PBKDF2 iterations
const PBKDF2_ITERATIONS: u32 = 100_000;
/// Size of the derived key (256 bits for AES-256)
const KEY_SIZE: usize = 32;

/// An encrypted secret as stored on carrier profiles.
///
/// Opaque base64 text; only [`SecretCipher`] can produce or open it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedSecret(String);

impl EncryptedSecret {
    /// Wrap already-encrypted text (e.g. loaded from the profile store).
    #[must_use]
    pub fn from_stored(ciphertext: impl Into<String>) -> Self {
        Self(ciphertext.into())
    }

    /// The stored base64 representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Symmetric cipher for carrier credential secrets.
///
/// Constructed once from [`crate::ShippingConfig::credential_key`] and
/// shared wherever profile secrets are written or read.
#[derive(Clone)]
pub struct SecretCipher {
    passphrase: SecretString,
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher")
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

impl SecretCipher {
    /// Create a cipher from the master passphrase.
    #[must_use]
    pub fn new(passphrase: SecretString) -> Self {
        Self { passphrase }
    }

    /// Encrypt a secret for storage.
    ///
    /// Every call uses a fresh random salt and nonce, so encrypting the same
    /// plaintext twice yields different ciphertexts.
    ///
    /// # Errors
    ///
    /// Returns `ShippingError::Crypto` if the cipher cannot be constructed
    /// or encryption fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedSecret, ShippingError> {
        let mut salt = [0u8; SALT_SIZE];
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce_bytes);

        let key = self.derive_key(&salt);
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| ShippingError::Crypto(format!("failed to create cipher: {e}")))?;
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| ShippingError::Crypto(format!("encryption failed: {e:?}")))?;

        // Format: salt || nonce || ciphertext
        let mut buf = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + ciphertext.len());
        buf.extend_from_slice(&salt);
        buf.extend_from_slice(&nonce_bytes);
        buf.extend_from_slice(&ciphertext);

        Ok(EncryptedSecret(BASE64.encode(&buf)))
    }

    /// Decrypt a stored secret.
    ///
    /// # Errors
    ///
    /// Returns `ShippingError::Crypto` on malformed input, a wrong
    /// passphrase, or corrupted ciphertext.
    pub fn decrypt(&self, encrypted: &EncryptedSecret) -> Result<SecretString, ShippingError> {
        let data = BASE64
            .decode(&encrypted.0)
            .map_err(|e| ShippingError::Crypto(format!("invalid base64 encoding: {e}")))?;

        // Minimum: salt + nonce + GCM auth tag
        if data.len() < SALT_SIZE + NONCE_SIZE + 16 {
            return Err(ShippingError::Crypto("encrypted data too short".to_string()));
        }

        let (salt, rest) = data.split_at(SALT_SIZE);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);

        let key = self.derive_key(salt);
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| ShippingError::Crypto(format!("failed to create cipher: {e}")))?;
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = cipher.decrypt(nonce, ciphertext).map_err(|_| {
            ShippingError::Crypto("decryption failed - wrong passphrase or corrupted data".to_string())
        })?;

        let text = String::from_utf8(plaintext)
            .map_err(|_| ShippingError::Crypto("decrypted data is not valid UTF-8".to_string()))?;
        Ok(SecretString::from(text))
    }

    /// Derive a 256-bit key from the passphrase using PBKDF2-SHA256.
    fn derive_key(&self, salt: &[u8]) -> [u8; KEY_SIZE] {
        pbkdf2_hmac_array::<Sha256, KEY_SIZE>(
            self.passphrase.expose_secret().as_bytes(),
            salt,
            PBKDF2_ITERATIONS,
        )
    }
}
