// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reversible confidentiality transform for sensitive columns.
//!
//! Values are sealed with AES-256-GCM under a fresh random 96-bit nonce and
//! stored as `base64(nonce || ciphertext || tag)`. RFID tags additionally get
//! a deterministic HMAC-SHA256 digest so equality lookups never need to open
//! every row.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lectern_core::LecternError;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use ring::{digest, hmac};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

/// Holds the 256-bit key for sensitive-field encryption.
///
/// Debug output omits the key.
pub struct FieldCipher {
    key: Zeroizing<[u8; 32]>,
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher")
            .field("key", &"[REDACTED]")
            .field("key_ref", &self.key_ref())
            .finish()
    }
}

impl FieldCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Build a cipher from a 64-character hex key.
    pub fn from_hex(secret: &SecretString) -> Result<Self, LecternError> {
        let bytes = Zeroizing::new(
            hex::decode(secret.expose_secret().trim())
                .map_err(|_| LecternError::Crypto("encryption key is not valid hex".into()))?,
        );
        let key: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| LecternError::Crypto("encryption key must be 32 bytes".into()))?;
        Ok(Self::new(key))
    }

    /// Generate a random key.
    pub fn generate() -> Result<Self, LecternError> {
        let mut key = [0u8; 32];
        SystemRandom::new()
            .fill(&mut key)
            .map_err(|_| LecternError::Crypto("failed to generate random key".into()))?;
        Ok(Self::new(key))
    }

    /// Non-secret reference to the key, stored alongside the data so a wrong
    /// key is detected before any row is read.
    pub fn key_ref(&self) -> String {
        let hash = digest::digest(&digest::SHA256, self.key.as_slice());
        hex::encode(&hash.as_ref()[..8])
    }

    /// Encrypt a value.
    pub fn seal(&self, plaintext: &str) -> Result<String, LecternError> {
        let key = self.aead_key()?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        SystemRandom::new()
            .fill(&mut nonce_bytes)
            .map_err(|_| LecternError::Crypto("failed to generate random nonce".into()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| LecternError::Crypto("AES-256-GCM encryption failed".into()))?;

        let mut encoded = Vec::with_capacity(NONCE_LEN + in_out.len());
        encoded.extend_from_slice(&nonce_bytes);
        encoded.extend_from_slice(&in_out);
        Ok(STANDARD.encode(encoded))
    }

    /// Decrypt a value produced by [`FieldCipher::seal`].
    pub fn open(&self, sealed: &str) -> Result<String, LecternError> {
        let raw = STANDARD
            .decode(sealed)
            .map_err(|_| LecternError::Crypto("sealed value is not valid base64".into()))?;
        if raw.len() < NONCE_LEN {
            return Err(LecternError::Crypto("sealed value is truncated".into()));
        }
        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| LecternError::Crypto("invalid nonce".into()))?;

        let key = self.aead_key()?;
        let mut in_out = ciphertext.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| {
                LecternError::Crypto(
                    "AES-256-GCM decryption failed -- wrong key or corrupted data".into(),
                )
            })?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| LecternError::Crypto("decrypted value is not UTF-8".into()))
    }

    /// Encrypt an optional value.
    pub fn seal_opt(&self, value: Option<&str>) -> Result<Option<String>, LecternError> {
        value.map(|v| self.seal(v)).transpose()
    }

    /// Decrypt an optional value.
    pub fn open_opt(&self, value: Option<&str>) -> Result<Option<String>, LecternError> {
        value.map(|v| self.open(v)).transpose()
    }

    /// Deterministic digest of an RFID tag for equality lookup.
    pub fn rfid_digest(&self, rfid: &str) -> String {
        let key = hmac::Key::new(hmac::HMAC_SHA256, self.key.as_slice());
        hex::encode(hmac::sign(&key, rfid.trim().as_bytes()).as_ref())
    }

    fn aead_key(&self) -> Result<LessSafeKey, LecternError> {
        let unbound = UnboundKey::new(&AES_256_GCM, self.key.as_slice())
            .map_err(|_| LecternError::Crypto("failed to create AES-256-GCM key".into()))?;
        Ok(LessSafeKey::new(unbound))
    }
}
