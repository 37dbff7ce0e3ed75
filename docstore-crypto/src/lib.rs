//! Per-field encryption envelope: PBKDF2-HMAC-SHA256 key derivation,
//! AES-256-GCM per-field ciphertext, and key rotation primitives.
//!
//! This crate owns the cryptography only. The engine crate decides *which*
//! fields of *which* records are sensitive (via [`is_sensitive`]) and drives
//! rotation across a table's rows — this crate has no notion of a table or
//! a record store.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::Hmac;
use rand::RngCore;
use sha2::Sha256;

use docstore_core::constants::{AES_GCM_IV_LEN, MIN_PASSPHRASE_LEN, PBKDF2_ITERATIONS, SALT_LEN};
use docstore_core::errors::{CryptoError, DocstoreResult};

pub use docstore_core::constants::is_sensitive_field as is_sensitive;

/// A derived AES-256 key plus the salt it was derived with. The salt must
/// be persisted alongside the key handle, but never logged, so the same
/// passphrase
/// rederives the same key on reopen.
#[derive(Clone)]
pub struct KeyHandle {
    key: [u8; 32],
    salt: [u8; SALT_LEN],
}

impl std::fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyHandle").field("salt_len", &self.salt.len()).finish()
    }
}

impl KeyHandle {
    pub fn salt(&self) -> [u8; SALT_LEN] {
        self.salt
    }
}

/// Derive a 256-bit AES key from `passphrase` via PBKDF2-HMAC-SHA256 with
/// [`PBKDF2_ITERATIONS`] rounds. A random salt is generated when `salt` is
/// `None`; pass the previously persisted salt to rederive the same key.
pub fn derive_key(passphrase: &str, salt: Option<[u8; SALT_LEN]>) -> DocstoreResult<KeyHandle> {
    if passphrase.chars().count() < MIN_PASSPHRASE_LEN {
        return Err(CryptoError::PassphraseTooShort { min: MIN_PASSPHRASE_LEN }.into());
    }
    let salt = salt.unwrap_or_else(|| {
        let mut s = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut s);
        s
    });

    let mut key = [0u8; 32];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(passphrase.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut key)
        .map_err(|_| CryptoError::EncryptionFailed {
            field: "<key derivation>".into(),
            reason: "PBKDF2 output length invalid".into(),
        })?;

    Ok(KeyHandle { key, salt })
}

/// Encrypt one field's plaintext under `key`. A fresh 12-byte IV is drawn
/// per call; the stored form is `base64(IV ‖ ciphertext ‖ tag)`.
pub fn encrypt_field(key: &KeyHandle, field: &str, plaintext: &str) -> DocstoreResult<String> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.key));
    let mut iv = [0u8; AES_GCM_IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed {
            field: field.to_string(),
            reason: e.to_string(),
        })?;

    let mut envelope = Vec::with_capacity(iv.len() + ciphertext.len());
    envelope.extend_from_slice(&iv);
    envelope.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(envelope))
}

/// Decrypt one field's ciphertext envelope. Decryption failure is fatal
/// for that read; it never silently returns plaintext.
pub fn decrypt_field(key: &KeyHandle, field: &str, envelope_b64: &str) -> DocstoreResult<String> {
    let envelope = BASE64
        .decode(envelope_b64)
        .map_err(|_| CryptoError::MalformedEnvelope { field: field.to_string() })?;
    if envelope.len() < AES_GCM_IV_LEN {
        return Err(CryptoError::MalformedEnvelope { field: field.to_string() }.into());
    }
    let (iv, ciphertext) = envelope.split_at(AES_GCM_IV_LEN);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed { field: field.to_string() })?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed { field: field.to_string() }.into())
}

/// Re-encrypt one field's ciphertext under a new key, for rotation. Fails
/// (without touching anything) if the field doesn't decrypt under `old`.
pub fn reencrypt_field(old: &KeyHandle, new: &KeyHandle, field: &str, envelope_b64: &str) -> DocstoreResult<String> {
    let plaintext = decrypt_field(old, field, envelope_b64)?;
    encrypt_field(new, field, &plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_passphrase_is_rejected() {
        assert!(derive_key("short", None).is_err());
    }

    #[test]
    fn round_trips_through_encrypt_decrypt() {
        let key = derive_key("hunter22", None).unwrap();
        let ciphertext = encrypt_field(&key, "password", "s3cr3t").unwrap();
        assert!(!ciphertext.contains("s3cr3t"));
        let plaintext = decrypt_field(&key, "password", &ciphertext).unwrap();
        assert_eq!(plaintext, "s3cr3t");
    }

    #[test]
    fn same_passphrase_and_salt_rederive_the_same_key() {
        let a = derive_key("hunter22", None).unwrap();
        let b = derive_key("hunter22", Some(a.salt())).unwrap();
        let ciphertext = encrypt_field(&a, "password", "s3cr3t").unwrap();
        assert_eq!(decrypt_field(&b, "password", &ciphertext).unwrap(), "s3cr3t");
    }

    #[test]
    fn decryption_with_the_wrong_key_fails_fatally() {
        let a = derive_key("hunter22", None).unwrap();
        let b = derive_key("completely-different", None).unwrap();
        let ciphertext = encrypt_field(&a, "password", "s3cr3t").unwrap();
        assert!(decrypt_field(&b, "password", &ciphertext).is_err());
    }

    #[test]
    fn two_encryptions_of_the_same_plaintext_use_different_ivs() {
        let key = derive_key("hunter22", None).unwrap();
        let a = encrypt_field(&key, "password", "s3cr3t").unwrap();
        let b = encrypt_field(&key, "password", "s3cr3t").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rotation_reencrypts_under_the_new_key() {
        let old = derive_key("hunter22", None).unwrap();
        let new = derive_key("newkey123", None).unwrap();
        let original = encrypt_field(&old, "password", "s3cr3t").unwrap();
        let rotated = reencrypt_field(&old, &new, "password", &original).unwrap();
        assert!(decrypt_field(&old, "password", &rotated).is_err());
        assert_eq!(decrypt_field(&new, "password", &rotated).unwrap(), "s3cr3t");
    }
}
