/// Encryption-envelope errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("passphrase must be at least {min} codepoints")]
    PassphraseTooShort { min: usize },

    #[error("no encryption key is configured")]
    NoKeyConfigured {},

    #[error("field decryption failed: {field}")]
    DecryptionFailed { field: String },

    #[error("field encryption failed: {field}: {reason}")]
    EncryptionFailed { field: String, reason: String },

    #[error("key rotation aborted: {reason}")]
    RotationAborted { reason: String },

    #[error("malformed ciphertext envelope for field {field}")]
    MalformedEnvelope { field: String },
}
