/// Docstore engine version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default primary-key column name when a table doesn't declare one.
pub const DEFAULT_PK_COLUMN: &str = "id";

/// Maximum batch size for bulk operations (bulkInsert/bulkUpdate/bulkDelete).
pub const MAX_BULK_BATCH_SIZE: usize = 1000;

/// Record batch size used when hydrating rows for lexical/vector search
/// results, to bound the working set of any single read transaction.
pub const SEARCH_FETCH_BATCH_SIZE: usize = 100;

/// PBKDF2-HMAC-SHA256 iteration count for key derivation.
pub const PBKDF2_ITERATIONS: u32 = 310_000;

/// Minimum accepted passphrase length, in codepoints.
pub const MIN_PASSPHRASE_LEN: usize = 8;

/// Salt length, in bytes, for key derivation.
pub const SALT_LEN: usize = 16;

/// AES-GCM IV (nonce) length, in bytes.
pub const AES_GCM_IV_LEN: usize = 12;

/// Column-name substrings that mark a field as sensitive (case-insensitive).
pub const SENSITIVE_FIELD_PATTERNS: &[&str] =
    &["password", "secret", "key", "token", "auth"];

/// Auth-hook failure threshold before rate-limiting a client.
pub const AUTH_FAILURE_RATE_LIMIT_THRESHOLD: u32 = 10;

/// Window, in seconds, over which auth-hook failures are counted.
pub const AUTH_FAILURE_WINDOW_SECS: i64 = 15 * 60;

/// Default resilience policy values.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 50;
pub const DEFAULT_RETRY_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5_000;
pub const DEFAULT_CIRCUIT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_CIRCUIT_RESET_TIMEOUT_MS: u64 = 30_000;

/// Default IVF probe count (number of clusters visited per query).
pub const DEFAULT_IVF_PROBES: usize = 3;

/// Default HNSW query-time candidate list size.
pub const DEFAULT_HNSW_EF_SEARCH: usize = 64;

/// Whether a column name marks the field as sensitive: any name containing
/// one of `SENSITIVE_FIELD_PATTERNS` (case-insensitive) is treated as
/// ciphertext whenever an encryption key is configured. Shared by
/// `docstore-crypto` and the engine's field encryption/decryption seam.
pub fn is_sensitive_field(name: &str) -> bool {
    let lower = name.to_lowercase();
    SENSITIVE_FIELD_PATTERNS.iter().any(|p| lower.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_case_insensitively_and_as_substring() {
        assert!(is_sensitive_field("password"));
        assert!(is_sensitive_field("Password"));
        assert!(is_sensitive_field("api_secret_value"));
        assert!(is_sensitive_field("authToken"));
        assert!(!is_sensitive_field("username"));
        assert!(!is_sensitive_field("message"));
    }
}
