use docstore_core::errors::*;

#[test]
fn not_found_carries_table_and_id() {
    let err = DocstoreError::NotFound {
        table: "messages".into(),
        id: 42,
    };
    let msg = err.to_string();
    assert!(msg.contains("messages"));
    assert!(msg.contains("42"));
}

#[test]
fn dimension_mismatch_carries_both_sizes() {
    let err = DocstoreError::DimensionMismatch {
        expected: 384,
        actual: 128,
    };
    let msg = err.to_string();
    assert!(msg.contains("384"));
    assert!(msg.contains("128"));
}

#[test]
fn validation_and_dimension_mismatch_are_not_retried() {
    let validation = DocstoreError::Validation {
        field: "name".into(),
        message: "required".into(),
    };
    assert!(!validation.is_retryable());

    let dim = DocstoreError::DimensionMismatch {
        expected: 3,
        actual: 2,
    };
    assert!(!dim.is_retryable());
}

#[test]
fn storage_and_network_are_retried() {
    let storage = DocstoreError::Storage(StorageError::QuotaExhausted);
    assert!(storage.is_retryable());

    let network = DocstoreError::Network {
        reason: "timeout".into(),
    };
    assert!(network.is_retryable());
}

#[test]
fn every_variant_has_a_stable_code() {
    assert_eq!(
        DocstoreError::Validation {
            field: "x".into(),
            message: "y".into()
        }
        .code(),
        "VALIDATION_ERROR"
    );
    assert_eq!(
        DocstoreError::Storage(StorageError::QuotaExhausted).code(),
        "STORAGE_ERROR"
    );
}
