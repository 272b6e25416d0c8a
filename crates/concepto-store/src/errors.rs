//! Error handling for concepto-store
//!
//! Wraps concepto-core ExError with store-specific helpers

use concepto_core::errors::{ExError, ExErrorKind};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// Create an error for a record file that cannot be decoded
pub fn cache_corrupt(path: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::CacheCorrupt)
        .with_op("fs_read")
        .with_message(format!("Corrupt cache record {}: {}", path, reason))
}

/// Create an error for two keys sharing one digest
pub fn key_collision(digest: &str, stored_key: &str, key: &str) -> ExError {
    ExError::new(ExErrorKind::CacheCorrupt)
        .with_op("fs_write")
        .with_message(format!(
            "Key collision for digest {}: stored {}, requested {}",
            digest, stored_key, key
        ))
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// Create a serialization error
pub fn from_serde(operation: &str, err: serde_json::Error) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_codes() {
        assert_eq!(migration_error("001", "boom").code(), "ERR_PERSISTENCE");
        assert_eq!(cache_corrupt("ab/x.json", "eof").code(), "ERR_CACHE_CORRUPT");
        let err = io_error("fs_write", std::io::Error::other("disk full"));
        assert_eq!(err.op(), Some("fs_write"));
        assert_eq!(err.code(), "ERR_IO");
    }
}
