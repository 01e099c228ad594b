use thiserror::Error;

/// Storage-specific error types for the AlcoWall kiosk.
///
/// These errors represent failures of the local durable state: the SQLite
/// retry queue, the highscore file and the JSONL journals. Backend failures
/// are not storage errors; they leave queue entries in place.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection or query execution failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration execution failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Entry or record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File access failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Queue row with an unknown kind or unreadable payload
    #[error("Invalid queue entry {id}: {reason}")]
    InvalidEntry { id: i64, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
