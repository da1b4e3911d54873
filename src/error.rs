use crate::domain::SeatStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BoxOfficeError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Seat not found: {seat_id}")]
    NotFound { seat_id: String },

    #[error("Seat not available: current status {status}")]
    NotAvailable { status: SeatStatus },

    #[error("Holder {holder_id} does not hold the lock on seat {seat_id}")]
    Unauthorized { seat_id: String, holder_id: String },

    #[error("Concurrent modification of {entity_type} {id}: expected version {expected_version}")]
    ConcurrencyConflict {
        entity_type: &'static str,
        id: String,
        expected_version: i64,
    },

    #[error("Duplicate {entity_type} id: {id}")]
    DuplicateKey { entity_type: &'static str, id: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl BoxOfficeError {
    /// A conflict means the caller must re-run the whole read-modify-write
    /// cycle, not just the write.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, BoxOfficeError>;
