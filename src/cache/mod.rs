pub mod memory;
pub mod redis;

pub use memory::*;
pub use redis::*;

use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Best-effort key/value cache. Values are JSON strings. Every failure is
/// recoverable: callers treat errors as a miss and continue.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    async fn del(&self, keys: &[&str]) -> Result<()>;
    /// Glob-style pattern delete (`seat:*`).
    async fn del_pattern(&self, pattern: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
}

pub fn seat_key(seat_id: &str) -> String {
    format!("seat:{seat_id}")
}

pub fn event_seats_key(event_id: &str) -> String {
    format!("event-seats:{event_id}")
}
