pub mod cached;
pub mod memory;
pub mod postgres;

pub use cached::*;
pub use memory::*;
pub use postgres::*;

use crate::domain::Seat;
use crate::Result;
use async_trait::async_trait;

/// Durable seat persistence with version-guarded conditional writes.
///
/// `save` inserts when `version == 1` and otherwise issues a conditional
/// update expecting the previously observed version (`seat.version - 1`).
/// Of any set of concurrent saves targeting the same version, at most one
/// succeeds; the rest fail with `ConcurrencyConflict` and the caller must
/// restart its whole read-modify-write cycle. The store never retries
/// internally.
#[async_trait]
pub trait SeatStore: Send + Sync {
    async fn find_by_id(&self, seat_id: &str) -> Result<Option<Seat>>;

    /// All seats of one event, ordered by numeric-aware seat number.
    async fn find_by_event_id(&self, event_id: &str) -> Result<Vec<Seat>>;

    /// Direct read used only for version-sensitive checks. Implementations
    /// that cache must bypass the cache here.
    async fn find_by_id_with_version(
        &self,
        seat_id: &str,
        expected_version: i64,
    ) -> Result<Option<Seat>>;

    async fn save(&self, seat: &Seat) -> Result<()>;
}

pub(crate) const SEAT_ENTITY: &str = "Seat";
