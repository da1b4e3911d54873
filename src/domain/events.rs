use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::Seat;

/// Default soft expiry for a lock, recorded in the event only. There is no
/// automatic sweeper reclaiming expired locks.
pub const DEFAULT_LOCK_MINUTES: i64 = 15;

/// Published after a seat lock is durably persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatLocked {
    pub seat_id: String,
    pub event_id: String,
    pub holder_id: String,
    pub seat_number: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub correlation_id: String,
}

impl SeatLocked {
    pub fn from_seat(seat: &Seat, lock_duration: Duration, correlation_id: String) -> Self {
        let now = Utc::now();
        Self {
            seat_id: seat.id.clone(),
            event_id: seat.event_id.clone(),
            holder_id: seat.holder_id.clone().unwrap_or_default(),
            seat_number: seat.seat_number.clone(),
            price: seat.price,
            timestamp: now,
            expires_at: now + lock_duration,
            correlation_id,
        }
    }
}

/// Published after a sale is durably persisted. Consumed at-least-once by
/// the notification worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatSold {
    pub seat_id: String,
    pub event_id: String,
    pub holder_id: String,
    pub seat_number: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: String,
}

impl SeatSold {
    pub fn from_seat(seat: &Seat, correlation_id: String) -> Self {
        Self {
            seat_id: seat.id.clone(),
            event_id: seat.event_id.clone(),
            holder_id: seat.holder_id.clone().unwrap_or_default(),
            seat_number: seat.seat_number.clone(),
            price: seat.price,
            timestamp: Utc::now(),
            correlation_id,
        }
    }
}
