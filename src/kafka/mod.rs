pub mod consumer;
pub mod producer;

pub use consumer::*;
pub use producer::*;

/// Notification topic names. Durable topics, JSON payloads, correlation id
/// in the `correlation-id` header.
pub struct Topics;

impl Topics {
    pub const NOTIFICATION_SEAT_LOCKED: &'static str = "notification.seat.locked";
    pub const NOTIFICATION_SEAT_SOLD: &'static str = "notification.seat.sold";
}
