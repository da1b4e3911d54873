use crate::config::BookingConfig;
use crate::correlation;
use crate::domain::{Seat, SeatLocked, SeatSold};
use crate::metrics::Metrics;
use crate::publish::EventPublisher;
use crate::store::SeatStore;
use crate::{BoxOfficeError, Result};
use chrono::Duration;
use std::sync::Arc;
use tracing::{info, warn};

/// Validates and applies seat state transitions, persisting through the
/// cache-invalidating store and scheduling notification publishes the
/// caller never waits on.
///
/// A `ConcurrencyConflict` from the store propagates uncaught: it tells the
/// caller to retry the whole operation, read included.
pub struct BookingCoordinator {
    store: Arc<dyn SeatStore>,
    publisher: Arc<dyn EventPublisher>,
    config: BookingConfig,
    metrics: Option<Arc<Metrics>>,
}

impl BookingCoordinator {
    pub fn new(
        store: Arc<dyn SeatStore>,
        publisher: Arc<dyn EventPublisher>,
        config: BookingConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn lock_seat(&self, seat_id: &str, holder_id: &str) -> Result<Seat> {
        let outcome = self.lock_seat_inner(seat_id, holder_id).await;
        self.record(&outcome, "lock");
        outcome
    }

    async fn lock_seat_inner(&self, seat_id: &str, holder_id: &str) -> Result<Seat> {
        let seat = self.require_seat(seat_id).await?;
        let locked = seat.lock(holder_id)?;
        self.store.save(&locked).await?;

        let correlation_id = correlation::current_or_generate();
        let event = SeatLocked::from_seat(
            &locked,
            Duration::minutes(self.config.lock_minutes),
            correlation_id.clone(),
        );
        self.dispatch(
            self.config.locked_topic.clone(),
            locked.id.clone(),
            serde_json::to_value(&event)?,
            correlation_id,
        );

        info!("Seat {} locked by {} (v{})", locked.id, holder_id, locked.version);
        Ok(locked)
    }

    pub async fn release_seat(&self, seat_id: &str, holder_id: &str) -> Result<Seat> {
        let outcome = self.release_seat_inner(seat_id, holder_id).await;
        self.record(&outcome, "release");
        outcome
    }

    async fn release_seat_inner(&self, seat_id: &str, holder_id: &str) -> Result<Seat> {
        let seat = self.require_seat(seat_id).await?;
        self.require_holder(&seat, holder_id)?;

        let released = seat.release()?;
        self.store.save(&released).await?;

        info!("Seat {} released by {} (v{})", released.id, holder_id, released.version);
        Ok(released)
    }

    pub async fn confirm_sale(&self, seat_id: &str, holder_id: &str) -> Result<Seat> {
        let outcome = self.confirm_sale_inner(seat_id, holder_id).await;
        self.record(&outcome, "sell");
        outcome
    }

    async fn confirm_sale_inner(&self, seat_id: &str, holder_id: &str) -> Result<Seat> {
        let seat = self.require_seat(seat_id).await?;
        self.require_holder(&seat, holder_id)?;

        let sold = seat.sell()?;
        self.store.save(&sold).await?;

        // The purchase response returns before any downstream work (ticket
        // rendering, email) runs; the publish outcome is only logged.
        let correlation_id = correlation::current_or_generate();
        let event = SeatSold::from_seat(&sold, correlation_id.clone());
        self.dispatch(
            self.config.sold_topic.clone(),
            sold.id.clone(),
            serde_json::to_value(&event)?,
            correlation_id,
        );

        info!("Seat {} sold to {} (v{})", sold.id, holder_id, sold.version);
        Ok(sold)
    }

    /// Registers a fresh seat for an event. Insertion goes through the same
    /// cache-invalidating path as transitions, so a cached event listing is
    /// dropped when its seat set grows.
    pub async fn create_seat(
        &self,
        event_id: &str,
        seat_number: &str,
        price: f64,
    ) -> Result<Seat> {
        let seat = Seat::new(&uuid::Uuid::new_v4().to_string(), event_id, seat_number, price);
        self.store.save(&seat).await?;
        info!("Seat {} ({}) created for event {}", seat.id, seat.seat_number, event_id);
        Ok(seat)
    }

    pub async fn find_by_id(&self, seat_id: &str) -> Result<Option<Seat>> {
        self.store.find_by_id(seat_id).await
    }

    pub async fn find_by_event_id(&self, event_id: &str) -> Result<Vec<Seat>> {
        self.store.find_by_event_id(event_id).await
    }

    async fn require_seat(&self, seat_id: &str) -> Result<Seat> {
        self.store
            .find_by_id(seat_id)
            .await?
            .ok_or_else(|| BoxOfficeError::NotFound {
                seat_id: seat_id.to_string(),
            })
    }

    fn require_holder(&self, seat: &Seat, holder_id: &str) -> Result<()> {
        if !seat.is_held_by(holder_id) {
            return Err(BoxOfficeError::Unauthorized {
                seat_id: seat.id.clone(),
                holder_id: holder_id.to_string(),
            });
        }
        Ok(())
    }

    /// Hand the event to a background task the operation does not wait on.
    fn dispatch(
        &self,
        topic: String,
        key: String,
        payload: serde_json::Value,
        correlation_id: String,
    ) {
        let publisher = Arc::clone(&self.publisher);
        tokio::spawn(async move {
            publisher
                .publish(&topic, &key, payload, Some(correlation_id))
                .await;
        });
    }

    fn record(&self, outcome: &Result<Seat>, operation: &str) {
        if let Err(e) = outcome {
            warn!("Booking operation {} failed: {}", operation, e);
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_booking_outcome(outcome, operation);
        }
    }
}
