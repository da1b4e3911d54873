use super::SeatStore;
use crate::cache::{event_seats_key, seat_key, Cache};
use crate::domain::Seat;
use crate::metrics::Metrics;
use crate::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Cache-aside decorator over a [`SeatStore`].
///
/// Reads populate the cache on miss with a TTL. Writes go to the inner
/// store first and, only after a successful durable write, delete the
/// per-seat key and the per-event list key. Invalidate, never update in
/// place: a concurrent writer's stale copy must not overwrite a newer one.
/// Every cache fault degrades to a miss and is never surfaced.
pub struct CachedSeatStore {
    inner: Arc<dyn SeatStore>,
    cache: Arc<dyn Cache>,
    ttl: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl CachedSeatStore {
    pub fn new(inner: Arc<dyn SeatStore>, cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self {
            inner,
            cache,
            ttl,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn record_hit(&self) {
        if let Some(m) = &self.metrics {
            m.cache_hits.inc();
        }
    }

    fn record_miss(&self) {
        if let Some(m) = &self.metrics {
            m.cache_misses.inc();
        }
    }

    async fn cached_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(value) => {
                    self.record_hit();
                    Some(value)
                }
                Err(e) => {
                    warn!("Discarding undecodable cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Cache read for {} failed, treating as miss: {}", key, e);
                None
            }
        }
    }

    async fn cached_put<T: Serialize>(&self, key: &str, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                warn!("Could not serialize cache entry {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.cache.set_ex(key, &json, self.ttl).await {
            warn!("Cache write for {} failed: {}", key, e);
        }
    }
}

#[async_trait]
impl SeatStore for CachedSeatStore {
    async fn find_by_id(&self, seat_id: &str) -> Result<Option<Seat>> {
        let key = seat_key(seat_id);
        if let Some(seat) = self.cached_get::<Seat>(&key).await {
            return Ok(Some(seat));
        }
        self.record_miss();

        let seat = self.inner.find_by_id(seat_id).await?;
        if let Some(seat) = &seat {
            self.cached_put(&key, seat).await;
        }
        Ok(seat)
    }

    async fn find_by_event_id(&self, event_id: &str) -> Result<Vec<Seat>> {
        let key = event_seats_key(event_id);
        if let Some(seats) = self.cached_get::<Vec<Seat>>(&key).await {
            return Ok(seats);
        }
        self.record_miss();

        let seats = self.inner.find_by_event_id(event_id).await?;
        self.cached_put(&key, &seats).await;
        Ok(seats)
    }

    /// Participates in optimistic-lock verification, so it must see current
    /// durable state: always bypasses the cache.
    async fn find_by_id_with_version(
        &self,
        seat_id: &str,
        expected_version: i64,
    ) -> Result<Option<Seat>> {
        self.inner.find_by_id_with_version(seat_id, expected_version).await
    }

    async fn save(&self, seat: &Seat) -> Result<()> {
        self.inner.save(seat).await?;

        let record_key = seat_key(&seat.id);
        let list_key = event_seats_key(&seat.event_id);
        if let Err(e) = self.cache.del(&[record_key.as_str(), list_key.as_str()]).await {
            warn!("Cache invalidation after saving seat {} failed: {}", seat.id, e);
        }
        Ok(())
    }
}
