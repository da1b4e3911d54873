use crate::{BoxOfficeError, Result};
use prometheus::{
    register_counter_with_registry, register_histogram_with_registry, Counter, Encoder, Histogram,
    HistogramOpts, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metrics collector for the booking system
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    // Booking metrics
    pub seats_locked: Counter,
    pub seats_sold: Counter,
    pub seats_released: Counter,
    pub booking_conflicts: Counter,
    pub booking_rejections: Counter,

    // Cache metrics
    pub cache_hits: Counter,
    pub cache_misses: Counter,

    // Publisher metrics
    pub events_published: Counter,
    pub publish_failures: Counter,

    // Worker metrics
    pub worker_messages_processed: Counter,
    pub worker_messages_requeued: Counter,

    // Service metrics
    pub request_duration: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let seats_locked = register_counter_with_registry!(
            Opts::new("seats_locked_total", "Total number of successful seat locks"),
            registry
        )?;

        let seats_sold = register_counter_with_registry!(
            Opts::new("seats_sold_total", "Total number of confirmed sales"),
            registry
        )?;

        let seats_released = register_counter_with_registry!(
            Opts::new("seats_released_total", "Total number of released locks"),
            registry
        )?;

        let booking_conflicts = register_counter_with_registry!(
            Opts::new("booking_conflicts_total", "Optimistic concurrency conflicts"),
            registry
        )?;

        let booking_rejections = register_counter_with_registry!(
            Opts::new(
                "booking_rejections_total",
                "Bookings rejected for state or ownership reasons"
            ),
            registry
        )?;

        let cache_hits = register_counter_with_registry!(
            Opts::new("cache_hits_total", "Seat cache hits"),
            registry
        )?;

        let cache_misses = register_counter_with_registry!(
            Opts::new("cache_misses_total", "Seat cache misses"),
            registry
        )?;

        let events_published = register_counter_with_registry!(
            Opts::new("events_published_total", "Notification events published"),
            registry
        )?;

        let publish_failures = register_counter_with_registry!(
            Opts::new("publish_failures_total", "Notification publish failures (swallowed)"),
            registry
        )?;

        let worker_messages_processed = register_counter_with_registry!(
            Opts::new(
                "worker_messages_processed_total",
                "Messages fully processed and acknowledged by the worker"
            ),
            registry
        )?;

        let worker_messages_requeued = register_counter_with_registry!(
            Opts::new(
                "worker_messages_requeued_total",
                "Messages returned for redelivery after a processing failure"
            ),
            registry
        )?;

        let request_duration = register_histogram_with_registry!(
            HistogramOpts::new("request_duration_seconds", "Time spent processing requests")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            registry
        )?;

        Ok(Self {
            registry,
            seats_locked,
            seats_sold,
            seats_released,
            booking_conflicts,
            booking_rejections,
            cache_hits,
            cache_misses,
            events_published,
            publish_failures,
            worker_messages_processed,
            worker_messages_requeued,
            request_duration,
        })
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| BoxOfficeError::InvalidArgument(format!("metrics encoding: {e}")))
    }

    pub fn record_booking_outcome(&self, outcome: &Result<crate::domain::Seat>, operation: &str) {
        match outcome {
            Ok(_) => match operation {
                "lock" => self.seats_locked.inc(),
                "sell" => self.seats_sold.inc(),
                "release" => self.seats_released.inc(),
                _ => {}
            },
            Err(BoxOfficeError::ConcurrencyConflict { .. }) => self.booking_conflicts.inc(),
            Err(
                BoxOfficeError::NotAvailable { .. }
                | BoxOfficeError::Unauthorized { .. }
                | BoxOfficeError::NotFound { .. },
            ) => self.booking_rejections.inc(),
            Err(_) => {}
        }
    }
}
