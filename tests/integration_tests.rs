use async_trait::async_trait;
use box_office::booking::BookingCoordinator;
use box_office::cache::{seat_key, Cache, MemoryCache};
use box_office::config::{AppConfig, BookingConfig};
use box_office::correlation;
use box_office::domain::{Seat, SeatLocked, SeatStatus};
use box_office::publish::EventPublisher;
use box_office::store::{CachedSeatStore, MemorySeatStore, SeatStore};
use box_office::{BoxOfficeError, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Published {
    topic: String,
    key: String,
    payload: serde_json::Value,
    correlation_id: Option<String>,
}

/// Test double capturing everything handed to the fire-and-forget path.
#[derive(Default)]
struct RecordingPublisher {
    published: Mutex<Vec<Published>>,
}

impl RecordingPublisher {
    fn recorded(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }

    async fn wait_for(&self, count: usize) -> Vec<Published> {
        for _ in 0..100 {
            let recorded = self.recorded();
            if recorded.len() >= count {
                return recorded;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("publisher never received {count} events");
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: serde_json::Value,
        correlation_id: Option<String>,
    ) {
        self.published.lock().unwrap().push(Published {
            topic: topic.to_string(),
            key: key.to_string(),
            payload,
            correlation_id,
        });
    }
}

/// Publisher that is slow and then fails, to prove callers never wait on it.
struct SlowFailingPublisher;

#[async_trait]
impl EventPublisher for SlowFailingPublisher {
    async fn publish(
        &self,
        _topic: &str,
        _key: &str,
        _payload: serde_json::Value,
        _correlation_id: Option<String>,
    ) {
        tokio::time::sleep(Duration::from_millis(300)).await;
        // The failure is only observable here; nothing propagates.
    }
}

/// Cache whose every operation fails, to prove degradation to a miss.
struct BrokenCache;

#[async_trait]
impl Cache for BrokenCache {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(BoxOfficeError::InvalidArgument("cache down".to_string()))
    }
    async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
        Err(BoxOfficeError::InvalidArgument("cache down".to_string()))
    }
    async fn del(&self, _keys: &[&str]) -> Result<()> {
        Err(BoxOfficeError::InvalidArgument("cache down".to_string()))
    }
    async fn del_pattern(&self, _pattern: &str) -> Result<()> {
        Err(BoxOfficeError::InvalidArgument("cache down".to_string()))
    }
    async fn exists(&self, _key: &str) -> Result<bool> {
        Err(BoxOfficeError::InvalidArgument("cache down".to_string()))
    }
}

fn coordinator_over(
    store: Arc<dyn SeatStore>,
) -> (Arc<BookingCoordinator>, Arc<RecordingPublisher>) {
    let publisher = Arc::new(RecordingPublisher::default());
    let coordinator = Arc::new(BookingCoordinator::new(
        store,
        publisher.clone(),
        BookingConfig::default(),
    ));
    (coordinator, publisher)
}

fn seeded_store(seat: Seat) -> Arc<MemorySeatStore> {
    let store = Arc::new(MemorySeatStore::new());
    store.insert_raw(seat);
    store
}

#[tokio::test]
async fn scenario_a_locking_an_available_seat() {
    let store = seeded_store(Seat::new("s1", "e1", "A1", 80.0));
    let (coordinator, publisher) = coordinator_over(store.clone());

    let locked = correlation::with_correlation_id("corr-a".to_string(), async {
        coordinator.lock_seat("s1", "u1").await
    })
    .await
    .unwrap();

    assert_eq!(locked.status, SeatStatus::Locked);
    assert_eq!(locked.holder_id.as_deref(), Some("u1"));
    assert_eq!(locked.version, 2);

    let persisted = store.find_by_id("s1").await.unwrap().unwrap();
    assert_eq!(persisted.version, 2);

    let events = publisher.wait_for(1).await;
    assert_eq!(events[0].topic, "notification.seat.locked");
    assert_eq!(events[0].key, "s1");
    assert_eq!(events[0].correlation_id.as_deref(), Some("corr-a"));

    let event: SeatLocked = serde_json::from_value(events[0].payload.clone()).unwrap();
    assert_eq!(event.holder_id, "u1");
    assert_eq!(event.correlation_id, "corr-a");
    assert_eq!(event.expires_at - event.timestamp, chrono::Duration::minutes(15));
}

#[tokio::test]
async fn scenario_b_selling_twice_fails_the_second_time() {
    let store = seeded_store(Seat::new("s1", "e1", "A1", 80.0));
    let (coordinator, publisher) = coordinator_over(store.clone());

    coordinator.lock_seat("s1", "u1").await.unwrap();
    let sold = coordinator.confirm_sale("s1", "u1").await.unwrap();
    assert_eq!(sold.status, SeatStatus::Sold);
    assert_eq!(sold.version, 3);
    // The buyer stays identifiable after the sale.
    assert_eq!(sold.holder_id.as_deref(), Some("u1"));

    match coordinator.confirm_sale("s1", "u1").await {
        Err(BoxOfficeError::NotAvailable { status }) => assert_eq!(status, SeatStatus::Sold),
        other => panic!("expected NotAvailable, got {other:?}"),
    }

    // The failed attempt changed nothing durable.
    let persisted = store.find_by_id("s1").await.unwrap().unwrap();
    assert_eq!(persisted.version, 3);
    assert_eq!(persisted.status, SeatStatus::Sold);

    // Both publishes happen on background tasks; order is not guaranteed.
    let events = publisher.wait_for(2).await;
    assert!(events.iter().any(|e| e.topic == "notification.seat.locked"));
    assert!(events.iter().any(|e| e.topic == "notification.seat.sold"));
}

#[tokio::test]
async fn scenario_c_release_by_non_holder_is_unauthorized() {
    let store = seeded_store(Seat::new("s1", "e1", "A1", 80.0));
    let (coordinator, _publisher) = coordinator_over(store.clone());

    coordinator.lock_seat("s1", "u1").await.unwrap();

    match coordinator.release_seat("s1", "u2").await {
        Err(BoxOfficeError::Unauthorized { seat_id, holder_id }) => {
            assert_eq!(seat_id, "s1");
            assert_eq!(holder_id, "u2");
        }
        other => panic!("expected Unauthorized, got {other:?}"),
    }

    let persisted = store.find_by_id("s1").await.unwrap().unwrap();
    assert_eq!(persisted.status, SeatStatus::Locked);
    assert_eq!(persisted.holder_id.as_deref(), Some("u1"));
    assert_eq!(persisted.version, 2);
}

#[tokio::test]
async fn scenario_d_stale_read_surfaces_concurrency_conflict() {
    // The durable store already moved to version 2, but the cache still
    // holds the version-1 copy a competing reader saw.
    let inner = Arc::new(MemorySeatStore::new());
    let available = Seat::new("s1", "e1", "A1", 80.0);
    inner.save(&available).await.unwrap();
    let winner = available.lock("u1").unwrap();
    inner.save(&winner).await.unwrap();

    let cache = Arc::new(MemoryCache::new());
    cache
        .set_ex(
            &seat_key("s1"),
            &serde_json::to_string(&available).unwrap(),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

    let cached: Arc<dyn SeatStore> =
        Arc::new(CachedSeatStore::new(inner.clone(), cache, Duration::from_secs(60)));
    let (coordinator, _publisher) = coordinator_over(cached);

    match coordinator.lock_seat("s1", "u2").await {
        Err(BoxOfficeError::ConcurrencyConflict {
            entity_type,
            id,
            expected_version,
        }) => {
            assert_eq!(entity_type, "Seat");
            assert_eq!(id, "s1");
            assert_eq!(expected_version, 1);
        }
        other => panic!("expected ConcurrencyConflict, got {other:?}"),
    }

    // The winner's state is untouched.
    let persisted = inner.find_by_id("s1").await.unwrap().unwrap();
    assert_eq!(persisted.holder_id.as_deref(), Some("u1"));
    assert_eq!(persisted.version, 2);
}

#[tokio::test]
async fn concurrent_locks_admit_exactly_one_winner() {
    let store = seeded_store(Seat::new("s1", "e1", "A1", 80.0));
    let (coordinator, _publisher) = coordinator_over(store.clone());

    let (a, b) = tokio::join!(
        coordinator.lock_seat("s1", "u1"),
        coordinator.lock_seat("s1", "u2"),
    );

    let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);

    for outcome in [&a, &b] {
        if let Err(e) = outcome {
            assert!(
                matches!(
                    e,
                    BoxOfficeError::ConcurrencyConflict { .. } | BoxOfficeError::NotAvailable { .. }
                ),
                "loser failed with unexpected error: {e:?}"
            );
        }
    }

    let persisted = store.find_by_id("s1").await.unwrap().unwrap();
    assert_eq!(persisted.version, 2);
    assert_eq!(persisted.status, SeatStatus::Locked);
}

#[tokio::test]
async fn reads_after_save_never_see_the_pre_write_cached_value() {
    let inner = Arc::new(MemorySeatStore::new());
    let seat = Seat::new("s1", "e1", "A1", 80.0);
    inner.save(&seat).await.unwrap();

    let cache = Arc::new(MemoryCache::new());
    let cached = Arc::new(CachedSeatStore::new(
        inner.clone(),
        cache.clone(),
        Duration::from_secs(60),
    ));

    // Populate both the seat key and the event list key.
    cached.find_by_id("s1").await.unwrap().unwrap();
    assert_eq!(cached.find_by_event_id("e1").await.unwrap().len(), 1);

    // Prove the next read is served from cache, not the store.
    let mut divergent = seat.clone();
    divergent.price = 999.0;
    inner.insert_raw(divergent);
    assert_eq!(cached.find_by_id("s1").await.unwrap().unwrap().price, 80.0);

    // A durable write through the decorator invalidates both keys.
    let locked = cached.find_by_id("s1").await.unwrap().unwrap().lock("u1").unwrap();
    cached.save(&locked).await.unwrap();

    let fresh = cached.find_by_id("s1").await.unwrap().unwrap();
    assert_eq!(fresh.version, 2);
    assert_eq!(fresh.status, SeatStatus::Locked);
    let listed = cached.find_by_event_id("e1").await.unwrap();
    assert_eq!(listed[0].version, 2);
}

#[tokio::test]
async fn version_sensitive_reads_bypass_the_cache() {
    let inner = Arc::new(MemorySeatStore::new());
    let seat = Seat::new("s1", "e1", "A1", 80.0);
    inner.save(&seat).await.unwrap();

    let cache = Arc::new(MemoryCache::new());
    // A stale version-5 copy sits in the cache.
    let mut stale = seat.clone();
    stale.version = 5;
    cache
        .set_ex(
            &seat_key("s1"),
            &serde_json::to_string(&stale).unwrap(),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

    let cached = CachedSeatStore::new(inner, cache, Duration::from_secs(60));

    // The plain read sees the cached copy; the version-guarded read does not.
    assert_eq!(cached.find_by_id("s1").await.unwrap().unwrap().version, 5);
    let guarded = cached.find_by_id_with_version("s1", 1).await.unwrap();
    assert_eq!(guarded.unwrap().version, 1);
    assert!(cached.find_by_id_with_version("s1", 5).await.unwrap().is_none());
}

#[tokio::test]
async fn broken_cache_degrades_to_store_reads_and_writes() {
    let inner = Arc::new(MemorySeatStore::new());
    inner.save(&Seat::new("s1", "e1", "A1", 80.0)).await.unwrap();

    let cached: Arc<dyn SeatStore> = Arc::new(CachedSeatStore::new(
        inner.clone(),
        Arc::new(BrokenCache),
        Duration::from_secs(60),
    ));
    let (coordinator, _publisher) = coordinator_over(cached);

    // Every cache operation fails, yet bookings proceed normally.
    let locked = coordinator.lock_seat("s1", "u1").await.unwrap();
    assert_eq!(locked.version, 2);
    let sold = coordinator.confirm_sale("s1", "u1").await.unwrap();
    assert_eq!(sold.version, 3);
}

#[tokio::test]
async fn purchase_returns_before_downstream_publishing_finishes() {
    let store = seeded_store(Seat::new("s1", "e1", "A1", 80.0));
    let coordinator = BookingCoordinator::new(
        store,
        Arc::new(SlowFailingPublisher),
        BookingConfig::default(),
    );

    coordinator.lock_seat("s1", "u1").await.unwrap();

    let start = std::time::Instant::now();
    let sold = coordinator.confirm_sale("s1", "u1").await.unwrap();
    assert_eq!(sold.status, SeatStatus::Sold);
    // The publisher sleeps 300ms; the caller must not have waited on it.
    assert!(start.elapsed() < Duration::from_millis(200));
}

#[tokio::test]
async fn config_loads_from_toml_file() {
    let config_content = r#"
[http]
port = 9090

[cache]
url = "redis://cache:6379"
ttl_secs = 30
enabled = true

[kafka]
bootstrap_servers = "broker-1:9092,broker-2:9092"

[booking]
lock_minutes = 10
locked_topic = "notification.seat.locked"
sold_topic = "notification.seat.sold"
publish_enabled = true

[retry]
max_attempts = 7
initial_delay_ms = 25
max_delay_ms = 2000
backoff_multiplier = 1.5
"#;

    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("boxoffice.toml");
    std::fs::write(&config_path, config_content).unwrap();

    let config = AppConfig::load(Some(config_path.as_path())).unwrap();

    assert_eq!(config.http.port, 9090);
    assert_eq!(config.cache.ttl_secs, 30);
    assert_eq!(config.kafka.bootstrap_servers, "broker-1:9092,broker-2:9092");
    assert_eq!(config.booking.lock_minutes, 10);
    assert_eq!(config.retry.max_attempts, 7);
    // Sections absent from the file keep their defaults.
    assert_eq!(config.database.max_connections, 10);
}

#[tokio::test]
async fn created_seats_are_bookable_and_listed_in_natural_order() {
    let inner = Arc::new(MemorySeatStore::new());
    let cached: Arc<dyn SeatStore> = Arc::new(CachedSeatStore::new(
        inner,
        Arc::new(MemoryCache::new()),
        Duration::from_secs(60),
    ));
    let (coordinator, _publisher) = coordinator_over(cached);

    // List first so the event list key is cached before the seat set grows.
    assert!(coordinator.find_by_event_id("e1").await.unwrap().is_empty());
    for number in ["A10", "A1", "A2"] {
        coordinator.create_seat("e1", number, 60.0).await.unwrap();
    }

    let listed = coordinator.find_by_event_id("e1").await.unwrap();
    let numbers: Vec<&str> = listed.iter().map(|s| s.seat_number.as_str()).collect();
    assert_eq!(numbers, vec!["A1", "A2", "A10"]);

    let seat_id = listed[0].id.clone();
    let locked = coordinator.lock_seat(&seat_id, "u1").await.unwrap();
    assert_eq!(locked.version, 2);
}

#[tokio::test]
async fn lock_of_missing_seat_is_not_found() {
    let (coordinator, _publisher) = coordinator_over(Arc::new(MemorySeatStore::new()));
    match coordinator.lock_seat("ghost", "u1").await {
        Err(BoxOfficeError::NotFound { seat_id }) => assert_eq!(seat_id, "ghost"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}
