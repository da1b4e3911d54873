use axum::{
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use box_office::booking::BookingCoordinator;
use box_office::cache::{Cache, MemoryCache, RedisCache};
use box_office::config::AppConfig;
use box_office::correlation;
use box_office::domain::Seat;
use box_office::metrics::Metrics;
use box_office::publish::{EventPublisher, KafkaEventPublisher, NoopPublisher};
use box_office::retry::{retry_with_backoff, RetryConfig};
use box_office::shutdown::{setup_signal_handlers, PublisherShutdown, ShutdownCoordinator};
use box_office::store::{CachedSeatStore, MemorySeatStore, PostgresSeatStore, SeatStore};
use box_office::{BoxOfficeError, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "booking-service")]
#[command(about = "Seat booking REST API")]
struct Args {
    /// Port to listen on (overrides config)
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,

    /// Config file path
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Use the in-memory store instead of Postgres (local runs)
    #[arg(long = "in-memory")]
    in_memory: bool,
}

#[derive(Clone)]
struct AppState {
    coordinator: Arc<BookingCoordinator>,
    metrics: Arc<Metrics>,
}

#[derive(Debug, Deserialize)]
struct HolderRequest {
    holder_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateSeatRequest {
    seat_number: String,
    price: f64,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref())?;
    let port = args.port.unwrap_or(config.http.port);

    let metrics = Arc::new(Metrics::new()?);

    // Composition root: every client handle is constructed here and
    // injected; nothing reaches for a global.
    let store = build_store(&config, args.in_memory, &metrics).await?;
    let publisher = build_publisher(&config, &metrics);
    let coordinator = Arc::new(
        BookingCoordinator::new(store, Arc::clone(&publisher), config.booking.clone())
            .with_metrics(Arc::clone(&metrics)),
    );

    let shutdown = ShutdownCoordinator::default();
    shutdown
        .register_component(Box::new(PublisherShutdown::new(publisher)))
        .await;
    setup_signal_handlers(shutdown.clone()).await;

    let state = AppState {
        coordinator,
        metrics,
    };

    let app = Router::new()
        .route("/seats/:seat_id/lock", post(lock_seat))
        .route("/seats/:seat_id/release", post(release_seat))
        .route("/seats/:seat_id/confirm", post(confirm_sale))
        .route("/seats/:seat_id", get(get_seat))
        .route("/events/:event_id/seats", get(get_event_seats).post(create_seat))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Booking service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_store(
    config: &AppConfig,
    in_memory: bool,
    metrics: &Arc<Metrics>,
) -> Result<Arc<dyn SeatStore>> {
    let inner: Arc<dyn SeatStore> = if in_memory {
        info!("Using in-memory seat store");
        Arc::new(MemorySeatStore::new())
    } else {
        let db = config.database.clone();
        let store = retry_with_backoff(&RetryConfig::store_startup(), "postgres-connect", || {
            let db = db.clone();
            async move { PostgresSeatStore::connect(&db).await }
        })
        .await?;
        Arc::new(store)
    };

    let cache: Arc<dyn Cache> = if config.cache.enabled {
        Arc::new(RedisCache::connect(&config.cache.url).await?)
    } else {
        info!("Cache disabled, using process-local cache");
        Arc::new(MemoryCache::new())
    };

    Ok(Arc::new(
        CachedSeatStore::new(inner, cache, config.cache.ttl())
            .with_metrics(Arc::clone(metrics)),
    ))
}

fn build_publisher(config: &AppConfig, metrics: &Arc<Metrics>) -> Arc<dyn EventPublisher> {
    if config.booking.publish_enabled {
        Arc::new(
            KafkaEventPublisher::new(
                config.kafka.to_client_config("booking-service"),
                RetryConfig::from(&config.retry),
            )
            .with_metrics(Arc::clone(metrics)),
        )
    } else {
        info!("Event publishing disabled");
        Arc::new(NoopPublisher)
    }
}

async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let response = next.run(req).await;
    state
        .metrics
        .request_duration
        .observe(start.elapsed().as_secs_f64());
    response
}

fn request_correlation_id(headers: &HeaderMap) -> String {
    headers
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(correlation::generate)
}

fn status_for(error: &BoxOfficeError) -> StatusCode {
    match error {
        BoxOfficeError::NotFound { .. } => StatusCode::NOT_FOUND,
        BoxOfficeError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        BoxOfficeError::NotAvailable { .. }
        | BoxOfficeError::ConcurrencyConflict { .. }
        | BoxOfficeError::DuplicateKey { .. } => StatusCode::CONFLICT,
        BoxOfficeError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond(result: Result<Seat>) -> (StatusCode, Json<ApiResponse<Seat>>) {
    match result {
        Ok(seat) => (StatusCode::OK, Json(ApiResponse::success(seat))),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

async fn lock_seat(
    State(state): State<AppState>,
    Path(seat_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<HolderRequest>,
) -> (StatusCode, Json<ApiResponse<Seat>>) {
    let correlation_id = request_correlation_id(&headers);
    let result = correlation::with_correlation_id(correlation_id, async {
        state.coordinator.lock_seat(&seat_id, &request.holder_id).await
    })
    .await;
    respond(result)
}

async fn release_seat(
    State(state): State<AppState>,
    Path(seat_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<HolderRequest>,
) -> (StatusCode, Json<ApiResponse<Seat>>) {
    let correlation_id = request_correlation_id(&headers);
    let result = correlation::with_correlation_id(correlation_id, async {
        state.coordinator.release_seat(&seat_id, &request.holder_id).await
    })
    .await;
    respond(result)
}

async fn confirm_sale(
    State(state): State<AppState>,
    Path(seat_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<HolderRequest>,
) -> (StatusCode, Json<ApiResponse<Seat>>) {
    let correlation_id = request_correlation_id(&headers);
    let result = correlation::with_correlation_id(correlation_id, async {
        state.coordinator.confirm_sale(&seat_id, &request.holder_id).await
    })
    .await;
    respond(result)
}

async fn create_seat(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(request): Json<CreateSeatRequest>,
) -> (StatusCode, Json<ApiResponse<Seat>>) {
    respond(
        state
            .coordinator
            .create_seat(&event_id, &request.seat_number, request.price)
            .await,
    )
}

async fn get_seat(
    State(state): State<AppState>,
    Path(seat_id): Path<String>,
) -> (StatusCode, Json<ApiResponse<Seat>>) {
    match state.coordinator.find_by_id(&seat_id).await {
        Ok(Some(seat)) => (StatusCode::OK, Json(ApiResponse::success(seat))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Seat not found: {seat_id}"))),
        ),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

async fn get_event_seats(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> (StatusCode, Json<ApiResponse<Vec<Seat>>>) {
    match state.coordinator.find_by_event_id(&event_id).await {
        Ok(seats) => (StatusCode::OK, Json(ApiResponse::success(seats))),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::success("OK".to_string()))
}

async fn metrics_endpoint(State(state): State<AppState>) -> (StatusCode, String) {
    match state.metrics.export() {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
