use super::{SeatStore, SEAT_ENTITY};
use crate::config::DatabaseConfig;
use crate::domain::{natural_seat_cmp, Seat, SeatStatus};
use crate::{BoxOfficeError, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};

/// Postgres-backed seat store. The conditional update compares the version
/// column in the WHERE clause; `rows_affected == 0` is the conflict signal.
///
/// Expected schema (managed outside this crate):
///
/// ```sql
/// CREATE TABLE seats (
///     id          TEXT PRIMARY KEY,
///     event_id    TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
///     seat_number TEXT NOT NULL,
///     status      TEXT NOT NULL,
///     price       DOUBLE PRECISION NOT NULL,
///     holder_id   TEXT,
///     version     BIGINT NOT NULL,
///     created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
///     updated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
///     UNIQUE (event_id, seat_number)
/// );
/// ```
#[derive(Clone)]
pub struct PostgresSeatStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct SeatRow {
    id: String,
    event_id: String,
    seat_number: String,
    price: f64,
    status: String,
    holder_id: Option<String>,
    version: i64,
}

impl SeatRow {
    fn into_seat(self) -> Result<Seat> {
        Ok(Seat {
            id: self.id,
            event_id: self.event_id,
            seat_number: self.seat_number,
            price: self.price,
            status: SeatStatus::parse(&self.status)?,
            holder_id: self.holder_id,
            version: self.version,
        })
    }
}

const SELECT_COLUMNS: &str = "id, event_id, seat_number, price, status, holder_id, version";

impl PostgresSeatStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        Ok(Self { pool })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SeatStore for PostgresSeatStore {
    async fn find_by_id(&self, seat_id: &str) -> Result<Option<Seat>> {
        let row: Option<SeatRow> =
            sqlx::query_as(&format!("SELECT {SELECT_COLUMNS} FROM seats WHERE id = $1"))
                .bind(seat_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(SeatRow::into_seat).transpose()
    }

    async fn find_by_event_id(&self, event_id: &str) -> Result<Vec<Seat>> {
        let rows: Vec<SeatRow> =
            sqlx::query_as(&format!("SELECT {SELECT_COLUMNS} FROM seats WHERE event_id = $1"))
                .bind(event_id)
                .fetch_all(&self.pool)
                .await?;

        let mut seats = rows
            .into_iter()
            .map(SeatRow::into_seat)
            .collect::<Result<Vec<_>>>()?;
        // Numeric-aware ordering ("A2" before "A10") is done here rather
        // than in SQL.
        seats.sort_by(|a, b| natural_seat_cmp(&a.seat_number, &b.seat_number));
        Ok(seats)
    }

    async fn find_by_id_with_version(
        &self,
        seat_id: &str,
        expected_version: i64,
    ) -> Result<Option<Seat>> {
        let row: Option<SeatRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM seats WHERE id = $1 AND version = $2"
        ))
        .bind(seat_id)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;
        row.map(SeatRow::into_seat).transpose()
    }

    async fn save(&self, seat: &Seat) -> Result<()> {
        if seat.version == 1 {
            let result = sqlx::query(
                "INSERT INTO seats (id, event_id, seat_number, price, status, holder_id, version) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(&seat.id)
            .bind(&seat.event_id)
            .bind(&seat.seat_number)
            .bind(seat.price)
            .bind(seat.status.as_str())
            .bind(&seat.holder_id)
            .bind(seat.version)
            .execute(&self.pool)
            .await;

            return match result {
                Ok(_) => Ok(()),
                Err(e) if is_unique_violation(&e) => Err(BoxOfficeError::DuplicateKey {
                    entity_type: SEAT_ENTITY,
                    id: seat.id.clone(),
                }),
                Err(e) => Err(e.into()),
            };
        }

        let expected_version = seat.version - 1;
        let result = sqlx::query(
            "UPDATE seats SET status = $1, holder_id = $2, version = $3, updated_at = now() \
             WHERE id = $4 AND version = $5",
        )
        .bind(seat.status.as_str())
        .bind(&seat.holder_id)
        .bind(seat.version)
        .bind(&seat.id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BoxOfficeError::ConcurrencyConflict {
                entity_type: SEAT_ENTITY,
                id: seat.id.clone(),
                expected_version,
            });
        }
        Ok(())
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}
