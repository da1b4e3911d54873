use super::{SeatStore, SEAT_ENTITY};
use crate::domain::{natural_seat_cmp, Seat};
use crate::{BoxOfficeError, Result};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// DashMap-backed store for tests and local runs. The per-entry shard lock
/// makes the version-guarded write a genuine compare-and-swap.
#[derive(Clone, Default)]
pub struct MemorySeatStore {
    seats: Arc<DashMap<String, Seat>>,
}

impl MemorySeatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test convenience: seed a seat without version bookkeeping.
    pub fn insert_raw(&self, seat: Seat) {
        self.seats.insert(seat.id.clone(), seat);
    }
}

#[async_trait]
impl SeatStore for MemorySeatStore {
    async fn find_by_id(&self, seat_id: &str) -> Result<Option<Seat>> {
        Ok(self.seats.get(seat_id).map(|entry| entry.value().clone()))
    }

    async fn find_by_event_id(&self, event_id: &str) -> Result<Vec<Seat>> {
        let mut seats: Vec<Seat> = self
            .seats
            .iter()
            .filter(|entry| entry.value().event_id == event_id)
            .map(|entry| entry.value().clone())
            .collect();
        seats.sort_by(|a, b| natural_seat_cmp(&a.seat_number, &b.seat_number));
        Ok(seats)
    }

    async fn find_by_id_with_version(
        &self,
        seat_id: &str,
        expected_version: i64,
    ) -> Result<Option<Seat>> {
        Ok(self
            .seats
            .get(seat_id)
            .filter(|entry| entry.value().version == expected_version)
            .map(|entry| entry.value().clone()))
    }

    async fn save(&self, seat: &Seat) -> Result<()> {
        if seat.version == 1 {
            return match self.seats.entry(seat.id.clone()) {
                Entry::Occupied(_) => Err(BoxOfficeError::DuplicateKey {
                    entity_type: SEAT_ENTITY,
                    id: seat.id.clone(),
                }),
                Entry::Vacant(vacant) => {
                    vacant.insert(seat.clone());
                    Ok(())
                }
            };
        }

        let expected_version = seat.version - 1;
        match self.seats.get_mut(&seat.id) {
            Some(mut entry) if entry.value().version == expected_version => {
                *entry.value_mut() = seat.clone();
                Ok(())
            }
            _ => Err(BoxOfficeError::ConcurrencyConflict {
                entity_type: SEAT_ENTITY,
                id: seat.id.clone(),
                expected_version,
            }),
        }
    }
}
