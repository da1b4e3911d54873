use crate::{BoxOfficeError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Locked,
    Sold,
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "AVAILABLE"),
            Self::Locked => write!(f, "LOCKED"),
            Self::Sold => write!(f, "SOLD"),
        }
    }
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Locked => "LOCKED",
            Self::Sold => "SOLD",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "AVAILABLE" => Ok(Self::Available),
            "LOCKED" => Ok(Self::Locked),
            "SOLD" => Ok(Self::Sold),
            other => Err(BoxOfficeError::InvalidArgument(format!(
                "unknown seat status: {other}"
            ))),
        }
    }
}

/// One seat of one event. A pure value: every transition returns a new
/// record with version bumped by exactly one and never mutates its receiver.
/// The store is the sole authority for durable truth.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Seat {
    pub id: String,
    pub event_id: String,
    pub seat_number: String,
    pub price: f64,
    pub status: SeatStatus,
    pub holder_id: Option<String>,
    pub version: i64,
}

impl Seat {
    pub fn new(id: &str, event_id: &str, seat_number: &str, price: f64) -> Self {
        Self {
            id: id.to_string(),
            event_id: event_id.to_string(),
            seat_number: seat_number.to_string(),
            price,
            status: SeatStatus::Available,
            holder_id: None,
            version: 1,
        }
    }

    /// AVAILABLE -> LOCKED, holder set.
    pub fn lock(&self, holder_id: &str) -> Result<Seat> {
        if self.status != SeatStatus::Available {
            return Err(BoxOfficeError::NotAvailable { status: self.status });
        }
        Ok(Seat {
            status: SeatStatus::Locked,
            holder_id: Some(holder_id.to_string()),
            version: self.version + 1,
            ..self.clone()
        })
    }

    /// LOCKED -> SOLD. The holder is retained to identify the buyer.
    pub fn sell(&self) -> Result<Seat> {
        if self.status != SeatStatus::Locked {
            return Err(BoxOfficeError::NotAvailable { status: self.status });
        }
        Ok(Seat {
            status: SeatStatus::Sold,
            version: self.version + 1,
            ..self.clone()
        })
    }

    /// LOCKED -> AVAILABLE, holder cleared.
    pub fn release(&self) -> Result<Seat> {
        if self.status != SeatStatus::Locked {
            return Err(BoxOfficeError::NotAvailable { status: self.status });
        }
        Ok(Seat {
            status: SeatStatus::Available,
            holder_id: None,
            version: self.version + 1,
            ..self.clone()
        })
    }

    pub fn is_available(&self) -> bool {
        self.status == SeatStatus::Available
    }

    pub fn is_locked(&self) -> bool {
        self.status == SeatStatus::Locked
    }

    pub fn is_sold(&self) -> bool {
        self.status == SeatStatus::Sold
    }

    pub fn is_held_by(&self, holder_id: &str) -> bool {
        self.holder_id.as_deref() == Some(holder_id)
    }
}

/// Numeric-aware comparison of seat numbers, so "A2" sorts before "A10".
/// Digit runs compare as numbers, everything else byte-wise.
pub fn natural_seat_cmp(a: &str, b: &str) -> Ordering {
    let mut ia = a.chars().peekable();
    let mut ib = b.chars().peekable();

    loop {
        match (ia.peek().copied(), ib.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) => {
                if ca.is_ascii_digit() && cb.is_ascii_digit() {
                    let na = take_number(&mut ia);
                    let nb = take_number(&mut ib);
                    match na.cmp(&nb) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                match ca.cmp(&cb) {
                    Ordering::Equal => {
                        ia.next();
                        ib.next();
                    }
                    other => return other,
                }
            }
        }
    }
}

fn take_number(iter: &mut std::iter::Peekable<std::str::Chars<'_>>) -> u64 {
    let mut n: u64 = 0;
    while let Some(c) = iter.peek() {
        match c.to_digit(10) {
            Some(d) => {
                n = n.saturating_mul(10).saturating_add(u64::from(d));
                iter.next();
            }
            None => break,
        }
    }
    n
}
