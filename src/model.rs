use std::fmt;
use std::sync::Arc;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Ledger-assigned booking identifier. Starts at 1, never reused.
pub type BookingId = u64;

/// `HH:mm` rendering used everywhere a time-of-day leaves the engine.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

pub fn fmt_time(time: NaiveTime) -> impl fmt::Display {
    time.format(hhmm::FORMAT)
}

/// A same-day time-of-day interval. Overlap is strict: touching endpoints
/// do not conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl Span {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} to {}]", fmt_time(self.start), fmt_time(self.end))
    }
}

/// A bookable room. Built once from configuration and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Room {
    pub name: String,
    pub capacity: u32,
    /// Maintenance windows in catalog order.
    pub maintenance: Vec<Span>,
}

impl Room {
    pub fn maintenance_overlapping<'a>(&'a self, span: &'a Span) -> impl Iterator<Item = &'a Span> {
        self.maintenance.iter().filter(move |w| w.overlaps(span))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Booking {
    pub id: BookingId,
    pub room: String,
    pub span: Span,
    pub number_of_people: u32,
}

/// Bookings held for one room. The engine keeps one of these per catalog
/// room behind its own lock.
#[derive(Debug, Clone)]
pub struct RoomLedger {
    pub room: Arc<Room>,
    /// Sorted by `span.start`.
    pub bookings: Vec<Booking>,
}

impl RoomLedger {
    pub fn new(room: Arc<Room>) -> Self {
        Self {
            room,
            bookings: Vec::new(),
        }
    }

    /// Insert booking maintaining sort order by span.start.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.span.start, |b| b.span.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn remove_booking(&mut self, id: BookingId) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn get(&self, id: BookingId) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    /// Bookings strictly overlapping the query.
    /// Uses binary search to skip bookings starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.span.start < query.end);
        let query_start = query.start;
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.span.end > query_start)
    }
}

// ── Result types ─────────────────────────────────────────────────

/// Successful allocation. Displays as the confirmation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub booking_id: BookingId,
    pub room: String,
    pub number_of_people: u32,
    pub span: Span,
}

impl fmt::Display for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Room '{}' booked successfully for {} people from {} to {}.",
            self.room,
            self.number_of_people,
            fmt_time(self.span.start),
            fmt_time(self.span.end)
        )
    }
}

/// A smaller room offered when nothing large enough is free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSuggestion {
    pub name: String,
    pub capacity: u32,
}

impl fmt::Display for RoomSuggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Room '{}' with a capacity of {} people.", self.name, self.capacity)
    }
}
