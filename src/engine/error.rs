use std::fmt;

use thiserror::Error;

use crate::limits::*;
use crate::model::{BookingId, RoomSuggestion, Span};

/// Which side of a requested interval failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeField {
    Start,
    End,
}

impl fmt::Display for TimeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeField::Start => f.write_str("start"),
            TimeField::End => f.write_str("end"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IntervalViolation {
    #[error("End time must be after start time.")]
    EndNotAfterStart,
    #[error("Booking times must be in {}-minute intervals.", SLOT_GRANULARITY_MINUTES)]
    OffGrid,
    #[error("Booking duration must be at least {} minutes.", MIN_BOOKING_MINUTES)]
    TooShort,
    #[error("Booking duration cannot exceed {} hours.", MAX_BOOKING_MINUTES / 60)]
    TooLong,
}

/// Every way a request can be turned away. Display strings are the
/// user-facing rejection messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Invalid {0} time format. Please use HH:mm format (e.g., 14:30).")]
    InvalidTimeFormat(TimeField),

    #[error(transparent)]
    InvalidTimeInterval(#[from] IntervalViolation),

    #[error("Number of people should be greater than 1.")]
    InvalidNumberOfPeople(u32),

    #[error(
        "The requested time overlaps with the following maintenance windows for room: {room}: {}",
        join_windows(.windows)
    )]
    MaintenanceConflict { room: String, windows: Vec<Span> },

    #[error("All rooms are already booked during the requested time.")]
    AllRoomsBooked,

    #[error("{}", no_room_message(.number_of_people, .fallback))]
    NoRoomAvailable {
        number_of_people: u32,
        /// Smaller free rooms, largest first. Empty when there is nothing to offer.
        fallback: Vec<RoomSuggestion>,
    },

    #[error("Booking with ID {0} not found.")]
    BookingNotFound(BookingId),

    /// Internal fault, not a problem with the request.
    #[error("system unavailable: {0}")]
    Unavailable(String),
}

impl EngineError {
    /// SQLSTATE reported at the wire boundary.
    pub fn sqlstate(&self) -> &'static str {
        match self {
            EngineError::InvalidTimeFormat(_) => "22007",
            EngineError::InvalidTimeInterval(_) | EngineError::InvalidNumberOfPeople(_) => "22023",
            EngineError::MaintenanceConflict { .. }
            | EngineError::AllRoomsBooked
            | EngineError::NoRoomAvailable { .. } => "23P01",
            EngineError::BookingNotFound(_) => "P0002",
            EngineError::Unavailable(_) => "58000",
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidTimeFormat(_) => "invalid_time_format",
            EngineError::InvalidTimeInterval(_) => "invalid_time_interval",
            EngineError::InvalidNumberOfPeople(_) => "invalid_number_of_people",
            EngineError::MaintenanceConflict { .. } => "maintenance_conflict",
            EngineError::AllRoomsBooked => "all_rooms_booked",
            EngineError::NoRoomAvailable { .. } => "no_room_available",
            EngineError::BookingNotFound(_) => "booking_not_found",
            EngineError::Unavailable(_) => "unavailable",
        }
    }
}

fn join_windows(windows: &[Span]) -> String {
    windows
        .iter()
        .map(Span::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn no_room_message(number_of_people: &u32, fallback: &[RoomSuggestion]) -> String {
    if fallback.is_empty() {
        return "No suitable room available for the requested time.".to_string();
    }
    let mut msg = format!(
        "All rooms suitable for {number_of_people} people are booked, but the following rooms with lower capacity are available during the requested time:\n"
    );
    for room in fallback {
        msg.push_str(&room.to_string());
        msg.push('\n');
    }
    msg.trim_end().to_string()
}
