use chrono::{NaiveTime, Timelike};

use crate::limits::*;
use crate::model::{Span, hhmm};

use super::error::{IntervalViolation, TimeField};
use super::EngineError;

/// Parse an `HH:mm` time-of-day. Both fields must be two digits; padding,
/// seconds and trailing input are rejected.
pub fn parse_time(input: &str, field: TimeField) -> Result<NaiveTime, EngineError> {
    if !is_hhmm_shaped(input) {
        return Err(EngineError::InvalidTimeFormat(field));
    }
    NaiveTime::parse_from_str(input, hhmm::FORMAT)
        .map_err(|_| EngineError::InvalidTimeFormat(field))
}

// chrono accepts one-digit fields for %H and %M.
fn is_hhmm_shaped(input: &str) -> bool {
    let b = input.as_bytes();
    b.len() == 5
        && b[2] == b':'
        && [0, 1, 3, 4].iter().all(|&i| b[i].is_ascii_digit())
}

/// Parse both ends and require `start < end`. Used by read-only queries,
/// which do not apply the booking grid or duration rules.
pub fn parse_span(start: &str, end: &str) -> Result<Span, EngineError> {
    let start = parse_time(start, TimeField::Start)?;
    let end = parse_time(end, TimeField::End)?;
    if start >= end {
        return Err(IntervalViolation::EndNotAfterStart.into());
    }
    Ok(Span::new(start, end))
}

/// Full booking validation of a requested interval.
pub fn validate(start: &str, end: &str) -> Result<Span, EngineError> {
    let start = parse_time(start, TimeField::Start)?;
    let end = parse_time(end, TimeField::End)?;
    validate_times(start, end)
}

pub fn validate_times(start: NaiveTime, end: NaiveTime) -> Result<Span, EngineError> {
    if start >= end {
        return Err(IntervalViolation::EndNotAfterStart.into());
    }
    if start.minute() % SLOT_GRANULARITY_MINUTES != 0 || end.minute() % SLOT_GRANULARITY_MINUTES != 0 {
        return Err(IntervalViolation::OffGrid.into());
    }
    let span = Span::new(start, end);
    let minutes = span.duration_minutes();
    if minutes < MIN_BOOKING_MINUTES {
        return Err(IntervalViolation::TooShort.into());
    }
    if minutes > MAX_BOOKING_MINUTES {
        return Err(IntervalViolation::TooLong.into());
    }
    Ok(span)
}
