// ── Booking rules ────────────────────────────────────────────────

/// Start and end minutes must land on this grid.
pub const SLOT_GRANULARITY_MINUTES: u32 = 15;

pub const MIN_BOOKING_MINUTES: i64 = 30;

/// Five hours.
pub const MAX_BOOKING_MINUTES: i64 = 300;

pub const MIN_PARTY_SIZE: u32 = 2;

// ── Catalog limits ───────────────────────────────────────────────

pub const MAX_ROOMS: usize = 1024;
pub const MAX_ROOM_NAME_LEN: usize = 256;
pub const MAX_MAINTENANCE_WINDOWS: usize = 96;
