use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{CatalogConfig, ConfigError, RoomConfig};
use crate::limits::*;
use crate::model::Room;

/// The configured rooms, in configuration order. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct RoomCatalog {
    rooms: Vec<Arc<Room>>,
}

impl RoomCatalog {
    /// Validate configured rooms and build the catalog.
    pub fn from_config(config: &CatalogConfig) -> Result<Self, ConfigError> {
        if config.rooms.len() > MAX_ROOMS {
            return Err(ConfigError::InvalidCatalog(format!(
                "{} rooms configured, at most {MAX_ROOMS} allowed",
                config.rooms.len()
            )));
        }

        let mut seen = HashSet::new();
        let mut rooms = Vec::with_capacity(config.rooms.len());
        for rc in &config.rooms {
            validate_room(rc)?;
            if !seen.insert(rc.name.as_str()) {
                return Err(invalid(rc, "duplicate room name"));
            }
            rooms.push(Arc::new(Room {
                name: rc.name.clone(),
                capacity: rc.capacity,
                maintenance: rc.maintenance.clone(),
            }));
        }
        Ok(Self { rooms })
    }

    pub fn list_all(&self) -> &[Arc<Room>] {
        &self.rooms
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Arc<Room>> {
        self.rooms.iter().find(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

fn validate_room(rc: &RoomConfig) -> Result<(), ConfigError> {
    if rc.name.trim().is_empty() {
        return Err(invalid(rc, "empty room name"));
    }
    if rc.name.len() > MAX_ROOM_NAME_LEN {
        return Err(invalid(rc, "room name too long"));
    }
    if rc.capacity == 0 {
        return Err(invalid(rc, "capacity must be at least 1"));
    }
    if rc.maintenance.len() > MAX_MAINTENANCE_WINDOWS {
        return Err(invalid(rc, "too many maintenance windows"));
    }
    if let Some(w) = rc.maintenance.iter().find(|w| w.start >= w.end) {
        return Err(invalid(
            rc,
            &format!("maintenance window {w} must end after it starts"),
        ));
    }
    Ok(())
}

fn invalid(rc: &RoomConfig, reason: &str) -> ConfigError {
    ConfigError::InvalidRoom {
        room: rc.name.clone(),
        reason: reason.to_string(),
    }
}
