use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Span;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("room {room:?}: {reason}")]
    InvalidRoom { room: String, reason: String },
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),
}

// ── Room catalog file ────────────────────────────────────────────

/// Rooms as written in the catalog file:
///
/// ```toml
/// [[rooms]]
/// name = "Amaze"
/// capacity = 3
/// maintenance = [{ start = "09:00", end = "09:15" }]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub rooms: Vec<RoomConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    pub name: String,
    pub capacity: u32,
    #[serde(default)]
    pub maintenance: Vec<Span>,
}

impl CatalogConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

impl Default for CatalogConfig {
    /// Amaze (3), Beauty (7), Inspire (12), Strive (20), each down for
    /// cleaning at 09:00, 13:00 and 17:00 for fifteen minutes.
    fn default() -> Self {
        let rooms = [("Amaze", 3), ("Beauty", 7), ("Inspire", 12), ("Strive", 20)]
            .into_iter()
            .map(|(name, capacity)| RoomConfig {
                name: name.to_string(),
                capacity,
                maintenance: default_maintenance(),
            })
            .collect();
        Self { rooms }
    }
}

fn default_maintenance() -> Vec<Span> {
    [(9, 0, 9, 15), (13, 0, 13, 15), (17, 0, 17, 15)]
        .into_iter()
        .filter_map(|(sh, sm, eh, em)| {
            Some(Span::new(
                NaiveTime::from_hms_opt(sh, sm, 0)?,
                NaiveTime::from_hms_opt(eh, em, 0)?,
            ))
        })
        .collect()
}

// ── Server settings ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub max_connections: usize,
    pub metrics_port: Option<u16>,
    /// Catalog file; the built-in catalog is used when unset.
    pub rooms_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 5434,
            max_connections: 256,
            metrics_port: None,
            rooms_path: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            bind: lookup("ROOMALLOC_BIND").unwrap_or(defaults.bind),
            port: lookup("ROOMALLOC_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            max_connections: lookup("ROOMALLOC_MAX_CONNECTIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_connections),
            metrics_port: lookup("ROOMALLOC_METRICS_PORT").and_then(|s| s.parse().ok()),
            rooms_path: lookup("ROOMALLOC_ROOMS").map(PathBuf::from),
        }
    }

    pub fn load_catalog(&self) -> Result<CatalogConfig, ConfigError> {
        match &self.rooms_path {
            Some(path) => CatalogConfig::load(path),
            None => Ok(CatalogConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_catalog_has_four_rooms() {
        let cfg = CatalogConfig::default();
        let names: Vec<_> = cfg.rooms.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Amaze", "Beauty", "Inspire", "Strive"]);
        assert!(cfg.rooms.iter().all(|r| r.maintenance.len() == 3));
        assert_eq!(cfg.rooms[0].maintenance[1].to_string(), "[13:00 to 13:15]");
    }

    #[test]
    fn parse_catalog_toml() {
        let text = r#"
            [[rooms]]
            name = "Focus"
            capacity = 4
            maintenance = [{ start = "12:00", end = "12:30" }]

            [[rooms]]
            name = "Hall"
            capacity = 40
        "#;
        let cfg = CatalogConfig::from_toml_str(text).unwrap();
        assert_eq!(cfg.rooms.len(), 2);
        assert_eq!(cfg.rooms[0].maintenance[0].to_string(), "[12:00 to 12:30]");
        assert!(cfg.rooms[1].maintenance.is_empty());
    }

    #[test]
    fn parse_catalog_rejects_bad_time() {
        let text = r#"
            [[rooms]]
            name = "Focus"
            capacity = 4
            maintenance = [{ start = "noon", end = "12:30" }]
        "#;
        assert!(matches!(
            CatalogConfig::from_toml_str(text),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn shipped_catalog_matches_default() {
        let text = include_str!("../rooms.toml");
        let cfg = CatalogConfig::from_toml_str(text).unwrap();
        assert_eq!(cfg, CatalogConfig::default());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = CatalogConfig::load(Path::new("/nonexistent/rooms.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/rooms.toml"));
    }

    #[test]
    fn server_config_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("ROOMALLOC_PORT", "6000"),
            ("ROOMALLOC_MAX_CONNECTIONS", "not-a-number"),
            ("ROOMALLOC_METRICS_PORT", "9100"),
            ("ROOMALLOC_ROOMS", "/etc/roomalloc/rooms.toml"),
        ]
        .into_iter()
        .collect();
        let cfg = ServerConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.bind, "0.0.0.0");
        assert_eq!(cfg.port, 6000);
        assert_eq!(cfg.max_connections, 256);
        assert_eq!(cfg.metrics_port, Some(9100));
        assert_eq!(cfg.rooms_path, Some(PathBuf::from("/etc/roomalloc/rooms.toml")));
    }
}
