// Shared presentation constants for both dashboard layers
use crate::dash_models::{DashError, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "TBM_DASH_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusColors {
    pub connected: String,
    pub maintenance: String,
    pub disconnected: String,
    pub unknown: String,
}

impl Default for StatusColors {
    fn default() -> Self {
        StatusColors {
            connected: "#E37222".to_string(),
            maintenance: "#0A8A9F".to_string(),
            disconnected: "red".to_string(),
            unknown: "gray".to_string(),
        }
    }
}

/// Initial map position, `center` in (latitude, longitude).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub center: [f64; 2],
    pub zoom: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashConfig {
    pub status_colors: StatusColors,
    /// Station circle radius per available bike.
    pub radius_scale: f64,
    /// Mean delay above which a line is highlighted, in seconds.
    pub delay_threshold_seconds: f64,
    pub alert_color: String,
    pub alert_weight: f64,
    pub default_weight: f64,
    /// Colour of lines missing from `known_lines`.
    pub unknown_line_color: String,
    /// Place a vehicle glyph every `icon_stride` points along a path.
    pub icon_stride: usize,
    /// Ordered line codes; the palette is generated from this order.
    pub known_lines: Vec<String>,
    /// Daylight tile window for the automatic tile choice, `[start, end)` as HH:MM.
    pub day_tile_start: String,
    pub day_tile_end: String,
    pub station_view: MapView,
    pub route_view: MapView,
}

impl Default for DashConfig {
    fn default() -> Self {
        DashConfig {
            status_colors: StatusColors::default(),
            radius_scale: 1.5,
            delay_threshold_seconds: 100.0,
            alert_color: "red".to_string(),
            alert_weight: 20.0,
            default_weight: 2.5,
            unknown_line_color: "white".to_string(),
            icon_stride: 5000,
            known_lines: [
                "Tram B", "Tram C", "Tram A", "Tram D", "Lianes 1", "Lianes 2", "Lianes 3",
                "Lianes 4", "Lianes 5", "Lianes 9", "Lianes 10", "Lianes 11", "Lianes 15",
                "Lianes 16", "BAT3",
            ]
            .iter()
            .map(|code| code.to_string())
            .collect(),
            day_tile_start: "06:20".to_string(),
            day_tile_end: "21:40".to_string(),
            station_view: MapView {
                center: [44.8378, -0.5792],
                zoom: 13,
            },
            route_view: MapView {
                center: [44.841424, -0.570334],
                zoom: 13,
            },
        }
    }
}

impl DashConfig {
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("tbm_dashboard");
        path.push("config.json");
        path
    }

    /// Explicit path first, then `TBM_DASH_CONFIG`, then the user config directory.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(value) if !value.trim().is_empty() => PathBuf::from(value.trim()),
            _ => Self::default_path(),
        }
    }

    /// A missing file means defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No dashboard config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| DashError::FileError(format!("Failed to read config {:?}: {}", path, e)))?;

        let config = Self::from_json(&contents)?;
        info!("Dashboard config loaded from {:?}", path);
        Ok(config)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let config: DashConfig = serde_json::from_str(contents)
            .map_err(|e| DashError::ConfigError(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                DashError::FileError(format!("Failed to create {:?}: {}", parent, e))
            })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| DashError::ConfigError(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, json)
            .map_err(|e| DashError::FileError(format!("Failed to write config {:?}: {}", path, e)))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.radius_scale.is_finite() || self.radius_scale < 0.0 {
            return Err(DashError::ConfigError(format!(
                "radius_scale must be a non-negative number, got {}",
                self.radius_scale
            )));
        }
        if self.icon_stride == 0 {
            return Err(DashError::ConfigError("icon_stride must be at least 1".to_string()));
        }
        if !self.delay_threshold_seconds.is_finite() {
            return Err(DashError::ConfigError(
                "delay_threshold_seconds must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DashConfig::default();
        assert_eq!(config.radius_scale, 1.5);
        assert_eq!(config.icon_stride, 5000);
        assert_eq!(config.known_lines.len(), 15);
        assert_eq!(config.known_lines[0], "Tram B");
        assert_eq!(config.status_colors.connected, "#E37222");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = DashConfig::from_json(r#"{"radius_scale": 2.0, "icon_stride": 20000}"#).unwrap();
        assert_eq!(config.radius_scale, 2.0);
        assert_eq!(config.icon_stride, 20000);
        assert_eq!(config.delay_threshold_seconds, 100.0);
        assert_eq!(config.status_colors, StatusColors::default());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            DashConfig::from_json(r#"{"icon_stride": 0}"#),
            Err(DashError::ConfigError(_))
        ));
        assert!(matches!(
            DashConfig::from_json(r#"{"radius_scale": -1.0}"#),
            Err(DashError::ConfigError(_))
        ));
        assert!(DashConfig::from_json("not json").is_err());
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = DashConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, DashConfig::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = DashConfig::default();
        config.alert_weight = 12.0;
        config.save(&path).unwrap();
        assert_eq!(DashConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn explicit_path_wins() {
        let path = Path::new("/tmp/explicit.json");
        assert_eq!(DashConfig::resolve_path(Some(path)), path.to_path_buf());
    }
}
