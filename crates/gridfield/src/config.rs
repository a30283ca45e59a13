//! Configuration for grid tolerances and the serialized layout.

use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};
use crate::Real;

/// Tolerances and format choices shared by every axis and grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Largest difference, in coordinate units, for two axis values to count as equal.
    pub coord_tolerance: Real,

    /// Distance within which a bracket query at an extreme gridpoint snaps to the edge bracket.
    pub snap_tolerance: Real,

    /// Layout written by `serialize`.
    pub format_version: FormatVersion,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            coord_tolerance: 1.0e-3,
            snap_tolerance: 1.0e-4,
            format_version: FormatVersion::V2,
        }
    }
}

impl GridConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables leave the default in place.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("GRID_COORD_TOLERANCE") {
            if let Ok(tol) = val.parse() {
                config.coord_tolerance = tol;
            }
        }

        if let Ok(val) = std::env::var("GRID_SNAP_TOLERANCE") {
            if let Ok(tol) = val.parse() {
                config.snap_tolerance = tol;
            }
        }

        if let Ok(val) = std::env::var("GRID_FORMAT_VERSION") {
            if let Some(version) = FormatVersion::from_str(&val) {
                config.format_version = version;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.coord_tolerance.is_finite() && self.coord_tolerance > 0.0) {
            return Err("coord_tolerance must be finite and > 0".to_string());
        }

        if !(self.snap_tolerance.is_finite() && self.snap_tolerance > 0.0) {
            return Err("snap_tolerance must be finite and > 0".to_string());
        }

        Ok(())
    }

    /// This config if it validates, as a grid error otherwise.
    pub fn checked(self) -> GridResult<Self> {
        self.validate().map_err(GridError::bad_config)?;
        Ok(self)
    }
}

/// Serialized grid layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FormatVersion {
    /// Axis counts and values written inline by the grid.
    V1,
    /// Each axis writes its own payload, including metadata and the wrap flag.
    #[default]
    V2,
}

impl FormatVersion {
    /// Parse from `"1"`, `"v1"`, `"2"` or `"v2"` (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "1" | "v1" => Some(Self::V1),
            "2" | "v2" => Some(Self::V2),
            _ => None,
        }
    }

    /// Version number as written to the payload.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }

    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            _ => None,
        }
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GridConfig::default();
        assert_eq!(config.coord_tolerance, 1.0e-3);
        assert_eq!(config.snap_tolerance, 1.0e-4);
        assert_eq!(config.format_version, FormatVersion::V2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_tolerances() {
        let config = GridConfig {
            coord_tolerance: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = GridConfig {
            snap_tolerance: Real::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_checked_maps_to_grid_error() {
        assert!(GridConfig::default().checked().is_ok());
        let config = GridConfig {
            coord_tolerance: -1.0,
            ..Default::default()
        };
        assert!(matches!(config.checked(), Err(GridError::BadConfig(_))));
    }

    #[test]
    fn test_from_env_reads_overrides() {
        std::env::set_var("GRID_COORD_TOLERANCE", "0.5");
        std::env::set_var("GRID_FORMAT_VERSION", "v1");
        std::env::set_var("GRID_SNAP_TOLERANCE", "not a number");
        let config = GridConfig::from_env();
        std::env::remove_var("GRID_COORD_TOLERANCE");
        std::env::remove_var("GRID_FORMAT_VERSION");
        std::env::remove_var("GRID_SNAP_TOLERANCE");

        assert_eq!(config.coord_tolerance, 0.5);
        assert_eq!(config.snap_tolerance, 1.0e-4);
        assert_eq!(config.format_version, FormatVersion::V1);
    }

    #[test]
    fn test_format_version_parsing() {
        assert_eq!(FormatVersion::from_str("V1"), Some(FormatVersion::V1));
        assert_eq!(FormatVersion::from_str(" 2 "), Some(FormatVersion::V2));
        assert_eq!(FormatVersion::from_str("3"), None);
        assert_eq!(FormatVersion::from_i32(2), Some(FormatVersion::V2));
        assert_eq!(FormatVersion::V1.to_string(), "v1");
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = GridConfig {
            format_version: FormatVersion::V1,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: GridConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
