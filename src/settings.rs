//! Simulation settings
//!
//! Loaded from an optional JSON file; every field falls back to its default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::ConfigError;

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(QualityPreset::Low),
            "medium" | "med" => Some(QualityPreset::Medium),
            "high" => Some(QualityPreset::High),
            _ => None,
        }
    }

    /// Icosphere subdivision level for the primary's surface mesh
    pub fn mesh_subdivisions(&self) -> u32 {
        match self {
            QualityPreset::Low => 3,
            QualityPreset::Medium => 4,
            QualityPreset::High => 5,
        }
    }

    /// Hump markers per tsunami ring
    pub fn humps_per_ring(&self) -> usize {
        match self {
            QualityPreset::Low => 12,
            QualityPreset::Medium => 18,
            QualityPreset::High => 24,
        }
    }

    /// Segments used when tessellating rings and discs
    pub fn circle_segments(&self) -> u32 {
        match self {
            QualityPreset::Low => 24,
            QualityPreset::Medium => 48,
            QualityPreset::High => 64,
        }
    }
}

/// How the projectile's trajectory is advanced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PropagationMode {
    /// Inverse-square gravity, semi-implicit Euler
    #[default]
    Gravity,
    /// Circular path in a fixed plane with a shrinking radius
    DecayingOrbit,
}

/// Simulation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Mesh and effect detail
    pub quality: QualityPreset,

    // === Orbit ===
    pub propagation: PropagationMode,
    /// G * M in scene units (gravity mode)
    pub gravity_parameter: f32,
    /// Primary spin (radians/sec)
    pub rotation_speed: f32,
    /// Distance from the primary's center where projectiles appear
    pub spawn_distance: f32,
    /// Scene units/sec per km/s of requested speed (gravity mode)
    pub velocity_scale: f32,
    /// Radius shrink per second per km/s (decaying-orbit mode)
    pub decay_rate_per_speed: f32,
    /// Angular speed in radians/sec (decaying-orbit mode)
    pub angular_speed: f32,

    // === Effects ===
    /// Tsunami ring count at full water strength
    pub max_waves: u32,

    // === Collaborators ===
    /// Equirectangular surface color image
    pub texture_path: Option<PathBuf>,
    /// Base URL of the optional impact-estimate service
    pub estimate_service_url: Option<String>,

    /// RNG seed for spawn placement and asteroid shapes
    pub seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality: QualityPreset::Medium,

            propagation: PropagationMode::Gravity,
            gravity_parameter: GRAVITY_PARAMETER,
            rotation_speed: PRIMARY_ROTATION_SPEED,
            spawn_distance: SPAWN_DISTANCE,
            velocity_scale: VELOCITY_SCALE,
            decay_rate_per_speed: DECAY_RATE_PER_SPEED,
            angular_speed: ORBIT_ANGULAR_SPEED,

            max_waves: MAX_WAVES,

            texture_path: None,
            estimate_service_url: None,

            seed: 0x5eed,
        }
    }
}

impl Settings {
    /// Create settings from a quality preset
    pub fn from_preset(preset: QualityPreset) -> Self {
        Self {
            quality: preset,
            ..Self::default()
        }
    }

    /// Read settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        let settings = serde_json::from_str(&json).map_err(ConfigError::Parse)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Read settings, falling back to defaults on any error
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Using default settings: {e}");
                Self::default()
            }
        }
    }

    /// Write settings as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, json).map_err(ConfigError::Write)?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "quality": "High", "max_waves": 5 }"#).unwrap();
        assert_eq!(settings.quality, QualityPreset::High);
        assert_eq!(settings.max_waves, 5);
        assert_eq!(settings.propagation, PropagationMode::Gravity);
        assert_eq!(settings.spawn_distance, SPAWN_DISTANCE);
    }

    #[test]
    fn test_preset_parse() {
        assert_eq!(QualityPreset::parse("MED"), Some(QualityPreset::Medium));
        assert_eq!(QualityPreset::parse("ultra"), None);
        assert_eq!(QualityPreset::High.as_str(), "High");
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let settings = Settings::load_or_default(Path::new("/nonexistent/impact-sim.json"));
        assert_eq!(settings.quality, QualityPreset::Medium);
        assert!(matches!(
            Settings::load(Path::new("/nonexistent/impact-sim.json")),
            Err(ConfigError::Read(_))
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("impact-sim.json");
        let mut settings = Settings::from_preset(QualityPreset::Low);
        settings.propagation = PropagationMode::DecayingOrbit;
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.quality, QualityPreset::Low);
        assert_eq!(loaded.propagation, PropagationMode::DecayingOrbit);
    }

    #[test]
    fn test_save_into_missing_dir_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("impact-sim.json");
        assert!(matches!(
            Settings::default().save(&path),
            Err(ConfigError::Write(_))
        ));
    }
}
