use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CONFIG_ENV_VAR: &str = "SLICEMARK_CONFIG";

/// Tunables for the viewport and the editing tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerConfig {
    pub min_scale: f64,
    pub max_scale: f64,
    /// Multiplicative zoom per wheel notch.
    pub wheel_zoom_step: f64,
    /// Half-size of the snap search window, in image pixels.
    pub snap_radius: u32,
    /// Gradient magnitudes at or below this are treated as noise.
    pub snap_noise_floor: f64,
    /// Normalized distance to the first vertex that closes a polygon.
    pub polygon_close_threshold: f64,
    /// Screen-space pick radius for vertices and edges.
    pub hit_tolerance_px: f64,
    pub magnet: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.1,
            max_scale: 20.0,
            wheel_zoom_step: 1.1,
            snap_radius: 15,
            snap_noise_floor: 50.0,
            polygon_close_threshold: 0.03,
            hit_tolerance_px: 8.0,
            magnet: false,
        }
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.validate())
    }

    /// Loads the file named by `SLICEMARK_CONFIG`, falling back to defaults.
    pub fn from_env() -> Self {
        let Some(path) = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from) else {
            return Self::default();
        };
        match Self::load(&path) {
            Ok(config) => {
                log::info!("Loaded viewer config from {}", path.display());
                config
            }
            Err(err) => {
                log::warn!("{err}; using default viewer config");
                Self::default()
            }
        }
    }

    /// Repairs values that would make the viewport degenerate.
    pub fn validate(mut self) -> Self {
        let defaults = Self::default();
        if !(self.min_scale.is_finite() && self.min_scale > 0.0) {
            self.min_scale = defaults.min_scale;
        }
        if !(self.max_scale.is_finite() && self.max_scale > 0.0) {
            self.max_scale = defaults.max_scale;
        }
        if self.min_scale > self.max_scale {
            std::mem::swap(&mut self.min_scale, &mut self.max_scale);
        }
        if !(self.wheel_zoom_step.is_finite() && self.wheel_zoom_step > 1.0) {
            self.wheel_zoom_step = defaults.wheel_zoom_step;
        }
        if !self.snap_noise_floor.is_finite() {
            self.snap_noise_floor = defaults.snap_noise_floor;
        }
        if !(self.polygon_close_threshold.is_finite() && self.polygon_close_threshold >= 0.0) {
            self.polygon_close_threshold = defaults.polygon_close_threshold;
        }
        if !(self.hit_tolerance_px.is_finite() && self.hit_tolerance_px >= 0.0) {
            self.hit_tolerance_px = defaults.hit_tolerance_px;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::ViewerConfig;
    use crate::error::ConfigError;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "maxScale": 8.0, "magnet": true }}"#).expect("write config");

        let config = ViewerConfig::load(file.path()).expect("config loads");
        assert_eq!(config.max_scale, 8.0);
        assert!(config.magnet);
        assert_eq!(config.snap_radius, ViewerConfig::default().snap_radius);
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "not json").expect("write config");

        assert_matches!(
            ViewerConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        );
    }

    #[test]
    fn validate_swaps_inverted_scale_bounds() {
        let config = ViewerConfig {
            min_scale: 30.0,
            max_scale: 2.0,
            ..ViewerConfig::default()
        }
        .validate();

        assert_eq!(config.min_scale, 2.0);
        assert_eq!(config.max_scale, 30.0);
    }
}
