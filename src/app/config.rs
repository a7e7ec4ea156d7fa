use crate::selection::CoaMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Session options. Missing JSON fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Camera moves need Alt held with the mouse button.
    pub use_maya_cam_controls: bool,
    pub lock_roll: bool,
    pub coa_mode: CoaMode,
    /// Keep the widget at a constant apparent size.
    pub scale_widget_by_cam: bool,
    /// Node names that picking with `SkipFlags::UNPICKABLE` ignores.
    pub unpickable: Vec<String>,
    /// Seconds a press is held before it turns into a move.
    pub pivot_delay: f64,
    pub undo_depth: usize,
    /// NDC distance that turns a press into a move before the delay expires.
    pub move_threshold: f64,
    /// NDC magnitude past which the mouse is in the outer frame.
    pub edge_threshold: f64,
    /// Number of rungs in the 10^k distance ladder used when a COA pick misses.
    pub coa_ladder_len: u32,
    pub cam_move_duration: f64,
    pub coa_marker_scale: f64,
    pub coa_marker_min: f64,
    pub coa_marker_max: f64,
    pub coa_fade_duration: f64,
    pub message_duration: f64,
    pub ortho_factor_min: f64,
    pub ortho_factor_max: f64,
    /// Tags that select-by-tag walks up to.
    pub selection_tags: Vec<String>,
    /// Keep the widget aligned to world axes instead of the node.
    pub world_space_manip: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            use_maya_cam_controls: false,
            lock_roll: false,
            coa_mode: CoaMode::Origin,
            scale_widget_by_cam: false,
            unpickable: ["x-disc-visible", "y-disc-visible", "z-disc-visible", "GridBack", "unpickable"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            pivot_delay: 0.65,
            undo_depth: 25,
            move_threshold: 0.01,
            edge_threshold: 0.9,
            coa_ladder_len: 7,
            cam_move_duration: 1.2,
            coa_marker_scale: 0.0075,
            coa_marker_min: 0.1,
            coa_marker_max: 1.0e5,
            coa_fade_duration: 1.5,
            message_duration: 3.0,
            ortho_factor_min: 1.0e-4,
            ortho_factor_max: 1.0e4,
            selection_tags: Vec::new(),
            world_space_manip: false,
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        log::info!("loaded session config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        log::info!("saved session config to {}", path.display());
        Ok(())
    }

    /// Rejects values the controllers cannot work with.
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("pivot_delay", self.pivot_delay),
            ("move_threshold", self.move_threshold),
            ("cam_move_duration", self.cam_move_duration),
            ("coa_fade_duration", self.coa_fade_duration),
            ("message_duration", self.message_duration),
        ];
        for (field, value) in non_negative {
            if !(value >= 0.0) {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }
        if !(self.edge_threshold > 0.0 && self.edge_threshold < 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "edge_threshold",
                value: self.edge_threshold,
            });
        }
        if self.undo_depth == 0 {
            return Err(ConfigError::OutOfRange {
                field: "undo_depth",
                value: 0.0,
            });
        }
        if self.coa_ladder_len == 0 {
            return Err(ConfigError::OutOfRange {
                field: "coa_ladder_len",
                value: 0.0,
            });
        }
        if !(self.coa_marker_scale > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "coa_marker_scale",
                value: self.coa_marker_scale,
            });
        }
        if !(self.coa_marker_min > 0.0 && self.coa_marker_min <= self.coa_marker_max) {
            return Err(ConfigError::OutOfRange {
                field: "coa_marker_min",
                value: self.coa_marker_min,
            });
        }
        if !(self.ortho_factor_min > 0.0 && self.ortho_factor_min <= self.ortho_factor_max) {
            return Err(ConfigError::OutOfRange {
                field: "ortho_factor_min",
                value: self.ortho_factor_min,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.undo_depth, 25);
        assert_eq!(config.pivot_delay, 0.65);
        assert!(config.unpickable.iter().any(|n| n == "GridBack"));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config =
            SessionConfig::from_json_str(r#"{ "lock_roll": true, "coa_mode": "CenterOfBbox" }"#)
                .unwrap();
        assert!(config.lock_roll);
        assert_eq!(config.coa_mode, CoaMode::CenterOfBbox);
        assert_eq!(config.coa_ladder_len, 7);
    }

    #[test]
    fn out_of_range_is_rejected() {
        let err = SessionConfig::from_json_str(r#"{ "edge_threshold": 1.5 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                field: "edge_threshold",
                ..
            }
        ));
        assert!(SessionConfig::from_json_str(r#"{ "undo_depth": 0 }"#).is_err());
        assert!(matches!(
            SessionConfig::from_json_str("{ not json").unwrap_err(),
            ConfigError::Json(_)
        ));
    }

    #[test]
    fn save_load_via_file() {
        let mut config = SessionConfig::default();
        config.use_maya_cam_controls = true;
        config.selection_tags = vec!["OBJRoot".to_string()];
        config.undo_depth = 10;

        let mut path = std::env::temp_dir();
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        path.push(format!(
            "stagehand_config_{}_{}.json",
            std::process::id(),
            nonce
        ));

        config.save(&path).unwrap();
        let loaded = SessionConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = std::env::temp_dir().join("stagehand_config_does_not_exist.json");
        assert!(matches!(
            SessionConfig::load(&path).unwrap_err(),
            ConfigError::Io(_)
        ));
    }
}
