//! Tunables for the motion engine, loadable from TOML.
//!
//! Every section has working defaults, so a config file only needs the keys
//! it changes:
//!
//! ```toml
//! [collision]
//! min_overlap = 0.02
//!
//! [manipulator]
//! linear_sensitivity = -0.005
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a whole editing session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub parser: ParserConfig,
    pub animator: AnimatorConfig,
    pub manipulator: ManipulatorConfig,
    pub collision: CollisionConfig,
}

impl EditorConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded editor config");
        Ok(config)
    }
}

/// How the script parser recognises pose-update calls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Function names treated as pose-update calls.
    pub call_names: Vec<String>,
    /// Trailing argument that marks the startup call.
    pub startup_flag: i64,
    /// Trailing argument that marks the shutdown call.
    pub shutdown_flag: i64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            call_names: vec!["updateJointPositions".to_string(), "update".to_string()],
            startup_flag: 1,
            shutdown_flag: 2,
        }
    }
}

/// Sequence playback settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimatorConfig {
    /// Per-joint tolerance under which two poses count as equal (hop skipping,
    /// resting-block detection).
    pub same_pose_epsilon: f32,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            same_pose_epsilon: 1e-3,
        }
    }
}

/// Pointer-drag settings and handle geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManipulatorConfig {
    /// Radians per pixel of vertical pointer travel. Negative so that
    /// dragging up (screen y decreasing) increases the joint value.
    pub linear_sensitivity: f32,
    /// Gain applied to the arc-drag angle.
    pub rotational_sensitivity: f32,
    /// Values are rounded to `1 / steps_per_radian`.
    pub steps_per_radian: f32,
    pub handle_length: f32,
    pub handle_radius: f32,
    pub arc_radius: f32,
    pub arc_thickness: f32,
    pub opacity_selected: f32,
    pub opacity_descendant: f32,
    pub opacity_idle: f32,
}

impl Default for ManipulatorConfig {
    fn default() -> Self {
        Self {
            linear_sensitivity: -0.01,
            rotational_sensitivity: 1.0,
            steps_per_radian: 20.0,
            handle_length: 0.08,
            handle_radius: 0.015,
            arc_radius: 0.13,
            arc_thickness: 0.012,
            opacity_selected: 0.92,
            opacity_descendant: 0.3,
            opacity_idle: 0.15,
        }
    }
}

/// Self-collision display settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Overlaps thinner than this on every axis are treated as noise (meters).
    pub min_overlap: f32,
    /// Only bodies whose name ends with this suffix are checked.
    pub body_suffix: String,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            min_overlap: 0.01,
            body_suffix: "_link".to_string(),
        }
    }
}
