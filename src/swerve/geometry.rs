// Module geometry: where each swerve module sits relative to the robot center
//
// Frame convention: +x forward, +y left, meters.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// The four swerve module slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModulePosition {
    FrontLeft,
    FrontRight,
    BackLeft,
    BackRight,
}

impl ModulePosition {
    /// Canonical order. Kinematics rows and every per-module collection follow it.
    pub const ALL: [ModulePosition; 4] = [
        ModulePosition::FrontLeft,
        ModulePosition::FrontRight,
        ModulePosition::BackLeft,
        ModulePosition::BackRight,
    ];

    /// Index of this position in `ALL`
    pub fn index(self) -> usize {
        match self {
            ModulePosition::FrontLeft => 0,
            ModulePosition::FrontRight => 1,
            ModulePosition::BackLeft => 2,
            ModulePosition::BackRight => 3,
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            ModulePosition::FrontLeft => "fl",
            ModulePosition::FrontRight => "fr",
            ModulePosition::BackLeft => "bl",
            ModulePosition::BackRight => "br",
        }
    }
}

/// One value per module, keyed by position.
///
/// Replaces index-aligned arrays: a value can only be looked up by the tag it
/// belongs to, and iteration always follows [`ModulePosition::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleMap<T> {
    pub front_left: T,
    pub front_right: T,
    pub back_left: T,
    pub back_right: T,
}

impl<T> ModuleMap<T> {
    /// Build a map by evaluating `f` once per position, in canonical order
    pub fn from_fn(mut f: impl FnMut(ModulePosition) -> T) -> Self {
        Self {
            front_left: f(ModulePosition::FrontLeft),
            front_right: f(ModulePosition::FrontRight),
            back_left: f(ModulePosition::BackLeft),
            back_right: f(ModulePosition::BackRight),
        }
    }

    pub fn get(&self, position: ModulePosition) -> &T {
        match position {
            ModulePosition::FrontLeft => &self.front_left,
            ModulePosition::FrontRight => &self.front_right,
            ModulePosition::BackLeft => &self.back_left,
            ModulePosition::BackRight => &self.back_right,
        }
    }

    /// (position, value) pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (ModulePosition, &T)> {
        ModulePosition::ALL
            .into_iter()
            .map(move |position| (position, self.get(position)))
    }

    pub fn map<U>(&self, mut f: impl FnMut(ModulePosition, &T) -> U) -> ModuleMap<U> {
        ModuleMap::from_fn(|position| f(position, self.get(position)))
    }
}

/// Wheel-to-wheel chassis measurements, meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryConfig {
    /// Left-right distance between module centers
    pub track_width_m: f64,
    /// Front-back distance between module centers
    pub wheel_base_m: f64,
}

impl GeometryConfig {
    pub fn new(track_width_m: f64, wheel_base_m: f64) -> Result<Self, ConfigError> {
        let geometry = Self {
            track_width_m,
            wheel_base_m,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Both measurements must be finite and strictly positive
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if valid(self.track_width_m) && valid(self.wheel_base_m) {
            Ok(())
        } else {
            Err(ConfigError::InvalidGeometry {
                track_width: self.track_width_m,
                wheel_base: self.wheel_base_m,
            })
        }
    }

    /// Distance from the robot center to any module
    pub fn drive_base_radius(&self) -> f64 {
        (self.track_width_m / 2.0).hypot(self.wheel_base_m / 2.0)
    }
}

/// Module position vectors for a rectangular base
pub fn resolve(geometry: &GeometryConfig) -> ModuleMap<Vector2<f64>> {
    let half_length = geometry.wheel_base_m / 2.0;
    let half_width = geometry.track_width_m / 2.0;

    ModuleMap {
        front_left: Vector2::new(half_length, half_width),
        front_right: Vector2::new(half_length, -half_width),
        back_left: Vector2::new(-half_length, half_width),
        back_right: Vector2::new(-half_length, -half_width),
    }
}
