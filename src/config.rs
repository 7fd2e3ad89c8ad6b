// Robot configuration: loop rates, topics, and the immutable RobotConfig
//
// RobotConfig is built once at startup (defaults below, or a JSON file) and
// handed to whoever needs it. Nothing reads it through a global.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;
use std::time::Duration;
use uom::si::f64::{Length, Velocity};
use uom::si::length::{inch, meter};
use uom::si::velocity::{foot_per_second, meter_per_second};

use crate::hardware::HardwareMap;
use crate::swerve::geometry::{GeometryConfig, ModuleMap};
use crate::swerve::module_constants::ModuleTuning;

// Teleop loop frequency
pub const LOOP_HZ: u64 = 50;

// Drivetrain runtime resamples the motion source faster than teleop runs
pub const DRIVETRAIN_HZ: u64 = 250;

// Driver station frames older than this are treated as a disconnected device
pub const INPUT_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_DS_FRAME: &str = "robot/ds/frame"; // joystick + enable state
pub const TOPIC_RT_DRIVETRAIN: &str = "robot/rt/drivetrain"; // module targets
pub const TOPIC_RT_ACTUATORS: &str = "robot/rt/actuators"; // open-loop mechanism outputs
pub const TOPIC_HEALTH: &str = "robot/state/health"; // health status

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Track width and wheel base must be positive and finite (got {track_width} m, {wheel_base} m)")]
    InvalidGeometry { track_width: f64, wheel_base: f64 },

    #[error("{name} must be positive and finite (got {value})")]
    InvalidLimit { name: &'static str, value: f64 },

    #[error("Module locations do not span the chassis; kinematics is singular")]
    DegenerateGeometry,
}

/// PID terms for a chassis-level controller
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidGains {
    pub const fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }
}

/// Chassis speed limits and chassis-level controller gains
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriveLimits {
    pub max_speed_mps: f64,
    pub limited_speed_mps: f64,
    pub max_rotation_radps: f64,
    pub max_rotation_radps2: f64,
    pub limited_rotation_radps: f64,

    /// Translation controller, consumed by path following in the drivetrain runtime
    pub translation_pid: PidGains,
    pub auto_theta_pid: PidGains,
    pub teleop_theta_pid: PidGains,
}

impl Default for DriveLimits {
    fn default() -> Self {
        let max_speed_mps = Velocity::new::<foot_per_second>(18.0).get::<meter_per_second>();
        let max_rotation_radps = PI * 2.0;

        Self {
            max_speed_mps,
            limited_speed_mps: max_speed_mps / 5.0,
            max_rotation_radps,
            max_rotation_radps2: PI * 2.0,
            limited_rotation_radps: max_rotation_radps / 5.0,

            translation_pid: PidGains::new(7.0, 0.0, 0.0),
            auto_theta_pid: PidGains::new(11.0, 0.0, 0.0),
            teleop_theta_pid: PidGains::new(10.0, 0.0, 0.0),
        }
    }
}

/// Per-module calibration: absolute encoder offset and motor inversions
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModuleCalibration {
    /// In rotations, (-1, 1]
    pub encoder_offset_rotations: f64,
    pub drive_inverted: bool,
    pub turn_inverted: bool,
}

impl ModuleCalibration {
    const fn new(encoder_offset_rotations: f64, drive_inverted: bool, turn_inverted: bool) -> Self {
        Self {
            encoder_offset_rotations,
            drive_inverted,
            turn_inverted,
        }
    }
}

/// Which joystick axis/button drives what
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeleopBindings {
    /// Left flight stick: translation
    pub translation_joystick: u8,
    pub forward_axis: usize,
    pub strafe_axis: usize,

    /// Right flight stick: rotation
    pub rotation_joystick: u8,
    pub rotation_axis: usize,

    /// Xbox controller
    pub operator_controller: u8,
    pub intake_button: usize,

    /// Open-loop output while the intake button is held
    pub intake_speed: f64,
}

impl Default for TeleopBindings {
    fn default() -> Self {
        Self {
            translation_joystick: 0,
            forward_axis: 1,
            strafe_axis: 0,

            rotation_joystick: 1,
            rotation_axis: 0,

            operator_controller: 2,
            intake_button: 3, // X

            intake_speed: 0.5,
        }
    }
}

/// The whole robot configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    /// Register the joystick drive command only on real hardware
    pub is_real: bool,

    pub hardware: HardwareMap,
    pub geometry: GeometryConfig,
    pub limits: DriveLimits,
    pub module_tuning: ModuleTuning,
    pub calibration: ModuleMap<ModuleCalibration>,
    pub teleop: TeleopBindings,
}

impl Default for RobotConfig {
    fn default() -> Self {
        // measured between swerve wheels, not the chassis frame
        let track_width_m = Length::new::<inch>(21.0).get::<meter>();
        let wheel_base_m = Length::new::<inch>(19.0).get::<meter>();

        Self {
            is_real: true,

            hardware: HardwareMap::default(),
            geometry: GeometryConfig {
                track_width_m,
                wheel_base_m,
            },
            limits: DriveLimits::default(),
            module_tuning: ModuleTuning::default(),
            calibration: ModuleMap {
                front_left: ModuleCalibration::new(0.219970703125, false, true),
                front_right: ModuleCalibration::new(0.265380859375, false, false),
                back_left: ModuleCalibration::new(-0.046875, false, false),
                back_right: ModuleCalibration::new(0.328125, true, false),
            },
            teleop: TeleopBindings::default(),
        }
    }
}

impl RobotConfig {
    /// Load a JSON config file and validate it
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: RobotConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.geometry.validate()?;

        let positive = |name: &'static str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::InvalidLimit { name, value })
            }
        };
        positive("max_speed_mps", self.limits.max_speed_mps)?;
        positive("max_rotation_radps", self.limits.max_rotation_radps)?;
        positive("wheel_radius_m", self.module_tuning.wheel_radius_m)?;
        positive("drive_gear_ratio", self.module_tuning.drive_gear_ratio)?;

        let speed = self.teleop.intake_speed;
        if !(speed.is_finite() && (-1.0..=1.0).contains(&speed)) {
            return Err(ConfigError::InvalidLimit {
                name: "intake_speed",
                value: speed,
            });
        }
        Ok(())
    }
}
