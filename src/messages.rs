// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::swerve::{ChassisSpeeds, ModulePosition};

/// One joystick's sampled state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoystickState {
    pub axes: Vec<f64>,
    pub buttons: Vec<bool>,
}

// Driver station -> runtime
// Joysticks are indexed by their driver station port
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriverStationFrame {
    pub enabled: bool,
    pub joysticks: Vec<JoystickState>,
}

/// Target for one module as sent to the drivetrain hardware
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModuleTarget {
    pub position: ModulePosition,
    pub drive_motor_id: i32,
    pub turn_motor_id: i32,
    /// Drive motor rotor velocity, rotations/s, inversion applied
    pub drive_rps: f64,
    /// Steer mechanism position, rotations (0 = straight ahead)
    pub steer_rotations: f64,
}

/// What the drivetrain is doing this tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    /// Sampling the default motion source
    Default,
    /// Holding a direct request
    Direct,
    Brake,
}

// Drivetrain runtime -> hardware
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrivetrainActuation {
    pub mode: DriveMode,
    pub chassis: ChassisSpeeds,
    pub modules: Vec<ModuleTarget>,
}

// Teleop -> mechanism motors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActuatorCommand {
    pub can_id: i32,
    pub output: f64,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    Disabled,
    InputStale,
}

impl DriverStationFrame {
    /// Axis `axis` on joystick port `device`, if both exist
    pub fn axis(&self, device: u8, axis: usize) -> Option<f64> {
        self.joysticks
            .get(device as usize)
            .and_then(|joystick| joystick.axes.get(axis))
            .copied()
    }

    pub fn button(&self, device: u8, button: usize) -> Option<bool> {
        self.joysticks
            .get(device as usize)
            .and_then(|joystick| joystick.buttons.get(button))
            .copied()
    }
}
