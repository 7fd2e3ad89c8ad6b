// Per-module constants for the drivetrain runtime
//
// Every module shares the same tuning; only ids, encoder offset, location and
// inversion differ. The factory copies the shared part into each record.

use serde::{Deserialize, Serialize};
use uom::si::f64::Length;
use uom::si::length::{inch, meter};

use super::geometry::ModulePosition;

/// Closed-loop gains for one motor control slot
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SlotGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// static friction feed-forward
    pub ks: f64,
    /// velocity feed-forward
    pub kv: f64,
    /// acceleration feed-forward
    pub ka: f64,
}

/// What the motor controller's closed loop outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosedLoopOutputType {
    Voltage,
    TorqueCurrentFoc,
}

/// Where the steer motor gets its angle from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SteerFeedbackType {
    RemoteCancoder,
    FusedCancoder,
    SyncCancoder,
}

/// Mechanical and electrical parameters shared by all four modules
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModuleTuning {
    pub drive_gear_ratio: f64,
    pub turn_gear_ratio: f64,
    /// Drive rotations induced per azimuth rotation
    pub coupling_ratio: f64,
    pub wheel_radius_m: f64,

    pub slip_current_amps: f64,
    pub friction_voltage: f64,
    pub drive_inertia: f64,
    pub turn_inertia: f64,

    pub drive_gains: SlotGains,
    pub turn_gains: SlotGains,
    pub drive_closed_loop_output: ClosedLoopOutputType,
    pub turn_closed_loop_output: ClosedLoopOutputType,
    pub feedback_source: SteerFeedbackType,
}

impl Default for ModuleTuning {
    fn default() -> Self {
        Self {
            drive_gear_ratio: 6.12,
            turn_gear_ratio: 150.0 / 7.0,
            coupling_ratio: 3.5714285714285716,
            wheel_radius_m: Length::new::<inch>(1.95).get::<meter>(),

            slip_current_amps: 300.0,
            friction_voltage: 0.25,
            drive_inertia: 0.001,
            turn_inertia: 0.00001,

            drive_gains: SlotGains {
                kp: 3.0,
                ..SlotGains::default()
            },
            turn_gains: SlotGains {
                kp: 100.0,
                kd: 0.2,
                kv: 1.5,
                ..SlotGains::default()
            },
            drive_closed_loop_output: ClosedLoopOutputType::Voltage,
            turn_closed_loop_output: ClosedLoopOutputType::Voltage,
            feedback_source: SteerFeedbackType::FusedCancoder,
        }
    }
}

/// Everything the drivetrain runtime needs to bring up one module
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedModuleConstants {
    pub position: ModulePosition,

    pub turn_motor_id: i32,
    pub drive_motor_id: i32,
    pub encoder_id: i32,
    /// Rotations added to the absolute encoder reading so "straight ahead" reads 0
    pub encoder_offset_rotations: f64,

    /// Module location relative to robot center, meters
    pub location_x: f64,
    pub location_y: f64,

    pub drive_motor_inverted: bool,
    pub turn_motor_inverted: bool,

    pub drive_gear_ratio: f64,
    pub turn_gear_ratio: f64,
    pub coupling_ratio: f64,
    pub wheel_radius_m: f64,
    pub slip_current_amps: f64,
    pub speed_at_12_volts_mps: f64,

    pub drive_gains: SlotGains,
    pub turn_gains: SlotGains,
    pub drive_closed_loop_output: ClosedLoopOutputType,
    pub turn_closed_loop_output: ClosedLoopOutputType,
    pub feedback_source: SteerFeedbackType,

    pub drive_inertia: f64,
    pub turn_inertia: f64,
    pub drive_friction_voltage: f64,
    pub turn_friction_voltage: f64,
}

impl ResolvedModuleConstants {
    /// Same record with the steer motor inversion set
    pub fn with_turn_motor_inverted(self, inverted: bool) -> Self {
        Self {
            turn_motor_inverted: inverted,
            ..self
        }
    }

    /// Wheel travel per drive motor rotation, meters
    pub fn meters_per_motor_rotation(&self) -> f64 {
        2.0 * std::f64::consts::PI * self.wheel_radius_m / self.drive_gear_ratio
    }
}

/// Stamps out [`ResolvedModuleConstants`] from the shared tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModuleConstantsFactory {
    tuning: ModuleTuning,
    speed_at_12_volts_mps: f64,
}

impl ModuleConstantsFactory {
    pub fn new(tuning: &ModuleTuning, speed_at_12_volts_mps: f64) -> Self {
        Self {
            tuning: *tuning,
            speed_at_12_volts_mps,
        }
    }

    /// Combine one module's ids, calibration and location with the shared tuning.
    /// No cross-checks: `x`/`y` must belong to `position`, and id collisions only
    /// show up when the runtime binds the devices.
    #[allow(clippy::too_many_arguments)]
    pub fn create_module_constants(
        &self,
        position: ModulePosition,
        turn_motor_id: i32,
        drive_motor_id: i32,
        encoder_id: i32,
        encoder_offset_rotations: f64,
        x: f64,
        y: f64,
        drive_inverted: bool,
    ) -> ResolvedModuleConstants {
        let tuning = &self.tuning;

        ResolvedModuleConstants {
            position,

            turn_motor_id,
            drive_motor_id,
            encoder_id,
            encoder_offset_rotations,

            location_x: x,
            location_y: y,

            drive_motor_inverted: drive_inverted,
            turn_motor_inverted: false,

            drive_gear_ratio: tuning.drive_gear_ratio,
            turn_gear_ratio: tuning.turn_gear_ratio,
            coupling_ratio: tuning.coupling_ratio,
            wheel_radius_m: tuning.wheel_radius_m,
            slip_current_amps: tuning.slip_current_amps,
            speed_at_12_volts_mps: self.speed_at_12_volts_mps,

            drive_gains: tuning.drive_gains,
            turn_gains: tuning.turn_gains,
            drive_closed_loop_output: tuning.drive_closed_loop_output,
            turn_closed_loop_output: tuning.turn_closed_loop_output,
            feedback_source: tuning.feedback_source,

            drive_inertia: tuning.drive_inertia,
            turn_inertia: tuning.turn_inertia,
            drive_friction_voltage: tuning.friction_voltage,
            turn_friction_voltage: tuning.friction_voltage,
        }
    }
}
