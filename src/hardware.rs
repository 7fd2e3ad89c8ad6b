// Device map: logical device name -> CAN bus address
//
// Pure data. Nothing here talks to the bus; the drivetrain runtime binds these
// ids when it starts, and that is where collisions get reported.

use serde::{Deserialize, Serialize};

use crate::swerve::geometry::{ModuleMap, ModulePosition};

/// CAN bus the roboRIO's own devices hang off
pub const RIO_CANBUS: &str = "rio";
/// CAN bus dedicated to the swerve base
pub const DRIVEBASE_CANBUS: &str = "drivebase";

/// Bus addresses of the three devices that make up one swerve module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDeviceIds {
    pub drive_motor: i32,
    pub turn_motor: i32,
    pub encoder: i32,
}

/// Every CAN device on the robot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareMap {
    pub rio_canbus: String,
    pub drivebase_canbus: String,

    pub candle: i32,
    pub pigeon: i32,
    pub arm_encoder: i32,

    /// CANcoder + drive + turn motor per module
    pub modules: ModuleMap<ModuleDeviceIds>,

    pub intake_motors: [i32; 2], // [front, back], driven together
    pub flywheels: [i32; 2],     // [bottom, top], driven independently
    pub amp_shooter: i32,
    pub arm_motor: i32,
    pub climb_motors: [i32; 2],
}

impl Default for HardwareMap {
    fn default() -> Self {
        Self {
            rio_canbus: RIO_CANBUS.to_string(),
            drivebase_canbus: DRIVEBASE_CANBUS.to_string(),

            candle: 8,
            pigeon: 9,
            arm_encoder: 14,

            modules: ModuleMap {
                front_left: ModuleDeviceIds {
                    drive_motor: 20,
                    turn_motor: 21,
                    encoder: 10,
                },
                front_right: ModuleDeviceIds {
                    drive_motor: 22,
                    turn_motor: 23,
                    encoder: 11,
                },
                back_left: ModuleDeviceIds {
                    drive_motor: 24,
                    turn_motor: 25,
                    encoder: 12,
                },
                back_right: ModuleDeviceIds {
                    drive_motor: 26,
                    turn_motor: 27,
                    encoder: 13,
                },
            },

            intake_motors: [30, 31],
            flywheels: [41, 42],
            amp_shooter: 51,
            arm_motor: 52,
            climb_motors: [60, 61],
        }
    }
}

impl HardwareMap {
    /// Device ids for one module
    pub fn module(&self, position: ModulePosition) -> ModuleDeviceIds {
        *self.modules.get(position)
    }

    /// Flat (name, id) listing of every declared device, modules in canonical order
    pub fn devices(&self) -> Vec<(String, i32)> {
        let mut devices = vec![
            ("candle".to_string(), self.candle),
            ("pigeon".to_string(), self.pigeon),
            ("arm_encoder".to_string(), self.arm_encoder),
        ];

        for (position, ids) in self.modules.iter() {
            let name = position.short_name();
            devices.push((format!("{name}_encoder"), ids.encoder));
            devices.push((format!("{name}_drive"), ids.drive_motor));
            devices.push((format!("{name}_turn"), ids.turn_motor));
        }

        devices.push(("intake_front".to_string(), self.intake_motors[0]));
        devices.push(("intake_back".to_string(), self.intake_motors[1]));
        devices.push(("flywheel_bottom".to_string(), self.flywheels[0]));
        devices.push(("flywheel_top".to_string(), self.flywheels[1]));
        devices.push(("amp_shooter".to_string(), self.amp_shooter));
        devices.push(("arm_motor".to_string(), self.arm_motor));
        devices.push(("climb_left".to_string(), self.climb_motors[0]));
        devices.push(("climb_right".to_string(), self.climb_motors[1]));
        devices
    }

    /// Name of the device at `id`, for log lines
    pub fn name_of(&self, id: i32) -> Option<String> {
        self.devices()
            .into_iter()
            .find(|(_, device_id)| *device_id == id)
            .map(|(name, _)| name)
    }
}
