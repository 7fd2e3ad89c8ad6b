// Startup assembly: config -> geometry -> kinematics + per-module constants

use tracing::{debug, info};

use super::geometry::{ModuleMap, resolve};
use super::kinematics::SwerveKinematics;
use super::module_constants::{ModuleConstantsFactory, ResolvedModuleConstants};
use crate::config::{ConfigError, RobotConfig};

/// Drivetrain-level device settings
#[derive(Debug, Clone, PartialEq)]
pub struct DrivetrainConstants {
    pub pigeon_id: i32,
    pub canbus: String,
}

/// Everything the drivetrain runtime is started with. Built once, read-only after.
#[derive(Debug, Clone, PartialEq)]
pub struct SwerveDrivetrainConfig {
    pub drivetrain: DrivetrainConstants,
    pub kinematics: SwerveKinematics,
    pub drive_base_radius_m: f64,
    pub max_speed_mps: f64,
    pub modules: ModuleMap<ResolvedModuleConstants>,
}

impl SwerveDrivetrainConfig {
    pub fn build(config: &RobotConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let translations = resolve(&config.geometry);
        let kinematics = SwerveKinematics::new(&translations)?;

        let factory =
            ModuleConstantsFactory::new(&config.module_tuning, config.limits.max_speed_mps);

        let modules = ModuleMap::from_fn(|position| {
            let ids = config.hardware.module(position);
            let calibration = config.calibration.get(position);
            let location = translations.get(position);

            factory
                .create_module_constants(
                    position,
                    ids.turn_motor,
                    ids.drive_motor,
                    ids.encoder,
                    calibration.encoder_offset_rotations,
                    location.x,
                    location.y,
                    calibration.drive_inverted,
                )
                .with_turn_motor_inverted(calibration.turn_inverted)
        });

        let drive_base_radius_m = config.geometry.drive_base_radius();

        info!(
            "Swerve drivetrain: track width {:.4} m, wheel base {:.4} m, radius {:.4} m, max {:.3} m/s",
            config.geometry.track_width_m,
            config.geometry.wheel_base_m,
            drive_base_radius_m,
            config.limits.max_speed_mps
        );
        for (position, module) in modules.iter() {
            debug!(
                "{:?}: drive {} turn {} encoder {} offset {} at ({:.4}, {:.4}) inverted drive={} turn={}",
                position,
                module.drive_motor_id,
                module.turn_motor_id,
                module.encoder_id,
                module.encoder_offset_rotations,
                module.location_x,
                module.location_y,
                module.drive_motor_inverted,
                module.turn_motor_inverted
            );
        }
        for (name, id) in config.hardware.devices() {
            debug!("CAN {:>2}: {}", id, name);
        }

        Ok(Self {
            drivetrain: DrivetrainConstants {
                pigeon_id: config.hardware.pigeon,
                canbus: config.hardware.drivebase_canbus.clone(),
            },
            kinematics,
            drive_base_radius_m,
            max_speed_mps: config.limits.max_speed_mps,
            modules,
        })
    }
}
