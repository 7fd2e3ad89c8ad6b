// Swerve drivetrain configuration
//
// Provides:
// - Module geometry (positions relative to robot center)
// - Swerve kinematics (chassis speeds <-> module states)
// - Per-module constants for the drivetrain runtime
// - One-shot startup assembly of all of the above

pub mod drivetrain;
pub mod geometry;
pub mod kinematics;
pub mod module_constants;

pub use drivetrain::{DrivetrainConstants, SwerveDrivetrainConfig};
pub use geometry::{GeometryConfig, ModuleMap, ModulePosition, resolve};
pub use kinematics::{ChassisSpeeds, SwerveKinematics, SwerveModuleState, desaturate_wheel_speeds};
pub use module_constants::{ModuleConstantsFactory, ModuleTuning, ResolvedModuleConstants};
