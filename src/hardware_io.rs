// Interfaces to the things the teleop loop drives and reads
//
// The drivetrain runtime, mechanism motors and driver station inputs are
// collaborators: the loop calls them, it doesn't implement them.

use std::sync::Arc;

use crate::swerve::ChassisSpeeds;

/// Chassis command source sampled by the drivetrain runtime on its own schedule.
/// May be called from another task at any time, so it must only read.
pub type MotionSource = Arc<dyn Fn() -> ChassisSpeeds + Send + Sync>;

/// One-shot control requests for the drivetrain runtime
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrivetrainRequest {
    /// Drive at these robot-relative speeds; zero speeds is neutral
    ApplyChassisSpeeds(ChassisSpeeds),
    /// Point the wheels into an X and hold
    SwerveDriveBrake,
}

impl DrivetrainRequest {
    /// Stop commanding motion
    pub fn neutral() -> Self {
        DrivetrainRequest::ApplyChassisSpeeds(ChassisSpeeds::zero())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum HardwareError {
    #[error("Default motion source is already registered for this session")]
    DefaultSourceAlreadySet,

    #[error("Shared {0} state lock was poisoned")]
    LockPoisoned(&'static str),
}

pub trait DrivetrainRuntime {
    /// Register the continuously-sampled chassis command. At most once per session.
    fn set_default_motion_source(&mut self, source: MotionSource) -> Result<(), HardwareError>;

    /// Override the drivetrain with a one-shot request
    fn apply_direct_request(&mut self, request: DrivetrainRequest) -> Result<(), HardwareError>;
}

pub trait ActuatorOutputs {
    /// Open-loop duty cycle for the motor at `can_id`, clamped to [-1, 1]
    fn set_open_loop_output(&mut self, can_id: i32, fraction: f64) -> Result<(), HardwareError>;
}

/// Driver station joysticks. `None` means the device or channel isn't there.
pub trait InputDevices: Send + Sync {
    /// Axis value in [-1, 1]
    fn axis(&self, device: u8, axis: usize) -> Option<f64>;
    fn button(&self, device: u8, button: usize) -> Option<bool>;
}
