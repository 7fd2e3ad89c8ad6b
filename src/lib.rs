pub mod config;
pub mod hardware;
pub mod hardware_io;
pub mod messages;
pub mod runtime;
pub mod swerve;
pub mod teleop;
