// Teleoperated control loop
//
// Runs once per control cycle while the robot is enabled. Joystick drive is
// handed to the drivetrain runtime as a motion source it samples itself; the
// intake is re-evaluated from the current button state every cycle.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{DriveLimits, RobotConfig, TeleopBindings};
use crate::hardware_io::{
    ActuatorOutputs, DrivetrainRequest, DrivetrainRuntime, HardwareError, InputDevices,
    MotionSource,
};
use crate::swerve::ChassisSpeeds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeleopState {
    /// Never enabled yet
    Idle,
    /// Default drive command registered, running every cycle
    Active,
}

/// Axis reading with faults mapped to neutral: missing device or NaN reads 0,
/// anything outside [-1, 1] is clamped.
fn read_axis<I: InputDevices + ?Sized>(inputs: &I, device: u8, axis: usize) -> f64 {
    match inputs.axis(device, axis) {
        Some(value) if value.is_finite() => value.clamp(-1.0, 1.0),
        _ => 0.0,
    }
}

/// Joystick state -> chassis command. Full deflection gives exactly the limit.
pub fn chassis_command<I: InputDevices + ?Sized>(
    inputs: &I,
    bindings: &TeleopBindings,
    limits: &DriveLimits,
) -> ChassisSpeeds {
    let forward = read_axis(inputs, bindings.translation_joystick, bindings.forward_axis);
    let strafe = read_axis(inputs, bindings.translation_joystick, bindings.strafe_axis);
    let rotation = read_axis(inputs, bindings.rotation_joystick, bindings.rotation_axis);

    ChassisSpeeds::new(
        forward * limits.max_speed_mps,
        strafe * limits.max_speed_mps,
        rotation * limits.max_rotation_radps,
    )
}

/// Intake duty cycle for the current button state
pub fn intake_output(held: bool, bindings: &TeleopBindings) -> f64 {
    if held { bindings.intake_speed } else { 0.0 }
}

pub struct TeleopLoop<D, A, I: ?Sized> {
    state: TeleopState,
    drivetrain: D,
    actuators: A,
    inputs: Arc<I>,

    bindings: TeleopBindings,
    limits: DriveLimits,
    intake_motor_id: i32,
    register_drive: bool,

    // set once the stop request went out for the current disabled stretch
    stop_sent: bool,
}

impl<D, A, I> TeleopLoop<D, A, I>
where
    D: DrivetrainRuntime,
    A: ActuatorOutputs,
    I: InputDevices + ?Sized + 'static,
{
    pub fn new(config: &RobotConfig, drivetrain: D, actuators: A, inputs: Arc<I>) -> Self {
        let intake_motor_id = config.hardware.intake_motors[0];
        info!(
            "Intake on {} (CAN {})",
            config
                .hardware
                .name_of(intake_motor_id)
                .unwrap_or_else(|| "unnamed motor".to_string()),
            intake_motor_id
        );

        Self {
            state: TeleopState::Idle,
            drivetrain,
            actuators,
            inputs,

            bindings: config.teleop,
            limits: config.limits,
            intake_motor_id,
            register_drive: config.is_real,

            stop_sent: false,
        }
    }

    pub fn state(&self) -> TeleopState {
        self.state
    }

    pub fn drivetrain(&self) -> &D {
        &self.drivetrain
    }

    pub fn actuators(&self) -> &A {
        &self.actuators
    }

    /// Joystick drive as a self-contained closure: captures only the input
    /// handle and copies of the bindings/limits.
    pub fn motion_source(&self) -> MotionSource {
        let inputs = Arc::clone(&self.inputs);
        let bindings = self.bindings;
        let limits = self.limits;
        Arc::new(move || chassis_command(inputs.as_ref(), &bindings, &limits))
    }

    /// One enabled control cycle.
    ///
    /// The intake is always updated, even when registering the drive source
    /// fails; the registration is then retried on the next cycle.
    pub fn periodic(&mut self) -> Result<(), HardwareError> {
        let registration = match self.state {
            TeleopState::Idle => self.activate(),
            TeleopState::Active => Ok(()),
        };
        self.stop_sent = false;

        let held = self
            .inputs
            .button(self.bindings.operator_controller, self.bindings.intake_button)
            .unwrap_or(false);
        let output = intake_output(held, &self.bindings);
        debug!("Intake {} -> {}", if held { "held" } else { "released" }, output);

        self.actuators
            .set_open_loop_output(self.intake_motor_id, output)?;
        registration
    }

    /// Idle -> Active, handing joystick drive to the drivetrain on real hardware
    fn activate(&mut self) -> Result<(), HardwareError> {
        if !self.register_drive {
            info!("Simulation: joystick drive not registered");
            self.state = TeleopState::Active;
            return Ok(());
        }

        let source = self.motion_source();
        match self.drivetrain.set_default_motion_source(source) {
            Ok(()) => {
                info!("Registered joystick drive as default drivetrain command");
                self.state = TeleopState::Active;
                Ok(())
            }
            Err(e) => {
                warn!("Joystick drive not registered, retrying next cycle: {}", e);
                Err(e)
            }
        }
    }

    /// One disabled cycle.
    ///
    /// `stop` (neutral, or brake when input was lost) goes to the drivetrain
    /// once per disabled stretch; a failed request is retried next cycle. The
    /// intake is zeroed every disabled cycle regardless.
    pub fn disabled(&mut self, stop: DrivetrainRequest) -> Result<(), HardwareError> {
        let intake = self.actuators.set_open_loop_output(self.intake_motor_id, 0.0);

        if !self.stop_sent {
            info!("Disabled: commanding drivetrain {:?}", stop);
            self.drivetrain.apply_direct_request(stop)?;
            self.stop_sent = true;
        }
        intake
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{DriverStationFrame, JoystickState};
    use std::sync::Mutex;

    /// Driver station stand-in whose frame the test can swap between cycles
    #[derive(Default)]
    struct FakeInputs(Mutex<DriverStationFrame>);

    impl FakeInputs {
        fn set(&self, left: [f64; 2], right_x: f64, x_button: bool) {
            let mut buttons = vec![false; 10];
            buttons[3] = x_button;
            *self.0.lock().unwrap() = DriverStationFrame {
                enabled: true,
                joysticks: vec![
                    JoystickState {
                        axes: left.to_vec(),
                        buttons: vec![],
                    },
                    JoystickState {
                        axes: vec![right_x],
                        buttons: vec![],
                    },
                    JoystickState {
                        axes: vec![0.0; 6],
                        buttons,
                    },
                ],
            };
        }
    }

    impl InputDevices for FakeInputs {
        fn axis(&self, device: u8, axis: usize) -> Option<f64> {
            self.0.lock().unwrap().axis(device, axis)
        }

        fn button(&self, device: u8, button: usize) -> Option<bool> {
            self.0.lock().unwrap().button(device, button)
        }
    }

    /// Records every call; while `failing`, every call errors instead
    #[derive(Default)]
    struct RecordingDrivetrain {
        source: Option<MotionSource>,
        registrations: usize,
        requests: Vec<DrivetrainRequest>,
        failing: bool,
    }

    impl DrivetrainRuntime for RecordingDrivetrain {
        fn set_default_motion_source(&mut self, source: MotionSource) -> Result<(), HardwareError> {
            self.registrations += 1;
            if self.failing {
                return Err(HardwareError::LockPoisoned("drivetrain"));
            }
            if self.source.is_some() {
                return Err(HardwareError::DefaultSourceAlreadySet);
            }
            self.source = Some(source);
            Ok(())
        }

        fn apply_direct_request(&mut self, request: DrivetrainRequest) -> Result<(), HardwareError> {
            if self.failing {
                return Err(HardwareError::LockPoisoned("drivetrain"));
            }
            self.requests.push(request);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingActuators {
        outputs: Vec<(i32, f64)>,
    }

    impl ActuatorOutputs for RecordingActuators {
        fn set_open_loop_output(&mut self, can_id: i32, fraction: f64) -> Result<(), HardwareError> {
            self.outputs.push((can_id, fraction));
            Ok(())
        }
    }

    type TestLoop = TeleopLoop<RecordingDrivetrain, RecordingActuators, FakeInputs>;

    fn teleop(config: &RobotConfig) -> (TestLoop, Arc<FakeInputs>) {
        let inputs = Arc::new(FakeInputs::default());
        let teleop = TeleopLoop::new(
            config,
            RecordingDrivetrain::default(),
            RecordingActuators::default(),
            Arc::clone(&inputs),
        );
        (teleop, inputs)
    }

    fn sample(teleop: &TestLoop) -> ChassisSpeeds {
        let source = teleop.drivetrain().source.as_ref().unwrap();
        source()
    }

    #[test]
    fn test_zero_input_zero_command() {
        let config = RobotConfig::default();
        let inputs = FakeInputs::default();
        inputs.set([0.0, 0.0], 0.0, false);
        assert_eq!(
            chassis_command(&inputs, &config.teleop, &config.limits),
            ChassisSpeeds::zero()
        );
    }

    #[test]
    fn test_full_forward() {
        let config = RobotConfig::default();
        let inputs = FakeInputs::default();
        // left stick axis 1 full, axis 0 centered, right stick centered
        inputs.set([0.0, 1.0], 0.0, false);

        let command = chassis_command(&inputs, &config.teleop, &config.limits);
        assert_eq!(command.vx, config.limits.max_speed_mps);
        assert!((command.vx - 5.4864).abs() < 1e-12);
        assert_eq!(command.vy, 0.0);
        assert_eq!(command.omega, 0.0);
    }

    #[test]
    fn test_full_deflection_never_exceeds_limits() {
        let config = RobotConfig::default();
        let limits = config.limits;
        let inputs = FakeInputs::default();

        for &(x, y, r) in &[(1.0, -1.0, 1.0), (-1.0, 1.0, -1.0), (1.7, -3.0, 42.0)] {
            inputs.set([x, y], r, false);
            let command = chassis_command(&inputs, &config.teleop, &limits);
            assert_eq!(command.vx.abs(), limits.max_speed_mps);
            assert_eq!(command.vy.abs(), limits.max_speed_mps);
            assert_eq!(command.omega.abs(), limits.max_rotation_radps);
        }
    }

    #[test]
    fn test_bad_input_reads_neutral() {
        let config = RobotConfig::default();

        // nothing plugged in
        let inputs = FakeInputs::default();
        assert_eq!(
            chassis_command(&inputs, &config.teleop, &config.limits),
            ChassisSpeeds::zero()
        );

        inputs.set([f64::NAN, f64::INFINITY], f64::NEG_INFINITY, false);
        let command = chassis_command(&inputs, &config.teleop, &config.limits);
        assert!(command.is_finite());
        assert_eq!(command, ChassisSpeeds::zero());
    }

    #[test]
    fn test_first_cycle_registers_drive_once() {
        let config = RobotConfig::default();
        let (mut teleop, inputs) = teleop(&config);
        assert_eq!(teleop.state(), TeleopState::Idle);

        teleop.periodic().unwrap();
        assert_eq!(teleop.state(), TeleopState::Active);
        teleop.periodic().unwrap();
        teleop.periodic().unwrap();
        assert_eq!(teleop.drivetrain().registrations, 1);

        // the runtime resamples the source; it follows the sticks without re-registering
        inputs.set([0.0, 1.0], 0.0, false);
        assert!((sample(&teleop).vx - 5.4864).abs() < 1e-12);
        inputs.set([-0.5, 0.0], 1.0, false);
        let command = sample(&teleop);
        assert!((command.vy + 5.4864 / 2.0).abs() < 1e-12);
        assert!((command.omega - 2.0 * std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_simulation_skips_drive_registration() {
        let config = RobotConfig {
            is_real: false,
            ..RobotConfig::default()
        };
        let (mut teleop, _inputs) = teleop(&config);
        teleop.periodic().unwrap();
        assert_eq!(teleop.state(), TeleopState::Active);
        assert_eq!(teleop.drivetrain().registrations, 0);
    }

    #[test]
    fn test_intake_follows_button_every_cycle() {
        let config = RobotConfig::default();
        let (mut teleop, inputs) = teleop(&config);

        let pattern = [true, true, false, true, false, false];
        for &held in &pattern {
            inputs.set([0.0, 0.0], 0.0, held);
            teleop.periodic().unwrap();
        }

        let outputs: Vec<f64> = teleop.actuators().outputs.iter().map(|&(_, o)| o).collect();
        assert_eq!(outputs, vec![0.5, 0.5, 0.0, 0.5, 0.0, 0.0]);
        assert!(teleop.actuators().outputs.iter().all(|&(id, _)| id == 30));
    }

    #[test]
    fn test_missing_controller_stops_intake() {
        let config = RobotConfig::default();
        let (mut teleop, inputs) = teleop(&config);

        inputs.set([0.0, 0.0], 0.0, true);
        teleop.periodic().unwrap();
        *inputs.0.lock().unwrap() = DriverStationFrame::default();
        teleop.periodic().unwrap();

        assert_eq!(teleop.actuators().outputs, vec![(30, 0.5), (30, 0.0)]);
    }

    #[test]
    fn test_disabled_sends_neutral_once() {
        let config = RobotConfig::default();
        let (mut teleop, _inputs) = teleop(&config);

        for _ in 0..5 {
            teleop.disabled(DrivetrainRequest::neutral()).unwrap();
        }
        assert_eq!(
            teleop.drivetrain().requests,
            vec![DrivetrainRequest::neutral()]
        );

        // enabled again, then disabled again: one more
        teleop.periodic().unwrap();
        teleop.disabled(DrivetrainRequest::neutral()).unwrap();
        teleop.disabled(DrivetrainRequest::neutral()).unwrap();
        assert_eq!(teleop.drivetrain().requests.len(), 2);
    }

    #[test]
    fn test_stop_request_is_the_first_one_of_the_stretch() {
        let config = RobotConfig::default();
        let (mut teleop, _inputs) = teleop(&config);

        teleop.periodic().unwrap();
        teleop.disabled(DrivetrainRequest::SwerveDriveBrake).unwrap();
        teleop.disabled(DrivetrainRequest::neutral()).unwrap();
        assert_eq!(
            teleop.drivetrain().requests,
            vec![DrivetrainRequest::SwerveDriveBrake]
        );
    }

    #[test]
    fn test_failed_stop_still_zeroes_intake_and_retries() {
        let config = RobotConfig::default();
        let (mut teleop, inputs) = teleop(&config);

        inputs.set([0.0, 0.0], 0.0, true);
        teleop.periodic().unwrap();
        teleop.drivetrain.failing = true;

        for _ in 0..3 {
            assert_eq!(
                teleop.disabled(DrivetrainRequest::neutral()),
                Err(HardwareError::LockPoisoned("drivetrain"))
            );
        }
        assert_eq!(teleop.actuators().outputs.last(), Some(&(30, 0.0)));

        teleop.drivetrain.failing = false;
        teleop.disabled(DrivetrainRequest::neutral()).unwrap();
        teleop.disabled(DrivetrainRequest::neutral()).unwrap();
        assert_eq!(
            teleop.drivetrain().requests,
            vec![DrivetrainRequest::neutral()]
        );
    }

    #[test]
    fn test_failed_registration_keeps_intake_and_retries() {
        let config = RobotConfig::default();
        let (mut teleop, inputs) = teleop(&config);
        teleop.drivetrain.failing = true;

        inputs.set([0.0, 0.0], 0.0, true);
        assert_eq!(
            teleop.periodic(),
            Err(HardwareError::LockPoisoned("drivetrain"))
        );
        assert_eq!(teleop.state(), TeleopState::Idle);
        assert_eq!(teleop.actuators().outputs, vec![(30, 0.5)]);

        teleop.drivetrain.failing = false;
        teleop.periodic().unwrap();
        assert_eq!(teleop.state(), TeleopState::Active);
        assert_eq!(teleop.drivetrain().registrations, 2);
        assert!(teleop.drivetrain().source.is_some());
    }

    #[test]
    fn test_motion_source_is_thread_safe() {
        let config = RobotConfig::default();
        let (teleop, inputs) = teleop(&config);
        inputs.set([0.0, 1.0], 0.0, false);

        let source = teleop.motion_source();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let source = Arc::clone(&source);
                std::thread::spawn(move || (0..100).map(|_| source()).last().unwrap())
            })
            .collect();

        for handle in handles {
            assert!((handle.join().unwrap().vx - 5.4864).abs() < 1e-12);
        }
    }
}
