// 50 Hz teleop loop + 250 Hz drivetrain loop over zenoh, with an input watchdog
// Note: the watchdog treats a silent driver station as disabled, so if the
// driver station crashes the robot brakes instead of holding its last command

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uom::si::angle::radian;
use uom::si::f64::Angle;

use crate::config::{
    DRIVETRAIN_HZ, INPUT_TIMEOUT, LOOP_HZ, RobotConfig, TOPIC_DS_FRAME, TOPIC_HEALTH,
    TOPIC_RT_ACTUATORS, TOPIC_RT_DRIVETRAIN,
};
use crate::hardware_io::{
    ActuatorOutputs, DrivetrainRequest, DrivetrainRuntime, HardwareError, InputDevices,
    MotionSource,
};
use crate::messages::{
    ActuatorCommand, DriveMode, DriverStationFrame, DrivetrainActuation, ModuleTarget,
    RuntimeHealth,
};
use crate::swerve::kinematics::format_states;
use crate::swerve::{
    ChassisSpeeds, ModuleMap, SwerveDrivetrainConfig, SwerveModuleState, desaturate_wheel_speeds,
};
use crate::teleop::TeleopLoop;

/// Latest driver station frame, readable from any task.
/// Frames older than the timeout read as a disconnected device.
pub struct DriverStationInputs {
    latest: RwLock<Option<(DriverStationFrame, Instant)>>,
    timeout: Duration,
}

impl DriverStationInputs {
    pub fn new(timeout: Duration) -> Self {
        Self {
            latest: RwLock::new(None),
            timeout,
        }
    }

    /// Store a freshly received frame
    pub fn update(&self, frame: DriverStationFrame) {
        match self.latest.write() {
            Ok(mut latest) => *latest = Some((frame, Instant::now())),
            Err(_) => warn!("Driver station state lock poisoned, dropping frame"),
        }
    }

    /// Run `f` on the current frame if there is one and it's not stale.
    /// A poisoned lock counts as no frame.
    fn with_fresh<R>(&self, f: impl FnOnce(&DriverStationFrame) -> Option<R>) -> Option<R> {
        let latest = self.latest.read().ok()?;
        let (frame, received_at) = latest.as_ref()?;
        if received_at.elapsed() > self.timeout {
            return None;
        }
        f(frame)
    }

    pub fn is_stale(&self) -> bool {
        self.with_fresh(|_| Some(())).is_none()
    }

    /// Enabled only while frames keep arriving
    pub fn enabled(&self) -> bool {
        self.with_fresh(|frame| Some(frame.enabled)).unwrap_or(false)
    }
}

impl InputDevices for DriverStationInputs {
    fn axis(&self, device: u8, axis: usize) -> Option<f64> {
        self.with_fresh(|frame| frame.axis(device, axis))
    }

    fn button(&self, device: u8, button: usize) -> Option<bool> {
        self.with_fresh(|frame| frame.button(device, button))
    }
}

#[derive(Default)]
struct DriveState {
    default_source: Option<MotionSource>,
    direct: Option<DrivetrainRequest>,
    // angles commanded on the previous tick, steering is optimized against them
    last_angles: Option<ModuleMap<Angle>>,
}

/// Drivetrain runtime shared between the teleop loop (which registers and
/// requests) and the drivetrain task (which samples and actuates).
#[derive(Clone, Default)]
pub struct DrivetrainHandle {
    state: Arc<Mutex<DriveState>>,
}

impl DrivetrainRuntime for DrivetrainHandle {
    fn set_default_motion_source(&mut self, source: MotionSource) -> Result<(), HardwareError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| HardwareError::LockPoisoned("drivetrain"))?;
        if state.default_source.is_some() {
            return Err(HardwareError::DefaultSourceAlreadySet);
        }
        state.default_source = Some(source);
        Ok(())
    }

    fn apply_direct_request(&mut self, request: DrivetrainRequest) -> Result<(), HardwareError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| HardwareError::LockPoisoned("drivetrain"))?;
        debug!("Direct drivetrain request: {:?}", request);
        state.direct = Some(request);
        Ok(())
    }
}

impl DrivetrainHandle {
    /// Decide this tick's module targets.
    ///
    /// While enabled the default source wins; otherwise the last direct request
    /// is held (neutral if there never was one). A non-finite sample is replaced
    /// by neutral. Module angles never swing more than 90 degrees from the
    /// previous tick; the wheel reverses instead.
    pub fn actuation(&self, swerve: &SwerveDrivetrainConfig, enabled: bool) -> DrivetrainActuation {
        let (source, direct, last_angles) = match self.state.lock() {
            Ok(state) => (state.default_source.clone(), state.direct, state.last_angles),
            Err(_) => (None, None, None),
        };

        let (mode, chassis, states) = match (enabled, source, direct) {
            (true, Some(source), _) => {
                let mut chassis = source();
                if !chassis.is_finite() {
                    warn!("Motion source produced {:?}, using neutral", chassis);
                    chassis = ChassisSpeeds::zero();
                }
                (
                    DriveMode::Default,
                    chassis,
                    swerve.kinematics.to_module_states(chassis),
                )
            }
            (_, _, Some(DrivetrainRequest::SwerveDriveBrake)) => (
                DriveMode::Brake,
                ChassisSpeeds::zero(),
                swerve.kinematics.brake_states(),
            ),
            (_, _, Some(DrivetrainRequest::ApplyChassisSpeeds(chassis))) => (
                DriveMode::Direct,
                chassis,
                swerve.kinematics.to_module_states(chassis),
            ),
            (_, _, None) => (
                DriveMode::Direct,
                ChassisSpeeds::zero(),
                swerve.kinematics.to_module_states(ChassisSpeeds::zero()),
            ),
        };

        let mut states = desaturate_wheel_speeds(states, swerve.max_speed_mps);
        if let Some(last_angles) = last_angles {
            states = states.map(|position, state| state.optimize(*last_angles.get(position)));
        }
        if let Ok(mut state) = self.state.lock() {
            state.last_angles = Some(states.map(|_, state| state.angle));
        }

        DrivetrainActuation {
            mode,
            chassis,
            modules: module_targets(swerve, &states),
        }
    }
}

/// Module states -> motor-level targets using each module's constants
fn module_targets(
    swerve: &SwerveDrivetrainConfig,
    states: &ModuleMap<SwerveModuleState>,
) -> Vec<ModuleTarget> {
    states
        .iter()
        .map(|(position, state)| {
            let module = swerve.modules.get(position);
            let direction = if module.drive_motor_inverted { -1.0 } else { 1.0 };

            ModuleTarget {
                position,
                drive_motor_id: module.drive_motor_id,
                turn_motor_id: module.turn_motor_id,
                drive_rps: direction * state.speed_mps / module.meters_per_motor_rotation(),
                steer_rotations: state.angle.get::<radian>() / (2.0 * PI),
            }
        })
        .collect()
}

/// Latest open-loop output per mechanism motor
#[derive(Debug, Default)]
pub struct ActuatorBank {
    outputs: BTreeMap<i32, f64>,
}

impl ActuatorOutputs for ActuatorBank {
    fn set_open_loop_output(&mut self, can_id: i32, fraction: f64) -> Result<(), HardwareError> {
        let output = if fraction.is_finite() {
            fraction.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        self.outputs.insert(can_id, output);
        Ok(())
    }
}

impl ActuatorBank {
    pub fn commands(&self) -> Vec<ActuatorCommand> {
        self.outputs
            .iter()
            .map(|(&can_id, &output)| ActuatorCommand { can_id, output })
            .collect()
    }
}

/// Health for the current input state
pub fn input_health(inputs: &DriverStationInputs) -> RuntimeHealth {
    if inputs.is_stale() {
        RuntimeHealth::InputStale
    } else if inputs.enabled() {
        RuntimeHealth::Ok
    } else {
        RuntimeHealth::Disabled
    }
}

/// One teleop tick: read health, then run the enabled or disabled cycle.
///
/// Losing input while enabled ends the stretch with a brake; any other
/// disable (including startup with no driver station yet) ends it with neutral. Either way the drivetrain gets exactly one
/// stop request until the robot is enabled again.
pub fn teleop_tick<D, A>(
    teleop: &mut TeleopLoop<D, A, DriverStationInputs>,
    inputs: &DriverStationInputs,
    previous: RuntimeHealth,
) -> RuntimeHealth
where
    D: DrivetrainRuntime,
    A: ActuatorOutputs,
{
    let health = input_health(inputs);

    let cycle = match health {
        RuntimeHealth::Ok => teleop.periodic(),
        RuntimeHealth::Disabled => teleop.disabled(DrivetrainRequest::neutral()),
        RuntimeHealth::InputStale if previous == RuntimeHealth::Ok => {
            warn!("Driver station input lost while enabled, braking");
            teleop.disabled(DrivetrainRequest::SwerveDriveBrake)
        }
        RuntimeHealth::InputStale => {
            if previous != RuntimeHealth::InputStale {
                warn!("Driver station input stale");
            }
            teleop.disabled(DrivetrainRequest::neutral())
        }
    };
    if let Err(e) = cycle {
        warn!("Teleop cycle failed: {}", e);
    }

    health
}

/// Drivetrain task: resample the default source at its own rate and publish
async fn drive_loop(
    drivetrain: DrivetrainHandle,
    swerve: Arc<SwerveDrivetrainConfig>,
    inputs: Arc<DriverStationInputs>,
    publisher: zenoh::pubsub::Publisher<'static>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut tick = interval(Duration::from_millis(1000 / DRIVETRAIN_HZ));
    let mut last_mode = None;

    loop {
        tick.tick().await;

        let actuation = drivetrain.actuation(&swerve, inputs.enabled());
        if last_mode != Some(actuation.mode) {
            info!("Drivetrain mode: {:?}", actuation.mode);
            last_mode = Some(actuation.mode);
        }

        let actuation_json = serde_json::to_string(&actuation)?;
        publisher.put(actuation_json).await?;
    }
}

pub async fn run(config: RobotConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let swerve = Arc::new(SwerveDrivetrainConfig::build(&config)?);
    debug!(
        "Neutral module states: {}",
        format_states(&swerve.kinematics.to_module_states(ChassisSpeeds::zero()))
    );

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_DS_FRAME).await?;
    let pub_drivetrain = session.declare_publisher(TOPIC_RT_DRIVETRAIN).await?;
    let pub_actuators = session.declare_publisher(TOPIC_RT_ACTUATORS).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let inputs = Arc::new(DriverStationInputs::new(INPUT_TIMEOUT));
    let drivetrain = DrivetrainHandle::default();

    let drive_task = tokio::spawn(drive_loop(
        drivetrain.clone(),
        Arc::clone(&swerve),
        Arc::clone(&inputs),
        pub_drivetrain,
    ));

    let mut teleop = TeleopLoop::new(
        &config,
        drivetrain,
        ActuatorBank::default(),
        Arc::clone(&inputs),
    );
    let mut health = RuntimeHealth::InputStale; // Start stale until first frame
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Runtime started: {}Hz teleop, {}Hz drivetrain, {}ms input watchdog",
        LOOP_HZ,
        DRIVETRAIN_HZ,
        INPUT_TIMEOUT.as_millis()
    );
    info!("Subscribed to: {}", TOPIC_DS_FRAME);
    info!(
        "Publishing to: {}, {}, {}",
        TOPIC_RT_DRIVETRAIN, TOPIC_RT_ACTUATORS, TOPIC_HEALTH
    );

    loop {
        tick.tick().await;

        if drive_task.is_finished() {
            return match drive_task.await {
                Ok(result) => result,
                Err(e) => Err(e.into()),
            };
        }

        // 1. Drain all pending frames (non-blocking), keep latest
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<DriverStationFrame>(&payload) {
                Ok(frame) => inputs.update(frame),
                Err(e) => warn!("Failed to parse driver station frame: {}", e),
            }
        }

        // 2. Run the teleop cycle for the current robot state
        health = teleop_tick(&mut teleop, &inputs, health);

        // 3. Publish mechanism outputs
        let actuators_json = serde_json::to_string(&teleop.actuators().commands())?;
        pub_actuators.put(actuators_json).await?;

        // 4. Publish health
        let health_json = serde_json::to_string(&health)?;
        pub_health.put(health_json).await?;
    }
}
