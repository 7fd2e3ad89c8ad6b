// Keyboard driver station: WASD translate, Z/X rotate, R/F speed, Space intake,
// E enable/disable, Q quit
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

use swerve_teleop_runtime::config::{RobotConfig, TOPIC_DS_FRAME, TeleopBindings};
use swerve_teleop_runtime::messages::{DriverStationFrame, JoystickState};

const DEFLECTIONS: [f64; 3] = [0.25, 0.5, 1.0]; // fraction of full stick
const INPUT_TIMEOUT_MS: u64 = 100; // Center sticks after this much time with no input

// Joystick sizes as the real driver station reports them
const FLIGHT_STICK_AXES: usize = 4;
const FLIGHT_STICK_BUTTONS: usize = 12;
const XBOX_AXES: usize = 6;
const XBOX_BUTTONS: usize = 11;

/// Keyboard stand-in for the driver station
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Frame publish rate
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u64).range(1..=1000))]
    rate_hz: u64,

    /// Robot config whose joystick bindings the frames are laid out for
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Keyboard-driven stick state
#[derive(Debug, Default)]
struct Sticks {
    forward: f64,
    strafe: f64,
    rotation: f64,
    intake: bool,
}

fn joystick(axes: usize, buttons: usize) -> JoystickState {
    JoystickState {
        axes: vec![0.0; axes],
        buttons: vec![false; buttons],
    }
}

fn set_axis(joystick: &mut JoystickState, axis: usize, value: f64) {
    if joystick.axes.len() <= axis {
        joystick.axes.resize(axis + 1, 0.0);
    }
    joystick.axes[axis] = value;
}

fn set_button(joystick: &mut JoystickState, button: usize, held: bool) {
    if joystick.buttons.len() <= button {
        joystick.buttons.resize(button + 1, false);
    }
    joystick.buttons[button] = held;
}

impl Sticks {
    /// Lay the state out the way the runtime's bindings read it
    fn frame(&self, bindings: &TeleopBindings, enabled: bool) -> DriverStationFrame {
        // Two flight sticks then the Xbox controller, plus any extra ports the bindings name
        let mut joysticks = vec![
            joystick(FLIGHT_STICK_AXES, FLIGHT_STICK_BUTTONS),
            joystick(FLIGHT_STICK_AXES, FLIGHT_STICK_BUTTONS),
            joystick(XBOX_AXES, XBOX_BUTTONS),
        ];
        let ports = [
            bindings.translation_joystick,
            bindings.rotation_joystick,
            bindings.operator_controller,
        ]
        .into_iter()
        .max()
        .map_or(0, |port| port as usize + 1);
        while joysticks.len() < ports {
            joysticks.push(joystick(XBOX_AXES, XBOX_BUTTONS));
        }

        let translation = &mut joysticks[bindings.translation_joystick as usize];
        set_axis(translation, bindings.forward_axis, self.forward);
        set_axis(translation, bindings.strafe_axis, self.strafe);
        set_axis(
            &mut joysticks[bindings.rotation_joystick as usize],
            bindings.rotation_axis,
            self.rotation,
        );
        set_button(
            &mut joysticks[bindings.operator_controller as usize],
            bindings.intake_button,
            self.intake,
        );

        DriverStationFrame { enabled, joysticks }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let bindings = match &args.config {
        Some(path) => RobotConfig::load(path)?.teleop,
        None => RobotConfig::default().teleop,
    };

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_DS_FRAME).await?;

    info!("Controls: WASD=move, Z/X=rotate, R/F=speed, Space=intake, E=enable, Q=quit");
    info!("Speed: LOW, robot DISABLED");

    enable_raw_mode()?;
    let result = run_driver_station(&publisher, &bindings, args.rate_hz).await;
    disable_raw_mode()?;

    result
}

async fn run_driver_station(
    publisher: &zenoh::pubsub::Publisher<'_>,
    bindings: &TeleopBindings,
    rate_hz: u64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;
    let mut enabled = false;

    let mut sticks = Sticks::default();
    let mut last_input = Instant::now();
    let poll = Duration::from_millis(1000 / rate_hz);

    loop {
        if event::poll(poll)? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                let deflection = DEFLECTIONS[speed_idx];

                match code {
                    // Translation
                    KeyCode::Char('w') if pressed => {
                        sticks.forward = deflection;
                        last_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        sticks.forward = -deflection;
                        last_input = Instant::now();
                    }
                    KeyCode::Char('a') if pressed => {
                        sticks.strafe = deflection;
                        last_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        sticks.strafe = -deflection;
                        last_input = Instant::now();
                    }

                    // Rotation
                    KeyCode::Char('z') if pressed => {
                        sticks.rotation = deflection;
                        last_input = Instant::now();
                    }
                    KeyCode::Char('x') if pressed => {
                        sticks.rotation = -deflection;
                        last_input = Instant::now();
                    }

                    // Intake, held while the key repeats
                    KeyCode::Char(' ') if pressed => {
                        sticks.intake = true;
                        last_input = Instant::now();
                    }

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(2);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    KeyCode::Char('e') if kind == KeyEventKind::Press => {
                        enabled = !enabled;
                        info!("Robot {}", if enabled { "ENABLED" } else { "DISABLED" });
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        // Release everything if no input for INPUT_TIMEOUT_MS
        if last_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            sticks = Sticks::default();
        }

        // Always publish so the runtime watchdog stays fed
        let frame_json = serde_json::to_string(&sticks.frame(bindings, enabled))?;
        publisher.put(frame_json).await?;
    }

    // Leave the robot disabled on the way out
    let frame_json = serde_json::to_string(&Sticks::default().frame(bindings, false))?;
    publisher.put(frame_json).await?;
    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held_sticks() -> Sticks {
        Sticks {
            forward: 0.5,
            strafe: -0.25,
            rotation: 1.0,
            intake: true,
        }
    }

    #[test]
    fn test_default_layout() {
        let bindings = TeleopBindings::default();
        let frame = held_sticks().frame(&bindings, true);

        assert!(frame.enabled);
        assert_eq!(frame.joysticks.len(), 3);
        assert_eq!(frame.axis(0, 1), Some(0.5));
        assert_eq!(frame.axis(0, 0), Some(-0.25));
        assert_eq!(frame.axis(1, 0), Some(1.0));
        assert_eq!(frame.button(2, 3), Some(true));
    }

    #[test]
    fn test_layout_follows_configured_bindings() {
        let bindings = TeleopBindings {
            translation_joystick: 1,
            forward_axis: 5,
            strafe_axis: 4,
            rotation_joystick: 0,
            rotation_axis: 2,
            operator_controller: 4,
            intake_button: 14,
            ..TeleopBindings::default()
        };
        let frame = held_sticks().frame(&bindings, false);

        assert_eq!(frame.joysticks.len(), 5);
        assert_eq!(frame.axis(1, 5), Some(0.5));
        assert_eq!(frame.axis(1, 4), Some(-0.25));
        assert_eq!(frame.axis(0, 2), Some(1.0));
        assert_eq!(frame.button(4, 14), Some(true));
        assert_eq!(frame.button(2, 3), Some(false));
    }

    #[test]
    fn test_rate_is_bounded() {
        assert!(Args::try_parse_from(["driver_station", "--rate-hz", "0"]).is_err());
        assert!(Args::try_parse_from(["driver_station", "--rate-hz", "5000"]).is_err());
        let args = Args::try_parse_from(["driver_station", "--rate-hz", "1000"]).unwrap();
        assert_eq!(args.rate_hz, 1000);
    }
}
