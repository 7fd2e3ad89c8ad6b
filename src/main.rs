use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use swerve_teleop_runtime::config::RobotConfig;

/// Swerve teleop runtime
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON robot config; built-in constants are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Don't hand joystick drive to the drivetrain (not running on the real robot)
    #[arg(long)]
    simulation: bool,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match RobotConfig::load(path) {
            Ok(config) => {
                info!("Loaded robot config from {}", path.display());
                config
            }
            Err(e) => {
                eprintln!("Config error: {}", e);
                std::process::exit(1);
            }
        },
        None => RobotConfig::default(),
    };
    if args.simulation {
        config.is_real = false;
    }

    if let Err(e) = swerve_teleop_runtime::runtime::run(config).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
