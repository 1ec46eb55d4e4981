//! FLIGHTFAULT: a fault-injection test harness for simulated multirotor missions.
//!
//! The harness flies a simulated vehicle through commanded moves while injecting timing and
//! positional faults, and writes a CSV flight log of commanded versus achieved motion for
//! downstream anomaly-detection tooling to consume.
//!
//! Two mission modes are available:
//!
//! - Waypoint mode: fly a fixed waypoint list exactly once, with a fault forced on a chosen
//!   waypoint index and time-window faults elsewhere. Logs include jitter columns.
//! - Sweep mode: fly randomly generated targets inside a bounding box until the mission
//!   duration elapses, with delay-only faults inside a time window. Compact log layout.
//!
//! Missions can be configured entirely from the command line or loaded from a
//! TOML/JSON/YAML configuration file.

mod common;

use clap::{Args, Parser, Subcommand};
use common::{init_logger, validate_output_path};
use flightfault::Waypoint;
use flightfault::fault::WindowPolicy;
use flightfault::mission::{self, MissionConfig, MissionMode, TargetBox};
use flightfault::vehicle::SimulatedMultirotor;
use log::info;
use std::error::Error;
use std::path::{Path, PathBuf};

const LONG_ABOUT: &str =
    "FLIGHTFAULT: a fault-injection test harness for simulated multirotor missions.

The harness flies a simulated vehicle through commanded moves while injecting timing and
positional faults, and writes a CSV flight log of commanded versus achieved motion for
downstream anomaly-detection tooling to consume.

- Waypoint mode: fly a fixed waypoint list exactly once, with a fault forced on a chosen
  waypoint index and time-window faults elsewhere. Logs include jitter columns.

- Sweep mode: fly randomly generated targets inside a bounding box until the mission
  duration elapses, with delay-only faults inside a time window. Compact log layout.

Missions can be configured either by:
  1. Loading all parameters from a configuration file (TOML/JSON/YAML)
  2. Specifying parameters via command-line flags

Use `flightfault config` to generate a template configuration file.";

/// Command line arguments
#[derive(Parser)]
#[command(version, about = "A fault-injection test harness for simulated multirotor missions.", long_about = LONG_ABOUT)]
struct Cli {
    /// Run a mission from a configuration file (TOML/JSON/YAML)
    /// This option overrides any subcommand arguments
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Command to execute (ignored if --config is provided)
    #[command(subcommand)]
    command: Option<Command>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log file path (if not specified, logs to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Multiplier applied to every artificial sleep; use values below 1 to compress a mission
    #[arg(long, global = true)]
    time_scale: Option<f64>,
}

/// Top-level commands
#[derive(Subcommand, Clone)]
enum Command {
    #[command(
        name = "waypoint",
        about = "Fly a fixed waypoint list with fault injection",
        long_about = "Fly a predefined waypoint list exactly once. The fault schedule forces a fault on one waypoint index (the second, by default) and otherwise injects faults when elapsed mission time falls inside the configured windows. Faulted moves are delayed and horizontally jittered."
    )]
    Waypoint(WaypointArgs),

    #[command(
        name = "sweep",
        about = "Fly randomly generated targets for a fixed duration",
        long_about = "Fly to an initial safe position, then generate random targets inside a bounding box until the mission duration elapses. Faults inject delays only; targets are never perturbed in this mode."
    )]
    Sweep(SweepArgs),

    #[command(name = "config", about = "Generate a template mission configuration file")]
    CreateConfig(CreateConfigArgs),
}

/// Waypoint-mode arguments
#[derive(Args, Clone, Debug)]
struct WaypointArgs {
    /// CSV file with an x,y,z header listing the waypoints to fly
    /// (defaults to the built-in six-waypoint survey line)
    #[arg(short, long, value_parser)]
    waypoints: Option<PathBuf>,

    /// Directory mission logs are written to
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Nominal move speed (m/s)
    #[arg(long, default_value_t = 4.0)]
    speed: f64,

    /// RNG seed for delays and jitter
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Waypoint index that is faulted regardless of elapsed time
    #[arg(long)]
    forced_index: Option<usize>,
}

/// Sweep-mode arguments
#[derive(Args, Clone, Debug)]
struct SweepArgs {
    /// Directory mission logs are written to
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Total mission duration (seconds)
    #[arg(long, default_value_t = 20.0)]
    duration_s: f64,

    /// Nominal move speed (m/s)
    #[arg(long, default_value_t = 4.0)]
    speed: f64,

    /// RNG seed for delays and generated targets
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Lower x bound of the target box (meters)
    #[arg(long, default_value_t = -12.0, allow_hyphen_values = true)]
    x_min: f64,

    /// Upper x bound of the target box (meters)
    #[arg(long, default_value_t = -8.0, allow_hyphen_values = true)]
    x_max: f64,

    /// Lower y bound of the target box (meters)
    #[arg(long, default_value_t = 8.0, allow_hyphen_values = true)]
    y_min: f64,

    /// Upper y bound of the target box (meters)
    #[arg(long, default_value_t = 12.0, allow_hyphen_values = true)]
    y_max: f64,

    /// Fixed down coordinate of every generated target (meters)
    #[arg(long, default_value_t = -10.0, allow_hyphen_values = true)]
    target_z: f64,
}

/// Arguments for the config command
#[derive(Args, Clone, Debug)]
struct CreateConfigArgs {
    /// Output file path for the config file
    /// File extension determines format: .json, .yaml/.yml, or .toml (recommended)
    #[arg(short, long, value_parser)]
    output: PathBuf,

    /// Mission mode for the template
    #[arg(short, long, value_enum, default_value_t = MissionMode::Waypoint)]
    mode: MissionMode,
}

/// Build a waypoint-mode mission configuration from CLI arguments.
fn waypoint_config(args: &WaypointArgs) -> Result<MissionConfig, Box<dyn Error>> {
    let mut config = MissionConfig::waypoint_template();
    if let Some(path) = &args.waypoints {
        config.waypoints = Waypoint::from_csv(path)?;
        info!(
            "loaded {} waypoints from {}",
            config.waypoints.len(),
            path.display()
        );
    }
    config.output = args.output.display().to_string();
    config.speed = args.speed;
    config.fault.seed = args.seed;
    if let Some(index) = args.forced_index {
        config.fault.windows = match config.fault.windows {
            WindowPolicy::IndexForced { windows, .. } | WindowPolicy::TimeWindows { windows } => {
                WindowPolicy::IndexForced { index, windows }
            }
        };
    }
    Ok(config)
}

/// Build a sweep-mode mission configuration from CLI arguments.
fn sweep_config(args: &SweepArgs) -> MissionConfig {
    let mut config = MissionConfig::sweep_template();
    config.output = args.output.display().to_string();
    config.duration_s = args.duration_s;
    config.speed = args.speed;
    config.fault.seed = args.seed;
    config.target_box = TargetBox {
        x_min: args.x_min,
        x_max: args.x_max,
        y_min: args.y_min,
        y_max: args.y_max,
        z: args.target_z,
    };
    config
}

/// Run one mission against the simulated backend.
fn run_mission(config: &MissionConfig) -> Result<(), Box<dyn Error>> {
    validate_output_path(Path::new(&config.output))?;

    let mut vehicle = SimulatedMultirotor::new(config.time_scale);
    let report = mission::execute(&mut vehicle, config)?;

    info!(
        "{} steps logged to {}",
        report.outcomes.len(),
        report.log_path.display()
    );
    Ok(())
}

/// Write a template configuration file for the requested mode.
fn create_config_file(args: &CreateConfigArgs) -> Result<(), Box<dyn Error>> {
    let config = match args.mode {
        MissionMode::Waypoint => MissionConfig::waypoint_template(),
        MissionMode::Sweep => MissionConfig::sweep_template(),
    };

    if let Some(parent) = args.output.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }
    config.to_file(&args.output)?;

    println!("Configuration template written to {}", args.output.display());
    println!("\nYou can now run the mission with:");
    println!("  flightfault --config {}", args.output.display());

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    // If --config is provided, load the mission from file; its logging section applies
    // unless overridden on the command line
    if let Some(ref config_path) = cli.config {
        let mut config = MissionConfig::from_file(config_path)?;

        let config_log_file = config.logging.file.as_ref().map(PathBuf::from);
        let log_file = cli.log_file.as_ref().or(config_log_file.as_ref());
        init_logger(config.logging.level.as_str(), log_file)?;

        if let Some(scale) = cli.time_scale {
            config.time_scale = scale;
        }
        info!("loaded mission configuration from {}", config_path.display());
        return run_mission(&config);
    }

    init_logger(&cli.log_level, cli.log_file.as_ref())?;

    match cli.command {
        Some(Command::Waypoint(args)) => {
            info!("running waypoint mission");
            let mut config = waypoint_config(&args)?;
            if let Some(scale) = cli.time_scale {
                config.time_scale = scale;
            }
            run_mission(&config)
        }
        Some(Command::Sweep(args)) => {
            info!("running timed sweep mission");
            let mut config = sweep_config(&args);
            if let Some(scale) = cli.time_scale {
                config.time_scale = scale;
            }
            run_mission(&config)
        }
        Some(Command::CreateConfig(args)) => create_config_file(&args),
        None => {
            eprintln!("Error: No command provided. Use -h or --help for usage information.");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waypoint_config_forced_index_override() {
        let args = WaypointArgs {
            waypoints: None,
            output: PathBuf::from("."),
            speed: 4.0,
            seed: 7,
            forced_index: Some(3),
        };
        let config = waypoint_config(&args).unwrap();
        assert_eq!(config.fault.seed, 7);
        match config.fault.windows {
            WindowPolicy::IndexForced { index, ref windows } => {
                assert_eq!(index, 3);
                assert_eq!(windows.len(), 2);
            }
            _ => panic!("forced index should select the IndexForced policy"),
        }
    }

    #[test]
    fn test_sweep_config_overrides() {
        let args = SweepArgs {
            output: PathBuf::from("logs"),
            duration_s: 5.0,
            speed: 2.5,
            seed: 9,
            x_min: -20.0,
            x_max: -15.0,
            y_min: 0.0,
            y_max: 5.0,
            target_z: -30.0,
        };
        let config = sweep_config(&args);
        assert_eq!(config.mode, MissionMode::Sweep);
        assert_eq!(config.duration_s, 5.0);
        assert_eq!(config.speed, 2.5);
        assert_eq!(config.fault.seed, 9);
        assert_eq!(config.output, "logs");
        assert_eq!(config.target_box.x_min, -20.0);
        assert_eq!(config.target_box.z, -30.0);
    }

    #[test]
    fn test_create_config_args_structure() {
        let args = CreateConfigArgs {
            output: PathBuf::from("mission.toml"),
            mode: MissionMode::Sweep,
        };
        assert_eq!(args.output, PathBuf::from("mission.toml"));
        assert!(matches!(args.mode, MissionMode::Sweep));
    }
}
