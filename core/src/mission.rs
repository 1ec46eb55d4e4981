//! Mission driver and fault-injecting mover.
//!
//! A mission is one run of the harness: the vehicle lifecycle is brought up, a sequence of
//! moves is executed strictly in order with fault injection applied per step, one log record
//! is appended per step, and the lifecycle is torn down. Two operating modes exist:
//!
//! - **Waypoint** ([`run_waypoint_mission`]): iterate a predefined waypoint list exactly once.
//! - **Sweep** ([`run_timed_mission`]): fly to an initial safe position, then generate random
//!   targets inside a bounding box until the configured mission duration elapses.
//!
//! All per-run state lives in an explicit [`MissionContext`] (vehicle handle, open log,
//! mission start reference, seeded RNG) rather than ambient globals, so multiple missions can
//! run in isolated contexts under test. Elapsed time is always measured against the single
//! start instant captured when the context is created; it is never reset per step.

use crate::fault::{FaultConfig, PLACEHOLDER_DELAY_S};
use crate::logging::{LogLayout, MissionLog};
use crate::vehicle::VehicleLink;
use crate::{MoveOutcome, Waypoint, sleep_for};
use clap::ValueEnum;
use log::{debug, info, warn};
use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Safe position flown to after a collision, and the first target of a sweep mission.
pub const SAFE_POSITION: [f64; 3] = [0.0, 0.0, -10.0];
/// Speed of the collision recovery maneuver and the initial positioning move (m/s).
pub const RECOVERY_SPEED: f64 = 3.0;

fn default_speed() -> f64 {
    4.0
}
fn default_pause() -> f64 {
    1.0
}
fn default_duration() -> f64 {
    20.0
}
fn default_output() -> String {
    ".".to_string()
}
fn default_time_scale() -> f64 {
    1.0
}

/// Mission operating mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MissionMode {
    /// Fly a fixed waypoint list once; log in the jittered layout.
    Waypoint,
    /// Generate random targets until the mission duration elapses; log in the compact layout.
    Sweep,
}

impl std::fmt::Display for MissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissionMode::Waypoint => write!(f, "waypoint"),
            MissionMode::Sweep => write!(f, "sweep"),
        }
    }
}

/// Log verbosity level for configuration files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Logging section of a mission configuration file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (off, error, warn, info, debug, trace).
    #[serde(default)]
    pub level: LogLevel,
    /// Log file path; stderr when absent.
    #[serde(default)]
    pub file: Option<String>,
}

/// Bounding box random sweep targets are drawn from. `z` is fixed for every target.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetBox {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    /// Fixed down coordinate of every generated target.
    pub z: f64,
}

impl Default for TargetBox {
    fn default() -> Self {
        TargetBox {
            x_min: -12.0,
            x_max: -8.0,
            y_min: 8.0,
            y_max: 12.0,
            z: -10.0,
        }
    }
}

impl TargetBox {
    /// Draw a target uniformly from the box.
    pub fn sample(&self, rng: &mut StdRng) -> Waypoint {
        Waypoint::new(
            rng.random_range(self.x_min..=self.x_max),
            rng.random_range(self.y_min..=self.y_max),
            self.z,
        )
    }

    /// Check the box for bounds that would panic at sample time.
    pub fn validate(&self) -> Result<(), Box<dyn Error>> {
        let bounds = [self.x_min, self.x_max, self.y_min, self.y_max, self.z];
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err("target box bounds must be finite".into());
        }
        if self.x_min > self.x_max || self.y_min > self.y_max {
            return Err("target box bounds are inverted".into());
        }
        Ok(())
    }
}

/// Complete description of one mission run.
///
/// Loadable from TOML/JSON/YAML via [`MissionConfig::from_file`]; the two harness presets are
/// available as [`MissionConfig::waypoint_template`] and [`MissionConfig::sweep_template`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MissionConfig {
    /// Operating mode.
    pub mode: MissionMode,

    /// Waypoint list for waypoint mode. Ignored in sweep mode.
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,

    /// Fault injection policies, delay range, and RNG seed.
    #[serde(default)]
    pub fault: FaultConfig,

    /// Nominal move speed (m/s).
    #[serde(default = "default_speed")]
    pub speed: f64,

    /// Pause after each move before the pose is sampled and logged (seconds).
    #[serde(default = "default_pause")]
    pub settle_s: f64,

    /// Pause between steps (seconds).
    #[serde(default = "default_pause")]
    pub step_pause_s: f64,

    /// Total mission duration for sweep mode (seconds). Ignored in waypoint mode.
    #[serde(default = "default_duration")]
    pub duration_s: f64,

    /// Bounding box sweep targets are drawn from. Ignored in waypoint mode.
    #[serde(default)]
    pub target_box: TargetBox,

    /// Directory mission logs are written to.
    #[serde(default = "default_output")]
    pub output: String,

    /// Multiplier applied to every artificial sleep. 1.0 runs in real time; smaller values
    /// compress the mission. Logged delay values are always the unscaled samples.
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,

    /// Logger settings applied when the mission is launched from a configuration file.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MissionConfig {
    /// The waypoint-harness preset: the six-waypoint survey line with jittered faults forced
    /// on the second waypoint.
    pub fn waypoint_template() -> Self {
        MissionConfig {
            mode: MissionMode::Waypoint,
            waypoints: vec![
                Waypoint::new(45.0, 0.0, -10.0),
                Waypoint::new(30.0, 20.0, -100.0),
                Waypoint::new(39.0, 39.0, -77.0),
                Waypoint::new(72.0, 47.0, -56.0),
                Waypoint::new(18.0, 28.0, -50.0),
                Waypoint::new(1500.0, 50.0, -50.0),
            ],
            fault: FaultConfig::waypoint_defaults(),
            speed: default_speed(),
            settle_s: default_pause(),
            step_pause_s: default_pause(),
            duration_s: default_duration(),
            target_box: TargetBox::default(),
            output: default_output(),
            time_scale: default_time_scale(),
            logging: LoggingConfig::default(),
        }
    }

    /// The timed-sweep preset: 20 seconds of random targets with delay-only faults.
    pub fn sweep_template() -> Self {
        MissionConfig {
            mode: MissionMode::Sweep,
            waypoints: Vec::new(),
            fault: FaultConfig::sweep_defaults(),
            speed: default_speed(),
            settle_s: default_pause(),
            step_pause_s: default_pause(),
            duration_s: default_duration(),
            target_box: TargetBox::default(),
            output: default_output(),
            time_scale: default_time_scale(),
            logging: LoggingConfig::default(),
        }
    }

    /// Check the configuration before a mission is launched.
    pub fn validate(&self) -> Result<(), Box<dyn Error>> {
        self.fault.validate()?;
        if !(self.speed > 0.0) || !self.speed.is_finite() {
            return Err(format!("mission speed must be positive, got {}", self.speed).into());
        }
        if self.settle_s < 0.0 || self.step_pause_s < 0.0 {
            return Err("settle and step pauses must be non-negative".into());
        }
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err("time scale must be finite and non-negative".into());
        }
        match self.mode {
            MissionMode::Waypoint => {
                if self.waypoints.is_empty() {
                    return Err("waypoint mode requires at least one waypoint".into());
                }
            }
            MissionMode::Sweep => {
                if !(self.duration_s > 0.0) {
                    return Err("sweep mode requires a positive mission duration".into());
                }
                self.target_box.validate()?;
            }
        }
        Ok(())
    }

    /// Generic read: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let p = path.as_ref();
        let ext = p
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());
        match ext.as_deref() {
            Some("json") => {
                let file = File::open(p)?;
                serde_json::from_reader(file).map_err(io::Error::other)
            }
            Some("yaml") | Some("yml") => {
                let file = File::open(p)?;
                serde_yaml::from_reader(file).map_err(io::Error::other)
            }
            Some("toml") => {
                let mut s = String::new();
                File::open(p)?.read_to_string(&mut s)?;
                toml::from_str(&s).map_err(io::Error::other)
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unsupported file extension",
            )),
        }
    }

    /// Generic write: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let p = path.as_ref();
        let ext = p
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());
        match ext.as_deref() {
            Some("json") => {
                let file = File::create(p)?;
                serde_json::to_writer_pretty(file, self).map_err(io::Error::other)
            }
            Some("yaml") | Some("yml") => {
                let s = serde_yaml::to_string(self).map_err(io::Error::other)?;
                File::create(p)?.write_all(s.as_bytes())
            }
            Some("toml") => {
                let s = toml::to_string(self).map_err(io::Error::other)?;
                File::create(p)?.write_all(s.as_bytes())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unsupported file extension",
            )),
        }
    }
}

/// Per-run state threaded through every mover call.
///
/// Owning the vehicle borrow, the open log, the start instant, and the seeded RNG in one
/// struct keeps missions isolated from each other; nothing in the harness is global.
pub struct MissionContext<'a> {
    pub vehicle: &'a mut dyn VehicleLink,
    pub log: MissionLog,
    /// Wall-clock reference for every elapsed-time computation in the mission.
    pub start: Instant,
    pub fault: FaultConfig,
    pub rng: StdRng,
    pub speed: f64,
    pub settle_s: f64,
    pub step_pause_s: f64,
    pub time_scale: f64,
}

impl<'a> MissionContext<'a> {
    /// Build a context for one mission run. Captures the mission start instant and seeds the
    /// RNG from the fault configuration.
    pub fn new(vehicle: &'a mut dyn VehicleLink, log: MissionLog, config: &MissionConfig) -> Self {
        MissionContext {
            vehicle,
            log,
            start: Instant::now(),
            fault: config.fault.clone(),
            rng: StdRng::seed_from_u64(config.fault.seed),
            speed: config.speed,
            settle_s: config.settle_s,
            step_pause_s: config.step_pause_s,
            time_scale: config.time_scale,
        }
    }

    /// Seconds elapsed since the mission start reference.
    pub fn elapsed_s(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Execute one commanded move with optional fault injection and append its log record.
///
/// The fault delays command issuance, not post-move processing: on a faulted step the sampled
/// delay is slept *before* the move command goes out. Collision is the only handled failure:
/// one recovery move to [`SAFE_POSITION`], no retry of the waypoint, and the record still
/// reflects the pre-recovery collision check. Vehicle errors propagate and abort the mission.
pub fn move_with_fault(
    ctx: &mut MissionContext,
    target: &Waypoint,
    speed: f64,
    fault_active: bool,
) -> Result<MoveOutcome, Box<dyn Error>> {
    let mut delay_s = PLACEHOLDER_DELAY_S;
    let mut jitter = Vector3::zeros();

    if fault_active {
        delay_s = ctx.fault.delay_range.sample(&mut ctx.rng);
        info!("injecting artificial delay: {:.2} s", delay_s);
        sleep_for(delay_s, ctx.time_scale);
        ctx.vehicle
            .emit_diagnostic("FAULT", &format!("Delay: {:.2}s", delay_s));

        jitter = ctx.fault.perturbation.sample_jitter(&mut ctx.rng);
        if jitter != Vector3::zeros() {
            info!("jitter applied: dx={:.2}, dy={:.2}", jitter.x, jitter.y);
            ctx.vehicle.emit_diagnostic(
                "FAULT",
                &format!("Jitter: dx={:.2}, dy={:.2}", jitter.x, jitter.y),
            );
        }
    } else {
        debug!("no delay fault, moving immediately");
        ctx.vehicle.emit_diagnostic("MOVE", "Normal command");
    }

    let commanded = target.to_vector() + jitter;
    ctx.vehicle
        .move_to_position(commanded.x, commanded.y, commanded.z, speed)?;

    let collision = ctx.vehicle.collision_state()?;
    let collision_name = if collision.has_collided {
        warn!(
            "collision with {} at [{:.2}, {:.2}, {:.2}], flying recovery maneuver",
            collision.object_name,
            collision.position.x,
            collision.position.y,
            collision.position.z
        );
        ctx.vehicle
            .emit_diagnostic("COLLISION", &collision.object_name);
        ctx.vehicle.move_to_position(
            SAFE_POSITION[0],
            SAFE_POSITION[1],
            SAFE_POSITION[2],
            RECOVERY_SPEED,
        )?;
        Some(collision.object_name)
    } else {
        None
    };

    sleep_for(ctx.settle_s, ctx.time_scale);
    let achieved = ctx.vehicle.current_pose()?;

    let outcome = MoveOutcome {
        elapsed_s: ctx.elapsed_s(),
        fault_active,
        delay_s,
        target: *target,
        commanded,
        achieved,
        collision: collision_name,
    };
    ctx.log.append(&outcome)?;
    Ok(outcome)
}

/// Fly a fixed waypoint list exactly once.
///
/// The fault flag for each step is decided when the step begins, from the elapsed time at
/// that moment and the step index.
pub fn run_waypoint_mission(
    ctx: &mut MissionContext,
    waypoints: &[Waypoint],
) -> Result<Vec<MoveOutcome>, Box<dyn Error>> {
    let mut outcomes = Vec::with_capacity(waypoints.len());
    for (i, waypoint) in waypoints.iter().enumerate() {
        let elapsed = ctx.elapsed_s();
        let fault_active = ctx.fault.windows.is_active(i, elapsed);
        debug!(
            "waypoint {}: elapsed {:.2} s, fault active: {}",
            i + 1,
            elapsed,
            fault_active
        );
        info!(
            "moving to waypoint {} of {}: {}",
            i + 1,
            waypoints.len(),
            waypoint
        );
        let speed = ctx.speed;
        outcomes.push(move_with_fault(ctx, waypoint, speed, fault_active)?);
        sleep_for(ctx.step_pause_s, ctx.time_scale);
    }
    Ok(outcomes)
}

/// Fly randomly generated targets until the mission duration elapses.
///
/// Starts with an initial positioning move to [`SAFE_POSITION`] with the fault flag off,
/// then loops while elapsed time is below `duration_s`.
pub fn run_timed_mission(
    ctx: &mut MissionContext,
    duration_s: f64,
    bounds: &TargetBox,
) -> Result<Vec<MoveOutcome>, Box<dyn Error>> {
    let initial = Waypoint::new(SAFE_POSITION[0], SAFE_POSITION[1], SAFE_POSITION[2]);
    info!("moving to initial position {}", initial);
    let mut outcomes = vec![move_with_fault(ctx, &initial, RECOVERY_SPEED, false)?];

    let mut step = outcomes.len();
    while ctx.elapsed_s() < duration_s {
        let elapsed = ctx.elapsed_s();
        let fault_active = ctx.fault.windows.is_active(step, elapsed);
        debug!("elapsed {:.2} s, fault active: {}", elapsed, fault_active);
        let target = bounds.sample(&mut ctx.rng);
        let speed = ctx.speed;
        outcomes.push(move_with_fault(ctx, &target, speed, fault_active)?);
        sleep_for(ctx.step_pause_s, ctx.time_scale);
        step += 1;
    }
    Ok(outcomes)
}

/// Everything a completed mission leaves behind.
#[derive(Debug)]
pub struct MissionReport {
    /// One outcome per executed step, in order.
    pub outcomes: Vec<MoveOutcome>,
    /// The mission log file on disk.
    pub log_path: PathBuf,
}

/// Run a complete mission: lifecycle up, mission loop, lifecycle down.
///
/// Any vehicle failure before or during the mission is fatal and propagates immediately; the
/// only recovered condition is the in-mission collision maneuver handled by
/// [`move_with_fault`].
pub fn execute(
    vehicle: &mut dyn VehicleLink,
    config: &MissionConfig,
) -> Result<MissionReport, Box<dyn Error>> {
    config.validate()?;

    info!("confirming vehicle link");
    vehicle.confirm_connection()?;
    vehicle.enable_control(true)?;
    vehicle.arm(true)?;
    info!("taking off");
    vehicle.takeoff()?;

    let layout = match config.mode {
        MissionMode::Waypoint => LogLayout::Jittered,
        MissionMode::Sweep => LogLayout::Compact,
    };
    let log = MissionLog::create_timestamped(&config.output, layout)?;
    info!("logging mission to {}", log.path().display());

    let mut ctx = MissionContext::new(&mut *vehicle, log, config);
    let outcomes = match config.mode {
        MissionMode::Waypoint => run_waypoint_mission(&mut ctx, &config.waypoints)?,
        MissionMode::Sweep => run_timed_mission(&mut ctx, config.duration_s, &config.target_box)?,
    };
    let log_path = ctx.log.path().to_path_buf();
    drop(ctx);

    info!("mission complete, landing");
    vehicle.land()?;
    vehicle.arm(false)?;
    vehicle.enable_control(false)?;
    info!("vehicle disarmed and control released");

    Ok(MissionReport { outcomes, log_path })
}
