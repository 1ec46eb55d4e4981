//! Fault scheduling and perturbation policies for mission steps.
//!
//! Fault injection is split into two orthogonal questions, bundled together with a delay range
//! and an RNG seed in [`FaultConfig`]:
//!
//! - [`WindowPolicy`] decides *when* a fault is active for a given step (elapsed-time windows,
//!   optionally with one step index forced active regardless of time).
//! - [`PerturbationPolicy`] decides *what* an active fault does to the commanded move beyond
//!   the injected delay (nothing, or uniform horizontal jitter).
//!
//! Keeping the two separate lets a mission mix and match schedules and perturbations without
//! touching the control loop, and keeps the stochastic parts reproducible through a single
//! seed. The two harness presets that ship with the binary are built from these pieces; see
//! [`FaultConfig::waypoint_defaults`] and [`FaultConfig::sweep_defaults`].

use nalgebra::Vector3;
use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

/// Delay value logged on steps where no fault was active (seconds).
///
/// This is a placeholder baked into every non-fault record, not "no delay": downstream log
/// consumers rely on a constant baseline in the delay column to tell nominal steps apart from
/// injected stalls.
pub const PLACEHOLDER_DELAY_S: f64 = 1.0;

/// A closed interval of elapsed mission time, inclusive on both ends.
///
/// ```rust
/// use flightfault::fault::TimeWindow;
///
/// let w = TimeWindow::new(5.0, 10.0);
/// assert!(w.contains(5.0) && w.contains(10.0));
/// assert!(!w.contains(10.01));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Window start, seconds of elapsed mission time.
    pub start_s: f64,
    /// Window end, seconds of elapsed mission time.
    pub end_s: f64,
}

impl TimeWindow {
    /// Create a window covering `[start_s, end_s]`.
    pub fn new(start_s: f64, end_s: f64) -> Self {
        TimeWindow { start_s, end_s }
    }

    /// Whether `elapsed_s` falls inside the window (closed interval).
    pub fn contains(&self, elapsed_s: f64) -> bool {
        elapsed_s >= self.start_s && elapsed_s <= self.end_s
    }
}

/// Decides *when* fault injection is active for a mission step.
///
/// Analogous to a measurement scheduler: it controls the timing of fault activity,
/// independent of what the fault does to the move (handled by [`PerturbationPolicy`]).
///
/// ## Usage
/// - `TimeWindows` → fault active whenever elapsed mission time falls inside any window.
/// - `IndexForced` → one step index is always faulted; every other step falls back to the
///   time windows. This reproduces "fault forced on the 2nd waypoint" style scenarios where
///   a specific step must be faulted regardless of how long earlier steps took.
///
/// ## Examples
///
/// ```rust
/// use flightfault::fault::{TimeWindow, WindowPolicy};
///
/// // Fault active during [5, 10] and [15, 20] seconds of elapsed time
/// let windows = WindowPolicy::TimeWindows {
///     windows: vec![TimeWindow::new(5.0, 10.0), TimeWindow::new(15.0, 20.0)],
/// };
/// assert!(windows.is_active(0, 7.5));
/// assert!(!windows.is_active(0, 12.0));
///
/// // Same windows, but step 1 is faulted no matter what the clock says
/// let forced = WindowPolicy::IndexForced {
///     index: 1,
///     windows: vec![TimeWindow::new(5.0, 10.0)],
/// };
/// assert!(forced.is_active(1, 0.0));
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindowPolicy {
    /// Fault active iff elapsed time lies inside one of the windows.
    TimeWindows {
        /// Closed elapsed-time intervals during which faults are injected.
        windows: Vec<TimeWindow>,
    },
    /// One step index forced active; all other steps use the time windows.
    IndexForced {
        /// Zero-based step index that is always faulted.
        index: usize,
        /// Closed elapsed-time intervals applied to every other step.
        windows: Vec<TimeWindow>,
    },
}

impl Default for WindowPolicy {
    fn default() -> Self {
        WindowPolicy::TimeWindows {
            windows: Vec::new(),
        }
    }
}

impl WindowPolicy {
    /// Whether fault injection is active for the step at `step_index` with `elapsed_s`
    /// seconds of mission time elapsed at decision time.
    pub fn is_active(&self, step_index: usize, elapsed_s: f64) -> bool {
        match self {
            WindowPolicy::TimeWindows { windows } => {
                windows.iter().any(|w| w.contains(elapsed_s))
            }
            WindowPolicy::IndexForced { index, windows } => {
                step_index == *index || windows.iter().any(|w| w.contains(elapsed_s))
            }
        }
    }
}

/// Decides *what* an active fault does to the commanded position.
///
/// The injected delay always applies on a faulted step; this policy controls only the
/// positional component. `DelayOnly` deliberately leaves the target untouched; in that
/// configuration "fault" means a control-loop stall and nothing else.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PerturbationPolicy {
    /// Faults stall command issuance but pass the target through unperturbed.
    DelayOnly,
    /// Faults additionally offset the commanded x and y, each sampled uniformly from
    /// `[-max_offset_m, max_offset_m]`. The z coordinate is never jittered.
    DelayAndJitter {
        /// Bound of the uniform horizontal offset, meters.
        max_offset_m: f64,
    },
}

impl Default for PerturbationPolicy {
    fn default() -> Self {
        PerturbationPolicy::DelayOnly
    }
}

impl PerturbationPolicy {
    /// Sample the jitter offset applied to a faulted move. Zero vector for `DelayOnly`.
    pub fn sample_jitter(&self, rng: &mut StdRng) -> Vector3<f64> {
        match self {
            PerturbationPolicy::DelayOnly => Vector3::zeros(),
            PerturbationPolicy::DelayAndJitter { max_offset_m } => Vector3::new(
                rng.random_range(-max_offset_m..=*max_offset_m),
                rng.random_range(-max_offset_m..=*max_offset_m),
                0.0,
            ),
        }
    }
}

/// Inclusive range the injected delay is sampled from on faulted steps.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    /// Lower bound, seconds.
    pub min_s: f64,
    /// Upper bound, seconds.
    pub max_s: f64,
}

impl Default for DelayRange {
    fn default() -> Self {
        DelayRange {
            min_s: 1.5,
            max_s: 3.0,
        }
    }
}

impl DelayRange {
    /// Sample a delay uniformly from `[min_s, max_s]`.
    pub fn sample(&self, rng: &mut StdRng) -> f64 {
        rng.random_range(self.min_s..=self.max_s)
    }
}

/// Default seed value for reproducible missions
fn default_seed() -> u64 {
    42
}

/// Complete fault-injection configuration for a mission.
///
/// Ties together a [`WindowPolicy`] (when faults are active), a [`PerturbationPolicy`]
/// (what an active fault does beyond delaying), the [`DelayRange`] delays are sampled from,
/// and a random seed so runs repeat exactly.
///
/// ## Example
///
/// ```rust
/// use flightfault::fault::{DelayRange, FaultConfig, PerturbationPolicy, TimeWindow, WindowPolicy};
///
/// // Jittered faults forced on the second step, otherwise during [5,10] and [15,20]
/// let cfg = FaultConfig {
///     windows: WindowPolicy::IndexForced {
///         index: 1,
///         windows: vec![TimeWindow::new(5.0, 10.0), TimeWindow::new(15.0, 20.0)],
///     },
///     perturbation: PerturbationPolicy::DelayAndJitter { max_offset_m: 1.0 },
///     delay_range: DelayRange { min_s: 1.5, max_s: 3.0 },
///     seed: 42,
/// };
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FaultConfig {
    /// When faults are active (time windows, optionally one forced index).
    #[serde(default)]
    pub windows: WindowPolicy,

    /// What an active fault does to the commanded position.
    #[serde(default)]
    pub perturbation: PerturbationPolicy,

    /// Range the injected delay is sampled from on faulted steps.
    #[serde(default)]
    pub delay_range: DelayRange,

    /// Random number generator seed for deterministic missions.
    ///
    /// Use the same seed to repeat a mission's delays, jitter offsets, and generated targets
    /// exactly; change it to get a new realization.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        FaultConfig {
            windows: WindowPolicy::default(),
            perturbation: PerturbationPolicy::default(),
            delay_range: DelayRange::default(),
            seed: default_seed(),
        }
    }
}

impl FaultConfig {
    /// The waypoint-harness preset: fault forced on the second waypoint, otherwise active
    /// during [5, 10] and [15, 20] seconds, with ±1 m horizontal jitter on faulted moves.
    pub fn waypoint_defaults() -> Self {
        FaultConfig {
            windows: WindowPolicy::IndexForced {
                index: 1,
                windows: vec![TimeWindow::new(5.0, 10.0), TimeWindow::new(15.0, 20.0)],
            },
            perturbation: PerturbationPolicy::DelayAndJitter { max_offset_m: 1.0 },
            delay_range: DelayRange::default(),
            seed: default_seed(),
        }
    }

    /// The timed-sweep preset: a single wide [2, 18] second window, delays only.
    pub fn sweep_defaults() -> Self {
        FaultConfig {
            windows: WindowPolicy::TimeWindows {
                windows: vec![TimeWindow::new(2.0, 18.0)],
            },
            perturbation: PerturbationPolicy::DelayOnly,
            delay_range: DelayRange::default(),
            seed: default_seed(),
        }
    }

    /// Check the configuration for ranges that would panic or misbehave at sample time.
    pub fn validate(&self) -> Result<(), Box<dyn Error>> {
        if !self.delay_range.min_s.is_finite() || !self.delay_range.max_s.is_finite() {
            return Err("delay range bounds must be finite".into());
        }
        if self.delay_range.min_s < 0.0 {
            return Err("delay range lower bound must be non-negative".into());
        }
        if self.delay_range.min_s > self.delay_range.max_s {
            return Err(format!(
                "delay range lower bound {} exceeds upper bound {}",
                self.delay_range.min_s, self.delay_range.max_s
            )
            .into());
        }
        if let PerturbationPolicy::DelayAndJitter { max_offset_m } = self.perturbation {
            if !max_offset_m.is_finite() || max_offset_m < 0.0 {
                return Err("jitter offset bound must be finite and non-negative".into());
            }
        }
        let windows = match &self.windows {
            WindowPolicy::TimeWindows { windows } => windows,
            WindowPolicy::IndexForced { windows, .. } => windows,
        };
        for window in windows {
            if window.start_s > window.end_s {
                return Err(format!(
                    "fault window [{}, {}] is inverted",
                    window.start_s, window.end_s
                )
                .into());
            }
        }
        Ok(())
    }

    /// Write the configuration to a JSON file (pretty-printed).
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).map_err(io::Error::other)
    }

    /// Read the configuration from a JSON file.
    pub fn from_json<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(file).map_err(io::Error::other)
    }

    /// Write the configuration as YAML.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        let s = serde_yaml::to_string(self).map_err(io::Error::other)?;
        file.write_all(s.as_bytes())
    }

    /// Read the configuration from YAML.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_yaml::from_reader(file).map_err(io::Error::other)
    }

    /// Write the configuration as TOML.
    pub fn to_toml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        let s = toml::to_string(self).map_err(io::Error::other)?;
        file.write_all(s.as_bytes())
    }

    /// Read the configuration from TOML.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut s = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut s)?;
        toml::from_str(&s).map_err(io::Error::other)
    }

    /// Generic write: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let p = path.as_ref();
        let ext = p
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());
        match ext.as_deref() {
            Some("json") => self.to_json(p),
            Some("yaml") | Some("yml") => self.to_yaml(p),
            Some("toml") => self.to_toml(p),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unsupported file extension",
            )),
        }
    }

    /// Generic read: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let p = path.as_ref();
        let ext = p
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());
        match ext.as_deref() {
            Some("json") => Self::from_json(p),
            Some("yaml") | Some("yml") => Self::from_yaml(p),
            Some("toml") => Self::from_toml(p),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unsupported file extension",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_time_window_bounds_inclusive() {
        let w = TimeWindow::new(5.0, 10.0);
        assert!(w.contains(5.0));
        assert!(w.contains(10.0));
        assert!(w.contains(7.5));
        assert!(!w.contains(4.999));
        assert!(!w.contains(10.001));
    }

    #[test]
    fn test_time_windows_union() {
        let policy = WindowPolicy::TimeWindows {
            windows: vec![TimeWindow::new(5.0, 10.0), TimeWindow::new(15.0, 20.0)],
        };
        assert!(policy.is_active(0, 6.0));
        assert!(policy.is_active(7, 17.0));
        assert!(!policy.is_active(0, 12.0));
        assert!(!policy.is_active(0, 0.0));
    }

    #[test]
    fn test_index_forced_overrides_clock() {
        let policy = WindowPolicy::IndexForced {
            index: 1,
            windows: vec![TimeWindow::new(5.0, 10.0)],
        };
        // forced regardless of elapsed time
        assert!(policy.is_active(1, 0.0));
        assert!(policy.is_active(1, 1000.0));
        // other indices fall back to the windows
        assert!(policy.is_active(0, 7.0));
        assert!(!policy.is_active(0, 0.0));
        assert!(!policy.is_active(2, 12.0));
    }

    #[test]
    fn test_jitter_bounds_and_zero_z() {
        let policy = PerturbationPolicy::DelayAndJitter { max_offset_m: 1.0 };
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let jitter = policy.sample_jitter(&mut rng);
            assert!(jitter.x >= -1.0 && jitter.x <= 1.0);
            assert!(jitter.y >= -1.0 && jitter.y <= 1.0);
            assert_eq!(jitter.z, 0.0);
        }
    }

    #[test]
    fn test_delay_only_never_jitters() {
        let mut rng = StdRng::seed_from_u64(7);
        let jitter = PerturbationPolicy::DelayOnly.sample_jitter(&mut rng);
        assert_eq!(jitter, nalgebra::Vector3::zeros());
    }

    #[test]
    fn test_delay_sample_within_range() {
        let range = DelayRange::default();
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..200 {
            let delay = range.sample(&mut rng);
            assert!(delay >= 1.5 && delay <= 3.0, "delay {} out of range", delay);
        }
    }

    #[test]
    fn test_same_seed_same_delays() {
        let range = DelayRange::default();
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        for _ in 0..10 {
            assert_eq!(range.sample(&mut a), range.sample(&mut b));
        }
    }

    #[test]
    fn test_validate_rejects_inverted_delay_range() {
        let cfg = FaultConfig {
            delay_range: DelayRange {
                min_s: 3.0,
                max_s: 1.5,
            },
            ..FaultConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_jitter_bound() {
        let cfg = FaultConfig {
            perturbation: PerturbationPolicy::DelayAndJitter { max_offset_m: -1.0 },
            ..FaultConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let cfg = FaultConfig {
            windows: WindowPolicy::TimeWindows {
                windows: vec![TimeWindow::new(10.0, 5.0)],
            },
            ..FaultConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_presets_validate() {
        assert!(FaultConfig::waypoint_defaults().validate().is_ok());
        assert!(FaultConfig::sweep_defaults().validate().is_ok());
    }

    #[test]
    fn test_config_file_roundtrip() {
        let cfg = FaultConfig::waypoint_defaults();
        let dir = tempfile::tempdir().unwrap();
        for name in ["fault.json", "fault.yaml", "fault.toml"] {
            let path = dir.path().join(name);
            cfg.to_file(&path).unwrap();
            let read = FaultConfig::from_file(&path).unwrap();
            assert_eq!(read.seed, cfg.seed);
            assert_eq!(read.delay_range, cfg.delay_range);
            match (&read.windows, &cfg.windows) {
                (
                    WindowPolicy::IndexForced { index: a, .. },
                    WindowPolicy::IndexForced { index: b, .. },
                ) => assert_eq!(a, b),
                _ => panic!("window policy variant changed in {}", name),
            }
        }
    }

    #[test]
    fn test_config_rejects_unknown_extension() {
        let cfg = FaultConfig::default();
        let dir = tempfile::tempdir().unwrap();
        assert!(cfg.to_file(dir.path().join("fault.ini")).is_err());
    }
}
