//! Fault-injection test harness for simulated multirotor missions.
//!
//! This crate drives a simulated aerial vehicle through a sequence of waypoints while
//! deliberately injecting timing and positional faults, and records a time-series log of what
//! was commanded versus what actually happened. It is a test harness for flight-log consumers:
//! the logs it produces are meant to exercise downstream tooling that detects delay anomalies,
//! position jitter, and collisions. It is not a flight controller and contains no path planning
//! or physics; the vehicle itself sits behind the narrow [`vehicle::VehicleLink`] interface and
//! can be any simulated (or real) backend.
//!
//! The crate is organized around a single sequential control loop:
//!
//! - [`mission`] sequences waypoints (or generates random targets in a timed loop), decides
//!   per step whether a fault window is active, and runs the fault-injecting mover.
//! - [`fault`] holds the fault policies: *when* a fault is active ([`fault::WindowPolicy`]) and
//!   *what* a fault does to the commanded move ([`fault::PerturbationPolicy`]), bundled with
//!   the delay range and RNG seed in a serializable [`fault::FaultConfig`].
//! - [`logging`] appends one CSV record per completed step, immediately, so a crash
//!   mid-mission preserves every prior step.
//! - [`vehicle`] defines the collaborator interface and provides a kinematic
//!   [`vehicle::SimulatedMultirotor`] backend so missions run standalone and in tests.
//!
//! Execution is strictly single threaded. Every blocking call (move command, injected delay,
//! settle pause) fully suspends the one control flow until it completes, and log records are
//! appended in step order with monotonically non-decreasing elapsed times.
//!
//! Primarily built off of two crate dependencies:
//! - [`nalgebra`](https://crates.io/crates/nalgebra): vector arithmetic for positions and jitter.
//! - [`rand`](https://crates.io/crates/rand): seeded sampling of delays, jitter, and targets.

pub mod fault;
pub mod logging;
pub mod mission;
pub mod vehicle;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::Path;
use std::time::Duration;

/// A target position in the vehicle's local frame.
///
/// Coordinates follow the NED-style convention of the simulator backends this harness was
/// written against: x north, y east, z down, so level flight altitudes are negative z values.
/// Waypoints are immutable once defined and are consumed once per visit.
///
/// # Example
/// ```rust
/// use flightfault::Waypoint;
///
/// let wp = Waypoint::new(45.0, 0.0, -10.0);
/// assert_eq!(wp.to_vector().z, -10.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// North coordinate in meters.
    pub x: f64,
    /// East coordinate in meters.
    pub y: f64,
    /// Down coordinate in meters (negative above ground).
    pub z: f64,
}

impl Waypoint {
    /// Create a waypoint from local-frame coordinates.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Waypoint { x, y, z }
    }

    /// The waypoint as a position vector, for arithmetic with jitter offsets.
    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Reads a waypoint list from a CSV file with an `x,y,z` header.
    ///
    /// # Arguments
    /// * `path` - Path to the CSV file to read.
    ///
    /// # Returns
    /// * `Ok(Vec<Waypoint>)` in file order if successful.
    /// * `Err` if the file cannot be read or a row fails to parse.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Self>, Box<dyn std::error::Error>> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut waypoints = Vec::new();
        for result in rdr.deserialize() {
            let waypoint: Self = result?;
            waypoints.push(waypoint);
        }
        Ok(waypoints)
    }

    /// Writes a waypoint list to a CSV file with an `x,y,z` header.
    pub fn to_csv<P: AsRef<Path>>(waypoints: &[Self], path: P) -> std::io::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for waypoint in waypoints {
            writer.serialize(waypoint)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl Display for Waypoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

impl From<Waypoint> for Vector3<f64> {
    fn from(waypoint: Waypoint) -> Self {
        waypoint.to_vector()
    }
}

/// The result of one fault-injecting move attempt.
///
/// One outcome is produced per mission step and projected into exactly one log record before
/// the next step begins. The `delay_s` field always carries a value: the sampled delay when a
/// fault was active, or the fixed placeholder ([`fault::PLACEHOLDER_DELAY_S`]) when not. The
/// placeholder is logged deliberately so downstream consumers see a constant baseline.
#[derive(Clone, Debug)]
pub struct MoveOutcome {
    /// Seconds since the mission start reference, sampled when the record is built.
    pub elapsed_s: f64,
    /// Whether a fault window was active for this step.
    pub fault_active: bool,
    /// Delay applied before command issuance (seconds); placeholder value when no fault.
    pub delay_s: f64,
    /// The originally requested target.
    pub target: Waypoint,
    /// The position actually commanded after jitter. Equals the target when no fault was
    /// active or the perturbation policy applies no jitter.
    pub commanded: Vector3<f64>,
    /// The pose reported by the vehicle after the settle pause.
    pub achieved: Vector3<f64>,
    /// Name of the object collided with during this step, if any. Reflects the collision
    /// check made before any recovery maneuver.
    pub collision: Option<String>,
}

/// Sleep for `seconds * time_scale` wall-clock seconds.
///
/// All artificial pauses in the harness (injected delays, settle pauses, inter-step pauses,
/// simulated travel time) route through this so a mission can run compressed under test.
pub(crate) fn sleep_for(seconds: f64, time_scale: f64) {
    let scaled = seconds * time_scale;
    if scaled > 0.0 && scaled.is_finite() {
        std::thread::sleep(Duration::from_secs_f64(scaled));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waypoint_vector_conversion() {
        let wp = Waypoint::new(30.0, 20.0, -100.0);
        let v: Vector3<f64> = wp.into();
        assert_eq!(v, Vector3::new(30.0, 20.0, -100.0));
    }

    #[test]
    fn test_waypoint_display_two_decimals() {
        let wp = Waypoint::new(1.0, -2.345, 0.0);
        assert_eq!(format!("{}", wp), "(1.00, -2.35, 0.00)");
    }

    #[test]
    fn test_waypoint_csv_roundtrip() {
        let waypoints = vec![
            Waypoint::new(45.0, 0.0, -10.0),
            Waypoint::new(30.0, 20.0, -100.0),
        ];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waypoints.csv");
        Waypoint::to_csv(&waypoints, &path).unwrap();
        let read = Waypoint::from_csv(&path).unwrap();
        assert_eq!(read, waypoints);
    }

    #[test]
    fn test_waypoint_from_csv_missing_file() {
        let result = Waypoint::from_csv("nonexistent_waypoints.csv");
        assert!(result.is_err(), "should error on missing file");
    }

    #[test]
    fn test_sleep_for_zero_scale_returns_immediately() {
        let start = std::time::Instant::now();
        sleep_for(100.0, 0.0);
        assert!(start.elapsed().as_secs_f64() < 0.5);
    }
}
