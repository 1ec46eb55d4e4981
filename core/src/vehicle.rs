//! Vehicle collaborator interface and a kinematic simulated backend.
//!
//! The mission driver talks to the vehicle exclusively through [`VehicleLink`], a narrow
//! capability set patterned after multirotor simulator APIs: confirm the link, enable
//! external control, arm, take off, fly blocking point-to-point moves, report pose and
//! collision state, land, disarm. Any backend that implements the trait can sit behind the
//! harness; the crate ships [`SimulatedMultirotor`], a kinematic point-mass that is good
//! enough to exercise every code path (including collisions) without a simulator process.
//!
//! Lifecycle ordering is enforced: control must be enabled before arming, the vehicle must be
//! armed before takeoff, and airborne before any move. Violations are errors, not panics.

use crate::sleep_for;
use nalgebra::Vector3;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use std::error::Error;

/// Altitude the simulated vehicle climbs to on takeoff (down coordinate, meters).
const TAKEOFF_ALTITUDE_M: f64 = -3.0;
/// Nominal duration of the blocking takeoff and landing maneuvers (seconds).
const LIFT_DURATION_S: f64 = 2.0;

/// Result of a collision query.
///
/// `position` is the vehicle position at which the collision was registered; `object_name`
/// identifies the obstacle. Both are empty/zero when `has_collided` is false.
#[derive(Clone, Debug, PartialEq)]
pub struct CollisionInfo {
    pub has_collided: bool,
    pub object_name: String,
    pub position: Vector3<f64>,
}

impl CollisionInfo {
    /// The "no collision" value.
    pub fn none() -> Self {
        CollisionInfo {
            has_collided: false,
            object_name: String::new(),
            position: Vector3::zeros(),
        }
    }
}

/// The narrow interface the harness consumes; polymorphic over any simulated or real backend.
///
/// All blocking operations (`takeoff`, `land`, `move_to_position`) suspend the calling flow
/// until the maneuver completes. Fallible operations return errors that the mission driver
/// treats as fatal; [`VehicleLink::emit_diagnostic`] is best-effort and infallible, with
/// implementations swallowing their own failures.
pub trait VehicleLink {
    /// Establish and confirm the link to the vehicle.
    fn confirm_connection(&mut self) -> Result<(), Box<dyn Error>>;
    /// Grant or revoke external control.
    fn enable_control(&mut self, enabled: bool) -> Result<(), Box<dyn Error>>;
    /// Arm or disarm the vehicle.
    fn arm(&mut self, armed: bool) -> Result<(), Box<dyn Error>>;
    /// Take off and hover; blocks until airborne.
    fn takeoff(&mut self) -> Result<(), Box<dyn Error>>;
    /// Land; blocks until on the ground.
    fn land(&mut self) -> Result<(), Box<dyn Error>>;
    /// Fly to a local-frame position at the given speed; blocks until reached.
    fn move_to_position(&mut self, x: f64, y: f64, z: f64, speed: f64)
    -> Result<(), Box<dyn Error>>;
    /// The vehicle's current position estimate.
    fn current_pose(&mut self) -> Result<Vector3<f64>, Box<dyn Error>>;
    /// Collision state as of the most recent move.
    fn collision_state(&mut self) -> Result<CollisionInfo, Box<dyn Error>>;
    /// Send a tagged message to the vehicle's side-channel diagnostics. Best-effort.
    fn emit_diagnostic(&mut self, tag: &str, message: &str);
}

/// An axis-aligned box the simulated vehicle can collide with.
#[derive(Clone, Debug)]
pub struct Obstacle {
    pub name: String,
    /// Minimum corner (componentwise).
    pub min: Vector3<f64>,
    /// Maximum corner (componentwise).
    pub max: Vector3<f64>,
}

impl Obstacle {
    pub fn new(name: &str, min: Vector3<f64>, max: Vector3<f64>) -> Self {
        Obstacle {
            name: name.to_string(),
            min,
            max,
        }
    }

    /// Whether `point` lies inside the box (inclusive bounds).
    pub fn contains(&self, point: &Vector3<f64>) -> bool {
        (0..3).all(|i| point[i] >= self.min[i] && point[i] <= self.max[i])
    }
}

/// One move command accepted by the simulated backend, kept for inspection in tests.
#[derive(Clone, Debug, PartialEq)]
pub struct MoveCommand {
    pub position: Vector3<f64>,
    pub speed: f64,
}

/// One diagnostic message received over the side channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub tag: String,
    pub message: String,
}

/// Kinematic simulated multirotor backend.
///
/// Each commanded move "flies" by sleeping `distance / speed` (scaled by the harness time
/// scale) and then teleporting to the commanded position. A move whose end position lands
/// inside a registered [`Obstacle`] registers a collision, which stays visible to
/// [`VehicleLink::collision_state`] until the next move replaces it. Reported poses can carry
/// zero-mean Gaussian noise via `pose_noise_std` (zero by default, so tests see exact values).
pub struct SimulatedMultirotor {
    time_scale: f64,
    pose: Vector3<f64>,
    connected: bool,
    api_control: bool,
    armed: bool,
    airborne: bool,
    obstacles: Vec<Obstacle>,
    last_collision: Option<CollisionInfo>,
    moves: Vec<MoveCommand>,
    diagnostics: Vec<Diagnostic>,
    /// Standard deviation of the noise added to reported poses (meters). Truth is unaffected.
    pub pose_noise_std: f64,
    rng: StdRng,
}

impl SimulatedMultirotor {
    /// Create a grounded, disconnected vehicle at the origin.
    ///
    /// `time_scale` multiplies every simulated maneuver duration; pass 0.0 to make all
    /// blocking calls return immediately.
    pub fn new(time_scale: f64) -> Self {
        SimulatedMultirotor {
            time_scale,
            pose: Vector3::zeros(),
            connected: false,
            api_control: false,
            armed: false,
            airborne: false,
            obstacles: Vec::new(),
            last_collision: None,
            moves: Vec::new(),
            diagnostics: Vec::new(),
            pose_noise_std: 0.0,
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// Register an obstacle for collision checks on subsequent moves.
    pub fn add_obstacle(&mut self, obstacle: Obstacle) {
        self.obstacles.push(obstacle);
    }

    /// Every move command accepted so far, in order (including recovery moves).
    pub fn commanded_moves(&self) -> &[MoveCommand] {
        &self.moves
    }

    /// Every diagnostic received so far, in order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The vehicle's true position (no reporting noise).
    pub fn true_pose(&self) -> Vector3<f64> {
        self.pose
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_airborne(&self) -> bool {
        self.airborne
    }
}

impl Default for SimulatedMultirotor {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl VehicleLink for SimulatedMultirotor {
    fn confirm_connection(&mut self) -> Result<(), Box<dyn Error>> {
        self.connected = true;
        Ok(())
    }

    fn enable_control(&mut self, enabled: bool) -> Result<(), Box<dyn Error>> {
        if !self.connected {
            return Err("cannot change control state before the link is confirmed".into());
        }
        self.api_control = enabled;
        Ok(())
    }

    fn arm(&mut self, armed: bool) -> Result<(), Box<dyn Error>> {
        if armed && !self.api_control {
            return Err("cannot arm without external control enabled".into());
        }
        self.armed = armed;
        Ok(())
    }

    fn takeoff(&mut self) -> Result<(), Box<dyn Error>> {
        if !self.armed {
            return Err("cannot take off while disarmed".into());
        }
        if self.airborne {
            return Err("already airborne".into());
        }
        sleep_for(LIFT_DURATION_S, self.time_scale);
        self.pose.z = TAKEOFF_ALTITUDE_M;
        self.airborne = true;
        Ok(())
    }

    fn land(&mut self) -> Result<(), Box<dyn Error>> {
        if !self.airborne {
            return Err("cannot land while on the ground".into());
        }
        sleep_for(LIFT_DURATION_S, self.time_scale);
        self.pose.z = 0.0;
        self.airborne = false;
        Ok(())
    }

    fn move_to_position(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        speed: f64,
    ) -> Result<(), Box<dyn Error>> {
        if !self.airborne {
            return Err("cannot move while on the ground".into());
        }
        if !(speed > 0.0) {
            return Err(format!("move speed must be positive, got {}", speed).into());
        }
        let destination = Vector3::new(x, y, z);
        let distance = (destination - self.pose).norm();
        sleep_for(distance / speed, self.time_scale);
        self.pose = destination;
        self.moves.push(MoveCommand {
            position: destination,
            speed,
        });
        self.last_collision = self
            .obstacles
            .iter()
            .find(|o| o.contains(&destination))
            .map(|o| CollisionInfo {
                has_collided: true,
                object_name: o.name.clone(),
                position: destination,
            });
        Ok(())
    }

    fn current_pose(&mut self) -> Result<Vector3<f64>, Box<dyn Error>> {
        if !self.connected {
            return Err("cannot report pose before the link is confirmed".into());
        }
        if self.pose_noise_std > 0.0 {
            let noise = Normal::new(0.0, self.pose_noise_std).map_err(io_like)?;
            return Ok(Vector3::new(
                self.pose.x + noise.sample(&mut self.rng),
                self.pose.y + noise.sample(&mut self.rng),
                self.pose.z + noise.sample(&mut self.rng),
            ));
        }
        Ok(self.pose)
    }

    fn collision_state(&mut self) -> Result<CollisionInfo, Box<dyn Error>> {
        Ok(self
            .last_collision
            .clone()
            .unwrap_or_else(CollisionInfo::none))
    }

    fn emit_diagnostic(&mut self, tag: &str, message: &str) {
        self.diagnostics.push(Diagnostic {
            tag: tag.to_string(),
            message: message.to_string(),
        });
    }
}

fn io_like(e: rand_distr::NormalError) -> Box<dyn Error> {
    format!("invalid pose noise distribution: {:?}", e).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn airborne_vehicle() -> SimulatedMultirotor {
        let mut vehicle = SimulatedMultirotor::new(0.0);
        vehicle.confirm_connection().unwrap();
        vehicle.enable_control(true).unwrap();
        vehicle.arm(true).unwrap();
        vehicle.takeoff().unwrap();
        vehicle
    }

    #[test]
    fn test_lifecycle_ordering_enforced() {
        let mut vehicle = SimulatedMultirotor::new(0.0);
        assert!(vehicle.enable_control(true).is_err());
        vehicle.confirm_connection().unwrap();
        assert!(vehicle.arm(true).is_err());
        vehicle.enable_control(true).unwrap();
        assert!(vehicle.takeoff().is_err());
        vehicle.arm(true).unwrap();
        assert!(vehicle.move_to_position(1.0, 0.0, -5.0, 4.0).is_err());
        vehicle.takeoff().unwrap();
        assert!(vehicle.move_to_position(1.0, 0.0, -5.0, 4.0).is_ok());
    }

    #[test]
    fn test_takeoff_sets_hover_altitude() {
        let vehicle = airborne_vehicle();
        assert!(vehicle.is_airborne());
        assert_eq!(vehicle.true_pose().z, TAKEOFF_ALTITUDE_M);
    }

    #[test]
    fn test_move_updates_pose_and_history() {
        let mut vehicle = airborne_vehicle();
        vehicle.move_to_position(10.0, -4.0, -12.0, 4.0).unwrap();
        assert_eq!(vehicle.true_pose(), Vector3::new(10.0, -4.0, -12.0));
        assert_eq!(vehicle.commanded_moves().len(), 1);
        assert_eq!(vehicle.commanded_moves()[0].speed, 4.0);
    }

    #[test]
    fn test_zero_speed_move_rejected() {
        let mut vehicle = airborne_vehicle();
        assert!(vehicle.move_to_position(1.0, 1.0, -5.0, 0.0).is_err());
    }

    #[test]
    fn test_collision_registered_and_cleared() {
        let mut vehicle = airborne_vehicle();
        vehicle.add_obstacle(Obstacle::new(
            "tower_ne",
            Vector3::new(9.0, 9.0, -20.0),
            Vector3::new(11.0, 11.0, 0.0),
        ));

        vehicle.move_to_position(10.0, 10.0, -5.0, 4.0).unwrap();
        let collision = vehicle.collision_state().unwrap();
        assert!(collision.has_collided);
        assert_eq!(collision.object_name, "tower_ne");
        assert_eq!(collision.position, Vector3::new(10.0, 10.0, -5.0));

        vehicle.move_to_position(0.0, 0.0, -10.0, 3.0).unwrap();
        assert!(!vehicle.collision_state().unwrap().has_collided);
    }

    #[test]
    fn test_pose_exact_without_noise() {
        let mut vehicle = airborne_vehicle();
        vehicle.move_to_position(5.0, 6.0, -7.0, 4.0).unwrap();
        assert_eq!(vehicle.current_pose().unwrap(), Vector3::new(5.0, 6.0, -7.0));
    }

    #[test]
    fn test_pose_noise_perturbs_reported_pose_only() {
        let mut vehicle = airborne_vehicle();
        vehicle.move_to_position(5.0, 6.0, -7.0, 4.0).unwrap();
        vehicle.pose_noise_std = 0.5;
        let reported = vehicle.current_pose().unwrap();
        assert_ne!(reported, vehicle.true_pose());
        assert_eq!(vehicle.true_pose(), Vector3::new(5.0, 6.0, -7.0));
    }

    #[test]
    fn test_diagnostics_collected_in_order() {
        let mut vehicle = airborne_vehicle();
        vehicle.emit_diagnostic("FAULT", "Delay: 2.00s");
        vehicle.emit_diagnostic("COLLISION", "tower_ne");
        let tags: Vec<&str> = vehicle.diagnostics().iter().map(|d| d.tag.as_str()).collect();
        assert_eq!(tags, vec!["FAULT", "COLLISION"]);
    }
}
