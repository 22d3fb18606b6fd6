use self::acceleration::AccelerationModel;
use self::dynamics::bicycle_step;
use self::steering::PurePursuit;
use crate::config::VehicleAttributes;
use crate::math::{heading_vector, Point2d, Vector2d};
use crate::snapshot::Leader;
use crate::strategy::{Strategy, StrategyParams};
use crate::track::Track;
use crate::VehicleId;
use cgmath::prelude::*;
use log::{debug, trace};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod acceleration;
mod dynamics;
mod steering;

pub use self::dynamics::KinematicState as VehicleState;

/// A simulated race car.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID.
    pub(crate) id: VehicleId,
    /// The vehicle's position on the starting grid, from the front.
    number: usize,
    /// The current driving strategy.
    strategy: Strategy,
    /// The desired speed adjustment factor.
    vel_adj: f64,
    /// Position, heading and speed.
    state: VehicleState,
    /// The most recently applied acceleration in m/s<sup>2</sup>.
    acc: f64,
    /// The most recently applied steering angle in radians.
    steering: f64,
    /// The lane the vehicle is driving in.
    lane: usize,
    /// The arc length along the track, in m.
    s: f64,
    /// The number of completed laps.
    laps: u32,
    /// The time at which the current lap began, in s.
    lap_start: f64,
    /// Whether the vehicle has crossed the start line backwards.
    behind_line: bool,
    /// The time taken for each completed lap, in s.
    lap_times: Vec<f64>,
    /// The number of collisions the vehicle has been party to.
    collisions: u32,
    /// The summed severity of those collisions.
    severity: f64,
    /// Set once the vehicle is out of the race.
    elimination: Option<Elimination>,
    /// The time at which the target lap count was reached.
    finished_at: Option<f64>,
    /// The time remaining before another lane change is allowed, in s.
    lane_cooldown: f64,
    /// The distance driven in m.
    odometer: f64,
    /// The time spent driving in s.
    active_time: f64,
    /// The number of steps which ended beyond the edge of the track.
    off_track_steps: u32,
    /// Whether the vehicle collided during the current step.
    collided: bool,
    /// Whether the vehicle has moved since the last collision check.
    updated: bool,
}

/// Why and when a vehicle left the race.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Elimination {
    /// The simulated time of elimination, in s.
    pub time: f64,
    pub reason: EliminationReason,
}

/// The cause of an elimination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EliminationReason {
    /// Lost an elimination roll after a collision.
    Collision,
    /// Transitioned into the eliminated state of the strategy Markov chain.
    StrategyTransition,
}

/// The output of the vehicle controller.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Control {
    /// The longitudinal acceleration in m/s<sup>2</sup>.
    pub acc: f64,
    /// The steering angle in radians.
    pub steering: f64,
}

impl Vehicle {
    /// Creates a stationary vehicle on the centre of a lane, facing along the track.
    pub(crate) fn new(
        id: VehicleId,
        number: usize,
        strategy: Strategy,
        lane: usize,
        s: f64,
        track: &Track,
    ) -> Self {
        let sample = track.point_at(s);
        Self {
            id,
            number,
            strategy,
            vel_adj: 1.0,
            state: VehicleState {
                pos: sample.lat_offset(track.lane_center_offset(lane)),
                heading: sample.heading,
                speed: 0.0,
            },
            acc: 0.0,
            steering: 0.0,
            lane,
            s: track.wrap(s),
            laps: 0,
            lap_start: 0.0,
            behind_line: false,
            lap_times: vec![],
            collisions: 0,
            severity: 0.0,
            elimination: None,
            finished_at: None,
            lane_cooldown: 0.0,
            odometer: 0.0,
            active_time: 0.0,
            off_track_steps: 0,
            collided: false,
            updated: false,
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// Gets the vehicle's starting grid number.
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Gets the desired speed adjustment factor.
    pub fn velocity_adjust(&self) -> f64 {
        self.vel_adj
    }

    /// Gets the vehicle's position.
    pub fn position(&self) -> Point2d {
        self.state.pos
    }

    /// Gets the vehicle's heading in radians.
    pub fn heading(&self) -> f64 {
        self.state.heading
    }

    /// Gets the vehicle's speed in m/s.
    pub fn speed(&self) -> f64 {
        self.state.speed
    }

    /// Gets the vehicle's velocity vector.
    pub fn velocity(&self) -> Vector2d {
        self.state.speed * heading_vector(self.state.heading)
    }

    /// Gets the most recently applied acceleration.
    pub fn acc(&self) -> f64 {
        self.acc
    }

    /// Gets the most recently applied steering angle.
    pub fn steering(&self) -> f64 {
        self.steering
    }

    pub fn lane(&self) -> usize {
        self.lane
    }

    /// Gets the arc length along the track.
    pub fn s(&self) -> f64 {
        self.s
    }

    /// Gets the number of completed laps.
    pub fn laps(&self) -> u32 {
        self.laps
    }

    /// Gets the times of the completed laps.
    pub fn lap_times(&self) -> &[f64] {
        &self.lap_times
    }

    /// Gets the mean lap time, if any lap has been completed.
    pub fn average_lap_time(&self) -> Option<f64> {
        if self.lap_times.is_empty() {
            None
        } else {
            Some(self.lap_times.iter().sum::<f64>() / self.lap_times.len() as f64)
        }
    }

    pub fn collisions(&self) -> u32 {
        self.collisions
    }

    /// Gets the summed severity of the vehicle's collisions.
    pub fn severity(&self) -> f64 {
        self.severity
    }

    pub fn elimination(&self) -> Option<Elimination> {
        self.elimination
    }

    /// Whether the vehicle is still racing.
    pub fn is_active(&self) -> bool {
        self.elimination.is_none()
    }

    /// Gets the time at which the vehicle completed its final lap.
    pub fn finished_at(&self) -> Option<f64> {
        self.finished_at
    }

    /// Whether the vehicle is no longer being waited for.
    pub fn is_done(&self) -> bool {
        self.finished_at.is_some() || self.elimination.is_some()
    }

    /// Gets the time remaining until another lane change is allowed.
    pub fn lane_cooldown(&self) -> f64 {
        self.lane_cooldown
    }

    /// Gets the distance driven so far.
    pub fn odometer(&self) -> f64 {
        self.odometer
    }

    /// Gets the average speed while racing, or zero before the first step.
    pub fn average_speed(&self) -> f64 {
        if self.active_time > 0.0 {
            self.odometer / self.active_time
        } else {
            0.0
        }
    }

    /// Gets the number of steps the vehicle has ended off the track.
    pub fn off_track_steps(&self) -> u32 {
        self.off_track_steps
    }

    /// Whether the vehicle collided during the most recent step.
    pub fn collided(&self) -> bool {
        self.collided
    }

    pub(crate) fn updated(&self) -> bool {
        self.updated
    }

    /// Builds the acceleration model for the vehicle's current strategy.
    pub(crate) fn acceleration_model(&self, params: &StrategyParams) -> AccelerationModel {
        AccelerationModel::new(params, self.vel_adj)
    }

    /// Computes the acceleration and steering for the next step.
    ///
    /// # Parameters
    /// * `track` - The track being raced on
    /// * `leader` - The nearest vehicle ahead in the same lane, if any is within sensing range
    /// * `params` - The parameters of the vehicle's strategy
    /// * `attributes` - The attributes shared by all vehicles
    /// * `collision_radius` - Subtracted from the arc length gap to the leader
    pub(crate) fn control(
        &self,
        track: &Track,
        leader: Option<Leader>,
        params: &StrategyParams,
        attributes: &VehicleAttributes,
        collision_radius: f64,
    ) -> Control {
        let model = self.acceleration_model(params);
        let acc = match leader {
            Some(leader) => {
                model.follow_vehicle(leader.gap - collision_radius, self.speed(), leader.speed)
            }
            None => model.free_road(self.speed()),
        };

        let pursuit = PurePursuit {
            wheel_base: attributes.wheel_base,
            lookahead: attributes.lookahead_distance,
            max_steering: attributes.max_steering,
        };
        let target = track.lane_point(self.s + attributes.lookahead_distance, self.lane);
        let steering = pursuit.steer(self.position(), self.heading(), target);

        Control { acc, steering }
    }

    /// Integrates the vehicle's motion over one step, then updates its progress
    /// around the track.
    ///
    /// # Parameters
    /// * `control` - The acceleration and steering to apply
    /// * `wheel_base` - The distance between the vehicle's axles
    /// * `dt` - The length of the step in s
    /// * `now` - The simulated time at the end of the step
    /// * `track` - The track being raced on
    /// * `target_laps` - The number of laps which completes the race
    pub(crate) fn advance(
        &mut self,
        control: Control,
        wheel_base: f64,
        dt: f64,
        now: f64,
        track: &Track,
        target_laps: u32,
    ) {
        debug_assert!(self.is_active(), "eliminated vehicles never move");

        let old_pos = self.state.pos;
        self.state = bicycle_step(self.state, control.acc, control.steering, wheel_base, dt);
        self.acc = control.acc;
        self.steering = control.steering;
        self.odometer += (self.state.pos - old_pos).magnitude();
        self.active_time += dt;
        self.lane_cooldown -= dt;
        self.updated = true;

        let old_s = self.s;
        let projection = track.project(self.state.pos);
        self.s = projection.s;
        if track.lane_at(projection.lateral).is_none() {
            self.off_track_steps += 1;
            trace!(
                "car {} off track by {:.2} m",
                self.number,
                projection.lateral.abs() - track.half_width()
            );
        }
        let half_lap = 0.5 * track.length();
        if self.s < old_s - half_lap {
            if self.behind_line {
                self.behind_line = false;
            } else {
                self.complete_lap(now, target_laps);
            }
        } else if self.s > old_s + half_lap {
            // Slipped back over the line; the next crossing is not a new lap
            self.behind_line = true;
        }
    }

    fn complete_lap(&mut self, now: f64, target_laps: u32) {
        let lap_time = now - self.lap_start;
        self.laps += 1;
        self.lap_start = now;
        self.lap_times.push(lap_time);
        debug!(
            "car {} completed lap {} in {:.2}s",
            self.number, self.laps, lap_time
        );
        if self.laps >= target_laps && self.finished_at.is_none() {
            self.finished_at = Some(now);
            debug!("car {} finished at t={:.2}s", self.number, now);
        }
    }

    /// Moves the vehicle into another lane and restarts the lane change cooldown.
    pub(crate) fn change_lane(&mut self, lane: usize, cooldown: f64) {
        debug!("car {} changes lane {} -> {}", self.number, self.lane, lane);
        self.lane = lane;
        self.lane_cooldown = cooldown;
    }

    /// Records a collision with another vehicle.
    pub(crate) fn record_collision(&mut self, severity: f64) {
        debug_assert!(self.is_active(), "eliminated vehicles are passive in collisions");
        self.collisions += 1;
        self.severity += severity;
        self.collided = true;
    }

    /// Takes the vehicle out of the race; it comes to an immediate stop.
    pub(crate) fn eliminate(&mut self, time: f64, reason: EliminationReason) {
        if self.elimination.is_none() {
            debug!(
                "car {} eliminated at t={:.2}s ({:?})",
                self.number, time, reason
            );
            self.elimination = Some(Elimination { time, reason });
            self.state.speed = 0.0;
            self.acc = 0.0;
        }
    }

    /// Switches the vehicle to another driving strategy.
    pub(crate) fn set_strategy(&mut self, strategy: Strategy) {
        self.strategy = strategy;
    }

    /// Sets the desired speed adjustment factor.
    pub(crate) fn set_velocity_adjust(&mut self, factor: f64) {
        self.vel_adj = factor;
    }

    /// Clears the per-step collision flag.
    pub(crate) fn clear_collided(&mut self) {
        self.collided = false;
    }

    /// Clears the moved-since-last-check flag.
    pub(crate) fn clear_updated(&mut self) {
        self.updated = false;
    }

    #[cfg(test)]
    pub(crate) fn with_speed(mut self, speed: f64) -> Self {
        self.state.speed = speed;
        self.updated = true;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::TrackConfig;
    use crate::strategy::StrategyTable;
    use assert_approx_eq::assert_approx_eq;

    fn vehicle(track: &Track, s: f64, lane: usize) -> Vehicle {
        Vehicle::new(VehicleId::default(), 0, Strategy::Balanced, lane, s, track)
    }

    #[test]
    fn spawns_on_lane_centre() {
        let track = Track::new(&TrackConfig::default()).unwrap();
        let veh = vehicle(&track, 10.0, 2);
        assert_approx_eq!(veh.s(), 10.0, 1e-9);
        let proj = track.project(veh.position());
        assert_approx_eq!(proj.lateral, 0.0, 1e-6);
        assert_approx_eq!(veh.heading(), track.point_at(10.0).heading);
        assert!(veh.is_active());
        assert!(!veh.is_done());
    }

    #[test]
    fn counts_a_lap_when_crossing_the_line() {
        let track = Track::new(&TrackConfig::default()).unwrap();
        let mut veh = vehicle(&track, track.length() - 0.5, 2);
        veh.state.speed = 10.0;
        let control = veh.control(
            &track,
            None,
            &StrategyTable::default().balanced,
            &VehicleAttributes::default(),
            2.0,
        );
        veh.advance(control, 2.5, 0.1, 42.0, &track, 1);
        assert_eq!(veh.laps(), 1);
        assert_eq!(veh.lap_times(), &[42.0]);
        assert_eq!(veh.finished_at(), Some(42.0));
        assert!(veh.s() < 1.0);
        assert!(veh.is_done());
    }

    #[test]
    fn elimination_stops_the_vehicle() {
        let track = Track::new(&TrackConfig::default()).unwrap();
        let mut veh = vehicle(&track, 0.0, 0);
        veh.state.speed = 15.0;
        veh.record_collision(3.5);
        veh.eliminate(7.0, EliminationReason::Collision);
        veh.eliminate(9.0, EliminationReason::StrategyTransition);
        assert_eq!(veh.speed(), 0.0);
        assert_eq!(veh.collisions(), 1);
        assert_eq!(
            veh.elimination(),
            Some(Elimination {
                time: 7.0,
                reason: EliminationReason::Collision
            })
        );
    }

    #[test]
    fn counts_steps_off_the_track() {
        let track = Track::new(&TrackConfig::default()).unwrap();
        // Driving straight out of the tightest curve from the outer lane
        let mut veh = vehicle(&track, 0.0, 4);
        veh.state.speed = 20.0;
        let straight = Control {
            acc: 0.0,
            steering: 0.0,
        };
        veh.advance(straight, 2.5, 0.05, 0.05, &track, 3);
        assert_eq!(veh.off_track_steps(), 0);
        for i in 0..20 {
            veh.advance(straight, 2.5, 0.05, 0.1 + 0.05 * i as f64, &track, 3);
        }
        assert!(veh.off_track_steps() > 0);
        assert!(veh.off_track_steps() < 21);
    }
}
