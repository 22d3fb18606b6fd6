use crate::collision::{
    count_near_misses, detect_collisions, roll_elimination, CollisionEvent, Collisions,
};
use crate::config::RaceConfig;
use crate::error::{non_negative, ConfigError};
use crate::lane_change::{choose_lane, LaneChangeRequest};
use crate::snapshot::Snapshot;
use crate::strategy::Strategy;
use crate::telemetry::{TelemetryRecord, TelemetrySink};
use crate::track::Track;
use crate::vehicle::{EliminationReason, Vehicle};
use crate::{VehicleId, VehicleSet};
use log::{debug, info};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The stream used for the starting grid and elimination rolls.
const RACE_STREAM: u64 = 0;

/// The stream used for strategy transitions.
const MARKOV_STREAM: u64 = 1;

/// The stream used for desired speed jitter.
const JITTER_STREAM: u64 = 2;

/// Time comparisons are made with this tolerance, in s.
const TIME_EPSILON: f64 = 1e-9;

/// The state of a race.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RaceStatus {
    Running,
    /// Every vehicle has finished or been eliminated.
    Finished,
    /// The time limit was reached first.
    TimedOut,
    /// The race was stopped from outside.
    Aborted,
}

/// An entry in the elimination log.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EliminationRecord {
    pub time: f64,
    pub vehicle: VehicleId,
    pub reason: EliminationReason,
}

/// Everything about a single race: the track, the cars and the random streams.
///
/// A race is advanced by a driver, either [Simulation](crate::Simulation) or
/// [DiscreteEventSimulation](crate::DiscreteEventSimulation); both use the same
/// per-step primitives defined here.
#[derive(Clone, Debug)]
pub struct Race {
    config: RaceConfig,
    track: Track,
    vehicles: VehicleSet,
    seed: u64,
    /// The current simulated time in s.
    time: f64,
    status: RaceStatus,
    /// Grid placement and elimination rolls.
    rng: ChaCha8Rng,
    /// Strategy transitions.
    markov_rng: ChaCha8Rng,
    /// The vehicles as they were at the start of the current step.
    snapshot: Snapshot,
    /// The vehicles which moved during the current step.
    participants: Vec<VehicleId>,
    collision_log: Vec<CollisionEvent>,
    elimination_log: Vec<EliminationRecord>,
    near_misses: u32,
}

impl Race {
    /// Creates a race with the strategies of the configured mix shuffled onto the grid.
    pub fn new(config: RaceConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut rng = Self::stream(seed, RACE_STREAM);
        let mut strategies = config.strategy_mix.expand();
        strategies.shuffle(&mut rng);
        Self::build(config, seed, rng, &strategies)
    }

    /// Creates a race with the given strategies lined up on the grid, front to back.
    /// The strategy mix of the configuration is replaced by these strategies.
    pub fn with_grid(
        mut config: RaceConfig,
        seed: u64,
        strategies: &[Strategy],
    ) -> Result<Self, ConfigError> {
        config.num_cars = strategies.len();
        config.strategy_mix = Default::default();
        for strategy in strategies {
            match strategy {
                Strategy::Aggressive => config.strategy_mix.aggressive += 1,
                Strategy::Balanced => config.strategy_mix.balanced += 1,
                Strategy::Cautious => config.strategy_mix.cautious += 1,
            }
        }
        config.validate()?;
        let rng = Self::stream(seed, RACE_STREAM);
        Self::build(config, seed, rng, strategies)
    }

    fn stream(seed: u64, stream: u64) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(stream);
        rng
    }

    fn build(
        config: RaceConfig,
        seed: u64,
        rng: ChaCha8Rng,
        strategies: &[Strategy],
    ) -> Result<Self, ConfigError> {
        let track = Track::new(&config.track)?;
        let lanes = track.num_lanes();
        let rows = config.grid_rows();
        let spacing = config.grid_spacing;

        // Rows are staggered across the lanes; the front row is furthest along.
        let mut vehicles = VehicleSet::with_key();
        for (number, strategy) in strategies.iter().enumerate() {
            let lane = number % lanes;
            let row = number / lanes;
            let s = (rows - 1 - row) as f64 * spacing + lane as f64 * spacing / lanes as f64;
            vehicles.insert_with_key(|id| Vehicle::new(id, number, *strategy, lane, s, &track));
        }
        debug!(
            "race seeded {} with {} cars on a {:.1} m track",
            seed,
            vehicles.len(),
            track.length()
        );

        Ok(Self {
            config,
            track,
            vehicles,
            seed,
            time: 0.0,
            status: RaceStatus::Running,
            rng,
            markov_rng: Self::stream(seed, MARKOV_STREAM),
            snapshot: Default::default(),
            participants: vec![],
            collision_log: vec![],
            elimination_log: vec![],
            near_misses: 0,
        })
    }

    /// Randomly assigns a desired speed adjustment factor to each vehicle,
    /// sampled from a normal distribution with a mean of 1 (no adjustment) and
    /// standard deviation of `stddev`, clamped to within `range` of 1.
    ///
    /// The factors come from their own stream, so the race itself is unaffected.
    pub fn randomise_velocity_adjusts(
        &mut self,
        stddev: f64,
        range: f64,
    ) -> Result<(), ConfigError> {
        let stddev = non_negative("speed_jitter", stddev)?;
        let range = non_negative("speed_jitter_range", range)?;
        let distr = Normal::new(1.0, stddev).map_err(|_| ConfigError::Negative {
            field: "speed_jitter",
            value: stddev,
        })?;
        let mut rng = Self::stream(self.seed, JITTER_STREAM);
        for vehicle in self.vehicles.values_mut() {
            let factor = distr.sample(&mut rng).clamp(1.0 - range, 1.0 + range);
            vehicle.set_velocity_adjust(factor);
        }
        Ok(())
    }

    /// Assigns one desired speed adjustment factor to the whole field, drawn
    /// uniformly from within `range` of 1.
    pub fn scale_velocity_adjusts(&mut self, range: f64) -> Result<(), ConfigError> {
        let range = non_negative("speed_jitter_range", range)?;
        let mut rng = Self::stream(self.seed, JITTER_STREAM);
        let factor = rng.gen_range(1.0 - range..=1.0 + range);
        debug!("field speed factor {:.3}", factor);
        for vehicle in self.vehicles.values_mut() {
            vehicle.set_velocity_adjust(factor);
        }
        Ok(())
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    /// Gets the seed the race was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Gets the current simulated time in s.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn status(&self) -> RaceStatus {
        self.status
    }

    /// Whether the race still has work to do.
    pub fn is_running(&self) -> bool {
        self.status == RaceStatus::Running
    }

    /// Returns an iterator over all the vehicles, in grid order.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn get_vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    /// Gets the IDs of the vehicles still racing.
    pub fn active_vehicles(&self) -> Vec<VehicleId> {
        self.vehicles
            .iter()
            .filter(|(_, veh)| veh.is_active())
            .map(|(id, _)| id)
            .collect()
    }

    /// Gets every collision so far, in detection order.
    pub fn collision_log(&self) -> &[CollisionEvent] {
        &self.collision_log
    }

    /// Gets every elimination so far.
    pub fn elimination_log(&self) -> &[EliminationRecord] {
        &self.elimination_log
    }

    /// Gets the number of near misses counted so far.
    pub fn near_misses(&self) -> u32 {
        self.near_misses
    }

    /// Begins a step: freezes the current vehicle states and clears the collision flags.
    pub(crate) fn begin_step(&mut self) {
        self.snapshot = Snapshot::capture(&self.vehicles, self.config.elimination.eliminated);
        self.participants.clear();
        for vehicle in self.vehicles.values_mut() {
            vehicle.clear_collided();
        }
    }

    /// Runs the controller and physics for one vehicle.
    ///
    /// # Parameters
    /// * `id` - The vehicle to update; inactive vehicles are ignored
    /// * `dt` - The length of the step in s
    /// * `now` - The simulated time at the end of the step
    pub(crate) fn update_vehicle(&mut self, id: VehicleId, dt: f64, now: f64) {
        let vehicle = match self.vehicles.get(id) {
            Some(vehicle) if vehicle.is_active() => vehicle,
            _ => return,
        };
        let leader = self.snapshot.leader(
            &self.track,
            id,
            vehicle.lane(),
            vehicle.s(),
            self.config.vehicle.sensing_range,
        );
        let control = vehicle.control(
            &self.track,
            leader,
            self.config.strategies.get(vehicle.strategy()),
            &self.config.vehicle,
            self.config.collision_radius,
        );
        self.vehicles[id].advance(
            control,
            self.config.vehicle.wheel_base,
            dt,
            now,
            &self.track,
            self.config.laps,
        );
        self.participants.push(id);
    }

    /// Whether a vehicle is allowed to consider changing lanes.
    pub(crate) fn lane_change_ready(&self, id: VehicleId) -> bool {
        self.vehicles
            .get(id)
            .map_or(false, |veh| veh.is_active() && veh.lane_cooldown() <= 0.0)
    }

    /// Runs the lane change policy for one vehicle.
    pub(crate) fn decide_lane_change(&mut self, id: VehicleId) {
        if !self.lane_change_ready(id) {
            return;
        }
        let vehicle = &self.vehicles[id];
        let params = self.config.strategies.get(vehicle.strategy());
        let request = LaneChangeRequest {
            id,
            lane: vehicle.lane(),
            s: vehicle.s(),
            speed: vehicle.speed(),
            desired_speed: vehicle.acceleration_model(params).desired_speed(),
        };
        let config = &self.config.lane_change;
        if let Some(lane) = choose_lane(&request, &self.snapshot, &self.track, config) {
            self.vehicles[id].change_lane(lane, config.cooldown);
            self.snapshot.claim_lane(id, lane);
        }
    }

    /// Checks for collisions among the vehicles which moved since the last check,
    /// and counts near misses.
    pub(crate) fn check_collisions(&mut self, now: f64) -> Collisions {
        let collisions = detect_collisions(
            &mut self.vehicles,
            self.config.collision_radius,
            self.config.elimination.eliminated,
            now,
        );
        for vehicle in self.vehicles.values_mut() {
            vehicle.clear_updated();
        }
        self.near_misses += count_near_misses(&self.vehicles, self.config.near_miss_ttc);
        self.collision_log.extend(collisions.iter().cloned());
        collisions
    }

    /// Gets the active parties of a collision, in order.
    pub(crate) fn active_parties<'a>(
        &'a self,
        collision: &'a CollisionEvent,
    ) -> impl Iterator<Item = VehicleId> + 'a {
        collision
            .vehicles
            .iter()
            .copied()
            .filter(move |id| self.vehicles.get(*id).map_or(false, |veh| veh.is_active()))
    }

    /// Rolls for the elimination of every active party to the given collisions,
    /// in detection order.
    pub(crate) fn roll_eliminations(&mut self, collisions: &Collisions, now: f64) {
        for collision in collisions {
            for id in collision.vehicles {
                self.roll_for(id, now);
            }
        }
    }

    /// Rolls for the elimination of one vehicle after a collision.
    /// Nothing is drawn when elimination is disabled or the vehicle is already out.
    pub(crate) fn roll_for(&mut self, id: VehicleId, now: f64) {
        let rules = self.config.elimination;
        if !rules.enabled || !self.vehicles.get(id).map_or(false, |veh| veh.is_active()) {
            return;
        }
        if roll_elimination(&mut self.rng, rules.threshold) {
            self.eliminate(id, now, EliminationReason::Collision);
        }
    }

    /// Takes a vehicle out of the race.
    pub(crate) fn eliminate(&mut self, id: VehicleId, now: f64, reason: EliminationReason) {
        if let Some(vehicle) = self.vehicles.get_mut(id) {
            if vehicle.is_active() {
                vehicle.eliminate(now, reason);
                self.elimination_log.push(EliminationRecord {
                    time: now,
                    vehicle: id,
                    reason,
                });
            }
        }
    }

    /// Ends a step: advances the clock, records telemetry for every vehicle which
    /// moved, then checks whether the race is over.
    pub(crate) fn end_step(&mut self, now: f64, sink: &mut impl TelemetrySink) {
        self.time = now;
        for id in &self.participants {
            sink.record(TelemetryRecord::of(now, &self.vehicles[*id]));
        }
        self.update_status();
    }

    fn update_status(&mut self) {
        if self.status != RaceStatus::Running {
            return;
        }
        if self.vehicles.values().all(|veh| veh.is_done()) {
            self.status = RaceStatus::Finished;
        } else if self.time >= self.config.time_limit - TIME_EPSILON {
            self.status = RaceStatus::TimedOut;
        } else {
            return;
        }
        info!(
            "race {:?} at t={:.2}s with {} collisions",
            self.status,
            self.time,
            self.collision_log.len()
        );
    }

    /// Stops a running race.
    pub(crate) fn abort(&mut self) {
        if self.status == RaceStatus::Running {
            self.status = RaceStatus::Aborted;
            info!("race aborted at t={:.2}s", self.time);
        }
    }

    pub(crate) fn vehicle_mut(&mut self, id: VehicleId) -> Option<&mut Vehicle> {
        self.vehicles.get_mut(id)
    }

    pub(crate) fn markov_rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.markov_rng
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::strategy::StrategyMix;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn grid_is_staggered() {
        let race = Race::new(RaceConfig::default(), 1).unwrap();
        let cars = race.iter_vehicles().collect::<Vec<_>>();
        assert_eq!(cars.len(), 10);

        // Two rows of five; the front row starts one grid spacing ahead
        assert_eq!(cars[0].lane(), 0);
        assert_approx_eq!(cars[0].s(), 8.0, 0.01);
        assert_eq!(cars[4].lane(), 4);
        assert_approx_eq!(cars[4].s(), 8.0 + 4.0 * 1.6, 0.01);
        assert_eq!(cars[5].lane(), 0);
        assert_approx_eq!(cars[5].s(), 0.0, 0.01);
        assert!(cars.iter().all(|veh| veh.speed() == 0.0 && veh.is_active()));
    }

    #[test]
    fn strategies_follow_the_mix() {
        let race = Race::new(RaceConfig::default(), 99).unwrap();
        let count = |strategy| {
            race.iter_vehicles()
                .filter(|veh| veh.strategy() == strategy)
                .count()
        };
        assert_eq!(count(Strategy::Aggressive), 3);
        assert_eq!(count(Strategy::Balanced), 4);
        assert_eq!(count(Strategy::Cautious), 3);
    }

    #[test]
    fn explicit_grid_keeps_order() {
        let grid = [Strategy::Cautious, Strategy::Aggressive, Strategy::Cautious];
        let race = Race::with_grid(RaceConfig::default(), 5, &grid).unwrap();
        let strategies = race.iter_vehicles().map(|veh| veh.strategy()).collect::<Vec<_>>();
        assert_eq!(strategies, grid);
        assert_eq!(
            race.config().strategy_mix,
            StrategyMix {
                aggressive: 1,
                balanced: 0,
                cautious: 2
            }
        );
    }

    #[test]
    fn rejects_invalid_config() {
        let config = RaceConfig {
            dt: 0.0,
            ..Default::default()
        };
        assert!(Race::new(config, 0).is_err());
        assert_eq!(
            Race::with_grid(RaceConfig::default(), 0, &[]).unwrap_err(),
            ConfigError::NoCars
        );
    }

    #[test]
    fn jitter_is_reproducible_and_bounded() {
        let mut a = Race::new(RaceConfig::default(), 3).unwrap();
        let mut b = Race::new(RaceConfig::default(), 3).unwrap();
        a.randomise_velocity_adjusts(0.2, 0.1).unwrap();
        b.randomise_velocity_adjusts(0.2, 0.1).unwrap();
        for (va, vb) in a.iter_vehicles().zip(b.iter_vehicles()) {
            assert_eq!(va.velocity_adjust(), vb.velocity_adjust());
            assert!((0.9..=1.1).contains(&va.velocity_adjust()));
        }
        assert!(a.randomise_velocity_adjusts(-1.0, 0.1).is_err());
    }

    #[test]
    fn field_jitter_shares_one_factor() {
        let mut race = Race::new(RaceConfig::default(), 11).unwrap();
        race.scale_velocity_adjusts(0.1).unwrap();
        let factors = race
            .iter_vehicles()
            .map(|veh| veh.velocity_adjust())
            .collect::<Vec<_>>();
        assert!((0.9..=1.1).contains(&factors[0]));
        assert!(factors.iter().all(|f| *f == factors[0]));

        let mut again = Race::new(RaceConfig::default(), 11).unwrap();
        again.scale_velocity_adjusts(0.1).unwrap();
        assert_eq!(again.iter_vehicles().next().unwrap().velocity_adjust(), factors[0]);
        assert!(race.scale_velocity_adjusts(-0.1).is_err());
    }

    #[test]
    fn lane_changes_in_one_step_never_share_a_gap() {
        let mut race = Race::with_grid(RaceConfig::default(), 0, &[Strategy::Balanced; 6]).unwrap();
        race.vehicles.clear();
        // Two cars stuck behind stalled leaders either side of an empty lane 2,
        // with the outer lanes blocked alongside them
        let mut ids = vec![];
        for (number, (lane, s, speed)) in [
            (1, 100.0, 10.0),
            (3, 100.0, 10.0),
            (1, 110.0, 0.0),
            (3, 110.0, 0.0),
            (0, 100.0, 10.0),
            (4, 100.0, 10.0),
        ]
        .into_iter()
        .enumerate()
        {
            ids.push(race.vehicles.insert_with_key(|id| {
                Vehicle::new(id, number, Strategy::Balanced, lane, s, &race.track)
                    .with_speed(speed)
            }));
        }

        race.begin_step();
        race.decide_lane_change(ids[0]);
        race.decide_lane_change(ids[1]);
        assert_eq!(race.vehicles[ids[0]].lane(), 2);
        assert_eq!(race.vehicles[ids[1]].lane(), 3);

        // The claim only lasts for the step it was made in
        race.begin_step();
        assert_eq!(race.snapshot.occupants(2, ids[1]).count(), 1);
    }
}
