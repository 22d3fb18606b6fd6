//! Strategy adaptation modelled as a Markov chain.
//!
//! Every review, each racing car samples its next state from a row of the
//! [TransitionTable] chosen by its current strategy and how well it has been
//! doing. The eliminated state is absorbing.

use crate::config::RaceConfig;
use crate::error::ConfigError;
use crate::race::Race;
use crate::simulation::{RaceDriver, StopSignal};
use crate::strategy::Strategy;
use crate::telemetry::{RaceSummary, TelemetrySink};
use crate::vehicle::{EliminationReason, Vehicle};
use crate::VehicleId;
use log::debug;
use rand::distributions::{Distribution, WeightedIndex};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How well a car has been racing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Bucket {
    /// Colliding often.
    Struggling,
    Neutral,
    /// Clean and close to its desired speed.
    Strong,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Struggling, Bucket::Neutral, Bucket::Strong];

    fn index(self) -> usize {
        match self {
            Bucket::Struggling => 0,
            Bucket::Neutral => 1,
            Bucket::Strong => 2,
        }
    }
}

/// The state a car moves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MarkovState {
    Racing(Strategy),
    Eliminated,
}

impl MarkovState {
    /// The states in the column order of a transition row.
    pub const ALL: [MarkovState; 4] = [
        MarkovState::Racing(Strategy::Aggressive),
        MarkovState::Racing(Strategy::Balanced),
        MarkovState::Racing(Strategy::Cautious),
        MarkovState::Eliminated,
    ];
}

/// A probability row: aggressive, balanced, cautious, eliminated.
pub type TransitionRow = [f64; 4];

/// The baseline transition rows, before performance adjustments.
const BASE_ROWS: [TransitionRow; 3] = [
    [0.70, 0.20, 0.05, 0.05],
    [0.10, 0.80, 0.08, 0.02],
    [0.05, 0.15, 0.75, 0.05],
];

/// The transition probabilities for every (strategy, bucket) pair.
#[derive(Clone, Debug)]
pub struct TransitionTable {
    /// Indexed by `3 * strategy + bucket`.
    rows: Vec<TransitionRow>,
    samplers: Vec<WeightedIndex<f64>>,
    /// Samplers over the racing states only; missing for rows which always eliminate.
    racing_samplers: Vec<Option<WeightedIndex<f64>>>,
}

impl TransitionTable {
    /// Creates a table from `rows[strategy][bucket]`, normalising each row.
    pub fn new(rows: [[TransitionRow; 3]; 3]) -> Result<Self, ConfigError> {
        let mut table = Self {
            rows: Vec::with_capacity(9),
            samplers: Vec::with_capacity(9),
            racing_samplers: Vec::with_capacity(9),
        };
        for strategy in Strategy::ALL {
            for bucket in Bucket::ALL {
                let row = rows[strategy.index()][bucket.index()];
                let err = || ConfigError::TransitionRow {
                    row: format!("{} / {:?}", strategy, bucket),
                };
                let sum = row.iter().sum::<f64>();
                if row.iter().any(|p| !p.is_finite() || *p < 0.0) || !(sum > 0.0) {
                    return Err(err());
                }
                let sampler = WeightedIndex::new(row).map_err(|_| err())?;
                table.rows.push(row.map(|p| p / sum));
                table.samplers.push(sampler);
                table.racing_samplers.push(WeightedIndex::new(&row[..3]).ok());
            }
        }
        Ok(table)
    }

    /// Builds a table by adjusting a base row per strategy for each bucket: struggling
    /// cars lean towards caution and elimination, strong cars towards aggression.
    pub fn from_base(base: [TransitionRow; 3]) -> Result<Self, ConfigError> {
        let rows = base.map(|[aggressive, balanced, cautious, eliminated]| {
            let struggling = [
                (aggressive * 0.5).max(0.0),
                balanced,
                (cautious * 2.0).min(0.4),
                (eliminated * 2.0).min(0.3),
            ];
            let neutral = [aggressive, balanced, cautious, eliminated];
            let strong = [
                (aggressive * 1.5).min(0.3),
                balanced,
                cautious,
                (eliminated * 0.5).max(0.0),
            ];
            [struggling, neutral, strong]
        });
        Self::new(rows)
    }

    /// Gets the normalised probabilities for a strategy and bucket.
    pub fn row(&self, strategy: Strategy, bucket: Bucket) -> &TransitionRow {
        &self.rows[3 * strategy.index() + bucket.index()]
    }

    /// Samples the next state.
    ///
    /// Without `allow_elimination` the eliminated column is ignored and the remaining
    /// weights renormalised; a row with no racing weight keeps the current strategy.
    pub fn sample(
        &self,
        strategy: Strategy,
        bucket: Bucket,
        allow_elimination: bool,
        rng: &mut impl rand::Rng,
    ) -> MarkovState {
        let index = 3 * strategy.index() + bucket.index();
        if allow_elimination {
            MarkovState::ALL[self.samplers[index].sample(rng)]
        } else {
            match &self.racing_samplers[index] {
                Some(sampler) => MarkovState::ALL[sampler.sample(rng)],
                None => MarkovState::Racing(strategy),
            }
        }
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        match Self::from_base(BASE_ROWS) {
            Ok(table) => table,
            Err(err) => unreachable!("built-in transition rows are valid: {}", err),
        }
    }
}

/// The limits between performance buckets.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PerformanceThresholds {
    /// More collisions per lap than this is struggling.
    pub high_collision_rate: f64,
    /// Fewer collisions per lap than this may be strong.
    pub low_collision_rate: f64,
    /// Strong cars average more than this fraction of their desired speed.
    pub speed_ratio: f64,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            high_collision_rate: 0.5,
            low_collision_rate: 0.1,
            speed_ratio: 0.9,
        }
    }
}

impl PerformanceThresholds {
    /// Places a car in a bucket by its collisions per lap and average speed.
    pub fn classify(&self, vehicle: &Vehicle, desired_speed: f64) -> Bucket {
        let rate = vehicle.collisions() as f64 / vehicle.laps().max(1) as f64;
        if rate > self.high_collision_rate {
            Bucket::Struggling
        } else if rate < self.low_collision_rate
            && vehicle.average_speed() > self.speed_ratio * desired_speed
        {
            Bucket::Strong
        } else {
            Bucket::Neutral
        }
    }
}

/// When strategies are reviewed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ReviewSchedule {
    /// Only once a race is over, before the next one.
    BetweenRaces,
    /// Every `n` driver steps during a race, as well as between races.
    EveryTicks(usize),
}

/// A recorded change of state.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StrategyTransition {
    /// The epoch in which the review happened.
    pub epoch: usize,
    /// The simulated time of the review, in s.
    pub time: f64,
    pub vehicle: VehicleId,
    /// The car's grid number in that epoch.
    pub number: usize,
    pub bucket: Bucket,
    pub from: Strategy,
    pub to: MarkovState,
}

/// The races run by [MarkovChain::run_epochs].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EpochReport {
    pub summaries: Vec<RaceSummary>,
    pub transitions: Vec<StrategyTransition>,
    /// The strategies of the cars still racing after the final review.
    pub survivors: Vec<Strategy>,
}

/// Adapts car strategies between and during races.
#[derive(Clone, Debug)]
pub struct MarkovChain {
    table: TransitionTable,
    thresholds: PerformanceThresholds,
    schedule: ReviewSchedule,
    epoch: usize,
    history: Vec<StrategyTransition>,
}

impl MarkovChain {
    pub fn new(
        table: TransitionTable,
        thresholds: PerformanceThresholds,
        schedule: ReviewSchedule,
    ) -> Result<Self, ConfigError> {
        if schedule == ReviewSchedule::EveryTicks(0) {
            return Err(ConfigError::NotPositive {
                field: "review_ticks",
                value: 0.0,
            });
        }
        Ok(Self {
            table,
            thresholds,
            schedule,
            epoch: 0,
            history: vec![],
        })
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// Gets every change of state recorded so far.
    pub fn history(&self) -> &[StrategyTransition] {
        &self.history
    }

    /// Reviews the strategy of every car still racing, returning the number of changes.
    /// Cars are only eliminated by a review when the race has elimination enabled.
    pub fn review(&mut self, race: &mut Race) -> usize {
        let time = race.time();
        let allow_elimination = race.config().elimination.enabled;
        let mut changes = 0;
        for id in race.active_vehicles() {
            let (from, bucket, number) = match race.get_vehicle(id) {
                Some(vehicle) => {
                    let params = race.config().strategies.get(vehicle.strategy());
                    let desired_speed = vehicle.acceleration_model(params).desired_speed();
                    let bucket = self.thresholds.classify(vehicle, desired_speed);
                    (vehicle.strategy(), bucket, vehicle.number())
                }
                None => continue,
            };
            let to = self
                .table
                .sample(from, bucket, allow_elimination, race.markov_rng());
            match to {
                MarkovState::Racing(strategy) if strategy == from => continue,
                MarkovState::Racing(strategy) => {
                    if let Some(vehicle) = race.vehicle_mut(id) {
                        vehicle.set_strategy(strategy);
                    }
                }
                MarkovState::Eliminated => {
                    race.eliminate(id, time, EliminationReason::StrategyTransition);
                }
            }
            debug!("car {} ({:?}): {} -> {:?}", number, bucket, from, to);
            self.history.push(StrategyTransition {
                epoch: self.epoch,
                time,
                vehicle: id,
                number,
                bucket,
                from,
                to,
            });
            changes += 1;
        }
        changes
    }

    /// Runs a race to completion, reviewing strategies on the configured schedule.
    pub fn run_race<D: RaceDriver>(
        &mut self,
        driver: &mut D,
        sink: &mut impl TelemetrySink,
        stop: &StopSignal,
    ) {
        let every = match self.schedule {
            ReviewSchedule::BetweenRaces => {
                driver.run(sink, stop);
                return;
            }
            ReviewSchedule::EveryTicks(n) => n,
        };
        let mut ticks = 0;
        while driver.race().is_running() {
            if stop.is_stopped() {
                driver.race_mut().abort();
                break;
            }
            driver.step(sink);
            ticks += 1;
            if ticks % every == 0 && driver.race().is_running() {
                self.review(driver.race_mut());
            }
        }
    }

    /// Runs a series of races. Each race after the first is seeded with `seed + epoch`
    /// and lines up the cars which survived the previous race and its review, in their
    /// previous grid order, with their reviewed strategies.
    pub fn run_epochs<D: RaceDriver>(
        &mut self,
        config: &RaceConfig,
        seed: u64,
        epochs: usize,
        stop: &StopSignal,
    ) -> Result<EpochReport, ConfigError> {
        let mut summaries = vec![];
        let first = self.history.len();
        let mut race = Race::new(config.clone(), seed)?;
        let mut survivors = vec![];

        for epoch in 0..epochs {
            self.epoch = epoch;
            let mut driver = D::new(race);
            self.run_race(&mut driver, &mut (), stop);
            let mut finished = driver.into_race();
            self.review(&mut finished);
            summaries.push(RaceSummary::of(&finished));

            survivors = finished
                .iter_vehicles()
                .filter(|veh| veh.is_active())
                .map(|veh| veh.strategy())
                .collect::<Vec<_>>();
            if survivors.is_empty() || stop.is_stopped() || epoch + 1 == epochs {
                break;
            }
            let next_seed = seed.wrapping_add(epoch as u64 + 1);
            race = Race::with_grid(config.clone(), next_seed, &survivors)?;
        }

        Ok(EpochReport {
            summaries,
            transitions: self.history[first..].to_vec(),
            survivors,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::RaceConfig;
    use crate::simulation::Simulation;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn default_rows_are_normalised() {
        let table = TransitionTable::default();
        for strategy in Strategy::ALL {
            for bucket in Bucket::ALL {
                assert_approx_eq!(table.row(strategy, bucket).iter().sum::<f64>(), 1.0);
            }
        }
        assert_eq!(table.row(Strategy::Balanced, Bucket::Neutral), &BASE_ROWS[1]);
    }

    #[test]
    fn struggling_cars_lean_towards_elimination() {
        let table = TransitionTable::default();
        let neutral = table.row(Strategy::Aggressive, Bucket::Neutral);
        let struggling = table.row(Strategy::Aggressive, Bucket::Struggling);
        let strong = table.row(Strategy::Aggressive, Bucket::Strong);
        assert!(struggling[3] > neutral[3]);
        assert!(struggling[0] < neutral[0]);
        assert!(strong[3] < neutral[3]);
    }

    #[test]
    fn rejects_bad_rows() {
        let mut rows = [[[0.25; 4]; 3]; 3];
        assert!(TransitionTable::new(rows).is_ok());
        rows[1][2] = [0.0; 4];
        assert!(matches!(
            TransitionTable::new(rows),
            Err(ConfigError::TransitionRow { .. })
        ));
        rows[1][2] = [0.5, -0.1, 0.3, 0.3];
        assert!(TransitionTable::new(rows).is_err());
    }

    #[test]
    fn sampling_follows_the_row() {
        let mut rows = [[[0.0, 1.0, 0.0, 0.0]; 3]; 3];
        rows[0][0] = [0.0, 0.0, 0.0, 1.0];
        let table = TransitionTable::new(rows).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..20 {
            assert_eq!(
                table.sample(Strategy::Cautious, Bucket::Strong, true, &mut rng),
                MarkovState::Racing(Strategy::Balanced)
            );
            assert_eq!(
                table.sample(Strategy::Aggressive, Bucket::Struggling, true, &mut rng),
                MarkovState::Eliminated
            );
            assert_eq!(
                table.sample(Strategy::Aggressive, Bucket::Struggling, false, &mut rng),
                MarkovState::Racing(Strategy::Aggressive)
            );
        }
    }

    #[test]
    fn eliminated_is_absorbing() {
        // Every review eliminates every car
        let rows = [[[0.0, 0.0, 0.0, 1.0]; 3]; 3];
        let table = TransitionTable::new(rows).unwrap();
        let mut chain = MarkovChain::new(
            table,
            Default::default(),
            ReviewSchedule::EveryTicks(10),
        )
        .unwrap();
        let mut race = Race::new(RaceConfig::default(), 8).unwrap();
        assert_eq!(chain.review(&mut race), 10);
        assert_eq!(chain.review(&mut race), 0);
        assert!(race.iter_vehicles().all(|veh| !veh.is_active()));
        assert!(chain
            .history()
            .iter()
            .all(|t| t.to == MarkovState::Eliminated));
    }

    #[test]
    fn epochs_drop_eliminated_cars() {
        let rows = [[[0.0, 0.0, 0.0, 1.0]; 3]; 3];
        let table = TransitionTable::new(rows).unwrap();
        let mut chain =
            MarkovChain::new(table, Default::default(), ReviewSchedule::BetweenRaces).unwrap();
        let config = RaceConfig {
            time_limit: 1.0,
            ..Default::default()
        };
        let report = chain
            .run_epochs::<Simulation>(&config, 3, 5, &StopSignal::new())
            .unwrap();
        assert_eq!(report.summaries.len(), 1);
        assert!(report.survivors.is_empty());
        assert_eq!(report.transitions.len(), 10);
    }

    #[test]
    fn reviews_never_eliminate_when_elimination_is_disabled() {
        let mut rows = [[[0.0, 0.0, 0.0, 1.0]; 3]; 3];
        rows[Strategy::Balanced.index()] = [[0.0, 1.0, 1.0, 8.0]; 3];
        let table = TransitionTable::new(rows).unwrap();
        let mut chain =
            MarkovChain::new(table, Default::default(), ReviewSchedule::BetweenRaces).unwrap();
        let mut config = RaceConfig::default();
        config.elimination.enabled = false;
        let mut race = Race::new(config, 8).unwrap();
        for _ in 0..5 {
            chain.review(&mut race);
        }
        assert!(race.iter_vehicles().all(|veh| veh.is_active()));
        assert!(race.elimination_log().is_empty());
        assert!(chain.history().iter().all(|t| t.to != MarkovState::Eliminated));
        // Balanced cars can still move to cautious; the other rows only eliminate
        assert!(!chain.history().is_empty());
        assert!(chain.history().iter().all(|t| t.from == Strategy::Balanced
            && t.to == MarkovState::Racing(Strategy::Cautious)));
    }

    #[test]
    fn zero_review_interval_is_rejected() {
        let result = MarkovChain::new(
            Default::default(),
            Default::default(),
            ReviewSchedule::EveryTicks(0),
        );
        assert!(result.is_err());
    }
}
