pub use cgmath;
pub use collision::CollisionEvent;
pub use config::{
    EliminatedVehicles, EliminationConfig, LaneChangeConfig, RaceConfig, TrackConfig,
    VehicleAttributes,
};
pub use discrete::DiscreteEventSimulation;
pub use error::ConfigError;
pub use markov::{
    Bucket, EpochReport, MarkovChain, MarkovState, PerformanceThresholds, ReviewSchedule,
    StrategyTransition, TransitionTable,
};
pub use monte_carlo::{
    JitterScope, MonteCarlo, MonteCarloConfig, MonteCarloReport, RunMetrics, SpeedJitter,
    Statistics,
};
pub use race::{EliminationRecord, Race, RaceStatus};
pub use simulation::{RaceDriver, Simulation, StopSignal};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use strategy::{Strategy, StrategyMix, StrategyParams, StrategyTable};
pub use telemetry::{
    best_vehicle, RaceSummary, TelemetryRecord, TelemetrySink, VehicleSummary,
};
pub use track::{Projection, Track, TrackSample};
pub use util::Interval;
pub use vehicle::{Elimination, EliminationReason, Vehicle, VehicleState};

mod collision;
mod config;
mod discrete;
mod error;
mod event;
mod lane_change;
mod markov;
pub mod math;
mod monte_carlo;
mod race;
mod simulation;
mod snapshot;
mod strategy;
mod telemetry;
mod track;
mod util;
mod vehicle;

new_key_type! {
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
}

type VehicleSet = SlotMap<VehicleId, Vehicle>;
