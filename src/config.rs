//! Race configuration.
//!
//! These are plain attribute structs; an external loader fills them in (with the
//! `serde` feature enabled they can be deserialised directly), and [RaceConfig::validate]
//! rejects anything the simulation cannot run with.

use crate::error::{non_negative, positive, within, ConfigError};
use crate::strategy::{StrategyMix, StrategyTable};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The geometry of the elliptical track.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackConfig {
    /// The semi-axis of the centre line along x, in m.
    pub radius_x: f64,
    /// The semi-axis of the centre line along y, in m.
    pub radius_y: f64,
    /// The total drivable width, in m.
    pub width: f64,
    /// The number of lanes across the width.
    pub num_lanes: usize,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            radius_x: 60.0,
            radius_y: 40.0,
            width: 12.0,
            num_lanes: 5,
        }
    }
}

/// The attributes shared by every vehicle, regardless of strategy.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleAttributes {
    /// Distance between the axles, in m.
    pub wheel_base: f64,
    /// How far ahead along the lane the steering controller aims, in m.
    pub lookahead_distance: f64,
    /// The largest steering angle, in radians.
    pub max_steering: f64,
    /// How far ahead a leading vehicle is noticed by the car following model, in m.
    pub sensing_range: f64,
}

impl Default for VehicleAttributes {
    fn default() -> Self {
        Self {
            wheel_base: 2.5,
            lookahead_distance: 8.0,
            max_steering: 30f64.to_radians(),
            sensing_range: 50.0,
        }
    }
}

/// The lane changing behaviour.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LaneChangeConfig {
    /// How much slower than our desired speed the leader must be before overtaking, in m/s.
    pub speed_threshold: f64,
    /// How close the leader must be before overtaking is considered, in m.
    pub trigger_distance: f64,
    /// The fixed part of the danger zone half-length, in m.
    pub danger_zone_base: f64,
    /// The speed dependent part of the danger zone half-length, in s.
    pub danger_zone_headway: f64,
    /// The minimum time between two lane changes of the same vehicle, in s.
    pub cooldown: f64,
}

impl Default for LaneChangeConfig {
    fn default() -> Self {
        Self {
            speed_threshold: 2.0,
            trigger_distance: 30.0,
            danger_zone_base: 5.0,
            danger_zone_headway: 0.5,
            cooldown: 2.0,
        }
    }
}

/// What happens to a vehicle once it has been eliminated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EliminatedVehicles {
    /// The vehicle disappears from the track.
    #[default]
    Removed,
    /// The vehicle stays where it stopped; others may follow it or run into it.
    StaticObstacle,
}

/// The elimination rules.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EliminationConfig {
    /// Whether collisions can eliminate vehicles at all.
    pub enabled: bool,
    /// A vehicle is eliminated when its roll of 1 to 10 is below this value.
    pub threshold: u8,
    /// How eliminated vehicles are treated.
    pub eliminated: EliminatedVehicles,
}

impl Default for EliminationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 6,
            eliminated: EliminatedVehicles::Removed,
        }
    }
}

/// The full configuration of a race.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RaceConfig {
    /// The number of cars on the grid.
    pub num_cars: usize,
    /// The number of cars starting with each strategy; must add up to `num_cars`.
    pub strategy_mix: StrategyMix,
    pub track: TrackConfig,
    pub strategies: StrategyTable,
    pub vehicle: VehicleAttributes,
    pub lane_change: LaneChangeConfig,
    pub elimination: EliminationConfig,
    /// The simulation time step, in s.
    pub dt: f64,
    /// Two vehicles closer than this distance have collided, in m.
    pub collision_radius: f64,
    /// The race is called off after this much simulated time, in s.
    pub time_limit: f64,
    /// The number of laps each car must complete.
    pub laps: u32,
    /// The longitudinal distance between grid rows, in m.
    pub grid_spacing: f64,
    /// Approaching pairs with a time-to-collision below this count as near misses, in s.
    pub near_miss_ttc: f64,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            num_cars: 10,
            strategy_mix: StrategyMix {
                aggressive: 3,
                balanced: 4,
                cautious: 3,
            },
            track: Default::default(),
            strategies: Default::default(),
            vehicle: Default::default(),
            lane_change: Default::default(),
            elimination: Default::default(),
            dt: 0.05,
            collision_radius: 2.0,
            time_limit: 300.0,
            laps: 3,
            grid_spacing: 8.0,
            near_miss_ttc: 2.0,
        }
    }
}

impl RaceConfig {
    /// Checks every value against the constraints of the simulation.
    /// The track geometry itself is checked when the track is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_cars == 0 {
            return Err(ConfigError::NoCars);
        }
        if self.strategy_mix.total() != self.num_cars {
            return Err(ConfigError::StrategyMix {
                assigned: self.strategy_mix.total(),
                num_cars: self.num_cars,
            });
        }
        self.strategies.validate()?;

        positive("wheel_base", self.vehicle.wheel_base)?;
        positive("lookahead_distance", self.vehicle.lookahead_distance)?;
        within(
            "max_steering",
            self.vehicle.max_steering,
            0.0,
            std::f64::consts::FRAC_PI_2,
        )?;
        non_negative("sensing_range", self.vehicle.sensing_range)?;

        non_negative("speed_threshold", self.lane_change.speed_threshold)?;
        non_negative("trigger_distance", self.lane_change.trigger_distance)?;
        non_negative("danger_zone_base", self.lane_change.danger_zone_base)?;
        non_negative("danger_zone_headway", self.lane_change.danger_zone_headway)?;
        non_negative("cooldown", self.lane_change.cooldown)?;

        if self.elimination.threshold > 11 {
            return Err(ConfigError::EliminationThreshold(self.elimination.threshold));
        }

        positive("dt", self.dt)?;
        positive("collision_radius", self.collision_radius)?;
        positive("time_limit", self.time_limit)?;
        within("laps", self.laps as f64, 1.0, f64::from(u32::MAX))?;
        positive("grid_spacing", self.grid_spacing)?;
        non_negative("near_miss_ttc", self.near_miss_ttc)?;
        Ok(())
    }

    /// The number of grid rows needed to line up every car.
    pub fn grid_rows(&self) -> usize {
        let lanes = self.track.num_lanes.max(1);
        (self.num_cars + lanes - 1) / lanes
    }
}
