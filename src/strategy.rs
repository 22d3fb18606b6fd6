use crate::error::{non_negative, positive, ConfigError};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// The driving style of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Strategy {
    Aggressive,
    Balanced,
    Cautious,
}

impl Strategy {
    /// All strategies, in table order.
    pub const ALL: [Strategy; 3] = [Strategy::Aggressive, Strategy::Balanced, Strategy::Cautious];

    /// The position of the strategy in [Strategy::ALL].
    pub fn index(self) -> usize {
        match self {
            Strategy::Aggressive => 0,
            Strategy::Balanced => 1,
            Strategy::Cautious => 2,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Aggressive => "aggressive",
            Strategy::Balanced => "balanced",
            Strategy::Cautious => "cautious",
        })
    }
}

/// The control parameters of one strategy.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StrategyParams {
    /// The speed the vehicle tries to reach on an empty track, in m/s.
    pub desired_speed: f64,
    /// The maximum acceleration, in m/s<sup>2</sup>.
    pub max_acc: f64,
    /// The maximum braking deceleration, a positive number in m/s<sup>2</sup>.
    pub max_brake: f64,
    /// The minimum bumper-to-bumper gap at standstill, in m.
    pub min_gap: f64,
    /// The desired time headway to the vehicle ahead, in s.
    pub reaction_time: f64,
}

impl StrategyParams {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("desired_speed", self.desired_speed)?;
        positive("max_acc", self.max_acc)?;
        positive("max_brake", self.max_brake)?;
        non_negative("min_gap", self.min_gap)?;
        non_negative("reaction_time", self.reaction_time)?;
        Ok(())
    }
}

/// The parameters used by each strategy.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StrategyTable {
    pub aggressive: StrategyParams,
    pub balanced: StrategyParams,
    pub cautious: StrategyParams,
}

impl StrategyTable {
    /// Gets the parameters for a strategy.
    pub fn get(&self, strategy: Strategy) -> &StrategyParams {
        match strategy {
            Strategy::Aggressive => &self.aggressive,
            Strategy::Balanced => &self.balanced,
            Strategy::Cautious => &self.cautious,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        Strategy::ALL
            .iter()
            .try_for_each(|strategy| self.get(*strategy).validate())
    }
}

impl Default for StrategyTable {
    fn default() -> Self {
        Self {
            aggressive: StrategyParams {
                desired_speed: 21.6,
                max_acc: 3.0,
                max_brake: 6.0,
                min_gap: 1.6,
                reaction_time: 0.8,
            },
            balanced: StrategyParams {
                desired_speed: 18.0,
                max_acc: 3.0,
                max_brake: 6.0,
                min_gap: 2.0,
                reaction_time: 1.0,
            },
            cautious: StrategyParams {
                desired_speed: 16.2,
                max_acc: 3.0,
                max_brake: 6.0,
                min_gap: 2.4,
                reaction_time: 1.2,
            },
        }
    }
}

/// The number of cars starting the race with each strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StrategyMix {
    pub aggressive: usize,
    pub balanced: usize,
    pub cautious: usize,
}

impl StrategyMix {
    /// The total number of cars in the mix.
    pub fn total(&self) -> usize {
        self.aggressive + self.balanced + self.cautious
    }

    /// Lists one strategy per car, grouped by strategy.
    pub fn expand(&self) -> Vec<Strategy> {
        Strategy::ALL
            .iter()
            .flat_map(|strategy| {
                let count = match strategy {
                    Strategy::Aggressive => self.aggressive,
                    Strategy::Balanced => self.balanced,
                    Strategy::Cautious => self.cautious,
                };
                std::iter::repeat(*strategy).take(count)
            })
            .collect()
    }
}
