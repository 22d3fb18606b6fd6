use thiserror::Error;

/// A configuration value which violates the constraints of the simulation.
///
/// Races, tracks and the statistical wrappers refuse to start with an invalid
/// configuration, so every variant is reported before any simulated time passes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero (got {value})")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: f64 },
    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("the track must have at least one lane")]
    NoLanes,
    #[error("the race must have at least one car")]
    NoCars,
    #[error("strategy mix assigns {assigned} cars but num_cars is {num_cars}")]
    StrategyMix { assigned: usize, num_cars: usize },
    #[error(
        "track half-width {half_width:.2} m exceeds the tightest curve radius {min_radius:.2} m"
    )]
    TrackTooWide { half_width: f64, min_radius: f64 },
    #[error("elimination threshold must be at most 11 (got {0})")]
    EliminationThreshold(u8),
    #[error("transition row for {row} must have non-negative weights with a positive sum")]
    TransitionRow { row: String },
}

/// Checks that a value is finite and strictly positive.
pub(crate) fn positive(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

/// Checks that a value is finite and not negative.
pub(crate) fn non_negative(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

/// Checks that a value lies within a closed range.
pub(crate) fn within(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<f64, ConfigError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}
