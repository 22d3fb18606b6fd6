//! Repeated races with different seeds, summarised statistically.

use crate::config::RaceConfig;
use crate::error::{non_negative, ConfigError};
use crate::race::Race;
use crate::simulation::{RaceDriver, StopSignal};
use crate::telemetry::RaceSummary;
use crate::util::Interval;
use log::info;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The z-score of a two-sided 95% confidence interval.
const Z_95: f64 = 1.96;

/// How speed factors are drawn for a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JitterScope {
    /// Each car draws its own normally distributed factor.
    PerVehicle,
    /// One uniformly distributed factor is shared by the whole field.
    PerRun,
}

/// The desired speed jitter applied to every run.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpeedJitter {
    pub scope: JitterScope,
    /// The standard deviation of per-vehicle factors.
    pub stddev: f64,
    /// The largest deviation of the speed factor from 1.
    pub range: f64,
}

impl SpeedJitter {
    /// A single factor per run, uniform within `range` of 1.
    pub fn per_run(range: f64) -> Self {
        Self {
            scope: JitterScope::PerRun,
            stddev: 0.0,
            range,
        }
    }
}

impl Default for SpeedJitter {
    fn default() -> Self {
        Self {
            scope: JitterScope::PerVehicle,
            stddev: 0.05,
            range: 0.1,
        }
    }
}

/// The settings of a Monte Carlo study.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MonteCarloConfig {
    pub race: RaceConfig,
    /// The number of races to run.
    pub runs: usize,
    /// Run `i` is seeded with `base_seed + i`.
    pub base_seed: u64,
    pub jitter: Option<SpeedJitter>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            race: Default::default(),
            runs: 10,
            base_seed: 0,
            jitter: Some(Default::default()),
        }
    }
}

/// The headline numbers of a single race.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunMetrics {
    pub seed: u64,
    /// The mean of the cars' average lap times; missing if no lap was completed.
    pub mean_lap_time: Option<f64>,
    pub collisions: usize,
    pub finishers: usize,
    pub eliminated: usize,
    pub near_misses: u32,
    pub simulated_time: f64,
}

impl RunMetrics {
    pub fn of(summary: &RaceSummary) -> Self {
        Self {
            seed: summary.seed,
            mean_lap_time: summary.mean_lap_time(),
            collisions: summary.total_collisions(),
            finishers: summary.finishers.len(),
            eliminated: summary.eliminated(),
            near_misses: summary.near_misses,
            simulated_time: summary.time,
        }
    }
}

/// Descriptive statistics of one metric across runs.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Statistics {
    /// The number of runs which had a value.
    pub count: usize,
    pub mean: f64,
    /// The sample standard deviation; zero for a single sample.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// The 95% confidence interval of the mean.
    pub ci_95: Interval<f64>,
}

impl Statistics {
    /// Computes the statistics of some samples, or `None` if there are none.
    pub fn of(samples: impl IntoIterator<Item = f64>) -> Option<Self> {
        let samples = samples.into_iter().collect::<Vec<_>>();
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let std_dev = if samples.len() > 1 {
            let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        } else {
            0.0
        };
        let (min, max) = samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), x| {
                (min.min(*x), max.max(*x))
            });
        Some(Self {
            count: samples.len(),
            mean,
            std_dev,
            min,
            max,
            ci_95: Interval::disc(mean, Z_95 * std_dev / n.sqrt()),
        })
    }
}

/// The results of a Monte Carlo study.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MonteCarloReport {
    pub runs: Vec<RunMetrics>,
    /// Missing when no run completed a lap.
    pub mean_lap_time: Option<Statistics>,
    pub collisions: Option<Statistics>,
    pub finishers: Option<Statistics>,
    pub eliminated: Option<Statistics>,
    pub near_misses: Option<Statistics>,
    pub simulated_time: Option<Statistics>,
}

impl MonteCarloReport {
    /// Aggregates the metrics of each run.
    pub fn from_runs(runs: Vec<RunMetrics>) -> Self {
        let stats = |f: fn(&RunMetrics) -> Option<f64>| Statistics::of(runs.iter().filter_map(f));
        Self {
            mean_lap_time: stats(|run| run.mean_lap_time),
            collisions: stats(|run| Some(run.collisions as f64)),
            finishers: stats(|run| Some(run.finishers as f64)),
            eliminated: stats(|run| Some(run.eliminated as f64)),
            near_misses: stats(|run| Some(run.near_misses as f64)),
            simulated_time: stats(|run| Some(run.simulated_time)),
            runs,
        }
    }
}

/// Runs the same race configuration many times with consecutive seeds.
#[derive(Clone, Debug)]
pub struct MonteCarlo {
    config: MonteCarloConfig,
}

impl MonteCarlo {
    /// Creates a study, checking the race configuration up front.
    pub fn new(config: MonteCarloConfig) -> Result<Self, ConfigError> {
        if config.runs == 0 {
            return Err(ConfigError::NotPositive {
                field: "runs",
                value: 0.0,
            });
        }
        if let Some(jitter) = config.jitter {
            non_negative("speed_jitter", jitter.stddev)?;
            non_negative("speed_jitter_range", jitter.range)?;
        }
        config.race.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MonteCarloConfig {
        &self.config
    }

    /// Gets the seed of run `i`.
    pub fn seed(&self, run: usize) -> u64 {
        self.config.base_seed.wrapping_add(run as u64)
    }

    /// Creates the race for run `i`, with jitter applied.
    pub fn race(&self, run: usize) -> Result<Race, ConfigError> {
        let mut race = Race::new(self.config.race.clone(), self.seed(run))?;
        match self.config.jitter {
            Some(SpeedJitter {
                scope: JitterScope::PerVehicle,
                stddev,
                range,
            }) => race.randomise_velocity_adjusts(stddev, range)?,
            Some(SpeedJitter {
                scope: JitterScope::PerRun,
                range,
                ..
            }) => race.scale_velocity_adjusts(range)?,
            None => {}
        }
        Ok(race)
    }

    /// Runs every race to completion with the driver `D`.
    pub fn run<D: RaceDriver>(&self, stop: &StopSignal) -> Result<MonteCarloReport, ConfigError> {
        self.run_with(|race| {
            let mut driver = D::new(race);
            driver.run(&mut (), stop);
            RaceSummary::of(driver.race())
        })
    }

    /// Runs every race through `f`, which must run it and summarise it.
    pub fn run_with(
        &self,
        mut f: impl FnMut(Race) -> RaceSummary,
    ) -> Result<MonteCarloReport, ConfigError> {
        let mut runs = Vec::with_capacity(self.config.runs);
        for i in 0..self.config.runs {
            let summary = f(self.race(i)?);
            let metrics = RunMetrics::of(&summary);
            info!(
                "run {}/{} (seed {}): {} collisions, {} finishers, {} eliminated",
                i + 1,
                self.config.runs,
                metrics.seed,
                metrics.collisions,
                metrics.finishers,
                metrics.eliminated
            );
            runs.push(metrics);
        }
        Ok(MonteCarloReport::from_runs(runs))
    }
}
