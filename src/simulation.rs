use crate::race::{Race, RaceStatus};
use crate::telemetry::TelemetrySink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared flag which asks a running race to stop.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Creates a signal which has not been raised.
    pub fn new() -> Self {
        Default::default()
    }

    /// Asks every race watching this signal to stop.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Advances a [Race] through simulated time.
pub trait RaceDriver: Sized {
    /// Creates a driver for a race which has not yet started.
    fn new(race: Race) -> Self;

    fn race(&self) -> &Race;

    fn race_mut(&mut self) -> &mut Race;

    fn into_race(self) -> Race;

    /// Simulates until the race clock next advances, emitting telemetry for every vehicle
    /// which moved. Does nothing once the race is over.
    fn step(&mut self, sink: &mut impl TelemetrySink);

    /// Simulates until the race is over or `stop` is raised.
    fn run(&mut self, sink: &mut impl TelemetrySink, stop: &StopSignal) -> RaceStatus {
        while self.race().is_running() {
            if stop.is_stopped() {
                self.race_mut().abort();
                break;
            }
            self.step(sink);
        }
        self.race().status()
    }
}

/// Drives a race with a fixed time step.
///
/// Every tick, each active vehicle runs its controller and physics then considers
/// a lane change, reading only the state of the other vehicles from the start of
/// the tick. Collisions are checked once all vehicles have moved.
#[derive(Clone, Debug)]
pub struct Simulation {
    race: Race,
    /// The number of ticks simulated.
    frame: usize,
}

impl Simulation {
    /// Gets the number of ticks simulated so far.
    pub fn frame(&self) -> usize {
        self.frame
    }
}

impl RaceDriver for Simulation {
    fn new(race: Race) -> Self {
        Self { race, frame: 0 }
    }

    fn race(&self) -> &Race {
        &self.race
    }

    fn race_mut(&mut self) -> &mut Race {
        &mut self.race
    }

    fn into_race(self) -> Race {
        self.race
    }

    fn step(&mut self, sink: &mut impl TelemetrySink) {
        if !self.race.is_running() {
            return;
        }
        let dt = self.race.config().dt;
        let now = self.race.time() + dt;

        self.race.begin_step();
        for id in self.race.active_vehicles() {
            self.race.update_vehicle(id, dt, now);
            self.race.decide_lane_change(id);
        }
        let collisions = self.race.check_collisions(now);
        self.race.roll_eliminations(&collisions, now);
        self.race.end_step(now, sink);
        self.frame += 1;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::RaceConfig;
    use crate::telemetry::TelemetryRecord;

    #[test]
    fn stop_signal_aborts() {
        let race = Race::new(RaceConfig::default(), 1).unwrap();
        let mut sim = Simulation::new(race);
        let stop = StopSignal::new();
        sim.step(&mut ());
        stop.clone().stop();
        assert_eq!(sim.run(&mut (), &stop), RaceStatus::Aborted);
        assert_eq!(sim.frame(), 1);
        sim.step(&mut ());
        assert_eq!(sim.frame(), 1);
    }

    #[test]
    fn ticks_advance_the_clock() {
        let race = Race::new(RaceConfig::default(), 1).unwrap();
        let mut sim = Simulation::new(race);
        let mut records: Vec<TelemetryRecord> = vec![];
        for _ in 0..4 {
            sim.step(&mut records);
        }
        assert_eq!(records.len(), 40);
        assert!((sim.race().time() - 0.2).abs() < 1e-12);
        assert!(records[39].timestamp > records[0].timestamp);
    }

    #[test]
    fn times_out() {
        let config = RaceConfig {
            time_limit: 1.0,
            ..Default::default()
        };
        let mut sim = Simulation::new(Race::new(config, 4).unwrap());
        assert_eq!(sim.run(&mut (), &StopSignal::new()), RaceStatus::TimedOut);
        assert_eq!(sim.frame(), 20);
        assert!(sim.race().iter_vehicles().all(|veh| veh.lap_times().is_empty()));
    }
}
