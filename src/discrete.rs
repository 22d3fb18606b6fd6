use crate::event::{EventKind, EventQueue, ScheduledEvent};
use crate::race::{Race, RaceStatus};
use crate::simulation::{RaceDriver, StopSignal};
use crate::telemetry::TelemetrySink;
use log::trace;

/// Drives a race by draining a queue of timed events.
///
/// Each vehicle has its own periodic update event, and collision checks are
/// events of their own. Events sharing a trigger time form an instant: the
/// vehicle states are frozen when an instant begins, and telemetry is emitted
/// once it has been drained. With the same seed and configuration this gives
/// the same race as [Simulation](crate::Simulation).
#[derive(Clone, Debug)]
pub struct DiscreteEventSimulation {
    race: Race,
    queue: EventQueue,
    /// The number of events processed.
    events: usize,
}

impl DiscreteEventSimulation {
    /// Gets the number of events processed so far.
    pub fn events_processed(&self) -> usize {
        self.events
    }

    /// Gets the number of events waiting in the queue.
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Processes every event of the next instant, stopping early if `stop` is raised.
    fn drain_instant(&mut self, sink: &mut impl TelemetrySink, stop: Option<&StopSignal>) {
        if !self.race.is_running() {
            return;
        }
        let instant = match self.queue.next_time() {
            Some(time) => time,
            None => {
                // The collision check always reschedules itself while the race runs
                debug_assert!(false, "event queue ran dry");
                self.race.abort();
                return;
            }
        };

        self.race.begin_step();
        while let Some(event) = self.queue.pop_at(instant) {
            self.dispatch(event);
            self.events += 1;
            if stop.map_or(false, |stop| stop.is_stopped()) {
                self.race.abort();
                return;
            }
        }
        self.race.end_step(instant, sink);
    }

    fn dispatch(&mut self, event: ScheduledEvent) {
        trace!("t={:.3} #{} {:?}", event.time, event.seq, event.kind);
        let dt = self.race.config().dt;
        let now = event.time;
        match event.kind {
            EventKind::PeriodicUpdate(id) => {
                if self.race.get_vehicle(id).map_or(false, |veh| veh.is_active()) {
                    self.race.update_vehicle(id, dt, now);
                    self.queue.schedule(now + dt, EventKind::PeriodicUpdate(id));
                    if self.race.lane_change_ready(id) {
                        self.queue.schedule(now, EventKind::LaneChangeDecision(id));
                    }
                }
            }
            EventKind::LaneChangeDecision(id) => {
                self.race.decide_lane_change(id);
            }
            EventKind::CollisionCheck => {
                let collisions = self.race.check_collisions(now);
                if self.race.config().elimination.enabled {
                    for collision in &collisions {
                        for id in self.race.active_parties(collision) {
                            self.queue.schedule(now, EventKind::EliminationRoll(id));
                        }
                    }
                }
                self.queue.schedule(now + dt, EventKind::CollisionCheck);
            }
            EventKind::EliminationRoll(id) => {
                self.race.roll_for(id, now);
            }
        }
    }
}

impl RaceDriver for DiscreteEventSimulation {
    fn new(race: Race) -> Self {
        let mut queue = EventQueue::new();
        let first = race.time() + race.config().dt;
        for id in race.active_vehicles() {
            queue.schedule(first, EventKind::PeriodicUpdate(id));
        }
        queue.schedule(first, EventKind::CollisionCheck);
        Self {
            race,
            queue,
            events: 0,
        }
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
        self.drain_instant(sink, None);
    }

    fn run(&mut self, sink: &mut impl TelemetrySink, stop: &StopSignal) -> RaceStatus {
        while self.race.is_running() {
            if stop.is_stopped() {
                self.race.abort();
                break;
            }
            self.drain_instant(sink, Some(stop));
        }
        self.race.status()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::RaceConfig;
    use crate::telemetry::TelemetryRecord;

    #[test]
    fn schedules_one_update_per_vehicle_and_a_collision_check() {
        let race = Race::new(RaceConfig::default(), 2).unwrap();
        let sim = DiscreteEventSimulation::new(race);
        assert_eq!(sim.pending_events(), 11);
    }

    #[test]
    fn instants_match_ticks() {
        let race = Race::new(RaceConfig::default(), 2).unwrap();
        let mut sim = DiscreteEventSimulation::new(race);
        let mut records: Vec<TelemetryRecord> = vec![];
        sim.step(&mut records);
        assert_eq!(records.len(), 10);
        assert!(records.iter().all(|rec| rec.timestamp == 0.05));
        assert_eq!(sim.race().time(), 0.05);
        assert!(sim.events_processed() >= 11);
    }

    #[test]
    fn stop_signal_aborts_mid_race() {
        let race = Race::new(RaceConfig::default(), 2).unwrap();
        let mut sim = DiscreteEventSimulation::new(race);
        let stop = StopSignal::new();
        stop.stop();
        assert_eq!(sim.run(&mut (), &stop), RaceStatus::Aborted);
        assert_eq!(sim.events_processed(), 0);
    }
}
