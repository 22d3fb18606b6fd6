//! Per-step telemetry and end of race summaries.

use crate::collision::CollisionEvent;
use crate::race::{EliminationRecord, Race, RaceStatus};
use crate::strategy::Strategy;
use crate::vehicle::{Elimination, Vehicle};
use crate::VehicleId;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The penalty added to a vehicle's average lap time for each collision, in s.
const COLLISION_PENALTY: f64 = 5.0;

/// The state of one vehicle at the end of a step.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TelemetryRecord {
    pub timestamp: f64,
    pub car_id: VehicleId,
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub lap: u32,
    pub s_position: f64,
    pub collision_flag: bool,
}

impl TelemetryRecord {
    /// Records the current state of a vehicle.
    pub fn of(timestamp: f64, vehicle: &Vehicle) -> Self {
        let pos = vehicle.position();
        Self {
            timestamp,
            car_id: vehicle.id(),
            x: pos.x,
            y: pos.y,
            yaw: vehicle.heading(),
            velocity: vehicle.speed(),
            acceleration: vehicle.acc(),
            lap: vehicle.laps(),
            s_position: vehicle.s(),
            collision_flag: vehicle.collided(),
        }
    }
}

/// Receives the telemetry emitted after each step.
pub trait TelemetrySink {
    fn record(&mut self, record: TelemetryRecord);
}

impl TelemetrySink for Vec<TelemetryRecord> {
    fn record(&mut self, record: TelemetryRecord) {
        self.push(record);
    }
}

/// Discards all telemetry.
impl TelemetrySink for () {
    fn record(&mut self, _record: TelemetryRecord) {}
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for &mut T {
    fn record(&mut self, record: TelemetryRecord) {
        (**self).record(record);
    }
}

/// The outcome of a race for one vehicle.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleSummary {
    pub id: VehicleId,
    /// The starting grid position.
    pub number: usize,
    /// The strategy at the end of the race.
    pub strategy: Strategy,
    pub laps: u32,
    pub lap_times: Vec<f64>,
    pub average_lap_time: Option<f64>,
    pub collisions: u32,
    pub severity: f64,
    pub elimination: Option<Elimination>,
    pub finished_at: Option<f64>,
    /// Distance over time spent racing, in m/s.
    pub average_speed: f64,
    pub velocity_adjust: f64,
    /// The number of steps which ended off the track.
    pub off_track_steps: u32,
}

impl VehicleSummary {
    fn of(vehicle: &Vehicle) -> Self {
        Self {
            id: vehicle.id(),
            number: vehicle.number(),
            strategy: vehicle.strategy(),
            laps: vehicle.laps(),
            lap_times: vehicle.lap_times().to_vec(),
            average_lap_time: vehicle.average_lap_time(),
            collisions: vehicle.collisions(),
            severity: vehicle.severity(),
            elimination: vehicle.elimination(),
            finished_at: vehicle.finished_at(),
            average_speed: vehicle.average_speed(),
            velocity_adjust: vehicle.velocity_adjust(),
            off_track_steps: vehicle.off_track_steps(),
        }
    }
}

/// The outcome of a whole race.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RaceSummary {
    pub seed: u64,
    pub status: RaceStatus,
    /// The simulated time at which the race ended, in s.
    pub time: f64,
    /// One entry per car, in grid order.
    pub vehicles: Vec<VehicleSummary>,
    pub collisions: Vec<CollisionEvent>,
    pub eliminations: Vec<EliminationRecord>,
    pub near_misses: u32,
    /// The cars which completed every lap, in order of finishing.
    pub finishers: Vec<VehicleId>,
}

impl RaceSummary {
    /// Summarises a race in its current state.
    pub fn of(race: &Race) -> Self {
        let vehicles = race
            .iter_vehicles()
            .map(VehicleSummary::of)
            .collect::<Vec<_>>();
        let mut finishers = vehicles
            .iter()
            .filter_map(|veh| Some((veh.finished_at?, veh.number, veh.id)))
            .collect::<Vec<_>>();
        finishers.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        Self {
            seed: race.seed(),
            status: race.status(),
            time: race.time(),
            vehicles,
            collisions: race.collision_log().to_vec(),
            eliminations: race.elimination_log().to_vec(),
            near_misses: race.near_misses(),
            finishers: finishers.into_iter().map(|(_, _, id)| id).collect(),
        }
    }

    /// Gets the summary of a single vehicle.
    pub fn vehicle(&self, id: VehicleId) -> Option<&VehicleSummary> {
        self.vehicles.iter().find(|veh| veh.id == id)
    }

    /// The total number of collisions in the race.
    pub fn total_collisions(&self) -> usize {
        self.collisions.len()
    }

    /// The mean of the vehicles' average lap times; vehicles without a lap are skipped.
    pub fn mean_lap_time(&self) -> Option<f64> {
        let times = self
            .vehicles
            .iter()
            .filter_map(|veh| veh.average_lap_time)
            .collect::<Vec<_>>();
        if times.is_empty() {
            None
        } else {
            Some(times.iter().sum::<f64>() / times.len() as f64)
        }
    }

    /// The number of eliminated vehicles.
    pub fn eliminated(&self) -> usize {
        self.vehicles
            .iter()
            .filter(|veh| veh.elimination.is_some())
            .count()
    }
}

/// Picks the finisher with the best combination of pace and cleanliness: the lowest
/// average lap time plus a fixed penalty per collision. Ties go to the car which
/// started further up the grid.
pub fn best_vehicle(summary: &RaceSummary) -> Option<&VehicleSummary> {
    summary
        .vehicles
        .iter()
        .filter(|veh| veh.finished_at.is_some() && veh.elimination.is_none())
        .filter_map(|veh| {
            let score = veh.average_lap_time? + veh.collisions as f64 * COLLISION_PENALTY;
            Some((score, veh))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.number.cmp(&b.1.number)))
        .map(|(_, veh)| veh)
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use slotmap::SlotMap;

    fn summary(vehicles: &[(Option<f64>, u32, bool)]) -> RaceSummary {
        let mut ids = SlotMap::<VehicleId, ()>::with_key();
        let vehicles = vehicles
            .iter()
            .enumerate()
            .map(|(number, (lap, collisions, finished))| VehicleSummary {
                id: ids.insert(()),
                number,
                strategy: Strategy::Balanced,
                laps: lap.map_or(0, |_| 3),
                lap_times: lap.into_iter().copied().collect(),
                average_lap_time: *lap,
                collisions: *collisions,
                severity: 0.0,
                elimination: None,
                finished_at: finished.then(|| 100.0),
                average_speed: 0.0,
                velocity_adjust: 1.0,
                off_track_steps: 0,
            })
            .collect();
        RaceSummary {
            seed: 0,
            status: RaceStatus::Finished,
            time: 100.0,
            vehicles,
            collisions: vec![],
            eliminations: vec![],
            near_misses: 0,
            finishers: vec![],
        }
    }

    #[test]
    fn best_vehicle_penalises_collisions() {
        let race = summary(&[
            (Some(30.0), 2, true),
            (Some(35.0), 0, true),
            (Some(20.0), 0, false),
        ]);
        assert_eq!(best_vehicle(&race).map(|veh| veh.number), Some(1));
    }

    #[test]
    fn best_vehicle_ties_go_to_grid_order() {
        let race = summary(&[(Some(40.0), 1, true), (Some(35.0), 2, true)]);
        assert_eq!(best_vehicle(&race).map(|veh| veh.number), Some(0));
        assert!(best_vehicle(&summary(&[(None, 0, false)])).is_none());
    }

    #[test]
    fn mean_lap_time_skips_missing() {
        let race = summary(&[(Some(30.0), 0, true), (None, 0, false), (Some(40.0), 0, true)]);
        assert_approx_eq!(race.mean_lap_time().unwrap(), 35.0);
        assert_eq!(summary(&[(None, 0, false)]).mean_lap_time(), None);
    }

    #[test]
    fn vec_and_unit_are_sinks() {
        let record = TelemetryRecord {
            timestamp: 0.05,
            car_id: VehicleId::default(),
            x: 1.0,
            y: 2.0,
            yaw: 0.0,
            velocity: 3.0,
            acceleration: 0.5,
            lap: 0,
            s_position: 4.0,
            collision_flag: false,
        };
        let mut records: Vec<TelemetryRecord> = vec![];
        records.record(record);
        ().record(record);
        assert_eq!(records, vec![record]);
    }
}
