use crate::config::LaneChangeConfig;
use crate::snapshot::Snapshot;
use crate::track::Track;
use crate::util::Interval;
use crate::VehicleId;
use arrayvec::ArrayVec;

/// The state of the vehicle considering a lane change.
#[derive(Clone, Copy, Debug)]
pub struct LaneChangeRequest {
    pub id: VehicleId,
    pub lane: usize,
    pub s: f64,
    pub speed: f64,
    /// The speed the vehicle would like to drive at, in m/s.
    pub desired_speed: f64,
}

/// Decides whether a vehicle should overtake a slower leader, returning the lane to move into.
///
/// Only the adjacent lanes are candidates, and a lane is only taken if no vehicle in it,
/// including any which moved into it earlier in the step, lies within the danger zone
/// around the vehicle. Of two clear lanes, the one with the
/// larger gap to its nearest vehicle wins; the outer lane wins a tie.
pub fn choose_lane(
    request: &LaneChangeRequest,
    snapshot: &Snapshot,
    track: &Track,
    config: &LaneChangeConfig,
) -> Option<usize> {
    let leader = snapshot.leader(
        track,
        request.id,
        request.lane,
        request.s,
        config.trigger_distance,
    )?;
    if request.desired_speed - leader.speed <= config.speed_threshold {
        return None;
    }

    let zone = Interval::disc(
        0.0,
        config.danger_zone_base + request.speed * config.danger_zone_headway,
    );

    let mut candidates = ArrayVec::<(usize, f64), 2>::new();
    let adjacent = [request.lane.checked_sub(1), Some(request.lane + 1)];
    for lane in adjacent.into_iter().flatten() {
        if lane >= track.num_lanes() {
            continue;
        }
        let offsets = snapshot
            .occupants(lane, request.id)
            .map(|view| track.signed_gap(request.s, view.s));
        let mut nearest = f64::INFINITY;
        let mut clear = true;
        for offset in offsets {
            clear &= !zone.contains(offset);
            nearest = nearest.min(offset.abs());
        }
        if clear {
            candidates.push((lane, nearest));
        }
    }

    // Later candidates are further out, so they win ties
    candidates
        .into_iter()
        .max_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(lane, _)| lane)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{EliminatedVehicles, TrackConfig};
    use crate::strategy::Strategy;
    use crate::vehicle::Vehicle;
    use crate::VehicleSet;

    struct Setup {
        track: Track,
        vehicles: VehicleSet,
        me: VehicleId,
    }

    /// Places our vehicle at s = 100 in lane 2, at 10 m/s.
    fn setup(others: &[(usize, f64)]) -> Setup {
        let track = Track::new(&TrackConfig::default()).unwrap();
        let mut vehicles = VehicleSet::with_key();
        let me = vehicles
            .insert_with_key(|id| Vehicle::new(id, 0, Strategy::Balanced, 2, 100.0, &track));
        for (i, (lane, s)) in others.iter().enumerate() {
            vehicles.insert_with_key(|id| {
                Vehicle::new(id, i + 1, Strategy::Balanced, *lane, *s, &track)
            });
        }
        Setup {
            track,
            vehicles,
            me,
        }
    }

    fn decide(setup: &Setup, desired_speed: f64) -> Option<usize> {
        let snapshot = Snapshot::capture(&setup.vehicles, EliminatedVehicles::Removed);
        let request = LaneChangeRequest {
            id: setup.me,
            lane: 2,
            s: 100.0,
            speed: 10.0,
            desired_speed,
        };
        choose_lane(&request, &snapshot, &setup.track, &LaneChangeConfig::default())
    }

    #[test]
    fn no_change_without_a_slow_leader() {
        assert_eq!(decide(&setup(&[]), 18.0), None);
        // Leader beyond the trigger distance
        assert_eq!(decide(&setup(&[(2, 140.0)]), 18.0), None);
        // Leader not slow enough relative to our desired speed
        assert_eq!(decide(&setup(&[(2, 110.0)]), 1.5), None);
    }

    #[test]
    fn prefers_outer_lane_on_ties() {
        let setup = setup(&[(2, 110.0)]);
        assert_eq!(decide(&setup, 18.0), Some(3));
    }

    #[test]
    fn prefers_the_emptier_lane() {
        let setup = setup(&[(2, 110.0), (3, 125.0)]);
        assert_eq!(decide(&setup, 18.0), Some(1));
    }

    #[test]
    fn never_enters_the_danger_zone() {
        // The danger zone half-length is 5 + 10 * 0.5 = 10 m
        let blocked = setup(&[(2, 110.0), (1, 91.0), (3, 109.0)]);
        assert_eq!(decide(&blocked, 18.0), None);

        let open = setup(&[(2, 110.0), (1, 89.0), (3, 109.0)]);
        assert_eq!(decide(&open, 18.0), Some(1));
    }

    #[test]
    fn edge_lanes_only_have_one_neighbour() {
        let track = Track::new(&TrackConfig::default()).unwrap();
        let mut vehicles = VehicleSet::with_key();
        let me = vehicles
            .insert_with_key(|id| Vehicle::new(id, 0, Strategy::Aggressive, 4, 50.0, &track));
        vehicles.insert_with_key(|id| Vehicle::new(id, 1, Strategy::Cautious, 4, 60.0, &track));
        let snapshot = Snapshot::capture(&vehicles, EliminatedVehicles::Removed);
        let request = LaneChangeRequest {
            id: me,
            lane: 4,
            s: 50.0,
            speed: 10.0,
            desired_speed: 21.6,
        };
        let lane = choose_lane(&request, &snapshot, &track, &LaneChangeConfig::default());
        assert_eq!(lane, Some(3));
    }
}
