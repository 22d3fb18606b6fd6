use crate::config::EliminatedVehicles;
use crate::math::Point2d;
use crate::{VehicleId, VehicleSet};
use cgmath::prelude::*;
use itertools::Itertools;
use log::trace;
use rand::Rng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Pairs further apart than this are never near misses, in m.
const NEAR_MISS_RANGE: f64 = 10.0;

/// Pairs closer than this have no meaningful line of sight, in m.
const MIN_SIGHT_DIST: f64 = 0.1;

/// A collision between two vehicles.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CollisionEvent {
    /// The simulated time of the collision, in s.
    pub time: f64,
    /// The two vehicles involved, in detection order.
    pub vehicles: [VehicleId; 2],
    /// The midpoint between the two vehicles.
    pub position: Point2d,
    /// The lower of the two vehicles' lap counts.
    pub lap: u32,
    /// The magnitude of the relative velocity, in m/s.
    pub severity: f64,
}

/// The collisions found by one check; usually none.
pub(crate) type Collisions = SmallVec<[CollisionEvent; 4]>;

/// Whether a vehicle is on the track for the purpose of collisions.
fn is_present(active: bool, eliminated: EliminatedVehicles) -> bool {
    active || eliminated == EliminatedVehicles::StaticObstacle
}

/// Checks every pair of vehicles for collisions, updating the active parties.
///
/// A pair is only checked if at least one of its vehicles is active and at least one
/// has moved since the previous check. Eliminated vehicles only take part when they
/// are left on the track, and their collision counts never change.
pub(crate) fn detect_collisions(
    vehicles: &mut VehicleSet,
    radius: f64,
    eliminated: EliminatedVehicles,
    time: f64,
) -> Collisions {
    let present = vehicles
        .iter()
        .filter(|(_, veh)| is_present(veh.is_active(), eliminated))
        .map(|(id, _)| id)
        .collect::<SmallVec<[VehicleId; 32]>>();

    let mut collisions = Collisions::new();
    for (a, b) in present.iter().copied().tuple_combinations() {
        let (veh_a, veh_b) = (&vehicles[a], &vehicles[b]);
        if !(veh_a.is_active() || veh_b.is_active()) || !(veh_a.updated() || veh_b.updated()) {
            continue;
        }
        let dist = (veh_b.position() - veh_a.position()).magnitude();
        if dist >= radius {
            continue;
        }
        let severity = (veh_b.velocity() - veh_a.velocity()).magnitude();
        let event = CollisionEvent {
            time,
            vehicles: [a, b],
            position: veh_a.position().midpoint(veh_b.position()),
            lap: u32::min(veh_a.laps(), veh_b.laps()),
            severity,
        };
        trace!(
            "collision between car {} and car {} (severity {:.2})",
            veh_a.number(),
            veh_b.number(),
            severity
        );
        for id in [a, b] {
            let veh = &mut vehicles[id];
            if veh.is_active() {
                veh.record_collision(severity);
            }
        }
        collisions.push(event);
    }
    collisions
}

/// Counts the pairs of active vehicles that are closing on each other and would
/// meet within `ttc_threshold` seconds.
pub(crate) fn count_near_misses(vehicles: &VehicleSet, ttc_threshold: f64) -> u32 {
    vehicles
        .values()
        .filter(|veh| veh.is_active())
        .tuple_combinations()
        .filter(|(a, b)| {
            let sight = b.position() - a.position();
            let dist = sight.magnitude();
            if !(MIN_SIGHT_DIST..NEAR_MISS_RANGE).contains(&dist) {
                return false;
            }
            let range_rate = sight.dot(b.velocity() - a.velocity()) / dist;
            if range_rate >= 0.0 {
                return false;
            }
            let ttc = dist / -range_rate;
            ttc > 0.0 && ttc < ttc_threshold
        })
        .count() as u32
}

/// Rolls a ten-sided die; the vehicle is eliminated if the roll is below `threshold`.
pub(crate) fn roll_elimination(rng: &mut impl Rng, threshold: u8) -> bool {
    rng.gen_range(1..=10u8) < threshold
}
