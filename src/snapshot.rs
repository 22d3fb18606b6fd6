//! Frozen copies of the vehicle states, which every decision made during a
//! step reads instead of the live vehicles.

use crate::config::EliminatedVehicles;
use crate::track::Track;
use crate::{VehicleId, VehicleSet};

/// What other vehicles can see of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleView {
    pub id: VehicleId,
    pub speed: f64,
    pub lane: usize,
    pub s: f64,
}

/// The nearest vehicle ahead in the same lane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Leader {
    /// The arc length distance to the leader, in m.
    pub gap: f64,
    /// The leader's speed, in m/s.
    pub speed: f64,
}

/// The visible vehicles at the start of a step.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    views: Vec<VehicleView>,
    /// Lanes taken by lane changes made since the snapshot was captured.
    claims: Vec<VehicleView>,
}

impl Snapshot {
    /// Captures every vehicle still present on the track.
    pub fn capture(vehicles: &VehicleSet, eliminated: EliminatedVehicles) -> Self {
        let views = vehicles
            .values()
            .filter(|veh| veh.is_active() || eliminated == EliminatedVehicles::StaticObstacle)
            .map(|veh| VehicleView {
                id: veh.id(),
                speed: veh.speed(),
                lane: veh.lane(),
                s: veh.s(),
            })
            .collect();
        Self {
            views,
            claims: vec![],
        }
    }

    /// Records that a vehicle has moved into a lane, so later lane changes in the
    /// same step treat it as occupying that lane too.
    pub fn claim_lane(&mut self, id: VehicleId, lane: usize) {
        if let Some(view) = self.views.iter().find(|view| view.id == id) {
            self.claims.push(VehicleView { lane, ..*view });
        }
    }

    /// Returns an iterator over the vehicles in a lane, other than `except`.
    pub fn in_lane(&self, lane: usize, except: VehicleId) -> impl Iterator<Item = &VehicleView> {
        self.views
            .iter()
            .filter(move |view| view.lane == lane && view.id != except)
    }

    /// Like [Snapshot::in_lane], but also includes vehicles which have claimed the lane.
    pub fn occupants(&self, lane: usize, except: VehicleId) -> impl Iterator<Item = &VehicleView> {
        self.in_lane(lane, except).chain(
            self.claims
                .iter()
                .filter(move |view| view.lane == lane && view.id != except),
        )
    }

    /// Finds the nearest vehicle strictly ahead in a lane, no further than `range`.
    pub fn leader(
        &self,
        track: &Track,
        id: VehicleId,
        lane: usize,
        s: f64,
        range: f64,
    ) -> Option<Leader> {
        self.in_lane(lane, id)
            .map(|view| (view, track.gap(s, view.s)))
            .filter(|(_, gap)| *gap > 0.0 && *gap <= range)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(view, gap)| Leader {
                gap,
                speed: view.speed,
            })
    }
}
