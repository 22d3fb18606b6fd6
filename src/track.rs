use self::ellipse::Ellipse;
use crate::config::TrackConfig;
use crate::error::{positive, ConfigError};
use crate::math::{
    project_local, project_point_onto_closed_curve, rot270, vector_heading, LookupTable,
    ParametricCurve2d, Point2d, Vector2d,
};
use cgmath::prelude::*;
use std::f64::consts::TAU;

mod ellipse;

/// The number of chords used to measure the centre line.
const ARC_SAMPLES: usize = 4096;

/// A closed, multi-lane racing track around an elliptical centre line.
///
/// Positions along the track are arc lengths `s` measured anti-clockwise from the
/// start line at the positive x-axis. Lateral offsets are positive away from the
/// centre of the ellipse, so lane 0 is the innermost lane.
#[derive(Clone, Debug)]
pub struct Track {
    /// The centre line.
    centre: Ellipse,
    /// The length of the centre line in m.
    length: f64,
    /// Maps an arc length to the ellipse parameter.
    t_of_s: LookupTable,
    /// Maps an ellipse parameter to the arc length.
    s_of_t: LookupTable,
    /// The number of lanes.
    num_lanes: usize,
    /// The width of each lane in m.
    lane_width: f64,
    /// Half the drivable width in m.
    half_width: f64,
}

/// The result of sampling the centre line of a [Track].
#[derive(Clone, Copy, Debug)]
pub struct TrackSample {
    /// The point on the centre line.
    pub pos: Point2d,
    /// The unit tangent, in the direction of travel.
    pub tan: Vector2d,
    /// The heading of the tangent, in radians.
    pub heading: f64,
}

impl TrackSample {
    /// The unit vector pointing away from the centre of the track.
    pub fn outward(&self) -> Vector2d {
        rot270(self.tan)
    }

    /// Offsets the sampled point laterally; positive offsets point outwards.
    pub fn lat_offset(&self, offset: f64) -> Point2d {
        self.pos + offset * self.outward()
    }
}

/// A point expressed relative to the centre line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    /// The arc length of the nearest centre line point, in m.
    pub s: f64,
    /// The signed lateral distance from the centre line, positive outwards, in m.
    pub lateral: f64,
}

impl Track {
    /// Builds a track, rejecting geometry which is not a simple closed loop.
    pub fn new(config: &TrackConfig) -> Result<Self, ConfigError> {
        let radius_x = positive("radius_x", config.radius_x)?;
        let radius_y = positive("radius_y", config.radius_y)?;
        let width = positive("width", config.width)?;
        if config.num_lanes == 0 {
            return Err(ConfigError::NoLanes);
        }

        // The lane offset curves fold over themselves where the centre line
        // curves more tightly than the track is wide.
        let centre = Ellipse::new(radius_x, radius_y);
        let half_width = 0.5 * width;
        let min_radius = centre.min_radius_of_curvature();
        if half_width >= min_radius {
            return Err(ConfigError::TrackTooWide {
                half_width,
                min_radius,
            });
        }

        // Measure the centre line chord by chord
        let dt = TAU / ARC_SAMPLES as f64;
        let mut pairs = Vec::with_capacity(ARC_SAMPLES + 1);
        let mut s = 0.0;
        let mut prev = centre.sample(0.0);
        pairs.push((0.0, 0.0));
        for i in 1..=ARC_SAMPLES {
            let t = i as f64 * dt;
            let point = centre.sample(t);
            s += (point - prev).magnitude();
            prev = point;
            pairs.push((t, s));
        }
        let length = s;

        let t_of_s = LookupTable::inverse_of(&pairs, length / ARC_SAMPLES as f64);
        let swapped = pairs.iter().map(|(t, s)| (*s, *t)).collect::<Vec<_>>();
        let s_of_t = LookupTable::inverse_of(&swapped, dt);

        Ok(Self {
            centre,
            length,
            t_of_s,
            s_of_t,
            num_lanes: config.num_lanes,
            lane_width: width / config.num_lanes as f64,
            half_width,
        })
    }

    /// The length of one lap along the centre line, in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The number of lanes.
    pub fn num_lanes(&self) -> usize {
        self.num_lanes
    }

    /// The width of a single lane, in m.
    pub fn lane_width(&self) -> f64 {
        self.lane_width
    }

    /// Half the drivable width, in m.
    pub fn half_width(&self) -> f64 {
        self.half_width
    }

    /// Wraps an arc length into `[0, length)`.
    pub fn wrap(&self, s: f64) -> f64 {
        let s = s.rem_euclid(self.length);
        // `rem_euclid` may round up to exactly `length`
        if s >= self.length {
            0.0
        } else {
            s
        }
    }

    /// The distance travelled going forwards from `from` to `to`, in `[0, length)`.
    pub fn gap(&self, from: f64, to: f64) -> f64 {
        self.wrap(to - from)
    }

    /// The shortest signed distance from `from` to `to`; positive when `to` is ahead.
    pub fn signed_gap(&self, from: f64, to: f64) -> f64 {
        let gap = self.gap(from, to);
        if gap > 0.5 * self.length {
            gap - self.length
        } else {
            gap
        }
    }

    /// Samples the centre line at the given arc length.
    pub fn point_at(&self, s: f64) -> TrackSample {
        let t = self.t_of_s.sample(self.wrap(s));
        let tan = self.centre.sample_dt(t).normalize();
        TrackSample {
            pos: self.centre.sample(t),
            tan,
            heading: vector_heading(tan),
        }
    }

    /// The lateral offset of the centre of a lane from the centre line.
    ///
    /// # Panics
    /// If `lane` is not less than the number of lanes.
    pub fn lane_center_offset(&self, lane: usize) -> f64 {
        assert!(
            lane < self.num_lanes,
            "lane {} out of range for a {} lane track",
            lane,
            self.num_lanes
        );
        -self.half_width + self.lane_width * (lane as f64 + 0.5)
    }

    /// The point on the centre of a lane at the given arc length.
    pub fn lane_point(&self, s: f64, lane: usize) -> Point2d {
        self.point_at(s).lat_offset(self.lane_center_offset(lane))
    }

    /// Finds the centre line position nearest to a point.
    pub fn project(&self, point: Point2d) -> Projection {
        let (a, b) = self.centre.radii();
        let guess = (point.y / b).atan2(point.x / a);
        let t = project_point_onto_closed_curve(&self.centre, point, 1e-10, Some(guess));

        let origin = self.centre.sample(t);
        let tan = self.centre.sample_dt(t).normalize();
        let local = project_local(point, origin, rot270(tan), tan);

        Projection {
            s: self.wrap(self.s_of_t.sample(t)),
            lateral: local.x,
        }
    }

    /// The lane containing the given lateral offset, if it is on the track.
    pub fn lane_at(&self, lateral: f64) -> Option<usize> {
        let across = lateral + self.half_width;
        if across < 0.0 || lateral > self.half_width {
            return None;
        }
        Some(usize::min(
            (across / self.lane_width) as usize,
            self.num_lanes - 1,
        ))
    }
}
