use crate::math::{normalize_angle, vector_heading, Point2d};
use cgmath::InnerSpace;

/// Targets closer than this are treated as reached, in m.
const MIN_TARGET_DIST: f64 = 1e-6;

/// The lateral control law of a vehicle: pure pursuit towards a target point.
#[derive(Clone, Copy, Debug)]
pub struct PurePursuit {
    /// Distance between the axles in m.
    pub wheel_base: f64,
    /// The distance ahead at which the target is chosen, in m.
    pub lookahead: f64,
    /// The largest steering angle in radians.
    pub max_steering: f64,
}

impl PurePursuit {
    /// Calculates the steering angle which curves the vehicle towards `target`.
    pub fn steer(&self, pos: Point2d, heading: f64, target: Point2d) -> f64 {
        let to_target = target - pos;
        if to_target.magnitude() < MIN_TARGET_DIST {
            return 0.0;
        }
        let alpha = normalize_angle(vector_heading(to_target) - heading);
        let steering = (2.0 * self.wheel_base * alpha.sin()).atan2(self.lookahead);
        steering.clamp(-self.max_steering, self.max_steering)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn controller() -> PurePursuit {
        PurePursuit {
            wheel_base: 2.5,
            lookahead: 8.0,
            max_steering: 30f64.to_radians(),
        }
    }

    #[test]
    fn straight_ahead_needs_no_steering() {
        let pp = controller();
        let pos = Point2d::new(1.0, 1.0);
        assert_approx_eq!(pp.steer(pos, 0.0, Point2d::new(9.0, 1.0)), 0.0);
        assert_eq!(pp.steer(pos, 0.3, pos), 0.0);
    }

    #[test]
    fn steers_towards_the_target() {
        let pp = controller();
        let pos = Point2d::new(0.0, 0.0);
        let left = pp.steer(pos, 0.0, Point2d::new(7.0, 2.0));
        let right = pp.steer(pos, 0.0, Point2d::new(7.0, -2.0));
        assert!(left > 0.0);
        assert_approx_eq!(left, -right);
        let alpha = 2f64.atan2(7.0);
        assert_approx_eq!(left, (5.0 * alpha.sin()).atan2(8.0));
    }

    #[test]
    fn steering_is_clamped() {
        let pp = controller();
        let behind = pp.steer(Point2d::new(0.0, 0.0), 0.0, Point2d::new(-1.0, 0.1));
        assert!(behind.abs() <= 30f64.to_radians() + 1e-12);
        let sharp = pp.steer(Point2d::new(0.0, 0.0), 0.0, Point2d::new(0.0, 8.0));
        assert_approx_eq!(sharp, 30f64.to_radians());
    }
}
