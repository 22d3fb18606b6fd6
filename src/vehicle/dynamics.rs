use crate::math::{heading_vector, normalize_angle, Point2d};

/// The kinematic state integrated by [bicycle_step].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KinematicState {
    /// The position of the vehicle in m.
    pub pos: Point2d,
    /// The heading in radians, in (-π, π].
    pub heading: f64,
    /// The speed in m/s, never negative.
    pub speed: f64,
}

/// Advances the kinematic bicycle model by one forward Euler step.
///
/// All derivatives are taken at the old state.
pub fn bicycle_step(
    state: KinematicState,
    acc: f64,
    steering: f64,
    wheel_base: f64,
    dt: f64,
) -> KinematicState {
    let vel = state.speed * heading_vector(state.heading);
    let yaw_rate = state.speed / wheel_base * steering.tan();
    KinematicState {
        pos: state.pos + vel * dt,
        heading: normalize_angle(state.heading + yaw_rate * dt),
        speed: f64::max(state.speed + acc * dt, 0.0),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use proptest::prelude::*;
    use std::f64::consts::PI;

    #[test]
    fn euler_uses_old_state() {
        let state = KinematicState {
            pos: Point2d::new(0.0, 0.0),
            heading: 0.0,
            speed: 10.0,
        };
        let next = bicycle_step(state, 2.0, 0.1, 2.5, 0.1);
        assert_approx_eq!(next.pos.x, 1.0);
        assert_approx_eq!(next.pos.y, 0.0);
        assert_approx_eq!(next.heading, 0.4 * 0.1f64.tan());
        assert_approx_eq!(next.speed, 10.2);
    }

    #[test]
    fn heading_stays_normalised() {
        let state = KinematicState {
            pos: Point2d::new(0.0, 0.0),
            heading: PI - 0.01,
            speed: 20.0,
        };
        let next = bicycle_step(state, 0.0, 0.5, 2.5, 0.1);
        assert!(next.heading > -PI && next.heading <= PI);
        assert!(next.heading < 0.0);
    }

    proptest! {
        #[test]
        fn speed_never_negative(
            speed in 0.0..40.0f64,
            acc in -50.0..10.0f64,
            steering in -0.5..0.5f64,
            heading in -PI..PI,
            dt in 0.001..0.5f64,
        ) {
            let state = KinematicState { pos: Point2d::new(3.0, -2.0), heading, speed };
            let next = bicycle_step(state, acc, steering, 2.5, dt);
            prop_assert!(next.speed >= 0.0);
            prop_assert!(next.heading > -PI && next.heading <= PI);
        }
    }
}
