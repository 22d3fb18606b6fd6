use crate::math::{ParametricCurve2d, Point2d, Vector2d};
use crate::util::Interval;
use std::f64::consts::TAU;

/// An axis-aligned ellipse centred on the origin, traversed anti-clockwise.
#[derive(Clone, Copy, Debug)]
pub struct Ellipse {
    radius_x: f64,
    radius_y: f64,
}

impl Ellipse {
    pub fn new(radius_x: f64, radius_y: f64) -> Self {
        Self { radius_x, radius_y }
    }

    /// The semi-axes along x and y.
    pub fn radii(&self) -> (f64, f64) {
        (self.radius_x, self.radius_y)
    }

    /// The radius of curvature at the ends of the major axis.
    pub fn min_radius_of_curvature(&self) -> f64 {
        let major = f64::max(self.radius_x, self.radius_y);
        let minor = f64::min(self.radius_x, self.radius_y);
        minor * minor / major
    }
}

impl ParametricCurve2d for Ellipse {
    fn sample(&self, t: f64) -> Point2d {
        let (sin, cos) = t.sin_cos();
        Point2d::new(self.radius_x * cos, self.radius_y * sin)
    }

    fn bounds(&self) -> Interval<f64> {
        Interval::new(0.0, TAU)
    }

    fn sample_dt(&self, t: f64) -> Vector2d {
        let (sin, cos) = t.sin_cos();
        Vector2d::new(-self.radius_x * sin, self.radius_y * cos)
    }

    fn sample_dt2(&self, t: f64) -> Vector2d {
        let (sin, cos) = t.sin_cos();
        Vector2d::new(-self.radius_x * cos, -self.radius_y * sin)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn curvature_radius_at_major_axis() {
        let ellipse = Ellipse::new(60.0, 40.0);
        assert_approx_eq!(ellipse.min_radius_of_curvature(), 1600.0 / 60.0);
        assert_approx_eq!(Ellipse::new(40.0, 60.0).min_radius_of_curvature(), 1600.0 / 60.0);
    }

    #[test]
    fn derivatives_match_samples() {
        let ellipse = Ellipse::new(60.0, 40.0);
        let t = 1.1;
        let h = 1e-6;
        let numeric = (ellipse.sample(t + h) - ellipse.sample(t - h)) / (2.0 * h);
        let exact = ellipse.sample_dt(t);
        assert_approx_eq!(numeric.x, exact.x, 1e-4);
        assert_approx_eq!(numeric.y, exact.y, 1e-4);
    }
}
