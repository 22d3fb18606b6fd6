use super::{Point2d, Vector2d};
use crate::util::Interval;
use cgmath::prelude::*;

/// A parametric curve in 2D space.
pub trait ParametricCurve2d {
    /// Samples the parametric curve.
    fn sample(&self, t: f64) -> Point2d;

    /// Returns the minimum and maximum t-values that define the bounds of the curve.
    fn bounds(&self) -> Interval<f64>;

    /// Samples the derivative of the parametric curve.
    ///
    /// The default implementation approximates the derivative by sampling
    /// two very nearby points along the curve.
    fn sample_dt(&self, t: f64) -> Vector2d {
        let delta = self.bounds().length() * 0.0001;
        let p1 = self.sample(t);
        let p2 = self.sample(t + delta);
        (p2 - p1) / delta
    }

    /// Samples the second derivative of the parametric curve.
    ///
    /// The default implementation approximates the derivative by sampling
    /// two very nearby points along the curve.
    fn sample_dt2(&self, t: f64) -> Vector2d {
        let delta = self.bounds().length() * 0.0001;
        let p1 = self.sample_dt(t);
        let p2 = self.sample_dt(t + delta);
        (p2 - p1) / delta
    }
}

impl<T: ParametricCurve2d + ?Sized> ParametricCurve2d for &T {
    fn sample(&self, t: f64) -> Point2d {
        (**self).sample(t)
    }

    fn bounds(&self) -> Interval<f64> {
        (**self).bounds()
    }

    fn sample_dt(&self, t: f64) -> Vector2d {
        (**self).sample_dt(t)
    }

    fn sample_dt2(&self, t: f64) -> Vector2d {
        (**self).sample_dt2(t)
    }
}

/// Projects a point onto a closed parametric curve, whose end joins its start.
///
/// Unlike an open curve, the parameter is wrapped around the bounds while refining,
/// so the search never runs off the end of the curve.
///
/// # Parameters
/// * `curve` - The closed curve
/// * `point` - The point to project
/// * `max_error` - The parameter tolerance at which to stop refining
/// * `t0` - An initial guess; the coarse sample nearest the point is used if `None`
pub fn project_point_onto_closed_curve(
    curve: &impl ParametricCurve2d,
    point: Point2d,
    max_error: f64,
    t0: Option<f64>,
) -> f64 {
    let bounds = curve.bounds();
    let wrap = |t: f64| bounds.min + (t - bounds.min).rem_euclid(bounds.length());

    // Get initial guess for `t`
    let mut t = t0.map(wrap).unwrap_or_else(|| {
        (0..32)
            .map(|i| bounds.lerp(i as f64 / 32.0))
            .map(|t| (t, (point - curve.sample(t)).magnitude2()))
            .fold((bounds.min, f64::INFINITY), |best, next| {
                if next.1 < best.1 {
                    next
                } else {
                    best
                }
            })
            .0
    });

    // Refine `t` with Newton's method
    for _ in 0..64 {
        let p = curve.sample(t);
        let p_dt = curve.sample_dt(t);
        let p_dt2 = curve.sample_dt2(t);
        let slope = p_dt.magnitude2() + (p - point).dot(p_dt2);
        let error = if slope > 0.0 {
            p_dt.dot(point - p) / slope
        } else {
            p_dt.dot(point - p) / p_dt.magnitude2()
        };
        t = wrap(t + error);
        if error.abs() < max_error {
            break;
        }
    }

    t
}
