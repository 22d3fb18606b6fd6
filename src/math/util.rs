use super::{Point2d, Vector2d};
use cgmath::prelude::*;
use std::f64::consts::{PI, TAU};

/// Projects a point onto a local coordinate system.
///
/// # Parameters
/// * `point` - The point to project
/// * `origin` - The origin of the coordinate system
/// * `x_axis` - The basis vector pointing in the positive x-axis.
/// * `y_axis` - The basis vector pointing in the positive y-axis.
pub fn project_local(
    point: Point2d,
    origin: Point2d,
    x_axis: Vector2d,
    y_axis: Vector2d,
) -> Point2d {
    let point = point - origin;
    Point2d::new(point.dot(x_axis), point.dot(y_axis))
}

/// Rotates a vector 90 degrees anti-clockwise.
pub fn rot90(vec: Vector2d) -> Vector2d {
    Vector2d::new(-vec.y, vec.x)
}

/// Rotates a vector 90 degrees clockwise.
pub fn rot270(vec: Vector2d) -> Vector2d {
    Vector2d::new(vec.y, -vec.x)
}

/// The unit vector pointing along the given heading.
pub fn heading_vector(heading: f64) -> Vector2d {
    let (sin, cos) = heading.sin_cos();
    Vector2d::new(cos, sin)
}

/// The heading of a vector in radians.
pub fn vector_heading(vec: Vector2d) -> f64 {
    vec.y.atan2(vec.x)
}

/// Wraps an angle into the interval (-π, π].
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn normalize_angle_range() {
        assert_approx_eq!(normalize_angle(0.0), 0.0);
        assert_approx_eq!(normalize_angle(PI), PI);
        assert_approx_eq!(normalize_angle(-PI), PI);
        assert_approx_eq!(normalize_angle(3.0 * PI / 2.0), -PI / 2.0);
        assert_approx_eq!(normalize_angle(-5.0 * TAU + 0.25), 0.25);
    }

    #[test]
    fn rotations_are_inverse() {
        let v = Vector2d::new(3.0, -1.5);
        assert_eq!(rot270(rot90(v)), v);
        assert_approx_eq!(vector_heading(heading_vector(1.2)), 1.2);
    }
}
