//! Mathematical structs and functions.

use cgmath::{Point2, Vector2};
pub use curve::{project_point_onto_closed_curve, ParametricCurve2d};
pub use lut::LookupTable;
pub use util::*;

mod curve;
mod lut;
mod util;

/// A 2D point
pub type Point2d = Point2<f64>;

/// A 2D vector
pub type Vector2d = Vector2<f64>;
