//! Vector type alias for planar positions and wind components.

use nalgebra::Vector2;

/// 2D vector type for wind components and projected positions.
///
/// This is a simple alias for `nalgebra::Vector2<f64>`. Wind vectors store
/// `(u, v)` as `(x, y)`: eastward then northward, in m/s.
pub type Vec2 = Vector2<f64>;
