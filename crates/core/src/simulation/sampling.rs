//! Bilinear wind sampling over cached cells
//!
//! Each cached cell holds one wind vector, taken at its centre. Cell centres
//! form a regular lattice offset by half a cell from the key grid, and a query
//! point is blended from the four lattice nodes around it:
//!
//! ```text
//!   q01 ──────── q11        fx: fraction east of the west column
//!    │      · p   │         fy: fraction north of the south row
//!   q00 ──────── q10
//! ```
//!
//! Sampling only ever reads the cache. Missing corners degrade gracefully:
//! with fewer than four corners cached, the nearest available corner's raw
//! vector is used; with none, calm air.

use crate::cache::CacheSnapshot;
use crate::core_types::Vec2;
use crate::grid::CellKey;

/// Read-only access to cached wind by cell
pub trait CellLookup {
    /// Wind `(u, v)` stored for `key`, if fresh
    fn wind(&self, key: CellKey) -> Option<Vec2>;

    /// Grid resolution the keys are built with
    fn resolution_deg(&self) -> f64;
}

impl CellLookup for CacheSnapshot<'_> {
    #[inline]
    fn wind(&self, key: CellKey) -> Option<Vec2> {
        self.get(key).map(crate::wind::WindCell::wind)
    }

    #[inline]
    fn resolution_deg(&self) -> f64 {
        CacheSnapshot::resolution_deg(self)
    }
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Standard bilinear blend of four corner values
///
/// `q10` lies east of `q00`, `q01` north of it; `fx`/`fy` are in `[0, 1]`.
/// Written as nested lerps so equal corners reproduce their value exactly.
#[inline]
#[must_use]
pub fn bilinear(q00: f64, q10: f64, q01: f64, q11: f64, fx: f64, fy: f64) -> f64 {
    lerp(lerp(q00, q10, fx), lerp(q01, q11, fx), fy)
}

/// Wind at `(lat, lon)` interpolated from the surrounding cached cells
pub fn sample_wind<L: CellLookup + ?Sized>(lookup: &L, lat: f64, lon: f64) -> Vec2 {
    let res = lookup.resolution_deg();
    // Lattice node i sits at the centre of cell i: (i + 0.5) * res
    let gx = lon / res - 0.5;
    let gy = lat / res - 0.5;
    let x0 = gx.floor();
    let y0 = gy.floor();
    let fx = gx - x0;
    let fy = gy - y0;

    let base = CellKey::new(y0 as i32, x0 as i32);
    let corners = [
        (lookup.wind(base), (1.0 - fx) * (1.0 - fy)),
        (lookup.wind(base.offset(0, 1)), fx * (1.0 - fy)),
        (lookup.wind(base.offset(1, 0)), (1.0 - fx) * fy),
        (lookup.wind(base.offset(1, 1)), fx * fy),
    ];

    if let [(Some(q00), _), (Some(q10), _), (Some(q01), _), (Some(q11), _)] = corners {
        return Vec2::new(
            bilinear(q00.x, q10.x, q01.x, q11.x, fx, fy),
            bilinear(q00.y, q10.y, q01.y, q11.y, fx, fy),
        );
    }

    // Partial coverage: nearest cached corner's raw vector
    corners
        .iter()
        .filter_map(|&(wind, weight)| wind.map(|w| (w, weight)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map_or_else(Vec2::zeros, |(wind, _)| wind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rustc_hash::FxHashMap;

    struct MapLookup {
        res: f64,
        cells: FxHashMap<CellKey, Vec2>,
    }

    impl CellLookup for MapLookup {
        fn wind(&self, key: CellKey) -> Option<Vec2> {
            self.cells.get(&key).copied()
        }

        fn resolution_deg(&self) -> f64 {
            self.res
        }
    }

    fn lookup(cells: &[((i32, i32), (f64, f64))]) -> MapLookup {
        MapLookup {
            res: 1.0,
            cells: cells
                .iter()
                .map(|&((lat, lon), (u, v))| (CellKey::new(lat, lon), Vec2::new(u, v)))
                .collect(),
        }
    }

    #[test]
    fn test_bilinear_hand_computed() {
        // Corners 0, 10, 20, 30 at fx = 0.25, fy = 0.75:
        // 10*0.25*0.25 + 20*0.75*0.75 + 30*0.25*0.75 = 0.625 + 11.25 + 5.625
        assert_relative_eq!(bilinear(0.0, 10.0, 20.0, 30.0, 0.25, 0.75), 17.5);
        assert_relative_eq!(bilinear(0.0, 10.0, 20.0, 30.0, 0.0, 0.0), 0.0);
        assert_relative_eq!(bilinear(0.0, 10.0, 20.0, 30.0, 1.0, 1.0), 30.0);
        assert_relative_eq!(bilinear(0.0, 10.0, 20.0, 30.0, 0.5, 0.5), 15.0);
    }

    #[test]
    fn test_sample_interpolates_between_centres() {
        // Centres at (0.5, 0.5), (0.5, 1.5), (1.5, 0.5), (1.5, 1.5)
        let cells = lookup(&[
            ((0, 0), (0.0, 0.0)),
            ((0, 1), (10.0, 1.0)),
            ((1, 0), (20.0, 2.0)),
            ((1, 1), (30.0, 3.0)),
        ]);
        // lon 0.75 -> fx 0.25, lat 1.25 -> fy 0.75
        let w = sample_wind(&cells, 1.25, 0.75);
        assert_relative_eq!(w.x, 17.5, epsilon = 1e-12);
        assert_relative_eq!(w.y, 1.75, epsilon = 1e-12);
    }

    #[test]
    fn test_uniform_corners_sample_exactly() {
        let cells = lookup(&[
            ((0, 0), (5.0, 0.0)),
            ((0, 1), (5.0, 0.0)),
            ((1, 0), (5.0, 0.0)),
            ((1, 1), (5.0, 0.0)),
        ]);
        for (lat, lon) in [(0.5, 0.5), (0.9, 1.1), (1.49, 1.49), (1.0, 0.6)] {
            let w = sample_wind(&cells, lat, lon);
            assert_eq!((w.x, w.y), (5.0, 0.0), "at ({lat}, {lon})");
        }
    }

    #[test]
    fn test_partial_coverage_uses_nearest_corner() {
        let cells = lookup(&[((0, 0), (1.0, 1.0)), ((1, 1), (9.0, 9.0))]);
        // Close to the (1, 1) centre
        let w = sample_wind(&cells, 1.4, 1.4);
        assert_eq!((w.x, w.y), (9.0, 9.0));
        // Close to the (0, 0) centre
        let w = sample_wind(&cells, 0.6, 0.6);
        assert_eq!((w.x, w.y), (1.0, 1.0));
    }

    #[test]
    fn test_no_coverage_is_calm() {
        let cells = lookup(&[]);
        assert_eq!(sample_wind(&cells, 12.3, 45.6), Vec2::zeros());
    }

    #[test]
    fn test_negative_coordinates_pick_correct_corners() {
        let cells = lookup(&[
            ((-1, -1), (2.0, 0.0)),
            ((-1, 0), (4.0, 0.0)),
            ((0, -1), (2.0, 0.0)),
            ((0, 0), (4.0, 0.0)),
        ]);
        // Halfway between centres -0.5 and 0.5 in longitude
        let w = sample_wind(&cells, 0.0, 0.0);
        assert_relative_eq!(w.x, 3.0, epsilon = 1e-12);
    }
}
