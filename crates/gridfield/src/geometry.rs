//! Solid-angle weights of gridpoints.
//!
//! A gridpoint's cell runs half-way to each neighbour. Its area is the
//! difference of the sines of the bounding latitudes times the longitude
//! width in radians, so a whole globe sums to 4π.

use crate::axis::{Axis, LongitudeAxis};
use crate::Real;

fn lat_band(lats: &[Real], j: usize) -> f64 {
    let n = lats.len();
    let here = f64::from(lats[j]);
    let lat1 = if j > 0 { (f64::from(lats[j - 1]) + here) / 2.0 } else { here };
    let lat2 = if j + 1 < n { (here + f64::from(lats[j + 1])) / 2.0 } else { here };
    (lat2.to_radians().sin() - lat1.to_radians().sin()).abs()
}

fn lon_width(lons: &[Real], wraps: bool, i: usize) -> f64 {
    let n = lons.len();
    let at = |k: usize| f64::from(lons[k]);

    let lon1 = if i > 0 {
        (at(i - 1) + at(i)) / 2.0
    } else if wraps && n > 1 {
        let prev = if at(n - 1) > at(0) { at(n - 1) - 360.0 } else { at(n - 1) + 360.0 };
        (at(0) + prev) / 2.0
    } else {
        at(0)
    };

    let lon2 = if i + 1 < n {
        (at(i) + at(i + 1)) / 2.0
    } else if wraps && n > 1 {
        let next = if at(0) < at(n - 2) { at(0) + 360.0 } else { at(0) - 360.0 };
        (next + at(n - 1)) / 2.0
    } else {
        at(i)
    };

    let mut dlon = (lon2 - lon1).abs();
    while dlon > 360.0 {
        dlon -= 360.0;
    }
    dlon.to_radians()
}

/// Area of the cell around gridpoint `(i, j)`. Indices must be in range.
pub fn cell_area(lons: &LongitudeAxis, lats: &Axis, i: usize, j: usize) -> Real {
    (lon_width(lons.values(), lons.wraps(), i) * lat_band(lats.values(), j)) as Real
}

/// Areas of every gridpoint, latitude-major.
pub fn area_table(lons: &LongitudeAxis, lats: &Axis) -> Vec<Real> {
    let widths: Vec<f64> = (0..lons.len())
        .map(|i| lon_width(lons.values(), lons.wraps(), i))
        .collect();
    let mut table = Vec::with_capacity(lons.len() * lats.len());
    for j in 0..lats.len() {
        let band = lat_band(lats.values(), j);
        table.extend(widths.iter().map(|w| (w * band) as Real));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::LoadFlags;
    use std::f64::consts::PI;

    fn axes(lon0: Real) -> (LongitudeAxis, Axis) {
        let lons =
            LongitudeAxis::from_values((0..72).map(|i| lon0 + i as Real * 5.0).collect(), LoadFlags::NONE)
                .unwrap();
        let lats = Axis::from_values((0..37).map(|j| -90.0 + j as Real * 5.0).collect()).unwrap();
        (lons, lats)
    }

    #[test]
    fn test_globe_sums_to_four_pi() {
        let (lons, lats) = axes(0.0);
        let total: f64 = area_table(&lons, &lats).iter().map(|a| f64::from(*a)).sum();
        assert!((total - 4.0 * PI).abs() < 0.02, "total {total}");
    }

    #[test]
    fn test_seam_cells_match_interior_cells() {
        let (lons, lats) = axes(-180.0);
        let first = cell_area(&lons, &lats, 0, 18);
        let middle = cell_area(&lons, &lats, 36, 18);
        let last = cell_area(&lons, &lats, 71, 18);
        assert!((first - middle).abs() < 1e-6);
        assert!((last - middle).abs() < 1e-6);
    }

    #[test]
    fn test_non_wrapping_edges_are_half_cells() {
        let lons = LongitudeAxis::from_values(vec![0.0, 10.0, 20.0], LoadFlags::NONE).unwrap();
        let lats = Axis::from_values(vec![-10.0, 0.0, 10.0]).unwrap();
        let edge = cell_area(&lons, &lats, 0, 1);
        let inner = cell_area(&lons, &lats, 1, 1);
        assert!((inner - 2.0 * edge).abs() < 1e-6);
    }

    #[test]
    fn test_table_layout_matches_cells() {
        let (lons, lats) = axes(0.0);
        let table = area_table(&lons, &lats);
        assert_eq!(table.len(), 72 * 37);
        assert_eq!(table[5 * 72 + 7], cell_area(&lons, &lats, 7, 5));
    }
}
