//! Generators for coordinate axes and predictable gridded data.
//!
//! Data generators produce values whose position can be read back from the
//! value itself, so tests can check that indexing and reshaping are right.

/// Evenly spaced values `start, start + step, ...` with `n` entries.
///
/// ```
/// use test_utils::linspace;
///
/// assert_eq!(linspace(0.0, 5.0, 3), vec![0.0, 5.0, 10.0]);
/// ```
pub fn linspace(start: f32, step: f32, n: usize) -> Vec<f32> {
    (0..n).map(|i| start + step * i as f32).collect()
}

/// Global longitudes `0, 5, ..., 355` (72 values).
pub fn global_lons() -> Vec<f32> {
    linspace(0.0, 5.0, 72)
}

/// Global longitudes `-180, -175, ..., 175` (72 values).
pub fn global_lons_dateline() -> Vec<f32> {
    linspace(-180.0, 5.0, 72)
}

/// Global latitudes `-90, -85, ..., 90` (37 values).
pub fn global_lats() -> Vec<f32> {
    linspace(-90.0, 5.0, 37)
}

/// Pressure-like levels `1000, 950, ...` decreasing by 50 (`n` values).
pub fn pressure_levels(n: usize) -> Vec<f32> {
    linspace(1000.0, -50.0, n)
}

/// Height-like levels `0, 1, 2, ...` (`n` values).
pub fn index_levels(n: usize) -> Vec<f32> {
    linspace(0.0, 1.0, n)
}

/// Surface data with `value(i, j) = i * 1000 + j`, latitude-major.
///
/// ```
/// use test_utils::create_surface_data;
///
/// let data = create_surface_data(10, 5);
/// assert_eq!(data.len(), 50);
/// assert_eq!(data[1], 1000.0);  // i=1, j=0
/// assert_eq!(data[10], 1.0);    // i=0, j=1
/// ```
pub fn create_surface_data(nlon: usize, nlat: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(nlon * nlat);
    for j in 0..nlat {
        for i in 0..nlon {
            data.push((i * 1000 + j) as f32);
        }
    }
    data
}

/// Volume data with `value(i, j, k) = k * 100000 + i * 100 + j`, level-major then latitude-major.
///
/// Exact in `f32` as long as the indices stay below 100 and the level count
/// stays below 100.
pub fn create_volume_data(nlon: usize, nlat: usize, nlev: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(nlon * nlat * nlev);
    for k in 0..nlev {
        for j in 0..nlat {
            for i in 0..nlon {
                data.push((k * 100_000 + i * 100 + j) as f32);
            }
        }
    }
    data
}

/// Temperature-like surface data in Kelvin, warm at the equator.
pub fn create_temperature_data(lats: &[f32], nlon: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(nlon * lats.len());
    for lat in lats {
        let t = 300.0 - 60.0 * (lat.to_radians().sin()).powi(2);
        data.extend(std::iter::repeat(t).take(nlon));
    }
    data
}

/// Same as [`create_surface_data`] but with `fill` at every index in `missing`.
pub fn create_surface_data_with_fill(nlon: usize, nlat: usize, fill: f32, missing: &[usize]) -> Vec<f32> {
    let mut data = create_surface_data(nlon, nlat);
    for &idx in missing {
        if idx < data.len() {
            data[idx] = fill;
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_axes() {
        let lons = global_lons();
        assert_eq!(lons.len(), 72);
        assert_eq!(lons[0], 0.0);
        assert_eq!(lons[71], 355.0);

        let lats = global_lats();
        assert_eq!(lats.len(), 37);
        assert_eq!(lats[0], -90.0);
        assert_eq!(lats[36], 90.0);

        assert_eq!(global_lons_dateline()[0], -180.0);
        assert_eq!(pressure_levels(3), vec![1000.0, 950.0, 900.0]);
    }

    #[test]
    fn test_volume_data_layout() {
        let data = create_volume_data(4, 3, 2);
        assert_eq!(data.len(), 24);
        // (i=1, j=2, k=1) -> (1*3 + 2)*4 + 1 = 21
        assert_eq!(data[21], 100_102.0);
    }

    #[test]
    fn test_temperature_data_is_zonal() {
        let lats = global_lats();
        let data = create_temperature_data(&lats, 4);
        assert_eq!(data.len(), 4 * 37);
        assert_eq!(data[0], data[3]);
        assert!(data[18 * 4] > data[0]);
    }

    #[test]
    fn test_fill_placement() {
        let data = create_surface_data_with_fill(3, 3, -999.0, &[4, 100]);
        assert_eq!(data[4], -999.0);
        assert_eq!(data[0], 0.0);
    }
}
