//! Standard grid shapes used across the test suite.

/// Shape of a longitude/latitude/level grid, with regular axis spacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridShape {
    pub nlon: usize,
    pub nlat: usize,
    pub nlev: usize,
    pub lon0: f32,
    pub dlon: f32,
    pub lat0: f32,
    pub dlat: f32,
}

impl GridShape {
    /// Points in one horizontal layer.
    pub fn horizontal_size(&self) -> usize {
        self.nlon * self.nlat
    }

    /// Points in the whole grid.
    pub fn size(&self) -> usize {
        self.horizontal_size() * self.nlev
    }

    pub fn lons(&self) -> Vec<f32> {
        crate::linspace(self.lon0, self.dlon, self.nlon)
    }

    pub fn lats(&self) -> Vec<f32> {
        crate::linspace(self.lat0, self.dlat, self.nlat)
    }
}

/// Common shapes.
pub mod shapes {
    use super::GridShape;

    /// Global 5 degree grid with 18 levels, longitudes 0..355.
    pub const GLOBAL_5DEG: GridShape = GridShape {
        nlon: 72,
        nlat: 37,
        nlev: 18,
        lon0: 0.0,
        dlon: 5.0,
        lat0: -90.0,
        dlat: 5.0,
    };

    /// Global 5 degree grid, longitudes -180..175, north to south.
    pub const GLOBAL_5DEG_NORTH_FIRST: GridShape = GridShape {
        nlon: 72,
        nlat: 37,
        nlev: 1,
        lon0: -180.0,
        dlon: 5.0,
        lat0: 90.0,
        dlat: -5.0,
    };

    /// Regional 1 degree box over the North Atlantic; longitudes do not wrap.
    pub const REGIONAL: GridShape = GridShape {
        nlon: 41,
        nlat: 21,
        nlev: 5,
        lon0: -60.0,
        dlon: 1.0,
        lat0: 30.0,
        dlat: 1.0,
    };

    /// Tiny grid for exhaustive index checks.
    pub const TINY: GridShape = GridShape {
        nlon: 4,
        nlat: 3,
        nlev: 2,
        lon0: 0.0,
        dlon: 90.0,
        lat0: -45.0,
        dlat: 45.0,
    };
}
