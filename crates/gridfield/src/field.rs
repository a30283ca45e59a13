//! The capabilities shared by surface and volume grids.
//!
//! [`GridField`] is implemented by [`SurfaceGrid`], [`VolumeGrid`] and the
//! [`AnyGrid`] wrapper. Implementors supply their axes, buffer and area
//! table; flat indexing, value access, fill handling, unit conversion and
//! cursors come from the provided methods.

use std::fmt;

use bytes::{Buf, BufMut, Bytes};

use crate::axis::{Axis, LongitudeAxis};
use crate::config::GridConfig;
use crate::cursor::{Cursor, CursorMut};
use crate::error::{GridError, GridResult};
use crate::flags::{CompatFlags, GridStatus};
use crate::meta::FieldMeta;
use crate::surface::SurfaceGrid;
use crate::volume::VolumeGrid;
use crate::Real;

/// Which concrete grid a value is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridKind {
    Surface,
    Volume,
}

impl fmt::Display for GridKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridKind::Surface => write!(f, "surface"),
            GridKind::Volume => write!(f, "volume"),
        }
    }
}

/// Axis lengths of a grid. Surfaces have `nlev == 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shape {
    pub nlon: usize,
    pub nlat: usize,
    pub nlev: usize,
}

impl Shape {
    pub fn new(nlon: usize, nlat: usize, nlev: usize) -> Self {
        Self { nlon, nlat, nlev }
    }

    /// Points in one horizontal level.
    pub fn horizontal(&self) -> usize {
        self.nlon * self.nlat
    }

    pub fn size(&self) -> usize {
        self.horizontal() * self.nlev
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// `(i, j, k)` of a flat offset. Longitude varies fastest.
    pub fn split(&self, flat: usize) -> (usize, usize, usize) {
        if self.is_empty() {
            return (0, 0, 0);
        }
        let i = flat % self.nlon;
        let rest = flat / self.nlon;
        (i, rest % self.nlat, rest / self.nlat)
    }

    pub fn join(&self, i: usize, j: usize, k: usize) -> usize {
        (k * self.nlat + j) * self.nlon + i
    }
}

fn same(a: Real, b: Real) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

fn no_data(kind: GridKind) -> GridError {
    GridError::bad_data_request(format!("{kind} grid has no data loaded"))
}

/// An empty buffer with room for `n` values.
pub(crate) fn scratch<T>(n: usize, what: &str) -> GridResult<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(n)
        .map_err(|e| GridError::mem_req(format!("{what} ({n} values): {e}")))?;
    Ok(buf)
}

fn checked_index(idx: isize, len: usize, what: &str) -> GridResult<usize> {
    usize::try_from(idx)
        .ok()
        .filter(|&v| v < len)
        .ok_or_else(|| GridError::bad_data_request(format!("{what} index {idx} outside 0..{len}")))
}

/// A gridded scalar field on a longitude/latitude(/level) lattice.
pub trait GridField {
    fn kind(&self) -> GridKind;

    fn config(&self) -> &GridConfig;

    fn meta(&self) -> &FieldMeta;

    fn meta_mut(&mut self) -> &mut FieldMeta;

    fn lon_axis(&self) -> &LongitudeAxis;

    fn lat_axis(&self) -> &Axis;

    fn shape(&self) -> Shape;

    /// The data buffer, if one has been loaded.
    fn data(&self) -> Option<&[Real]>;

    fn data_mut(&mut self) -> Option<&mut [Real]>;

    /// Take ownership of a buffer laid out `(k * nlat + j) * nlon + i`.
    fn absorb_data(&mut self, data: Vec<Real>) -> GridResult<()>;

    /// Cached per-gridpoint solid angles of one horizontal level.
    fn area_table(&self) -> &[Real];

    /// Mutable buffer alongside the area table, for writable cursors.
    fn data_and_areas_mut(&mut self) -> (Option<&mut [Real]>, &[Real]);

    /// Drop axes, buffer and metadata back to the empty state.
    fn clear(&mut self);

    fn has_data(&self) -> bool {
        self.data().is_some()
    }

    /// Structural status: missing dimensions, or a buffer of the wrong length.
    fn status(&self) -> GridStatus {
        let shape = self.shape();
        let mut status = GridStatus::NONE;
        if shape.is_empty() {
            status |= GridStatus::NO_DIMS;
        }
        if let Some(data) = self.data() {
            if data.len() != shape.size() {
                status |= GridStatus::GRID_ERR;
            }
        }
        status
    }

    /// Number of gridpoints the axes describe.
    fn data_size(&self) -> GridResult<usize> {
        let shape = self.shape();
        if shape.is_empty() {
            Err(GridError::no_dims(format!("{} grid has empty axes", self.kind())))
        } else {
            Ok(shape.size())
        }
    }

    /// Copy `data` in as the grid's buffer.
    fn load_data(&mut self, data: &[Real]) -> GridResult<()> {
        self.absorb_data(data.to_vec())
    }

    fn value_at(&self, flat: usize) -> GridResult<Real> {
        let data = self.data().ok_or_else(|| no_data(self.kind()))?;
        data.get(flat)
            .copied()
            .ok_or_else(|| GridError::bad_data_request(format!("flat index {flat} outside {} values", data.len())))
    }

    fn values(&self, indices: &[usize]) -> GridResult<Vec<Real>> {
        let mut out = scratch(indices.len(), "gridpoint values")?;
        for &idx in indices {
            out.push(self.value_at(idx)?);
        }
        Ok(out)
    }

    /// A copy of the whole buffer.
    fn dump(&self) -> GridResult<Vec<Real>> {
        let data = self.data().ok_or_else(|| no_data(self.kind()))?;
        let mut out = scratch(data.len(), "grid dump")?;
        out.extend_from_slice(data);
        Ok(out)
    }

    fn split_flat(&self, flat: usize) -> GridResult<(usize, usize, usize)> {
        let size = self.data_size()?;
        if flat >= size {
            return Err(GridError::bad_data_request(format!("flat index {flat} outside 0..{size}")));
        }
        Ok(self.shape().split(flat))
    }

    /// Flat offset of `(i, j, k)`. `i` wraps on a global longitude axis.
    fn join_flat(&self, i: isize, j: isize, k: isize) -> GridResult<usize> {
        let shape = self.shape();
        let i = self.lon_axis().iwrap(i)?;
        let j = checked_index(j, shape.nlat, "latitude")?;
        let k = checked_index(k, shape.nlev, "level")?;
        Ok(shape.join(i, j, k))
    }

    /// Solid angle represented by the gridpoint at `flat`.
    fn area_at(&self, flat: usize) -> GridResult<Real> {
        let size = self.data_size()?;
        if flat >= size {
            return Err(GridError::bad_data_request(format!("flat index {flat} outside 0..{size}")));
        }
        let nh = self.shape().horizontal();
        Ok(self.area_table()[flat % nh])
    }

    fn cell_area(&self, i: isize, j: isize) -> GridResult<Real> {
        let flat = self.join_flat(i, j, 0)?;
        self.area_at(flat)
    }

    fn quantity(&self) -> &str {
        self.meta().quantity()
    }

    fn units(&self) -> &str {
        self.meta().units()
    }

    fn fill_value(&self) -> Real {
        self.meta().fill_value()
    }

    fn time(&self) -> f64 {
        self.meta().time()
    }

    /// Change the fill value, rewriting samples that held the old one.
    fn set_fill_value(&mut self, fill: Real) {
        let old = self.meta().fill_value();
        if let Some(data) = self.data_mut() {
            for v in data.iter_mut().filter(|v| same(**v, old)) {
                *v = fill;
            }
        }
        self.meta_mut().set_fill_value(fill);
    }

    /// Convert the data into `units`, given that unit's MKS scale and offset.
    ///
    /// Fill samples are left alone.
    fn transform(&mut self, units: &str, scale: Real, offset: Real) {
        let meta = self.meta();
        let s = meta.mks_scale() / scale;
        let o = (meta.mks_offset() - offset) / scale;
        let fill = meta.fill_value();
        if let Some(data) = self.data_mut() {
            for v in data.iter_mut().filter(|v| !same(**v, fill)) {
                *v = *v * s + o;
            }
        }
        self.meta_mut().set_units(units, scale, offset);
    }

    fn duplicate(&self) -> Self
    where
        Self: Sized + Clone,
    {
        self.clone()
    }

    /// Cursor over every gridpoint.
    fn cursor(&self) -> GridResult<Cursor<'_>> {
        let shape = self.shape();
        let data = self.data().ok_or_else(|| no_data(self.kind()))?;
        let end = data.len().min(shape.size());
        Ok(Cursor::new(data, self.area_table(), shape, 0, end))
    }

    fn cursor_mut(&mut self) -> GridResult<CursorMut<'_>> {
        let shape = self.shape();
        let kind = self.kind();
        let (data, areas) = self.data_and_areas_mut();
        let data = data.ok_or_else(|| no_data(kind))?;
        let end = data.len().min(shape.size());
        Ok(CursorMut::new(data, areas, shape, 0, end))
    }

    /// Cursor over the gridpoints of level `k`.
    fn level_cursor(&self, k: usize) -> GridResult<Cursor<'_>> {
        let shape = self.shape();
        let (begin, end) = level_span(shape, k)?;
        let data = self.data().ok_or_else(|| no_data(self.kind()))?;
        if end > data.len() {
            return Err(GridError::bad_data_request(format!("level {k} runs past a buffer of {}", data.len())));
        }
        Ok(Cursor::new(data, self.area_table(), shape, begin, end))
    }

    fn level_cursor_mut(&mut self, k: usize) -> GridResult<CursorMut<'_>> {
        let shape = self.shape();
        let kind = self.kind();
        let (begin, end) = level_span(shape, k)?;
        let (data, areas) = self.data_and_areas_mut();
        let data = data.ok_or_else(|| no_data(kind))?;
        if end > data.len() {
            return Err(GridError::bad_data_request(format!("level {k} runs past a buffer of {}", data.len())));
        }
        Ok(CursorMut::new(data, areas, shape, begin, end))
    }
}

fn level_span(shape: Shape, k: usize) -> GridResult<(usize, usize)> {
    if k >= shape.nlev {
        return Err(GridError::bad_data_index(format!("level {k} outside 0..{}", shape.nlev)));
    }
    let nh = shape.horizontal();
    Ok((k * nh, (k + 1) * nh))
}

/// Either kind of grid, for code that handles both.
#[derive(Debug, Clone)]
pub enum AnyGrid {
    Surface(SurfaceGrid),
    Volume(VolumeGrid),
}

macro_rules! each_grid {
    ($self:expr, $g:ident => $body:expr) => {
        match $self {
            AnyGrid::Surface($g) => $body,
            AnyGrid::Volume($g) => $body,
        }
    };
}
pub(crate) use each_grid;

impl AnyGrid {
    pub fn as_surface(&self) -> Option<&SurfaceGrid> {
        match self {
            AnyGrid::Surface(g) => Some(g),
            AnyGrid::Volume(_) => None,
        }
    }

    pub fn as_volume(&self) -> Option<&VolumeGrid> {
        match self {
            AnyGrid::Volume(g) => Some(g),
            AnyGrid::Surface(_) => None,
        }
    }

    /// Compare against another grid of either kind.
    ///
    /// A volume checked against a surface never has a compatible vertical;
    /// a surface checked against a volume is never compatible.
    pub fn compatible(&self, other: &AnyGrid, flags: CompatFlags) -> bool {
        match (self, other) {
            (AnyGrid::Surface(a), AnyGrid::Surface(b)) => a.compatible(b, flags),
            (AnyGrid::Volume(a), AnyGrid::Volume(b)) => a.compatible(b, flags),
            (AnyGrid::Volume(a), AnyGrid::Surface(b)) => a.compatible_surface(b, flags),
            (AnyGrid::Surface(_), AnyGrid::Volume(_)) => false,
        }
    }

    pub fn serialize(&self, buf: &mut impl BufMut) -> GridResult<()> {
        each_grid!(self, g => g.serialize(buf))
    }

    pub fn to_bytes(&self) -> GridResult<Bytes> {
        each_grid!(self, g => g.to_bytes())
    }

    pub fn deserialize_surface(buf: &mut impl Buf) -> GridResult<Self> {
        SurfaceGrid::deserialize(buf).map(AnyGrid::Surface)
    }

    pub fn deserialize_volume(buf: &mut impl Buf) -> GridResult<Self> {
        VolumeGrid::deserialize(buf).map(AnyGrid::Volume)
    }
}

impl From<SurfaceGrid> for AnyGrid {
    fn from(grid: SurfaceGrid) -> Self {
        AnyGrid::Surface(grid)
    }
}

impl From<VolumeGrid> for AnyGrid {
    fn from(grid: VolumeGrid) -> Self {
        AnyGrid::Volume(grid)
    }
}

impl GridField for AnyGrid {
    fn kind(&self) -> GridKind {
        each_grid!(self, g => g.kind())
    }

    fn config(&self) -> &GridConfig {
        each_grid!(self, g => g.config())
    }

    fn meta(&self) -> &FieldMeta {
        each_grid!(self, g => g.meta())
    }

    fn meta_mut(&mut self) -> &mut FieldMeta {
        each_grid!(self, g => g.meta_mut())
    }

    fn lon_axis(&self) -> &LongitudeAxis {
        each_grid!(self, g => g.lon_axis())
    }

    fn lat_axis(&self) -> &Axis {
        each_grid!(self, g => g.lat_axis())
    }

    fn shape(&self) -> Shape {
        each_grid!(self, g => g.shape())
    }

    fn data(&self) -> Option<&[Real]> {
        each_grid!(self, g => g.data())
    }

    fn data_mut(&mut self) -> Option<&mut [Real]> {
        each_grid!(self, g => g.data_mut())
    }

    fn absorb_data(&mut self, data: Vec<Real>) -> GridResult<()> {
        each_grid!(self, g => g.absorb_data(data))
    }

    fn area_table(&self) -> &[Real] {
        each_grid!(self, g => g.area_table())
    }

    fn data_and_areas_mut(&mut self) -> (Option<&mut [Real]>, &[Real]) {
        each_grid!(self, g => g.data_and_areas_mut())
    }

    fn clear(&mut self) {
        each_grid!(self, g => g.clear())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_reports_failed_allocation() {
        let buf: Vec<Real> = scratch(16, "small").unwrap();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 16);

        let err = scratch::<Real>(usize::MAX, "huge").unwrap_err();
        assert!(matches!(err, GridError::BadMemReq(_)));
        assert!(err.to_string().contains("huge"));
    }

    #[test]
    fn test_shape_split_join() {
        let shape = Shape::new(4, 3, 2);
        assert_eq!(shape.size(), 24);
        assert_eq!(shape.join(1, 2, 1), 21);
        assert_eq!(shape.split(21), (1, 2, 1));
        for flat in 0..shape.size() {
            let (i, j, k) = shape.split(flat);
            assert_eq!(shape.join(i, j, k), flat);
        }
    }

    #[test]
    fn test_empty_shape_split() {
        assert_eq!(Shape::default().split(7), (0, 0, 0));
        assert!(Shape::new(3, 0, 1).is_empty());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(GridKind::Volume.to_string(), "volume");
    }
}
