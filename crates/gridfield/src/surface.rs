//! Two-dimensional longitude/latitude grids.

use std::sync::OnceLock;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::axis::{Axis, LongitudeAxis};
use crate::codec;
use crate::config::{FormatVersion, GridConfig};
use crate::error::{GridError, GridResult};
use crate::field::{GridField, GridKind, Shape};
use crate::flags::{CompatFlags, FetchFlags, LoadFlags};
use crate::geometry;
use crate::meta::{FieldMeta, NO_QUANTITY};
use crate::protocol::{self, Distributed, Distribution, Link};
use crate::Real;

const SURFACE_VERSION: i32 = 1;

/// Quantity name given to the grid returned by [`SurfaceGrid::areas`].
pub const AREA_QUANTITY: &str = "normalized_area";

/// A scalar field on one horizontal surface.
///
/// The buffer is latitude-major: gridpoint `(i, j)` lives at `j * nlon + i`.
/// Axes and buffer are independent, so a grid can have dimensions and no
/// data (a requester that has only fetched metadata, for instance).
#[derive(Debug, Clone)]
pub struct SurfaceGrid {
    meta: FieldMeta,
    surface: String,
    lons: LongitudeAxis,
    lats: Axis,
    data: Option<Vec<Real>>,
    config: GridConfig,
    dist: Option<Distribution>,
    areas: OnceLock<Vec<Real>>,
}

impl Default for SurfaceGrid {
    fn default() -> Self {
        Self::configured(GridConfig::default())
    }
}

impl SurfaceGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty grid using `config`, rejected with `BadConfig` if it fails validation.
    pub fn with_config(config: GridConfig) -> GridResult<Self> {
        Ok(Self::configured(config.checked()?))
    }

    pub(crate) fn configured(config: GridConfig) -> Self {
        Self {
            meta: FieldMeta::default(),
            surface: NO_QUANTITY.to_string(),
            lons: LongitudeAxis::with_config(config),
            lats: Axis::with_config(config),
            data: None,
            config,
            dist: None,
            areas: OnceLock::new(),
        }
    }

    /// Build a grid with axes and data in one step.
    pub fn from_parts(lons: Vec<Real>, lats: Vec<Real>, data: Vec<Real>, flags: LoadFlags) -> GridResult<Self> {
        let mut grid = Self::new();
        grid.absorb(lons, lats, data, flags)?;
        Ok(grid)
    }

    pub fn set_config(&mut self, config: GridConfig) -> GridResult<()> {
        let config = config.checked()?;
        self.config = config;
        self.lons.set_config(config);
        self.lats.set_config(config);
        Ok(())
    }

    pub fn surface(&self) -> &str {
        &self.surface
    }

    pub fn set_surface(&mut self, label: impl Into<String>) {
        self.surface = label.into();
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.lons.len(), self.lats.len())
    }

    pub fn longitudes(&self) -> &[Real] {
        self.lons.values()
    }

    pub fn latitudes(&self) -> &[Real] {
        self.lats.values()
    }

    pub fn longitude(&self, i: isize) -> GridResult<Real> {
        self.lons.value(i)
    }

    pub fn latitude(&self, j: usize) -> GridResult<Real> {
        self.lats.value(j)
    }

    pub fn wraps(&self) -> bool {
        self.lons.wraps()
    }

    /// Re-decide longitude wraparound.
    pub fn set_wraps(&mut self, flags: LoadFlags) {
        self.lons.set_wraps(flags);
        self.reset_areas();
    }

    /// Copy axes and data in. The data length must be `nlon * nlat`.
    pub fn load(&mut self, lons: &[Real], lats: &[Real], data: &[Real], flags: LoadFlags) -> GridResult<()> {
        self.absorb(lons.to_vec(), lats.to_vec(), data.to_vec(), flags)
    }

    /// Take ownership of axes and data.
    pub fn absorb(&mut self, lons: Vec<Real>, lats: Vec<Real>, data: Vec<Real>, flags: LoadFlags) -> GridResult<()> {
        let size = lons.len() * lats.len();
        if data.len() != size {
            return Err(GridError::incompat_coords(format!(
                "{} values for a {}x{} surface",
                data.len(),
                lons.len(),
                lats.len()
            )));
        }
        self.install_axes(lons, lats, flags)?;
        self.data = Some(data);
        debug!(nlon = self.lons.len(), nlat = self.lats.len(), wraps = self.lons.wraps(), "loaded surface grid");
        Ok(())
    }

    /// Set the axes without data. `PREFILL` allocates a fill-valued buffer.
    pub fn load_dims(&mut self, lons: &[Real], lats: &[Real], flags: LoadFlags) -> GridResult<()> {
        self.absorb_dims(lons.to_vec(), lats.to_vec(), flags)
    }

    pub fn absorb_dims(&mut self, lons: Vec<Real>, lats: Vec<Real>, flags: LoadFlags) -> GridResult<()> {
        self.install_axes(lons, lats, flags)?;
        self.data = flags
            .contains(LoadFlags::PREFILL)
            .then(|| vec![self.meta.fill_value(); self.lons.len() * self.lats.len()]);
        debug!(nlon = self.lons.len(), nlat = self.lats.len(), prefill = self.data.is_some(), "loaded surface dimensions");
        Ok(())
    }

    /// Replace the longitude axis, keeping any data.
    pub fn absorb_lons(&mut self, lons: Vec<Real>, flags: LoadFlags) -> GridResult<()> {
        let mut axis = LongitudeAxis::with_config(self.config);
        *axis.meta_mut() = self.lons.meta().clone();
        axis.absorb(lons, flags)?;
        self.lons = axis;
        self.reset_areas();
        Ok(())
    }

    /// Replace the latitude axis, keeping any data.
    pub fn absorb_lats(&mut self, lats: Vec<Real>) -> GridResult<()> {
        let mut axis = Axis::with_config(self.config);
        *axis.meta_mut() = self.lats.meta().clone();
        axis.absorb(lats)?;
        self.lats = axis;
        self.reset_areas();
        Ok(())
    }

    fn install_axes(&mut self, lons: Vec<Real>, lats: Vec<Real>, flags: LoadFlags) -> GridResult<()> {
        let mut lon_axis = LongitudeAxis::with_config(self.config);
        lon_axis.absorb(lons, flags)?;
        lon_axis.meta_mut().set_quantity("longitude");
        lon_axis.meta_mut().set_units("degrees_east", 1.0, 0.0);

        let mut lat_axis = Axis::with_config(self.config);
        lat_axis.absorb(lats)?;
        lat_axis.meta_mut().set_quantity("latitude");
        lat_axis.meta_mut().set_units("degrees_north", 1.0, 0.0);

        self.lons = lon_axis;
        self.lats = lat_axis;
        self.reset_areas();
        Ok(())
    }

    fn reset_areas(&mut self) {
        self.areas = OnceLock::new();
    }

    /// Value at `(i, j)`; `i` wraps on a global grid.
    pub fn value(&self, i: isize, j: isize) -> GridResult<Real> {
        if !self.has_data() {
            return Err(GridError::bad_data_request("surface grid has no data loaded"));
        }
        let flat = self.join_index(i, j)?;
        self.value_at(flat)
    }

    pub fn value_mut(&mut self, i: isize, j: isize) -> GridResult<&mut Real> {
        if self.data.is_none() {
            return Err(GridError::bad_data_request("surface grid has no data loaded"));
        }
        let flat = self.join_index(i, j)?;
        let data = self
            .data
            .as_mut()
            .ok_or_else(|| GridError::bad_data_request("surface grid has no data loaded"))?;
        let len = data.len();
        data.get_mut(flat)
            .ok_or_else(|| GridError::bad_data_request(format!("flat index {flat} outside {len} values")))
    }

    pub fn set_value(&mut self, i: isize, j: isize, v: Real) -> GridResult<()> {
        *self.value_mut(i, j)? = v;
        Ok(())
    }

    pub fn join_index(&self, i: isize, j: isize) -> GridResult<usize> {
        self.join_flat(i, j, 0)
    }

    pub fn split_index(&self, flat: usize) -> GridResult<(usize, usize)> {
        let (i, j, _) = self.split_flat(flat)?;
        Ok((i, j))
    }

    pub fn join_indices(&self, coords: &[(isize, isize)]) -> GridResult<Vec<usize>> {
        coords.iter().map(|&(i, j)| self.join_index(i, j)).collect()
    }

    pub fn split_indices(&self, flats: &[usize]) -> GridResult<Vec<(usize, usize)>> {
        flats.iter().map(|&flat| self.split_index(flat)).collect()
    }

    /// Bracketing longitude indices for `lon`.
    pub fn lon_index(&self, lon: Real) -> GridResult<(isize, isize)> {
        self.lons.index(lon)
    }

    pub fn lat_index(&self, lat: Real) -> GridResult<(isize, isize)> {
        self.lats.index(lat)
    }

    /// Values at `(i, j)` pairs, from the owner if this grid is distributed.
    pub fn gridpoints(&self, coords: &[(isize, isize)], flags: FetchFlags) -> GridResult<Vec<Real>> {
        let indices = self.join_indices(coords)?;
        self.gridpoints_flat(&indices, flags)
    }

    /// A grid of the same shape holding each gridpoint's solid angle.
    pub fn areas(&self) -> GridResult<SurfaceGrid> {
        self.data_size()?;
        let mut meta = self.meta.clone();
        meta.set_quantity(AREA_QUANTITY);
        meta.set_units("", 1.0, 0.0);
        meta.set_fill_value(-999.0);
        Ok(SurfaceGrid {
            meta,
            surface: String::new(),
            lons: self.lons.clone(),
            lats: self.lats.clone(),
            data: Some(self.area_table().to_vec()),
            config: self.config,
            dist: None,
            areas: self.areas.clone(),
        })
    }

    /// Compare the aspects of `other` selected by `flags`.
    pub fn compatible(&self, other: &SurfaceGrid, flags: CompatFlags) -> bool {
        if flags.contains(CompatFlags::HORIZ) && !(self.lons.compatible(&other.lons) && self.lats.compatible(&other.lats))
        {
            return false;
        }
        if flags.contains(CompatFlags::VERT) && self.surface != other.surface {
            return false;
        }
        if flags.contains(CompatFlags::TIME) && !same_time(&self.meta, &other.meta) {
            return false;
        }
        true
    }

    /// Strictly compatible and describing the same quantity.
    pub fn matches(&self, other: &SurfaceGrid) -> bool {
        self.compatible(other, CompatFlags::STRICT)
            && self.meta.quantity() == other.meta.quantity()
            && self.meta.units() == other.meta.units()
            && self.meta.fill_value().to_bits() == other.meta.fill_value().to_bits()
    }

    /// Write the grid in the configured format version.
    pub fn serialize(&self, buf: &mut impl BufMut) -> GridResult<()> {
        let data = self
            .data
            .as_deref()
            .ok_or_else(|| GridError::bad_data_request("cannot serialize a surface grid without data"))?;
        let size = self.data_size()?;
        if data.len() != size {
            return Err(GridError::incompat_coords(format!("{} values for {size} gridpoints", data.len())));
        }

        self.meta.serialize(buf);
        buf.put_i32_ne(SURFACE_VERSION);
        codec::put_str(buf, &self.surface);
        buf.put_i32_ne(self.config.format_version.as_i32());
        match self.config.format_version {
            FormatVersion::V1 => {
                buf.put_i32_ne(self.lons.len() as i32);
                buf.put_i32_ne(self.lats.len() as i32);
                codec::put_reals(buf, self.lons.values());
                codec::put_reals(buf, self.lats.values());
            }
            FormatVersion::V2 => {
                self.lons.serialize(buf);
                self.lats.serialize(buf);
            }
        }
        codec::put_reals(buf, data);
        Ok(())
    }

    pub fn to_bytes(&self) -> GridResult<Bytes> {
        let mut buf = BytesMut::new();
        self.serialize(&mut buf)?;
        Ok(buf.freeze())
    }

    pub fn deserialize(buf: &mut impl Buf) -> GridResult<Self> {
        Self::deserialize_with_config(buf, GridConfig::default())
    }

    /// Read a surface written in either format version.
    pub fn deserialize_with_config(buf: &mut impl Buf, config: GridConfig) -> GridResult<Self> {
        let config = config.checked()?;
        let meta = FieldMeta::deserialize(buf)?;
        let _surface_version = codec::get_i32(buf, "surface version")?;
        let surface = codec::get_str(buf, "surface label")?;
        let version = codec::get_i32(buf, "surface layout version")?;

        let (mut lons, mut lats) = match FormatVersion::from_i32(version) {
            Some(FormatVersion::V1) => {
                let nlon = codec::get_count(buf, "longitude count")?;
                let nlat = codec::get_count(buf, "latitude count")?;
                let lons = codec::get_reals(buf, nlon, "longitudes")?;
                let lats = codec::get_reals(buf, nlat, "latitudes")?;
                (LongitudeAxis::from_values(lons, LoadFlags::NONE)?, Axis::from_values(lats)?)
            }
            Some(FormatVersion::V2) => (LongitudeAxis::deserialize(buf)?, Axis::deserialize(buf)?),
            None => return Err(GridError::decode(format!("unknown surface layout version {version}"))),
        };
        lons.set_config(config);
        lats.set_config(config);

        let data = codec::get_reals(buf, lons.len() * lats.len(), "surface values")?;
        debug!(nlon = lons.len(), nlat = lats.len(), version, "deserialized surface grid");
        Ok(Self {
            meta,
            surface,
            lons,
            lats,
            data: Some(data),
            config,
            dist: None,
            areas: OnceLock::new(),
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> GridResult<Self> {
        let mut buf = bytes;
        Self::deserialize(&mut buf)
    }
}

pub(crate) fn same_time(a: &FieldMeta, b: &FieldMeta) -> bool {
    a.time() == b.time() && a.met_time() == b.met_time()
}

impl GridField for SurfaceGrid {
    fn kind(&self) -> GridKind {
        GridKind::Surface
    }

    fn config(&self) -> &GridConfig {
        &self.config
    }

    fn meta(&self) -> &FieldMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut FieldMeta {
        &mut self.meta
    }

    fn lon_axis(&self) -> &LongitudeAxis {
        &self.lons
    }

    fn lat_axis(&self) -> &Axis {
        &self.lats
    }

    fn shape(&self) -> Shape {
        Shape::new(self.lons.len(), self.lats.len(), 1)
    }

    fn data(&self) -> Option<&[Real]> {
        self.data.as_deref()
    }

    fn data_mut(&mut self) -> Option<&mut [Real]> {
        self.data.as_deref_mut()
    }

    fn absorb_data(&mut self, data: Vec<Real>) -> GridResult<()> {
        let size = self.data_size()?;
        if data.len() != size {
            return Err(GridError::incompat_coords(format!("{} values for {size} gridpoints", data.len())));
        }
        self.data = Some(data);
        debug!(size, "loaded surface data");
        Ok(())
    }

    fn area_table(&self) -> &[Real] {
        self.areas.get_or_init(|| geometry::area_table(&self.lons, &self.lats))
    }

    fn data_and_areas_mut(&mut self) -> (Option<&mut [Real]>, &[Real]) {
        let areas = self.areas.get_or_init(|| geometry::area_table(&self.lons, &self.lats));
        (self.data.as_deref_mut(), areas)
    }

    fn clear(&mut self) {
        self.meta = FieldMeta::default();
        self.surface = NO_QUANTITY.to_string();
        self.lons.clear();
        self.lats.clear();
        self.data = None;
        self.reset_areas();
        debug!("cleared surface grid");
    }
}

impl Distributed for SurfaceGrid {
    fn distribution(&self) -> Option<&Distribution> {
        self.dist.as_ref()
    }

    fn distribution_mut(&mut self) -> &mut Option<Distribution> {
        &mut self.dist
    }

    fn write_meta(&self, link: &Link<'_>) -> GridResult<()> {
        protocol::send_field_meta(link, &self.meta)?;
        link.send_str(&self.surface)?;
        protocol::send_lon_meta(link, &self.lons)?;
        protocol::send_axis_meta(link, &self.lats)
    }

    fn read_meta(&mut self, link: &Link<'_>) -> GridResult<()> {
        protocol::recv_field_meta(link, &mut self.meta)?;
        self.surface = link.recv_str()?;
        let mut lons = protocol::recv_lon_meta(link)?;
        let mut lats = protocol::recv_axis_meta(link)?;
        lons.set_config(self.config);
        lats.set_config(self.config);
        self.lons = lons;
        self.lats = lats;
        self.data = None;
        self.reset_areas();
        Ok(())
    }
}
