//! Three-dimensional longitude/latitude/level grids.

use std::sync::OnceLock;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::axis::{Axis, LongitudeAxis};
use crate::codec;
use crate::config::{FormatVersion, GridConfig};
use crate::cursor::{ProfileCursor, ProfileCursorMut};
use crate::error::{GridError, GridResult};
use crate::field::{GridField, GridKind, Shape};
use crate::flags::{CompatFlags, FetchFlags, GridStatus, LoadFlags};
use crate::geometry;
use crate::meta::FieldMeta;
use crate::protocol::{self, Distributed, Distribution, Link};
use crate::surface::{same_time, SurfaceGrid};
use crate::Real;

const VOLUME_VERSION: i32 = 1;

/// A scalar field on a stack of horizontal levels.
///
/// The buffer is level-major, then latitude, then longitude:
/// `(k * nlat + j) * nlon + i`. The vertical coordinate's quantity, units
/// and MKS pair live in the level axis metadata.
#[derive(Debug, Clone)]
pub struct VolumeGrid {
    meta: FieldMeta,
    lons: LongitudeAxis,
    lats: Axis,
    levels: Axis,
    data: Option<Vec<Real>>,
    config: GridConfig,
    dist: Option<Distribution>,
    areas: OnceLock<Vec<Real>>,
}

impl Default for VolumeGrid {
    fn default() -> Self {
        Self::configured(GridConfig::default())
    }
}

impl VolumeGrid {
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
            lons: LongitudeAxis::with_config(config),
            lats: Axis::with_config(config),
            levels: Axis::with_config(config),
            data: None,
            config,
            dist: None,
            areas: OnceLock::new(),
        }
    }

    pub fn from_parts(
        lons: Vec<Real>,
        lats: Vec<Real>,
        levels: Vec<Real>,
        data: Vec<Real>,
        flags: LoadFlags,
    ) -> GridResult<Self> {
        let mut grid = Self::new();
        grid.absorb(lons, lats, levels, data, flags)?;
        Ok(grid)
    }

    pub fn set_config(&mut self, config: GridConfig) -> GridResult<()> {
        let config = config.checked()?;
        self.config = config;
        self.lons.set_config(config);
        self.lats.set_config(config);
        self.levels.set_config(config);
        Ok(())
    }

    /// Name of the vertical coordinate, e.g. "pressure".
    pub fn vertical(&self) -> &str {
        self.levels.meta().quantity()
    }

    /// Rename the vertical coordinate. Its MKS pair resets to identity.
    pub fn set_vertical(&mut self, quantity: impl Into<String>) {
        let units = self.levels.meta().units().to_string();
        let meta = self.levels.meta_mut();
        meta.set_quantity(quantity);
        meta.set_units(units, 1.0, 0.0);
    }

    pub fn vunits(&self) -> &str {
        self.levels.meta().units()
    }

    /// MKS scale and offset of the vertical coordinate.
    pub fn vertical_mks(&self) -> (Real, Real) {
        let meta = self.levels.meta();
        (meta.mks_scale(), meta.mks_offset())
    }

    pub fn set_vunits(&mut self, units: impl Into<String>, scale: Real, offset: Real) {
        self.levels.meta_mut().set_units(units, scale, offset);
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        (self.lons.len(), self.lats.len(), self.levels.len())
    }

    pub fn longitudes(&self) -> &[Real] {
        self.lons.values()
    }

    pub fn latitudes(&self) -> &[Real] {
        self.lats.values()
    }

    pub fn levels(&self) -> &[Real] {
        self.levels.values()
    }

    pub fn level_axis(&self) -> &Axis {
        &self.levels
    }

    pub fn longitude(&self, i: isize) -> GridResult<Real> {
        self.lons.value(i)
    }

    pub fn latitude(&self, j: usize) -> GridResult<Real> {
        self.lats.value(j)
    }

    pub fn level(&self, k: usize) -> GridResult<Real> {
        self.levels.value(k)
    }

    pub fn wraps(&self) -> bool {
        self.lons.wraps()
    }

    pub fn set_wraps(&mut self, flags: LoadFlags) {
        self.lons.set_wraps(flags);
        self.reset_areas();
    }

    pub fn load(
        &mut self,
        lons: &[Real],
        lats: &[Real],
        levels: &[Real],
        data: &[Real],
        flags: LoadFlags,
    ) -> GridResult<()> {
        self.absorb(lons.to_vec(), lats.to_vec(), levels.to_vec(), data.to_vec(), flags)
    }

    /// Take ownership of axes and data. The data length must be `nlon * nlat * nlev`.
    pub fn absorb(
        &mut self,
        lons: Vec<Real>,
        lats: Vec<Real>,
        levels: Vec<Real>,
        data: Vec<Real>,
        flags: LoadFlags,
    ) -> GridResult<()> {
        let size = lons.len() * lats.len() * levels.len();
        if data.len() != size {
            return Err(GridError::incompat_coords(format!(
                "{} values for a {}x{}x{} volume",
                data.len(),
                lons.len(),
                lats.len(),
                levels.len()
            )));
        }
        self.install_axes(lons, lats, levels, flags)?;
        self.data = Some(data);
        debug!(
            nlon = self.lons.len(),
            nlat = self.lats.len(),
            nlev = self.levels.len(),
            wraps = self.lons.wraps(),
            "loaded volume grid"
        );
        Ok(())
    }

    pub fn load_dims(&mut self, lons: &[Real], lats: &[Real], levels: &[Real], flags: LoadFlags) -> GridResult<()> {
        self.absorb_dims(lons.to_vec(), lats.to_vec(), levels.to_vec(), flags)
    }

    /// Set the axes without data. `PREFILL` allocates a fill-valued buffer.
    pub fn absorb_dims(
        &mut self,
        lons: Vec<Real>,
        lats: Vec<Real>,
        levels: Vec<Real>,
        flags: LoadFlags,
    ) -> GridResult<()> {
        self.install_axes(lons, lats, levels, flags)?;
        let size = self.shape().size();
        self.data = flags
            .contains(LoadFlags::PREFILL)
            .then(|| vec![self.meta.fill_value(); size]);
        debug!(size, prefill = self.data.is_some(), "loaded volume dimensions");
        Ok(())
    }

    pub fn absorb_lons(&mut self, lons: Vec<Real>, flags: LoadFlags) -> GridResult<()> {
        let mut axis = LongitudeAxis::with_config(self.config);
        *axis.meta_mut() = self.lons.meta().clone();
        axis.absorb(lons, flags)?;
        self.lons = axis;
        self.reset_areas();
        Ok(())
    }

    pub fn absorb_lats(&mut self, lats: Vec<Real>) -> GridResult<()> {
        let mut axis = Axis::with_config(self.config);
        *axis.meta_mut() = self.lats.meta().clone();
        axis.absorb(lats)?;
        self.lats = axis;
        self.reset_areas();
        Ok(())
    }

    /// Replace the level coordinates, keeping data and vertical metadata.
    /// With data loaded the count must not change.
    pub fn absorb_levels(&mut self, levels: Vec<Real>) -> GridResult<()> {
        if self.data.is_some() && levels.len() != self.levels.len() {
            return Err(GridError::incompat_coords(format!(
                "{} levels given for a volume holding data on {}",
                levels.len(),
                self.levels.len()
            )));
        }
        self.levels.absorb(levels)
    }

    /// Re-label the existing levels. The count must not change.
    pub fn set_levels(&mut self, levels: &[Real]) -> GridResult<()> {
        if levels.len() != self.levels.len() {
            return Err(GridError::incompat_coords(format!(
                "{} levels given for a volume with {}",
                levels.len(),
                self.levels.len()
            )));
        }
        self.levels.load(levels)
    }

    /// Switch to a new vertical coordinate. The data no longer applies and is dropped.
    pub fn new_vertical(&mut self, levels: &[Real]) -> GridResult<()> {
        self.levels.load(levels)?;
        self.data = None;
        debug!(nlev = levels.len(), "replaced vertical coordinate");
        Ok(())
    }

    /// A same-shape volume whose every value is the coordinate of its level.
    pub fn generate_vertical(&self) -> GridResult<VolumeGrid> {
        let shape = self.shape();
        self.data_size()?;
        let (scale, offset) = self.vertical_mks();
        let mut out = self.clone();
        out.dist = None;
        out.meta.set_quantity(self.vertical());
        out.meta.set_units(self.vunits(), scale, offset);
        out.data = Some(
            self.levels
                .values()
                .iter()
                .flat_map(|&z| std::iter::repeat(z).take(shape.horizontal()))
                .collect(),
        );
        Ok(out)
    }

    fn install_axes(&mut self, lons: Vec<Real>, lats: Vec<Real>, levels: Vec<Real>, flags: LoadFlags) -> GridResult<()> {
        let mut lon_axis = LongitudeAxis::with_config(self.config);
        lon_axis.absorb(lons, flags)?;
        lon_axis.meta_mut().set_quantity("longitude");
        lon_axis.meta_mut().set_units("degrees_east", 1.0, 0.0);

        let mut lat_axis = Axis::with_config(self.config);
        lat_axis.absorb(lats)?;
        lat_axis.meta_mut().set_quantity("latitude");
        lat_axis.meta_mut().set_units("degrees_north", 1.0, 0.0);

        let mut level_axis = Axis::with_config(self.config);
        *level_axis.meta_mut() = self.levels.meta().clone();
        level_axis.absorb(levels)?;

        self.lons = lon_axis;
        self.lats = lat_axis;
        self.levels = level_axis;
        self.reset_areas();
        Ok(())
    }

    fn reset_areas(&mut self) {
        self.areas = OnceLock::new();
    }

    /// Bracketing level indices for `z`.
    pub fn zindex(&self, z: Real) -> GridResult<(isize, isize)> {
        self.levels.index(z)
    }

    pub fn lon_index(&self, lon: Real) -> GridResult<(isize, isize)> {
        self.lons.index(lon)
    }

    pub fn lat_index(&self, lat: Real) -> GridResult<(isize, isize)> {
        self.lats.index(lat)
    }

    pub fn value(&self, i: isize, j: isize, k: isize) -> GridResult<Real> {
        if !self.has_data() {
            return Err(GridError::bad_data_request("volume grid has no data loaded"));
        }
        let flat = self.join_index(i, j, k)?;
        self.value_at(flat)
    }

    pub fn value_mut(&mut self, i: isize, j: isize, k: isize) -> GridResult<&mut Real> {
        if self.data.is_none() {
            return Err(GridError::bad_data_request("volume grid has no data loaded"));
        }
        let flat = self.join_index(i, j, k)?;
        let data = self
            .data
            .as_mut()
            .ok_or_else(|| GridError::bad_data_request("volume grid has no data loaded"))?;
        let len = data.len();
        data.get_mut(flat)
            .ok_or_else(|| GridError::bad_data_request(format!("flat index {flat} outside {len} values")))
    }

    pub fn set_value(&mut self, i: isize, j: isize, k: isize, v: Real) -> GridResult<()> {
        *self.value_mut(i, j, k)? = v;
        Ok(())
    }

    pub fn join_index(&self, i: isize, j: isize, k: isize) -> GridResult<usize> {
        self.join_flat(i, j, k)
    }

    pub fn split_index(&self, flat: usize) -> GridResult<(usize, usize, usize)> {
        self.split_flat(flat)
    }

    pub fn join_indices(&self, coords: &[(isize, isize, isize)]) -> GridResult<Vec<usize>> {
        coords.iter().map(|&(i, j, k)| self.join_index(i, j, k)).collect()
    }

    pub fn split_indices(&self, flats: &[usize]) -> GridResult<Vec<(usize, usize, usize)>> {
        flats.iter().map(|&flat| self.split_index(flat)).collect()
    }

    /// Values at `(i, j, k)` triples, from the owner if this grid is distributed.
    pub fn gridpoints(&self, coords: &[(isize, isize, isize)], flags: FetchFlags) -> GridResult<Vec<Real>> {
        let indices = self.join_indices(coords)?;
        self.gridpoints_flat(&indices, flags)
    }

    fn level_surface(&self, k: usize) -> GridResult<SurfaceGrid> {
        let level = self.levels.value(k).map_err(|_| {
            GridError::bad_data_request(format!("level {k} outside 0..{}", self.levels.len()))
        })?;
        let mut sfc = SurfaceGrid::configured(self.config);
        sfc.absorb_dims(self.lons.values().to_vec(), self.lats.values().to_vec(), LoadFlags::NONE)?;
        sfc.set_wraps(if self.lons.wraps() { LoadFlags::WRAP } else { LoadFlags::NOWRAP });
        *sfc.meta_mut() = self.meta.clone();
        sfc.set_surface(format!("{} {} {} surface", level, self.vunits(), self.vertical()));
        Ok(sfc)
    }

    /// Copy level `k` out as a surface grid.
    pub fn extract_sfc(&self, k: usize) -> GridResult<SurfaceGrid> {
        let mut sfc = self.level_surface(k)?;
        let values: Vec<Real> = self
            .level_cursor(k)
            .map_err(|e| match e {
                GridError::BadDataIndex(msg) => GridError::BadDataRequest(msg),
                other => other,
            })?
            .collect();
        sfc.absorb_data(values)?;
        Ok(sfc)
    }

    /// Overwrite level `k` with `sfc`, converted through both MKS pairs.
    pub fn replace_level(&mut self, sfc: &SurfaceGrid, k: usize) -> GridResult<()> {
        let shape = self.shape();
        if k >= shape.nlev {
            return Err(GridError::bad_data_request(format!("level {k} outside 0..{}", shape.nlev)));
        }
        if !self.compatible_surface(sfc, CompatFlags::HORIZ) {
            return Err(GridError::bad_grid("surface does not share this volume's horizontal axes"));
        }
        let src = sfc
            .data()
            .ok_or_else(|| GridError::bad_data_request("replacement surface has no data"))?;

        let (sfc_scale, sfc_offset) = (sfc.meta().mks_scale(), sfc.meta().mks_offset());
        let (scale, offset) = (self.meta.mks_scale(), self.meta.mks_offset());
        let mut cursor = self.level_cursor_mut(k)?;
        for v in src {
            cursor.set((v * sfc_scale + sfc_offset - offset) / scale)?;
            cursor.advance();
        }
        debug!(level = k, "replaced volume level");
        Ok(())
    }

    /// A surface with each gridpoint's solid angle. Area is horizontal, so level 0 stands in.
    pub fn areas(&self) -> GridResult<SurfaceGrid> {
        self.data_size()?;
        self.level_surface(0)?.areas()
    }

    pub fn compatible(&self, other: &VolumeGrid, flags: CompatFlags) -> bool {
        if flags.contains(CompatFlags::HORIZ) && !(self.lons.compatible(&other.lons) && self.lats.compatible(&other.lats))
        {
            return false;
        }
        if flags.contains(CompatFlags::VERT)
            && !(self.vertical() == other.vertical()
                && self.vunits() == other.vunits()
                && self.levels.compatible(&other.levels))
        {
            return false;
        }
        if flags.contains(CompatFlags::TIME) && !same_time(&self.meta, &other.meta) {
            return false;
        }
        true
    }

    /// Compare with a surface. A surface never shares a volume's vertical.
    pub fn compatible_surface(&self, sfc: &SurfaceGrid, flags: CompatFlags) -> bool {
        if flags.contains(CompatFlags::VERT) {
            return false;
        }
        if flags.contains(CompatFlags::HORIZ)
            && !(self.lons.compatible(sfc.lon_axis()) && self.lats.compatible(sfc.lat_axis()))
        {
            return false;
        }
        !(flags.contains(CompatFlags::TIME) && !same_time(&self.meta, sfc.meta()))
    }

    pub fn matches(&self, other: &VolumeGrid) -> bool {
        self.compatible(other, CompatFlags::STRICT)
            && self.meta.quantity() == other.meta.quantity()
            && self.meta.units() == other.meta.units()
            && self.meta.fill_value().to_bits() == other.meta.fill_value().to_bits()
    }

    fn check_full(&self) -> GridResult<()> {
        if self.status().contains(GridStatus::GRID_ERR) {
            return Err(GridError::bad_data_request("volume buffer does not match its axes"));
        }
        if !self.has_data() {
            return Err(GridError::bad_data_request("volume grid has no data loaded"));
        }
        Ok(())
    }

    /// Column cursor from the first horizontal gridpoint.
    pub fn profiles(&self) -> GridResult<ProfileCursor<'_>> {
        self.profiles_from(0)
    }

    /// Column cursor positioned on `(i, j)`.
    pub fn profiles_at(&self, i: isize, j: isize) -> GridResult<ProfileCursor<'_>> {
        let start = self.join_index(i, j, 0)?;
        self.profiles_from(start)
    }

    fn profiles_from(&self, start: usize) -> GridResult<ProfileCursor<'_>> {
        self.check_full()?;
        let data = self.data.as_deref().unwrap_or_default();
        Ok(ProfileCursor::new(data, self.area_table(), self.shape(), start))
    }

    pub fn profiles_mut(&mut self) -> GridResult<ProfileCursorMut<'_>> {
        self.profiles_mut_from(0)
    }

    pub fn profiles_mut_at(&mut self, i: isize, j: isize) -> GridResult<ProfileCursorMut<'_>> {
        let start = self.join_index(i, j, 0)?;
        self.profiles_mut_from(start)
    }

    fn profiles_mut_from(&mut self, start: usize) -> GridResult<ProfileCursorMut<'_>> {
        self.check_full()?;
        let shape = self.shape();
        let (data, areas) = self.data_and_areas_mut();
        let data = data.unwrap_or_default();
        Ok(ProfileCursorMut::new(data, areas, shape, start))
    }

    /// Write the grid in the configured format version.
    pub fn serialize(&self, buf: &mut impl BufMut) -> GridResult<()> {
        let data = self
            .data
            .as_deref()
            .ok_or_else(|| GridError::bad_data_request("cannot serialize a volume grid without data"))?;
        let size = self.data_size()?;
        if data.len() != size {
            return Err(GridError::incompat_coords(format!("{} values for {size} gridpoints", data.len())));
        }

        let (vscale, voffset) = self.vertical_mks();
        self.meta.serialize(buf);
        buf.put_i32_ne(VOLUME_VERSION);
        codec::put_str(buf, self.vertical());
        codec::put_str(buf, self.vunits());
        buf.put_f32_ne(vscale);
        buf.put_f32_ne(voffset);
        buf.put_i32_ne(self.config.format_version.as_i32());
        match self.config.format_version {
            FormatVersion::V1 => {
                buf.put_i32_ne(self.lons.len() as i32);
                buf.put_i32_ne(self.lats.len() as i32);
                buf.put_i32_ne(self.levels.len() as i32);
                codec::put_reals(buf, self.lons.values());
                codec::put_reals(buf, self.lats.values());
                codec::put_reals(buf, self.levels.values());
            }
            FormatVersion::V2 => {
                self.lons.serialize(buf);
                self.lats.serialize(buf);
                self.levels.serialize(buf);
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

    pub fn deserialize_with_config(buf: &mut impl Buf, config: GridConfig) -> GridResult<Self> {
        let config = config.checked()?;
        let meta = FieldMeta::deserialize(buf)?;
        let _volume_version = codec::get_i32(buf, "volume version")?;
        let vertical = codec::get_str(buf, "vertical quantity")?;
        let vunits = codec::get_str(buf, "vertical units")?;
        let vscale = codec::get_real(buf, "vertical scale")?;
        let voffset = codec::get_real(buf, "vertical offset")?;
        let version = codec::get_i32(buf, "volume layout version")?;

        let (mut lons, mut lats, mut levels) = match FormatVersion::from_i32(version) {
            Some(FormatVersion::V1) => {
                let nlon = codec::get_count(buf, "longitude count")?;
                let nlat = codec::get_count(buf, "latitude count")?;
                let nlev = codec::get_count(buf, "level count")?;
                let lons = codec::get_reals(buf, nlon, "longitudes")?;
                let lats = codec::get_reals(buf, nlat, "latitudes")?;
                let levels = codec::get_reals(buf, nlev, "levels")?;
                (
                    LongitudeAxis::from_values(lons, LoadFlags::NONE)?,
                    Axis::from_values(lats)?,
                    Axis::from_values(levels)?,
                )
            }
            Some(FormatVersion::V2) => (
                LongitudeAxis::deserialize(buf)?,
                Axis::deserialize(buf)?,
                Axis::deserialize(buf)?,
            ),
            None => return Err(GridError::decode(format!("unknown volume layout version {version}"))),
        };
        lons.set_config(config);
        lats.set_config(config);
        levels.set_config(config);
        levels.meta_mut().set_quantity(vertical);
        levels.meta_mut().set_units(vunits, vscale, voffset);

        let size = lons.len() * lats.len() * levels.len();
        let data = codec::get_reals(buf, size, "volume values")?;
        debug!(size, version, "deserialized volume grid");
        Ok(Self {
            meta,
            lons,
            lats,
            levels,
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

impl GridField for VolumeGrid {
    fn kind(&self) -> GridKind {
        GridKind::Volume
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
        Shape::new(self.lons.len(), self.lats.len(), self.levels.len())
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
        debug!(size, "loaded volume data");
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
        self.lons.clear();
        self.lats.clear();
        self.levels.clear();
        self.data = None;
        self.reset_areas();
        debug!("cleared volume grid");
    }
}

impl Distributed for VolumeGrid {
    fn distribution(&self) -> Option<&Distribution> {
        self.dist.as_ref()
    }

    fn distribution_mut(&mut self) -> &mut Option<Distribution> {
        &mut self.dist
    }

    fn write_meta(&self, link: &Link<'_>) -> GridResult<()> {
        protocol::send_field_meta(link, &self.meta)?;
        link.send_str(self.vertical())?;
        link.send_str(self.vunits())?;
        protocol::send_lon_meta(link, &self.lons)?;
        protocol::send_axis_meta(link, &self.lats)?;
        protocol::send_axis_meta(link, &self.levels)
    }

    fn read_meta(&mut self, link: &Link<'_>) -> GridResult<()> {
        protocol::recv_field_meta(link, &mut self.meta)?;
        let vertical = link.recv_str()?;
        let vunits = link.recv_str()?;
        let mut lons = protocol::recv_lon_meta(link)?;
        let mut lats = protocol::recv_axis_meta(link)?;
        let mut levels = protocol::recv_axis_meta(link)?;
        lons.set_config(self.config);
        lats.set_config(self.config);
        levels.set_config(self.config);
        let (vscale, voffset) = self.vertical_mks();
        levels.meta_mut().set_quantity(vertical);
        levels.meta_mut().set_units(vunits, vscale, voffset);
        self.lons = lons;
        self.lats = lats;
        self.levels = levels;
        self.data = None;
        self.reset_areas();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> VolumeGrid {
        let lons: Vec<Real> = (0..4).map(|i| i as Real * 90.0).collect();
        let lats = vec![-45.0, 0.0, 45.0];
        let levels = vec![1000.0, 850.0];
        let data = (0..24).map(|v| v as Real).collect();
        let mut g = VolumeGrid::from_parts(lons, lats, levels, data, LoadFlags::NONE).unwrap();
        g.set_vertical("pressure");
        g.set_vunits("hPa", 100.0, 0.0);
        g
    }

    #[test]
    fn test_defaults() {
        let g = VolumeGrid::new();
        assert_eq!(g.vertical(), "none");
        assert_eq!(g.vunits(), "N/A");
        assert_eq!(g.vertical_mks(), (1.0, 0.0));
        assert_eq!(g.status(), GridStatus::NO_DIMS);
        assert!(matches!(g.value(0, 0, 0), Err(GridError::BadDataRequest(_))));
    }

    #[test]
    fn test_value_without_data_is_a_bad_request() {
        let mut g = grid();
        g.new_vertical(&[500.0, 250.0]).unwrap();
        assert!(!g.has_data());
        assert!(matches!(g.value(1, 1, 1), Err(GridError::BadDataRequest(_))));
        assert!(matches!(g.set_value(1, 1, 1, 2.0), Err(GridError::BadDataRequest(_))));
    }

    #[test]
    fn test_set_vertical_resets_mks() {
        let mut g = grid();
        assert_eq!(g.vertical_mks(), (100.0, 0.0));
        g.set_vertical("height");
        assert_eq!(g.vertical(), "height");
        assert_eq!(g.vunits(), "hPa");
        assert_eq!(g.vertical_mks(), (1.0, 0.0));
    }

    #[test]
    fn test_value_layout() {
        let g = grid();
        assert_eq!(g.value(1, 2, 1).unwrap(), 21.0);
        assert_eq!(g.value(-3, 2, 1).unwrap(), 21.0);
        assert!(matches!(g.value(0, 0, 2), Err(GridError::BadDataRequest(_))));
        assert_eq!(g.split_index(21).unwrap(), (1, 2, 1));
        assert_eq!(g.join_indices(&[(5, 0, 0), (0, 1, 1)]).unwrap(), vec![1, 16]);
    }

    #[test]
    fn test_levels_edits() {
        let mut g = grid();
        assert!(matches!(g.set_levels(&[1.0]), Err(GridError::BadIncompatCoords(_))));
        g.set_levels(&[925.0, 700.0]).unwrap();
        assert_eq!(g.level(1).unwrap(), 700.0);
        assert!(g.has_data());
        assert_eq!(g.zindex(800.0).unwrap(), (0, 1));

        g.new_vertical(&[1.0, 2.0, 3.0]).unwrap();
        assert!(!g.has_data());
        assert_eq!(g.dims(), (4, 3, 3));
        assert_eq!(g.vertical(), "pressure");
    }

    #[test]
    fn test_absorb_levels_keeps_dims_consistent() {
        let mut g = grid();
        let err = g.absorb_levels(vec![1000.0, 850.0, 700.0]).unwrap_err();
        assert!(matches!(err, GridError::BadIncompatCoords(_)));
        assert_eq!(g.dims(), (4, 3, 2));
        assert_eq!(g.data_size().unwrap(), g.dump().unwrap().len());

        g.absorb_levels(vec![500.0, 250.0]).unwrap();
        assert_eq!(g.level(0).unwrap(), 500.0);
        assert_eq!(g.value(1, 2, 1).unwrap(), 21.0);

        g.new_vertical(&[1.0, 2.0]).unwrap();
        g.absorb_levels(vec![10.0, 20.0, 30.0]).unwrap();
        assert_eq!(g.dims(), (4, 3, 3));
    }

    #[test]
    fn test_generate_vertical() {
        let g = grid();
        let z = g.generate_vertical().unwrap();
        assert_eq!(z.quantity(), "pressure");
        assert_eq!(z.units(), "hPa");
        assert_eq!(z.meta().mks_scale(), 100.0);
        assert_eq!(z.value(3, 2, 0).unwrap(), 1000.0);
        assert_eq!(z.value(0, 0, 1).unwrap(), 850.0);
    }

    #[test]
    fn test_extract_sfc() {
        let g = grid();
        let sfc = g.extract_sfc(1).unwrap();
        assert_eq!(sfc.dims(), (4, 3));
        assert_eq!(sfc.surface(), "850 hPa pressure surface");
        assert_eq!(sfc.value(2, 1).unwrap(), g.value(2, 1, 1).unwrap());
        assert!(sfc.wraps());
        assert!(matches!(g.extract_sfc(2), Err(GridError::BadDataRequest(_))));
    }

    #[test]
    fn test_replace_level_converts_units() {
        let mut g = grid();
        g.meta_mut().set_units("K", 1.0, 0.0);
        let mut sfc = g.extract_sfc(0).unwrap();
        sfc.meta_mut().set_units("degC", 1.0, 273.15);
        g.replace_level(&sfc, 1).unwrap();
        let expected = sfc.value(3, 2).unwrap() + 273.15;
        assert!((g.value(3, 2, 1).unwrap() - expected).abs() < 1e-3);
        assert_eq!(g.value(3, 2, 0).unwrap(), 11.0);
    }

    #[test]
    fn test_replace_level_rejects_other_grids() {
        let mut g = grid();
        let other = SurfaceGrid::from_parts(vec![0.0, 90.0], vec![0.0, 45.0], vec![0.0; 4], LoadFlags::NONE).unwrap();
        assert!(matches!(g.replace_level(&other, 0), Err(GridError::BadGrid(_))));
        let sfc = g.extract_sfc(0).unwrap();
        assert!(matches!(g.replace_level(&sfc, 5), Err(GridError::BadDataRequest(_))));
    }

    #[test]
    fn test_compatible_surface() {
        let g = grid();
        let sfc = g.extract_sfc(0).unwrap();
        assert!(g.compatible_surface(&sfc, CompatFlags::HORIZ | CompatFlags::TIME));
        assert!(!g.compatible_surface(&sfc, CompatFlags::STRICT));
    }

    #[test]
    fn test_vertical_compatibility() {
        let g = grid();
        let mut other = g.duplicate();
        assert!(g.matches(&other));
        other.set_vunits("Pa", 1.0, 0.0);
        assert!(!g.compatible(&other, CompatFlags::VERT));
        assert!(g.compatible(&other, CompatFlags::HORIZ | CompatFlags::TIME));
    }

    #[test]
    fn test_profiles() {
        let mut g = grid();
        let columns: Vec<Vec<Real>> = g.profiles().unwrap().collect();
        assert_eq!(columns.len(), 12);
        assert_eq!(columns[5], vec![5.0, 17.0]);

        let p = g.profiles_at(-1, 2).unwrap();
        assert_eq!(p.indices(), Some((3, 2)));
        assert_eq!(p.profile(), Some(vec![11.0, 23.0]));

        let mut pm = g.profiles_mut_at(0, 1).unwrap();
        pm.assign(&[-1.0, -2.0]).unwrap();
        assert!(pm.advance());
        pm.assign(&[-3.0, -4.0]).unwrap();
        assert_eq!(g.value(0, 1, 1).unwrap(), -2.0);
        assert_eq!(g.value(1, 1, 0).unwrap(), -3.0);
    }

    #[test]
    fn test_level_cursor_block() {
        let g = grid();
        let level: Vec<Real> = g.level_cursor(1).unwrap().collect();
        assert_eq!(level, (12..24).map(|v| v as Real).collect::<Vec<_>>());
        assert!(matches!(g.level_cursor(2), Err(GridError::BadDataIndex(_))));
    }

    #[test]
    fn test_serialize_keeps_vertical_mks() {
        let g = grid();
        for version in [FormatVersion::V1, FormatVersion::V2] {
            let mut config = GridConfig::default();
            config.format_version = version;
            let mut h = g.clone();
            h.set_config(config).unwrap();
            let back = VolumeGrid::from_bytes(&h.to_bytes().unwrap()).unwrap();
            assert!(back.matches(&g));
            assert_eq!(back.vertical(), "pressure");
            assert_eq!(back.vertical_mks(), (100.0, 0.0));
            assert_eq!(back.dump().unwrap(), g.dump().unwrap());
        }
    }

    #[test]
    fn test_areas_from_level_zero() {
        let mut g = grid();
        g.new_vertical(&[1.0, 2.0]).unwrap();
        let areas = g.areas().unwrap();
        let total: f64 = areas.cursor().unwrap().map(f64::from).sum();
        assert!(total > 0.0);
        assert_eq!(areas.dims(), (4, 3));
    }
}
