//! Coordinate axes: a generic monotonic axis and a longitude axis with wraparound.

use bytes::{Buf, BufMut};
use tracing::debug;

use crate::codec;
use crate::config::GridConfig;
use crate::error::{GridError, GridResult};
use crate::flags::LoadFlags;
use crate::meta::FieldMeta;
use crate::Real;

const AXIS_VERSION: i32 = 1;
const LON_VERSION: i32 = 1;

/// Direction in which coordinate values change with index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Increasing,
    Decreasing,
}

/// An ordered, strictly monotonic coordinate axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    meta: FieldMeta,
    values: Vec<Real>,
    direction: Direction,
    config: GridConfig,
}

/// Latitudes never wrap.
pub type LatitudeAxis = Axis;

/// Vertical levels never wrap.
pub type VerticalAxis = Axis;

impl Default for Axis {
    fn default() -> Self {
        Self::with_config(GridConfig::default())
    }
}

impl Axis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: GridConfig) -> Self {
        Self {
            meta: FieldMeta::default(),
            values: Vec::new(),
            direction: Direction::Increasing,
            config,
        }
    }

    /// Build an axis from `values`.
    pub fn from_values(values: Vec<Real>) -> GridResult<Self> {
        let mut axis = Self::new();
        axis.absorb(values)?;
        Ok(axis)
    }

    /// Replace the coordinates with a copy of `values`.
    pub fn load(&mut self, values: &[Real]) -> GridResult<()> {
        self.absorb(values.to_vec())
    }

    /// Take ownership of `values` as the new coordinates.
    pub fn absorb(&mut self, values: Vec<Real>) -> GridResult<()> {
        check_monotonic(&values)?;
        self.direction = direction_of(&values);
        self.values = values;
        Ok(())
    }

    pub(crate) fn set_config(&mut self, config: GridConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn meta(&self) -> &FieldMeta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut FieldMeta {
        &mut self.meta
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Real] {
        &self.values
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn value(&self, i: usize) -> GridResult<Real> {
        self.values.get(i).copied().ok_or_else(|| {
            GridError::bad_data_request(format!("coordinate index {i} outside axis of {}", self.len()))
        })
    }

    /// Change one coordinate, refusing edits that would break strict monotonicity.
    pub fn set_value(&mut self, i: usize, v: Real) -> GridResult<()> {
        let n = self.len();
        if i >= n {
            return Err(GridError::bad_data_request(format!(
                "coordinate index {i} outside axis of {n}"
            )));
        }
        let ordered = |a: Real, b: Real| match self.direction {
            Direction::Increasing => a < b,
            Direction::Decreasing => a > b,
        };
        if i > 0 && !ordered(self.values[i - 1], v) {
            return Err(GridError::NonMonotonic(format!("value {v} at {i} against its predecessor")));
        }
        if i + 1 < n && !ordered(v, self.values[i + 1]) {
            return Err(GridError::NonMonotonic(format!("value {v} at {i} against its successor")));
        }
        self.values[i] = v;
        Ok(())
    }

    /// Re-express the coordinates in new units whose MKS transform is `(scale, offset)`.
    pub fn transform(&mut self, units: &str, scale: Real, offset: Real) {
        let s = self.meta.mks_scale() / scale;
        let o = (self.meta.mks_offset() - offset) / scale;
        for v in &mut self.values {
            *v = *v * s + o;
        }
        self.direction = direction_of(&self.values);
        self.meta.set_units(units, scale, offset);
    }

    /// Bracketing index pair for `z`. Out-of-range queries fail.
    pub fn index(&self, z: Real) -> GridResult<(isize, isize)> {
        bracket(&self.values, self.direction, z, false, self.config.snap_tolerance)
    }

    /// Same length and values within the coordinate tolerance.
    pub fn compatible(&self, other: &Axis) -> bool {
        self.len() == other.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| (a - b).abs() <= self.config.coord_tolerance)
    }

    /// Compatible and describing the same quantity in the same units.
    pub fn matches(&self, other: &Axis) -> bool {
        self.compatible(other)
            && self.meta.quantity() == other.meta.quantity()
            && self.meta.units() == other.meta.units()
    }

    pub fn clear(&mut self) {
        self.meta = FieldMeta::default();
        self.values.clear();
        self.direction = Direction::Increasing;
    }

    pub fn serialize(&self, buf: &mut impl BufMut) {
        self.meta.serialize(buf);
        buf.put_i32_ne(AXIS_VERSION);
        buf.put_i32_ne(self.values.len() as i32);
        codec::put_reals(buf, &self.values);
    }

    pub fn deserialize(buf: &mut impl Buf) -> GridResult<Self> {
        let meta = FieldMeta::deserialize(buf)?;
        let _version = codec::get_i32(buf, "axis version")?;
        let n = codec::get_count(buf, "axis length")?;
        let values = codec::get_reals(buf, n, "axis values")?;
        let mut axis = Self::new();
        axis.absorb(values)?;
        axis.meta = meta;
        Ok(axis)
    }
}

/// A longitude axis that knows whether it spans the globe.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LongitudeAxis {
    axis: Axis,
    wraps: bool,
}

impl LongitudeAxis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: GridConfig) -> Self {
        Self {
            axis: Axis::with_config(config),
            wraps: false,
        }
    }

    pub(crate) fn from_parts(axis: Axis, wraps: bool) -> Self {
        Self { axis, wraps }
    }

    /// Build a longitude axis, inferring wraparound unless `flags` force it.
    pub fn from_values(values: Vec<Real>, flags: LoadFlags) -> GridResult<Self> {
        let mut lons = Self::new();
        lons.absorb(values, flags)?;
        Ok(lons)
    }

    pub fn load(&mut self, values: &[Real], flags: LoadFlags) -> GridResult<()> {
        self.absorb(values.to_vec(), flags)
    }

    pub fn absorb(&mut self, values: Vec<Real>, flags: LoadFlags) -> GridResult<()> {
        self.axis.absorb(values)?;
        self.set_wraps(flags);
        Ok(())
    }

    /// Decide wraparound: explicit flags win, otherwise infer from the spacing.
    pub fn set_wraps(&mut self, flags: LoadFlags) {
        let vals = self.axis.values();
        self.wraps = if flags.intersects(LoadFlags::WRAP | LoadFlags::NOWRAP) {
            flags.contains(LoadFlags::WRAP)
        } else if vals.len() < 2 {
            false
        } else {
            let n = vals.len();
            let dz = vals[1] - vals[0];
            let past_end = if dz > 0.0 {
                vals[n - 1] + dz - 360.0
            } else {
                vals[n - 1] + dz + 360.0
            };
            (past_end - vals[0]).abs() < (dz / 4.0).abs()
        };
        debug!(n = vals.len(), wraps = self.wraps, "longitude wrap decided");
    }

    /// Force the wrap flag, bypassing inference.
    pub fn set_wrapping(&mut self, wraps: bool) {
        self.wraps = wraps;
    }

    pub fn wraps(&self) -> bool {
        self.wraps
    }

    pub fn as_axis(&self) -> &Axis {
        &self.axis
    }

    pub(crate) fn set_config(&mut self, config: GridConfig) {
        self.axis.set_config(config);
    }

    pub fn meta(&self) -> &FieldMeta {
        self.axis.meta()
    }

    pub fn meta_mut(&mut self) -> &mut FieldMeta {
        self.axis.meta_mut()
    }

    pub fn len(&self) -> usize {
        self.axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axis.is_empty()
    }

    pub fn values(&self) -> &[Real] {
        self.axis.values()
    }

    pub fn direction(&self) -> Direction {
        self.axis.direction()
    }

    /// Coordinate at `i`, with `i` wrapped first.
    pub fn value(&self, i: isize) -> GridResult<Real> {
        let i = self.iwrap(i)?;
        self.axis.value(i)
    }

    pub fn set_value(&mut self, i: usize, v: Real) -> GridResult<()> {
        self.axis.set_value(i, v)
    }

    pub fn transform(&mut self, units: &str, scale: Real, offset: Real) {
        self.axis.transform(units, scale, offset);
    }

    /// Shift `lon` by whole turns into the axis's 360 degree window.
    ///
    /// The window starts at the first coordinate and runs in the axis direction.
    pub fn wrap(&self, lon: Real) -> GridResult<Real> {
        let vals = self.axis.values();
        if vals.len() <= 1 {
            return Err(GridError::bad_data_index(format!(
                "cannot wrap on a longitude axis of {}",
                vals.len()
            )));
        }
        let start = vals[0];
        let wrapped = match self.axis.direction() {
            Direction::Increasing if lon < start || lon > start + 360.0 => {
                start + (lon - start).rem_euclid(360.0)
            }
            Direction::Decreasing if lon > start || lon < start - 360.0 => {
                start - (start - lon).rem_euclid(360.0)
            }
            _ => lon,
        };
        Ok(wrapped)
    }

    /// Reduce an index into `0..len` on a wrapping axis; validate it otherwise.
    pub fn iwrap(&self, i: isize) -> GridResult<usize> {
        let n = self.len();
        if n <= 1 {
            return Err(GridError::bad_data_index(format!(
                "cannot wrap index {i} on a longitude axis of {n}"
            )));
        }
        if self.wraps {
            Ok(i.rem_euclid(n as isize) as usize)
        } else if i >= 0 && (i as usize) < n {
            Ok(i as usize)
        } else {
            Err(GridError::bad_data_index(format!(
                "longitude index {i} outside non-wrapping axis of {n}"
            )))
        }
    }

    /// Bracketing index pair for `lon`.
    ///
    /// On a wrapping axis the pair may straddle the seam, as `(n-1, n)` or
    /// `(-1, 0)`; pass each member through [`iwrap`](Self::iwrap) before use.
    pub fn index(&self, lon: Real) -> GridResult<(isize, isize)> {
        if self.len() <= 1 {
            return Err(GridError::bad_data_index("longitude axis has fewer than two points"));
        }
        let lon = if self.wraps { self.wrap(lon)? } else { lon };
        bracket(
            self.axis.values(),
            self.axis.direction(),
            lon,
            self.wraps,
            self.axis.config().snap_tolerance,
        )
    }

    pub fn compatible(&self, other: &LongitudeAxis) -> bool {
        self.axis.compatible(&other.axis)
    }

    pub fn matches(&self, other: &LongitudeAxis) -> bool {
        self.axis.matches(&other.axis)
    }

    pub fn clear(&mut self) {
        self.axis.clear();
        self.wraps = false;
    }

    pub fn serialize(&self, buf: &mut impl BufMut) {
        self.axis.serialize(buf);
        buf.put_i32_ne(LON_VERSION);
        buf.put_i32_ne(i32::from(self.wraps));
    }

    pub fn deserialize(buf: &mut impl Buf) -> GridResult<Self> {
        let axis = Axis::deserialize(buf)?;
        let _version = codec::get_i32(buf, "longitude version")?;
        let wraps = codec::get_i32(buf, "wrap flag")? != 0;
        Ok(Self { axis, wraps })
    }
}

fn direction_of(values: &[Real]) -> Direction {
    if values.len() > 1 && values[1] < values[0] {
        Direction::Decreasing
    } else {
        Direction::Increasing
    }
}

fn check_monotonic(values: &[Real]) -> GridResult<()> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(GridError::NonMonotonic("coordinates must be finite".to_string()));
    }
    if values.len() < 2 {
        return Ok(());
    }
    let increasing = values[1] > values[0];
    let ok = values.windows(2).all(|w| {
        if increasing {
            w[1] > w[0]
        } else {
            w[1] < w[0]
        }
    });
    if ok {
        Ok(())
    } else {
        Err(GridError::NonMonotonic(format!(
            "{} coordinates starting at {} are not strictly monotonic",
            values.len(),
            values[0]
        )))
    }
}

/// Linear-scan bracket of `z` in `vals`.
///
/// Within `snap` of an extreme coordinate the edge bracket is returned. When
/// `wraps` is set, queries past either end produce a pair crossing the seam.
fn bracket(vals: &[Real], dir: Direction, z: Real, wraps: bool, snap: Real) -> GridResult<(isize, isize)> {
    let n = vals.len();
    if n <= 1 {
        return Err(GridError::bad_data_index(format!("cannot bracket on an axis of {n}")));
    }
    let last = (n - 1) as isize;
    let outside = || GridError::bad_data_index(format!("{z} lies outside [{}, {}]", vals[0], vals[n - 1]));

    match dir {
        Direction::Increasing => {
            // highest index whose value lies below z
            let below = vals.iter().take_while(|v| **v < z).count();
            if below == 0 {
                if wraps || (vals[0] - z).abs() <= snap {
                    Ok((0, 1))
                } else {
                    Err(outside())
                }
            } else if below < n {
                let i1 = (below - 1) as isize;
                Ok((i1, i1 + 1))
            } else if (vals[n - 1] - z).abs() <= snap {
                Ok((last - 1, last))
            } else if wraps {
                Ok((last, last + 1))
            } else {
                Err(outside())
            }
        }
        Direction::Decreasing => {
            // lowest index from which every value lies below z
            let below = vals.iter().rev().take_while(|v| **v < z).count();
            if below == 0 {
                if (vals[n - 1] - z).abs() <= snap {
                    Ok((last - 1, last))
                } else if wraps {
                    Ok((last, last + 1))
                } else {
                    Err(outside())
                }
            } else if below < n {
                let i2 = (n - below) as isize;
                Ok((i2 - 1, i2))
            } else if (vals[0] - z).abs() <= snap {
                Ok((0, 1))
            } else if wraps {
                Ok((-1, 0))
            } else {
                Err(outside())
            }
        }
    }
}
