//! Descriptive metadata shared by axes and grids.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::{GridError, GridResult};
use crate::flags::MetaStatus;
use crate::Real;

/// Placeholder quantity of a field that was never named.
pub const NO_QUANTITY: &str = "none";
/// Placeholder units of a field that was never given units.
pub const NO_UNITS: &str = "N/A";
/// Placeholder calendar label of a field with no valid time.
pub const NO_TIME: &str = "invalid";

/// Calendar label layout used by [`FieldMeta::set_calendar_time`].
pub const CALENDAR_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const META_VERSION: i32 = 3;

/// Quantity, units, time, fill value and free-form attributes of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    quantity: String,
    units: String,
    mks_scale: Real,
    mks_offset: Real,
    met_time: String,
    time: f64,
    fill_value: Real,
    expiration: i64,
    cacheable: bool,
    attributes: BTreeMap<String, String>,
}

impl Default for FieldMeta {
    fn default() -> Self {
        Self {
            quantity: NO_QUANTITY.to_string(),
            units: NO_UNITS.to_string(),
            mks_scale: 1.0,
            mks_offset: 0.0,
            met_time: NO_TIME.to_string(),
            time: -1.0,
            fill_value: -1.0,
            expiration: 0,
            cacheable: true,
            attributes: BTreeMap::new(),
        }
    }
}

impl FieldMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quantity(&self) -> &str {
        &self.quantity
    }

    pub fn set_quantity(&mut self, quantity: impl Into<String>) {
        self.quantity = quantity.into();
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    /// Set units along with the affine transform to MKS: `v_mks = v * scale + offset`.
    pub fn set_units(&mut self, units: impl Into<String>, scale: Real, offset: Real) {
        self.units = units.into();
        self.mks_scale = scale;
        self.mks_offset = offset;
    }

    pub fn mks_scale(&self) -> Real {
        self.mks_scale
    }

    pub fn mks_offset(&self) -> Real {
        self.mks_offset
    }

    /// Calendar time label.
    pub fn met_time(&self) -> &str {
        &self.met_time
    }

    /// Numeric model time.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn set_time(&mut self, time: f64, met_time: impl Into<String>) {
        self.time = time;
        self.met_time = met_time.into();
    }

    /// Set the calendar label from a UTC timestamp.
    pub fn set_calendar_time(&mut self, time: f64, when: DateTime<Utc>) {
        self.set_time(time, when.format(CALENDAR_FORMAT).to_string());
    }

    /// Parse the calendar label, if it is a timestamp.
    pub fn calendar_time(&self) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(&self.met_time, CALENDAR_FORMAT)
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    pub fn fill_value(&self) -> Real {
        self.fill_value
    }

    pub(crate) fn set_fill_value(&mut self, fill: Real) {
        self.fill_value = fill;
    }

    /// Expiration as unix seconds; 0 means never.
    pub fn expires(&self) -> i64 {
        self.expiration
    }

    pub fn set_expires(&mut self, when: i64) {
        self.expiration = when;
    }

    pub fn cacheable(&self) -> bool {
        self.cacheable
    }

    pub fn set_cacheable(&mut self, cacheable: bool) {
        self.cacheable = cacheable;
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn attribute(&self, key: &str) -> GridResult<&str> {
        self.attributes
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| GridError::MissingAttribute(key.to_string()))
    }

    /// Attributes in key order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn metadata_status(&self) -> MetaStatus {
        let mut status = MetaStatus::NONE;
        if self.quantity == NO_QUANTITY || self.units == NO_UNITS {
            status |= MetaStatus::NO_QUANT;
        }
        if self.met_time == NO_TIME {
            status |= MetaStatus::NO_TIME;
        }
        status
    }

    /// Pretty JSON rendering for diagnostics.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the base payload.
    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_i32_ne(META_VERSION);
        codec::put_str(buf, &self.quantity);
        codec::put_str(buf, &self.units);
        buf.put_f32_ne(self.mks_scale);
        buf.put_f32_ne(self.mks_offset);
        codec::put_str(buf, &self.met_time);
        buf.put_f64_ne(self.time);
        buf.put_i64_ne(self.expiration);
        buf.put_i32_ne(i32::from(self.cacheable));
        buf.put_f32_ne(self.fill_value);
        buf.put_i32_ne(self.attributes.len() as i32);
        for (key, value) in &self.attributes {
            codec::put_str(buf, key);
            codec::put_str(buf, value);
        }
    }

    /// Read a base payload. Version 1 payloads carry no expiration and
    /// versions below 3 no cacheable flag; both fall back to the defaults.
    pub fn deserialize(buf: &mut impl Buf) -> GridResult<Self> {
        let version = codec::get_i32(buf, "metadata version")?;
        if !(1..=META_VERSION).contains(&version) {
            return Err(GridError::decode(format!("unknown metadata version {version}")));
        }

        let quantity = codec::get_str(buf, "quantity")?;
        let units = codec::get_str(buf, "units")?;
        let mks_scale = codec::get_real(buf, "MKS scale")?;
        let mks_offset = codec::get_real(buf, "MKS offset")?;
        let met_time = codec::get_str(buf, "calendar time")?;
        let time = codec::get_f64(buf, "time")?;
        let expiration = if version > 1 {
            codec::get_i64(buf, "expiration")?
        } else {
            0
        };
        let cacheable = if version > 2 {
            codec::get_i32(buf, "cacheable flag")? != 0
        } else {
            true
        };
        let fill_value = codec::get_real(buf, "fill value")?;

        let nattrs = codec::get_count(buf, "attribute count")?;
        let mut attributes = BTreeMap::new();
        for _ in 0..nattrs {
            let key = codec::get_str(buf, "attribute key")?;
            let value = codec::get_str(buf, "attribute value")?;
            attributes.insert(key, value);
        }

        Ok(Self {
            quantity,
            units,
            mks_scale,
            mks_offset,
            met_time,
            time,
            fill_value,
            expiration,
            cacheable,
            attributes,
        })
    }
}
