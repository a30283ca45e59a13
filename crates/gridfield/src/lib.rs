//! Scalar fields on longitude/latitude grids.
//!
//! A [`SurfaceGrid`] holds one horizontal level; a [`VolumeGrid`] stacks
//! several along a vertical coordinate. Longitude axes that span the globe
//! wrap, so gridpoint indices and coordinates outside the stored range fold
//! back onto it. Both grids implement [`GridField`] for shared access,
//! [`Distributed`] for the owner/requester value protocol, and have a
//! versioned native-endian binary form.
//!
//! # Example
//!
//! ```
//! use gridfield::{GridField, LoadFlags, SurfaceGrid};
//!
//! let lons: Vec<f32> = (0..72).map(|i| i as f32 * 5.0).collect();
//! let lats: Vec<f32> = (0..37).map(|j| -90.0 + j as f32 * 5.0).collect();
//! let data = vec![0.0; 72 * 37];
//!
//! let grid = SurfaceGrid::from_parts(lons, lats, data, LoadFlags::NONE).unwrap();
//! assert!(grid.wraps());
//! assert_eq!(grid.join_index(-1, 0).unwrap(), 71);
//! assert_eq!(grid.longitude(73).unwrap(), 5.0);
//! ```

pub mod axis;
mod codec;
pub mod config;
pub mod cursor;
pub mod error;
pub mod field;
pub mod flags;
pub mod geometry;
pub mod meta;
pub mod protocol;
pub mod surface;
pub mod volume;

pub use process_group::Real;

pub use axis::{Axis, Direction, LatitudeAxis, LongitudeAxis, VerticalAxis};
pub use config::{FormatVersion, GridConfig};
pub use cursor::{Cursor, CursorMut, ProfileCursor, ProfileCursorMut};
pub use error::{GridError, GridResult};
pub use field::{AnyGrid, GridField, GridKind, Shape};
pub use flags::{CompatFlags, FetchFlags, GridStatus, LoadFlags, MetaStatus};
pub use meta::FieldMeta;
pub use protocol::{Distributed, Distribution, Link, Session};
pub use surface::SurfaceGrid;
pub use volume::VolumeGrid;
