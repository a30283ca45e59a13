//! The owner/requester exchange of grid metadata and values.
//!
//! One process of a [`ProcessGroup`] owns the live buffer; the others hold
//! dimension-only copies and ask the owner for what they need. Every exchange
//! is a session: the requester opens it by sending a command word on
//! [`tags::GREQ`] under a fresh [`RequestId`], and every later message of
//! that exchange, in both directions, carries the same id. A message that
//! turns up under another id is a [`GridError::Sequence`] fault.
//!
//! Metadata goes out in a fixed order: quantity, units, calendar label,
//! numeric time, fill value, then the grid-specific fields and each axis
//! (quantity, units, length, values, and for longitude the wrap flag).
//! Values go out as a count on [`tags::GNUM`], flat indices on
//! [`tags::GCOORDS`] and the reply on [`tags::GVALS`].

use std::fmt;
use std::sync::Arc;

use process_group::{ProcessGroup, ProcessId, RequestId, Tag};
use tracing::{debug, warn};

use crate::axis::{Axis, LongitudeAxis};
use crate::error::{GridError, GridResult};
use crate::field::{each_grid, scratch, AnyGrid, GridField};
use crate::flags::{FetchFlags, GridStatus};
use crate::meta::FieldMeta;
use crate::Real;

/// Message tags.
pub mod tags {
    use process_group::Tag;

    /// Command words from requesters.
    pub const GREQ: Tag = 1000;
    pub const GMETA: Tag = 1005;
    /// Axis coordinate values.
    pub const GDIMS: Tag = 1010;
    pub const GNUM: Tag = 1015;
    pub const GCOORDS: Tag = 1020;
    pub const GVALS: Tag = 1025;
}

/// Command words sent on [`tags::GREQ`].
pub mod commands {
    pub const GDONE: i32 = 2000;
    pub const GMETA: i32 = 2005;
    pub const GDATA: i32 = 2010;
}

/// A grid's membership in a process group.
#[derive(Clone)]
pub struct Distribution {
    group: Arc<dyn ProcessGroup>,
    owner: ProcessId,
}

impl Distribution {
    pub fn group(&self) -> &dyn ProcessGroup {
        self.group.as_ref()
    }

    pub fn owner(&self) -> ProcessId {
        self.owner
    }

    pub fn is_owner(&self) -> bool {
        self.group.id() == self.owner
    }
}

impl fmt::Debug for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Distribution")
            .field("id", &self.group.id())
            .field("size", &self.group.size())
            .field("owner", &self.owner)
            .finish()
    }
}

/// Handle to an open metadata exchange.
///
/// Local-mode sessions carry no request id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    request: Option<RequestId>,
}

impl Session {
    pub fn local() -> Self {
        Self { request: None }
    }

    pub fn opened(request: RequestId) -> Self {
        Self { request: Some(request) }
    }

    pub fn request(&self) -> Option<RequestId> {
        self.request
    }

    pub fn is_local(&self) -> bool {
        self.request.is_none()
    }

    fn require(&self) -> GridResult<RequestId> {
        self.request
            .ok_or_else(|| GridError::Sequence("a local session cannot carry a remote exchange".to_string()))
    }
}

/// One side of a session with a fixed peer.
///
/// Receives accept only messages from the peer that carry the session's id.
pub struct Link<'a> {
    group: &'a dyn ProcessGroup,
    peer: ProcessId,
    request: RequestId,
}

impl<'a> Link<'a> {
    pub(crate) fn new(group: &'a dyn ProcessGroup, peer: ProcessId, request: RequestId) -> Self {
        Self { group, peer, request }
    }

    pub fn peer(&self) -> ProcessId {
        self.peer
    }

    pub fn request(&self) -> RequestId {
        self.request
    }

    pub fn send_str(&self, text: &str) -> GridResult<()> {
        self.group
            .send_string(self.peer, self.request, text, tags::GMETA)
            .map_err(GridError::from_group)
    }

    pub fn send_ints(&self, vals: &[i32], tag: Tag) -> GridResult<()> {
        self.group
            .send_ints(self.peer, self.request, vals, tag)
            .map_err(GridError::from_group)
    }

    pub fn send_reals(&self, vals: &[Real], tag: Tag) -> GridResult<()> {
        self.group
            .send_reals(self.peer, self.request, vals, tag)
            .map_err(GridError::from_group)
    }

    pub fn send_doubles(&self, vals: &[f64], tag: Tag) -> GridResult<()> {
        self.group
            .send_doubles(self.peer, self.request, vals, tag)
            .map_err(GridError::from_group)
    }

    pub fn recv_str(&self) -> GridResult<String> {
        self.group
            .receive_string(Some(self.peer), Some(self.request), tags::GMETA)
            .map(|r| r.value)
            .map_err(GridError::from_group)
    }

    pub fn recv_ints(&self, n: usize, tag: Tag) -> GridResult<Vec<i32>> {
        self.group
            .receive_ints(Some(self.peer), Some(self.request), n, tag)
            .map(|r| r.value)
            .map_err(GridError::from_group)
    }

    pub fn recv_reals(&self, n: usize, tag: Tag) -> GridResult<Vec<Real>> {
        self.group
            .receive_reals(Some(self.peer), Some(self.request), n, tag)
            .map(|r| r.value)
            .map_err(GridError::from_group)
    }

    pub fn recv_doubles(&self, n: usize, tag: Tag) -> GridResult<Vec<f64>> {
        self.group
            .receive_doubles(Some(self.peer), Some(self.request), n, tag)
            .map(|r| r.value)
            .map_err(GridError::from_group)
    }

    fn recv_int(&self, tag: Tag) -> GridResult<i32> {
        Ok(self.recv_ints(1, tag)?[0])
    }
}

pub(crate) fn send_field_meta(link: &Link<'_>, meta: &FieldMeta) -> GridResult<()> {
    link.send_str(meta.quantity())?;
    link.send_str(meta.units())?;
    link.send_str(meta.met_time())?;
    link.send_doubles(&[meta.time()], tags::GMETA)?;
    link.send_reals(&[meta.fill_value()], tags::GMETA)
}

/// Receive the shared fields into `meta`. The local MKS pair is kept.
pub(crate) fn recv_field_meta(link: &Link<'_>, meta: &mut FieldMeta) -> GridResult<()> {
    let quantity = link.recv_str()?;
    let units = link.recv_str()?;
    let met_time = link.recv_str()?;
    let time = link.recv_doubles(1, tags::GMETA)?[0];
    let fill = link.recv_reals(1, tags::GMETA)?[0];
    let (scale, offset) = (meta.mks_scale(), meta.mks_offset());
    meta.set_quantity(quantity);
    meta.set_units(units, scale, offset);
    meta.set_time(time, met_time);
    meta.set_fill_value(fill);
    Ok(())
}

pub(crate) fn send_axis_meta(link: &Link<'_>, axis: &Axis) -> GridResult<()> {
    link.send_str(axis.meta().quantity())?;
    link.send_str(axis.meta().units())?;
    link.send_ints(&[axis.len() as i32], tags::GMETA)?;
    link.send_reals(axis.values(), tags::GDIMS)
}

pub(crate) fn recv_axis_meta(link: &Link<'_>) -> GridResult<Axis> {
    let quantity = link.recv_str()?;
    let units = link.recv_str()?;
    let n = link.recv_int(tags::GMETA)?;
    let n = usize::try_from(n).map_err(|_| GridError::decode(format!("negative axis length {n}")))?;
    let values = link.recv_reals(n, tags::GDIMS)?;
    let mut axis = Axis::from_values(values)?;
    axis.meta_mut().set_quantity(quantity);
    axis.meta_mut().set_units(units, 1.0, 0.0);
    Ok(axis)
}

pub(crate) fn send_lon_meta(link: &Link<'_>, lons: &LongitudeAxis) -> GridResult<()> {
    send_axis_meta(link, lons.as_axis())?;
    link.send_ints(&[i32::from(lons.wraps())], tags::GMETA)
}

pub(crate) fn recv_lon_meta(link: &Link<'_>) -> GridResult<LongitudeAxis> {
    let axis = recv_axis_meta(link)?;
    let wraps = link.recv_int(tags::GMETA)? != 0;
    Ok(LongitudeAxis::from_parts(axis, wraps))
}

fn check_local_meta<G: GridField + ?Sized>(grid: &G) -> GridResult<()> {
    let meta_status = grid.meta().metadata_status();
    if !meta_status.is_empty() {
        return Err(GridError::bad_data_load(format!(
            "local {} grid metadata incomplete (status {:#x})",
            grid.kind(),
            meta_status.bits()
        )));
    }
    if grid.status().contains(GridStatus::NO_DIMS) {
        return Err(GridError::bad_data_load(format!("local {} grid has no dimensions", grid.kind())));
    }
    Ok(())
}

fn self_request(dist: &Distribution) -> GridError {
    GridError::bad_proc_req(format!("process {} owns this grid and cannot request from itself", dist.owner))
}

fn not_owner(dist: &Distribution) -> GridError {
    GridError::bad_proc_req(format!(
        "process {} cannot serve a grid owned by {}",
        dist.group.id(),
        dist.owner
    ))
}

/// A grid that can take part in the owner/requester protocol.
///
/// Implementors store the [`Distribution`] and know how to put their own
/// metadata on a [`Link`]; everything else is provided. A grid with no
/// distribution is local: requester calls answer from the local buffer or
/// are no-ops after a status check.
pub trait Distributed: GridField {
    fn distribution(&self) -> Option<&Distribution>;

    fn distribution_mut(&mut self) -> &mut Option<Distribution>;

    /// Send this grid's metadata in protocol order.
    fn write_meta(&self, link: &Link<'_>) -> GridResult<()>;

    /// Receive metadata in protocol order, replacing axes and dropping the buffer.
    fn read_meta(&mut self, link: &Link<'_>) -> GridResult<()>;

    /// Join `group` with `owner` holding the data.
    ///
    /// A single-process group leaves the grid local.
    fn set_group(&mut self, group: Arc<dyn ProcessGroup>, owner: ProcessId) -> GridResult<()> {
        if owner >= group.size() {
            return Err(GridError::bad_proc_req(format!(
                "owner {owner} outside a group of {}",
                group.size()
            )));
        }
        let dist = (group.size() > 1).then(|| Distribution { group, owner });
        debug!(distributed = dist.is_some(), owner, "set process group");
        *self.distribution_mut() = dist;
        Ok(())
    }

    /// Leave the process group and become local.
    fn clear_group(&mut self) {
        *self.distribution_mut() = None;
    }

    fn is_distributed(&self) -> bool {
        self.distribution().is_some()
    }

    /// True when this process holds the data: the owner, or any local grid.
    fn is_owner(&self) -> bool {
        self.distribution().map_or(true, Distribution::is_owner)
    }

    /// Open a metadata session with the owner.
    fn ask_for_meta(&self) -> GridResult<Session> {
        let Some(dist) = self.distribution() else {
            check_local_meta(self)?;
            return Ok(Session::local());
        };
        if dist.is_owner() {
            return Err(self_request(dist));
        }
        let request = dist.group.open_request();
        dist.group
            .send_ints(dist.owner, request, &[commands::GMETA], tags::GREQ)
            .map_err(GridError::from_group)?;
        debug!(owner = dist.owner, %request, "asked for metadata");
        Ok(Session::opened(request))
    }

    /// Complete a metadata session opened by [`ask_for_meta`](Distributed::ask_for_meta).
    fn receive_meta(&mut self, session: Session) -> GridResult<()> {
        let Some(dist) = self.distribution().cloned() else {
            return check_local_meta(self);
        };
        if dist.is_owner() {
            return Err(self_request(&dist));
        }
        let request = session.require()?;
        let link = Link::new(dist.group(), dist.owner, request);
        self.read_meta(&link)?;
        debug!(owner = dist.owner, %request, quantity = self.meta().quantity(), "received metadata");
        Ok(())
    }

    fn fetch_meta(&mut self) -> GridResult<()> {
        let session = self.ask_for_meta()?;
        self.receive_meta(session)
    }

    /// Values at flat indices, from the owner unless local.
    ///
    /// `LOCAL` reads this process's buffer even when distributed; `DONE`
    /// tells the owner this requester is finished after the reply arrives.
    fn gridpoints_flat(&self, indices: &[usize], flags: FetchFlags) -> GridResult<Vec<Real>> {
        let dist = match self.distribution() {
            Some(dist) if !flags.contains(FetchFlags::LOCAL) => dist,
            _ => return self.values(indices),
        };
        if dist.is_owner() {
            return Err(self_request(dist));
        }

        let coords = indices
            .iter()
            .map(|&idx| {
                i32::try_from(idx).map_err(|_| GridError::bad_data_request(format!("flat index {idx} too large to send")))
            })
            .collect::<GridResult<Vec<i32>>>()?;

        let request = dist.group.open_request();
        let link = Link::new(dist.group(), dist.owner, request);
        dist.group
            .send_ints(dist.owner, request, &[commands::GDATA], tags::GREQ)
            .map_err(GridError::from_group)?;
        link.send_ints(&[coords.len() as i32], tags::GNUM)?;
        link.send_ints(&coords, tags::GCOORDS)?;
        let values = link.recv_reals(coords.len(), tags::GVALS)?;
        debug!(owner = dist.owner, %request, count = values.len(), "received gridpoints");

        if flags.contains(FetchFlags::DONE) {
            self.svr_done()?;
        }
        Ok(values)
    }

    /// Tell the owner this requester needs nothing more.
    fn svr_done(&self) -> GridResult<()> {
        let Some(dist) = self.distribution() else {
            return Ok(());
        };
        if dist.is_owner() {
            return Ok(());
        }
        let request = dist.group.open_request();
        dist.group
            .send_ints(dist.owner, request, &[commands::GDONE], tags::GREQ)
            .map_err(GridError::from_group)?;
        debug!(owner = dist.owner, %request, "sent done");
        Ok(())
    }

    /// Owner side of a metadata session.
    fn svr_send_meta(&self, requester: ProcessId, session: Session) -> GridResult<()> {
        let Some(dist) = self.distribution() else {
            return check_local_meta(self);
        };
        if !dist.is_owner() {
            return Err(not_owner(dist));
        }
        let request = session.require()?;
        let link = Link::new(dist.group(), requester, request);
        self.write_meta(&link)?;
        debug!(requester, %request, "sent metadata");
        Ok(())
    }

    /// Owner side of a values session.
    ///
    /// Indices outside the buffer are answered with the fill value.
    fn svr_send_vals(&self, requester: ProcessId, session: Session) -> GridResult<()> {
        let Some(dist) = self.distribution() else {
            if !self.has_data() {
                return Err(GridError::bad_data_load(format!("local {} grid has no data to send", self.kind())));
            }
            return Ok(());
        };
        if !dist.is_owner() {
            return Err(not_owner(dist));
        }
        let request = session.require()?;
        let link = Link::new(dist.group(), requester, request);
        let n = link.recv_int(tags::GNUM)?;
        let n = usize::try_from(n).map_err(|_| GridError::bad_data_request(format!("negative gridpoint count {n}")))?;
        let coords = link.recv_ints(n, tags::GCOORDS)?;

        let fill = self.fill_value();
        let mut values: Vec<Real> = scratch(coords.len(), "gridpoint reply")?;
        values.extend(coords.iter().map(|&idx| {
            usize::try_from(idx)
                .ok()
                .and_then(|flat| self.value_at(flat).ok())
                .unwrap_or_else(|| {
                    warn!(requester, index = idx, "invalid gridpoint requested, replying with fill value");
                    fill
                })
        }));
        link.send_reals(&values, tags::GVALS)?;
        debug!(requester, %request, count = n, "sent gridpoints");
        Ok(())
    }

    /// Serve requests until `client` (or every other member, if `None`) is done.
    fn svr_listen(&self, client: Option<ProcessId>) -> GridResult<()> {
        let Some(dist) = self.distribution() else {
            return Ok(());
        };
        if !dist.is_owner() {
            return Err(not_owner(dist));
        }
        let goal = if client.is_some() { 1 } else { dist.group.size() - 1 };
        let mut done = 0;
        debug!(owner = dist.owner, ?client, goal, "listening");
        while done < goal {
            let received = dist
                .group
                .receive_ints(client, None, 1, tags::GREQ)
                .map_err(GridError::from_group)?;
            let session = Session::opened(received.request);
            match received.value[0] {
                commands::GDONE => done += 1,
                commands::GMETA => self.svr_send_meta(received.source, session)?,
                commands::GDATA => self.svr_send_vals(received.source, session)?,
                other => warn!(source = received.source, command = other, "unknown grid command"),
            }
        }
        debug!(owner = dist.owner, "all requesters done");
        Ok(())
    }

    /// Run the owner's service loop.
    ///
    /// Returns `true` when the caller is a requester (or local) and should
    /// carry on with its own work, `false` once the owner has served everyone.
    fn svr_start(&self) -> GridResult<bool> {
        match self.distribution() {
            Some(dist) if dist.is_owner() => {
                self.svr_listen(None)?;
                Ok(false)
            }
            _ => Ok(true),
        }
    }
}

impl Distributed for AnyGrid {
    fn distribution(&self) -> Option<&Distribution> {
        each_grid!(self, g => g.distribution())
    }

    fn distribution_mut(&mut self) -> &mut Option<Distribution> {
        each_grid!(self, g => g.distribution_mut())
    }

    fn write_meta(&self, link: &Link<'_>) -> GridResult<()> {
        each_grid!(self, g => g.write_meta(link))
    }

    fn read_meta(&mut self, link: &Link<'_>) -> GridResult<()> {
        each_grid!(self, g => g.read_meta(link))
    }
}
