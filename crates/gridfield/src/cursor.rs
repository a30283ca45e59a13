//! Cursors over grid buffers: flat, per-level and per-column.
//!
//! A cursor is a position in `[begin, end)` of a borrowed buffer. Reading at
//! `end` yields `None`. Every cursor can report the solid-angle weight of the
//! gridpoint it is on, read from the grid's area table.

use crate::error::{GridError, GridResult};
use crate::field::Shape;
use crate::Real;

/// Read-only cursor over a contiguous block of a grid buffer.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    data: &'a [Real],
    areas: &'a [Real],
    shape: Shape,
    pos: usize,
    end: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a [Real], areas: &'a [Real], shape: Shape, begin: usize, end: usize) -> Self {
        Self {
            data,
            areas,
            shape,
            pos: begin,
            end,
        }
    }

    pub fn get(&self) -> Option<Real> {
        if self.is_end() {
            None
        } else {
            self.data.get(self.pos).copied()
        }
    }

    /// Step forward; returns false once the end is reached.
    pub fn advance(&mut self) -> bool {
        if self.pos < self.end {
            self.pos += 1;
        }
        !self.is_end()
    }

    /// Flat offset of the current gridpoint.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_end(&self) -> bool {
        self.pos >= self.end
    }

    /// `(i, j, k)` of the current gridpoint.
    pub fn indices(&self) -> Option<(usize, usize, usize)> {
        (!self.is_end()).then(|| self.shape.split(self.pos))
    }

    pub fn area(&self) -> Option<Real> {
        if self.is_end() {
            return None;
        }
        self.areas.get(self.pos % self.shape.horizontal()).copied()
    }
}

impl Iterator for Cursor<'_> {
    type Item = Real;

    fn next(&mut self) -> Option<Real> {
        let v = self.get()?;
        self.pos += 1;
        Some(v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.end.saturating_sub(self.pos);
        (left, Some(left))
    }
}

/// Read-write cursor over a contiguous block of a grid buffer.
#[derive(Debug)]
pub struct CursorMut<'a> {
    data: &'a mut [Real],
    areas: &'a [Real],
    shape: Shape,
    pos: usize,
    end: usize,
}

impl<'a> CursorMut<'a> {
    pub(crate) fn new(data: &'a mut [Real], areas: &'a [Real], shape: Shape, begin: usize, end: usize) -> Self {
        Self {
            data,
            areas,
            shape,
            pos: begin,
            end,
        }
    }

    pub fn get(&self) -> Option<Real> {
        if self.is_end() {
            None
        } else {
            self.data.get(self.pos).copied()
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut Real> {
        if self.is_end() {
            None
        } else {
            self.data.get_mut(self.pos)
        }
    }

    /// Overwrite the current value.
    pub fn set(&mut self, v: Real) -> GridResult<()> {
        let pos = self.pos;
        let slot = self
            .get_mut()
            .ok_or_else(|| GridError::bad_data_request(format!("cursor at end ({pos}) cannot be written")))?;
        *slot = v;
        Ok(())
    }

    pub fn advance(&mut self) -> bool {
        if self.pos < self.end {
            self.pos += 1;
        }
        !self.is_end()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_end(&self) -> bool {
        self.pos >= self.end
    }

    pub fn indices(&self) -> Option<(usize, usize, usize)> {
        (!self.is_end()).then(|| self.shape.split(self.pos))
    }

    pub fn area(&self) -> Option<Real> {
        if self.is_end() {
            return None;
        }
        self.areas.get(self.pos % self.shape.horizontal()).copied()
    }
}

/// Walks the horizontal gridpoints of a volume, one vertical column at a time.
///
/// Columns are copied out; nothing here aliases the grid buffer.
#[derive(Debug, Clone)]
pub struct ProfileCursor<'a> {
    data: &'a [Real],
    areas: &'a [Real],
    shape: Shape,
    pos: usize,
}

impl<'a> ProfileCursor<'a> {
    pub(crate) fn new(data: &'a [Real], areas: &'a [Real], shape: Shape, start: usize) -> Self {
        Self {
            data,
            areas,
            shape,
            pos: start,
        }
    }

    /// Copy of the column under the cursor, bottom level first.
    pub fn profile(&self) -> Option<Vec<Real>> {
        if self.is_end() {
            return None;
        }
        let nh = self.shape.horizontal();
        Some((0..self.shape.nlev).map(|k| self.data[k * nh + self.pos]).collect())
    }

    pub fn advance(&mut self) -> bool {
        if !self.is_end() {
            self.pos += 1;
        }
        !self.is_end()
    }

    /// Horizontal offset `j * nlon + i` of the current column.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_end(&self) -> bool {
        self.pos >= self.shape.horizontal()
    }

    /// `(i, j)` of the current column.
    pub fn indices(&self) -> Option<(usize, usize)> {
        (!self.is_end()).then(|| (self.pos % self.shape.nlon, self.pos / self.shape.nlon))
    }

    pub fn area(&self) -> Option<Real> {
        if self.is_end() {
            None
        } else {
            self.areas.get(self.pos).copied()
        }
    }
}

impl Iterator for ProfileCursor<'_> {
    type Item = Vec<Real>;

    fn next(&mut self) -> Option<Vec<Real>> {
        let column = self.profile()?;
        self.pos += 1;
        Some(column)
    }
}

/// Column cursor that can also write whole columns back.
#[derive(Debug)]
pub struct ProfileCursorMut<'a> {
    data: &'a mut [Real],
    areas: &'a [Real],
    shape: Shape,
    pos: usize,
}

impl<'a> ProfileCursorMut<'a> {
    pub(crate) fn new(data: &'a mut [Real], areas: &'a [Real], shape: Shape, start: usize) -> Self {
        Self {
            data,
            areas,
            shape,
            pos: start,
        }
    }

    pub fn profile(&self) -> Option<Vec<Real>> {
        if self.is_end() {
            return None;
        }
        let nh = self.shape.horizontal();
        Some((0..self.shape.nlev).map(|k| self.data[k * nh + self.pos]).collect())
    }

    /// Copy `column` into the grid at the current position.
    pub fn assign(&mut self, column: &[Real]) -> GridResult<()> {
        if column.len() != self.shape.nlev {
            return Err(GridError::bad_data_index(format!(
                "profile of {} values for {} levels",
                column.len(),
                self.shape.nlev
            )));
        }
        if self.is_end() {
            return Err(GridError::bad_data_request("profile cursor is at the end"));
        }
        let nh = self.shape.horizontal();
        for (k, v) in column.iter().enumerate() {
            self.data[k * nh + self.pos] = *v;
        }
        Ok(())
    }

    pub fn advance(&mut self) -> bool {
        if !self.is_end() {
            self.pos += 1;
        }
        !self.is_end()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_end(&self) -> bool {
        self.pos >= self.shape.horizontal()
    }

    pub fn indices(&self) -> Option<(usize, usize)> {
        (!self.is_end()).then(|| (self.pos % self.shape.nlon, self.pos / self.shape.nlon))
    }

    pub fn area(&self) -> Option<Real> {
        if self.is_end() {
            None
        } else {
            self.areas.get(self.pos).copied()
        }
    }
}
