// Copyright 2026 The lazy-index Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Fixed-stride vectors backed by a few large segments.

use std::convert::TryFrom;
use std::marker::PhantomData;
use std::sync::Arc;

use log::trace;

use crate::cache::{direct_slot, fetch_or_read, CacheIdentifier, CacheStore, ReadFlags};
use crate::error::{Error, Result};
use crate::medium::Medium;
use crate::range::{Range, RangeFlags};
use crate::timestamp::{self, Timestamp};

/// Produces the value of one vector element from the medium.
///
/// `offset` is the absolute position of the element on the medium and
/// `element_size` the vector's stride.
pub trait VectorSource<V> {
    fn read_element_data(
        &self,
        medium: &mut dyn Medium,
        element_index: usize,
        offset: i64,
        element_size: u64,
        range_flags: RangeFlags,
        read_flags: ReadFlags,
    ) -> Result<V>;
}

impl<V, F> VectorSource<V> for F
where
    F: Fn(&mut dyn Medium, usize, i64, u64, RangeFlags, ReadFlags) -> Result<V>,
{
    fn read_element_data(
        &self,
        medium: &mut dyn Medium,
        element_index: usize,
        offset: i64,
        element_size: u64,
        range_flags: RangeFlags,
        read_flags: ReadFlags,
    ) -> Result<V> {
        self(medium, element_index, offset, element_size, range_flags, read_flags)
    }
}

/// A sequence of equally sized elements.
///
/// Element `i` starts at logical offset `i * element_size`. The logical
/// space is the concatenation of the segments, in order. The whole vector
/// shares a single timestamp, so any change to its segments invalidates
/// every cached element at once.
#[derive(Debug)]
pub struct Vector<V, S> {
    element_size: u64,
    segments: Vec<Option<Range>>,
    size: u64,
    timestamp: Timestamp,
    source: S,
    _value: PhantomData<fn() -> V>,
}

impl<V, S: Clone> Clone for Vector<V, S> {
    fn clone(&self) -> Self {
        Vector {
            element_size: self.element_size,
            segments: self.segments.clone(),
            size: self.size,
            timestamp: self.timestamp,
            source: self.source.clone(),
            _value: PhantomData,
        }
    }
}

impl<V, S> Vector<V, S> {
    pub fn new(element_size: u64, source: S) -> Result<Vector<V, S>> {
        if element_size == 0 {
            return Err(Error::invalid("element size of zero"));
        }
        Ok(Vector {
            element_size,
            segments: Vec::new(),
            size: 0,
            timestamp: timestamp::next(),
            source,
            _value: PhantomData,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn element_size(&self) -> u64 {
        self.element_size
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// The sum of all segment sizes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The number of whole elements covered by the segments.
    pub fn number_of_elements(&self) -> u64 {
        self.size / self.element_size
    }

    pub fn number_of_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn empty(&mut self) {
        self.segments.clear();
        self.size = 0;
        self.timestamp = timestamp::next();
    }

    /// Grows the segment table with unset segments, or drops trailing ones.
    pub fn resize(&mut self, number_of_segments: usize) {
        if number_of_segments < self.segments.len() {
            let removed: u64 =
                self.segments[number_of_segments..].iter().flatten().map(Range::size).sum();
            self.size -= removed;
        }
        self.segments.resize(number_of_segments, None);
        self.timestamp = timestamp::next();
    }

    pub fn append_segment(&mut self, offset: i64, size: u64, flags: RangeFlags) -> Result<usize> {
        let range = Range::new(offset, size, flags)?;
        let new_size = self.grown_size(0, size)?;
        self.segments.push(Some(range));
        self.size = new_size;
        self.timestamp = timestamp::next();
        Ok(self.segments.len() - 1)
    }

    pub fn set_segment_by_index(
        &mut self,
        segment_index: usize,
        offset: i64,
        size: u64,
        flags: RangeFlags,
    ) -> Result<()> {
        let range = Range::new(offset, size, flags)?;
        let old = self
            .segments
            .get(segment_index)
            .ok_or_else(|| Error::out_of_bounds(format!("segment index {}", segment_index)))?;
        let new_size = self.grown_size(old.map_or(0, |r| r.size()), size)?;
        self.segments[segment_index] = Some(range);
        self.size = new_size;
        self.timestamp = timestamp::next();
        Ok(())
    }

    pub fn get_segment_by_index(&self, segment_index: usize) -> Result<Range> {
        match self.segments.get(segment_index) {
            None => Err(Error::out_of_bounds(format!("segment index {}", segment_index))),
            Some(None) => Err(Error::missing(format!("segment {}", segment_index))),
            Some(Some(range)) => Ok(*range),
        }
    }

    /// Finds the element containing the logical `offset`, and the offset
    /// within that element.
    pub fn get_element_index_at_offset(&self, offset: u64) -> Result<(usize, u64)> {
        if offset >= self.number_of_elements() * self.element_size {
            return Err(Error::out_of_bounds(format!("vector offset {}", offset)));
        }
        let element_index = usize::try_from(offset / self.element_size)
            .map_err(|_| Error::out_of_bounds(format!("vector offset {}", offset)))?;
        Ok((element_index, offset % self.element_size))
    }

    /// Maps an element to its position on the medium.
    ///
    /// Segments are walked in order, accumulating their sizes, until the
    /// one holding the element is found. An element split across two
    /// segments cannot be read as one span and is rejected.
    pub fn element_physical_offset(&self, element_index: usize) -> Result<(i64, RangeFlags)> {
        if element_index as u64 >= self.number_of_elements() {
            return Err(Error::out_of_bounds(format!("element index {}", element_index)));
        }
        let logical = element_index as u64 * self.element_size;
        let mut segment_start = 0;
        for range in self.segments.iter().flatten() {
            if logical < segment_start + range.size() {
                let within = logical - segment_start;
                if within + self.element_size > range.size() {
                    return Err(Error::Unsupported(format!(
                        "element {} straddles the end of segment {}",
                        element_index, range
                    )));
                }
                return Ok((range.offset() + within as i64, range.flags()));
            }
            segment_start += range.size();
        }
        Err(Error::out_of_bounds(format!("element index {}", element_index)))
    }

    fn grown_size(&self, removed: u64, added: u64) -> Result<u64> {
        (self.size - removed)
            .checked_add(added)
            .filter(|&size| size <= i64::MAX as u64)
            .ok_or_else(|| Error::out_of_bounds("vector size"))
    }
}

impl<V, S: VectorSource<V>> Vector<V, S> {
    pub fn get_element_value_by_index(
        &self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        element_index: usize,
        read_flags: ReadFlags,
    ) -> Result<Arc<V>> {
        let (offset, flags) = self.element_physical_offset(element_index)?;
        let slot = direct_slot(element_index as u64, cache.capacity())?;
        let identifier = CacheIdentifier::new(offset, self.timestamp);
        fetch_or_read(cache, slot, identifier, read_flags, || {
            trace!("reading vector element {} at {}", element_index, offset);
            self.source.read_element_data(
                medium,
                element_index,
                offset,
                self.element_size,
                flags,
                read_flags,
            )
        })
    }

    /// Returns the offset within the element and the element's value, for
    /// the element containing the logical `offset`.
    pub fn get_element_value_at_offset(
        &self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        offset: u64,
        read_flags: ReadFlags,
    ) -> Result<(u64, Arc<V>)> {
        let (element_index, element_offset) = self.get_element_index_at_offset(offset)?;
        let value = self.get_element_value_by_index(medium, cache, element_index, read_flags)?;
        Ok((element_offset, value))
    }

    pub fn set_element_value_by_index(
        &self,
        cache: &mut dyn CacheStore<V>,
        element_index: usize,
        value: impl Into<Arc<V>>,
    ) -> Result<()> {
        let (offset, _) = self.element_physical_offset(element_index)?;
        let slot = direct_slot(element_index as u64, cache.capacity())?;
        cache.set_entry(slot, CacheIdentifier::new(offset, self.timestamp), value.into())
    }
}
