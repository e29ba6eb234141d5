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

//! A contiguous byte stream assembled from segments on a medium.

use std::cmp::min;
use std::convert::TryFrom;
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::{self, Deref};
use std::sync::Arc;

use log::{debug, trace};

use crate::cache::{CacheIdentifier, CacheStore, ReadFlags};
use crate::error::{Error, Result};
use crate::list::{ElementSource, List};
use crate::medium::{read_range, Medium};
use crate::range::{Range, RangeFlags};
use crate::timestamp::{self, Timestamp};

/// Reads segment bytes straight off the medium.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawSegments;

impl ElementSource<Vec<u8>> for RawSegments {
    fn read_element_data(
        &self,
        medium: &mut dyn Medium,
        _element_index: usize,
        range: &Range,
        _read_flags: ReadFlags,
    ) -> Result<Vec<u8>> {
        read_range(medium, range)
    }
}

/// The bytes of one segment.
///
/// When the block's whole buffer is cached this is a window into it, so no
/// bytes are copied.
#[derive(Clone, Debug)]
pub struct SegmentData {
    data: Arc<Vec<u8>>,
    window: ops::Range<usize>,
}

impl SegmentData {
    /// The buffer the window points into.
    pub fn buffer(&self) -> &Arc<Vec<u8>> {
        &self.data
    }

    pub fn window(&self) -> ops::Range<usize> {
        self.window.clone()
    }
}

impl Deref for SegmentData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data[self.window.clone()]
    }
}

fn to_usize(value: u64, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::out_of_bounds(format!("{} {}", what, value)))
}

/// A byte stream made of segments laid end to end.
///
/// Segment values are plain bytes. They are cached one per slot like list
/// elements, or, after [`Block::get_data`], as a single buffer holding the
/// whole stream in slot 0 under the identifier `(0, timestamp)`.
///
/// # Invariants:
/// - `segment_index` and `segment_data_offset` describe `data_offset`
///   whenever `position_stale` is false.
#[derive(Clone, Debug)]
pub struct Block<S = RawSegments> {
    segments: List<Vec<u8>, S>,
    timestamp: Timestamp,
    data_offset: u64,
    segment_index: usize,
    segment_data_offset: u64,
    position_stale: bool,
}

impl Block<RawSegments> {
    pub fn new() -> Block<RawSegments> {
        Block::with_source(RawSegments)
    }
}

impl Default for Block<RawSegments> {
    fn default() -> Self {
        Block::new()
    }
}

impl<S> Block<S> {
    pub fn with_source(source: S) -> Block<S> {
        Block {
            segments: List::new(source),
            timestamp: timestamp::next(),
            data_offset: 0,
            segment_index: 0,
            segment_data_offset: 0,
            position_stale: false,
        }
    }

    pub fn source(&self) -> &S {
        self.segments.source()
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// The total number of bytes in the stream.
    pub fn size(&self) -> u64 {
        self.segments.value_size()
    }

    /// The current stream position.
    pub fn offset(&self) -> u64 {
        self.data_offset
    }

    /// The segment and offset within it of the current position.
    ///
    /// At or past the end of the stream the segment index equals the
    /// number of segments.
    pub fn segment_position(&mut self) -> Result<(usize, u64)> {
        self.resolve_position()?;
        Ok((self.segment_index, self.segment_data_offset))
    }

    pub fn number_of_segments(&self) -> usize {
        self.segments.number_of_elements()
    }

    pub fn append_segment(&mut self, offset: i64, size: u64, flags: RangeFlags) -> Result<usize> {
        let index = self.segments.append_element(offset, size, flags)?;
        self.changed();
        Ok(index)
    }

    pub fn set_segment_by_index(
        &mut self,
        segment_index: usize,
        offset: i64,
        size: u64,
        flags: RangeFlags,
    ) -> Result<()> {
        self.segments.set_element_by_index(segment_index, offset, size, flags)?;
        self.changed();
        Ok(())
    }

    pub fn get_segment_by_index(&self, segment_index: usize) -> Result<Range> {
        self.segments.get_element_by_index(segment_index)
    }

    pub fn resize(&mut self, number_of_segments: usize) {
        self.segments.resize(number_of_segments);
        self.changed();
    }

    pub fn empty(&mut self) {
        self.segments.empty();
        self.data_offset = 0;
        self.changed();
    }

    fn changed(&mut self) {
        self.timestamp = timestamp::next();
        self.position_stale = true;
    }

    fn whole_identifier(&self) -> CacheIdentifier {
        CacheIdentifier::new(0, self.timestamp)
    }

    /// The cached whole buffer, if the cache holds nothing else.
    fn whole_buffer(&self, cache: &dyn CacheStore<Vec<u8>>) -> Result<Option<Arc<Vec<u8>>>> {
        if cache.number_of_values() != 1 {
            return Ok(None);
        }
        let buffer = cache.lookup(0, self.whole_identifier())?;
        Ok(buffer.filter(|data| data.len() as u64 == self.size()))
    }

    fn resolve_position(&mut self) -> Result<()> {
        if !self.position_stale {
            return Ok(());
        }
        if self.data_offset < self.size() {
            let (index, within) = self.segments.get_element_index_at_value_offset(self.data_offset)?;
            self.segment_index = index;
            self.segment_data_offset = within;
        } else {
            self.segment_index = self.segments.number_of_elements();
            self.segment_data_offset = 0;
        }
        self.position_stale = false;
        Ok(())
    }

    /// Moves the stream position.
    ///
    /// Positions past the end are allowed and read as end of stream.
    pub fn seek_offset(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.data_offset) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(self.size()) + i128::from(delta),
        };
        if target < 0 {
            return Err(Error::invalid(format!("seek to negative position {}", target)));
        }
        if target > i128::from(i64::MAX) {
            return Err(Error::out_of_bounds(format!("stream position {}", target)));
        }
        self.data_offset = target as u64;
        self.position_stale = true;
        self.resolve_position()?;
        trace!(
            "block seek to {} (segment {} offset {})",
            self.data_offset,
            self.segment_index,
            self.segment_data_offset
        );
        Ok(self.data_offset)
    }
}

impl<S: ElementSource<Vec<u8>>> Block<S> {
    /// Returns the bytes of one segment.
    pub fn get_segment_data(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<Vec<u8>>,
        segment_index: usize,
        read_flags: ReadFlags,
    ) -> Result<SegmentData> {
        let expected = self.segments.get_element(segment_index)?.value_size();
        if !read_flags.contains(ReadFlags::IGNORE_CACHE) {
            if let Some(data) = self.whole_buffer(cache)? {
                if self.segments.value_offsets_stale() {
                    self.segments.calculate_value_offsets();
                }
                let start = self.segments.get_element(segment_index)?.value_offset();
                let start = to_usize(start, "segment offset")?;
                let end = start + to_usize(expected, "segment size")?;
                trace!("segment {} served from whole buffer [{}, {})", segment_index, start, end);
                return Ok(SegmentData { data, window: start..end });
            }
        }
        let data = self.segments.get_element_value(medium, cache, segment_index, read_flags)?;
        if data.len() as u64 != expected {
            return Err(Error::invalid(format!(
                "segment {} produced {} bytes instead of {}",
                segment_index,
                data.len(),
                expected
            )));
        }
        let window = 0..data.len();
        Ok(SegmentData { data, window })
    }

    /// Returns the whole stream as one buffer.
    ///
    /// Unless it is already cached, every segment is read in order and
    /// the concatenation replaces the entire contents of the cache.
    pub fn get_data(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<Vec<u8>>,
        read_flags: ReadFlags,
    ) -> Result<Arc<Vec<u8>>> {
        if !read_flags.contains(ReadFlags::IGNORE_CACHE) {
            if let Some(data) = self.whole_buffer(cache)? {
                return Ok(data);
            }
        }
        let size = to_usize(self.size(), "block size")?;
        let mut data = Vec::with_capacity(size);
        for segment_index in 0..self.segments.number_of_elements() {
            if self.segments.element(segment_index).is_none() {
                continue;
            }
            let segment = self.get_segment_data(medium, cache, segment_index, read_flags)?;
            data.extend_from_slice(&segment);
        }
        if data.len() != size {
            return Err(Error::ShortRead { expected: size, actual: data.len() });
        }
        debug!("coalesced {} segments into {} bytes", self.segments.number_of_elements(), size);
        let identifier = self.whole_identifier();
        cache.clear();
        cache.set_entry(0, identifier, Arc::new(data))?;
        cache.lookup(0, identifier)?.ok_or(Error::CacheMiss { slot: 0 })
    }

    /// Reads from the current position into `buf`, crossing segment
    /// boundaries as needed. Returns 0 at the end of the stream.
    pub fn read_buffer(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<Vec<u8>>,
        buf: &mut [u8],
    ) -> Result<usize> {
        self.resolve_position()?;
        let size = self.size();
        let mut read = 0;
        while read < buf.len() && self.data_offset < size {
            if self.segments.element(self.segment_index).is_none() {
                self.segment_index += 1;
                continue;
            }
            let segment = self.get_segment_data(medium, cache, self.segment_index, ReadFlags::empty())?;
            let start = to_usize(self.segment_data_offset, "segment offset")?;
            let count = min(buf.len() - read, segment.len().saturating_sub(start));
            buf[read..read + count].copy_from_slice(&segment[start..start + count]);
            read += count;
            self.data_offset += count as u64;
            self.segment_data_offset += count as u64;
            if start + count >= segment.len() {
                self.segment_index += 1;
                self.segment_data_offset = 0;
            }
        }
        Ok(read)
    }

    /// Borrows the block as a [`std::io::Read`] and [`std::io::Seek`] stream.
    pub fn reader<'a>(
        &'a mut self,
        medium: &'a mut dyn Medium,
        cache: &'a mut dyn CacheStore<Vec<u8>>,
    ) -> BlockReader<'a, S> {
        BlockReader { block: self, medium, cache }
    }
}

/// A [`Block`] bound to its medium and cache.
pub struct BlockReader<'a, S> {
    block: &'a mut Block<S>,
    medium: &'a mut dyn Medium,
    cache: &'a mut dyn CacheStore<Vec<u8>>,
}

impl<'a, S: ElementSource<Vec<u8>>> Read for BlockReader<'a, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.block.read_buffer(self.medium, self.cache, buf)?)
    }
}

impl<'a, S: ElementSource<Vec<u8>>> Seek for BlockReader<'a, S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.block.seek_offset(pos)?)
    }
}
