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

//! A single member of a [`List`](crate::list::List).

use crate::cache::CacheIdentifier;
use crate::range::Range;
use crate::timestamp::{self, Timestamp};

/// A range in a list, with its position in the list's value space.
///
/// The value offset is the sum of the value sizes of every element before
/// this one. It is recomputed by the owning list, lazily, so it is only
/// meaningful after the list has brought its offsets up to date.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    index: usize,
    range: Range,
    mapped_size: Option<u64>,
    value_offset: u64,
    timestamp: Timestamp,
}

impl Element {
    pub(crate) fn new(index: usize, range: Range) -> Element {
        Element { index, range, mapped_size: None, value_offset: 0, timestamp: timestamp::next() }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn range(&self) -> &Range {
        &self.range
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn value_offset(&self) -> u64 {
        self.value_offset
    }

    /// The size this element occupies in the list's value space: the mapped
    /// size when one was set, otherwise the size of its range.
    pub fn value_size(&self) -> u64 {
        self.mapped_size.unwrap_or_else(|| self.range.size())
    }

    pub fn mapped_size(&self) -> Option<u64> {
        self.mapped_size
    }

    pub(crate) fn contains_value_offset(&self, offset: u64) -> bool {
        offset >= self.value_offset && offset - self.value_offset < self.value_size()
    }

    pub(crate) fn cache_identifier(&self) -> CacheIdentifier {
        CacheIdentifier::new(self.range.offset(), self.timestamp)
    }

    /// Replaces the range. A new range means new data, so the timestamp is
    /// renewed and any mapped size is dropped.
    pub(crate) fn set_range(&mut self, range: Range) {
        self.range = range;
        self.mapped_size = None;
        self.timestamp = timestamp::next();
    }

    pub(crate) fn set_mapped_size(&mut self, mapped_size: Option<u64>) {
        self.mapped_size = mapped_size;
    }

    pub(crate) fn set_value_offset(&mut self, value_offset: u64) {
        self.value_offset = value_offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::RangeFlags;

    #[test]
    fn set_range_renews_timestamp() {
        let mut element = Element::new(3, Range::new(0, 10, RangeFlags::empty()).unwrap());
        let before = element.timestamp();
        element.set_mapped_size(Some(40));
        assert_eq!(element.value_size(), 40);
        assert_eq!(element.timestamp(), before);

        element.set_range(Range::new(100, 12, RangeFlags::empty()).unwrap());
        assert!(element.timestamp() > before);
        assert_eq!(element.value_size(), 12);
        assert_eq!(element.cache_identifier(), CacheIdentifier::new(100, element.timestamp()));
    }

    #[test]
    fn contains_value_offset() {
        let mut element = Element::new(0, Range::new(0, 5, RangeFlags::empty()).unwrap());
        element.set_value_offset(10);
        assert!(!element.contains_value_offset(9));
        assert!(element.contains_value_offset(10));
        assert!(element.contains_value_offset(14));
        assert!(!element.contains_value_offset(15));

        let empty = Element::new(1, Range::default());
        assert!(!empty.contains_value_offset(0));
    }
}
