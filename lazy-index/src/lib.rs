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

//! Lazy, cache-backed indexes over byte-addressable media.
//!
//! Data on a medium is described as a [`List`] of ranges, a fixed-stride
//! [`Vector`], a [`Block`] of segments read as one stream, or a [`Tree`]
//! whose shape is discovered as it is walked. Nothing is read until a
//! value is asked for, and values are kept in a caller-owned cache until
//! the range they came from changes.
//!
//! ```
//! use std::io::Cursor;
//! use lazy_index::{Cache, List, Medium, Range, RangeFlags, ReadFlags, Result};
//!
//! let mut medium = Cursor::new(b"hello, world".to_vec());
//! let mut list = List::new(|m: &mut dyn Medium, _: usize, r: &Range, _: ReadFlags| -> Result<Vec<u8>> {
//!     lazy_index::read_range(m, r)
//! });
//! list.append_element(7, 5, RangeFlags::empty())?;
//! list.append_element(0, 5, RangeFlags::empty())?;
//!
//! let mut cache = Cache::new(16)?;
//! let value = list.get_element_value(&mut medium, &mut cache, 1, ReadFlags::empty())?;
//! assert_eq!(value.as_slice(), b"hello");
//! # Ok::<(), lazy_index::Error>(())
//! ```

#![allow(clippy::len_without_is_empty, clippy::new_without_default)]

pub mod block;
pub mod cache;
pub mod config;
pub mod element;
pub mod error;
pub mod list;
pub mod medium;
pub mod range;
#[cfg(test)]
mod test_helpers;
pub mod timestamp;
pub mod tree;
pub mod vector;

pub use crate::block::{Block, BlockReader, RawSegments, SegmentData};
pub use crate::cache::{Cache, CacheEntry, CacheIdentifier, CacheStore, ReadFlags};
pub use crate::config::{CacheKind, Config};
pub use crate::element::Element;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::list::{ElementSource, List};
pub use crate::medium::{read_exact_at, read_range, Medium};
pub use crate::range::{Range, RangeFlags};
pub use crate::timestamp::Timestamp;
pub use crate::tree::{
    node_cache_slot, InsertFlags, NodeDescriptor, NodeFlags, NodeId, NodeSource, SubNodes, Tree,
    TreeNode,
};
pub use crate::vector::{Vector, VectorSource};
