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

//! Byte spans on an external medium.

use std::convert::TryFrom;
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

bitflags! {
    /// Flags attached to a [`Range`].
    ///
    /// Bits other than the named ones are retained untouched, so formats
    /// can carry their own markers through the structures.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RangeFlags: u32 {
        /// The range has no backing data and reads as zeroes.
        const IS_SPARSE = 0x0000_0001;
        /// The data stored in the range is compressed.
        const IS_COMPRESSED = 0x0000_0002;

        const _ = !0;
    }
}

/// An `(offset, size, flags)` description of a byte span.
///
/// # Invariants:
/// - `offset >= 0`
/// - `size <= i64::MAX`, and `offset + size` does not overflow `i64`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct Range {
    offset: i64,
    size: u64,
    flags: RangeFlags,
}

#[derive(Deserialize)]
#[serde(rename = "Range")]
struct RawRange {
    offset: i64,
    size: u64,
    #[serde(default)]
    flags: RangeFlags,
}

impl TryFrom<RawRange> for Range {
    type Error = Error;

    fn try_from(raw: RawRange) -> Result<Range> {
        Range::new(raw.offset, raw.size, raw.flags)
    }
}

fn check(offset: i64, size: u64) -> Result<()> {
    if offset < 0 {
        return Err(Error::invalid(format!("range offset {} is negative", offset)));
    }
    if size > i64::MAX as u64 {
        return Err(Error::out_of_bounds(format!("range size {}", size)));
    }
    if offset.checked_add(size as i64).is_none() {
        return Err(Error::out_of_bounds(format!("range end {} + {}", offset, size)));
    }
    Ok(())
}

impl Range {
    pub fn new(offset: i64, size: u64, flags: RangeFlags) -> Result<Range> {
        check(offset, size)?;
        Ok(Range { offset, size, flags })
    }

    /// A sparse range of `size` bytes, which reads as zeroes.
    pub fn sparse(size: u64) -> Result<Range> {
        Range::new(0, size, RangeFlags::IS_SPARSE)
    }

    pub fn get(&self) -> (i64, u64, RangeFlags) {
        (self.offset, self.size, self.flags)
    }

    /// Replaces all three fields. On failure the range is left unchanged.
    pub fn set(&mut self, offset: i64, size: u64, flags: RangeFlags) -> Result<()> {
        check(offset, size)?;
        self.offset = offset;
        self.size = size;
        self.flags = flags;
        Ok(())
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn flags(&self) -> RangeFlags {
        self.flags
    }

    /// One past the last byte of the range.
    pub fn end(&self) -> i64 {
        self.offset + self.size as i64
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn is_sparse(&self) -> bool {
        self.flags.contains(RangeFlags::IS_SPARSE)
    }

    pub fn contains(&self, offset: i64) -> bool {
        offset >= self.offset && offset < self.end()
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}, {})", self.offset, self.end())?;
        if !self.flags.is_empty() {
            write!(f, " flags 0x{:08x}", self.flags.bits())?;
        }
        Ok(())
    }
}
