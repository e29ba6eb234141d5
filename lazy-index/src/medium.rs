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

//! The positioned byte stream every structure ultimately reads from.

use std::convert::TryFrom;
use std::io::{self, Read, Seek, SeekFrom};

use log::trace;

use crate::error::{Error, Result};
use crate::range::Range;

/// A seekable byte source.
///
/// Anything that is `Read + Seek` is a medium, so files, in-memory cursors
/// and buffered readers can be handed to the structures directly. Read
/// callbacks receive the medium as `&mut dyn Medium`.
///
/// Method names stay distinct from `Seek::seek` and `Read::read`, which
/// are still callable as methods wherever this trait is in scope.
pub trait Medium {
    fn seek_to(&mut self, pos: SeekFrom) -> io::Result<u64>;

    /// Reads up to `buf.len()` bytes, returning how many were read.
    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<T: Read + Seek + ?Sized> Medium for T {
    #[inline]
    fn seek_to(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Seek::seek(self, pos)
    }

    #[inline]
    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }
}

/// Seeks to `offset` and fills `buf` completely.
///
/// Running out of data before the buffer is full is a [`Error::ShortRead`].
pub fn read_exact_at(medium: &mut dyn Medium, offset: i64, buf: &mut [u8]) -> Result<()> {
    if offset < 0 {
        return Err(Error::invalid(format!("read offset {} is negative", offset)));
    }
    let position = medium.seek_to(SeekFrom::Start(offset as u64))?;
    if position != offset as u64 {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("seek to {} landed at {}", offset, position),
        )));
    }
    let mut filled = 0;
    while filled < buf.len() {
        match medium.read_into(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    if filled != buf.len() {
        return Err(Error::ShortRead { expected: buf.len(), actual: filled });
    }
    Ok(())
}

/// Reads the bytes described by `range`.
///
/// Sparse ranges are not backed by the medium and come back zero-filled.
pub fn read_range(medium: &mut dyn Medium, range: &Range) -> Result<Vec<u8>> {
    let size = usize::try_from(range.size())
        .map_err(|_| Error::out_of_bounds(format!("range size {}", range.size())))?;
    let mut data = vec![0; size];
    if range.is_sparse() {
        trace!("sparse range {} read as {} zero bytes", range, size);
        return Ok(data);
    }
    read_exact_at(medium, range.offset(), &mut data)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::range::RangeFlags;
    use std::io::Cursor;

    fn medium() -> Cursor<Vec<u8>> {
        Cursor::new((0u8..64).collect())
    }

    #[test]
    fn reads_exact_range() {
        let mut m = medium();
        let range = Range::new(10, 4, RangeFlags::empty()).unwrap();
        assert_eq!(read_range(&mut m, &range).unwrap(), vec![10, 11, 12, 13]);
    }

    #[test]
    fn short_read_fails() {
        let mut m = medium();
        let range = Range::new(60, 8, RangeFlags::empty()).unwrap();
        let err = read_range(&mut m, &range).unwrap_err();
        assert!(matches!(err, Error::ShortRead { expected: 8, actual: 4 }));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn sparse_range_skips_medium() {
        let mut m = Cursor::new(Vec::new());
        let range = Range::sparse(6).unwrap();
        assert_eq!(read_range(&mut m, &range).unwrap(), vec![0; 6]);
        assert_eq!(m.position(), 0);
    }

    #[test]
    fn std_methods_stay_unambiguous() {
        let mut m = medium();
        assert_eq!(m.seek(SeekFrom::Start(60)).unwrap(), 60);
        let mut buf = [0u8; 8];
        assert_eq!(m.read(&mut buf).unwrap(), 4);

        let dyn_medium: &mut dyn Medium = &mut m;
        assert_eq!(dyn_medium.seek_to(SeekFrom::Start(2)).unwrap(), 2);
        assert_eq!(dyn_medium.read_into(&mut buf[..1]).unwrap(), 1);
        assert_eq!(buf[0], 2);
    }

    #[test]
    fn rejects_negative_offset() {
        let mut m = medium();
        let mut buf = [0u8; 2];
        assert_eq!(read_exact_at(&mut m, -1, &mut buf).unwrap_err().kind(), ErrorKind::Argument);
    }
}
