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

mod common;

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use lazy_index::{Block, Cache, CacheKind, CacheStore, Config, RangeFlags, ReadFlags};

use crate::common::{file_medium, init_logging};

/// A file whose byte `i` is `i % 251`, and a block over four scattered
/// segments of it, one of them sparse.
fn fixture() -> (std::fs::File, Block, Vec<u8>) {
    let data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
    let mut block = Block::new();
    let mut expected = Vec::new();
    for &(offset, size, flags) in &[
        (3000i64, 700u64, RangeFlags::empty()),
        (100, 1000, RangeFlags::empty()),
        (0, 64, RangeFlags::IS_SPARSE),
        (2048, 333, RangeFlags::empty()),
    ] {
        block.append_segment(offset, size, flags).expect("segment");
        if flags.contains(RangeFlags::IS_SPARSE) {
            expected.extend(std::iter::repeat(0).take(size as usize));
        } else {
            expected.extend_from_slice(&data[offset as usize..(offset as u64 + size) as usize]);
        }
    }
    (file_medium(&data), block, expected)
}

#[test]
fn read_buffer_matches_concatenation() {
    init_logging();
    let (mut medium, mut block, expected) = fixture();
    let mut cache = Cache::new(8).expect("cache");
    let mut out = Vec::new();
    let mut buf = [0u8; 97];
    loop {
        let n = block.read_buffer(&mut medium, &mut cache, &mut buf).expect("read");
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out.len() as u64, block.size());
    assert_eq!(out, expected);
}

#[test]
fn reader_streams_and_seeks() {
    let (mut medium, mut block, expected) = fixture();
    let mut cache = Cache::new(8).expect("cache");
    let mut reader = block.reader(&mut medium, &mut cache);

    let mut all = Vec::new();
    io::copy(&mut reader, &mut all).expect("copy");
    assert_eq!(all, expected);

    let position = Seek::seek(&mut reader, SeekFrom::Start(690)).expect("seek");
    assert_eq!(position, 690);
    let mut window = [0u8; 20];
    reader.read_exact(&mut window).expect("read across boundary");
    assert_eq!(&window[..], &expected[690..710]);

    Seek::seek(&mut reader, SeekFrom::End(-10)).expect("seek from end");
    let mut tail = Vec::new();
    reader.read_to_end(&mut tail).expect("read tail");
    assert_eq!(tail, &expected[expected.len() - 10..]);

    Seek::seek(&mut reader, SeekFrom::Current(100)).expect("seek past end");
    assert_eq!(reader.read(&mut window).expect("read past end"), 0);
}

#[test]
fn whole_buffer_serves_segments() {
    let (mut medium, mut block, expected) = fixture();
    let mut cache = Config::default().cache(CacheKind::Block).expect("cache");
    assert_eq!(cache.capacity(), 1);

    let data = block.get_data(&mut medium, &mut cache, ReadFlags::empty()).expect("data");
    assert_eq!(data.as_slice(), expected.as_slice());

    let segment = block.get_segment_data(&mut medium, &mut cache, 3, ReadFlags::empty()).expect("segment");
    assert!(Arc::ptr_eq(segment.buffer(), &data));
    assert_eq!(segment.window(), 1764..2097);
    assert_eq!(&*segment, &expected[1764..]);

    // Changing a segment makes the cached buffer stale.
    block.set_segment_by_index(2, 0, 64, RangeFlags::empty()).expect("set segment");
    let fresh = block.get_data(&mut medium, &mut cache, ReadFlags::empty()).expect("fresh data");
    assert!(!Arc::ptr_eq(&fresh, &data));
    assert_eq!(&fresh[1700..1764], &(0..64u8).collect::<Vec<u8>>()[..]);
}

#[test]
fn negative_seek_is_rejected() {
    let (mut medium, mut block, _) = fixture();
    let mut cache = Cache::new(2).expect("cache");
    let mut reader = block.reader(&mut medium, &mut cache);
    let err = Seek::seek(&mut reader, SeekFrom::Current(-1)).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
}
