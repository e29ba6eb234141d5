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

use std::sync::Arc;

use lazy_index::{
    read_range, Cache, CacheKind, CacheStore, Config, Error, ErrorKind, List, Medium, Range,
    RangeFlags, ReadFlags, Result, Vector,
};

use crate::common::{file_medium, init_logging};

/// Reads a range as UTF-8 text.
fn text(medium: &mut dyn Medium, _: usize, range: &Range, _: ReadFlags) -> Result<String> {
    let bytes = read_range(medium, range)?;
    String::from_utf8(bytes).map_err(|e| Error::InvalidArgument(e.to_string()))
}

#[test]
fn list_over_file() {
    init_logging();
    let mut medium = file_medium(b"alphabravocharliedeltaecho");
    let mut list: List<String, _> = List::new(text);
    for &(offset, size) in &[(0, 5), (5, 5), (10, 7), (17, 5), (22, 4)] {
        list.append_element(offset, size, RangeFlags::empty()).expect("append");
    }
    assert_eq!(list.value_size(), 26);

    let mut cache = Config::default().cache(CacheKind::List).expect("cache");
    let (index, offset, value) = list
        .get_element_value_at_offset(&mut medium, &mut cache, 12, ReadFlags::empty())
        .expect("value at offset");
    assert_eq!((index, offset), (2, 2));
    assert_eq!(value.as_str(), "charlie");

    let again = list.get_element_value(&mut medium, &mut cache, 2, ReadFlags::empty()).expect("cached");
    assert!(Arc::ptr_eq(&value, &again));
}

#[test]
fn short_file_is_an_io_error() {
    let mut medium = file_medium(b"tiny");
    let mut list: List<String, _> = List::new(text);
    list.append_element(2, 10, RangeFlags::empty()).expect("append");
    let mut cache = Cache::new(4).expect("cache");
    let err = list.get_element_value(&mut medium, &mut cache, 0, ReadFlags::empty()).unwrap_err();
    assert!(matches!(err, Error::ShortRead { expected: 10, actual: 2 }));
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(cache.number_of_values(), 0);
}

#[test]
fn list_and_vector_share_a_cache() {
    let data: Vec<u8> = (0u8..=255).collect();
    let mut medium = file_medium(&data);
    let mut cache = Cache::new(4).expect("cache");

    let mut list = List::new(|m: &mut dyn Medium, _: usize, r: &Range, _: ReadFlags| -> Result<Vec<u8>> {
        read_range(m, r)
    });
    list.append_element(16, 4, RangeFlags::empty()).expect("append");

    let mut vector = Vector::new(
        4,
        |m: &mut dyn Medium, _: usize, offset: i64, size: u64, flags: RangeFlags, _: ReadFlags| -> Result<Vec<u8>> {
            read_range(m, &Range::new(offset, size, flags)?)
        },
    )
    .expect("vector");
    vector.append_segment(16, 16, RangeFlags::empty()).expect("segment");

    // Both map to slot 0 and the same offset, but never share a timestamp.
    let a = list.get_element_value(&mut medium, &mut cache, 0, ReadFlags::empty()).expect("list value");
    let b = vector
        .get_element_value_by_index(&mut medium, &mut cache, 0, ReadFlags::empty())
        .expect("vector value");
    assert_eq!(a, b);
    assert!(!Arc::ptr_eq(&a, &b));
    let c = list.get_element_value(&mut medium, &mut cache, 0, ReadFlags::empty()).expect("list value");
    assert!(!Arc::ptr_eq(&a, &c));
}

#[test]
fn vector_records_over_file() {
    // Twelve 8-byte records split over two extents, the second stored first.
    let mut data = vec![0u8; 96];
    for record in 0..12u64 {
        let physical = if record < 8 { 32 + record * 8 } else { (record - 8) * 8 };
        data[physical as usize..physical as usize + 8].copy_from_slice(&record.to_le_bytes());
    }
    let mut medium = file_medium(&data);
    let mut vector = Vector::new(
        8,
        |m: &mut dyn Medium, _: usize, offset: i64, size: u64, flags: RangeFlags, _: ReadFlags| -> Result<u64> {
            let bytes = read_range(m, &Range::new(offset, size, flags)?)?;
            let mut le = [0u8; 8];
            le.copy_from_slice(&bytes);
            Ok(u64::from_le_bytes(le))
        },
    )
    .expect("vector");
    vector.append_segment(32, 64, RangeFlags::empty()).expect("segment");
    vector.append_segment(0, 32, RangeFlags::empty()).expect("segment");
    assert_eq!(vector.number_of_elements(), 12);

    let mut cache = Config::default().cache(CacheKind::Vector).expect("cache");
    for record in 0..12 {
        let value = vector
            .get_element_value_by_index(&mut medium, &mut cache, record, ReadFlags::empty())
            .expect("record");
        assert_eq!(*value, record as u64);
    }
    let (within, value) = vector
        .get_element_value_at_offset(&mut medium, &mut cache, 69, ReadFlags::empty())
        .expect("record at offset");
    assert_eq!((within, *value), (5, 8));
}

#[test]
fn config_from_toml() {
    let config = Config::from_toml_str("list_cache_capacity = 2\nblock_cache_capacity = 1\n").expect("config");
    let cache: Cache<String> = config.cache(CacheKind::List).expect("cache");
    assert_eq!(cache.capacity(), 2);
    assert_eq!(config.tree_cache_capacity, 1024);

    let err = Config::from_toml_str("vector_cache_capacity = 0").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);
}
