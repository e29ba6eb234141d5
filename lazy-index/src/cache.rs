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

//! Slot-addressed value caches.
//!
//! The structures in this crate never own their materialized values. They
//! compute a slot, ask a [`CacheStore`] for whatever is there, and accept it
//! only when its [`CacheIdentifier`] matches the `(offset, timestamp)` pair
//! of the range it was read from. A stale or foreign entry is simply
//! overwritten on the next read.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use log::trace;

use crate::error::{Error, Result};
use crate::timestamp::Timestamp;

bitflags! {
    /// Flags controlling how a value is fetched.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ReadFlags: u8 {
        /// Always call the read callback, even when the cache holds a
        /// matching value. The fresh value still replaces the cached one.
        const IGNORE_CACHE = 0x01;
    }
}

/// The identity a cached value was stored under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheIdentifier {
    pub offset: i64,
    pub timestamp: Timestamp,
}

impl CacheIdentifier {
    pub fn new(offset: i64, timestamp: Timestamp) -> CacheIdentifier {
        CacheIdentifier { offset, timestamp }
    }
}

impl fmt::Display for CacheIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.offset, self.timestamp)
    }
}

#[derive(Debug)]
pub struct CacheEntry<V> {
    identifier: CacheIdentifier,
    value: Arc<V>,
}

impl<V> CacheEntry<V> {
    pub fn new(identifier: CacheIdentifier, value: Arc<V>) -> CacheEntry<V> {
        CacheEntry { identifier, value }
    }

    pub fn identifier(&self) -> CacheIdentifier {
        self.identifier
    }

    pub fn value(&self) -> &Arc<V> {
        &self.value
    }
}

impl<V> Clone for CacheEntry<V> {
    fn clone(&self) -> Self {
        CacheEntry { identifier: self.identifier, value: Arc::clone(&self.value) }
    }
}

/// A fixed number of value slots.
///
/// Implementations decide what happens to a displaced entry. The structures
/// only rely on a stored entry being readable back from the same slot until
/// something else is stored there.
pub trait CacheStore<V> {
    fn capacity(&self) -> usize;

    /// The number of occupied slots.
    fn number_of_values(&self) -> usize;

    fn get_entry(&self, slot: usize) -> Result<Option<&CacheEntry<V>>>;

    fn set_entry(&mut self, slot: usize, identifier: CacheIdentifier, value: Arc<V>) -> Result<()>;

    fn clear(&mut self);

    fn get_identifier(&self, slot: usize) -> Result<Option<CacheIdentifier>> {
        Ok(self.get_entry(slot)?.map(CacheEntry::identifier))
    }

    /// Returns the value in `slot` if it was stored under `identifier`.
    fn lookup(&self, slot: usize, identifier: CacheIdentifier) -> Result<Option<Arc<V>>> {
        Ok(self
            .get_entry(slot)?
            .filter(|entry| entry.identifier == identifier)
            .map(|entry| Arc::clone(&entry.value)))
    }
}

/// The bundled [`CacheStore`]: one entry per slot, newest entry wins.
#[derive(Debug)]
pub struct Cache<V> {
    entries: Vec<Option<CacheEntry<V>>>,
    number_of_values: usize,
}

impl<V> Cache<V> {
    pub fn new(capacity: usize) -> Result<Cache<V>> {
        if capacity == 0 {
            return Err(Error::invalid("cache capacity of zero"));
        }
        let mut entries = Vec::with_capacity(capacity);
        entries.resize_with(capacity, || None);
        Ok(Cache { entries, number_of_values: 0 })
    }

    /// Iterates over the occupied slots.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &CacheEntry<V>)> {
        self.entries.iter().enumerate().filter_map(|(slot, e)| e.as_ref().map(|e| (slot, e)))
    }

    fn check_slot(&self, slot: usize) -> Result<()> {
        if slot >= self.entries.len() {
            return Err(Error::out_of_bounds(format!("cache slot {}", slot)));
        }
        Ok(())
    }
}

impl<V> Clone for Cache<V> {
    fn clone(&self) -> Self {
        Cache { entries: self.entries.clone(), number_of_values: self.number_of_values }
    }
}

impl<V> CacheStore<V> for Cache<V> {
    fn capacity(&self) -> usize {
        self.entries.len()
    }

    fn number_of_values(&self) -> usize {
        self.number_of_values
    }

    fn get_entry(&self, slot: usize) -> Result<Option<&CacheEntry<V>>> {
        self.check_slot(slot)?;
        Ok(self.entries[slot].as_ref())
    }

    fn set_entry(&mut self, slot: usize, identifier: CacheIdentifier, value: Arc<V>) -> Result<()> {
        self.check_slot(slot)?;
        if self.entries[slot].is_none() {
            self.number_of_values += 1;
        }
        self.entries[slot] = Some(CacheEntry::new(identifier, value));
        Ok(())
    }

    fn clear(&mut self) {
        for entry in self.entries.iter_mut() {
            *entry = None;
        }
        self.number_of_values = 0;
    }
}

/// Direct-mapped addressing: `key mod capacity`.
pub(crate) fn direct_slot(key: u64, capacity: usize) -> Result<usize> {
    if capacity == 0 {
        return Err(Error::invalid("cache capacity of zero"));
    }
    Ok((key % capacity as u64) as usize)
}

/// Serves `identifier` from `slot`, or reads, stores and re-fetches it.
///
/// The re-fetch catches a store that did not keep what it was given.
pub(crate) fn fetch_or_read<V>(
    cache: &mut dyn CacheStore<V>,
    slot: usize,
    identifier: CacheIdentifier,
    read_flags: ReadFlags,
    read: impl FnOnce() -> Result<V>,
) -> Result<Arc<V>> {
    if !read_flags.contains(ReadFlags::IGNORE_CACHE) {
        if let Some(value) = cache.lookup(slot, identifier)? {
            trace!("cache hit {} in slot {}", identifier, slot);
            return Ok(value);
        }
    }
    trace!("cache miss {} in slot {}", identifier, slot);
    let value = read()?;
    cache.set_entry(slot, identifier, Arc::new(value))?;
    cache.lookup(slot, identifier)?.ok_or(Error::CacheMiss { slot })
}
