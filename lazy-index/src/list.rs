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

//! Ordered lists of ranges whose values are read on demand.

use std::cmp::min;
use std::marker::PhantomData;
use std::sync::Arc;

use log::trace;

use crate::cache::{direct_slot, fetch_or_read, CacheStore, ReadFlags};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::medium::Medium;
use crate::range::{Range, RangeFlags};

/// Produces the value of a list element from the medium.
///
/// Closures with the same signature as `read_element_data` implement this
/// trait, which is convenient for small lists and tests.
pub trait ElementSource<V> {
    fn read_element_data(
        &self,
        medium: &mut dyn Medium,
        element_index: usize,
        range: &Range,
        read_flags: ReadFlags,
    ) -> Result<V>;
}

impl<V, F> ElementSource<V> for F
where
    F: Fn(&mut dyn Medium, usize, &Range, ReadFlags) -> Result<V>,
{
    fn read_element_data(
        &self,
        medium: &mut dyn Medium,
        element_index: usize,
        range: &Range,
        read_flags: ReadFlags,
    ) -> Result<V> {
        self(medium, element_index, range, read_flags)
    }
}

/// An ordered sequence of [`Element`]s.
///
/// Slots may be unset, which models holes: a hole contributes nothing to
/// the value space and has no value. The total value size is maintained on
/// every change, while per-element value offsets are recomputed lazily in a
/// single pass the next time an offset lookup needs them.
#[derive(Debug)]
pub struct List<V, S> {
    elements: Vec<Option<Element>>,
    value_size: u64,
    calculate_value_offsets: bool,
    source: S,
    _value: PhantomData<fn() -> V>,
}

impl<V, S: Clone> Clone for List<V, S> {
    fn clone(&self) -> Self {
        List {
            elements: self.elements.clone(),
            value_size: self.value_size,
            calculate_value_offsets: self.calculate_value_offsets,
            source: self.source.clone(),
            _value: PhantomData,
        }
    }
}

impl<V, S> List<V, S> {
    pub fn new(source: S) -> List<V, S> {
        List {
            elements: Vec::new(),
            value_size: 0,
            calculate_value_offsets: false,
            source,
            _value: PhantomData,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Removes every element.
    pub fn empty(&mut self) {
        self.elements.clear();
        self.value_size = 0;
        self.calculate_value_offsets = false;
    }

    /// Grows the list with holes, or drops trailing elements.
    pub fn resize(&mut self, number_of_elements: usize) {
        if number_of_elements < self.elements.len() {
            let removed: u64 =
                self.elements[number_of_elements..].iter().flatten().map(Element::value_size).sum();
            self.value_size -= removed;
        }
        self.elements.resize_with(number_of_elements, || None);
    }

    pub fn number_of_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The sum of the value sizes of all elements.
    pub fn value_size(&self) -> u64 {
        self.value_size
    }

    /// Appends an element and returns its index.
    ///
    /// The value offset of an appended element is known immediately: it is
    /// the value size before the append.
    pub fn append_element(&mut self, offset: i64, size: u64, flags: RangeFlags) -> Result<usize> {
        self.append_range(Range::new(offset, size, flags)?)
    }

    pub fn append_range(&mut self, range: Range) -> Result<usize> {
        let value_size = self.grown_value_size(0, range.size())?;
        let index = self.elements.len();
        let mut element = Element::new(index, range);
        element.set_value_offset(self.value_size);
        self.elements.push(Some(element));
        self.value_size = value_size;
        Ok(index)
    }

    /// Replaces, or fills in, the element at `element_index`.
    ///
    /// Every later value offset may shift, so offsets are marked for
    /// recalculation.
    pub fn set_element_by_index(
        &mut self,
        element_index: usize,
        offset: i64,
        size: u64,
        flags: RangeFlags,
    ) -> Result<()> {
        self.set_range_by_index(element_index, Range::new(offset, size, flags)?)
    }

    pub fn set_range_by_index(&mut self, element_index: usize, range: Range) -> Result<()> {
        let slot = self
            .elements
            .get(element_index)
            .ok_or_else(|| Error::out_of_bounds(format!("element index {}", element_index)))?;
        let old_size = slot.as_ref().map_or(0, Element::value_size);
        let value_size = self.grown_value_size(old_size, range.size())?;

        match &mut self.elements[element_index] {
            Some(element) => element.set_range(range),
            slot @ None => *slot = Some(Element::new(element_index, range)),
        }
        self.value_size = value_size;
        self.calculate_value_offsets = true;
        Ok(())
    }

    /// Overrides how much of the value space an element occupies.
    ///
    /// Used when the materialized value differs in size from the range it
    /// is read from, for example a compressed range. `None` reverts to the
    /// range size.
    pub fn set_element_mapped_size(
        &mut self,
        element_index: usize,
        mapped_size: Option<u64>,
    ) -> Result<()> {
        let old_size = self.get_element(element_index)?.value_size();
        let new_size = match mapped_size {
            Some(size) => size,
            None => self.get_element(element_index)?.range().size(),
        };
        let value_size = self.grown_value_size(old_size, new_size)?;
        if let Some(element) = self.elements[element_index].as_mut() {
            element.set_mapped_size(mapped_size);
        }
        self.value_size = value_size;
        self.calculate_value_offsets = true;
        Ok(())
    }

    /// Returns the element at `element_index`, if the slot is set.
    pub fn element(&self, element_index: usize) -> Option<&Element> {
        self.elements.get(element_index).and_then(Option::as_ref)
    }

    /// Like [`element`](#method.element), but an unset slot or an index past
    /// the end is an error.
    pub fn get_element(&self, element_index: usize) -> Result<&Element> {
        match self.elements.get(element_index) {
            None => Err(Error::out_of_bounds(format!("element index {}", element_index))),
            Some(None) => Err(Error::missing(format!("element {}", element_index))),
            Some(Some(element)) => Ok(element),
        }
    }

    pub fn get_element_by_index(&self, element_index: usize) -> Result<Range> {
        Ok(*self.get_element(element_index)?.range())
    }

    pub fn is_element_set(&self, element_index: usize) -> Result<bool> {
        self.elements
            .get(element_index)
            .map(Option::is_some)
            .ok_or_else(|| Error::out_of_bounds(format!("element index {}", element_index)))
    }

    /// Iterates over all slots, including holes.
    pub fn elements(&self) -> impl Iterator<Item = Option<&Element>> {
        self.elements.iter().map(Option::as_ref)
    }

    pub fn value_offsets_stale(&self) -> bool {
        self.calculate_value_offsets
    }

    /// Recomputes every value offset as a prefix sum of value sizes.
    pub fn calculate_value_offsets(&mut self) {
        let mut value_offset = 0;
        for element in self.elements.iter_mut().flatten() {
            element.set_value_offset(value_offset);
            value_offset += element.value_size();
        }
        debug_assert_eq!(value_offset, self.value_size);
        self.calculate_value_offsets = false;
    }

    /// Finds the element containing `value_offset`, and the offset within it.
    ///
    /// The search starts from a guess that assumes roughly uniform element
    /// sizes, then scans linearly up or down from there.
    pub fn get_element_index_at_value_offset(&mut self, value_offset: u64) -> Result<(usize, u64)> {
        if value_offset >= self.value_size {
            return Err(Error::out_of_bounds(format!("value offset {}", value_offset)));
        }
        if self.calculate_value_offsets {
            self.calculate_value_offsets();
        }
        let number_of_elements = self.elements.len();
        let guess = (number_of_elements as u128 * value_offset as u128 / self.value_size as u128)
            as usize;
        let guess = min(guess, number_of_elements - 1);

        let ascending = self.elements[guess..]
            .iter()
            .flatten()
            .next()
            .map_or(false, |element| element.value_offset() <= value_offset);
        trace!(
            "value offset {} guessed element {} of {}, scanning {}",
            value_offset,
            guess,
            number_of_elements,
            if ascending { "up" } else { "down" }
        );
        let found = if ascending {
            self.elements[guess..].iter().flatten().find(|e| e.contains_value_offset(value_offset))
        } else {
            self.elements[..guess]
                .iter()
                .rev()
                .flatten()
                .find(|e| e.contains_value_offset(value_offset))
        };
        found
            .map(|element| (element.index(), value_offset - element.value_offset()))
            .ok_or_else(|| Error::out_of_bounds(format!("value offset {}", value_offset)))
    }

    /// Finds the element holding the `value_index`th fixed-size value.
    ///
    /// Each element holds `element_value_size / value_size` whole values.
    /// Returns the element index and the byte offset of the value within
    /// the element.
    pub fn get_element_index_at_value_index(
        &self,
        value_index: u64,
        value_size: u64,
    ) -> Result<(usize, u64)> {
        if value_size == 0 {
            return Err(Error::invalid("value size of zero"));
        }
        let mut remaining = value_index;
        for element in self.elements.iter().flatten() {
            let number_of_values = element.value_size() / value_size;
            if remaining < number_of_values {
                return Ok((element.index(), remaining * value_size));
            }
            remaining -= number_of_values;
        }
        Err(Error::out_of_bounds(format!("value index {}", value_index)))
    }

    fn grown_value_size(&self, removed: u64, added: u64) -> Result<u64> {
        (self.value_size - removed)
            .checked_add(added)
            .filter(|&size| size <= i64::MAX as u64)
            .ok_or_else(|| Error::out_of_bounds("list value size"))
    }
}

impl<V, S: ElementSource<V>> List<V, S> {
    /// Returns the value of an element, reading it only on a cache miss.
    ///
    /// The value lives in slot `element_index mod capacity` and is valid
    /// only while it carries the element's `(range offset, timestamp)`.
    pub fn get_element_value(
        &self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        element_index: usize,
        read_flags: ReadFlags,
    ) -> Result<Arc<V>> {
        let element = self.get_element(element_index)?;
        let slot = direct_slot(element_index as u64, cache.capacity())?;
        fetch_or_read(cache, slot, element.cache_identifier(), read_flags, || {
            self.source.read_element_data(medium, element_index, element.range(), read_flags)
        })
    }

    /// Returns the element index, the offset within the element, and the
    /// element's value, for the element containing `value_offset`.
    pub fn get_element_value_at_offset(
        &mut self,
        medium: &mut dyn Medium,
        cache: &mut dyn CacheStore<V>,
        value_offset: u64,
        read_flags: ReadFlags,
    ) -> Result<(usize, u64, Arc<V>)> {
        let (element_index, element_offset) = self.get_element_index_at_value_offset(value_offset)?;
        let value = self.get_element_value(medium, cache, element_index, read_flags)?;
        Ok((element_index, element_offset, value))
    }

    /// Stores a value for an element, as if it had been read.
    pub fn set_element_value(
        &self,
        cache: &mut dyn CacheStore<V>,
        element_index: usize,
        value: impl Into<Arc<V>>,
    ) -> Result<()> {
        let element = self.get_element(element_index)?;
        let slot = direct_slot(element_index as u64, cache.capacity())?;
        cache.set_entry(slot, element.cache_identifier(), value.into())
    }
}
