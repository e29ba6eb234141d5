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

//! Version markers used to detect stale cache entries.

use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically assigned version marker.
///
/// Every element, vector, block and tree node receives a fresh timestamp
/// when it is created and whenever its range changes. Timestamps are unique
/// across the whole process, so structures may share one cache without
/// their identifiers colliding.
pub type Timestamp = u64;

static NEXT_TIMESTAMP: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next() -> Timestamp {
    NEXT_TIMESTAMP.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strictly_increasing() {
        let a = next();
        let b = next();
        let c = next();
        assert!(a < b && b < c);
    }
}
