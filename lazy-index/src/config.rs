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

//! Cache sizing configuration.

use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use crate::error::{Error, Result};

/// Which structure a cache is being built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheKind {
    List,
    Vector,
    Tree,
    Block,
}

/// Cache capacities per structure kind.
///
/// Every field is optional in the serialized form:
///
/// ```
/// use lazy_index::Config;
///
/// let config = Config::from_toml_str("tree_cache_capacity = 64").unwrap();
/// assert_eq!(config.tree_cache_capacity, 64);
/// assert_eq!(config.block_cache_capacity, 1);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub list_cache_capacity: usize,
    pub vector_cache_capacity: usize,
    /// Split a quarter branch, three quarters leaf once above four slots.
    pub tree_cache_capacity: usize,
    /// Whole-buffer reads assume a single slot.
    pub block_cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            list_cache_capacity: 256,
            vector_cache_capacity: 256,
            tree_cache_capacity: 1024,
            block_cache_capacity: 1,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Config> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        for (kind, capacity) in [
            (CacheKind::List, self.list_cache_capacity),
            (CacheKind::Vector, self.vector_cache_capacity),
            (CacheKind::Tree, self.tree_cache_capacity),
            (CacheKind::Block, self.block_cache_capacity),
        ] {
            if capacity == 0 {
                return Err(Error::invalid(format!("{:?} cache capacity of zero", kind)));
            }
        }
        Ok(())
    }

    pub fn capacity(&self, kind: CacheKind) -> usize {
        match kind {
            CacheKind::List => self.list_cache_capacity,
            CacheKind::Vector => self.vector_cache_capacity,
            CacheKind::Tree => self.tree_cache_capacity,
            CacheKind::Block => self.block_cache_capacity,
        }
    }

    pub fn cache<V>(&self, kind: CacheKind) -> Result<Cache<V>> {
        Cache::new(self.capacity(kind))
    }
}
