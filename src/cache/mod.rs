//! LRU block cache over index nodes
//!
//! One cache instance is shared by every index of a database. Entries
//! are keyed by `(index id, node id)` and hold deserialized nodes, so a
//! hit skips both the file read and the unpack. Writes go through the
//! cache and always hit the file; the cache never holds dirty state
//! between calls.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use ahash::AHashMap;
use lru::LruCache;
use tracing::debug;

use crate::error::{GertrudeError, Result};
use crate::index::node::Node;
use crate::storage::packer;

/// `(index id, node id)`.
pub type CacheKey = (u64, u64);

/// Running cache counters, as returned by `Database::cache_stats`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub gets: u64,
    pub puts: u64,
    /// Blocks currently cached.
    pub blocks: usize,
    /// Indexes currently registered.
    pub indexes: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
pub struct BlockCache {
    cache: LruCache<CacheKey, Node>,
    paths: AHashMap<u64, PathBuf>,
    stats: CacheStats,
}

impl BlockCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            paths: AHashMap::new(),
            stats: CacheStats {
                capacity,
                ..CacheStats::default()
            },
        }
    }

    /// Make an index's node directory known to the cache. Required
    /// before any `get`/`put` for that id.
    pub fn register(&mut self, index_id: u64, path: PathBuf) {
        self.paths.insert(index_id, path);
    }

    /// Forget an index and drop every block cached for it.
    pub fn unregister(&mut self, index_id: u64) {
        self.paths.remove(&index_id);
        let dead: Vec<CacheKey> = self
            .cache
            .iter()
            .map(|(key, _)| *key)
            .filter(|(idx, _)| *idx == index_id)
            .collect();
        for key in dead {
            self.cache.pop(&key);
        }
    }

    /// Fetch a node, from memory on a hit or from its block file on a
    /// miss (inserting it, evicting the least-recently-used overflow).
    pub fn get(&mut self, index_id: u64, node_id: u64) -> Result<Node> {
        let path = self.block_path(index_id, node_id)?;
        self.stats.gets += 1;

        if let Some(node) = self.cache.get(&(index_id, node_id)) {
            self.stats.hits += 1;
            return Ok(node.clone());
        }

        self.stats.misses += 1;
        let data = std::fs::read(&path).map_err(|e| {
            GertrudeError::Corruption(format!("cannot read block {}: {}", path.display(), e))
        })?;
        let node = packer::unpack_node(&data)?;
        node.validate()?;

        self.insert(index_id, node_id, node.clone());
        Ok(node)
    }

    /// Write a node block through to disk. With `cache` the entry is
    /// inserted or refreshed; without it any cached copy is dropped.
    pub fn put(&mut self, index_id: u64, node_id: u64, node: Node, cache: bool) -> Result<()> {
        let path = self.block_path(index_id, node_id)?;
        self.stats.puts += 1;

        if cache {
            if self.cache.get(&(index_id, node_id)).is_some() {
                self.stats.hits += 1;
            }
            self.insert(index_id, node_id, node.clone());
        } else {
            self.cache.pop(&(index_id, node_id));
        }

        debug!(index_id, node_id, entries = node.len(), "write node block");
        std::fs::write(&path, packer::pack_node(&node))?;
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.blocks = self.cache.len();
        stats.indexes = self.paths.len();
        stats
    }

    fn insert(&mut self, index_id: u64, node_id: u64, node: Node) {
        let key = (index_id, node_id);
        if let Some((evicted, _)) = self.cache.push(key, node) {
            if evicted != key {
                self.stats.evictions += 1;
            }
        }
    }

    fn block_path(&self, index_id: u64, node_id: u64) -> Result<PathBuf> {
        let dir = self
            .paths
            .get(&index_id)
            .ok_or_else(|| GertrudeError::Cache(format!("index {} not registered", index_id)))?;
        Ok(dir.join(format!("{:03}", node_id)))
    }
}
