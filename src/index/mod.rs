//! Persistent B+Tree secondary index
//!
//! Every node lives in its own block file named by its zero-padded id,
//! read and written through the shared database block cache. Node 0 is
//! always the root and always internal; its first entry carries the
//! null sentinel so the entry list covers the whole key space. Splits
//! keep runs of equal keys in one sibling, deletes remove leaf entries
//! without rebalancing, and trees are allowed to grow right-heavy.

pub mod node;
pub mod scan;

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config;
use crate::database::DbContext;
use crate::error::{GertrudeError, Result};
use crate::types::{HeapId, Value, ValueType};

use node::{InternalItem, LeafItem, Node, NodeData, TreePath, ROOT_NODE_ID};
use scan::{IndexScan, ScanOp};

const CONFIG_FILE: &str = "config";

/// Options for a new index.
#[derive(Debug, Clone, Copy)]
pub struct IndexOptions {
    pub unique: bool,
    pub nullable: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            unique: false,
            nullable: true,
        }
    }
}

impl IndexOptions {
    pub fn unique() -> Self {
        Self {
            unique: true,
            ..Self::default()
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Per-index configuration, persisted as JSON next to the node blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub name: String,
    pub column: String,
    pub coltype: ValueType,
    pub id: u64,
    pub unique: bool,
    pub nullable: bool,
    pub fanout: usize,
}

#[derive(Debug)]
pub struct Index {
    config: IndexConfig,
    path: PathBuf,
    ctx: Arc<DbContext>,
    open: bool,
}

impl Index {
    /// Create an index directory and bulk-load it from existing rows.
    ///
    /// Entries are validated against the unique/nullable options and
    /// sorted; leaves are packed at three quarters of the fanout so the
    /// first inserts land without splitting. The index directory is
    /// removed again if the build fails.
    pub fn create(
        name: &str,
        path: PathBuf,
        column: &str,
        coltype: ValueType,
        options: IndexOptions,
        ctx: Arc<DbContext>,
        entries: Vec<(Value, HeapId)>,
    ) -> Result<Self> {
        config::check_name(name)?;
        if path.exists() {
            return Err(GertrudeError::IndexExists(name.to_string()));
        }
        fs::create_dir_all(&path)?;

        let config = IndexConfig {
            name: name.to_string(),
            column: column.to_string(),
            coltype,
            id: ctx.generate_id()?,
            unique: options.unique,
            nullable: options.nullable,
            // a split needs at least one entry on each side
            fanout: ctx.options().index_fanout.max(2),
        };
        fs::write(path.join(CONFIG_FILE), serde_json::to_string(&config)?)?;
        ctx.cache().register(config.id, path.clone());

        let index = Self {
            config,
            path: path.clone(),
            ctx,
            open: true,
        };
        if let Err(e) = index.build(entries) {
            index.ctx.cache().unregister(index.config.id);
            let _ = fs::remove_dir_all(&path);
            return Err(e);
        }
        Ok(index)
    }

    /// Load an existing index directory, registering its node files
    /// with the block cache.
    pub fn load(path: PathBuf, ctx: Arc<DbContext>) -> Result<Self> {
        let config: IndexConfig =
            serde_json::from_str(&fs::read_to_string(path.join(CONFIG_FILE))?)?;
        ctx.cache().register(config.id, path.clone());
        Ok(Self {
            config,
            path,
            ctx,
            open: true,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn column(&self) -> &str {
        &self.config.column
    }

    pub fn coltype(&self) -> ValueType {
        self.config.coltype
    }

    pub fn id(&self) -> u64 {
        self.config.id
    }

    pub fn unique(&self) -> bool {
        self.config.unique
    }

    pub fn nullable(&self) -> bool {
        self.config.nullable
    }

    pub fn fanout(&self) -> usize {
        self.config.fanout
    }

    /// Invalidate cached blocks and mark the index unusable. Called
    /// before the directory is dropped or the table closes.
    pub fn close(&mut self) {
        if self.open {
            self.ctx.cache().unregister(self.config.id);
            self.open = false;
        }
    }

    /// Remove the index from disk (close first, then delete the tree).
    pub fn drop_files(&mut self) -> Result<()> {
        self.close();
        fs::remove_dir_all(&self.path)?;
        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(GertrudeError::Closed(format!("index {}", self.config.name)))
        }
    }

    fn null_sentinel(&self) -> Value {
        Value::null(self.config.coltype)
    }

    fn node(&self, node_id: u64) -> Result<Node> {
        self.ctx.cache().get(self.config.id, node_id)
    }

    fn put_node(&self, node: Node) -> Result<()> {
        self.ctx.cache().put(self.config.id, node.node_id, node, true)
    }

    // ----------------------------------------------------------------
    // Bulk load
    // ----------------------------------------------------------------

    fn build(&self, mut entries: Vec<(Value, HeapId)>) -> Result<()> {
        if !self.config.nullable && entries.iter().any(|(key, _)| key.is_null()) {
            return Err(GertrudeError::NullViolation(format!(
                "column {} has null values, index {} is not nullable",
                self.config.column, self.config.name
            )));
        }

        entries.sort_by(|(a, _), (b, _)| a.raw().cmp(b.raw()));

        if self.config.unique {
            for pair in entries.windows(2) {
                if pair[0].0.raw() == pair[1].0.raw() {
                    return Err(GertrudeError::UniqueViolation(format!(
                        "duplicate key {} in unique index {}",
                        pair[0].0, self.config.name
                    )));
                }
            }
        }

        let per_leaf = ((self.config.fanout * 3) / 4).max(1);
        let mut root_items = Vec::new();

        if entries.is_empty() {
            let leaf_id = self.ctx.generate_id()?;
            self.put_node(Node::leaf(leaf_id, Vec::new()))?;
            root_items.push(InternalItem {
                key: self.null_sentinel(),
                node_id: leaf_id,
            });
        } else {
            for chunk in entries.chunks(per_leaf) {
                let leaf_id = self.ctx.generate_id()?;
                root_items.push(InternalItem {
                    key: chunk[0].0.clone(),
                    node_id: leaf_id,
                });
                let items = chunk
                    .iter()
                    .map(|(key, heap_id)| LeafItem {
                        key: key.clone(),
                        heap_id: *heap_id,
                    })
                    .collect();
                self.put_node(Node::leaf(leaf_id, items))?;
            }
            root_items[0].key = self.null_sentinel();
        }

        debug!(
            index = %self.config.name,
            leaves = root_items.len(),
            "bulk build complete"
        );
        self.put_node(Node::internal(ROOT_NODE_ID, root_items))
    }

    // ----------------------------------------------------------------
    // Search
    // ----------------------------------------------------------------

    /// Root-to-leaf trace for a key. With `lower_bound` the leaf cursor
    /// lands on the first duplicate of the key, otherwise just past the
    /// last one; internal levels record the descended child.
    pub fn find_path(&self, key: &Value, lower_bound: bool) -> Result<TreePath> {
        self.check_open()?;
        let mut path = TreePath::new();
        let mut node = self.node(ROOT_NODE_ID)?;
        loop {
            let child = match &node.data {
                NodeData::Internal(items) => {
                    if items.is_empty() {
                        return Err(GertrudeError::Corruption(format!(
                            "internal node {} is empty",
                            node.node_id
                        )));
                    }
                    let idx = Self::descend_index(&node, key, lower_bound);
                    path.push((node.node_id, idx));
                    items[idx].node_id
                }
                NodeData::Leaf(_) => {
                    let idx = node.bisect(key, 0, lower_bound);
                    path.push((node.node_id, idx));
                    return Ok(path);
                }
            };
            node = self.node(child)?;
        }
    }

    // Entry 0 is the sentinel, so the bisect starts at 1 and the result
    // is pulled back onto the interval that owns the key.
    fn descend_index(node: &Node, key: &Value, lower_bound: bool) -> usize {
        let mut idx = node.bisect(key, 1, lower_bound);
        if idx == 1 {
            if node.len() == 1 || key.raw() < node.key_at(1).raw() {
                idx = 0;
            }
        } else if idx == node.len() || node.key_at(idx).raw() != key.raw() {
            idx -= 1;
        }
        idx
    }

    /// Whether any entry carries this key.
    pub fn contains(&self, key: &Value) -> Result<bool> {
        let path = self.find_path(key, true)?;
        let (leaf_id, idx) = *path.last().ok_or_else(|| {
            GertrudeError::Corruption(format!("empty search path in index {}", self.config.name))
        })?;
        let leaf = self.node(leaf_id)?;
        let items = leaf.as_leaf()?;
        Ok(idx < items.len() && items[idx].key.raw() == key.raw())
    }

    /// Pre-insert constraint check; fails fast without touching state.
    pub fn test_for_insert(&self, key: &Value) -> Result<()> {
        self.check_open()?;
        if key.is_null() && !self.config.nullable {
            return Err(GertrudeError::NullViolation(format!(
                "index {} on column {} does not allow null",
                self.config.name, self.config.column
            )));
        }
        if self.config.unique && self.contains(key)? {
            return Err(GertrudeError::UniqueViolation(format!(
                "duplicate key {} in unique index {}",
                key, self.config.name
            )));
        }
        Ok(())
    }

    // ----------------------------------------------------------------
    // Mutation
    // ----------------------------------------------------------------

    /// Insert one entry, splitting up the path as nodes overflow.
    pub fn insert(&self, key: Value, heap_id: HeapId) -> Result<()> {
        let path = self.find_path(&key, false)?;
        let (leaf_id, idx) = *path.last().ok_or_else(|| {
            GertrudeError::Corruption(format!("empty search path in index {}", self.config.name))
        })?;

        let mut leaf = self.node(leaf_id)?;
        leaf.as_leaf_mut()?.insert(idx, LeafItem { key, heap_id });

        if leaf.len() >= self.config.fanout {
            self.split_and_propagate(leaf, &path)
        } else {
            self.put_node(leaf)
        }
    }

    /// Split an over-full node and push boundary keys upward, splitting
    /// ancestors in turn. The root is rewritten in place when reached.
    fn split_and_propagate(&self, first: Node, path: &TreePath) -> Result<()> {
        let mut node = first;
        let mut level = path.len() - 1;

        loop {
            if node.node_id == ROOT_NODE_ID {
                return self.split_root(node);
            }

            let split_at = node.split_point();
            debug!(
                index = %self.config.name,
                node_id = node.node_id,
                split_at,
                entries = node.len(),
                "split node"
            );

            let right_id = self.ctx.generate_id()?;
            let (boundary, right) = match &mut node.data {
                NodeData::Leaf(items) => {
                    let right_items = items.split_off(split_at);
                    (right_items[0].key.clone(), Node::leaf(right_id, right_items))
                }
                NodeData::Internal(items) => {
                    let mut right_items = items.split_off(split_at);
                    let boundary = right_items[0].key.clone();
                    right_items[0].key = self.null_sentinel();
                    (boundary, Node::internal(right_id, right_items))
                }
            };
            self.put_node(node)?;
            self.put_node(right)?;

            level = level.checked_sub(1).ok_or_else(|| {
                GertrudeError::Corruption(format!(
                    "split path exhausted below the root in index {}",
                    self.config.name
                ))
            })?;
            let (parent_id, parent_idx) = path[level];
            let mut parent = self.node(parent_id)?;
            parent.as_internal_mut()?.insert(
                parent_idx + 1,
                InternalItem {
                    key: boundary,
                    node_id: right_id,
                },
            );

            if parent.len() >= self.config.fanout {
                node = parent;
            } else {
                return self.put_node(parent);
            }
        }
    }

    // The root keeps id 0: its halves move into two fresh internal
    // nodes and id 0 is rewritten to point at them, both halves' first
    // keys becoming the sentinel.
    fn split_root(&self, mut root: Node) -> Result<()> {
        let split_at = root.split_point();
        let items = root.as_internal_mut()?;

        let mut right_items = items.split_off(split_at);
        let mut left_items = std::mem::take(items);
        let boundary = right_items[0].key.clone();
        left_items[0].key = self.null_sentinel();
        right_items[0].key = self.null_sentinel();

        let left_id = self.ctx.generate_id()?;
        let right_id = self.ctx.generate_id()?;
        debug!(index = %self.config.name, left_id, right_id, "split root");

        self.put_node(Node::internal(left_id, left_items))?;
        self.put_node(Node::internal(right_id, right_items))?;
        self.put_node(Node::internal(
            ROOT_NODE_ID,
            vec![
                InternalItem {
                    key: self.null_sentinel(),
                    node_id: left_id,
                },
                InternalItem {
                    key: boundary,
                    node_id: right_id,
                },
            ],
        ))
    }

    /// Remove the leaf entry matching key and heap id. Returns whether
    /// anything was removed; the tree is never rebalanced.
    pub fn delete(&self, key: &Value, heap_id: HeapId) -> Result<bool> {
        let path = self.find_path(key, true)?;
        let (leaf_id, start) = *path.last().ok_or_else(|| {
            GertrudeError::Corruption(format!("empty search path in index {}", self.config.name))
        })?;

        let mut leaf = self.node(leaf_id)?;
        let items = leaf.as_leaf_mut()?;
        let mut idx = start;
        while idx < items.len() && items[idx].key.raw() == key.raw() {
            if items[idx].heap_id == heap_id {
                items.remove(idx);
                self.put_node(leaf)?;
                return Ok(true);
            }
            idx += 1;
        }
        Ok(false)
    }

    // ----------------------------------------------------------------
    // Scans
    // ----------------------------------------------------------------

    /// Stream heap ids in ascending key order. Without an operator the
    /// whole index is walked; `<`/`<=` walk from the left under a bound,
    /// `=`/`>=`/`>` start at the key.
    pub fn scan(&self, key: Option<Value>, op: Option<ScanOp>) -> Result<IndexScan> {
        self.check_open()?;
        match (key, op) {
            (_, None) => IndexScan::leftmost(Arc::clone(&self.ctx), self.config.id, None),
            (None, Some(op)) => Err(GertrudeError::InvalidArgument(format!(
                "scan operator {} requires a key",
                op.symbol()
            ))),
            (Some(key), Some(op)) => {
                if op.starts_leftmost() {
                    IndexScan::leftmost(
                        Arc::clone(&self.ctx),
                        self.config.id,
                        Some((key, op)),
                    )
                } else {
                    let path = self.find_path(&key, op.lower_bound())?;
                    Ok(IndexScan::from_path(
                        Arc::clone(&self.ctx),
                        self.config.id,
                        path,
                        Some((key, op)),
                    ))
                }
            }
        }
    }

    /// Human-readable tree structure, one node per line.
    pub fn dump(&self) -> Result<String> {
        self.check_open()?;
        let mut out = String::new();
        self.dump_node(ROOT_NODE_ID, 0, &mut out)?;
        Ok(out)
    }

    fn dump_node(&self, node_id: u64, depth: usize, out: &mut String) -> Result<()> {
        let node = self.node(node_id)?;
        let indent = "  ".repeat(depth);
        match &node.data {
            NodeData::Internal(items) => {
                let entries: Vec<String> = items
                    .iter()
                    .map(|item| format!("{} -> {}", item.key, item.node_id))
                    .collect();
                let _ = writeln!(out, "{}INTERNAL {}: [{}]", indent, node_id, entries.join(", "));
                for item in items {
                    self.dump_node(item.node_id, depth + 1, out)?;
                }
            }
            NodeData::Leaf(items) => {
                let entries: Vec<String> = items
                    .iter()
                    .map(|item| format!("{} -> {}", item.key, item.heap_id))
                    .collect();
                let _ = writeln!(out, "{}LEAF {}: [{}]", indent, node_id, entries.join(", "));
            }
        }
        Ok(())
    }

    /// Walk every node depth-first (test and diagnostics helper).
    pub fn nodes(&self) -> Result<Vec<Node>> {
        self.check_open()?;
        let mut nodes = Vec::new();
        let mut pending = vec![ROOT_NODE_ID];
        while let Some(node_id) = pending.pop() {
            let node = self.node(node_id)?;
            if let NodeData::Internal(items) = &node.data {
                pending.extend(items.iter().map(|item| item.node_id));
            }
            nodes.push(node);
        }
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseOptions;
    use crate::database::AccessMode;
    use tempfile::TempDir;

    fn test_ctx(dir: &TempDir, fanout: usize) -> Arc<DbContext> {
        DbContext::new(
            dir.path().to_path_buf(),
            AccessMode::ReadWrite,
            DatabaseOptions::default().with_fanout(fanout),
        )
        .unwrap()
    }

    fn int_index(dir: &TempDir, fanout: usize, options: IndexOptions) -> Index {
        let ctx = test_ctx(dir, fanout);
        Index::create(
            "idx",
            dir.path().join("idx"),
            "n",
            ValueType::Int,
            options,
            ctx,
            Vec::new(),
        )
        .unwrap()
    }

    fn scan_keys(index: &Index, key: Option<i64>, op: Option<ScanOp>) -> Vec<u64> {
        index
            .scan(key.map(Value::int), op)
            .unwrap()
            .map(|item| item.unwrap().as_u64())
            .collect()
    }

    #[test]
    fn test_empty_build_has_root_and_one_leaf() {
        let dir = TempDir::new().unwrap();
        let index = int_index(&dir, 6, IndexOptions::default());

        let nodes = index.nodes().unwrap();
        assert_eq!(nodes.len(), 2);
        let root = nodes.iter().find(|n| n.node_id == ROOT_NODE_ID).unwrap();
        assert!(!root.is_leaf());
        assert_eq!(root.len(), 1);
        assert!(root.key_at(0).is_null());

        assert!(scan_keys(&index, None, None).is_empty());
    }

    #[test]
    fn test_repeated_insert_scans_ascending_once() {
        let dir = TempDir::new().unwrap();
        let index = int_index(&dir, 6, IndexOptions::default());

        // pseudo-shuffled distinct keys
        let keys: Vec<i64> = (0..100).map(|i| (i * 37) % 100).collect();
        for &k in &keys {
            index.insert(Value::int(k), HeapId::new(1000 + k as u64)).unwrap();
        }

        let scanned = scan_keys(&index, None, None);
        let expected: Vec<u64> = (0..100).map(|k| 1000 + k).collect();
        assert_eq!(scanned, expected);
    }

    #[test]
    fn test_insert_split_keeps_leaves_within_fanout() {
        let dir = TempDir::new().unwrap();
        let index = int_index(&dir, 6, IndexOptions::default());

        let keys: Vec<i64> = (0..100).map(|i| (i * 61) % 100).collect();
        for &k in &keys {
            index.insert(Value::int(k), HeapId::new(1000 + k as u64)).unwrap();
        }

        for node in index.nodes().unwrap() {
            if node.is_leaf() {
                assert!(node.len() <= 5, "leaf {} has {} entries", node.node_id, node.len());
            }
            node.validate().unwrap();
        }

        // root is still id 0 and internal after the splits
        let root = index
            .nodes()
            .unwrap()
            .into_iter()
            .find(|n| n.node_id == ROOT_NODE_ID)
            .unwrap();
        assert!(!root.is_leaf());
    }

    #[test]
    fn test_internal_first_keys_are_sentinels() {
        let dir = TempDir::new().unwrap();
        let index = int_index(&dir, 4, IndexOptions::default());
        for k in 0..50 {
            index.insert(Value::int(k), HeapId::new(k as u64 + 1)).unwrap();
        }
        for node in index.nodes().unwrap() {
            if let NodeData::Internal(items) = &node.data {
                assert!(items[0].key.is_null(), "node {} first key", node.node_id);
            }
        }
    }

    #[test]
    fn test_duplicates_scan_in_order() {
        let dir = TempDir::new().unwrap();
        let index = int_index(&dir, 8, IndexOptions::default());

        // runs of duplicates long enough to force mono-key splits
        let mut serial = 0u64;
        for k in [5i64, 1, 5, 9, 5, 5, 5, 2, 5, 5, 8, 5, 5, 5, 5, 5] {
            index.insert(Value::int(k), HeapId::new(100 + serial)).unwrap();
            serial += 1;
        }

        let mut last: Option<i64> = None;
        let mut count = 0;
        for item in index.scan(None, None).unwrap() {
            let heap_id = item.unwrap().as_u64() - 100;
            let key = [5i64, 1, 5, 9, 5, 5, 5, 2, 5, 5, 8, 5, 5, 5, 5, 5][heap_id as usize];
            if let Some(prev) = last {
                assert!(prev <= key, "scan went backwards: {} after {}", key, prev);
            }
            last = Some(key);
            count += 1;
        }
        assert_eq!(count, 16);
    }

    #[test]
    fn test_range_and_point_scans() {
        let dir = TempDir::new().unwrap();
        let index = int_index(&dir, 6, IndexOptions::default());
        for k in 0..20 {
            index.insert(Value::int(k), HeapId::new(1000 + k as u64)).unwrap();
        }

        let ge: Vec<u64> = scan_keys(&index, Some(15), Some(ScanOp::Ge));
        assert_eq!(ge, (1015..1020).collect::<Vec<u64>>());

        let gt: Vec<u64> = scan_keys(&index, Some(15), Some(ScanOp::Gt));
        assert_eq!(gt, (1016..1020).collect::<Vec<u64>>());

        let lt: Vec<u64> = scan_keys(&index, Some(3), Some(ScanOp::Lt));
        assert_eq!(lt, (1000..1003).collect::<Vec<u64>>());

        let le: Vec<u64> = scan_keys(&index, Some(3), Some(ScanOp::Le));
        assert_eq!(le, (1000..1004).collect::<Vec<u64>>());

        let eq: Vec<u64> = scan_keys(&index, Some(7), Some(ScanOp::Eq));
        assert_eq!(eq, vec![1007]);

        // bound past either end
        assert!(scan_keys(&index, Some(50), Some(ScanOp::Ge)).is_empty());
        assert!(scan_keys(&index, Some(-1), Some(ScanOp::Le)).is_empty());
    }

    #[test]
    fn test_unique_and_nullable_checks() {
        let dir = TempDir::new().unwrap();
        let index = int_index(&dir, 6, IndexOptions::unique().not_null());

        index.insert(Value::int(1), HeapId::new(11)).unwrap();
        assert!(index.test_for_insert(&Value::int(2)).is_ok());

        let err = index.test_for_insert(&Value::int(1)).unwrap_err();
        assert!(matches!(err, GertrudeError::UniqueViolation(_)));

        let err = index.test_for_insert(&Value::null(ValueType::Int)).unwrap_err();
        assert!(matches!(err, GertrudeError::NullViolation(_)));
    }

    #[test]
    fn test_null_keys_scan_first() {
        let dir = TempDir::new().unwrap();
        let index = int_index(&dir, 6, IndexOptions::default());

        index.insert(Value::int(3), HeapId::new(13)).unwrap();
        index.insert(Value::null(ValueType::Int), HeapId::new(10)).unwrap();
        index.insert(Value::int(1), HeapId::new(11)).unwrap();

        assert_eq!(scan_keys(&index, None, None), vec![10, 11, 13]);
    }

    #[test]
    fn test_delete_removes_matching_entry() {
        let dir = TempDir::new().unwrap();
        let index = int_index(&dir, 6, IndexOptions::default());

        index.insert(Value::int(4), HeapId::new(41)).unwrap();
        index.insert(Value::int(4), HeapId::new(42)).unwrap();
        index.insert(Value::int(5), HeapId::new(51)).unwrap();

        assert!(index.delete(&Value::int(4), HeapId::new(42)).unwrap());
        assert!(!index.delete(&Value::int(4), HeapId::new(42)).unwrap());
        assert!(!index.delete(&Value::int(9), HeapId::new(99)).unwrap());

        assert_eq!(scan_keys(&index, None, None), vec![41, 51]);
    }

    #[test]
    fn test_bulk_build_round_trip() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir, 6);

        let entries: Vec<(Value, HeapId)> = (0..40)
            .map(|k| (Value::int((k * 17) % 40), HeapId::new(500 + ((k * 17) % 40) as u64)))
            .collect();
        let index = Index::create(
            "bulk",
            dir.path().join("bulk"),
            "n",
            ValueType::Int,
            IndexOptions::default(),
            ctx,
            entries,
        )
        .unwrap();

        let scanned = scan_keys(&index, None, None);
        assert_eq!(scanned, (500..540).collect::<Vec<u64>>());

        // leaves packed at 3/4 of the fanout
        for node in index.nodes().unwrap() {
            if node.is_leaf() {
                assert!(node.len() <= 4);
            }
        }
    }

    #[test]
    fn test_find_path_shapes() {
        let dir = TempDir::new().unwrap();
        let index = int_index(&dir, 6, IndexOptions::default());
        for k in 0..30 {
            index.insert(Value::int(k), HeapId::new(k as u64 + 1)).unwrap();
        }

        let path = index.find_path(&Value::int(17), true).unwrap();
        assert!(path.len() >= 2);
        assert_eq!(path[0].0, ROOT_NODE_ID);

        let (leaf_id, idx) = *path.last().unwrap();
        let leaf = index.node(leaf_id).unwrap();
        let items = leaf.as_leaf().unwrap();
        assert_eq!(items[idx].key, Value::int(17));
    }

    #[test]
    fn test_dump_mentions_every_node() {
        let dir = TempDir::new().unwrap();
        let index = int_index(&dir, 4, IndexOptions::default());
        for k in 0..10 {
            index.insert(Value::int(k), HeapId::new(k as u64 + 1)).unwrap();
        }
        let dump = index.dump().unwrap();
        assert!(dump.contains("INTERNAL 0:"));
        assert_eq!(dump.matches("LEAF").count(), index.nodes().unwrap().iter().filter(|n| n.is_leaf()).count());
    }
}
