//! B+Tree node structures
//!
//! A node is a flat, sorted entry list. Leaf entries pair a key with a
//! heap id; internal entries pair a key with a child node id, and the
//! first internal entry always carries the null sentinel (a null of the
//! indexed type, ordering before every real key) so the entry list
//! covers the whole key space.

use crate::error::{GertrudeError, Result};
use crate::types::{HeapId, Value};

/// The root node always has id 0 and is always internal, even when it
/// points at a single leaf.
pub const ROOT_NODE_ID: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Internal,
}

impl NodeKind {
    pub fn tag(self) -> u8 {
        match self {
            NodeKind::Leaf => b'L',
            NodeKind::Internal => b'I',
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            b'L' => Ok(NodeKind::Leaf),
            b'I' => Ok(NodeKind::Internal),
            other => Err(GertrudeError::Corruption(format!(
                "bad node kind tag {:#04x}",
                other
            ))),
        }
    }
}

/// A leaf entry: key and the heap id of the row carrying it.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafItem {
    pub key: Value,
    pub heap_id: HeapId,
}

/// An internal entry: key and the child holding keys at or above it
/// (up to the next sibling's key).
#[derive(Debug, Clone, PartialEq)]
pub struct InternalItem {
    pub key: Value,
    pub node_id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Leaf(Vec<LeafItem>),
    Internal(Vec<InternalItem>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub node_id: u64,
    pub data: NodeData,
}

/// A root-to-leaf search trace: `(node id, entry index)` per level. The
/// entry index is the descended child for internal levels and the
/// locate/insert position for the leaf.
pub type TreePath = Vec<(u64, usize)>;

impl Node {
    pub fn leaf(node_id: u64, items: Vec<LeafItem>) -> Self {
        Self {
            node_id,
            data: NodeData::Leaf(items),
        }
    }

    pub fn internal(node_id: u64, items: Vec<InternalItem>) -> Self {
        Self {
            node_id,
            data: NodeData::Internal(items),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self.data {
            NodeData::Leaf(_) => NodeKind::Leaf,
            NodeData::Internal(_) => NodeKind::Internal,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.data, NodeData::Leaf(_))
    }

    pub fn len(&self) -> usize {
        match &self.data {
            NodeData::Leaf(items) => items.len(),
            NodeData::Internal(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn key_at(&self, idx: usize) -> &Value {
        match &self.data {
            NodeData::Leaf(items) => &items[idx].key,
            NodeData::Internal(items) => &items[idx].key,
        }
    }

    pub fn as_leaf(&self) -> Result<&Vec<LeafItem>> {
        match &self.data {
            NodeData::Leaf(items) => Ok(items),
            NodeData::Internal(_) => Err(GertrudeError::Corruption(format!(
                "node {} is internal, expected leaf",
                self.node_id
            ))),
        }
    }

    pub fn as_leaf_mut(&mut self) -> Result<&mut Vec<LeafItem>> {
        let node_id = self.node_id;
        match &mut self.data {
            NodeData::Leaf(items) => Ok(items),
            NodeData::Internal(_) => Err(GertrudeError::Corruption(format!(
                "node {} is internal, expected leaf",
                node_id
            ))),
        }
    }

    pub fn as_internal(&self) -> Result<&Vec<InternalItem>> {
        match &self.data {
            NodeData::Internal(items) => Ok(items),
            NodeData::Leaf(_) => Err(GertrudeError::Corruption(format!(
                "node {} is a leaf, expected internal",
                self.node_id
            ))),
        }
    }

    pub fn as_internal_mut(&mut self) -> Result<&mut Vec<InternalItem>> {
        let node_id = self.node_id;
        match &mut self.data {
            NodeData::Internal(items) => Ok(items),
            NodeData::Leaf(_) => Err(GertrudeError::Corruption(format!(
                "node {} is a leaf, expected internal",
                node_id
            ))),
        }
    }

    /// Binary search over the entry keys starting at `lo`. With
    /// `lower_bound` the result is the first position whose key is not
    /// below `key`; otherwise the first position strictly above it.
    pub fn bisect(&self, key: &Value, lo: usize, lower_bound: bool) -> usize {
        let mut lo = lo;
        let mut hi = self.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let go_right = if lower_bound {
                self.key_at(mid).raw() < key.raw()
            } else {
                self.key_at(mid).raw() <= key.raw()
            };
            if go_right {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Pick the split position for an over-full node. Starts at the
    /// midpoint and slides toward the nearest run boundary so entries
    /// with equal keys stay in one sibling; a mono-key node falls back
    /// to the exact midpoint.
    pub fn split_point(&self) -> usize {
        let n = self.len();
        let mid = n / 2;

        let mut left = None;
        for s in (1..=mid).rev() {
            if self.key_at(s - 1).raw() != self.key_at(s).raw() {
                left = Some(s);
                break;
            }
        }
        let mut right = None;
        for s in (mid + 1)..n {
            if self.key_at(s - 1).raw() != self.key_at(s).raw() {
                right = Some(s);
                break;
            }
        }

        match (left, right) {
            (Some(l), Some(r)) => {
                if mid - l <= r - mid {
                    l
                } else {
                    r
                }
            }
            (Some(l), None) => l,
            (None, Some(r)) => r,
            (None, None) => mid,
        }
    }

    /// Structural invariants: entries sorted ascending by key, and an
    /// internal node's first key is the null sentinel.
    pub fn validate(&self) -> Result<()> {
        for i in 1..self.len() {
            if self.key_at(i - 1).raw() > self.key_at(i).raw() {
                return Err(GertrudeError::Corruption(format!(
                    "node {} entries out of order at {}",
                    self.node_id, i
                )));
            }
        }
        if let NodeData::Internal(items) = &self.data {
            if let Some(first) = items.first() {
                if !first.key.is_null() {
                    return Err(GertrudeError::Corruption(format!(
                        "internal node {} first key is not the null sentinel",
                        self.node_id
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueType;

    fn leaf_of(keys: &[i64]) -> Node {
        Node::leaf(
            7,
            keys.iter()
                .map(|&k| LeafItem {
                    key: Value::int(k),
                    heap_id: HeapId::new(k as u64 + 1),
                })
                .collect(),
        )
    }

    #[test]
    fn test_bisect_bounds() {
        let node = leaf_of(&[1, 3, 3, 5]);
        assert_eq!(node.bisect(&Value::int(3), 0, true), 1);
        assert_eq!(node.bisect(&Value::int(3), 0, false), 3);
        assert_eq!(node.bisect(&Value::int(0), 0, true), 0);
        assert_eq!(node.bisect(&Value::int(9), 0, false), 4);
        // lo clamps the search window
        assert_eq!(node.bisect(&Value::int(0), 1, true), 1);
    }

    #[test]
    fn test_split_point_prefers_nearest_boundary() {
        // mid = 2, boundary right at mid
        assert_eq!(leaf_of(&[1, 2, 3, 4]).split_point(), 2);
        // run of 2s straddles mid; nearest boundary is left
        assert_eq!(leaf_of(&[1, 2, 2, 3]).split_point(), 1);
        // equidistant boundaries tie toward the left
        assert_eq!(leaf_of(&[1, 2, 2, 2, 2, 3]).split_point(), 1);
    }

    #[test]
    fn test_split_point_mono_key() {
        assert_eq!(leaf_of(&[4, 4, 4, 4]).split_point(), 2);
        assert_eq!(leaf_of(&[4, 4, 4, 4, 4]).split_point(), 2);
    }

    #[test]
    fn test_split_point_one_sided() {
        // all duplicates before mid, single boundary on the right
        assert_eq!(leaf_of(&[2, 2, 2, 2, 3]).split_point(), 4);
        // single boundary on the left
        assert_eq!(leaf_of(&[1, 2, 2, 2, 2]).split_point(), 1);
    }

    #[test]
    fn test_validate() {
        assert!(leaf_of(&[1, 2, 3]).validate().is_ok());
        assert!(leaf_of(&[3, 2]).validate().is_err());

        let good = Node::internal(
            0,
            vec![
                InternalItem {
                    key: Value::null(ValueType::Int),
                    node_id: 1,
                },
                InternalItem {
                    key: Value::int(10),
                    node_id: 2,
                },
            ],
        );
        assert!(good.validate().is_ok());

        let bad = Node::internal(
            0,
            vec![InternalItem {
                key: Value::int(10),
                node_id: 1,
            }],
        );
        assert!(bad.validate().is_err());
    }
}
