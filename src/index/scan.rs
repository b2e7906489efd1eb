//! Index scan cursor
//!
//! A pull iterator over heap ids in ascending key order, driven by an
//! explicit stack of `(node id, cursor)` frames. An internal frame's
//! cursor names the child currently being walked; a leaf frame's cursor
//! names the next entry to yield. Popping an exhausted frame resumes
//! the parent at its next child.

use std::str::FromStr;
use std::sync::Arc;

use crate::database::DbContext;
use crate::error::{GertrudeError, Result};
use crate::index::node::{Node, NodeData, ROOT_NODE_ID};
use crate::types::{HeapId, Value};

/// Comparison operator for point and range scans. Accepts the synonyms
/// `eq|=|==`, `lt|<`, `le|<=`, `gt|>`, `ge|>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ScanOp {
    /// Scans for `=` and `>=` land on the first duplicate of the key;
    /// `>` lands just past the last one.
    pub fn lower_bound(self) -> bool {
        !matches!(self, ScanOp::Gt)
    }

    /// Whether the scan starts at the leftmost leaf rather than at the
    /// bound key.
    pub fn starts_leftmost(self) -> bool {
        matches!(self, ScanOp::Lt | ScanOp::Le)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ScanOp::Eq => "=",
            ScanOp::Lt => "<",
            ScanOp::Le => "<=",
            ScanOp::Gt => ">",
            ScanOp::Ge => ">=",
        }
    }
}

impl FromStr for ScanOp {
    type Err = GertrudeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "eq" | "=" | "==" => Ok(ScanOp::Eq),
            "lt" | "<" => Ok(ScanOp::Lt),
            "le" | "<=" => Ok(ScanOp::Le),
            "gt" | ">" => Ok(ScanOp::Gt),
            "ge" | ">=" => Ok(ScanOp::Ge),
            other => Err(GertrudeError::UnknownOperator(other.to_string())),
        }
    }
}

pub struct IndexScan {
    ctx: Arc<DbContext>,
    index_id: u64,
    stack: Vec<(u64, usize)>,
    bound: Option<(Value, ScanOp)>,
    done: bool,
}

impl IndexScan {
    /// Cursor starting at an explicit tree path (for `=`, `>=`, `>`).
    pub(crate) fn from_path(
        ctx: Arc<DbContext>,
        index_id: u64,
        path: Vec<(u64, usize)>,
        bound: Option<(Value, ScanOp)>,
    ) -> Self {
        Self {
            ctx,
            index_id,
            stack: path,
            bound,
            done: false,
        }
    }

    /// Cursor starting at the leftmost leaf (full scans, `<`, `<=`).
    pub(crate) fn leftmost(
        ctx: Arc<DbContext>,
        index_id: u64,
        bound: Option<(Value, ScanOp)>,
    ) -> Result<Self> {
        let mut scan = Self {
            ctx,
            index_id,
            stack: Vec::new(),
            bound,
            done: false,
        };
        scan.descend_leftmost(ROOT_NODE_ID)?;
        Ok(scan)
    }

    fn node(&self, node_id: u64) -> Result<Node> {
        self.ctx.cache().get(self.index_id, node_id)
    }

    /// Push frames from `start` down its 0-th children to a leaf.
    fn descend_leftmost(&mut self, start: u64) -> Result<()> {
        let mut node_id = start;
        loop {
            let node = self.node(node_id)?;
            self.stack.push((node_id, 0));
            match &node.data {
                NodeData::Internal(items) => {
                    let first = items.first().ok_or_else(|| {
                        GertrudeError::Corruption(format!("internal node {} is empty", node_id))
                    })?;
                    node_id = first.node_id;
                }
                NodeData::Leaf(_) => return Ok(()),
            }
        }
    }

    fn in_range(&self, key: &Value) -> bool {
        match &self.bound {
            None => true,
            Some((bound, op)) => match op {
                ScanOp::Eq => key.raw() == bound.raw(),
                ScanOp::Lt => key.raw() < bound.raw(),
                ScanOp::Le => key.raw() <= bound.raw(),
                ScanOp::Gt | ScanOp::Ge => true,
            },
        }
    }

    fn advance(&mut self) -> Result<Option<HeapId>> {
        loop {
            let (node_id, cursor) = match self.stack.pop() {
                Some(frame) => frame,
                None => return Ok(None),
            };
            let node = self.node(node_id)?;
            match &node.data {
                NodeData::Leaf(items) => {
                    if cursor < items.len() {
                        let item = &items[cursor];
                        if !self.in_range(&item.key) {
                            return Ok(None);
                        }
                        self.stack.push((node_id, cursor + 1));
                        return Ok(Some(item.heap_id));
                    }
                    // exhausted leaf: fall through to the parent frame
                }
                NodeData::Internal(items) => {
                    let next_child = cursor + 1;
                    if next_child < items.len() {
                        self.stack.push((node_id, next_child));
                        self.descend_leftmost(items[next_child].node_id)?;
                    }
                    // else: this subtree is spent, pop propagates up
                }
            }
        }
    }
}

impl Iterator for IndexScan {
    type Item = Result<HeapId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(heap_id)) => Some(Ok(heap_id)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_synonyms() {
        for s in ["eq", "=", "=="] {
            assert_eq!(s.parse::<ScanOp>().unwrap(), ScanOp::Eq);
        }
        assert_eq!("lt".parse::<ScanOp>().unwrap(), ScanOp::Lt);
        assert_eq!("<=".parse::<ScanOp>().unwrap(), ScanOp::Le);
        assert_eq!(">".parse::<ScanOp>().unwrap(), ScanOp::Gt);
        assert_eq!("ge".parse::<ScanOp>().unwrap(), ScanOp::Ge);
        assert!("!=".parse::<ScanOp>().is_err());
    }

    #[test]
    fn test_bound_direction() {
        assert!(ScanOp::Ge.lower_bound());
        assert!(ScanOp::Eq.lower_bound());
        assert!(!ScanOp::Gt.lower_bound());
        assert!(ScanOp::Lt.starts_leftmost());
        assert!(ScanOp::Le.starts_leftmost());
        assert!(!ScanOp::Ge.starts_leftmost());
    }
}
