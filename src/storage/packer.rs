//! Tagged binary framing for heap row blobs and index node blocks
//!
//! Every embedded value is framed with an extension tag so a reader can
//! tell what it is looking at before trusting any length field:
//!
//! ```text
//! value frame:  0x01  len:u32be  <raw value bytes>
//! row block:    count:u32be  value-frame*
//! node block:   kind:u8('L'|'I')  node_id:u64be  count:u32be  item*
//! item:         0x02  value-frame  heap_id:u64be      (leaf)
//!               0x03  value-frame  child_id:u64be     (internal)
//! ```
//!
//! Truncated or mistagged input fails with a corruption error naming
//! the offset; nothing is guessed.

use crate::error::{GertrudeError, Result};
use crate::index::node::{InternalItem, LeafItem, Node, NodeData, NodeKind};
use crate::types::{HeapId, Value};

const TAG_VALUE: u8 = 1;
const TAG_LEAF_ITEM: u8 = 2;
const TAG_INTERNAL_ITEM: u8 = 3;

/// Serialize a storage row (positional value list in schema order).
pub fn pack_row(values: &[Value]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + values.len() * 16);
    out.extend_from_slice(&(values.len() as u32).to_be_bytes());
    for value in values {
        pack_value(&mut out, value);
    }
    out
}

/// Deserialize a storage row.
pub fn unpack_row(data: &[u8]) -> Result<Vec<Value>> {
    let mut cur = Cursor::new(data);
    let count = cur.read_u32()? as usize;
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(cur.read_value()?);
    }
    cur.finish()?;
    Ok(values)
}

/// Serialize an index node block.
pub fn pack_node(node: &Node) -> Vec<u8> {
    let mut out = Vec::with_capacity(13 + node.len() * 24);
    out.push(node.kind().tag());
    out.extend_from_slice(&node.node_id.to_be_bytes());
    out.extend_from_slice(&(node.len() as u32).to_be_bytes());
    match &node.data {
        NodeData::Leaf(items) => {
            for item in items {
                out.push(TAG_LEAF_ITEM);
                pack_value(&mut out, &item.key);
                out.extend_from_slice(&item.heap_id.to_bytes());
            }
        }
        NodeData::Internal(items) => {
            for item in items {
                out.push(TAG_INTERNAL_ITEM);
                pack_value(&mut out, &item.key);
                out.extend_from_slice(&item.node_id.to_be_bytes());
            }
        }
    }
    out
}

/// Deserialize an index node block.
pub fn unpack_node(data: &[u8]) -> Result<Node> {
    let mut cur = Cursor::new(data);
    let kind = NodeKind::from_tag(cur.read_u8()?)?;
    let node_id = cur.read_u64()?;
    let count = cur.read_u32()? as usize;

    let node = match kind {
        NodeKind::Leaf => {
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                cur.expect_tag(TAG_LEAF_ITEM)?;
                let key = cur.read_value()?;
                let heap_id = HeapId::new(cur.read_u64()?);
                items.push(LeafItem { key, heap_id });
            }
            Node::leaf(node_id, items)
        }
        NodeKind::Internal => {
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                cur.expect_tag(TAG_INTERNAL_ITEM)?;
                let key = cur.read_value()?;
                let child = cur.read_u64()?;
                items.push(InternalItem {
                    key,
                    node_id: child,
                });
            }
            Node::internal(node_id, items)
        }
    };
    cur.finish()?;
    Ok(node)
}

fn pack_value(out: &mut Vec<u8>, value: &Value) {
    out.push(TAG_VALUE);
    out.extend_from_slice(&(value.raw().len() as u32).to_be_bytes());
    out.extend_from_slice(value.raw());
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(GertrudeError::Corruption(format!(
                "truncated block: wanted {} bytes at offset {}",
                n, self.pos
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(buf))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(buf))
    }

    fn expect_tag(&mut self, want: u8) -> Result<()> {
        let offset = self.pos;
        let got = self.read_u8()?;
        if got != want {
            return Err(GertrudeError::Corruption(format!(
                "bad tag {:#04x} at offset {}, expected {:#04x}",
                got, offset, want
            )));
        }
        Ok(())
    }

    fn read_value(&mut self) -> Result<Value> {
        self.expect_tag(TAG_VALUE)?;
        let len = self.read_u32()? as usize;
        let raw = self.take(len)?;
        Value::from_raw(raw.to_vec())
    }

    fn finish(self) -> Result<()> {
        if self.pos != self.data.len() {
            return Err(GertrudeError::Corruption(format!(
                "{} trailing bytes after block",
                self.data.len() - self.pos
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueType;

    #[test]
    fn test_row_round_trip() {
        let row = vec![
            Value::int(42),
            Value::text("bob"),
            Value::null(ValueType::Float),
            Value::boolean(false),
        ];
        let packed = pack_row(&row);
        assert_eq!(unpack_row(&packed).unwrap(), row);
    }

    #[test]
    fn test_empty_row() {
        let packed = pack_row(&[]);
        assert!(unpack_row(&packed).unwrap().is_empty());
    }

    #[test]
    fn test_leaf_node_round_trip() {
        let node = Node::leaf(
            12,
            vec![
                LeafItem {
                    key: Value::text("alice"),
                    heap_id: HeapId::new(0xAAAA),
                },
                LeafItem {
                    key: Value::text("bob"),
                    heap_id: HeapId::new(0xBBBB),
                },
            ],
        );
        let packed = pack_node(&node);
        assert_eq!(unpack_node(&packed).unwrap(), node);
    }

    #[test]
    fn test_internal_node_round_trip() {
        let node = Node::internal(
            0,
            vec![
                InternalItem {
                    key: Value::null(ValueType::Str),
                    node_id: 3,
                },
                InternalItem {
                    key: Value::text("m"),
                    node_id: 4,
                },
            ],
        );
        let packed = pack_node(&node);
        assert_eq!(unpack_node(&packed).unwrap(), node);
    }

    #[test]
    fn test_corruption_detected() {
        let node = Node::leaf(
            1,
            vec![LeafItem {
                key: Value::int(1),
                heap_id: HeapId::new(9),
            }],
        );
        let mut packed = pack_node(&node);

        // truncation
        packed.pop();
        assert!(unpack_node(&packed).is_err());

        // bad kind byte
        let mut packed = pack_node(&node);
        packed[0] = b'X';
        assert!(unpack_node(&packed).is_err());

        // trailing garbage
        let mut packed = pack_node(&node);
        packed.push(0);
        assert!(unpack_node(&packed).is_err());
    }
}
