//! Core data types: values, rows, heap ids, column specs

mod field;
mod heap_id;
mod row;
mod value;

pub use field::{cspec, DefaultFn, FieldOptions, FieldSpec};
pub use heap_id::HeapId;
pub use row::{record, Record, Row};
pub use value::{ArithOp, Scalar, Value, ValueType};
