//! Gertrude, an embedded, file-system-backed relational store
//!
//! A directory is a database; each table is a sub-directory holding a
//! content-addressed row heap and any number of B+Tree secondary
//! indexes. Queries are composed programmatically and executed by a
//! small planner and runner that pushes a leading `column <op> literal`
//! filter down into an index scan when one applies.
//!
//! ```no_run
//! use gertrude::{col, cspec, lit, record, Database, DatabaseOptions, ValueType};
//!
//! # fn main() -> gertrude::Result<()> {
//! let mut db = Database::create("./mydb", DatabaseOptions::default())?;
//! db.add_table("emp", vec![
//!     cspec("id", ValueType::Int).pk(),
//!     cspec("name", ValueType::Str),
//! ])?;
//!
//! let emp = db.table("emp")?;
//! emp.insert(&record([("id", 1.into()), ("name", "bob".into())]))?;
//!
//! let _rows = db.query("emp")?.filter(col("id").ge(lit(1))).sort(["id"]).run()?;
//! # Ok(())
//! # }
//! ```
//!
//! The library logs through the `tracing` facade and never installs a
//! subscriber; single-process, single-writer use is assumed.

pub mod cache;
pub mod config;
pub mod database;
pub mod expr;
pub mod index;
pub mod int_id;
pub mod query;
pub mod storage;
pub mod table;
pub mod types;

mod error;

pub use cache::CacheStats;
pub use config::DatabaseOptions;
pub use database::{AccessMode, Database};
pub use error::{GertrudeError, Result};
pub use expr::{case, col, data_var, lit, null_lit, nvl, Expr};
pub use index::scan::ScanOp;
pub use index::IndexOptions;
pub use query::{asc, desc, JoinKind, JoinRename, Query};
pub use table::Table;
pub use types::{cspec, record, FieldSpec, HeapId, Record, Row, Scalar, Value, ValueType};
