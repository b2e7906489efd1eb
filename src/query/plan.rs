//! Declarative query steps
//!
//! A query is a list of steps headed by `Read`. The runner rewrites the
//! head into a table or index scan and folds the rest over a lazy row
//! stream; each step also knows its output column set given its input,
//! which powers `columns()` and join rename without executing anything.

use std::str::FromStr;

use crate::error::{GertrudeError, Result};
use crate::expr::Expr;
use crate::query::Query;

/// One sort key with direction.
#[derive(Debug, Clone)]
pub struct SortSpec {
    pub column: String,
    pub descending: bool,
}

/// Ascending sort key.
pub fn asc(column: &str) -> SortSpec {
    SortSpec {
        column: column.to_string(),
        descending: false,
    }
}

/// Descending sort key.
pub fn desc(column: &str) -> SortSpec {
    SortSpec {
        column: column.to_string(),
        descending: true,
    }
}

impl From<&str> for SortSpec {
    fn from(column: &str) -> Self {
        asc(column)
    }
}

/// A selected output column: a plain column name or a named expression.
#[derive(Debug, Clone)]
pub enum SelectCol {
    Name(String),
    Computed(String, Expr),
}

impl From<&str> for SelectCol {
    fn from(name: &str) -> Self {
        SelectCol::Name(name.to_string())
    }
}

impl From<(&str, Expr)> for SelectCol {
    fn from((name, expr): (&str, Expr)) -> Self {
        SelectCol::Computed(name.to_string(), expr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
}

impl JoinKind {
    pub fn name(self) -> &'static str {
        match self {
            JoinKind::Inner => "inner",
            JoinKind::LeftOuter => "left_outer",
        }
    }
}

impl FromStr for JoinKind {
    type Err = GertrudeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "inner" => Ok(JoinKind::Inner),
            "left_outer" => Ok(JoinKind::LeftOuter),
            other => Err(GertrudeError::InvalidArgument(format!(
                "join kind {:?}, expected \"inner\" or \"left_outer\"",
                other
            ))),
        }
    }
}

/// Collision handling for join output columns.
#[derive(Debug, Clone)]
pub enum JoinRename {
    /// Colliding right columns silently replace left ones.
    No,
    /// Colliding names get these suffixes on the left and right side.
    Suffix(String, String),
}

impl JoinRename {
    /// The default `_left` / `_right` pair.
    pub fn default_suffixes() -> Self {
        JoinRename::Suffix("_left".to_string(), "_right".to_string())
    }
}

pub struct JoinSpec<'db> {
    pub right: Query<'db>,
    pub on: (String, String),
    pub how: JoinKind,
    pub rename: JoinRename,
}

/// The steps a query is made of, in user order.
pub enum QueryStep<'db> {
    Read(String),
    Filter(Vec<Expr>),
    /// Project to exactly these columns.
    Select(Vec<(String, Expr)>),
    /// Keep existing columns and add or overwrite these.
    AddColumns(Vec<(String, Expr)>),
    Rename(Vec<(String, String)>),
    Sort(Vec<SortSpec>),
    /// Deduplicate on these columns; empty means the whole row.
    Distinct(Vec<String>),
    Limit(usize),
    Join(Box<JoinSpec<'db>>),
}
