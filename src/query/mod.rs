//! Fluent query construction
//!
//! A [`Query`] is built off a database table and accumulates steps:
//! `filter`, `select`, `add_column(s)`, `rename_columns`, `sort`,
//! `distinct`, `limit`, `join`. `run()` executes and unwraps to native
//! records; `run_values()` keeps the typed wrappers; `show_plan()` and
//! `columns()` introspect without executing.

pub mod plan;
pub mod runner;

pub use plan::{asc, desc, JoinKind, JoinRename, SelectCol, SortSpec};
pub use runner::TableSource;

use crate::database::Database;
use crate::error::Result;
use crate::expr::Expr;
use crate::types::{Record, Row};

use plan::{JoinSpec, QueryStep};
use runner::Runner;

pub struct Query<'db> {
    db: &'db Database,
    steps: Vec<QueryStep<'db>>,
}

impl<'db> Query<'db> {
    pub(crate) fn new(db: &'db Database, table: &str) -> Self {
        Self {
            db,
            steps: vec![QueryStep::Read(table.to_string())],
        }
    }

    /// Keep rows where the expression is true (false and null drop).
    pub fn filter(mut self, expr: Expr) -> Self {
        self.steps.push(QueryStep::Filter(vec![expr]));
        self
    }

    /// Filter on several expressions at once (all must hold).
    pub fn filter_all(mut self, exprs: Vec<Expr>) -> Self {
        self.steps.push(QueryStep::Filter(exprs));
        self
    }

    /// Project to exactly these columns; accepts plain names and
    /// `(name, expression)` pairs.
    pub fn select<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<SelectCol>,
    {
        let columns = columns
            .into_iter()
            .map(|col| match col.into() {
                SelectCol::Name(name) => {
                    let expr = Expr::Column(name.clone());
                    (name, expr)
                }
                SelectCol::Computed(name, expr) => (name, expr),
            })
            .collect();
        self.steps.push(QueryStep::Select(columns));
        self
    }

    /// Add (or overwrite) one computed column, keeping the rest.
    pub fn add_column(mut self, name: &str, expr: Expr) -> Self {
        self.steps
            .push(QueryStep::AddColumns(vec![(name.to_string(), expr)]));
        self
    }

    /// Add several computed columns at once.
    pub fn add_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = (S, Expr)>,
        S: Into<String>,
    {
        self.steps.push(QueryStep::AddColumns(
            columns
                .into_iter()
                .map(|(name, expr)| (name.into(), expr))
                .collect(),
        ));
        self
    }

    /// Rename output columns by `(old, new)` pairs.
    pub fn rename_columns<I, S>(mut self, renames: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        self.steps.push(QueryStep::Rename(
            renames
                .into_iter()
                .map(|(from, to)| (from.into(), to.into()))
                .collect(),
        ));
        self
    }

    /// Stable sort; keys apply major-to-minor in the order given.
    /// Plain column names sort ascending, [`desc`] flips one key.
    pub fn sort<I, S>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SortSpec>,
    {
        self.steps
            .push(QueryStep::Sort(specs.into_iter().map(Into::into).collect()));
        self
    }

    /// Keep the first occurrence per key tuple; an empty column list
    /// deduplicates whole rows.
    pub fn distinct(mut self, columns: &[&str]) -> Self {
        self.steps.push(QueryStep::Distinct(
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.steps.push(QueryStep::Limit(n));
        self
    }

    /// Hash-join against another query. `on` is `(left column, right
    /// column)`; colliding output names are handled per `rename`.
    pub fn join(
        mut self,
        right: Query<'db>,
        on: (&str, &str),
        how: JoinKind,
        rename: JoinRename,
    ) -> Self {
        self.steps.push(QueryStep::Join(Box::new(JoinSpec {
            right,
            on: (on.0.to_string(), on.1.to_string()),
            how,
            rename,
        })));
        self
    }

    /// Execute and unwrap to native records.
    pub fn run(&self) -> Result<Vec<Record>> {
        Runner::new(self.db).run(&self.steps)
    }

    /// Execute, keeping typed values (used by `delete_from_query` and
    /// as a join input).
    pub fn run_values(&self) -> Result<Vec<Row>> {
        Runner::new(self.db).run_values(&self.steps)
    }

    /// Render the executable plan, one op per line.
    pub fn show_plan(&self) -> Result<Vec<String>> {
        Runner::new(self.db).explain(&self.steps)
    }

    /// Output column names, computed without executing.
    pub fn columns(&self) -> Result<Vec<String>> {
        Runner::new(self.db).columns(&self.steps)
    }
}
