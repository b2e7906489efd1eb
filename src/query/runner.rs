//! Query execution
//!
//! The runner resolves the leading `Read` into a table scan, or an
//! index scan when the following filter's first expression is
//! `column <op> literal` over an indexed column, and then folds the
//! remaining steps over a lazy stream of rows. Sort, distinct state,
//! and the join build side are the only materialization points;
//! everything else stays pull-driven until `run` collects.

use ahash::{AHashMap, AHashSet};
use tracing::debug;

use crate::error::{GertrudeError, Result};
use crate::expr::{self, Expr};
use crate::index::scan::ScanOp;
use crate::table::Table;
use crate::types::{Record, Row, Scalar, Value, ValueType};

use super::plan::{JoinKind, JoinRename, JoinSpec, QueryStep, SortSpec};

/// Table resolution capability; implemented by `Database`. Keeps the
/// runner decoupled from the database type itself.
pub trait TableSource {
    fn lookup_table(&self, name: &str) -> Result<&Table>;
}

type RowStream<'s> = Box<dyn Iterator<Item = Result<Row>> + 's>;

/// How the leading `Read` was resolved.
enum ScanChoice {
    TableScan,
    IndexScan {
        index: String,
        op: ScanOp,
        key: Scalar,
        description: String,
    },
}

pub struct Runner<'a> {
    source: &'a dyn TableSource,
}

impl<'a> Runner<'a> {
    pub fn new(source: &'a dyn TableSource) -> Self {
        Self { source }
    }

    /// Execute and unwrap to records (the Unwrap terminal op).
    pub fn run(&self, steps: &[QueryStep<'_>]) -> Result<Vec<Record>> {
        self.stream(steps)?
            .map(|item| item.map(|row| row.unwrap()))
            .collect()
    }

    /// Execute, keeping the typed value wrappers.
    pub fn run_values(&self, steps: &[QueryStep<'_>]) -> Result<Vec<Row>> {
        self.stream(steps)?.collect()
    }

    fn read_table<'s>(&self, steps: &'s [QueryStep<'_>]) -> Result<(&'a Table, &'s str)> {
        match steps.first() {
            Some(QueryStep::Read(name)) => Ok((self.source.lookup_table(name)?, name)),
            Some(_) => Err(GertrudeError::Plan(
                "first step must be a table read".to_string(),
            )),
            None => Err(GertrudeError::Plan("empty plan".to_string())),
        }
    }

    // Inspect the step after Read: a leading `column <op> literal`
    // filter over an indexed column becomes an index scan. Falls back
    // to a table scan when the literal cannot be coerced to the key
    // type.
    fn choose_scan(&self, table: &Table, steps: &[QueryStep<'_>]) -> ScanChoice {
        let exprs = match steps.get(1) {
            Some(QueryStep::Filter(exprs)) => exprs,
            _ => return ScanChoice::TableScan,
        };
        let (column, op, value) = match exprs.first().and_then(|expr| expr.as_index_probe()) {
            Some(probe) => probe,
            None => return ScanChoice::TableScan,
        };
        let index = match table.find_index_for_column(column) {
            Some(name) => name.to_string(),
            None => return ScanChoice::TableScan,
        };
        let coltype = match table.index(&index) {
            Ok(idx) => idx.coltype(),
            Err(_) => return ScanChoice::TableScan,
        };
        if Value::new(coltype, value.scalar()).is_err() {
            return ScanChoice::TableScan;
        }

        let description = format!(
            "index_scan({}.{}, {} {} {})",
            table.name(),
            index,
            column,
            op.symbol(),
            value
        );
        debug!(%description, "filter pushed down to index");
        ScanChoice::IndexScan {
            index,
            op,
            key: value.scalar(),
            description,
        }
    }

    fn stream<'s>(&'s self, steps: &'s [QueryStep<'_>]) -> Result<RowStream<'s>> {
        let (table, _) = self.read_table(steps)?;
        let choice = self.choose_scan(table, steps);

        let (mut stream, absorbed_filter): (RowStream<'s>, bool) = match &choice {
            ScanChoice::TableScan => (Box::new(table.scan_rows()?), false),
            ScanChoice::IndexScan { index, op, key, .. } => (
                Box::new(table.index_scan_rows(index, Some(key.clone()), Some(op.symbol()))?),
                true,
            ),
        };

        for (position, step) in steps.iter().enumerate().skip(1) {
            if position == 1 && absorbed_filter {
                // the probe expression is served by the index scan;
                // only the rest of this filter still applies
                if let QueryStep::Filter(exprs) = step {
                    if exprs.len() > 1 {
                        stream = Self::apply_filter(stream, &exprs[1..]);
                    }
                    continue;
                }
            }
            stream = self.apply(stream, step)?;
        }
        Ok(stream)
    }

    fn apply<'s>(&'s self, stream: RowStream<'s>, step: &'s QueryStep<'_>) -> Result<RowStream<'s>> {
        match step {
            QueryStep::Read(_) => Err(GertrudeError::Plan(
                "read is only valid as the first step".to_string(),
            )),
            QueryStep::Filter(exprs) => Ok(Self::apply_filter(stream, exprs)),
            QueryStep::Select(columns) => Ok(Self::apply_select(stream, columns)),
            QueryStep::AddColumns(columns) => Ok(Self::apply_add_columns(stream, columns)),
            QueryStep::Rename(pairs) => Ok(Self::apply_rename(stream, pairs)),
            QueryStep::Sort(specs) => Self::apply_sort(stream, specs),
            QueryStep::Distinct(keys) => Ok(Self::apply_distinct(stream, keys)),
            QueryStep::Limit(n) => Ok(Box::new(stream.take(*n))),
            QueryStep::Join(spec) => self.apply_join(stream, spec),
        }
    }

    fn apply_filter<'s>(stream: RowStream<'s>, exprs: &'s [Expr]) -> RowStream<'s> {
        Box::new(stream.filter_map(move |item| {
            let row = match item {
                Ok(row) => row,
                Err(e) => return Some(Err(e)),
            };
            for predicate in exprs {
                match predicate.eval(&row).and_then(|v| expr::is_true(&v)) {
                    Ok(true) => {}
                    Ok(false) => return None,
                    Err(e) => return Some(Err(e)),
                }
            }
            Some(Ok(row))
        }))
    }

    fn apply_select<'s>(stream: RowStream<'s>, columns: &'s [(String, Expr)]) -> RowStream<'s> {
        Box::new(stream.map(move |item| {
            let row = item?;
            let mut out = Row::with_capacity(columns.len());
            for (name, expr) in columns {
                out.set(name, expr.eval(&row)?);
            }
            Ok(out)
        }))
    }

    fn apply_add_columns<'s>(stream: RowStream<'s>, columns: &'s [(String, Expr)]) -> RowStream<'s> {
        Box::new(stream.map(move |item| {
            let mut row = item?;
            for (name, expr) in columns {
                let value = expr.eval(&row)?;
                row.set(name, value);
            }
            Ok(row)
        }))
    }

    fn apply_rename<'s>(stream: RowStream<'s>, pairs: &'s [(String, String)]) -> RowStream<'s> {
        Box::new(stream.map(move |item| {
            let mut row = item?;
            for (from, to) in pairs {
                row.rename(from, to);
            }
            Ok(row)
        }))
    }

    // Stable multi-key ordering: one stable pass per key, minor key
    // first, so earlier keys dominate. Nulls order first ascending
    // (and last descending); a missing column sorts like a null.
    fn apply_sort<'s>(stream: RowStream<'s>, specs: &[SortSpec]) -> Result<RowStream<'s>> {
        let mut rows: Vec<Row> = stream.collect::<Result<_>>()?;
        for spec in specs.iter().rev() {
            rows.sort_by(|a, b| {
                let ka = a.get(&spec.column).map(Value::raw);
                let kb = b.get(&spec.column).map(Value::raw);
                let ordering = ka.cmp(&kb);
                if spec.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn apply_distinct<'s>(stream: RowStream<'s>, keys: &'s [String]) -> RowStream<'s> {
        let mut seen: AHashSet<Vec<u8>> = AHashSet::new();
        Box::new(stream.filter_map(move |item| {
            let row = match item {
                Ok(row) => row,
                Err(e) => return Some(Err(e)),
            };
            let fingerprint = distinct_key(&row, keys);
            if seen.insert(fingerprint) {
                Some(Ok(row))
            } else {
                None
            }
        }))
    }

    // Hash join: build on the right input, stream the left once. Key
    // equality is structural on encoded bytes, so null joins null.
    fn apply_join<'s>(&'s self, stream: RowStream<'s>, spec: &'s JoinSpec<'_>) -> Result<RowStream<'s>> {
        let right_rows = spec.right.run_values()?;
        let (left_key, right_key) = (spec.on.0.clone(), spec.on.1.clone());

        let mut right_cols: Vec<String> = Vec::new();
        let mut right_types: AHashMap<String, ValueType> = AHashMap::new();
        let mut built: AHashMap<Vec<u8>, Vec<Row>> = AHashMap::new();
        for row in right_rows {
            for (column, value) in row.iter() {
                if !right_cols.iter().any(|c| c == column) {
                    right_cols.push(column.to_string());
                }
                if !value.is_null() {
                    right_types
                        .entry(column.to_string())
                        .or_insert_with(|| value.vtype());
                }
            }
            let key = row
                .get(&right_key)
                .ok_or_else(|| GertrudeError::ColumnNotFound(right_key.clone()))?
                .raw()
                .to_vec();
            built.entry(key).or_default().push(row);
        }
        debug!(
            keys = built.len(),
            how = spec.how.name(),
            "join build side ready"
        );

        let how = spec.how;
        let rename = spec.rename.clone();
        Ok(Box::new(stream.flat_map(move |item| -> Vec<Result<Row>> {
            let left = match item {
                Ok(row) => row,
                Err(e) => return vec![Err(e)],
            };
            let key = match left.get(&left_key) {
                Some(value) => value.raw().to_vec(),
                None => return vec![Err(GertrudeError::ColumnNotFound(left_key.clone()))],
            };
            match built.get(&key) {
                Some(matches) => matches
                    .iter()
                    .map(|right| Ok(merge_rows(&left, Some(right), &right_cols, &right_types, &rename)))
                    .collect(),
                None => match how {
                    JoinKind::Inner => Vec::new(),
                    JoinKind::LeftOuter => vec![Ok(merge_rows(
                        &left,
                        None,
                        &right_cols,
                        &right_types,
                        &rename,
                    ))],
                },
            }
        })))
    }

    // ----------------------------------------------------------------
    // Introspection
    // ----------------------------------------------------------------

    /// Output column set of the whole plan, step by step.
    pub fn columns(&self, steps: &[QueryStep<'_>]) -> Result<Vec<String>> {
        let (table, _) = self.read_table(steps)?;
        let mut cols: Vec<String> = table
            .get_spec()
            .iter()
            .map(|field| field.name.clone())
            .collect();

        for step in steps.iter().skip(1) {
            cols = match step {
                QueryStep::Read(_) => {
                    return Err(GertrudeError::Plan(
                        "read is only valid as the first step".to_string(),
                    ))
                }
                QueryStep::Filter(_)
                | QueryStep::Sort(_)
                | QueryStep::Distinct(_)
                | QueryStep::Limit(_) => cols,
                QueryStep::Select(columns) => {
                    columns.iter().map(|(name, _)| name.clone()).collect()
                }
                QueryStep::AddColumns(columns) => {
                    let mut out = cols;
                    for (name, _) in columns {
                        if !out.iter().any(|c| c == name) {
                            out.push(name.clone());
                        }
                    }
                    out
                }
                QueryStep::Rename(pairs) => cols
                    .into_iter()
                    .map(|name| {
                        pairs
                            .iter()
                            .find(|(from, _)| *from == name)
                            .map(|(_, to)| to.clone())
                            .unwrap_or(name)
                    })
                    .collect(),
                QueryStep::Join(spec) => {
                    let right_cols = spec.right.columns()?;
                    join_columns(&cols, &right_cols, &spec.rename)
                }
            };
        }
        Ok(cols)
    }

    /// One line per executable op, without running anything.
    pub fn explain(&self, steps: &[QueryStep<'_>]) -> Result<Vec<String>> {
        let (table, name) = self.read_table(steps)?;
        let choice = self.choose_scan(table, steps);

        let mut lines = Vec::new();
        let absorbed_filter = match &choice {
            ScanChoice::TableScan => {
                lines.push(format!("scan(table_scan({}))", name));
                false
            }
            ScanChoice::IndexScan { description, .. } => {
                lines.push(format!("scan({})", description));
                true
            }
        };

        for (position, step) in steps.iter().enumerate().skip(1) {
            if position == 1 && absorbed_filter {
                if let QueryStep::Filter(exprs) = step {
                    if exprs.len() > 1 {
                        lines.push(format!("filter({})", describe_exprs(&exprs[1..])));
                    }
                    continue;
                }
            }
            lines.push(match step {
                QueryStep::Read(table) => format!("read({})", table),
                QueryStep::Filter(exprs) => format!("filter({})", describe_exprs(exprs)),
                QueryStep::Select(columns) => format!("select({})", describe_columns(columns)),
                QueryStep::AddColumns(columns) => {
                    format!("add_columns({})", describe_columns(columns))
                }
                QueryStep::Rename(pairs) => {
                    let parts: Vec<String> = pairs
                        .iter()
                        .map(|(from, to)| format!("{} -> {}", from, to))
                        .collect();
                    format!("rename({})", parts.join(", "))
                }
                QueryStep::Sort(specs) => {
                    let parts: Vec<String> = specs
                        .iter()
                        .map(|spec| {
                            if spec.descending {
                                format!("{} desc", spec.column)
                            } else {
                                spec.column.clone()
                            }
                        })
                        .collect();
                    format!("sort({})", parts.join(", "))
                }
                QueryStep::Distinct(keys) => format!("distinct({})", keys.join(", ")),
                QueryStep::Limit(n) => format!("limit({})", n),
                QueryStep::Join(spec) => format!(
                    "join(on=({}, {}), how={})",
                    spec.on.0,
                    spec.on.1,
                    spec.how.name()
                ),
            });
        }

        lines.push("unwrap()".to_string());
        Ok(lines)
    }
}

fn describe_exprs(exprs: &[Expr]) -> String {
    let parts: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
    parts.join(", ")
}

fn describe_columns(columns: &[(String, Expr)]) -> String {
    let parts: Vec<String> = columns
        .iter()
        .map(|(name, expr)| format!("{} = {}", name, expr))
        .collect();
    parts.join(", ")
}

// Length-prefixed so `("ab","c")` and `("a","bc")` hash apart; a
// missing column gets its own marker.
fn distinct_key(row: &Row, keys: &[String]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut push = |value: Option<&Value>| match value {
        Some(value) => {
            out.push(1u8);
            out.extend_from_slice(&(value.raw().len() as u32).to_be_bytes());
            out.extend_from_slice(value.raw());
        }
        None => out.push(0u8),
    };
    if keys.is_empty() {
        for (_, value) in row.iter() {
            push(Some(value));
        }
    } else {
        for key in keys {
            push(row.get(key));
        }
    }
    out
}

fn join_columns(left: &[String], right: &[String], rename: &JoinRename) -> Vec<String> {
    match rename {
        JoinRename::No => {
            let mut out = left.to_vec();
            for column in right {
                if !out.iter().any(|c| c == column) {
                    out.push(column.clone());
                }
            }
            out
        }
        JoinRename::Suffix(lsuf, rsuf) => {
            let mut out = Vec::with_capacity(left.len() + right.len());
            for column in left {
                if right.iter().any(|c| c == column) {
                    out.push(format!("{}{}", column, lsuf));
                } else {
                    out.push(column.clone());
                }
            }
            for column in right {
                if left.iter().any(|c| c == column) {
                    out.push(format!("{}{}", column, rsuf));
                } else {
                    out.push(column.clone());
                }
            }
            out
        }
    }
}

fn merge_rows(
    left: &Row,
    right: Option<&Row>,
    right_cols: &[String],
    right_types: &AHashMap<String, ValueType>,
    rename: &JoinRename,
) -> Row {
    let collides = |column: &str| right_cols.iter().any(|c| c == column);
    let mut out = Row::with_capacity(left.len() + right_cols.len());

    for (column, value) in left.iter() {
        match rename {
            JoinRename::Suffix(lsuf, _) if collides(column) => {
                out.set(&format!("{}{}", column, lsuf), value.clone());
            }
            _ => out.set(column, value.clone()),
        }
    }

    let right_name = |column: &str| -> String {
        match rename {
            JoinRename::Suffix(_, rsuf) if left.contains(column) => {
                format!("{}{}", column, rsuf)
            }
            _ => column.to_string(),
        }
    };

    match right {
        Some(row) => {
            for (column, value) in row.iter() {
                out.set(&right_name(column), value.clone());
            }
        }
        None => {
            for column in right_cols {
                let vtype = right_types.get(column).copied().unwrap_or(ValueType::Int);
                out.set(&right_name(column), Value::null(vtype));
            }
        }
    }
    out
}
