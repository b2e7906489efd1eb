//! Tables: schema, row normalization, heap I/O, index fan-out
//!
//! A table directory holds a `config` file (spec + id), the sharded row
//! heap under `data/`, and one directory per index under `index/`. An
//! insert is checked against every index before the heap write, so
//! constraint violations fail before any state changes; the heap write
//! then precedes the index inserts, and a failure in between leaves an
//! orphaned heap row rather than a dangling index entry.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config;
use crate::database::DbContext;
use crate::error::{GertrudeError, Result};
use crate::index::scan::ScanOp;
use crate::index::{Index, IndexOptions};
use crate::storage::heap;
use crate::types::{FieldSpec, HeapId, Record, Row, Scalar, Value};

const CONFIG_FILE: &str = "config";
const DATA_DIR: &str = "data";
const INDEX_DIR: &str = "index";

#[derive(Serialize, Deserialize)]
struct TableConf {
    spec: Vec<FieldSpec>,
    id: u64,
}

#[derive(Debug)]
pub struct Table {
    name: String,
    path: PathBuf,
    spec: Vec<FieldSpec>,
    id: u64,
    indexes: BTreeMap<String, Index>,
    ctx: Arc<DbContext>,
    open: bool,
}

impl Table {
    pub(crate) fn create(
        path: PathBuf,
        name: &str,
        spec: Vec<FieldSpec>,
        ctx: Arc<DbContext>,
    ) -> Result<Self> {
        let spec = Self::reform_spec(name, spec)?;
        if path.exists() {
            return Err(GertrudeError::TableExists(name.to_string()));
        }

        let id = ctx.generate_id()?;
        fs::create_dir_all(&path)?;
        fs::write(
            path.join(CONFIG_FILE),
            serde_json::to_string(&TableConf {
                spec: spec.clone(),
                id,
            })?,
        )?;
        fs::create_dir(path.join(DATA_DIR))?;
        fs::create_dir(path.join(INDEX_DIR))?;

        let mut table = Self {
            name: name.to_string(),
            path,
            spec,
            id,
            indexes: BTreeMap::new(),
            ctx,
            open: true,
        };
        table.create_auto_indexes()?;
        debug!(table = %table.name, id = table.id, "table created");
        Ok(table)
    }

    pub(crate) fn load(path: PathBuf, ctx: Arc<DbContext>) -> Result<Self> {
        let conf: TableConf = serde_json::from_str(&fs::read_to_string(path.join(CONFIG_FILE))?)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| GertrudeError::Corruption(format!("bad table path {}", path.display())))?
            .to_string();

        let mut indexes = BTreeMap::new();
        let index_dir = path.join(INDEX_DIR);
        if index_dir.is_dir() {
            let mut entries: Vec<_> = fs::read_dir(&index_dir)?.collect::<std::io::Result<_>>()?;
            entries.sort_by_key(|e| e.file_name());
            for entry in entries {
                if entry.file_type()?.is_dir() {
                    let index = Index::load(entry.path(), Arc::clone(&ctx))?;
                    indexes.insert(index.name().to_string(), index);
                }
            }
        }

        Ok(Self {
            name,
            path,
            spec: conf.spec,
            id: conf.id,
            indexes,
            ctx,
            open: true,
        })
    }

    // Fill in option defaults, enforce pk implications, reject
    // duplicate or invalid column names and multiple primary keys.
    fn reform_spec(table: &str, mut spec: Vec<FieldSpec>) -> Result<Vec<FieldSpec>> {
        let mut seen = std::collections::BTreeSet::new();
        let mut pk_count = 0;
        for field in &mut spec {
            config::check_name(&field.name)?;
            if !seen.insert(field.name.clone()) {
                return Err(GertrudeError::InvalidName(format!(
                    "duplicate field name {} in table {}",
                    field.name, table
                )));
            }
            if field.options.pk {
                pk_count += 1;
                field.options.unique = true;
                field.options.nullable = false;
            }
        }
        if pk_count > 1 {
            return Err(GertrudeError::InvalidName(format!(
                "table {} has multiple primary keys",
                table
            )));
        }
        Ok(spec)
    }

    fn create_auto_indexes(&mut self) -> Result<()> {
        let auto: Vec<(String, String)> = self
            .spec
            .iter()
            .filter_map(|field| {
                if field.options.pk {
                    Some((format!("pk_{}", field.name), field.name.clone()))
                } else if field.options.unique {
                    Some((format!("unq_{}", field.name), field.name.clone()))
                } else {
                    None
                }
            })
            .collect();
        for (index_name, column) in auto {
            self.add_index(
                &index_name,
                &column,
                IndexOptions::unique().not_null(),
            )?;
        }
        Ok(())
    }

    pub(crate) fn drop_files(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        for index in self.indexes.values_mut() {
            index.close();
        }
        fs::remove_dir_all(&self.path)?;
        self.open = false;
        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(GertrudeError::Closed(format!("table {}", self.name)))
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn get_spec(&self) -> &[FieldSpec] {
        &self.spec
    }

    pub fn spec_for_column(&self, column: &str) -> Option<&FieldSpec> {
        self.spec.iter().find(|field| field.name == column)
    }

    /// Name of the single index covering `column`, if there is exactly
    /// one.
    pub fn find_index_for_column(&self, column: &str) -> Option<&str> {
        let mut matches = self
            .indexes
            .values()
            .filter(|index| index.column() == column);
        match (matches.next(), matches.next()) {
            (Some(index), None) => Some(index.name()),
            _ => None,
        }
    }

    pub fn index(&self, name: &str) -> Result<&Index> {
        self.indexes
            .get(name)
            .ok_or_else(|| GertrudeError::IndexNotFound(format!("{} on table {}", name, self.name)))
    }

    pub fn index_list(&self) -> Vec<String> {
        self.indexes.keys().cloned().collect()
    }

    /// Create an index over `column`, bulk-loaded from the existing
    /// rows.
    pub fn add_index(&mut self, index_name: &str, column: &str, options: IndexOptions) -> Result<&Index> {
        self.ctx.check_writable()?;
        self.check_open()?;
        config::check_name(index_name)?;
        if self.indexes.contains_key(index_name) {
            return Err(GertrudeError::IndexExists(format!(
                "{} on table {}",
                index_name, self.name
            )));
        }
        let field = self
            .spec_for_column(column)
            .ok_or_else(|| GertrudeError::ColumnNotFound(format!("{} in table {}", column, self.name)))?;
        let coltype = field.vtype;

        let mut entries = Vec::new();
        for item in self.data_iter()? {
            let (heap_id, row) = item?;
            let key = row.get(column).cloned().ok_or_else(|| {
                GertrudeError::Corruption(format!("row {} is missing column {}", heap_id, column))
            })?;
            entries.push((key, heap_id));
        }

        let index = Index::create(
            index_name,
            self.path.join(INDEX_DIR).join(index_name),
            column,
            coltype,
            options,
            Arc::clone(&self.ctx),
            entries,
        )?;
        self.indexes.insert(index_name.to_string(), index);
        Ok(&self.indexes[index_name])
    }

    /// Close the index (invalidating its cache entries) and remove its
    /// directory.
    pub fn drop_index(&mut self, index_name: &str) -> Result<()> {
        self.ctx.check_writable()?;
        self.check_open()?;
        let mut index = self
            .indexes
            .remove(index_name)
            .ok_or_else(|| GertrudeError::IndexNotFound(format!("{} on table {}", index_name, self.name)))?;
        index.drop_files()
    }

    // ----------------------------------------------------------------
    // Row normalization
    // ----------------------------------------------------------------

    /// Build a typed row from a user record: unknown columns are
    /// rejected, missing ones take their default (producer first, then
    /// constant), else null when nullable, else the insert fails.
    fn row_from_record(&self, record: &Record) -> Result<Row> {
        for column in record.columns() {
            if self.spec_for_column(column).is_none() {
                return Err(GertrudeError::UnknownFields(format!(
                    "{} in table {}",
                    column, self.name
                )));
            }
        }

        let mut row = Row::with_capacity(self.spec.len());
        let mut missing = Vec::new();
        for field in &self.spec {
            let scalar = match record.get(&field.name) {
                Some(scalar) => scalar.clone(),
                None => {
                    if let Some(producer) = field.options.default_fn {
                        producer()
                    } else if let Some(default) = &field.options.default {
                        default.clone()
                    } else if field.options.nullable {
                        Scalar::Null
                    } else {
                        missing.push(field.name.clone());
                        continue;
                    }
                }
            };
            row.set(&field.name, Value::new(field.vtype, scalar)?);
        }
        if !missing.is_empty() {
            return Err(GertrudeError::MissingFields(missing.join(", ")));
        }
        Ok(row)
    }

    /// Build a row from storage order (one value per spec column).
    fn row_from_values(&self, values: Vec<Value>) -> Result<Row> {
        if values.len() != self.spec.len() {
            return Err(GertrudeError::Corruption(format!(
                "row has {} values, table {} has {} columns",
                values.len(),
                self.name,
                self.spec.len()
            )));
        }
        Ok(self
            .spec
            .iter()
            .zip(values)
            .map(|(field, value)| (field.name.clone(), value))
            .collect())
    }

    fn row_to_storage(&self, row: &Row) -> Result<Vec<Value>> {
        self.spec
            .iter()
            .map(|field| {
                row.get(&field.name).cloned().ok_or_else(|| {
                    GertrudeError::ColumnNotFound(format!("{} in table {}", field.name, self.name))
                })
            })
            .collect()
    }

    // ----------------------------------------------------------------
    // Inserts and deletes
    // ----------------------------------------------------------------

    /// Insert one record. Every index constraint is checked before the
    /// heap write, so a violation leaves no trace.
    pub fn insert(&self, record: &Record) -> Result<HeapId> {
        self.ctx.check_writable()?;
        self.check_open()?;

        let row = self.row_from_record(record)?;
        for index in self.indexes.values() {
            let key = self.key_for_index(&row, index)?;
            index.test_for_insert(&key)?;
        }

        let heap_id = heap::write(&self.path.join(DATA_DIR), &self.row_to_storage(&row)?)?;
        for index in self.indexes.values() {
            let key = self.key_for_index(&row, index)?;
            index.insert(key, heap_id)?;
        }
        debug!(table = %self.name, heap_id = %heap_id, "insert");
        Ok(heap_id)
    }

    fn key_for_index(&self, row: &Row, index: &Index) -> Result<Value> {
        row.get(index.column()).cloned().ok_or_else(|| {
            GertrudeError::ColumnNotFound(format!(
                "{} for index {} in table {}",
                index.column(),
                index.name(),
                self.name
            ))
        })
    }

    /// Delete the first stored row structurally equal to the record
    /// (after normalization). Returns whether a row was removed.
    pub fn delete(&self, record: &Record) -> Result<bool> {
        self.ctx.check_writable()?;
        self.check_open()?;

        let victim = self.row_from_record(record)?;
        for item in self.data_iter()? {
            let (heap_id, row) = item?;
            if row == victim {
                heap::delete(&self.path.join(DATA_DIR), heap_id)?;
                for index in self.indexes.values() {
                    let key = self.key_for_index(&victim, index)?;
                    index.delete(&key, heap_id)?;
                }
                debug!(table = %self.name, heap_id = %heap_id, "delete");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Run a query and delete every row it yields. Returns the count
    /// actually removed. The query should project full rows.
    pub fn delete_from_query(&self, query: &crate::query::Query<'_>) -> Result<usize> {
        self.ctx.check_writable()?;
        self.check_open()?;

        let mut count = 0;
        for record in query.run()? {
            if self.delete(&record)? {
                count += 1;
            }
        }
        Ok(count)
    }

    // ----------------------------------------------------------------
    // Scans
    // ----------------------------------------------------------------

    // Heap files in shard order (stable across runs).
    fn data_paths(&self) -> Result<Vec<PathBuf>> {
        let root = self.path.join(DATA_DIR);
        let mut paths = Vec::new();
        let mut level1: Vec<_> = fs::read_dir(&root)?.collect::<std::io::Result<_>>()?;
        level1.sort_by_key(|e| e.file_name());
        for shard1 in level1 {
            if !shard1.file_type()?.is_dir() {
                continue;
            }
            let mut level2: Vec<_> = fs::read_dir(shard1.path())?.collect::<std::io::Result<_>>()?;
            level2.sort_by_key(|e| e.file_name());
            for shard2 in level2 {
                if !shard2.file_type()?.is_dir() {
                    continue;
                }
                let mut files: Vec<_> = fs::read_dir(shard2.path())?.collect::<std::io::Result<_>>()?;
                files.sort_by_key(|e| e.file_name());
                for file in files {
                    if file.file_type()?.is_file() {
                        paths.push(file.path());
                    }
                }
            }
        }
        Ok(paths)
    }

    /// Stream `(heap id, row)` pairs from the heap.
    pub(crate) fn data_iter(
        &self,
    ) -> Result<impl Iterator<Item = Result<(HeapId, Row)>> + '_> {
        self.check_open()?;
        let paths = self.data_paths()?;
        let data_root = self.path.join(DATA_DIR);
        Ok(paths.into_iter().map(move |path| {
            let heap_id = HeapId::from_path(&path)?;
            let values = heap::read(&data_root, heap_id)?.ok_or_else(|| {
                GertrudeError::Corruption(format!("heap row {} vanished mid-scan", heap_id))
            })?;
            Ok((heap_id, self.row_from_values(values)?))
        }))
    }

    /// Stream every row as a typed [`Row`].
    pub fn scan_rows(&self) -> Result<impl Iterator<Item = Result<Row>> + '_> {
        Ok(self.data_iter()?.map(|item| item.map(|(_, row)| row)))
    }

    /// Stream every row unwrapped to native scalars.
    pub fn scan(&self) -> Result<impl Iterator<Item = Result<Record>> + '_> {
        Ok(self.scan_rows()?.map(|row| row.map(|r| r.unwrap())))
    }

    /// Stream rows through an index in ascending key order, optionally
    /// bounded by `key` and an operator (`=`, `<`, `<=`, `>`, `>=` or
    /// their word forms).
    pub fn index_scan_rows(
        &self,
        name: &str,
        key: Option<Scalar>,
        op: Option<&str>,
    ) -> Result<impl Iterator<Item = Result<Row>> + '_> {
        self.check_open()?;
        let index = self.index(name)?;
        let op = op.map(ScanOp::from_str).transpose()?;
        let key = key
            .map(|scalar| Value::new(index.coltype(), scalar))
            .transpose()?;

        let scan = index.scan(key, op)?;
        let data_root = self.path.join(DATA_DIR);
        Ok(scan.map(move |item| {
            let heap_id = item?;
            let values = heap::read(&data_root, heap_id)?.ok_or_else(|| {
                GertrudeError::Corruption(format!("heap row {} missing for index entry", heap_id))
            })?;
            self.row_from_values(values)
        }))
    }

    /// Like [`Table::index_scan_rows`] but unwrapped.
    pub fn index_scan(
        &self,
        name: &str,
        key: Option<Scalar>,
        op: Option<&str>,
    ) -> Result<impl Iterator<Item = Result<Record>> + '_> {
        Ok(self
            .index_scan_rows(name, key, op)?
            .map(|row| row.map(|r| r.unwrap())))
    }

    /// Print the structure of an index tree to stdout.
    pub fn print_index(&self, name: &str) -> Result<()> {
        print!("{}", self.index(name)?.dump()?);
        Ok(())
    }
}
