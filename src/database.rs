//! Database lifecycle, table registry, and the shared context
//!
//! A database is a directory: `gertrude.conf` (versions and comment),
//! `int_id` (the id-generator cursor), and one sub-directory per table
//! under `tables/`. The [`DbContext`] bundles what every component
//! needs (path, access mode, id generator, block cache, options) and
//! is shared by `Arc` so tables, indexes, and scan cursors do not need
//! a handle back to the `Database` itself.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{BlockCache, CacheStats};
use crate::config::{self, DatabaseOptions, CONF_FILE, GERTRUDE_VERSION, SCHEMA_VERSION};
use crate::error::{GertrudeError, Result};
use crate::index::IndexOptions;
use crate::int_id::IntegerIdGenerator;
use crate::query::{Query, TableSource};
use crate::table::Table;
use crate::types::FieldSpec;

const TABLES_DIR: &str = "tables";
const INT_ID_FILE: &str = "int_id";

/// Access mode, `rw` or `ro`. Read-only mode fails every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadWrite,
    ReadOnly,
}

impl FromStr for AccessMode {
    type Err = GertrudeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rw" => Ok(AccessMode::ReadWrite),
            "ro" => Ok(AccessMode::ReadOnly),
            other => Err(GertrudeError::InvalidArgument(format!(
                "access mode {:?}, expected \"rw\" or \"ro\"",
                other
            ))),
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessMode::ReadWrite => "rw",
            AccessMode::ReadOnly => "ro",
        })
    }
}

/// Shared per-database state handed to tables and indexes.
#[derive(Debug)]
pub struct DbContext {
    path: PathBuf,
    mode: AccessMode,
    options: DatabaseOptions,
    id_gen: Mutex<IntegerIdGenerator>,
    cache: Mutex<BlockCache>,
}

impl DbContext {
    pub(crate) fn new(path: PathBuf, mode: AccessMode, options: DatabaseOptions) -> Result<Arc<Self>> {
        let id_gen = IntegerIdGenerator::open(path.join(INT_ID_FILE))?;
        let cache = BlockCache::new(options.index_cache_size);
        Ok(Arc::new(Self {
            path,
            mode,
            options,
            id_gen: Mutex::new(id_gen),
            cache: Mutex::new(cache),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    pub fn generate_id(&self) -> Result<u64> {
        self.id_gen.lock().gen_id()
    }

    pub(crate) fn cache(&self) -> MutexGuard<'_, BlockCache> {
        self.cache.lock()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    /// Fail unless the database was opened writable.
    pub fn check_writable(&self) -> Result<()> {
        match self.mode {
            AccessMode::ReadWrite => Ok(()),
            AccessMode::ReadOnly => Err(GertrudeError::ReadOnly),
        }
    }

    fn persist_ids(&self) -> Result<()> {
        self.id_gen.lock().close()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct DatabaseConf {
    schema_version: u32,
    gertrude_version: String,
    comment: String,
}

/// An open database: the table registry plus the shared context.
#[derive(Debug)]
pub struct Database {
    ctx: Arc<DbContext>,
    tables: BTreeMap<String, Table>,
    comment: String,
}

impl Database {
    /// Create a database in `path` (which must be missing or empty)
    /// and open it read-write.
    pub fn create(path: impl AsRef<Path>, options: DatabaseOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            if fs::read_dir(&path)?.next().is_some() {
                return Err(GertrudeError::AlreadyExists(path));
            }
        } else {
            fs::create_dir_all(&path)?;
        }

        let conf = DatabaseConf {
            schema_version: SCHEMA_VERSION,
            gertrude_version: GERTRUDE_VERSION.to_string(),
            comment: options.comment.clone(),
        };
        fs::write(path.join(CONF_FILE), serde_json::to_string(&conf)?)?;
        fs::create_dir(path.join(TABLES_DIR))?;

        debug!(path = %path.display(), "database created");
        let comment = options.comment.clone();
        let ctx = DbContext::new(path, AccessMode::ReadWrite, options)?;
        Ok(Self {
            ctx,
            tables: BTreeMap::new(),
            comment,
        })
    }

    /// Open an existing database with default options.
    pub fn open(path: impl AsRef<Path>, mode: AccessMode) -> Result<Self> {
        Self::open_with(path, mode, DatabaseOptions::default())
    }

    /// Open with explicit options (cache size, fanout for new indexes).
    /// A schema or crate version mismatch is fatal.
    pub fn open_with(
        path: impl AsRef<Path>,
        mode: AccessMode,
        mut options: DatabaseOptions,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_dir() {
            return Err(GertrudeError::NotInitialized(path));
        }

        let conf_path = path.join(CONF_FILE);
        if !conf_path.exists() {
            return Err(GertrudeError::NotInitialized(path));
        }
        let conf: DatabaseConf = serde_json::from_str(&fs::read_to_string(conf_path)?)?;
        if conf.schema_version != SCHEMA_VERSION {
            return Err(GertrudeError::VersionMismatch(format!(
                "schema version {} on disk, {} supported",
                conf.schema_version, SCHEMA_VERSION
            )));
        }
        if conf.gertrude_version != GERTRUDE_VERSION {
            return Err(GertrudeError::VersionMismatch(format!(
                "gertrude version {} on disk, {} running",
                conf.gertrude_version, GERTRUDE_VERSION
            )));
        }

        let tables_dir = path.join(TABLES_DIR);
        if !tables_dir.is_dir() {
            return Err(GertrudeError::NotInitialized(path));
        }

        options.comment = conf.comment.clone();
        let ctx = DbContext::new(path, mode, options)?;

        let mut tables = BTreeMap::new();
        let mut entries: Vec<_> = fs::read_dir(&tables_dir)?.collect::<std::io::Result<_>>()?;
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            if entry.file_type()?.is_dir() {
                let table = Table::load(entry.path(), Arc::clone(&ctx))?;
                tables.insert(table.name().to_string(), table);
            }
        }

        debug!(tables = tables.len(), mode = %mode, "database opened");
        Ok(Self {
            ctx,
            tables,
            comment: conf.comment,
        })
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn path(&self) -> &Path {
        self.ctx.path()
    }

    pub fn mode(&self) -> AccessMode {
        self.ctx.mode()
    }

    /// Create a table and its automatic pk/unique indexes.
    pub fn add_table(&mut self, name: &str, spec: Vec<FieldSpec>) -> Result<&Table> {
        self.ctx.check_writable()?;
        config::check_name(name)?;
        if self.tables.contains_key(name) {
            return Err(GertrudeError::TableExists(name.to_string()));
        }

        let table_path = self.ctx.path().join(TABLES_DIR).join(name);
        let table = Table::create(table_path, name, spec, Arc::clone(&self.ctx))?;
        self.tables.insert(name.to_string(), table);
        Ok(&self.tables[name])
    }

    /// Drop a table: close its indexes (invalidating cache entries) and
    /// remove the whole subtree.
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        self.ctx.check_writable()?;
        let mut table = self
            .tables
            .remove(name)
            .ok_or_else(|| GertrudeError::TableNotFound(name.to_string()))?;
        table.drop_files()
    }

    pub fn add_index(
        &mut self,
        table_name: &str,
        index_name: &str,
        column: &str,
        options: IndexOptions,
    ) -> Result<()> {
        self.ctx.check_writable()?;
        self.table_mut(table_name)?
            .add_index(index_name, column, options)?;
        Ok(())
    }

    pub fn drop_index(&mut self, table_name: &str, index_name: &str) -> Result<()> {
        self.ctx.check_writable()?;
        self.table_mut(table_name)?.drop_index(index_name)
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| GertrudeError::TableNotFound(name.to_string()))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| GertrudeError::TableNotFound(name.to_string()))
    }

    pub fn table_list(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Start a fluent query against a table.
    pub fn query(&self, table_name: &str) -> Result<Query<'_>> {
        if !self.tables.contains_key(table_name) {
            return Err(GertrudeError::TableNotFound(table_name.to_string()));
        }
        Ok(Query::new(self, table_name))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.ctx.cache_stats()
    }

    /// Persist the id cursor. Also happens best-effort on drop.
    pub fn close(self) -> Result<()> {
        self.ctx.persist_ids()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let _ = self.ctx.persist_ids();
    }
}

impl TableSource for Database {
    fn lookup_table(&self, name: &str) -> Result<&Table> {
        self.table(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{cspec, ValueType};
    use tempfile::TempDir;

    #[test]
    fn test_create_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");

        {
            let mut db = Database::create(
                &path,
                DatabaseOptions::default().with_comment("test database"),
            )
            .unwrap();
            db.add_table(
                "users",
                vec![cspec("id", ValueType::Int).pk(), cspec("name", ValueType::Str)],
            )
            .unwrap();
            db.close().unwrap();
        }

        let db = Database::open(&path, AccessMode::ReadWrite).unwrap();
        assert_eq!(db.comment(), "test database");
        assert_eq!(db.table_list(), vec!["users".to_string()]);
        let table = db.table("users").unwrap();
        assert_eq!(table.index_list(), vec!["pk_id".to_string()]);
    }

    #[test]
    fn test_create_refuses_nonempty_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("junk"), b"x").unwrap();
        let err = Database::create(dir.path(), DatabaseOptions::default()).unwrap_err();
        assert!(matches!(err, GertrudeError::AlreadyExists(_)));
    }

    #[test]
    fn test_open_missing_fails() {
        let dir = TempDir::new().unwrap();
        let err = Database::open(dir.path().join("nope"), AccessMode::ReadWrite).unwrap_err();
        assert!(matches!(err, GertrudeError::NotInitialized(_)));
    }

    #[test]
    fn test_version_mismatch_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");
        Database::create(&path, DatabaseOptions::default()).unwrap();

        let conf_path = path.join(CONF_FILE);
        let mangled = fs::read_to_string(&conf_path)
            .unwrap()
            .replace(&format!("\"{}\"", GERTRUDE_VERSION), "\"0.0.0\"");
        fs::write(&conf_path, mangled).unwrap();

        let err = Database::open(&path, AccessMode::ReadWrite).unwrap_err();
        assert!(matches!(err, GertrudeError::VersionMismatch(_)));
    }

    #[test]
    fn test_read_only_rejects_mutation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");
        {
            let mut db = Database::create(&path, DatabaseOptions::default()).unwrap();
            db.add_table("t", vec![cspec("id", ValueType::Int)]).unwrap();
        }

        let mut db = Database::open(&path, AccessMode::ReadOnly).unwrap();
        let err = db.add_table("u", vec![cspec("id", ValueType::Int)]).unwrap_err();
        assert!(matches!(err, GertrudeError::ReadOnly));
        let err = db.drop_table("t").unwrap_err();
        assert!(matches!(err, GertrudeError::ReadOnly));

        let err = db
            .table("t")
            .unwrap()
            .insert(&crate::types::record([("id", 1.into())]))
            .unwrap_err();
        assert!(matches!(err, GertrudeError::ReadOnly));
    }

    #[test]
    fn test_duplicate_and_bad_names() {
        let dir = TempDir::new().unwrap();
        let mut db = Database::create(dir.path().join("db"), DatabaseOptions::default()).unwrap();
        db.add_table("t", vec![cspec("id", ValueType::Int)]).unwrap();

        let err = db.add_table("t", vec![cspec("id", ValueType::Int)]).unwrap_err();
        assert!(matches!(err, GertrudeError::TableExists(_)));

        let err = db
            .add_table("no-dashes", vec![cspec("id", ValueType::Int)])
            .unwrap_err();
        assert!(matches!(err, GertrudeError::InvalidName(_)));
    }

    #[test]
    fn test_drop_table_removes_subtree() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");
        let mut db = Database::create(&path, DatabaseOptions::default()).unwrap();
        db.add_table("gone", vec![cspec("id", ValueType::Int).pk()])
            .unwrap();

        assert!(path.join("tables").join("gone").exists());
        db.drop_table("gone").unwrap();
        assert!(!path.join("tables").join("gone").exists());
        assert!(db.table("gone").is_err());
        assert_eq!(db.cache_stats().indexes, 0);
    }

    #[test]
    fn test_ids_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");
        let first_id = {
            let mut db = Database::create(&path, DatabaseOptions::default()).unwrap();
            db.add_table("t", vec![cspec("id", ValueType::Int)]).unwrap();
            let id = db.table("t").unwrap().id();
            db.close().unwrap();
            id
        };

        let mut db = Database::open(&path, AccessMode::ReadWrite).unwrap();
        db.add_table("u", vec![cspec("id", ValueType::Int)]).unwrap();
        assert!(db.table("u").unwrap().id() > first_id);
    }
}
