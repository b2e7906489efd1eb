//! Database-level configuration and identifier validation

use crate::error::{GertrudeError, Result};
use serde::{Deserialize, Serialize};

/// On-disk schema version. Bumped when the layout of config files,
/// heap blobs, or node blocks changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

/// Crate version recorded in `gertrude.conf` at create time and
/// checked on open.
pub const GERTRUDE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the database configuration file.
pub const CONF_FILE: &str = "gertrude.conf";

/// Database options, fixed at create time.
///
/// `index_fanout` is pinned into each index's own config when the index
/// is created; changing it later only affects new indexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseOptions {
    /// Maximum entries per index node before a split (default 80).
    pub index_fanout: usize,

    /// Block cache capacity in nodes, shared by all indexes (default 128).
    pub index_cache_size: usize,

    /// Free-form comment stored in `gertrude.conf`.
    pub comment: String,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            index_fanout: 80,
            index_cache_size: 128,
            comment: String::new(),
        }
    }
}

impl DatabaseOptions {
    pub fn with_fanout(mut self, fanout: usize) -> Self {
        self.index_fanout = fanout;
        self
    }

    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.index_cache_size = size;
        self
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }
}

/// Table and index names must match `^[A-Za-z_][A-Za-z0-9_]*$`.
pub fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate `name` or fail with the offending string.
pub fn check_name(name: &str) -> Result<()> {
    if valid_name(name) {
        Ok(())
    } else {
        Err(GertrudeError::InvalidName(name.to_string()))
    }
}
