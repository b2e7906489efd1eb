//! Monotonic integer id generator with a persisted cursor
//!
//! Ids number tables, indexes, and index nodes. The cursor file is only
//! rewritten every `SAVE_INTERVAL` ids (and on close), so a crash can
//! lose at most one interval of cursor updates; reopening skips two
//! intervals past the persisted cursor to stay clear of any ids handed
//! out but never recorded.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Ids handed out between cursor writes.
pub const SAVE_INTERVAL: u64 = 10;

#[derive(Debug, Serialize, Deserialize)]
struct IdCursor {
    id: u64,
}

#[derive(Debug)]
pub struct IntegerIdGenerator {
    id: u64,
    count: u64,
    on_first: bool,
    cursor_path: PathBuf,
}

impl IntegerIdGenerator {
    /// Open against a cursor file, creating the counter at zero when
    /// the file does not exist yet.
    pub fn open(cursor_path: PathBuf) -> Result<Self> {
        let id = if cursor_path.exists() {
            let cursor: IdCursor = bincode::deserialize(&fs::read(&cursor_path)?)?;
            cursor.id + 2 * SAVE_INTERVAL
        } else {
            0
        };
        Ok(Self {
            id,
            count: 0,
            on_first: true,
            cursor_path,
        })
    }

    /// Next id, persisting the cursor on the first call and then every
    /// `SAVE_INTERVAL` calls.
    pub fn gen_id(&mut self) -> Result<u64> {
        self.count += 1;
        self.id += 1;
        if self.count == SAVE_INTERVAL || self.on_first {
            self.count = 0;
            self.persist()?;
            self.on_first = false;
        }
        Ok(self.id)
    }

    /// Persist the exact cursor position.
    pub fn close(&mut self) -> Result<()> {
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        fs::write(&self.cursor_path, bincode::serialize(&IdCursor { id: self.id })?)?;
        Ok(())
    }
}
