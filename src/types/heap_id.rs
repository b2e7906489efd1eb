//! Opaque 64-bit heap identifiers with deterministic path sharding

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rand::Rng;

use crate::error::{GertrudeError, Result};

/// Digits sampled when generating a new id. Zero is excluded so every
/// generated id uses all sixteen text positions.
const HEAP_ID_ALPHABET: &[u8] = b"123456789ABCDEF";

/// Length of the canonical hex form.
const HEAP_ID_LENGTH: usize = 16;

/// A 64-bit identifier addressing one row blob in a table heap.
///
/// The canonical text form is sixteen uppercase hex digits; the path
/// form shards on the first two digit pairs (`XX/YY/ZZZZZZZZZZZZ`) to
/// keep directories shallow and balanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(u64);

impl HeapId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Sample a fresh id from the digit alphabet. Collision handling is
    /// the caller's job (the heap retries until the path is unused).
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut id: u64 = 0;
        for _ in 0..HEAP_ID_LENGTH {
            let digit = HEAP_ID_ALPHABET[rng.gen_range(0..HEAP_ID_ALPHABET.len())];
            let nibble = match digit {
                b'0'..=b'9' => digit - b'0',
                _ => digit - b'A' + 10,
            };
            id = (id << 4) | u64::from(nibble);
        }
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn to_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }

    /// Relative path of the row blob under its heap root.
    pub fn to_path(self) -> PathBuf {
        let s = self.to_string();
        PathBuf::from(&s[0..2]).join(&s[2..4]).join(&s[4..])
    }

    /// Recover the id from a sharded path (the last three components).
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut parts = Vec::with_capacity(3);
        for component in path.iter().rev().take(3) {
            parts.push(component.to_str().ok_or_else(|| {
                GertrudeError::Corruption(format!("non-utf8 heap path {}", path.display()))
            })?);
        }
        if parts.len() != 3 {
            return Err(GertrudeError::Corruption(format!(
                "heap path too short: {}",
                path.display()
            )));
        }
        parts.reverse();
        parts.concat().parse()
    }
}

impl fmt::Display for HeapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

impl FromStr for HeapId {
    type Err = GertrudeError;

    fn from_str(s: &str) -> Result<Self> {
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| GertrudeError::Corruption(format!("bad heap id {:?}", s)))
    }
}

impl From<u64> for HeapId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
