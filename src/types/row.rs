//! Row shapes flowing through the engine
//!
//! A [`Row`] maps column names to typed [`Value`]s and preserves column
//! order (schema order for stored rows, construction order for computed
//! ones). A [`Record`] is the unwrapped form handed across the API
//! boundary, with native [`Scalar`]s in place of wrapped values.

use std::fmt;

use super::value::{Scalar, Value};

/// An ordered mapping from column name to [`Value`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    entries: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            entries: Vec::with_capacity(n),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    /// Insert or replace a column, preserving its position when it
    /// already exists.
    pub fn set(&mut self, column: &str, value: Value) {
        match self.entries.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((column.to_string(), value)),
        }
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|(name, _)| name == column)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some((name, _)) = self.entries.iter_mut().find(|(name, _)| name == from) {
            *name = to.to_string();
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, v)| (name.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Strip the value wrappers, yielding native scalars.
    pub fn unwrap(&self) -> Record {
        Record {
            entries: self
                .entries
                .iter()
                .map(|(name, v)| (name.clone(), v.scalar()))
                .collect(),
        }
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, v)?;
        }
        write!(f, "}}")
    }
}

/// An ordered mapping from column name to native [`Scalar`]: the shape
/// callers see and the shape they hand to `insert` and `delete`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    entries: Vec<(String, Scalar)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    pub fn set(&mut self, column: &str, value: impl Into<Scalar>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((column.to_string(), value)),
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.entries.iter().map(|(name, v)| (name.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Scalar)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Scalar)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, v)?;
        }
        write!(f, "}}")
    }
}

/// Build a [`Record`] from `(column, scalar)` pairs.
///
/// ```
/// use gertrude::record;
/// let r = record([("id", 1i64.into()), ("name", "bob".into())]);
/// assert_eq!(r.get("id"), Some(&1i64.into()));
/// ```
pub fn record<'a, I>(fields: I) -> Record
where
    I: IntoIterator<Item = (&'a str, Scalar)>,
{
    fields
        .into_iter()
        .map(|(name, v)| (name.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::value::ValueType;

    #[test]
    fn test_row_order_and_replace() {
        let mut row = Row::new();
        row.set("id", Value::int(1));
        row.set("name", Value::text("bob"));
        row.set("id", Value::int(2));

        let cols: Vec<_> = row.columns().collect();
        assert_eq!(cols, vec!["id", "name"]);
        assert_eq!(row.get("id"), Some(&Value::int(2)));
    }

    #[test]
    fn test_row_rename() {
        let mut row = Row::new();
        row.set("id", Value::int(1));
        row.rename("id", "id_left");
        assert!(row.get("id").is_none());
        assert_eq!(row.get("id_left"), Some(&Value::int(1)));
    }

    #[test]
    fn test_unwrap() {
        let mut row = Row::new();
        row.set("id", Value::int(1));
        row.set("note", Value::null(ValueType::Str));

        let rec = row.unwrap();
        assert_eq!(rec.get("id"), Some(&Scalar::Int(1)));
        assert_eq!(rec.get("note"), Some(&Scalar::Null));
    }

    #[test]
    fn test_record_builder() {
        let r = record([("id", 1.into()), ("name", "bob".into())]);
        assert_eq!(r.len(), 2);
        assert_eq!(r.get("name"), Some(&Scalar::Str("bob".into())));
    }
}
