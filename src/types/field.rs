//! Column specifications

use serde::{Deserialize, Serialize};

use super::value::{Scalar, ValueType};

/// A zero-argument producer for column defaults. Producers are
/// process-local: they are not written to the table config, so a table
/// reopened from disk sees only constant defaults.
pub type DefaultFn = fn() -> Scalar;

/// Per-column options. `pk` implies `unique` and non-nullable once the
/// table normalizes its spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldOptions {
    pub pk: bool,
    pub unique: bool,
    pub nullable: bool,
    pub default: Option<Scalar>,
    #[serde(skip)]
    pub default_fn: Option<DefaultFn>,
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self {
            pk: false,
            unique: false,
            nullable: true,
            default: None,
            default_fn: None,
        }
    }
}

/// One column of a table schema: name, type, options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub vtype: ValueType,
    #[serde(default)]
    pub options: FieldOptions,
}

impl FieldSpec {
    pub fn new(name: &str, vtype: ValueType) -> Self {
        Self {
            name: name.to_string(),
            vtype,
            options: FieldOptions::default(),
        }
    }

    /// Mark as primary key (forces unique and non-nullable).
    pub fn pk(mut self) -> Self {
        self.options.pk = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.options.unique = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.options.nullable = false;
        self
    }

    /// Constant default, used when an insert omits the column.
    pub fn default_value(mut self, value: impl Into<Scalar>) -> Self {
        self.options.default = Some(value.into());
        self
    }

    /// Producer default, evaluated per insert. Takes precedence over a
    /// constant default. Not persisted.
    pub fn default_fn(mut self, producer: DefaultFn) -> Self {
        self.options.default_fn = Some(producer);
        self
    }
}

/// Shorthand for [`FieldSpec::new`].
pub fn cspec(name: &str, vtype: ValueType) -> FieldSpec {
    FieldSpec::new(name, vtype)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let spec = cspec("id", ValueType::Int).pk();
        assert!(spec.options.pk);
        assert!(spec.options.nullable); // normalized later by the table

        let spec = cspec("email", ValueType::Str).unique().not_null();
        assert!(spec.options.unique);
        assert!(!spec.options.nullable);
    }

    #[test]
    fn test_config_round_trip() {
        let spec = cspec("qty", ValueType::Int).default_value(0);
        let json = serde_json::to_string(&spec).unwrap();
        let back: FieldSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
        assert_eq!(back.options.default, Some(Scalar::Int(0)));
    }

    #[test]
    fn test_producer_not_persisted() {
        fn now() -> Scalar {
            Scalar::Int(0)
        }
        let spec = cspec("stamp", ValueType::Int).default_fn(now);
        let json = serde_json::to_string(&spec).unwrap();
        let back: FieldSpec = serde_json::from_str(&json).unwrap();
        assert!(back.options.default_fn.is_none());
    }
}
