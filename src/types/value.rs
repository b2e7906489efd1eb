//! Typed, nullable, order-preserving value codec
//!
//! A [`Value`] is a scalar tagged with one of four types, stored in its
//! canonical encoded form. The encoding is designed so that for two
//! non-null values of the same type, comparing the encoded bytes
//! lexicographically gives the same answer as comparing the decoded
//! values. That property is what lets the B+Tree index and the scan
//! cursor work on raw bytes without decoding keys.
//!
//! Layout: one header byte, then the payload.
//!
//! ```text
//! header:  1 1 t t t t 0 n     (marker bits, 4-bit type code, not-null flag)
//! payload: INT    8 bytes big-endian, sign bit flipped
//!          FLOAT  8 bytes big-endian, total-order normalized
//!          BOOL   1 byte
//!          STR    raw UTF-8, no length prefix
//!          null   empty
//! ```
//!
//! Strings carry no length prefix so that byte comparison equals string
//! comparison. Numeric payloads are bit-adjusted because plain
//! two's-complement and IEEE-754 big-endian bytes order negatives after
//! positives.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GertrudeError, Result};

const HEADER_FLAG: u8 = 0b1100_0000;
const TYPE_MASK: u8 = 0b0011_1100;
const NULL_MASK: u8 = 0b0000_0001;

const SIGN_BIT: u64 = 1 << 63;

/// The four storable scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Int,
    Str,
    Float,
    Bool,
}

impl ValueType {
    /// Numeric code used in the encoded header.
    pub fn code(self) -> u8 {
        match self {
            ValueType::Int => 1,
            ValueType::Str => 2,
            ValueType::Float => 3,
            ValueType::Bool => 4,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(ValueType::Int),
            2 => Ok(ValueType::Str),
            3 => Ok(ValueType::Float),
            4 => Ok(ValueType::Bool),
            other => Err(GertrudeError::InvalidType(format!("type code {}", other))),
        }
    }

    /// Tag used in config files.
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Str => "str",
            ValueType::Float => "float",
            ValueType::Bool => "bool",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "int" => Ok(ValueType::Int),
            "str" => Ok(ValueType::Str),
            "float" => Ok(ValueType::Float),
            "bool" => Ok(ValueType::Bool),
            other => Err(GertrudeError::InvalidType(other.to_string())),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An unwrapped native scalar, as seen at the API boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Str(String),
    Float(f64),
    Bool(bool),
    Null,
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(v as i64)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Str(v) => write!(f, "'{}'", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Bool(v) => write!(f, "{}", v),
            Scalar::Null => write!(f, "null"),
        }
    }
}

/// A typed, nullable scalar in canonical encoded form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Value {
    raw: Vec<u8>,
}

impl Value {
    /// Construct from a type tag and an unwrapped scalar.
    ///
    /// The scalar must match the type; the single allowed coercion is
    /// an integer into a float column.
    pub fn new(vtype: ValueType, scalar: Scalar) -> Result<Self> {
        let payload = match (&scalar, vtype) {
            (Scalar::Null, _) => Vec::new(),
            (Scalar::Int(v), ValueType::Int) => encode_int(*v),
            (Scalar::Int(v), ValueType::Float) => encode_float(*v as f64),
            (Scalar::Float(v), ValueType::Float) => encode_float(*v),
            (Scalar::Str(v), ValueType::Str) => v.as_bytes().to_vec(),
            (Scalar::Bool(v), ValueType::Bool) => vec![*v as u8],
            (other, vtype) => {
                return Err(GertrudeError::TypeError(format!(
                    "cannot store {} as {}",
                    other, vtype
                )))
            }
        };

        let header = HEADER_FLAG | (vtype.code() << 2) | u8::from(!scalar.is_null());
        let mut raw = Vec::with_capacity(1 + payload.len());
        raw.push(header);
        raw.extend_from_slice(&payload);
        Ok(Self { raw })
    }

    pub fn int(v: i64) -> Self {
        Self::known(ValueType::Int, Scalar::Int(v))
    }

    pub fn float(v: f64) -> Self {
        Self::known(ValueType::Float, Scalar::Float(v))
    }

    pub fn text(v: &str) -> Self {
        Self::known(ValueType::Str, Scalar::Str(v.to_string()))
    }

    pub fn boolean(v: bool) -> Self {
        Self::known(ValueType::Bool, Scalar::Bool(v))
    }

    /// The null of a given type. Orders before every non-null value of
    /// that type; used as the internal-node sentinel key.
    pub fn null(vtype: ValueType) -> Self {
        Self::known(vtype, Scalar::Null)
    }

    // Constructors above pass pre-matched (type, scalar) pairs.
    fn known(vtype: ValueType, scalar: Scalar) -> Self {
        match Self::new(vtype, scalar) {
            Ok(v) => v,
            Err(_) => unreachable!("constructor type mismatch"),
        }
    }

    /// Rehydrate from encoded bytes, validating header and payload shape.
    pub fn from_raw(raw: Vec<u8>) -> Result<Self> {
        if raw.is_empty() {
            return Err(GertrudeError::Corruption("empty value".to_string()));
        }
        let header = raw[0];
        if header & HEADER_FLAG != HEADER_FLAG {
            return Err(GertrudeError::Corruption(format!(
                "bad value header {:#04x}",
                header
            )));
        }
        let vtype = ValueType::from_code((header & TYPE_MASK) >> 2)
            .map_err(|_| GertrudeError::Corruption(format!("bad value header {:#04x}", header)))?;
        let payload = &raw[1..];
        let is_null = header & NULL_MASK == 0;
        let want = match (is_null, vtype) {
            (true, _) => payload.is_empty(),
            (false, ValueType::Int) | (false, ValueType::Float) => payload.len() == 8,
            (false, ValueType::Bool) => payload.len() == 1,
            (false, ValueType::Str) => std::str::from_utf8(payload).is_ok(),
        };
        if !want {
            return Err(GertrudeError::Corruption(format!(
                "bad {} payload of {} bytes",
                vtype,
                payload.len()
            )));
        }
        Ok(Self { raw })
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.raw
    }

    pub fn vtype(&self) -> ValueType {
        // Validated at construction.
        match ValueType::from_code((self.raw[0] & TYPE_MASK) >> 2) {
            Ok(t) => t,
            Err(_) => unreachable!("value header validated on construction"),
        }
    }

    pub fn is_null(&self) -> bool {
        self.raw[0] & NULL_MASK == 0
    }

    /// Decode back to the native scalar.
    pub fn scalar(&self) -> Scalar {
        if self.is_null() {
            return Scalar::Null;
        }
        let payload = &self.raw[1..];
        match self.vtype() {
            ValueType::Int => Scalar::Int(decode_int(payload)),
            ValueType::Float => Scalar::Float(decode_float(payload)),
            ValueType::Bool => Scalar::Bool(payload[0] != 0),
            ValueType::Str => Scalar::Str(String::from_utf8_lossy(payload).into_owned()),
        }
    }

    pub fn as_int(&self) -> Result<Option<i64>> {
        match self.scalar() {
            Scalar::Null => Ok(None),
            Scalar::Int(v) => Ok(Some(v)),
            other => Err(GertrudeError::TypeError(format!("{} is not an int", other))),
        }
    }

    pub fn as_str(&self) -> Result<Option<String>> {
        match self.scalar() {
            Scalar::Null => Ok(None),
            Scalar::Str(v) => Ok(Some(v)),
            other => Err(GertrudeError::TypeError(format!("{} is not a str", other))),
        }
    }

    pub fn as_float(&self) -> Result<Option<f64>> {
        match self.scalar() {
            Scalar::Null => Ok(None),
            Scalar::Float(v) => Ok(Some(v)),
            Scalar::Int(v) => Ok(Some(v as f64)),
            other => Err(GertrudeError::TypeError(format!("{} is not a float", other))),
        }
    }

    pub fn as_bool(&self) -> Result<Option<bool>> {
        match self.scalar() {
            Scalar::Null => Ok(None),
            Scalar::Bool(v) => Ok(Some(v)),
            other => Err(GertrudeError::TypeError(format!("{} is not a bool", other))),
        }
    }

    /// Compare two values of the same type. The encoding makes this a
    /// plain byte comparison; nulls order first.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        if self.vtype() != other.vtype() {
            return Err(GertrudeError::TypeError(format!(
                "cannot compare {} with {}",
                self.vtype(),
                other.vtype()
            )));
        }
        Ok(self.raw.cmp(&other.raw))
    }

    /// Binary arithmetic with null propagation: a null operand yields
    /// the null of the left-hand type. INT op INT stays INT except for
    /// division, which follows true division into FLOAT; mixed numeric
    /// operands promote to FLOAT; `+` concatenates strings.
    pub fn arith(&self, op: ArithOp, other: &Value) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::null(self.vtype()));
        }
        match (self.scalar(), other.scalar()) {
            (Scalar::Int(a), Scalar::Int(b)) => match op {
                ArithOp::Add => Ok(Value::int(a.wrapping_add(b))),
                ArithOp::Sub => Ok(Value::int(a.wrapping_sub(b))),
                ArithOp::Mul => Ok(Value::int(a.wrapping_mul(b))),
                ArithOp::Div => {
                    if b == 0 {
                        Err(GertrudeError::TypeError("division by zero".to_string()))
                    } else {
                        Ok(Value::float(a as f64 / b as f64))
                    }
                }
                ArithOp::Rem => {
                    if b == 0 {
                        Err(GertrudeError::TypeError("division by zero".to_string()))
                    } else {
                        Ok(Value::int(a.rem_euclid(b)))
                    }
                }
            },
            (Scalar::Str(a), Scalar::Str(b)) if op == ArithOp::Add => {
                Ok(Value::text(&format!("{}{}", a, b)))
            }
            (a, b) => {
                let (x, y) = match (numeric(&a), numeric(&b)) {
                    (Some(x), Some(y)) => (x, y),
                    _ => {
                        return Err(GertrudeError::TypeError(format!(
                            "cannot apply {} to {} and {}",
                            op, a, b
                        )))
                    }
                };
                let result = match op {
                    ArithOp::Add => x + y,
                    ArithOp::Sub => x - y,
                    ArithOp::Mul => x * y,
                    ArithOp::Div => x / y,
                    ArithOp::Rem => x % y,
                };
                Ok(Value::float(result))
            }
        }
    }

    /// Comparison for the expression engine: same-type byte order, with
    /// INT and FLOAT additionally comparable through promotion. Callers
    /// handle nulls before getting here.
    pub fn compare_promoting(&self, other: &Value) -> Result<Ordering> {
        if self.vtype() == other.vtype() {
            return self.compare(other);
        }
        match (self.scalar(), other.scalar()) {
            (a, b) => match (numeric(&a), numeric(&b)) {
                (Some(x), Some(y)) => x.partial_cmp(&y).ok_or_else(|| {
                    GertrudeError::TypeError("unordered float comparison".to_string())
                }),
                _ => Err(GertrudeError::TypeError(format!(
                    "cannot compare {} with {}",
                    self.vtype(),
                    other.vtype()
                ))),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.scalar())
    }
}

/// Arithmetic operators understood by [`Value::arith`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
        };
        f.write_str(s)
    }
}

fn numeric(s: &Scalar) -> Option<f64> {
    match s {
        Scalar::Int(v) => Some(*v as f64),
        Scalar::Float(v) => Some(*v),
        _ => None,
    }
}

// Sign-flip so that byte order equals numeric order across the full
// signed range.
fn encode_int(v: i64) -> Vec<u8> {
    ((v as u64) ^ SIGN_BIT).to_be_bytes().to_vec()
}

fn decode_int(payload: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(payload);
    (u64::from_be_bytes(buf) ^ SIGN_BIT) as i64
}

// IEEE-754 total-order normalization: non-negative floats get the sign
// bit flipped, negative floats get all bits inverted.
fn encode_float(v: f64) -> Vec<u8> {
    let bits = v.to_bits();
    let adjusted = if bits & SIGN_BIT == 0 {
        bits ^ SIGN_BIT
    } else {
        !bits
    };
    adjusted.to_be_bytes().to_vec()
}

fn decode_float(payload: &[u8]) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(payload);
    let adjusted = u64::from_be_bytes(buf);
    let bits = if adjusted & SIGN_BIT != 0 {
        adjusted ^ SIGN_BIT
    } else {
        !adjusted
    };
    f64::from_bits(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for v in [0i64, 1, -1, 42, i64::MIN, i64::MAX] {
            assert_eq!(Value::int(v).scalar(), Scalar::Int(v));
        }
        for v in [0.0f64, -0.5, 3.25, -1e300, 1e300] {
            assert_eq!(Value::float(v).scalar(), Scalar::Float(v));
        }
        for s in ["", "bob", "naïve", "多字节"] {
            assert_eq!(Value::text(s).scalar(), Scalar::Str(s.to_string()));
        }
        assert_eq!(Value::boolean(true).scalar(), Scalar::Bool(true));
        assert_eq!(Value::null(ValueType::Str).scalar(), Scalar::Null);
    }

    #[test]
    fn test_from_raw_round_trip() {
        let v = Value::text("charlie");
        let again = Value::from_raw(v.raw().to_vec()).unwrap();
        assert_eq!(v, again);
        assert_eq!(again.vtype(), ValueType::Str);
    }

    #[test]
    fn test_raw_order_matches_native_order_ints() {
        let samples = [i64::MIN, -1000, -1, 0, 1, 7, 1000, i64::MAX];
        for a in samples {
            for b in samples {
                let va = Value::int(a);
                let vb = Value::int(b);
                assert_eq!(va.raw().cmp(vb.raw()), a.cmp(&b), "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_raw_order_matches_native_order_floats() {
        let samples = [-1e12, -2.5, -0.0, 0.0, 0.25, 2.5, 1e12];
        for a in samples {
            for b in samples {
                let va = Value::float(a);
                let vb = Value::float(b);
                if a < b {
                    assert!(va.raw() < vb.raw(), "{} vs {}", a, b);
                }
                if a > b {
                    assert!(va.raw() > vb.raw(), "{} vs {}", a, b);
                }
            }
        }
    }

    #[test]
    fn test_string_and_bool_order() {
        assert!(Value::text("alice").raw() < Value::text("bob").raw());
        assert!(Value::text("bob").raw() < Value::text("bobby").raw());
        assert!(Value::boolean(false).raw() < Value::boolean(true).raw());
    }

    #[test]
    fn test_null_orders_first() {
        assert!(Value::null(ValueType::Int).raw() < Value::int(i64::MIN).raw());
        assert!(Value::null(ValueType::Str).raw() < Value::text("").raw());
    }

    #[test]
    fn test_cross_type_compare_fails() {
        let r = Value::int(1).compare(&Value::text("1"));
        assert!(matches!(r, Err(GertrudeError::TypeError(_))));
    }

    #[test]
    fn test_arith_null_propagation() {
        let n = Value::null(ValueType::Int);
        let out = Value::int(5).arith(ArithOp::Add, &n).unwrap();
        assert!(out.is_null());
        assert_eq!(out.vtype(), ValueType::Int);

        let out = n.arith(ArithOp::Mul, &Value::int(3)).unwrap();
        assert!(out.is_null());
    }

    #[test]
    fn test_arith_promotion() {
        let out = Value::int(10).arith(ArithOp::Mul, &Value::float(2.5)).unwrap();
        assert_eq!(out.scalar(), Scalar::Float(25.0));

        // true division
        let out = Value::int(7).arith(ArithOp::Div, &Value::int(2)).unwrap();
        assert_eq!(out.scalar(), Scalar::Float(3.5));

        let out = Value::int(7).arith(ArithOp::Rem, &Value::int(4)).unwrap();
        assert_eq!(out.scalar(), Scalar::Int(3));
    }

    #[test]
    fn test_string_concat() {
        let out = Value::text("smith")
            .arith(ArithOp::Add, &Value::text(", bob"))
            .unwrap();
        assert_eq!(out.scalar(), Scalar::Str("smith, bob".to_string()));
    }

    #[test]
    fn test_float_column_accepts_int() {
        let v = Value::new(ValueType::Float, Scalar::Int(3)).unwrap();
        assert_eq!(v.scalar(), Scalar::Float(3.0));
    }

    #[test]
    fn test_corrupt_raw_rejected() {
        assert!(Value::from_raw(vec![]).is_err());
        assert!(Value::from_raw(vec![0x00]).is_err());
        // int header with a short payload
        assert!(Value::from_raw(vec![HEADER_FLAG | (1 << 2) | 1, 0, 1]).is_err());
    }
}
