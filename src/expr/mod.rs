//! Expression AST and evaluation
//!
//! Predicates and scalar expressions are built programmatically (there
//! is no surface grammar in the library) and evaluated against typed
//! rows, producing [`Value`]s. Null handling follows SQL: arithmetic
//! and comparisons with a null operand yield null, `and`/`or` use
//! three-valued logic, `nvl` picks the first non-null argument, and a
//! `case` with no matching leg and no else yields null.

use std::cmp::Ordering;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{GertrudeError, Result};
use crate::index::scan::ScanOp;
use crate::types::{ArithOp, Row, Scalar, Value, ValueType};

/// Binary operators, grouped into arithmetic, comparison, and logical
/// categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    fn arith(self) -> Option<ArithOp> {
        match self {
            BinOp::Add => Some(ArithOp::Add),
            BinOp::Sub => Some(ArithOp::Sub),
            BinOp::Mul => Some(ArithOp::Mul),
            BinOp::Div => Some(ArithOp::Div),
            BinOp::Rem => Some(ArithOp::Rem),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "=",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}

/// Unary operators, including the string and conversion functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
    IsNull,
    Upper,
    Lower,
    ToStr,
    ToInt,
    StrLen,
}

#[derive(Debug, Clone)]
pub struct CaseLeg {
    pub when: Expr,
    pub then: Expr,
}

/// A parsed expression node.
#[derive(Debug, Clone)]
pub enum Expr {
    Column(String),
    Literal(Value),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnOp,
        arg: Box<Expr>,
    },
    Nvl(Vec<Expr>),
    InList {
        needle: Box<Expr>,
        options: Vec<Expr>,
    },
    Case {
        legs: Vec<CaseLeg>,
        default: Option<Box<Expr>>,
    },
    Between {
        arg: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },
    Substring {
        arg: Box<Expr>,
        start: Box<Expr>,
        length: Option<Box<Expr>>,
    },
    DataVar(String),
}

/// Reference a column by name.
pub fn col(name: &str) -> Expr {
    Expr::Column(name.to_string())
}

/// A literal. A bare null literal is typed as INT, matching the
/// expression engine's convention; use [`null_lit`] to pick the type.
pub fn lit(value: impl Into<Scalar>) -> Expr {
    let scalar = value.into();
    let vtype = match &scalar {
        Scalar::Int(_) => ValueType::Int,
        Scalar::Str(_) => ValueType::Str,
        Scalar::Float(_) => ValueType::Float,
        Scalar::Bool(_) => ValueType::Bool,
        Scalar::Null => ValueType::Int,
    };
    match Value::new(vtype, scalar) {
        Ok(v) => Expr::Literal(v),
        Err(_) => unreachable!("literal type derived from scalar"),
    }
}

/// A typed null literal.
pub fn null_lit(vtype: ValueType) -> Expr {
    Expr::Literal(Value::null(vtype))
}

/// An environment variable such as `current_timestamp`.
pub fn data_var(name: &str) -> Expr {
    Expr::DataVar(name.to_lowercase())
}

/// First non-null argument.
pub fn nvl(args: Vec<Expr>) -> Expr {
    Expr::Nvl(args)
}

/// `case when ... then ... [else ...] end`.
pub fn case(legs: Vec<(Expr, Expr)>, default: Option<Expr>) -> Expr {
    Expr::Case {
        legs: legs
            .into_iter()
            .map(|(when, then)| CaseLeg { when, then })
            .collect(),
        default: default.map(Box::new),
    }
}

fn bin(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn un(op: UnOp, arg: Expr) -> Expr {
    Expr::Unary {
        op,
        arg: Box::new(arg),
    }
}

impl Expr {
    pub fn eq(self, other: Expr) -> Expr {
        bin(BinOp::Eq, self, other)
    }

    pub fn ne(self, other: Expr) -> Expr {
        bin(BinOp::Ne, self, other)
    }

    pub fn lt(self, other: Expr) -> Expr {
        bin(BinOp::Lt, self, other)
    }

    pub fn le(self, other: Expr) -> Expr {
        bin(BinOp::Le, self, other)
    }

    pub fn gt(self, other: Expr) -> Expr {
        bin(BinOp::Gt, self, other)
    }

    pub fn ge(self, other: Expr) -> Expr {
        bin(BinOp::Ge, self, other)
    }

    pub fn and(self, other: Expr) -> Expr {
        bin(BinOp::And, self, other)
    }

    pub fn or(self, other: Expr) -> Expr {
        bin(BinOp::Or, self, other)
    }

    pub fn add(self, other: Expr) -> Expr {
        bin(BinOp::Add, self, other)
    }

    pub fn sub(self, other: Expr) -> Expr {
        bin(BinOp::Sub, self, other)
    }

    pub fn mul(self, other: Expr) -> Expr {
        bin(BinOp::Mul, self, other)
    }

    pub fn div(self, other: Expr) -> Expr {
        bin(BinOp::Div, self, other)
    }

    pub fn rem(self, other: Expr) -> Expr {
        bin(BinOp::Rem, self, other)
    }

    pub fn not(self) -> Expr {
        un(UnOp::Not, self)
    }

    pub fn neg(self) -> Expr {
        un(UnOp::Neg, self)
    }

    pub fn is_null(self) -> Expr {
        un(UnOp::IsNull, self)
    }

    pub fn is_not_null(self) -> Expr {
        un(UnOp::IsNull, self).not()
    }

    pub fn upper(self) -> Expr {
        un(UnOp::Upper, self)
    }

    pub fn lower(self) -> Expr {
        un(UnOp::Lower, self)
    }

    pub fn to_str(self) -> Expr {
        un(UnOp::ToStr, self)
    }

    pub fn to_int(self) -> Expr {
        un(UnOp::ToInt, self)
    }

    pub fn str_len(self) -> Expr {
        un(UnOp::StrLen, self)
    }

    pub fn in_list(self, options: Vec<Expr>) -> Expr {
        Expr::InList {
            needle: Box::new(self),
            options,
        }
    }

    pub fn not_in(self, options: Vec<Expr>) -> Expr {
        self.in_list(options).not()
    }

    pub fn between(self, low: Expr, high: Expr) -> Expr {
        Expr::Between {
            arg: Box::new(self),
            low: Box::new(low),
            high: Box::new(high),
        }
    }

    pub fn not_between(self, low: Expr, high: Expr) -> Expr {
        self.between(low, high).not()
    }

    pub fn substring(self, start: Expr, length: Option<Expr>) -> Expr {
        Expr::Substring {
            arg: Box::new(self),
            start: Box::new(start),
            length: length.map(Box::new),
        }
    }

    /// Recognize `column <op> literal` with an index-servable operator.
    /// The planner uses this to turn a leading filter into an index
    /// scan.
    pub fn as_index_probe(&self) -> Option<(&str, ScanOp, &Value)> {
        if let Expr::Binary { op, left, right } = self {
            let scan_op = match op {
                BinOp::Eq => ScanOp::Eq,
                BinOp::Lt => ScanOp::Lt,
                BinOp::Le => ScanOp::Le,
                BinOp::Gt => ScanOp::Gt,
                BinOp::Ge => ScanOp::Ge,
                _ => return None,
            };
            if let (Expr::Column(name), Expr::Literal(value)) = (left.as_ref(), right.as_ref()) {
                return Some((name, scan_op, value));
            }
        }
        None
    }

    /// Evaluate against a row.
    pub fn eval(&self, row: &Row) -> Result<Value> {
        match self {
            Expr::Column(name) => row
                .get(name)
                .cloned()
                .ok_or_else(|| GertrudeError::ColumnNotFound(name.clone())),

            Expr::Literal(value) => Ok(value.clone()),

            Expr::Binary { op, left, right } => {
                let lhs = left.eval(row)?;
                let rhs = right.eval(row)?;
                if let Some(arith) = op.arith() {
                    return lhs.arith(arith, &rhs);
                }
                match op {
                    BinOp::And => logic_and(&lhs, &rhs),
                    BinOp::Or => logic_or(&lhs, &rhs),
                    _ => compare(*op, &lhs, &rhs),
                }
            }

            Expr::Unary { op, arg } => {
                let value = arg.eval(row)?;
                eval_unary(*op, &value)
            }

            Expr::Nvl(args) => {
                if args.is_empty() {
                    return Err(GertrudeError::InvalidArgument(
                        "nvl needs at least one argument".to_string(),
                    ));
                }
                let mut last = None;
                for arg in args {
                    let value = arg.eval(row)?;
                    if !value.is_null() {
                        return Ok(value);
                    }
                    last = Some(value);
                }
                // all null: the last one keeps its type
                Ok(last.unwrap_or_else(|| Value::null(ValueType::Int)))
            }

            Expr::InList { needle, options } => {
                let target = needle.eval(row)?;
                for option in options {
                    if option.eval(row)?.raw() == target.raw() {
                        return Ok(Value::boolean(true));
                    }
                }
                Ok(Value::boolean(false))
            }

            Expr::Case { legs, default } => {
                for leg in legs {
                    if truthy(&leg.when.eval(row)?)? == Some(true) {
                        return leg.then.eval(row);
                    }
                }
                match default {
                    Some(expr) => expr.eval(row),
                    None => Ok(Value::null(ValueType::Int)),
                }
            }

            Expr::Between { arg, low, high } => {
                let value = arg.eval(row)?;
                let low = low.eval(row)?;
                let high = high.eval(row)?;
                if value.is_null() || low.is_null() || high.is_null() {
                    return Ok(Value::null(ValueType::Bool));
                }
                let above = value.compare_promoting(&low)? != Ordering::Less;
                let below = value.compare_promoting(&high)? != Ordering::Greater;
                Ok(Value::boolean(above && below))
            }

            Expr::Substring { arg, start, length } => {
                let value = arg.eval(row)?;
                let start = start.eval(row)?;
                let length = match length {
                    Some(expr) => Some(expr.eval(row)?),
                    None => None,
                };
                eval_substring(&value, &start, length.as_ref())
            }

            Expr::DataVar(name) => match name.as_str() {
                "current_timestamp" => {
                    let now = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .map_err(|e| GertrudeError::InvalidArgument(e.to_string()))?;
                    Ok(Value::int(now.as_secs() as i64))
                }
                other => Err(GertrudeError::InvalidArgument(format!(
                    "unknown data variable {}",
                    other
                ))),
            },
        }
    }
}

/// Whether a predicate value passes a filter: true passes, false and
/// null both fail, anything non-boolean is a type error.
pub(crate) fn is_true(value: &Value) -> Result<bool> {
    Ok(truthy(value)? == Some(true))
}

/// Three-valued truthiness: null stays unknown, a BOOL maps to itself,
/// anything else is a type error.
fn truthy(value: &Value) -> Result<Option<bool>> {
    if value.is_null() {
        return Ok(None);
    }
    match value.scalar() {
        Scalar::Bool(b) => Ok(Some(b)),
        other => Err(GertrudeError::TypeError(format!(
            "{} is not a condition",
            other
        ))),
    }
}

fn bool3(value: Option<bool>) -> Value {
    match value {
        Some(b) => Value::boolean(b),
        None => Value::null(ValueType::Bool),
    }
}

fn logic_and(lhs: &Value, rhs: &Value) -> Result<Value> {
    let result = match (truthy(lhs)?, truthy(rhs)?) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    };
    Ok(bool3(result))
}

fn logic_or(lhs: &Value, rhs: &Value) -> Result<Value> {
    let result = match (truthy(lhs)?, truthy(rhs)?) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    };
    Ok(bool3(result))
}

fn compare(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::null(ValueType::Bool));
    }
    let ordering = lhs.compare_promoting(rhs)?;
    let result = match op {
        BinOp::Eq => ordering == Ordering::Equal,
        BinOp::Ne => ordering != Ordering::Equal,
        BinOp::Lt => ordering == Ordering::Less,
        BinOp::Le => ordering != Ordering::Greater,
        BinOp::Gt => ordering == Ordering::Greater,
        BinOp::Ge => ordering != Ordering::Less,
        _ => unreachable!("comparison operator"),
    };
    Ok(Value::boolean(result))
}

fn eval_unary(op: UnOp, value: &Value) -> Result<Value> {
    match op {
        UnOp::IsNull => Ok(Value::boolean(value.is_null())),

        UnOp::Not => Ok(bool3(truthy(value)?.map(|b| !b))),

        UnOp::Neg => {
            if value.is_null() {
                return Ok(Value::null(value.vtype()));
            }
            match value.scalar() {
                Scalar::Int(v) => Ok(Value::int(-v)),
                Scalar::Float(v) => Ok(Value::float(-v)),
                other => Err(GertrudeError::TypeError(format!("cannot negate {}", other))),
            }
        }

        UnOp::Upper | UnOp::Lower => {
            if value.is_null() {
                return Ok(Value::null(ValueType::Str));
            }
            match value.scalar() {
                Scalar::Str(s) => Ok(Value::text(&if op == UnOp::Upper {
                    s.to_uppercase()
                } else {
                    s.to_lowercase()
                })),
                other => Err(GertrudeError::TypeError(format!("{} is not a str", other))),
            }
        }

        UnOp::ToStr => {
            if value.is_null() {
                return Ok(Value::null(ValueType::Str));
            }
            let text = match value.scalar() {
                Scalar::Str(s) => s,
                Scalar::Int(v) => v.to_string(),
                Scalar::Float(v) => v.to_string(),
                Scalar::Bool(v) => v.to_string(),
                Scalar::Null => unreachable!("null handled above"),
            };
            Ok(Value::text(&text))
        }

        UnOp::ToInt => {
            if value.is_null() {
                return Ok(Value::null(ValueType::Int));
            }
            match value.scalar() {
                Scalar::Int(v) => Ok(Value::int(v)),
                Scalar::Float(v) => Ok(Value::int(v as i64)),
                Scalar::Bool(v) => Ok(Value::int(v as i64)),
                Scalar::Str(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::int)
                    .map_err(|_| GertrudeError::TypeError(format!("cannot parse {:?} as int", s))),
                Scalar::Null => unreachable!("null handled above"),
            }
        }

        UnOp::StrLen => {
            if value.is_null() {
                return Ok(Value::null(ValueType::Int));
            }
            match value.scalar() {
                Scalar::Str(s) => Ok(Value::int(s.chars().count() as i64)),
                other => Err(GertrudeError::TypeError(format!("{} is not a str", other))),
            }
        }
    }
}

// SQL-style substring: one-based start in characters, optional length,
// out-of-range slices clamp to the string.
fn eval_substring(value: &Value, start: &Value, length: Option<&Value>) -> Result<Value> {
    if value.is_null() || start.is_null() || length.map(Value::is_null).unwrap_or(false) {
        return Ok(Value::null(ValueType::Str));
    }
    let text = match value.scalar() {
        Scalar::Str(s) => s,
        other => {
            return Err(GertrudeError::TypeError(format!(
                "{} is not a str",
                other
            )))
        }
    };
    let start = match start.scalar() {
        Scalar::Int(v) => v,
        other => {
            return Err(GertrudeError::TypeError(format!(
                "substring start {} is not an int",
                other
            )))
        }
    };
    let length = match length.map(|l| l.scalar()) {
        None => None,
        Some(Scalar::Int(v)) if v >= 0 => Some(v as usize),
        Some(Scalar::Int(_)) => Some(0),
        Some(other) => {
            return Err(GertrudeError::TypeError(format!(
                "substring length {} is not an int",
                other
            )))
        }
    };

    let chars: Vec<char> = text.chars().collect();
    let begin = (start.max(1) - 1) as usize;
    let begin = begin.min(chars.len());
    let end = match length {
        Some(len) => (begin + len).min(chars.len()),
        None => chars.len(),
    };
    Ok(Value::text(&chars[begin..end].iter().collect::<String>()))
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "{}", name),
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::Unary { op, arg } => match op {
                UnOp::Not => write!(f, "not ({})", arg),
                UnOp::Neg => write!(f, "-({})", arg),
                UnOp::IsNull => write!(f, "({}) is null", arg),
                UnOp::Upper => write!(f, "upper({})", arg),
                UnOp::Lower => write!(f, "lower({})", arg),
                UnOp::ToStr => write!(f, "to_str({})", arg),
                UnOp::ToInt => write!(f, "to_int({})", arg),
                UnOp::StrLen => write!(f, "strlen({})", arg),
            },
            Expr::Nvl(args) => {
                write!(f, "nvl(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::InList { needle, options } => {
                write!(f, "{} in (", needle)?;
                for (i, option) in options.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", option)?;
                }
                write!(f, ")")
            }
            Expr::Case { legs, default } => {
                write!(f, "case")?;
                for leg in legs {
                    write!(f, " when {} then {}", leg.when, leg.then)?;
                }
                if let Some(default) = default {
                    write!(f, " else {}", default)?;
                }
                write!(f, " end")
            }
            Expr::Between { arg, low, high } => {
                write!(f, "{} between {} and {}", arg, low, high)
            }
            Expr::Substring { arg, start, length } => match length {
                Some(length) => write!(f, "substring({}, {}, {})", arg, start, length),
                None => write!(f, "substring({}, {})", arg, start),
            },
            Expr::DataVar(name) => write!(f, "${}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[(&str, Value)]) -> Row {
        let mut row = Row::new();
        for (name, value) in fields {
            row.set(name, value.clone());
        }
        row
    }

    #[test]
    fn test_column_and_literal() {
        let r = row(&[("id", Value::int(2))]);
        assert_eq!(col("id").eval(&r).unwrap(), Value::int(2));
        assert_eq!(lit("hello").eval(&r).unwrap(), Value::text("hello"));
        assert!(col("nope").eval(&r).is_err());
    }

    #[test]
    fn test_arithmetic_and_concat() {
        let r = row(&[
            ("salary", Value::float(1000.0)),
            ("bonus", Value::float(100.0)),
            ("last", Value::text("smith")),
            ("first", Value::text("bob")),
        ]);
        assert_eq!(
            col("salary").add(col("bonus")).eval(&r).unwrap(),
            Value::float(1100.0)
        );
        assert_eq!(
            lit(10).mul(col("salary")).sub(col("bonus")).eval(&r).unwrap(),
            Value::float(9900.0)
        );
        assert_eq!(
            col("last").add(lit(", ")).add(col("first")).eval(&r).unwrap(),
            Value::text("smith, bob")
        );
    }

    #[test]
    fn test_comparisons_propagate_null() {
        let r = row(&[("age", Value::null(ValueType::Int))]);
        let out = col("age").ge(lit(21)).eval(&r).unwrap();
        assert!(out.is_null());
        assert_eq!(out.vtype(), ValueType::Bool);
    }

    #[test]
    fn test_three_valued_logic() {
        let r = row(&[("x", Value::null(ValueType::Bool))]);
        // false and null = false
        assert_eq!(
            lit(false).and(col("x")).eval(&r).unwrap(),
            Value::boolean(false)
        );
        // true or null = true
        assert_eq!(
            lit(true).or(col("x")).eval(&r).unwrap(),
            Value::boolean(true)
        );
        // true and null = null
        assert!(lit(true).and(col("x")).eval(&r).unwrap().is_null());
        // not null = null
        assert!(col("x").not().eval(&r).unwrap().is_null());
    }

    #[test]
    fn test_is_null_and_nvl() {
        let r = row(&[
            ("a", Value::null(ValueType::Int)),
            ("b", Value::int(5)),
        ]);
        assert_eq!(col("a").is_null().eval(&r).unwrap(), Value::boolean(true));
        assert_eq!(col("b").is_not_null().eval(&r).unwrap(), Value::boolean(true));
        assert_eq!(
            nvl(vec![col("a"), col("b"), lit(0)]).eval(&r).unwrap(),
            Value::int(5)
        );
        assert!(nvl(vec![col("a")]).eval(&r).unwrap().is_null());
    }

    #[test]
    fn test_in_list() {
        let r = row(&[("dept", Value::text("sales"))]);
        assert_eq!(
            col("dept")
                .in_list(vec![lit("sales"), lit("ops")])
                .eval(&r)
                .unwrap(),
            Value::boolean(true)
        );
        assert_eq!(
            col("dept")
                .not_in(vec![lit("sales"), lit("ops")])
                .eval(&r)
                .unwrap(),
            Value::boolean(false)
        );
    }

    #[test]
    fn test_between() {
        let r = row(&[("n", Value::int(5))]);
        assert_eq!(
            col("n").between(lit(1), lit(10)).eval(&r).unwrap(),
            Value::boolean(true)
        );
        assert_eq!(
            col("n").between(lit(6), lit(10)).eval(&r).unwrap(),
            Value::boolean(false)
        );
        assert_eq!(
            col("n").not_between(lit(6), lit(10)).eval(&r).unwrap(),
            Value::boolean(true)
        );

        let r = row(&[("n", Value::null(ValueType::Int))]);
        assert!(col("n").between(lit(1), lit(10)).eval(&r).unwrap().is_null());
    }

    #[test]
    fn test_string_functions() {
        let r = row(&[("name", Value::text("Bob"))]);
        assert_eq!(col("name").upper().eval(&r).unwrap(), Value::text("BOB"));
        assert_eq!(col("name").lower().eval(&r).unwrap(), Value::text("bob"));
        assert_eq!(col("name").str_len().eval(&r).unwrap(), Value::int(3));
        assert_eq!(
            col("name").substring(lit(2), None).eval(&r).unwrap(),
            Value::text("ob")
        );
        assert_eq!(
            col("name").substring(lit(1), Some(lit(2))).eval(&r).unwrap(),
            Value::text("Bo")
        );
        assert_eq!(
            col("name").substring(lit(9), None).eval(&r).unwrap(),
            Value::text("")
        );
    }

    #[test]
    fn test_conversions() {
        let r = Row::new();
        assert_eq!(lit(42).to_str().eval(&r).unwrap(), Value::text("42"));
        assert_eq!(lit(" 17 ").to_int().eval(&r).unwrap(), Value::int(17));
        assert_eq!(lit(3.9).to_int().eval(&r).unwrap(), Value::int(3));
        assert!(lit("zap").to_int().eval(&r).is_err());
    }

    #[test]
    fn test_leap_year_case_matches_boolean_form() {
        let case_expr = case(
            vec![
                (col("year").rem(lit(400)).eq(lit(0)), lit(true)),
                (col("year").rem(lit(100)).eq(lit(0)), lit(false)),
                (col("year").rem(lit(4)).eq(lit(0)), lit(true)),
            ],
            Some(lit(false)),
        );
        let bool_expr = col("year").rem(lit(400)).eq(lit(0)).or(
            col("year")
                .rem(lit(100))
                .ne(lit(0))
                .and(col("year").rem(lit(4)).eq(lit(0))),
        );

        for (year, leap) in [(2000, true), (1900, false), (2001, false), (2024, true)] {
            let r = row(&[("year", Value::int(year))]);
            assert_eq!(
                case_expr.eval(&r).unwrap(),
                Value::boolean(leap),
                "case for {}",
                year
            );
            assert_eq!(
                bool_expr.eval(&r).unwrap(),
                Value::boolean(leap),
                "boolean form for {}",
                year
            );
        }
    }

    #[test]
    fn test_case_without_else_yields_null() {
        let expr = case(vec![(lit(false), lit(1))], None);
        assert!(expr.eval(&Row::new()).unwrap().is_null());
    }

    #[test]
    fn test_data_var() {
        let out = data_var("current_timestamp").eval(&Row::new()).unwrap();
        assert_eq!(out.vtype(), ValueType::Int);
        assert!(!out.is_null());
        assert!(data_var("bogus").eval(&Row::new()).is_err());
    }

    #[test]
    fn test_index_probe_detection() {
        let expr = col("id").ge(lit(2));
        let (column, op, value) = expr.as_index_probe().unwrap();
        assert_eq!(column, "id");
        assert_eq!(op, ScanOp::Ge);
        assert_eq!(value, &Value::int(2));

        assert!(col("id").ne(lit(2)).as_index_probe().is_none());
        assert!(col("a").eq(col("b")).as_index_probe().is_none());
    }

    #[test]
    fn test_display() {
        let expr = col("id").ge(lit(2)).and(col("name").eq(lit("bob")));
        assert_eq!(expr.to_string(), "((id >= 2) and (name = 'bob'))");
    }
}
