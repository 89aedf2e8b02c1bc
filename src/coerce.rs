//! Type coercion from loosely-typed record values to test parameters.
//!
//! Record sources hand over values that may be text, numbers or booleans
//! depending on where they came from. Test constructors pull each field
//! through [`coerce`] (optional, with a default) or [`require`] (mandatory).
//! An absent value takes the default verbatim; a present value is converted
//! or rejected, never replaced.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{AntError, Result};

/// One loosely-typed field value as delivered by a record source.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Bool(b) => write!(f, "{}", b),
            RawValue::Int(i) => write!(f, "{}", i),
            RawValue::Float(x) => write!(f, "{}", x),
            RawValue::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<i64> for RawValue {
    fn from(i: i64) -> Self {
        RawValue::Int(i)
    }
}

impl From<f64> for RawValue {
    fn from(x: f64) -> Self {
        RawValue::Float(x)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Bool(b)
    }
}

/// A named set of raw values making up one test definition.
///
/// A missing key is "absent". Sources must not store empty strings; they
/// drop the key instead (see `import::csv`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<RawValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<RawValue>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.fields.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A parameter type that raw values can be coerced into.
pub trait Coerce: Sized {
    /// Name of the target type, used in error messages.
    const TARGET: &'static str;

    /// Convert a present raw value, or `None` if it is not convertible.
    fn from_raw(raw: &RawValue) -> Option<Self>;
}

/// Coerce an optional field, using `default` only when the value is absent.
pub fn coerce<T: Coerce>(field: &str, raw: Option<&RawValue>, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(value) => convert(field, value),
    }
}

/// Coerce a mandatory field. Absence is an `InvalidParameter`.
pub fn require<T: Coerce>(field: &str, raw: Option<&RawValue>) -> Result<T> {
    match raw {
        None => Err(AntError::InvalidParameter {
            field: field.to_string(),
            value: "<absent>".to_string(),
            target: T::TARGET,
        }),
        Some(value) => convert(field, value),
    }
}

fn convert<T: Coerce>(field: &str, value: &RawValue) -> Result<T> {
    T::from_raw(value).ok_or_else(|| AntError::InvalidParameter {
        field: field.to_string(),
        value: value.to_string(),
        target: T::TARGET,
    })
}

impl Coerce for i64 {
    const TARGET: &'static str = "integer";

    fn from_raw(raw: &RawValue) -> Option<Self> {
        match raw {
            RawValue::Int(i) => Some(*i),
            RawValue::Float(x) if x.fract() == 0.0 && x.abs() < i64::MAX as f64 => Some(*x as i64),
            RawValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl Coerce for u64 {
    const TARGET: &'static str = "unsigned integer";

    fn from_raw(raw: &RawValue) -> Option<Self> {
        i64::from_raw(raw).and_then(|i| u64::try_from(i).ok())
    }
}

impl Coerce for u32 {
    const TARGET: &'static str = "unsigned integer";

    fn from_raw(raw: &RawValue) -> Option<Self> {
        i64::from_raw(raw).and_then(|i| u32::try_from(i).ok())
    }
}

impl Coerce for f64 {
    const TARGET: &'static str = "float";

    fn from_raw(raw: &RawValue) -> Option<Self> {
        match raw {
            RawValue::Float(x) if x.is_finite() => Some(*x),
            RawValue::Int(i) => Some(*i as f64),
            RawValue::Text(s) => s.trim().parse::<f64>().ok().filter(|x| x.is_finite()),
            _ => None,
        }
    }
}

impl Coerce for bool {
    const TARGET: &'static str = "boolean";

    fn from_raw(raw: &RawValue) -> Option<Self> {
        match raw {
            RawValue::Bool(b) => Some(*b),
            // Only the two literals count; a non-empty string is not "truthy".
            RawValue::Text(s) if s.trim().eq_ignore_ascii_case("true") => Some(true),
            RawValue::Text(s) if s.trim().eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }
}

impl Coerce for String {
    const TARGET: &'static str = "string";

    fn from_raw(raw: &RawValue) -> Option<Self> {
        match raw {
            RawValue::Text(s) => Some(s.trim().to_string()),
            RawValue::Int(i) => Some(i.to_string()),
            RawValue::Float(x) => Some(x.to_string()),
            RawValue::Bool(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.to_string())
    }

    #[test]
    fn test_bool_literals_any_case() {
        for s in ["true", "TRUE", "True"] {
            assert!(coerce::<bool>("privileged", Some(&text(s)), false).unwrap());
        }
        for s in ["false", "FALSE", "False"] {
            assert!(!coerce::<bool>("privileged", Some(&text(s)), true).unwrap());
        }
    }

    #[test]
    fn test_bool_rejects_other_strings() {
        for s in ["maybe", "yes", "1", "f"] {
            let err = coerce::<bool>("privileged", Some(&text(s)), false).unwrap_err();
            match err {
                AntError::InvalidParameter { field, target, .. } => {
                    assert_eq!(field, "privileged");
                    assert_eq!(target, "boolean");
                }
                other => panic!("unexpected error: {other}"),
            }
        }
        assert!(coerce::<bool>("privileged", Some(&RawValue::Int(1)), false).is_err());
    }

    #[test]
    fn test_absent_yields_default_verbatim() {
        assert_eq!(coerce::<u32>("count", None, 0).unwrap(), 0);
        assert_eq!(coerce::<f64>("interval", None, 0.0).unwrap(), 0.0);
        assert!(!coerce::<bool>("privileged", None, false).unwrap());
        assert_eq!(coerce::<u32>("count", None, 5).unwrap(), 5);
    }

    #[test]
    fn test_explicit_zero_and_false_are_kept() {
        assert_eq!(coerce::<u32>("count", Some(&RawValue::Int(0)), 5).unwrap(), 0);
        assert_eq!(coerce::<u32>("count", Some(&text("0")), 5).unwrap(), 0);
        assert_eq!(coerce::<f64>("interval", Some(&text("0")), 0.2).unwrap(), 0.0);
        assert!(!coerce::<bool>("resolve", Some(&RawValue::Bool(false)), true).unwrap());
        assert!(!coerce::<bool>("resolve", Some(&text("false")), true).unwrap());
    }

    #[test]
    fn test_numeric_strings_parse() {
        assert_eq!(coerce::<i64>("id", Some(&text(" 42 ")), 0).unwrap(), 42);
        assert_eq!(coerce::<f64>("interval", Some(&text("0.5")), 0.2).unwrap(), 0.5);
        assert_eq!(coerce::<f64>("interval", Some(&RawValue::Int(2)), 0.2).unwrap(), 2.0);
        assert_eq!(coerce::<u32>("count", Some(&RawValue::Float(3.0)), 5).unwrap(), 3);
    }

    #[test]
    fn test_unparseable_numbers_fail() {
        assert!(coerce::<u32>("count", Some(&text("five")), 5).is_err());
        assert!(coerce::<u32>("count", Some(&text("-1")), 5).is_err());
        assert!(coerce::<u32>("count", Some(&RawValue::Float(2.5)), 5).is_err());
        assert!(coerce::<i64>("id", Some(&text("3.0")), 0).is_err());
        assert!(coerce::<f64>("interval", Some(&text("NaN")), 0.2).is_err());
        // Empty text must have been normalized away by the source.
        assert!(coerce::<u32>("count", Some(&text("")), 5).is_err());
    }

    #[test]
    fn test_non_finite_floats_fail() {
        for x in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(coerce::<f64>("interval", Some(&RawValue::Float(x)), 0.2).is_err());
        }
        assert!(coerce::<f64>("interval", Some(&text("inf")), 0.2).is_err());
    }

    #[test]
    fn test_correct_type_passes_through() {
        assert_eq!(coerce::<u64>("id", Some(&RawValue::Int(9)), 0).unwrap(), 9);
        assert_eq!(
            coerce::<String>("destination", Some(&text("example.com")), String::new()).unwrap(),
            "example.com"
        );
    }

    #[test]
    fn test_require_reports_absence() {
        let err = require::<u64>("id", None).unwrap_err();
        assert!(err.to_string().contains("<absent>"));
        assert!(err.to_string().contains("`id`"));
        assert_eq!(require::<u64>("id", Some(&text("12"))).unwrap(), 12);
    }
}
