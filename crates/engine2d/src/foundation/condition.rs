//! Predicate DSL over named fields
//!
//! Conditions are small expression trees: leaves compare one field against a
//! value, inner nodes combine leaves with AND / OR / NOT. The animator uses
//! them to guard transitions, but anything implementing [`FieldSource`] can be
//! evaluated.
//!
//! ```
//! use engine2d::foundation::condition::{Condition, Op};
//! use engine2d::foundation::value::Value;
//! use std::collections::HashMap;
//!
//! let running = Condition::compare("speed", Op::Gt, 0.5) & !Condition::compare("grounded", Op::Is, false);
//! let mut fields = HashMap::new();
//! fields.insert("speed".to_string(), Value::from(1.0));
//! fields.insert("grounded".to_string(), Value::from(true));
//! assert!(running.resolve(&fields));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use indexmap::IndexMap;

use super::value::Value;

/// Anything a condition can read fields from
pub trait FieldSource {
    /// Current value of `name`, `None` if unknown
    fn field(&self, name: &str) -> Option<Value>;
}

impl FieldSource for HashMap<String, Value> {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl FieldSource for IndexMap<String, Value> {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// Comparison operator of a leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Loose equality (ints and floats compare numerically)
    Eq,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
    /// Strict equality, type included
    Is,
}

impl Op {
    /// Suffix used by [`Condition::parse`]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Is => "is",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "eq" => Self::Eq,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "is" => Self::Is,
            _ => return None,
        })
    }

    fn apply(self, lhs: &Value, rhs: &Value) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match self {
            Self::Eq => lhs.loose_eq(rhs),
            Self::Is => lhs == rhs,
            Self::Gt => matches!(lhs.partial_cmp_loose(rhs), Some(Greater)),
            Self::Gte => matches!(lhs.partial_cmp_loose(rhs), Some(Greater | Equal)),
            Self::Lt => matches!(lhs.partial_cmp_loose(rhs), Some(Less)),
            Self::Lte => matches!(lhs.partial_cmp_loose(rhs), Some(Less | Equal)),
        }
    }
}

/// Errors building a condition
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    /// Key had an empty field name
    #[error("condition key '{0}' has no field name")]
    EmptyField(String),

    /// Unknown operator suffix
    #[error("unknown condition operator '{op}' in '{key}'")]
    UnknownOperator {
        /// Full key as given
        key: String,
        /// Offending suffix
        op: String,
    },
}

/// Predicate tree
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Always true
    Always,
    /// Always false
    Never,
    /// `field op value`
    Compare {
        /// Field name
        field: String,
        /// Operator
        op: Op,
        /// Right-hand side
        value: Value,
    },
    /// Both hold
    And(Box<Condition>, Box<Condition>),
    /// Either holds
    Or(Box<Condition>, Box<Condition>),
    /// Negation
    Not(Box<Condition>),
}

/// Condition that always holds
pub const ALWAYS: Condition = Condition::Always;

/// Condition that never holds
pub const NEVER: Condition = Condition::Never;

impl Condition {
    /// Leaf comparing `field` against `value`
    pub fn compare(field: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        Self::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Parse a `field__op` key, e.g. `"speed__gt"`. A key without a suffix
    /// compares for equality.
    pub fn parse(key: &str, value: impl Into<Value>) -> Result<Self, ConditionError> {
        let (field, op) = match key.rsplit_once("__") {
            Some((field, suffix)) => {
                let op = Op::from_suffix(suffix).ok_or_else(|| ConditionError::UnknownOperator {
                    key: key.to_string(),
                    op: suffix.to_string(),
                })?;
                (field, op)
            }
            None => (key, Op::Eq),
        };
        if field.is_empty() {
            return Err(ConditionError::EmptyField(key.to_string()));
        }
        Ok(Self::compare(field, op, value))
    }

    /// Field name of the leftmost leaf, `"always"` / `"never"` for the constants
    pub fn prop(&self) -> &str {
        match self {
            Self::Always => "always",
            Self::Never => "never",
            Self::Compare { field, .. } => field,
            Self::And(lhs, _) | Self::Or(lhs, _) => lhs.prop(),
            Self::Not(inner) => inner.prop(),
        }
    }

    /// Every field name the tree reads
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Always | Self::Never => {}
            Self::Compare { field, .. } => {
                if !out.contains(&field.as_str()) {
                    out.push(field);
                }
            }
            Self::And(lhs, rhs) | Self::Or(lhs, rhs) => {
                lhs.collect_fields(out);
                rhs.collect_fields(out);
            }
            Self::Not(inner) => inner.collect_fields(out),
        }
    }

    /// Evaluate against `source`. A leaf whose field is missing is false.
    pub fn resolve(&self, source: &dyn FieldSource) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Compare { field, op, value } => source
                .field(field)
                .is_some_and(|current| op.apply(&current, value)),
            Self::And(lhs, rhs) => lhs.resolve(source) && rhs.resolve(source),
            Self::Or(lhs, rhs) => lhs.resolve(source) || rhs.resolve(source),
            Self::Not(inner) => !inner.resolve(source),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "ALWAYS"),
            Self::Never => write!(f, "NEVER"),
            Self::Compare { field, op, value } => write!(f, "{field}__{} {value}", op.suffix()),
            Self::And(lhs, rhs) => write!(f, "({lhs} & {rhs})"),
            Self::Or(lhs, rhs) => write!(f, "({lhs} | {rhs})"),
            Self::Not(inner) => write!(f, "!{inner}"),
        }
    }
}

impl BitAnd for Condition {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self::And(Box::new(self), Box::new(rhs))
    }
}

impl BitOr for Condition {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self::Or(Box::new(self), Box::new(rhs))
    }
}

impl Not for Condition {
    type Output = Self;
    fn not(self) -> Self {
        Self::Not(Box::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> HashMap<String, Value> {
        let mut map = HashMap::new();
        map.insert("speed".to_string(), Value::Float(2.0));
        map.insert("lives".to_string(), Value::Int(3));
        map.insert("state".to_string(), Value::from("idle"));
        map
    }

    #[test]
    fn test_operators() {
        let f = fields();
        assert!(Condition::compare("speed", Op::Gt, 1).resolve(&f));
        assert!(Condition::compare("speed", Op::Gte, 2.0).resolve(&f));
        assert!(!Condition::compare("speed", Op::Lt, 2).resolve(&f));
        assert!(Condition::compare("lives", Op::Eq, 3.0).resolve(&f));
        assert!(!Condition::compare("lives", Op::Is, 3.0).resolve(&f));
        assert!(Condition::compare("state", Op::Is, "idle").resolve(&f));
    }

    #[test]
    fn test_missing_field_is_false() {
        let f = fields();
        assert!(!Condition::compare("ghost", Op::Eq, 1).resolve(&f));
        assert!((!Condition::compare("ghost", Op::Eq, 1)).resolve(&f));
    }

    #[test]
    fn test_combinators_and_prop() {
        let f = fields();
        let c = Condition::compare("lives", Op::Gt, 0) & (Condition::compare("speed", Op::Lt, 1) | ALWAYS);
        assert!(c.resolve(&f));
        assert_eq!(c.prop(), "lives");
        assert_eq!(c.fields(), vec!["lives", "speed"]);
        assert_eq!(ALWAYS.prop(), "always");
        assert_eq!(NEVER.prop(), "never");
        assert!(!(NEVER & ALWAYS).resolve(&f));
    }

    #[test]
    fn test_parse_keys() {
        assert_eq!(
            Condition::parse("speed__gte", 1).ok(),
            Some(Condition::compare("speed", Op::Gte, 1))
        );
        assert_eq!(
            Condition::parse("jumping", true).ok(),
            Some(Condition::compare("jumping", Op::Eq, true))
        );
        assert!(matches!(
            Condition::parse("speed__near", 1),
            Err(ConditionError::UnknownOperator { .. })
        ));
        assert!(matches!(Condition::parse("__gt", 1), Err(ConditionError::EmptyField(_))));
    }
}
