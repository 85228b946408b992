/**
 * Value Model — Runtime Values for the Logic Interpreter
 *
 * DESIGN DECISION: Closed tagged union instead of an open trait object
 * WHY: The interpreter must never embed domain knowledge; a closed set of
 * variants keeps every operation (equality, ordering, built-ins) exhaustive
 * and checkable by the compiler instead of by convention.
 *
 * REASONING CHAIN:
 * 1. Rules and philosophies describe properties over booleans, numbers,
 *    text, ordered collections, and key-value records — nothing else.
 * 2. A closed enum lets every match in evaluator.rs be exhaustive, so a
 *    new variant forces every call site to be revisited.
 * 3. Null is a distinct variant (not Option<Value>) because "absent" and
 *    "present but null" are different outcomes for `var` lookups and
 *    `equals` comparisons.
 * 4. Deep structural equality and within-variant ordering are the only
 *    comparisons the grammar (§4.4) requires; cross-variant comparisons are
 *    a typed error, not a silent `false`.
 *
 * PATTERN: tagged-sum value model (grounded on aetherlight-core's Pattern/
 * Confidence split, generalized into one closed runtime type)
 */
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};

/// An ordered, insertion-preserving string-keyed map.
///
/// DESIGN DECISION: `Vec<(String, Value)>` instead of a `HashMap`
/// WHY: §3 requires "iteration order is insertion order"; a `HashMap` would
/// need a second structure to remember insertion order, and a `BTreeMap`
/// would silently reorder keys. A small linear-scan map is also the right
/// complexity for the object sizes rule documents actually produce (field
/// counts in the tens, not thousands).
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq, Hash)]
pub struct Obj(Vec<(String, Value)>);

impl Obj {
    pub fn new() -> Self {
        Obj(Vec::new())
    }

    /// Insert or replace a field, preserving the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }
}

impl FromIterator<(String, Value)> for Obj {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut obj = Obj::new();
        for (k, v) in iter {
            obj.insert(k, v);
        }
        obj
    }
}

/// A runtime value manipulated by the expression evaluator.
///
/// Exactly the six variants required by §3 — no more, no fewer. Adding a
/// variant here is a breaking change to every built-in and to the loader.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    String(String),
    Collection(Vec<Value>),
    Object(Obj),
    Null,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::String(_) => "String",
            Value::Collection(_) => "Collection",
            Value::Object(_) => "Object",
            Value::Null => "Null",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Boolean(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Value::Integer(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Value::Collection(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Unwrap a Boolean, or a typed `TypeMismatch` — never a panic.
    pub fn as_boolean(&self) -> Result<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            other => Err(Error::TypeMismatch(format!(
                "expected Boolean, found {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_integer(&self) -> Result<i64> {
        match self {
            Value::Integer(i) => Ok(*i),
            other => Err(Error::TypeMismatch(format!(
                "expected Integer, found {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::String(s) => Ok(s.as_str()),
            other => Err(Error::TypeMismatch(format!(
                "expected String, found {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_collection(&self) -> Result<&[Value]> {
        match self {
            Value::Collection(c) => Ok(c.as_slice()),
            other => Err(Error::TypeMismatch(format!(
                "expected Collection, found {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_object(&self) -> Result<&Obj> {
        match self {
            Value::Object(o) => Ok(o),
            other => Err(Error::TypeMismatch(format!(
                "expected Object, found {}",
                other.type_name()
            ))),
        }
    }

    /// Size per §4.1: length for Collection/String, field count for Object.
    pub fn size(&self) -> Result<usize> {
        match self {
            Value::Collection(c) => Ok(c.len()),
            Value::String(s) => Ok(s.chars().count()),
            Value::Object(o) => Ok(o.len()),
            other => Err(Error::TypeMismatch(format!(
                "{} has no defined size",
                other.type_name()
            ))),
        }
    }

    /// Membership test for Collection, by structural equality (§4.1).
    pub fn contains(&self, needle: &Value) -> Result<bool> {
        match self {
            Value::Collection(c) => Ok(c.iter().any(|v| v == needle)),
            other => Err(Error::TypeMismatch(format!(
                "contains is only defined for Collection, found {}",
                other.type_name()
            ))),
        }
    }

    /// Field lookup for Object (§4.1). Missing field is Null, not an error —
    /// callers that need "must exist" semantics use `has_field` instead.
    pub fn field(&self, name: &str) -> Result<Value> {
        match self {
            Value::Object(o) => Ok(o.get(name).cloned().unwrap_or(Value::Null)),
            other => Err(Error::TypeMismatch(format!(
                "field access is only defined for Object, found {}",
                other.type_name()
            ))),
        }
    }

    /// Within-variant total ordering (§3). Cross-variant is `TypeMismatch`.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            (Value::Collection(a), Value::Collection(b)) => Ok(a.len().cmp(&b.len())),
            (Value::Object(a), Value::Object(b)) => Ok(a.len().cmp(&b.len())),
            (Value::Null, Value::Null) => Ok(Ordering::Equal),
            (a, b) => Err(Error::TypeMismatch(format!(
                "cannot order {} against {}",
                a.type_name(),
                b.type_name()
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Collection(c) => {
                write!(f, "[")?;
                for (i, v) in c.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Object(o) => {
                write!(f, "{{")?;
                for (i, (k, v)) in o.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Null => write!(f, "null"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(c: Vec<Value>) -> Self {
        Value::Collection(c)
    }
}
