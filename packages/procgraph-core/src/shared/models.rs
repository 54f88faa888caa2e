//! Event model
//!
//! Canonical in-memory form of an event log: a trace is an ordered sequence
//! of events, each carrying an activity label and a dictionary of named data
//! attributes. Traces are immutable after ingestion.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Scalar attribute value carried by an event
///
/// Booleans are kept distinct from integers so the dtype classifier can
/// treat them as a two-valued categorical attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Real(f64),
    Bool(bool),
    Str(String),
}

impl AttrValue {
    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Real(v) => Some(*v),
            _ => None,
        }
    }

    /// True for `Int` and `Real`
    pub fn is_numeric(&self) -> bool {
        matches!(self, AttrValue::Int(_) | AttrValue::Real(_))
    }

    /// Short name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Int(_) => "int",
            AttrValue::Real(_) => "real",
            AttrValue::Bool(_) => "bool",
            AttrValue::Str(_) => "string",
        }
    }

    /// Unquoted textual form, used as a categorical key
    pub fn as_category(&self) -> String {
        match self {
            AttrValue::Int(v) => v.to_string(),
            AttrValue::Real(v) => v.to_string(),
            AttrValue::Bool(v) => v.to_string(),
            AttrValue::Str(v) => v.clone(),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::Real(v) => {
                // Keep reals re-parseable as reals: "275" would read back
                // as an integer literal.
                let s = v.to_string();
                if s.contains('.') || s.contains('e') || s.contains("inf") || s.contains("NaN") {
                    write!(f, "{}", s)
                } else {
                    write!(f, "{}.0", s)
                }
            }
            AttrValue::Bool(v) => write!(f, "{}", v),
            AttrValue::Str(v) => write!(f, "\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")),
        }
    }
}

/// Attribute dictionary of a single event (or an accumulated valuation)
pub type AttrMap = FxHashMap<String, AttrValue>;

/// Variable state of a running EFSM/DPN replay
///
/// Every declared variable is present; `None` means "not yet written".
pub type VarState = BTreeMap<String, Option<AttrValue>>;

/// One event of a trace
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Activity label
    pub activity: String,
    /// Named data attributes
    pub attrs: AttrMap,
}

impl Event {
    pub fn new(activity: impl Into<String>, attrs: AttrMap) -> Self {
        Self {
            activity: activity.into(),
            attrs,
        }
    }
}

/// Ordered event sequence of one case
pub type Trace = Vec<Event>;

/// Build an attribute map from `(name, value)` pairs
pub fn attrs_from<I>(pairs: I) -> AttrMap
where
    I: IntoIterator<Item = (&'static str, AttrValue)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
