//! Guard predicate language
//!
//! A guard is either the trivial predicate `true`, a conjunction of atomic
//! threshold/equality predicates, or (only after the compact DPN projection
//! merges same-labelled transitions) a disjunction of guards.
//!
//! Guards have a canonical textual form that round-trips through
//! [`Guard::parse`]:
//!
//! ```text
//! true
//! amount <= 50
//! And(amount >= 275, tier == "gold")
//! Or(amount <= 50, And(amount >= 275, tier == "gold"))
//! ```

use crate::errors::{ProcgraphError, Result};
use crate::shared::models::{AttrValue, VarState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Comparison operator of an atomic predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (==)
    Eq,
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Le => write!(f, "<="),
            Self::Ge => write!(f, ">="),
            Self::Eq => write!(f, "=="),
        }
    }
}

/// Atomic predicate `variable <op> literal`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicPredicate {
    pub var: String,
    pub op: ComparisonOp,
    pub value: AttrValue,
}

impl AtomicPredicate {
    pub fn new(var: impl Into<String>, op: ComparisonOp, value: AttrValue) -> Self {
        Self {
            var: var.into(),
            op,
            value,
        }
    }

    /// Convenience constructor: `var <= value`
    pub fn le(var: impl Into<String>, value: AttrValue) -> Self {
        Self::new(var, ComparisonOp::Le, value)
    }

    /// Convenience constructor: `var >= value`
    pub fn ge(var: impl Into<String>, value: AttrValue) -> Self {
        Self::new(var, ComparisonOp::Ge, value)
    }

    /// Convenience constructor: `var == value`
    pub fn eq(var: impl Into<String>, value: AttrValue) -> Self {
        Self::new(var, ComparisonOp::Eq, value)
    }

    /// Evaluate against a concrete value of the variable
    pub fn holds_for(&self, actual: &AttrValue) -> Result<bool> {
        match self.op {
            ComparisonOp::Eq => match (actual, &self.value) {
                (AttrValue::Str(a), AttrValue::Str(b)) => Ok(a == b),
                (AttrValue::Bool(a), AttrValue::Bool(b)) => Ok(a == b),
                (a, b) if a.is_numeric() && b.is_numeric() => {
                    Ok(a.as_f64() == b.as_f64())
                }
                (a, b) => Err(ProcgraphError::guard_eval(format!(
                    "cannot compare {} value with {} literal in '{}'",
                    a.type_name(),
                    b.type_name(),
                    self
                ))),
            },
            ComparisonOp::Le | ComparisonOp::Ge => {
                let (a, b) = match (actual.as_f64(), self.value.as_f64()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => {
                        return Err(ProcgraphError::guard_eval(format!(
                            "ordered comparison needs numeric operands in '{}', got {} value",
                            self,
                            actual.type_name()
                        )))
                    }
                };
                Ok(match self.op {
                    ComparisonOp::Le => a <= b,
                    ComparisonOp::Ge => a >= b,
                    ComparisonOp::Eq => unreachable!(),
                })
            }
        }
    }

    /// Evaluate against a variable state; an unset variable raises
    pub fn evaluate(&self, state: &VarState) -> Result<bool> {
        match state.get(&self.var) {
            Some(Some(actual)) => self.holds_for(actual),
            _ => Err(ProcgraphError::guard_eval(format!(
                "variable '{}' is unset",
                self.var
            ))),
        }
    }

    /// Parse a single `var <op> literal` form
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        // Only search left of the first quote so operators inside string
        // literals are not picked up. Longest operators first so ">=" is
        // not read as "=".
        let quote = text.find('"').unwrap_or(text.len());
        for (token, op) in [
            ("<=", ComparisonOp::Le),
            (">=", ComparisonOp::Ge),
            ("==", ComparisonOp::Eq),
            ("=", ComparisonOp::Eq),
        ] {
            if let Some(pos) = text[..quote].find(token) {
                let var = text[..pos].trim();
                let lit = text[pos + token.len()..].trim();
                if var.is_empty() || lit.is_empty() {
                    return Err(ProcgraphError::parse(format!(
                        "malformed predicate '{}'",
                        text
                    )));
                }
                return Ok(Self::new(var, op, parse_literal(lit)?));
            }
        }
        Err(ProcgraphError::parse(format!(
            "no comparison operator in '{}'",
            text
        )))
    }
}

impl fmt::Display for AtomicPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.var, self.op, self.value)
    }
}

/// Parse a literal: quoted string, boolean, integer, or real
fn parse_literal(text: &str) -> Result<AttrValue> {
    if let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        return Ok(AttrValue::Str(
            inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        ));
    }
    match text {
        "true" => return Ok(AttrValue::Bool(true)),
        "false" => return Ok(AttrValue::Bool(false)),
        _ => {}
    }
    if let Ok(i) = text.parse::<i64>() {
        return Ok(AttrValue::Int(i));
    }
    if let Ok(r) = text.parse::<f64>() {
        return Ok(AttrValue::Real(r));
    }
    Err(ProcgraphError::parse(format!("bad literal '{}'", text)))
}

/// Guard predicate of a transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GuardRepr", into = "GuardRepr")]
pub enum Guard {
    /// The always-true guard
    True,
    /// Conjunction of atomic predicates (never empty)
    Conjunction(Vec<AtomicPredicate>),
    /// Disjunction of guards, produced by the compact projection
    Disjunction(Vec<Guard>),
}

impl Guard {
    /// True iff this is the trivial guard
    pub fn is_trivial(&self) -> bool {
        matches!(self, Guard::True)
    }

    /// Build a conjunction, collapsing the empty case to `true`
    pub fn conjunction(atoms: Vec<AtomicPredicate>) -> Self {
        if atoms.is_empty() {
            Guard::True
        } else {
            Guard::Conjunction(atoms)
        }
    }

    /// Merge several guards into one with a disjunction
    ///
    /// A trivial member makes the whole disjunction trivial; a single
    /// non-trivial member is returned as-is.
    pub fn disjunction(mut guards: Vec<Guard>) -> Self {
        if guards.is_empty() || guards.iter().any(Guard::is_trivial) {
            return Guard::True;
        }
        if guards.len() == 1 {
            return guards.pop().expect("len checked");
        }
        Guard::Disjunction(guards)
    }

    /// Evaluate against a variable state
    ///
    /// Unset variables and type mismatches raise `GuardEval`; callers
    /// decide whether that means "undefined" (replayer) or "not enabled"
    /// (simulator).
    pub fn evaluate(&self, state: &VarState) -> Result<bool> {
        match self {
            Guard::True => Ok(true),
            Guard::Conjunction(atoms) => {
                for atom in atoms {
                    if !atom.evaluate(state)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Guard::Disjunction(arms) => {
                let mut first_err = None;
                for arm in arms {
                    match arm.evaluate(state) {
                        Ok(true) => return Ok(true),
                        Ok(false) => {}
                        Err(e) if first_err.is_none() => first_err = Some(e),
                        Err(_) => {}
                    }
                }
                match first_err {
                    Some(e) => Err(e),
                    None => Ok(false),
                }
            }
        }
    }

    /// Variables syntactically mentioned in the guard
    pub fn read_vars(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.collect_vars(&mut vars);
        vars
    }

    fn collect_vars(&self, out: &mut BTreeSet<String>) {
        match self {
            Guard::True => {}
            Guard::Conjunction(atoms) => {
                for atom in atoms {
                    out.insert(atom.var.clone());
                }
            }
            Guard::Disjunction(arms) => {
                for arm in arms {
                    arm.collect_vars(out);
                }
            }
        }
    }

    /// Canonical textual form; `true` denotes the trivial guard
    pub fn serialized(&self) -> String {
        self.to_string()
    }

    /// Parse the canonical textual form
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() || text.eq_ignore_ascii_case("true") {
            return Ok(Guard::True);
        }
        if let Some(inner) = strip_call(text, "And") {
            let atoms = split_top_level(inner)?
                .into_iter()
                .map(|part| AtomicPredicate::parse(part))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Guard::conjunction(atoms));
        }
        if let Some(inner) = strip_call(text, "Or") {
            let arms = split_top_level(inner)?
                .into_iter()
                .map(Guard::parse)
                .collect::<Result<Vec<_>>>()?;
            if arms.is_empty() {
                return Ok(Guard::True);
            }
            return Ok(Guard::Disjunction(arms));
        }
        Ok(Guard::Conjunction(vec![AtomicPredicate::parse(text)?]))
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guard::True => write!(f, "true"),
            Guard::Conjunction(atoms) => {
                if atoms.len() == 1 {
                    write!(f, "{}", atoms[0])
                } else {
                    write!(f, "And(")?;
                    for (i, atom) in atoms.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", atom)?;
                    }
                    write!(f, ")")
                }
            }
            Guard::Disjunction(arms) => {
                write!(f, "Or(")?;
                for (i, arm) in arms.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arm)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Strip `name(` … `)` around `text`, returning the inner slice
fn strip_call<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    text.strip_prefix(name)
        .map(str::trim_start)
        .and_then(|t| t.strip_prefix('('))
        .and_then(|t| t.strip_suffix(')'))
}

/// Split on top-level commas, respecting parentheses and string quotes
fn split_top_level(text: &str) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => in_string = false,
                _ => escaped = false,
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    ProcgraphError::parse(format!("unbalanced parentheses in '{}'", text))
                })?;
            }
            ',' if depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 || in_string {
        return Err(ProcgraphError::parse(format!(
            "unbalanced expression '{}'",
            text
        )));
    }
    let last = text[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    Ok(parts)
}

/// JSON shape of a guard: `{"serialized": "..."}`, with `"true"` or `null`
/// both denoting the trivial guard
#[derive(Serialize, Deserialize)]
struct GuardRepr {
    serialized: Option<String>,
}

impl From<Guard> for GuardRepr {
    fn from(guard: Guard) -> Self {
        GuardRepr {
            serialized: Some(guard.serialized()),
        }
    }
}

impl TryFrom<GuardRepr> for Guard {
    type Error = ProcgraphError;

    fn try_from(repr: GuardRepr) -> Result<Self> {
        match repr.serialized {
            None => Ok(Guard::True),
            Some(text) => Guard::parse(&text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(pairs: &[(&str, Option<AttrValue>)]) -> VarState {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_atom_display_and_parse_round_trip() {
        let atoms = [
            AtomicPredicate::le("amount", AttrValue::Int(50)),
            AtomicPredicate::ge("ratio", AttrValue::Real(0.5)),
            AtomicPredicate::eq("tier", AttrValue::Str("gold".into())),
            AtomicPredicate::eq("flag", AttrValue::Bool(true)),
        ];
        for atom in atoms {
            let text = atom.to_string();
            assert_eq!(AtomicPredicate::parse(&text).unwrap(), atom);
        }
    }

    #[test]
    fn test_real_literal_round_trips_as_real() {
        let atom = AtomicPredicate::ge("amount", AttrValue::Real(275.0));
        assert_eq!(atom.to_string(), "amount >= 275.0");
        assert_eq!(AtomicPredicate::parse("amount >= 275.0").unwrap(), atom);
    }

    #[test]
    fn test_guard_round_trip() {
        let guard = Guard::Conjunction(vec![
            AtomicPredicate::ge("amount", AttrValue::Int(275)),
            AtomicPredicate::eq("tier", AttrValue::Str("gold".into())),
        ]);
        let text = guard.to_string();
        assert_eq!(text, "And(amount >= 275, tier == \"gold\")");
        assert_eq!(Guard::parse(&text).unwrap(), guard);

        assert_eq!(Guard::parse("true").unwrap(), Guard::True);
        assert_eq!(Guard::True.to_string(), "true");
    }

    #[test]
    fn test_disjunction_round_trip() {
        let guard = Guard::Disjunction(vec![
            Guard::Conjunction(vec![AtomicPredicate::le("amount", AttrValue::Int(50))]),
            Guard::Conjunction(vec![
                AtomicPredicate::ge("amount", AttrValue::Int(275)),
                AtomicPredicate::eq("tier", AttrValue::Str("a,b".into())),
            ]),
        ]);
        let text = guard.to_string();
        assert_eq!(Guard::parse(&text).unwrap(), guard);
    }

    #[test]
    fn test_evaluation() {
        let guard = Guard::Conjunction(vec![AtomicPredicate::le("amount", AttrValue::Int(50))]);
        let state = state_with(&[("amount", Some(AttrValue::Int(40)))]);
        assert!(guard.evaluate(&state).unwrap());

        let state = state_with(&[("amount", Some(AttrValue::Int(60)))]);
        assert!(!guard.evaluate(&state).unwrap());
    }

    #[test]
    fn test_unset_variable_raises() {
        let guard = Guard::Conjunction(vec![AtomicPredicate::eq("x", AttrValue::Int(0))]);
        let state = state_with(&[("x", None)]);
        assert!(matches!(
            guard.evaluate(&state),
            Err(ProcgraphError::GuardEval(_))
        ));
    }

    #[test]
    fn test_type_mismatch_raises() {
        let guard = Guard::Conjunction(vec![AtomicPredicate::le("x", AttrValue::Int(5))]);
        let state = state_with(&[("x", Some(AttrValue::Str("oops".into())))]);
        assert!(guard.evaluate(&state).is_err());
    }

    #[test]
    fn test_int_real_cross_comparison() {
        let atom = AtomicPredicate::eq("x", AttrValue::Real(5.0));
        assert!(atom.holds_for(&AttrValue::Int(5)).unwrap());
    }

    #[test]
    fn test_read_vars() {
        let guard = Guard::parse("And(amount >= 275, tier == \"gold\")").unwrap();
        let vars: Vec<_> = guard.read_vars().into_iter().collect();
        assert_eq!(vars, vec!["amount".to_string(), "tier".to_string()]);
        assert!(Guard::True.read_vars().is_empty());
    }

    #[test]
    fn test_json_repr() {
        let guard = Guard::Conjunction(vec![AtomicPredicate::ge("x", AttrValue::Int(100))]);
        let json = serde_json::to_string(&guard).unwrap();
        assert_eq!(json, "{\"serialized\":\"x >= 100\"}");
        let back: Guard = serde_json::from_str(&json).unwrap();
        assert_eq!(back, guard);

        // null denotes the trivial guard
        let trivial: Guard = serde_json::from_str("{\"serialized\":null}").unwrap();
        assert_eq!(trivial, Guard::True);
    }
}
