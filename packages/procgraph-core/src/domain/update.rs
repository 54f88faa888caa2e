//! Variable update expressions
//!
//! An update maps variable names to assignment expressions. The expression
//! grammar is deliberately small: `attr.<name>` copies an event attribute
//! into the variable, and `<operand> <op> <operand>` performs arithmetic
//! over variables, event attributes, and literals. Nothing else evaluates.
//!
//! Evaluation is total at the update level: an assignment whose right-hand
//! side fails leaves its variable unchanged while the remaining assignments
//! still apply. All right-hand sides see the variable state as it was
//! before the update started.

use crate::errors::{ProcgraphError, Result};
use crate::shared::models::{AttrMap, AttrValue, VarState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Arithmetic operator of a binary update expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "+"),
            Self::Sub => write!(f, "-"),
            Self::Mul => write!(f, "*"),
            Self::Div => write!(f, "/"),
        }
    }
}

impl ArithOp {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "+" => Some(Self::Add),
            "-" => Some(Self::Sub),
            "*" => Some(Self::Mul),
            "/" => Some(Self::Div),
            _ => None,
        }
    }
}

/// Leaf of an update expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// `attr.<name>`: the named attribute of the current event
    Attr(String),
    /// A variable of the machine
    Var(String),
    /// A literal value
    Lit(AttrValue),
}

impl Operand {
    fn eval(&self, state: &VarState, attrs: &AttrMap) -> Result<AttrValue> {
        match self {
            Operand::Attr(name) => attrs.get(name).cloned().ok_or_else(|| {
                ProcgraphError::update_eval(format!("event has no attribute '{}'", name))
            }),
            Operand::Var(name) => match state.get(name) {
                Some(Some(value)) => Ok(value.clone()),
                _ => Err(ProcgraphError::update_eval(format!(
                    "variable '{}' is unset",
                    name
                ))),
            },
            Operand::Lit(value) => Ok(value.clone()),
        }
    }

    fn parse(token: &str) -> Result<Self> {
        if let Some(name) = token.strip_prefix("attr.") {
            if name.is_empty() {
                return Err(ProcgraphError::parse("empty attribute name in 'attr.'"));
            }
            return Ok(Operand::Attr(name.to_string()));
        }
        if let Some(inner) = token.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
            return Ok(Operand::Lit(AttrValue::Str(inner.to_string())));
        }
        match token {
            "true" => return Ok(Operand::Lit(AttrValue::Bool(true))),
            "false" => return Ok(Operand::Lit(AttrValue::Bool(false))),
            _ => {}
        }
        if let Ok(i) = token.parse::<i64>() {
            return Ok(Operand::Lit(AttrValue::Int(i)));
        }
        if let Ok(r) = token.parse::<f64>() {
            return Ok(Operand::Lit(AttrValue::Real(r)));
        }
        if token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !token.is_empty()
        {
            return Ok(Operand::Var(token.to_string()));
        }
        Err(ProcgraphError::parse(format!("bad operand '{}'", token)))
    }

    /// Variable name if this operand reads the variable store
    pub fn var_name(&self) -> Option<&str> {
        match self {
            Operand::Var(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Attr(name) => write!(f, "attr.{}", name),
            Operand::Var(name) => write!(f, "{}", name),
            Operand::Lit(value) => write!(f, "{}", value),
        }
    }
}

/// Right-hand side of an assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UpdateExpr {
    Operand(Operand),
    Binary(Operand, ArithOp, Operand),
}

impl UpdateExpr {
    /// Shorthand for the common `attr.<name>` copy
    pub fn attr(name: impl Into<String>) -> Self {
        UpdateExpr::Operand(Operand::Attr(name.into()))
    }

    /// Evaluate against the pre-update state and the event attributes
    pub fn eval(&self, state: &VarState, attrs: &AttrMap) -> Result<AttrValue> {
        match self {
            UpdateExpr::Operand(op) => op.eval(state, attrs),
            UpdateExpr::Binary(lhs, op, rhs) => {
                let left = lhs.eval(state, attrs)?;
                let right = rhs.eval(state, attrs)?;
                apply_arith(&left, *op, &right)
            }
        }
    }

    /// Parse the textual form: one operand, or `operand op operand`
    pub fn parse(text: &str) -> Result<Self> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        match tokens.as_slice() {
            [single] => Ok(UpdateExpr::Operand(Operand::parse(single)?)),
            [lhs, op, rhs] => {
                let op = ArithOp::parse(op).ok_or_else(|| {
                    ProcgraphError::parse(format!("unknown operator '{}'", op))
                })?;
                Ok(UpdateExpr::Binary(
                    Operand::parse(lhs)?,
                    op,
                    Operand::parse(rhs)?,
                ))
            }
            _ => Err(ProcgraphError::parse(format!(
                "unsupported update expression '{}'",
                text
            ))),
        }
    }

    /// Variables read by this expression (attribute reads excluded)
    pub fn read_vars(&self) -> Vec<&str> {
        match self {
            UpdateExpr::Operand(op) => op.var_name().into_iter().collect(),
            UpdateExpr::Binary(lhs, _, rhs) => lhs
                .var_name()
                .into_iter()
                .chain(rhs.var_name())
                .collect(),
        }
    }
}

fn apply_arith(left: &AttrValue, op: ArithOp, right: &AttrValue) -> Result<AttrValue> {
    let (a, b) = match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(ProcgraphError::update_eval(format!(
                "arithmetic needs numeric operands, got {} and {}",
                left.type_name(),
                right.type_name()
            )))
        }
    };
    // Integer arithmetic stays integral except for division.
    if let (AttrValue::Int(a), AttrValue::Int(b), false) =
        (left, right, matches!(op, ArithOp::Div))
    {
        let result = match op {
            ArithOp::Add => a.checked_add(*b),
            ArithOp::Sub => a.checked_sub(*b),
            ArithOp::Mul => a.checked_mul(*b),
            ArithOp::Div => unreachable!(),
        };
        return result.map(AttrValue::Int).ok_or_else(|| {
            ProcgraphError::update_eval("integer overflow in update expression")
        });
    }
    if matches!(op, ArithOp::Div) && b == 0.0 {
        return Err(ProcgraphError::update_eval("division by zero"));
    }
    Ok(AttrValue::Real(match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
    }))
}

impl fmt::Display for UpdateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateExpr::Operand(op) => write!(f, "{}", op),
            UpdateExpr::Binary(lhs, op, rhs) => write!(f, "{} {} {}", lhs, op, rhs),
        }
    }
}

impl From<UpdateExpr> for String {
    fn from(expr: UpdateExpr) -> Self {
        expr.to_string()
    }
}

impl TryFrom<String> for UpdateExpr {
    type Error = ProcgraphError;

    fn try_from(text: String) -> Result<Self> {
        UpdateExpr::parse(&text)
    }
}

/// Variable update map of a transition
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Update {
    /// Variable name → assignment expression
    pub assignments: BTreeMap<String, UpdateExpr>,
}

impl Update {
    pub fn new(assignments: BTreeMap<String, UpdateExpr>) -> Self {
        Self { assignments }
    }

    /// The empty update
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Apply to a variable state using the event's attributes
    ///
    /// Right-hand sides are evaluated against a snapshot of the incoming
    /// state; a failing assignment leaves its variable untouched.
    pub fn apply(&self, state: &mut VarState, attrs: &AttrMap) {
        let snapshot = state.clone();
        for (var, expr) in &self.assignments {
            if let Ok(value) = expr.eval(&snapshot, attrs) {
                state.insert(var.clone(), Some(value));
            }
        }
    }

    /// Variables read by any right-hand side
    pub fn read_vars(&self) -> Vec<String> {
        self.assignments
            .values()
            .flat_map(|expr| expr.read_vars().into_iter().map(str::to_string))
            .collect()
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.assignments.is_empty() {
            return write!(f, "\u{03b5}");
        }
        for (i, (var, expr)) in self.assignments.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{} := {}", var, expr)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::attrs_from;

    #[test]
    fn test_attr_copy_and_arithmetic() {
        let mut update = Update::empty();
        update
            .assignments
            .insert("x".into(), UpdateExpr::attr("amount"));
        update.assignments.insert(
            "y".into(),
            UpdateExpr::Binary(Operand::Var("x".into()), ArithOp::Add, Operand::Lit(AttrValue::Int(10))),
        );

        let mut state: VarState = [
            ("x".to_string(), Some(AttrValue::Int(50))),
            ("y".to_string(), Some(AttrValue::Int(0))),
        ]
        .into_iter()
        .collect();
        let attrs = attrs_from([("amount", AttrValue::Int(100))]);

        update.apply(&mut state, &attrs);

        // x picks up the event attribute; y reads the pre-update x.
        assert_eq!(state["x"], Some(AttrValue::Int(100)));
        assert_eq!(state["y"], Some(AttrValue::Int(60)));
    }

    #[test]
    fn test_failed_assignment_leaves_variable_unchanged() {
        let mut update = Update::empty();
        update
            .assignments
            .insert("x".into(), UpdateExpr::attr("missing"));
        update
            .assignments
            .insert("y".into(), UpdateExpr::attr("present"));

        let mut state: VarState = [
            ("x".to_string(), Some(AttrValue::Int(1))),
            ("y".to_string(), None),
        ]
        .into_iter()
        .collect();
        let attrs = attrs_from([("present", AttrValue::Int(7))]);

        update.apply(&mut state, &attrs);

        assert_eq!(state["x"], Some(AttrValue::Int(1)));
        assert_eq!(state["y"], Some(AttrValue::Int(7)));
    }

    #[test]
    fn test_division_yields_real_and_guards_zero() {
        let expr = UpdateExpr::Binary(
            Operand::Lit(AttrValue::Int(7)),
            ArithOp::Div,
            Operand::Lit(AttrValue::Int(2)),
        );
        let state = VarState::new();
        let attrs = AttrMap::default();
        assert_eq!(expr.eval(&state, &attrs).unwrap(), AttrValue::Real(3.5));

        let by_zero = UpdateExpr::Binary(
            Operand::Lit(AttrValue::Int(7)),
            ArithOp::Div,
            Operand::Lit(AttrValue::Int(0)),
        );
        assert!(by_zero.eval(&state, &attrs).is_err());
    }

    #[test]
    fn test_parse_round_trip() {
        for text in ["attr.amount", "x + 10", "x / 2", "attr.total - 5", "3.5"] {
            let expr = UpdateExpr::parse(text).unwrap();
            assert_eq!(expr.to_string(), text);
        }
        assert!(UpdateExpr::parse("x + y + z").is_err());
        assert!(UpdateExpr::parse("attr.").is_err());
    }

    #[test]
    fn test_read_vars_exclude_attr_reads() {
        let expr = UpdateExpr::parse("x + 10").unwrap();
        assert_eq!(expr.read_vars(), vec!["x"]);
        let expr = UpdateExpr::parse("attr.amount").unwrap();
        assert!(expr.read_vars().is_empty());
    }

    #[test]
    fn test_display_empty_update() {
        assert_eq!(Update::empty().to_string(), "\u{03b5}");
    }
}
