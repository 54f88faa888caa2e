//! Guard validation solver
//!
//! Checks whether a conjunction of atomic predicates, with an example's
//! attribute values substituted in, is satisfiable. Attributes present in
//! the example make their atoms ground; attributes absent from the example
//! leave their atoms free, and the conjunction stays satisfiable only if
//! the free atoms over each variable are mutually consistent (a non-empty
//! interval for numeric bounds, a single agreed value for equalities).
//!
//! Every check runs in a fresh scope with a wall-clock budget; exceeding it
//! reports a timeout, which the synthesiser treats as a rejection. For the
//! predicate shapes generated here this ground evaluation is
//! observationally equivalent to handing the substituted formula to an SMT
//! solver.

use crate::domain::guard::{AtomicPredicate, ComparisonOp};
use crate::errors::{ProcgraphError, Result};
use crate::shared::models::{AttrMap, AttrValue};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Outcome of one satisfiability check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Some assignment of the free variables satisfies the formula
    Sat,
    /// No assignment does
    Unsat,
    /// The check could not be decided (type mismatch between an example
    /// value and a predicate literal)
    Unknown,
}

/// Satisfiability checker with a per-check budget
#[derive(Debug, Clone)]
pub struct ValidationSolver {
    budget: Duration,
}

/// Accumulated constraints over one free variable
enum FreeConstraint {
    Numeric { lower: f64, upper: f64 },
    Equal(AttrValue),
    Conflicting,
}

impl ValidationSolver {
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }

    /// Substitute the example into the conjunction and check
    /// satisfiability in a fresh scope
    pub fn check(&self, atoms: &[AtomicPredicate], example: &AttrMap) -> Result<Verdict> {
        let deadline = Instant::now() + self.budget;
        let mut free: BTreeMap<&str, FreeConstraint> = BTreeMap::new();

        for atom in atoms {
            if Instant::now() > deadline {
                return Err(ProcgraphError::SolverTimeout);
            }
            match example.get(&atom.var) {
                Some(actual) => match atom.holds_for(actual) {
                    Ok(true) => {}
                    Ok(false) => return Ok(Verdict::Unsat),
                    Err(_) => return Ok(Verdict::Unknown),
                },
                None => {
                    let entry = free
                        .entry(atom.var.as_str())
                        .or_insert(FreeConstraint::Numeric {
                            lower: f64::NEG_INFINITY,
                            upper: f64::INFINITY,
                        });
                    constrain(entry, atom);
                }
            }
        }

        for constraint in free.values() {
            match constraint {
                FreeConstraint::Conflicting => return Ok(Verdict::Unsat),
                FreeConstraint::Numeric { lower, upper } if lower > upper => {
                    return Ok(Verdict::Unsat)
                }
                _ => {}
            }
        }
        Ok(Verdict::Sat)
    }
}

/// Narrow the constraint of a free variable by one atom
fn constrain(constraint: &mut FreeConstraint, atom: &AtomicPredicate) {
    let replacement = match (&mut *constraint, atom.op, atom.value.as_f64()) {
        (FreeConstraint::Conflicting, _, _) => return,
        (FreeConstraint::Numeric { upper, .. }, ComparisonOp::Le, Some(bound)) => {
            *upper = upper.min(bound);
            return;
        }
        (FreeConstraint::Numeric { lower, .. }, ComparisonOp::Ge, Some(bound)) => {
            *lower = lower.max(bound);
            return;
        }
        (FreeConstraint::Numeric { lower, upper }, ComparisonOp::Eq, Some(value)) => {
            // An equality pins the interval to a point.
            if value < *lower || value > *upper {
                FreeConstraint::Conflicting
            } else {
                FreeConstraint::Numeric {
                    lower: value,
                    upper: value,
                }
            }
        }
        (FreeConstraint::Numeric { lower, upper }, ComparisonOp::Eq, None) => {
            // First non-numeric equality; only consistent if the interval
            // is still unconstrained.
            if lower.is_infinite() && upper.is_infinite() {
                FreeConstraint::Equal(atom.value.clone())
            } else {
                FreeConstraint::Conflicting
            }
        }
        (FreeConstraint::Numeric { .. }, _, None) => FreeConstraint::Conflicting,
        (FreeConstraint::Equal(current), _, _) => {
            let consistent = match atom.op {
                ComparisonOp::Eq => *current == atom.value,
                // Ordered bounds over a non-numeric pinned value never hold.
                ComparisonOp::Le | ComparisonOp::Ge => false,
            };
            if consistent {
                return;
            }
            FreeConstraint::Conflicting
        }
    };
    *constraint = replacement;
}
