//! Guard synthesis
//!
//! Searches small conjunctions of candidate predicates that accept every
//! positive example and reject every negative one. The search enumerates
//! contiguous windows of the ordered candidate list, growing the window
//! length up to `max_conjuncts`, and returns the first conjunction the
//! validator accepts. With nothing to separate (no positives or no
//! negatives) or no validating candidate, the trivial guard is returned.

use super::predicates::candidate_predicates;
use super::solver::{ValidationSolver, Verdict};
use crate::domain::guard::{AtomicPredicate, Guard};
use crate::features::domains::AttributeDomain;
use crate::shared::models::AttrMap;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Options of the synthesis search
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    /// Maximum conjunction length
    pub max_conjuncts: usize,
    /// Per-check solver budget
    pub solver_budget: Duration,
    /// Cap on examples per side; the deterministic head is kept
    pub max_examples_per_side: usize,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            max_conjuncts: 3,
            solver_budget: Duration::from_secs(5),
            max_examples_per_side: 50,
        }
    }
}

/// Learn a guard for one abstract transition
pub fn synthesize_guard(
    positives: &[AttrMap],
    negatives: &[AttrMap],
    domains: &BTreeMap<String, AttributeDomain>,
    options: &SynthesisOptions,
) -> Guard {
    if positives.is_empty() || negatives.is_empty() {
        return Guard::True;
    }

    let predicates = candidate_predicates(domains, positives, negatives);
    if predicates.is_empty() {
        return Guard::True;
    }
    debug!(
        candidates = predicates.len(),
        positives = positives.len(),
        negatives = negatives.len(),
        "searching guard conjunctions"
    );

    let positives = head(positives, options.max_examples_per_side);
    let negatives = head(negatives, options.max_examples_per_side);
    let solver = ValidationSolver::new(options.solver_budget);

    for length in 1..=options.max_conjuncts.min(predicates.len()) {
        for window in predicates.windows(length) {
            if validate(&solver, window, positives, negatives) {
                return Guard::Conjunction(window.to_vec());
            }
        }
    }
    Guard::True
}

fn head(examples: &[AttrMap], limit: usize) -> &[AttrMap] {
    &examples[..examples.len().min(limit)]
}

/// A candidate is valid when every positive substitution is satisfiable
/// and every negative substitution is unsatisfiable. Timeouts and
/// undecided checks reject the candidate.
fn validate(
    solver: &ValidationSolver,
    atoms: &[AtomicPredicate],
    positives: &[AttrMap],
    negatives: &[AttrMap],
) -> bool {
    for example in positives {
        match solver.check(atoms, example) {
            Ok(Verdict::Sat) => {}
            _ => return false,
        }
    }
    for example in negatives {
        match solver.check(atoms, example) {
            Ok(Verdict::Unsat) => {}
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::efsm::Dtype;
    use crate::domain::guard::ComparisonOp;
    use crate::shared::models::{attrs_from, AttrValue};

    fn int_domain(name: &str, values: &[f64]) -> AttributeDomain {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        AttributeDomain {
            name: name.to_string(),
            dtype: Dtype::Int,
            min: sorted.first().copied(),
            max: sorted.last().copied(),
            quartiles: Some([
                crate::features::domains::quantile(&sorted, 0.25),
                crate::features::domains::quantile(&sorted, 0.5),
                crate::features::domains::quantile(&sorted, 0.75),
            ]),
            values: Vec::new(),
        }
    }

    #[test]
    fn test_separating_threshold_found() {
        let domains = BTreeMap::from([(
            "amount".to_string(),
            int_domain("amount", &[50.0, 50.0, 500.0, 500.0]),
        )]);
        let positives = vec![
            attrs_from([("amount", AttrValue::Int(50))]),
            attrs_from([("amount", AttrValue::Int(50))]),
        ];
        let negatives = vec![
            attrs_from([("amount", AttrValue::Int(500))]),
            attrs_from([("amount", AttrValue::Int(500))]),
        ];

        let guard = synthesize_guard(&positives, &negatives, &domains, &Default::default());
        match guard {
            Guard::Conjunction(atoms) => {
                assert_eq!(atoms.len(), 1);
                let atom = &atoms[0];
                assert_eq!(atom.var, "amount");
                assert_eq!(atom.op, ComparisonOp::Le);
                let k = atom.value.as_f64().unwrap();
                assert!((50.0..500.0).contains(&k));
            }
            other => panic!("expected a threshold conjunction, got {}", other),
        }
    }

    #[test]
    fn test_mirror_side_gets_lower_bound() {
        let domains = BTreeMap::from([(
            "amount".to_string(),
            int_domain("amount", &[50.0, 50.0, 500.0, 500.0]),
        )]);
        let positives = vec![attrs_from([("amount", AttrValue::Int(500))])];
        let negatives = vec![attrs_from([("amount", AttrValue::Int(50))])];

        let guard = synthesize_guard(&positives, &negatives, &domains, &Default::default());
        match guard {
            Guard::Conjunction(atoms) => {
                assert_eq!(atoms[0].op, ComparisonOp::Ge);
                let k = atoms[0].value.as_f64().unwrap();
                assert!((50.0..=500.0).contains(&k));
            }
            other => panic!("expected a threshold conjunction, got {}", other),
        }
    }

    #[test]
    fn test_no_negatives_yields_trivial_guard() {
        let domains = BTreeMap::from([("x".to_string(), int_domain("x", &[1.0]))]);
        let positives = vec![attrs_from([("x", AttrValue::Int(1))])];
        let guard = synthesize_guard(&positives, &[], &domains, &Default::default());
        assert_eq!(guard, Guard::True);
    }

    #[test]
    fn test_no_positives_yields_trivial_guard() {
        let domains = BTreeMap::from([("x".to_string(), int_domain("x", &[1.0]))]);
        let negatives = vec![attrs_from([("x", AttrValue::Int(1))])];
        let guard = synthesize_guard(&[], &negatives, &domains, &Default::default());
        assert_eq!(guard, Guard::True);
    }

    #[test]
    fn test_inseparable_examples_yield_trivial_guard() {
        let domains = BTreeMap::from([("x".to_string(), int_domain("x", &[5.0]))]);
        let positives = vec![attrs_from([("x", AttrValue::Int(5))])];
        let negatives = vec![attrs_from([("x", AttrValue::Int(5))])];
        let guard = synthesize_guard(&positives, &negatives, &domains, &Default::default());
        assert_eq!(guard, Guard::True);
    }

    #[test]
    fn test_categorical_separation() {
        let domains = BTreeMap::from([(
            "tier".to_string(),
            AttributeDomain {
                name: "tier".into(),
                dtype: Dtype::Cat,
                min: None,
                max: None,
                quartiles: None,
                values: vec![
                    AttrValue::Str("gold".into()),
                    AttrValue::Str("base".into()),
                ],
            },
        )]);
        let positives = vec![attrs_from([("tier", AttrValue::Str("gold".into()))])];
        let negatives = vec![attrs_from([("tier", AttrValue::Str("base".into()))])];

        let guard = synthesize_guard(&positives, &negatives, &domains, &Default::default());
        assert_eq!(
            guard,
            Guard::Conjunction(vec![AtomicPredicate::eq(
                "tier",
                AttrValue::Str("gold".into())
            )])
        );
    }

    #[test]
    fn test_synthesized_guard_classifies_training_examples() {
        let domains = BTreeMap::from([(
            "v".to_string(),
            int_domain("v", &[1.0, 2.0, 3.0, 8.0, 9.0, 10.0]),
        )]);
        let positives: Vec<AttrMap> = [1, 2, 3]
            .iter()
            .map(|&v| attrs_from([("v", AttrValue::Int(v))]))
            .collect();
        let negatives: Vec<AttrMap> = [8, 9, 10]
            .iter()
            .map(|&v| attrs_from([("v", AttrValue::Int(v))]))
            .collect();

        let guard = synthesize_guard(&positives, &negatives, &domains, &Default::default());
        let Guard::Conjunction(atoms) = &guard else {
            panic!("expected a conjunction, got {}", guard);
        };
        let solver = ValidationSolver::new(Duration::from_secs(5));
        for example in &positives {
            assert_eq!(solver.check(atoms, example).unwrap(), Verdict::Sat);
        }
        for example in &negatives {
            assert_eq!(solver.check(atoms, example).unwrap(), Verdict::Unsat);
        }
    }
}
