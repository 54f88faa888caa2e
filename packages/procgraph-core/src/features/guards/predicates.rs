//! Candidate atomic predicates
//!
//! For every guardable attribute seen in the training examples, enumerate a
//! bounded set of threshold and equality predicates. Numeric candidates are
//! listed before categorical ones so the search prefers thresholds over
//! equalities when both classify correctly.

use crate::domain::efsm::Dtype;
use crate::domain::guard::AtomicPredicate;
use crate::features::domains::{quantile, AttributeDomain};
use crate::shared::models::{AttrMap, AttrValue};
use std::collections::BTreeMap;

/// Hard cap on thresholds per attribute
const MAX_THRESHOLDS: usize = 20;

/// Distinct-value count up to which every observed value becomes a
/// threshold
const MAX_ENUMERATED_VALUES: usize = 10;

/// Categorical values considered for equality predicates
const MAX_CATEGORY_PREDICATES: usize = 10;

/// Generate the ordered candidate list for one abstract transition
pub fn candidate_predicates(
    domains: &BTreeMap<String, AttributeDomain>,
    positives: &[AttrMap],
    negatives: &[AttrMap],
) -> Vec<AtomicPredicate> {
    let mut attrs: Vec<&String> = positives
        .iter()
        .chain(negatives)
        .flat_map(|example| example.keys())
        .collect();
    attrs.sort();
    attrs.dedup();

    let mut numeric = Vec::new();
    let mut categorical = Vec::new();
    for attr in attrs {
        let Some(domain) = domains.get(attr) else {
            continue;
        };
        match domain.dtype {
            Dtype::Int | Dtype::Float => numeric.extend(numeric_predicates(
                attr,
                domain,
                positives,
                negatives,
            )),
            Dtype::Cat => categorical.extend(categorical_predicates(attr, domain)),
            // Wide string attributes never gate transitions.
            Dtype::String => {}
        }
    }
    numeric.extend(categorical);
    numeric
}

fn collect_values(attr: &str, examples: &[AttrMap]) -> Vec<f64> {
    examples
        .iter()
        .filter_map(|example| example.get(attr))
        .filter_map(AttrValue::as_f64)
        .collect()
}

fn numeric_predicates(
    attr: &str,
    domain: &AttributeDomain,
    positives: &[AttrMap],
    negatives: &[AttrMap],
) -> Vec<AtomicPredicate> {
    let pos = collect_values(attr, positives);
    let neg = collect_values(attr, negatives);
    if pos.is_empty() && neg.is_empty() {
        return Vec::new();
    }

    let mut thresholds: Vec<f64> = Vec::new();

    if !pos.is_empty() && !neg.is_empty() {
        let pos_min = pos.iter().copied().fold(f64::INFINITY, f64::min);
        let pos_max = pos.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let neg_min = neg.iter().copied().fold(f64::INFINITY, f64::min);
        let neg_max = neg.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        // A midpoint separates the groups outright when they are disjoint.
        if pos_max < neg_min {
            thresholds.push((pos_max + neg_min) / 2.0);
        } else if neg_max < pos_min {
            thresholds.push((neg_max + pos_min) / 2.0);
        }
        thresholds.extend([pos_min, pos_max, neg_min, neg_max]);
    }

    if let Some(quartiles) = domain.quartiles {
        thresholds.extend(quartiles);
    }
    for group in [&pos, &neg] {
        if !group.is_empty() {
            let mut sorted = group.clone();
            sorted.sort_by(f64::total_cmp);
            thresholds.extend([
                quantile(&sorted, 0.25),
                quantile(&sorted, 0.5),
                quantile(&sorted, 0.75),
            ]);
        }
    }

    let mut distinct: Vec<f64> = pos.iter().chain(neg.iter()).copied().collect();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    if distinct.len() <= MAX_ENUMERATED_VALUES {
        thresholds.extend(distinct);
    }

    thresholds.sort_by(f64::total_cmp);
    thresholds.dedup();
    let thresholds = downsample(thresholds, MAX_THRESHOLDS);

    // Integer truncation can collapse neighbouring thresholds, so dedup
    // the literal values rather than the raw floats.
    let mut values: Vec<AttrValue> = thresholds
        .into_iter()
        .map(|threshold| match domain.dtype {
            Dtype::Int => AttrValue::Int(threshold as i64),
            _ => AttrValue::Real(threshold),
        })
        .collect();
    values.dedup();

    let mut predicates = Vec::with_capacity(values.len() * 2);
    for value in values {
        predicates.push(AtomicPredicate::le(attr, value.clone()));
        predicates.push(AtomicPredicate::ge(attr, value));
    }
    predicates
}

/// Pick `limit` entries evenly spaced by index
fn downsample(values: Vec<f64>, limit: usize) -> Vec<f64> {
    if values.len() <= limit {
        return values;
    }
    let last = values.len() - 1;
    (0..limit)
        .map(|i| values[(i as f64 * last as f64 / (limit - 1) as f64) as usize])
        .collect()
}

fn categorical_predicates(attr: &str, domain: &AttributeDomain) -> Vec<AtomicPredicate> {
    domain
        .values
        .iter()
        .take(MAX_CATEGORY_PREDICATES)
        .map(|value| AtomicPredicate::eq(attr, value.clone()))
        .collect()
}
