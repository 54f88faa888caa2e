//! Attribute domain inference
//!
//! Scans the corpus once and, for every attribute name observed, classifies
//! its data type, computes range/quartile summaries for numeric attributes,
//! enumerates categorical value sets, and estimates how persistently each
//! attribute propagates along a trace.

use crate::domain::efsm::Dtype;
use crate::shared::models::{AttrValue, Trace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum distinct values before a string attribute stops being
/// categorical and is excluded from guard synthesis
const MAX_CATEGORICAL_VALUES: usize = 20;

/// How reliably an attribute keeps its value across the events of a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropagationClass {
    /// Persistence ratio >= 0.7
    Persistent,
    /// Persistence ratio > 0.3
    Sometimes,
    /// Everything below
    Transient,
}

/// Inferred domain of one attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDomain {
    pub name: String,
    pub dtype: Dtype,
    /// Minimum observed value (numeric dtypes only)
    pub min: Option<f64>,
    /// Maximum observed value (numeric dtypes only)
    pub max: Option<f64>,
    /// 25th/50th/75th percentiles (numeric dtypes only)
    pub quartiles: Option<[f64; 3]>,
    /// Categorical values ordered by descending frequency, ties broken
    /// lexicographically (`cat` dtype only)
    pub values: Vec<AttrValue>,
}

impl AttributeDomain {
    /// Whether guard candidates may be generated over this attribute
    pub fn guardable(&self) -> bool {
        !matches!(self.dtype, Dtype::String)
    }
}

/// Infer a domain for every attribute observed in the traces
pub fn infer_attribute_domains(traces: &[Trace]) -> BTreeMap<String, AttributeDomain> {
    let mut observed: BTreeMap<String, Vec<&AttrValue>> = BTreeMap::new();
    for trace in traces {
        for event in trace {
            for (name, value) in &event.attrs {
                observed.entry(name.clone()).or_default().push(value);
            }
        }
    }

    observed
        .into_iter()
        .map(|(name, values)| {
            let domain = classify(&name, &values);
            (name, domain)
        })
        .collect()
}

fn classify(name: &str, values: &[&AttrValue]) -> AttributeDomain {
    let all_int = values
        .iter()
        .all(|v| matches!(v, AttrValue::Int(_)));
    let all_numeric = values.iter().all(|v| v.is_numeric());
    let all_discrete = values
        .iter()
        .all(|v| matches!(v, AttrValue::Str(_) | AttrValue::Bool(_)));

    if all_int {
        return numeric_domain(name, Dtype::Int, values);
    }
    if all_numeric {
        return numeric_domain(name, Dtype::Float, values);
    }
    if all_discrete {
        // Count frequencies over the textual form; booleans become the
        // two-valued categories "true"/"false".
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for v in values {
            *counts.entry(v.as_category()).or_insert(0) += 1;
        }
        if counts.len() <= MAX_CATEGORICAL_VALUES {
            let all_bool = values.iter().all(|v| matches!(v, AttrValue::Bool(_)));
            let mut ordered: Vec<(String, usize)> = counts.into_iter().collect();
            ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            let values = ordered
                .into_iter()
                .map(|(text, _)| {
                    if all_bool {
                        AttrValue::Bool(text == "true")
                    } else {
                        AttrValue::Str(text)
                    }
                })
                .collect();
            return AttributeDomain {
                name: name.to_string(),
                dtype: Dtype::Cat,
                min: None,
                max: None,
                quartiles: None,
                values,
            };
        }
    }

    AttributeDomain {
        name: name.to_string(),
        dtype: Dtype::String,
        min: None,
        max: None,
        quartiles: None,
        values: Vec::new(),
    }
}

fn numeric_domain(name: &str, dtype: Dtype, values: &[&AttrValue]) -> AttributeDomain {
    let mut nums: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
    nums.sort_by(f64::total_cmp);
    let min = nums.first().copied();
    let max = nums.last().copied();
    let quartiles = if nums.is_empty() {
        None
    } else {
        Some([
            quantile(&nums, 0.25),
            quantile(&nums, 0.5),
            quantile(&nums, 0.75),
        ])
    };
    AttributeDomain {
        name: name.to_string(),
        dtype,
        min,
        max,
        quartiles,
        values: Vec::new(),
    }
}

/// Quantile with linear interpolation over a sorted slice
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = pos - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Classify how each attribute propagates along traces
///
/// For every occurrence with an earlier occurrence of the same attribute in
/// the same trace, count whether the value stayed the same. Attributes that
/// never repeat within a trace have nothing to propagate and come out
/// `Transient`.
pub fn detect_variable_propagation(
    traces: &[Trace],
) -> BTreeMap<String, PropagationClass> {
    let mut comparable: BTreeMap<String, usize> = BTreeMap::new();
    let mut stable: BTreeMap<String, usize> = BTreeMap::new();

    for trace in traces {
        let mut last_values: BTreeMap<&str, &AttrValue> = BTreeMap::new();
        for event in trace {
            for (name, value) in &event.attrs {
                if let Some(previous) = last_values.get(name.as_str()) {
                    *comparable.entry(name.clone()).or_insert(0) += 1;
                    if *previous == value {
                        *stable.entry(name.clone()).or_insert(0) += 1;
                    }
                }
                last_values.insert(name.as_str(), value);
            }
        }
    }

    let mut classes = BTreeMap::new();
    for (name, total) in comparable {
        let ratio = stable.get(&name).copied().unwrap_or(0) as f64 / total as f64;
        let class = if ratio >= 0.7 {
            PropagationClass::Persistent
        } else if ratio > 0.3 {
            PropagationClass::Sometimes
        } else {
            PropagationClass::Transient
        };
        classes.insert(name, class);
    }

    // Attributes seen only once per trace never had a comparable pair.
    let mut seen: BTreeMap<String, ()> = BTreeMap::new();
    for trace in traces {
        for event in trace {
            for name in event.attrs.keys() {
                seen.entry(name.clone()).or_insert(());
            }
        }
    }
    for name in seen.into_keys() {
        classes.entry(name).or_insert(PropagationClass::Transient);
    }

    classes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{attrs_from, Event};

    fn trace_of(events: Vec<(&str, Vec<(&'static str, AttrValue)>)>) -> Trace {
        events
            .into_iter()
            .map(|(label, attrs)| Event::new(label, attrs_from(attrs)))
            .collect()
    }

    #[test]
    fn test_int_classification_with_range() {
        let traces = vec![trace_of(vec![
            ("A", vec![("amount", AttrValue::Int(100))]),
            ("B", vec![("amount", AttrValue::Int(200))]),
        ])];

        let domains = infer_attribute_domains(&traces);
        let amount = &domains["amount"];
        assert_eq!(amount.dtype, Dtype::Int);
        assert_eq!(amount.min, Some(100.0));
        assert_eq!(amount.max, Some(200.0));
        assert_eq!(amount.quartiles, Some([125.0, 150.0, 175.0]));
    }

    #[test]
    fn test_mixed_numeric_becomes_float() {
        let traces = vec![trace_of(vec![
            ("A", vec![("v", AttrValue::Int(1))]),
            ("B", vec![("v", AttrValue::Real(2.5))]),
        ])];
        assert_eq!(infer_attribute_domains(&traces)["v"].dtype, Dtype::Float);
    }

    #[test]
    fn test_categorical_ordering_by_frequency() {
        let traces = vec![trace_of(vec![
            ("A", vec![("cat", AttrValue::Str("normal".into()))]),
            ("B", vec![("cat", AttrValue::Str("urgent".into()))]),
            ("C", vec![("cat", AttrValue::Str("urgent".into()))]),
        ])];

        let domain = &infer_attribute_domains(&traces)["cat"];
        assert_eq!(domain.dtype, Dtype::Cat);
        assert_eq!(
            domain.values,
            vec![
                AttrValue::Str("urgent".into()),
                AttrValue::Str("normal".into())
            ]
        );
    }

    #[test]
    fn test_wide_string_attribute_excluded() {
        let events: Vec<(&str, Vec<(&'static str, AttrValue)>)> = (0..25)
            .map(|i| ("A", vec![("id", AttrValue::Str(format!("u{}", i)))]))
            .collect();
        let traces = vec![trace_of(events)];

        let domain = &infer_attribute_domains(&traces)["id"];
        assert_eq!(domain.dtype, Dtype::String);
        assert!(!domain.guardable());
    }

    #[test]
    fn test_bool_is_two_valued_categorical() {
        let traces = vec![trace_of(vec![
            ("A", vec![("flag", AttrValue::Bool(true))]),
            ("B", vec![("flag", AttrValue::Bool(true))]),
            ("C", vec![("flag", AttrValue::Bool(false))]),
        ])];
        let domain = &infer_attribute_domains(&traces)["flag"];
        assert_eq!(domain.dtype, Dtype::Cat);
        assert_eq!(
            domain.values,
            vec![AttrValue::Bool(true), AttrValue::Bool(false)]
        );
    }

    #[test]
    fn test_mixed_numeric_and_string_excluded() {
        let traces = vec![trace_of(vec![
            ("A", vec![("v", AttrValue::Int(1))]),
            ("B", vec![("v", AttrValue::Str("one".into()))]),
        ])];
        assert_eq!(infer_attribute_domains(&traces)["v"].dtype, Dtype::String);
    }

    #[test]
    fn test_persistent_propagation() {
        let steady = |x: i64| {
            trace_of(vec![
                ("A", vec![("x", AttrValue::Int(x))]),
                ("B", vec![("x", AttrValue::Int(x))]),
                ("C", vec![("x", AttrValue::Int(x))]),
            ])
        };
        let traces = vec![
            steady(10),
            steady(10),
            steady(10),
            steady(20),
            steady(20),
            steady(20),
        ];

        let classes = detect_variable_propagation(&traces);
        assert_eq!(classes["x"], PropagationClass::Persistent);
    }

    #[test]
    fn test_transient_propagation() {
        let traces = vec![trace_of(vec![
            ("A", vec![("n", AttrValue::Int(1))]),
            ("B", vec![("n", AttrValue::Int(2))]),
            ("C", vec![("n", AttrValue::Int(3))]),
        ])];
        let classes = detect_variable_propagation(&traces);
        assert_eq!(classes["n"], PropagationClass::Transient);
    }

    #[test]
    fn test_single_occurrence_defaults_transient() {
        let traces = vec![trace_of(vec![("A", vec![("once", AttrValue::Int(1))])])];
        let classes = detect_variable_propagation(&traces);
        assert_eq!(classes["once"], PropagationClass::Transient);
    }

    #[test]
    fn test_quantile_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.5), 2.5);
        assert_eq!(quantile(&sorted, 0.25), 1.75);
        assert_eq!(quantile(&sorted, 0.0), 1.0);
        assert_eq!(quantile(&sorted, 1.0), 4.0);
    }
}
