//! Statistical state compatibility
//!
//! Two PTA nodes are merge-compatible when, for every attribute, the
//! empirical distributions of that attribute on their common outgoing
//! edges stay close: Jensen-Shannon distance (base 2) for categorical
//! data, normalised mean distance for numeric data.

use crate::features::pta::{EdgeStats, NodeId, Pta};
use std::collections::BTreeSet;
use tracing::trace;

/// Options of the compatibility check
#[derive(Debug, Clone, Copy)]
pub struct CompatibilityOptions {
    /// Maximum allowed per-attribute divergence
    pub divergence_threshold: f64,
    /// Require identical outgoing-label sets instead of comparing over
    /// common labels only
    pub require_matching_labels: bool,
}

/// Check whether two nodes may be merged
///
/// Labels present in only one node are ignored (unless
/// `require_matching_labels` is set); with no common label the nodes are
/// incompatible, except that two nodes with no outgoing edges at all are
/// trivially compatible.
pub fn are_states_compatible(
    pta: &Pta,
    left: NodeId,
    right: NodeId,
    attribute_names: &[String],
    options: &CompatibilityOptions,
) -> bool {
    let labels_left: BTreeSet<&str> = pta.node(left).outgoing_labels().collect();
    let labels_right: BTreeSet<&str> = pta.node(right).outgoing_labels().collect();

    if labels_left.is_empty() && labels_right.is_empty() {
        // Two endpoints of the process: nothing observable distinguishes
        // them.
        return true;
    }
    if options.require_matching_labels && labels_left != labels_right {
        return false;
    }
    let common: Vec<&str> = labels_left.intersection(&labels_right).copied().collect();
    if common.is_empty() {
        return false;
    }

    for attr in attribute_names {
        if let Some(divergence) = attribute_divergence(pta, left, right, &common, attr) {
            trace!(
                attr = attr.as_str(),
                divergence,
                "attribute divergence between {} and {}",
                left,
                right
            );
            if divergence > options.divergence_threshold {
                return false;
            }
        }
    }
    true
}

/// Average divergence of one attribute across the given common labels;
/// `None` when no label has data on both sides
pub fn attribute_divergence(
    pta: &Pta,
    left: NodeId,
    right: NodeId,
    common_labels: &[&str],
    attr: &str,
) -> Option<f64> {
    let mut divergences = Vec::new();
    for label in common_labels {
        let stats_left = pta.edge_statistics(left, label, attr);
        let stats_right = pta.edge_statistics(right, label, attr);
        match (stats_left, stats_right) {
            (
                Some(EdgeStats::Categorical { counts: a }),
                Some(EdgeStats::Categorical { counts: b }),
            ) => divergences.push(jensen_shannon_distance(&a, &b)),
            (
                Some(EdgeStats::Numeric {
                    mean: mean_a,
                    min: min_a,
                    max: max_a,
                    ..
                }),
                Some(EdgeStats::Numeric {
                    mean: mean_b,
                    min: min_b,
                    max: max_b,
                    ..
                }),
            ) => {
                let range = ((max_a - min_a).abs())
                    .max((max_b - min_b).abs())
                    .max(1.0);
                divergences.push(((mean_a - mean_b).abs() / range).min(1.0));
            }
            // One side numeric, one categorical, or data missing on either
            // side: this label contributes nothing.
            _ => {}
        }
    }
    if divergences.is_empty() {
        None
    } else {
        Some(divergences.iter().sum::<f64>() / divergences.len() as f64)
    }
}

/// Jensen-Shannon distance (base-2 logarithm, range [0, 1]) between two
/// empirical value-count distributions
pub fn jensen_shannon_distance(
    counts_a: &std::collections::BTreeMap<String, usize>,
    counts_b: &std::collections::BTreeMap<String, usize>,
) -> f64 {
    let total_a: usize = counts_a.values().sum();
    let total_b: usize = counts_b.values().sum();
    if total_a == 0 || total_b == 0 {
        return 0.0;
    }

    let support: BTreeSet<&String> = counts_a.keys().chain(counts_b.keys()).collect();
    let mut divergence = 0.0;
    for value in support {
        let p = counts_a.get(value).copied().unwrap_or(0) as f64 / total_a as f64;
        let q = counts_b.get(value).copied().unwrap_or(0) as f64 / total_b as f64;
        let m = 0.5 * (p + q);
        if p > 0.0 {
            divergence += 0.5 * p * (p / m).log2();
        }
        if q > 0.0 {
            divergence += 0.5 * q * (q / m).log2();
        }
    }
    divergence.max(0.0).sqrt().clamp(0.0, 1.0)
}
