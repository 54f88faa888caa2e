//! Prefix Tree Acceptor construction
//!
//! The tree is an arena of nodes addressed by integer ids, so merging can
//! redirect nodes through an id map instead of rewiring pointers. Children
//! live in a `BTreeMap` to keep every downstream iteration deterministic.
//!
//! Each edge buffers the attribute dictionaries that traversed it. The
//! recorded dictionary is the *accumulated* valuation of the trace up to and
//! including the current event (later events overwrite earlier keys), which
//! is what guard synthesis later trains on: the data context in which the
//! edge was taken, not just the payload of one event.

use crate::shared::models::{AttrMap, Trace};
use std::collections::BTreeMap;

/// Index of a node in the PTA arena
pub type NodeId = usize;

/// Node of a Prefix Tree Acceptor
#[derive(Debug, Clone)]
pub struct PtaNode {
    pub id: NodeId,
    /// Distance from the root; only the root has depth 0
    pub depth: usize,
    /// True iff at least one ingested trace ends at this node
    pub accepting: bool,
    /// Activity label → child node (at most one per label)
    pub children: BTreeMap<String, NodeId>,
    /// Activity label → attribute dictionaries that traversed the edge
    pub edge_samples: BTreeMap<String, Vec<AttrMap>>,
}

impl PtaNode {
    fn new(id: NodeId, depth: usize) -> Self {
        Self {
            id,
            depth,
            accepting: false,
            children: BTreeMap::new(),
            edge_samples: BTreeMap::new(),
        }
    }

    /// True iff the node has no outgoing edges
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty() && self.edge_samples.is_empty()
    }

    /// Labels with at least one recorded sample
    pub fn outgoing_labels(&self) -> impl Iterator<Item = &str> {
        self.edge_samples.keys().map(String::as_str)
    }
}

/// Summary of one attribute restricted to one outgoing edge
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeStats {
    Numeric {
        count: usize,
        mean: f64,
        std: f64,
        min: f64,
        max: f64,
        quartiles: [f64; 3],
    },
    Categorical {
        /// Textual value → occurrence count
        counts: BTreeMap<String, usize>,
    },
}

/// Prefix Tree Acceptor
#[derive(Debug, Clone)]
pub struct Pta {
    /// Arena of all nodes; the root is `nodes[0]`
    pub nodes: Vec<PtaNode>,
}

impl Default for Pta {
    fn default() -> Self {
        Self::new()
    }
}

impl Pta {
    pub fn new() -> Self {
        Self {
            nodes: vec![PtaNode::new(0, 0)],
        }
    }

    /// Id of the root node
    pub fn root(&self) -> NodeId {
        0
    }

    pub fn node(&self, id: NodeId) -> &PtaNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut PtaNode {
        &mut self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ingest one trace, sharing the prefix it has in common with earlier
    /// traces and marking the terminal node accepting
    pub fn add_trace(&mut self, trace: &Trace) {
        let mut current = self.root();
        let mut carried = AttrMap::default();
        for event in trace {
            for (name, value) in &event.attrs {
                carried.insert(name.clone(), value.clone());
            }
            self.nodes[current]
                .edge_samples
                .entry(event.activity.clone())
                .or_default()
                .push(carried.clone());
            current = match self.nodes[current].children.get(&event.activity) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len();
                    let depth = self.nodes[current].depth + 1;
                    self.nodes.push(PtaNode::new(child, depth));
                    self.nodes[current]
                        .children
                        .insert(event.activity.clone(), child);
                    child
                }
            };
        }
        self.nodes[current].accepting = true;
    }

    /// Summarise one attribute on one outgoing edge; `None` when the edge
    /// carries no sample with that attribute
    pub fn edge_statistics(&self, node: NodeId, label: &str, attr: &str) -> Option<EdgeStats> {
        let samples = self.nodes[node].edge_samples.get(label)?;
        let values: Vec<_> = samples.iter().filter_map(|s| s.get(attr)).collect();
        if values.is_empty() {
            return None;
        }

        // Booleans count as categorical even though they coerce to numbers.
        if values.iter().all(|v| v.is_numeric()) {
            let mut nums: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
            nums.sort_by(f64::total_cmp);
            let count = nums.len();
            let mean = nums.iter().sum::<f64>() / count as f64;
            let variance = nums.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
            Some(EdgeStats::Numeric {
                count,
                mean,
                std: variance.sqrt(),
                min: nums[0],
                max: nums[count - 1],
                quartiles: [
                    super::domains::quantile(&nums, 0.25),
                    super::domains::quantile(&nums, 0.5),
                    super::domains::quantile(&nums, 0.75),
                ],
            })
        } else {
            let mut counts = BTreeMap::new();
            for v in values {
                *counts.entry(v.as_category()).or_insert(0) += 1;
            }
            Some(EdgeStats::Categorical { counts })
        }
    }
}

/// Build a PTA from a set of traces
pub fn build_pta(traces: &[Trace]) -> Pta {
    let mut pta = Pta::new();
    for trace in traces {
        pta.add_trace(trace);
    }
    pta
}
