//! Data-aware Petri net model
//!
//! The net structure lives in a `petgraph` digraph whose nodes are places
//! or transitions and whose edge weights are arc multiplicities. Data
//! annotations (guard, update, read/write variable sets) are kept in a
//! side table keyed by transition id, mirroring how the rest of the crate
//! addresses nodes by stable string ids rather than graph indices.

use crate::domain::guard::Guard;
use crate::domain::update::Update;
use crate::errors::{ProcgraphError, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Node of the bipartite net graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetNode {
    Place {
        id: String,
        label: String,
    },
    /// A transition; `label == None` marks a silent transition
    Transition {
        id: String,
        label: Option<String>,
    },
}

impl NetNode {
    pub fn id(&self) -> &str {
        match self {
            NetNode::Place { id, .. } => id,
            NetNode::Transition { id, .. } => id,
        }
    }

    pub fn is_place(&self) -> bool {
        matches!(self, NetNode::Place { .. })
    }
}

/// Arc of the net, resolved to string ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arc {
    pub source: String,
    pub target: String,
    pub weight: u32,
}

/// Data annotation of one net transition
#[derive(Debug, Clone, PartialEq)]
pub struct DpnTransition {
    pub guard: Guard,
    pub update: Update,
    /// Variables the guard (and update right-hand sides) read
    pub read_vars: BTreeSet<String>,
    /// Variables the update writes
    pub write_vars: BTreeSet<String>,
}

/// Data-aware Petri net
#[derive(Debug, Clone)]
pub struct Dpn {
    pub name: String,
    graph: DiGraph<NetNode, u32>,
    node_index: HashMap<String, NodeIndex>,
    /// Place id → token count
    pub initial_marking: BTreeMap<String, u32>,
    /// Transition id → data annotation
    pub data_transitions: BTreeMap<String, DpnTransition>,
    /// Variable name → declared type name
    pub variables: BTreeMap<String, String>,
}

impl Dpn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graph: DiGraph::new(),
            node_index: HashMap::new(),
            initial_marking: BTreeMap::new(),
            data_transitions: BTreeMap::new(),
            variables: BTreeMap::new(),
        }
    }

    /// Add a place; ids must be unique across places and transitions
    pub fn add_place(&mut self, id: impl Into<String>, label: impl Into<String>) -> Result<()> {
        let id = id.into();
        if self.node_index.contains_key(&id) {
            return Err(ProcgraphError::inconsistent(format!(
                "duplicate net node id '{}'",
                id
            )));
        }
        let idx = self.graph.add_node(NetNode::Place {
            id: id.clone(),
            label: label.into(),
        });
        self.node_index.insert(id, idx);
        Ok(())
    }

    /// Add a (possibly silent) transition
    pub fn add_transition(
        &mut self,
        id: impl Into<String>,
        label: Option<String>,
    ) -> Result<()> {
        let id = id.into();
        if self.node_index.contains_key(&id) {
            return Err(ProcgraphError::inconsistent(format!(
                "duplicate net node id '{}'",
                id
            )));
        }
        let idx = self.graph.add_node(NetNode::Transition {
            id: id.clone(),
            label,
        });
        self.node_index.insert(id, idx);
        Ok(())
    }

    /// Add an arc between two existing nodes
    pub fn add_arc(
        &mut self,
        source: &str,
        target: &str,
        weight: u32,
    ) -> Result<()> {
        let from = self.lookup(source)?;
        let to = self.lookup(target)?;
        self.graph.add_edge(from, to, weight);
        Ok(())
    }

    fn lookup(&self, id: &str) -> Result<NodeIndex> {
        self.node_index.get(id).copied().ok_or_else(|| {
            ProcgraphError::inconsistent(format!("arc references unknown node '{}'", id))
        })
    }

    /// Places in insertion order as `(id, label)`
    pub fn places(&self) -> Vec<(&str, &str)> {
        self.graph
            .node_indices()
            .filter_map(|idx| match &self.graph[idx] {
                NetNode::Place { id, label } => Some((id.as_str(), label.as_str())),
                NetNode::Transition { .. } => None,
            })
            .collect()
    }

    /// Transitions in insertion order as `(id, label)`
    pub fn transitions(&self) -> Vec<(&str, Option<&str>)> {
        self.graph
            .node_indices()
            .filter_map(|idx| match &self.graph[idx] {
                NetNode::Transition { id, label } => Some((id.as_str(), label.as_deref())),
                NetNode::Place { .. } => None,
            })
            .collect()
    }

    /// All arcs in insertion order
    pub fn arcs(&self) -> Vec<Arc> {
        self.graph
            .edge_references()
            .map(|edge| Arc {
                source: self.graph[edge.source()].id().to_string(),
                target: self.graph[edge.target()].id().to_string(),
                weight: *edge.weight(),
            })
            .collect()
    }

    /// Number of places
    pub fn place_count(&self) -> usize {
        self.graph
            .node_indices()
            .filter(|idx| self.graph[*idx].is_place())
            .count()
    }

    /// Number of transitions (including silent ones)
    pub fn transition_count(&self) -> usize {
        self.graph.node_count() - self.place_count()
    }

    /// Number of arcs
    pub fn arc_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Labelled transitions matching an activity, with their annotations,
    /// in insertion order
    pub fn candidates_for(&self, activity: &str) -> Vec<(&str, &DpnTransition)> {
        self.graph
            .node_indices()
            .filter_map(|idx| match &self.graph[idx] {
                NetNode::Transition {
                    id,
                    label: Some(label),
                } if label == activity => self
                    .data_transitions
                    .get(id)
                    .map(|data| (id.as_str(), data)),
                _ => None,
            })
            .collect()
    }

    /// Ids of input (source) nodes of arcs into `id`
    pub fn preset(&self, id: &str) -> Result<Vec<&str>> {
        let idx = self.lookup(id)?;
        Ok(self
            .graph
            .edges_directed(idx, petgraph::Direction::Incoming)
            .map(|edge| self.graph[edge.source()].id())
            .collect())
    }

    /// Ids of output (target) nodes of arcs out of `id`
    pub fn postset(&self, id: &str) -> Result<Vec<&str>> {
        let idx = self.lookup(id)?;
        Ok(self
            .graph
            .edges_directed(idx, petgraph::Direction::Outgoing)
            .map(|edge| self.graph[edge.target()].id())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_small_net() {
        let mut dpn = Dpn::new("net");
        dpn.add_place("p0", "start").unwrap();
        dpn.add_place("p1", "done").unwrap();
        dpn.add_transition("t0", Some("A".into())).unwrap();
        dpn.add_arc("p0", "t0", 1).unwrap();
        dpn.add_arc("t0", "p1", 1).unwrap();
        dpn.initial_marking.insert("p0".into(), 1);

        assert_eq!(dpn.place_count(), 2);
        assert_eq!(dpn.transition_count(), 1);
        assert_eq!(dpn.arc_count(), 2);
        assert_eq!(dpn.preset("t0").unwrap(), vec!["p0"]);
        assert_eq!(dpn.postset("t0").unwrap(), vec!["p1"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut dpn = Dpn::new("net");
        dpn.add_place("p0", "p0").unwrap();
        assert!(dpn.add_transition("p0", None).is_err());
    }

    #[test]
    fn test_unknown_arc_endpoint_rejected() {
        let mut dpn = Dpn::new("net");
        dpn.add_place("p0", "p0").unwrap();
        assert!(dpn.add_arc("p0", "ghost", 1).is_err());
    }

    #[test]
    fn test_candidates_by_label() {
        let mut dpn = Dpn::new("net");
        dpn.add_place("p0", "p0").unwrap();
        dpn.add_transition("t0", Some("A".into())).unwrap();
        dpn.add_transition("t1", Some("B".into())).unwrap();
        dpn.add_transition("tau", None).unwrap();
        dpn.data_transitions.insert(
            "t0".into(),
            DpnTransition {
                guard: Guard::True,
                update: Update::empty(),
                read_vars: BTreeSet::new(),
                write_vars: BTreeSet::new(),
            },
        );
        dpn.data_transitions.insert(
            "t1".into(),
            DpnTransition {
                guard: Guard::True,
                update: Update::empty(),
                read_vars: BTreeSet::new(),
                write_vars: BTreeSet::new(),
            },
        );

        let candidates = dpn.candidates_for("A");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].0, "t0");
    }
}
