//! Blue-fringe state merging
//!
//! Red nodes are confirmed states, blue nodes the frontier. Each blue node
//! is either folded into the first compatible red node or promoted to red.
//! Folding recurses into same-labelled children so merges propagate down
//! the tree; children of the dropped node without a counterpart are
//! reparented and join the frontier.
//!
//! Merged identities are tracked in an id map rather than by rewiring node
//! references; a final path-compression pass makes the map idempotent. The
//! distinct fixed points are the EFSM states. Blue and red candidates are
//! always visited in ascending id order, so the outcome is reproducible.

use super::compatibility::{are_states_compatible, CompatibilityOptions};
use crate::features::pta::{NodeId, Pta};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Mapping from PTA node id to representative node id
pub type StateMap = BTreeMap<NodeId, NodeId>;

/// Run blue-fringe merging over the PTA
///
/// Mutates the tree in place (buffers of dropped nodes are drained into
/// their representatives) and returns the idempotent state map.
pub fn blue_fringe_merge(
    pta: &mut Pta,
    attribute_names: &[String],
    options: &CompatibilityOptions,
) -> StateMap {
    info!(
        nodes = pta.len(),
        attributes = attribute_names.len(),
        threshold = options.divergence_threshold,
        "starting blue-fringe merge"
    );

    let mut map: StateMap = (0..pta.len()).map(|id| (id, id)).collect();
    let mut red: BTreeSet<NodeId> = BTreeSet::from([pta.root()]);
    let mut blue: BTreeSet<NodeId> = pta
        .node(pta.root())
        .children
        .values()
        .copied()
        .collect();

    let mut merges = 0usize;
    while let Some(&candidate) = blue.iter().next() {
        blue.remove(&candidate);
        // A fold from an earlier merge may already have absorbed this node.
        if map[&candidate] != candidate {
            continue;
        }

        let mut merged = false;
        for &keeper in &red {
            if !are_states_compatible(pta, keeper, candidate, attribute_names, options) {
                continue;
            }
            debug!("merging blue {} into red {}", candidate, keeper);

            // Children of the blue node without a counterpart under the
            // keeper survive the fold as new branches; they join the
            // frontier afterwards.
            let new_branches: Vec<NodeId> = pta
                .node(candidate)
                .children
                .iter()
                .filter(|(label, _)| !pta.node(keeper).children.contains_key(*label))
                .map(|(_, &child)| child)
                .collect();

            merge_states(pta, keeper, candidate, &mut map);
            merges += 1;

            for child in new_branches {
                if !red.contains(&child) && !blue.contains(&child) && map[&child] == child {
                    blue.insert(child);
                }
            }
            merged = true;
            break;
        }

        if !merged {
            debug!("promoting blue {} to red", candidate);
            red.insert(candidate);
            for &child in pta.node(candidate).children.values() {
                if !red.contains(&child) && !blue.contains(&child) && map[&child] == child {
                    blue.insert(child);
                }
            }
        }
    }

    compress_paths(&mut map);
    info!(
        merges,
        states = map.values().collect::<BTreeSet<_>>().len(),
        "merge complete"
    );
    map
}

/// Fold `drop` into `keep`: recurse into same-labelled child pairs,
/// reparent the rest, concatenate edge buffers, OR the accepting flags
pub fn merge_states(pta: &mut Pta, keep: NodeId, drop: NodeId, map: &mut StateMap) {
    if keep == drop || map[&drop] == keep {
        return;
    }
    map.insert(drop, keep);

    let drop_children: Vec<(String, NodeId)> = pta
        .node(drop)
        .children
        .iter()
        .map(|(label, &child)| (label.clone(), child))
        .collect();

    for (label, drop_child) in drop_children {
        match pta.node(keep).children.get(&label).copied() {
            Some(keep_child) => {
                if keep_child != drop_child {
                    merge_states(pta, keep_child, drop_child, map);
                }
            }
            None => {
                pta.node_mut(keep).children.insert(label, drop_child);
            }
        }
    }

    let drained = std::mem::take(&mut pta.node_mut(drop).edge_samples);
    for (label, mut samples) in drained {
        pta.node_mut(keep)
            .edge_samples
            .entry(label)
            .or_default()
            .append(&mut samples);
    }

    if pta.node(drop).accepting {
        pta.node_mut(keep).accepting = true;
    }
}

/// Rewrite every entry to its fixed point so a single lookup suffices
fn compress_paths(map: &mut StateMap) {
    let ids: Vec<NodeId> = map.keys().copied().collect();
    for id in ids {
        let mut representative = map[&id];
        while map[&representative] != representative {
            representative = map[&representative];
        }
        map.insert(id, representative);
    }
}
