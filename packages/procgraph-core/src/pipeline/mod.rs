//! Discovery pipeline orchestration
//!
//! Wires the learning stages together: PTA construction, blue-fringe
//! merging, guard synthesis over the merged transitions, and EFSM
//! assembly; plus the bootstrap path that derives states from an
//! externally discovered Petri net instead. Guard synthesis across
//! abstract transitions is embarrassingly parallel and fans out over
//! rayon; results are reassembled in key order so output is byte-stable.

use crate::config::DiscoveryConfig;
use crate::domain::dpn::Dpn;
use crate::domain::efsm::{Efsm, Transition, Variable};
use crate::domain::guard::Guard;
use crate::domain::update::{Update, UpdateExpr};
use crate::errors::{ProcgraphError, Result};
use crate::features::domains::{
    detect_variable_propagation, infer_attribute_domains, AttributeDomain, PropagationClass,
};
use crate::features::guards::{synthesize_guard, SynthesisOptions};
use crate::features::mapping::project_efsm;
use crate::features::merging::{blue_fringe_merge, CompatibilityOptions, StateMap};
use crate::features::pta::{build_pta, NodeId, Pta};
use crate::shared::models::{AttrMap, Trace};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, info};

/// Everything the discovery run produces
#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    pub efsm: Efsm,
    pub dpn: Dpn,
    /// Per-attribute propagation hint for downstream tooling
    pub propagation: BTreeMap<String, PropagationClass>,
}

/// Run the full discovery pipeline over ingested traces
///
/// `bootstrap` supplies the externally discovered Petri net when
/// `config.use_inductive_miner` is set.
pub fn discover(
    traces: &[Trace],
    bootstrap: Option<&Dpn>,
    config: &DiscoveryConfig,
) -> Result<DiscoveryOutcome> {
    config.validate()?;

    let domains = infer_attribute_domains(traces);
    let propagation = detect_variable_propagation(traces);
    for (attr, class) in &propagation {
        debug!(attr = attr.as_str(), class = ?class, "attribute propagation");
    }

    let efsm = if config.use_inductive_miner {
        let net = bootstrap.ok_or_else(|| {
            ProcgraphError::config(
                "use_inductive_miner is set but no bootstrap Petri net was supplied",
            )
        })?;
        bootstrap_from_petri_net(net, &domains)?
    } else {
        learn_efsm_from_traces(traces, &domains, config)?
    };
    info!(
        states = efsm.states.len(),
        transitions = efsm.transitions.len(),
        "learned EFSM"
    );

    let dpn = project_efsm(&efsm, config.projection)?;
    Ok(DiscoveryOutcome {
        efsm,
        dpn,
        propagation,
    })
}

/// Learn an EFSM via PTA construction, merging, and guard synthesis
pub fn learn_efsm_from_traces(
    traces: &[Trace],
    domains: &BTreeMap<String, AttributeDomain>,
    config: &DiscoveryConfig,
) -> Result<Efsm> {
    let mut pta = build_pta(traces);
    info!(nodes = pta.len(), traces = traces.len(), "built PTA");

    let attribute_names: Vec<String> = domains.keys().cloned().collect();
    let compatibility = CompatibilityOptions {
        divergence_threshold: config.divergence_threshold,
        require_matching_labels: config.require_matching_labels,
    };
    let state_map = blue_fringe_merge(&mut pta, &attribute_names, &compatibility);

    assemble_efsm(&pta, &state_map, domains, config)
}

/// Fold merged edges into transitions, synthesising one guard per
/// `(source, label, target)` group
fn assemble_efsm(
    pta: &Pta,
    state_map: &StateMap,
    domains: &BTreeMap<String, AttributeDomain>,
    config: &DiscoveryConfig,
) -> Result<Efsm> {
    // Pool edge samples by abstract transition. Only representative nodes
    // carry samples after merging.
    let mut edge_map: BTreeMap<(NodeId, String, NodeId), Vec<AttrMap>> = BTreeMap::new();
    for node in &pta.nodes {
        if state_map[&node.id] != node.id {
            continue;
        }
        for (label, samples) in &node.edge_samples {
            let Some(&child) = node.children.get(label) else {
                continue;
            };
            let key = (node.id, label.clone(), state_map[&child]);
            edge_map.entry(key).or_default().extend(samples.iter().cloned());
        }
    }

    let options = SynthesisOptions {
        max_conjuncts: config.max_conjuncts,
        solver_budget: Duration::from_millis(config.solver_timeout_ms),
        max_examples_per_side: config.max_examples_per_side,
    };

    // Each transition's search is independent; the entry list keeps key
    // order, so the reassembled transition list is deterministic.
    let entries: Vec<(&(NodeId, String, NodeId), &Vec<AttrMap>)> = edge_map.iter().collect();
    let guards: Vec<Guard> = entries
        .par_iter()
        .map(|&(key, positives)| {
            let (source, label, _) = key;
            let negatives: Vec<AttrMap> = edge_map
                .iter()
                .filter(|((other_source, other_label, _), _)| {
                    other_source == source && other_label != label
                })
                .flat_map(|(_, samples)| samples.iter().cloned())
                .collect();
            synthesize_guard(positives, &negatives, domains, &options)
        })
        .collect();

    let mut states: BTreeSet<String> = state_map.values().map(|id| format!("s{}", id)).collect();
    let initial = format!("s{}", state_map[&pta.root()]);
    states.insert(initial.clone());

    let variables: BTreeMap<String, Variable> = domains
        .values()
        .map(|domain| {
            (
                domain.name.clone(),
                Variable::new(domain.name.clone(), domain.dtype),
            )
        })
        .collect();

    let transitions: Vec<Transition> = entries
        .into_iter()
        .zip(guards)
        .map(|((key, samples), guard)| {
            let (source, label, target) = key;
            let mut seen: BTreeSet<&str> = BTreeSet::new();
            for sample in samples {
                seen.extend(sample.keys().map(String::as_str));
            }
            let assignments: BTreeMap<String, UpdateExpr> = seen
                .into_iter()
                .map(|attr| (attr.to_string(), UpdateExpr::attr(attr)))
                .collect();
            Transition {
                source: format!("s{}", source),
                label: label.clone(),
                guard,
                update: Update::new(assignments),
                target: format!("s{}", target),
            }
        })
        .collect();

    Efsm::new(states, initial, variables, transitions)
}

/// Derive an EFSM from the places of an externally discovered Petri net
///
/// One EFSM transition per net transition with exactly one input and one
/// output place; guards are all trivial and updates empty.
pub fn bootstrap_from_petri_net(
    net: &Dpn,
    domains: &BTreeMap<String, AttributeDomain>,
) -> Result<Efsm> {
    let states: BTreeSet<String> = net
        .places()
        .into_iter()
        .map(|(id, _)| format!("p_{}", id))
        .collect();

    let initial_place = net
        .initial_marking
        .iter()
        .find(|(_, &tokens)| tokens > 0)
        .map(|(id, _)| id.clone())
        .ok_or_else(|| {
            ProcgraphError::input_format("bootstrap Petri net has no marked place")
        })?;

    let mut transitions = Vec::new();
    for (id, label) in net.transitions() {
        let preset = net.preset(id)?;
        let postset = net.postset(id)?;
        if preset.len() == 1 && postset.len() == 1 {
            transitions.push(Transition {
                source: format!("p_{}", preset[0]),
                label: label.unwrap_or(id).to_string(),
                guard: Guard::True,
                update: Update::empty(),
                target: format!("p_{}", postset[0]),
            });
        }
    }

    let variables: BTreeMap<String, Variable> = domains
        .values()
        .map(|domain| {
            (
                domain.name.clone(),
                Variable::new(domain.name.clone(), domain.dtype),
            )
        })
        .collect();

    Efsm::new(
        states,
        format!("p_{}", initial_place),
        variables,
        transitions,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{attrs_from, AttrValue, Event};

    fn gated_branch_log() -> Vec<Trace> {
        let mut traces = Vec::new();
        for _ in 0..2 {
            traces.push(vec![
                Event::new("A", attrs_from([("amount", AttrValue::Int(50))])),
                Event::new("B", attrs_from([])),
            ]);
        }
        for _ in 0..2 {
            traces.push(vec![
                Event::new("A", attrs_from([("amount", AttrValue::Int(500))])),
                Event::new("C", attrs_from([])),
            ]);
        }
        traces
    }

    fn config(max_conjuncts: usize) -> DiscoveryConfig {
        DiscoveryConfig {
            max_conjuncts,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_log_yields_single_state() {
        let domains = BTreeMap::new();
        let efsm = learn_efsm_from_traces(&[], &domains, &config(1)).unwrap();
        assert_eq!(efsm.states.len(), 1);
        assert_eq!(efsm.initial, "s0");
        assert!(efsm.transitions.is_empty());
    }

    #[test]
    fn test_single_event_trace() {
        let traces = vec![vec![Event::new("A", attrs_from([]))]];
        let domains = infer_attribute_domains(&traces);
        let efsm = learn_efsm_from_traces(&traces, &domains, &config(1)).unwrap();

        assert_eq!(efsm.states.len(), 2);
        assert_eq!(efsm.transitions.len(), 1);
        assert!(efsm.transitions[0].guard.is_trivial());
    }

    #[test]
    fn test_gated_branch_guards() {
        let traces = gated_branch_log();
        let domains = infer_attribute_domains(&traces);
        let efsm = learn_efsm_from_traces(&traces, &domains, &config(1)).unwrap();

        assert_eq!(efsm.states.len(), 3);
        let b = efsm
            .transitions
            .iter()
            .find(|t| t.label == "B")
            .expect("B transition");
        let c = efsm
            .transitions
            .iter()
            .find(|t| t.label == "C")
            .expect("C transition");

        // B keeps the low amounts, C the high ones.
        let Guard::Conjunction(b_atoms) = &b.guard else {
            panic!("expected non-trivial guard on B, got {}", b.guard);
        };
        let Guard::Conjunction(c_atoms) = &c.guard else {
            panic!("expected non-trivial guard on C, got {}", c.guard);
        };
        assert_eq!(b_atoms[0].var, "amount");
        assert_eq!(c_atoms[0].var, "amount");
        let b_threshold = b_atoms[0].value.as_f64().unwrap();
        let c_threshold = c_atoms[0].value.as_f64().unwrap();
        assert!((50.0..500.0).contains(&b_threshold));
        assert!((50.0..=500.0).contains(&c_threshold));
    }

    #[test]
    fn test_updates_cover_pooled_attributes() {
        let traces = gated_branch_log();
        let domains = infer_attribute_domains(&traces);
        let efsm = learn_efsm_from_traces(&traces, &domains, &config(1)).unwrap();

        let a = efsm.transitions.iter().find(|t| t.label == "A").unwrap();
        assert_eq!(
            a.update.assignments.get("amount"),
            Some(&UpdateExpr::attr("amount"))
        );
    }

    #[test]
    fn test_high_threshold_merges_everything_after_a() {
        // With the threshold at 1.0 no attribute divergence blocks a merge;
        // same-label traces collapse into a single branch with a trivial
        // guard.
        let traces = vec![
            vec![
                Event::new("A", attrs_from([("amount", AttrValue::Int(50))])),
                Event::new("B", attrs_from([])),
            ],
            vec![
                Event::new("A", attrs_from([("amount", AttrValue::Int(500))])),
                Event::new("B", attrs_from([])),
            ],
        ];
        let domains = infer_attribute_domains(&traces);
        let efsm = learn_efsm_from_traces(&traces, &domains, &config(1)).unwrap();

        let b_transitions: Vec<_> = efsm
            .transitions
            .iter()
            .filter(|t| t.label == "B")
            .collect();
        assert_eq!(b_transitions.len(), 1);
        assert!(b_transitions[0].guard.is_trivial());
    }

    #[test]
    fn test_discover_produces_matching_dpn() {
        let traces = gated_branch_log();
        let outcome = discover(&traces, None, &config(1)).unwrap();

        assert_eq!(outcome.dpn.place_count(), outcome.efsm.states.len());
        assert_eq!(
            outcome.dpn.transition_count(),
            outcome.efsm.transitions.len()
        );
        assert_eq!(
            outcome.dpn.arc_count(),
            2 * outcome.efsm.transitions.len()
        );
        assert_eq!(outcome.propagation["amount"], PropagationClass::Persistent);
    }

    #[test]
    fn test_bootstrap_requires_net() {
        let config = DiscoveryConfig {
            use_inductive_miner: true,
            ..Default::default()
        };
        assert!(matches!(
            discover(&[], None, &config),
            Err(ProcgraphError::Config(_))
        ));
    }

    #[test]
    fn test_bootstrap_from_petri_net() {
        let mut net = Dpn::new("mined");
        net.add_place("p0", "p0").unwrap();
        net.add_place("p1", "p1").unwrap();
        net.add_place("p2", "p2").unwrap();
        net.add_transition("t_a", Some("A".into())).unwrap();
        net.add_transition("t_join", None).unwrap();
        net.add_arc("p0", "t_a", 1).unwrap();
        net.add_arc("t_a", "p1", 1).unwrap();
        // t_join has two inputs and is skipped by the bootstrap.
        net.add_arc("p1", "t_join", 1).unwrap();
        net.add_arc("p2", "t_join", 1).unwrap();
        net.add_arc("t_join", "p2", 1).unwrap();
        net.initial_marking.insert("p0".into(), 1);

        let efsm = bootstrap_from_petri_net(&net, &BTreeMap::new()).unwrap();
        assert_eq!(efsm.initial, "p_p0");
        assert_eq!(efsm.states.len(), 3);
        assert_eq!(efsm.transitions.len(), 1);
        assert_eq!(efsm.transitions[0].label, "A");
        assert!(efsm.transitions[0].guard.is_trivial());
    }
}
