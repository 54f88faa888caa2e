//! EFSM to DPN projection
//!
//! The canonical projection maps each EFSM state to a place and each EFSM
//! transition to a net transition with one input and one output arc, so
//! guards keep gating exactly the control-flow edge they were learned for.
//! The compact projection collapses control flow into a single shared
//! place with one self-looping transition per activity label, merging the
//! guards of same-labelled transitions with a disjunction; it exists for
//! interoperability and is lossy by construction.

use crate::config::ProjectionKind;
use crate::domain::dpn::{Dpn, DpnTransition};
use crate::domain::efsm::Efsm;
use crate::domain::guard::Guard;
use crate::domain::update::Update;
use crate::errors::Result;
use std::collections::{BTreeMap, BTreeSet};

/// Project an EFSM onto a data-aware Petri net
pub fn project_efsm(efsm: &Efsm, kind: ProjectionKind) -> Result<Dpn> {
    match kind {
        ProjectionKind::Canonical => project_canonical(efsm),
        ProjectionKind::Compact => project_compact(efsm),
    }
}

/// Derive the variable sets a transition touches: writes are the update's
/// targets, reads the guard's identifiers plus every bare variable on an
/// update right-hand side (`attr.<name>` reads the event payload, not the
/// store, and contributes nothing)
pub fn infer_read_write(guard: &Guard, update: &Update) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut reads = guard.read_vars();
    reads.extend(update.read_vars());
    let writes = update.assignments.keys().cloned().collect();
    (reads, writes)
}

fn data_transition(guard: Guard, update: Update) -> DpnTransition {
    let (read_vars, write_vars) = infer_read_write(&guard, &update);
    DpnTransition {
        guard,
        update,
        read_vars,
        write_vars,
    }
}

fn declare_variables(efsm: &Efsm, dpn: &mut Dpn) {
    for (name, variable) in &efsm.variables {
        dpn.variables
            .insert(name.clone(), variable.dtype.to_string());
    }
}

fn project_canonical(efsm: &Efsm) -> Result<Dpn> {
    let mut dpn = Dpn::new("efsm_dpn");

    for state in &efsm.states {
        dpn.add_place(state.clone(), state.clone())?;
    }
    dpn.initial_marking.insert(efsm.initial.clone(), 1);

    for (index, transition) in efsm.transitions.iter().enumerate() {
        let id = format!("t{}", index);
        dpn.add_transition(id.clone(), Some(transition.label.clone()))?;
        dpn.add_arc(&transition.source, &id, 1)?;
        dpn.add_arc(&id, &transition.target, 1)?;
        dpn.data_transitions.insert(
            id,
            data_transition(transition.guard.clone(), transition.update.clone()),
        );
    }

    declare_variables(efsm, &mut dpn);
    Ok(dpn)
}

fn project_compact(efsm: &Efsm) -> Result<Dpn> {
    let mut dpn = Dpn::new("efsm_dpn");

    dpn.add_place("start", "start")?;
    dpn.add_place("process", "process")?;
    dpn.add_place("end", "end")?;
    dpn.initial_marking.insert("start".into(), 1);

    dpn.add_transition("start_process", None)?;
    dpn.add_arc("start", "start_process", 1)?;
    dpn.add_arc("start_process", "process", 1)?;

    let mut by_label: BTreeMap<&str, Vec<&crate::domain::efsm::Transition>> = BTreeMap::new();
    for transition in &efsm.transitions {
        by_label
            .entry(transition.label.as_str())
            .or_default()
            .push(transition);
    }

    for (label, group) in by_label {
        dpn.add_transition(label, Some(label.to_string()))?;
        dpn.add_arc("process", label, 1)?;
        dpn.add_arc(label, "process", 1)?;

        let guard = Guard::disjunction(group.iter().map(|t| t.guard.clone()).collect());
        // Later assignments win, in transition-list order.
        let mut assignments = BTreeMap::new();
        for transition in &group {
            for (var, expr) in &transition.update.assignments {
                assignments.insert(var.clone(), expr.clone());
            }
        }
        dpn.data_transitions
            .insert(label.to_string(), data_transition(guard, Update::new(assignments)));
    }

    dpn.add_transition("end_process", None)?;
    dpn.add_arc("process", "end_process", 1)?;
    dpn.add_arc("end_process", "end", 1)?;

    declare_variables(efsm, &mut dpn);
    Ok(dpn)
}
