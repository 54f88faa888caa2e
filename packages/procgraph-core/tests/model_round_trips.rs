//! Model-level scenarios: simulation, serialisation, and projection shape.

use pretty_assertions::assert_eq;
use procgraph_core::domain::efsm::{Dtype, Efsm, Transition, Variable};
use procgraph_core::domain::guard::{AtomicPredicate, Guard};
use procgraph_core::domain::update::{Update, UpdateExpr};
use procgraph_core::features::mapping::project_efsm;
use procgraph_core::shared::models::{attrs_from, AttrValue, Event};
use procgraph_core::ProjectionKind;
use std::collections::{BTreeMap, BTreeSet};

fn two_step_efsm(guard_on_a: Guard) -> Efsm {
    let mut copy_x = Update::empty();
    copy_x.assignments.insert("x".into(), UpdateExpr::attr("x"));
    Efsm::new(
        ["s0", "s1", "s2"].iter().map(|s| s.to_string()).collect(),
        "s0".into(),
        BTreeMap::from([("x".to_string(), Variable::new("x", Dtype::Int))]),
        vec![
            Transition {
                source: "s0".into(),
                label: "A".into(),
                guard: guard_on_a,
                update: copy_x,
                target: "s1".into(),
            },
            Transition {
                source: "s1".into(),
                label: "B".into(),
                guard: Guard::True,
                update: Update::empty(),
                target: "s2".into(),
            },
        ],
    )
    .unwrap()
}

#[test]
fn simulator_accepts_and_carries_the_variable() {
    let efsm = two_step_efsm(Guard::True);
    let trace = vec![
        Event::new("A", attrs_from([("x", AttrValue::Int(10))])),
        Event::new("B", attrs_from([])),
    ];

    let outcome = efsm.simulate_trace(&trace);
    assert!(outcome.accepted);
    assert_eq!(outcome.state_path, vec!["s0", "s1", "s2"]);
    assert_eq!(outcome.final_vars["x"], Some(AttrValue::Int(10)));
}

#[test]
fn simulator_rejects_when_the_guard_cannot_evaluate() {
    // x is still unset when A fires, so x == 0 raises and nothing is
    // enabled at position 0.
    let efsm = two_step_efsm(Guard::Conjunction(vec![AtomicPredicate::eq(
        "x",
        AttrValue::Int(0),
    )]));
    let trace = vec![
        Event::new("A", attrs_from([("x", AttrValue::Int(10))])),
        Event::new("B", attrs_from([])),
    ];

    let outcome = efsm.simulate_trace(&trace);
    assert!(!outcome.accepted);
    assert_eq!(outcome.state_path, vec!["s0"]);
}

#[test]
fn efsm_json_round_trip_is_identity() {
    let efsm = two_step_efsm(Guard::Conjunction(vec![
        AtomicPredicate::ge("x", AttrValue::Int(100)),
        AtomicPredicate::eq("x", AttrValue::Int(150)),
    ]));

    let restored = Efsm::from_json(&efsm.to_json().unwrap()).unwrap();
    assert_eq!(restored, efsm);
}

#[test]
fn trivial_guard_serialises_as_true_and_accepts_null() {
    let efsm = two_step_efsm(Guard::True);
    let json = efsm.to_json().unwrap();
    assert!(json.contains("\"serialized\": \"true\""));

    let patched = json.replace("\"serialized\": \"true\"", "\"serialized\": null");
    let restored = Efsm::from_json(&patched).unwrap();
    assert_eq!(restored, efsm);
}

#[test]
fn canonical_projection_counts_match_the_efsm() {
    let efsm = two_step_efsm(Guard::True);
    let dpn = project_efsm(&efsm, ProjectionKind::Canonical).unwrap();

    assert_eq!(dpn.place_count(), efsm.states.len());
    assert_eq!(dpn.transition_count(), efsm.transitions.len());
    assert_eq!(dpn.arc_count(), 2 * efsm.transitions.len());

    // The token sits on the initial state's place.
    assert_eq!(dpn.initial_marking.len(), 1);
    assert_eq!(dpn.initial_marking.get("s0"), Some(&1));
}

#[test]
fn read_vars_cover_guard_identifiers_after_projection() {
    let efsm = two_step_efsm(Guard::Conjunction(vec![AtomicPredicate::ge(
        "x",
        AttrValue::Int(1),
    )]));
    let dpn = project_efsm(&efsm, ProjectionKind::Canonical).unwrap();

    for data in dpn.data_transitions.values() {
        // Every identifier in the serialised guard (reserved connectives
        // aside) must be declared as read.
        let serialized = data.guard.serialized();
        let reparsed = Guard::parse(&serialized).unwrap();
        assert!(
            reparsed.read_vars().is_subset(&data.read_vars),
            "read_vars {:?} must cover guard '{}'",
            data.read_vars,
            serialized
        );
        assert_eq!(
            data.write_vars,
            data.update
                .assignments
                .keys()
                .cloned()
                .collect::<BTreeSet<_>>()
        );
    }
}

#[test]
fn compact_projection_merges_same_label_guards() {
    let mut efsm = two_step_efsm(Guard::True);
    efsm.transitions.push(Transition {
        source: "s0".into(),
        label: "B".into(),
        guard: Guard::Conjunction(vec![AtomicPredicate::le("x", AttrValue::Int(5))]),
        update: Update::empty(),
        target: "s2".into(),
    });

    let dpn = project_efsm(&efsm, ProjectionKind::Compact).unwrap();
    assert_eq!(dpn.place_count(), 3);
    // A, B, and the two silent boundary transitions.
    assert_eq!(dpn.transition_count(), 4);

    // One of the B transitions has the trivial guard, which absorbs the
    // disjunction.
    let (_, b_data) = dpn.candidates_for("B")[0];
    assert!(b_data.guard.is_trivial());
}
