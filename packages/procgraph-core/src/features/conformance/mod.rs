//! Data-aware conformance replay
//!
//! Streams traces through a DPN, keeping a per-trace variable state, and
//! counts how often transition guards are satisfied, violated, or
//! undefined. The replay is deliberately control-flow-agnostic: every
//! transition whose label matches the current event is examined regardless
//! of the marking. Control-flow fitness is computed by an external
//! alignment library and reported alongside these figures.

use crate::domain::dpn::Dpn;
use crate::shared::models::{Trace, VarState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Guard satisfaction counters of one replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardSatisfaction {
    /// `satisfied / total_transitions`, 0.0 when nothing fired
    pub satisfaction_rate: f64,
    /// Transitions examined across all traces
    pub total_transitions: usize,
    pub satisfied: usize,
    pub violated: usize,
    /// Guard evaluations that raised (e.g. an unset variable)
    pub undefined: usize,
    /// Transition id → violation count
    pub violation_details: BTreeMap<String, usize>,
}

/// Full conformance report of a log against a DPN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConformanceReport {
    pub guard_satisfaction: GuardSatisfaction,
    pub num_traces: usize,
}

/// Replay every trace and tally guard verdicts
pub fn evaluate_guard_satisfaction(dpn: &Dpn, traces: &[Trace]) -> GuardSatisfaction {
    let mut total = 0usize;
    let mut satisfied = 0usize;
    let mut violated = 0usize;
    let mut undefined = 0usize;
    let mut violation_details: BTreeMap<String, usize> = BTreeMap::new();

    for trace in traces {
        let mut var_state: VarState = dpn
            .variables
            .keys()
            .map(|name| (name.clone(), None))
            .collect();

        for event in trace {
            for (id, data) in dpn.candidates_for(&event.activity) {
                total += 1;
                match data.guard.evaluate(&var_state) {
                    Ok(true) => {
                        satisfied += 1;
                        data.update.apply(&mut var_state, &event.attrs);
                    }
                    Ok(false) => {
                        violated += 1;
                        *violation_details.entry(id.to_string()).or_insert(0) += 1;
                    }
                    Err(error) => {
                        debug!(transition = id, %error, "guard undefined during replay");
                        undefined += 1;
                    }
                }
            }
        }
    }

    GuardSatisfaction {
        satisfaction_rate: if total > 0 {
            satisfied as f64 / total as f64
        } else {
            0.0
        },
        total_transitions: total,
        satisfied,
        violated,
        undefined,
        violation_details,
    }
}

/// Convenience wrapper producing the full report
pub fn evaluate_conformance(dpn: &Dpn, traces: &[Trace]) -> ConformanceReport {
    ConformanceReport {
        guard_satisfaction: evaluate_guard_satisfaction(dpn, traces),
        num_traces: traces.len(),
    }
}
