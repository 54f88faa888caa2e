//! Extended Finite State Machine model
//!
//! EFSM = ⟨S, s0, X, Σ, T⟩: control states, an initial state, typed
//! variables, and transitions decorated with guards and updates. The model
//! is immutable after assembly; simulation works on a per-trace copy of the
//! variable state.

use crate::domain::guard::Guard;
use crate::domain::update::Update;
use crate::errors::{ProcgraphError, Result};
use crate::shared::models::{Trace, VarState};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Data type of an EFSM variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Int,
    Float,
    Cat,
    String,
}

impl Dtype {
    /// Lenient parse of external type names; unknown names fall back to
    /// `String` so foreign nets stay loadable.
    pub fn parse(text: &str) -> Self {
        match text {
            "int" | "integer" => Dtype::Int,
            "float" | "double" | "real" => Dtype::Float,
            "cat" => Dtype::Cat,
            _ => Dtype::String,
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dtype::Int => write!(f, "int"),
            Dtype::Float => write!(f, "float"),
            Dtype::Cat => write!(f, "cat"),
            Dtype::String => write!(f, "string"),
        }
    }
}

/// Typed variable of an EFSM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub dtype: Dtype,
}

impl Variable {
    pub fn new(name: impl Into<String>, dtype: Dtype) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }
}

/// EFSM transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub source: String,
    pub label: String,
    pub guard: Guard,
    pub update: Update,
    pub target: String,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} --[{}]/{}/{}--> {}",
            self.source, self.label, self.guard, self.update, self.target
        )
    }
}

/// Result of replaying one trace through an EFSM
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    /// Whether every event fired a transition
    pub accepted: bool,
    /// Visited states, starting at the initial state
    pub state_path: Vec<String>,
    /// Variable state after the last fired transition
    pub final_vars: VarState,
}

/// Extended Finite State Machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Efsm {
    pub states: BTreeSet<String>,
    pub initial: String,
    pub variables: BTreeMap<String, Variable>,
    pub transitions: Vec<Transition>,
}

impl Efsm {
    /// Build and validate an EFSM
    pub fn new(
        states: BTreeSet<String>,
        initial: String,
        variables: BTreeMap<String, Variable>,
        transitions: Vec<Transition>,
    ) -> Result<Self> {
        let efsm = Self {
            states,
            initial,
            variables,
            transitions,
        };
        efsm.validate()?;
        Ok(efsm)
    }

    /// Check the structural invariants: the initial state and every
    /// transition endpoint must be members of the state set
    pub fn validate(&self) -> Result<()> {
        if !self.states.contains(&self.initial) {
            return Err(ProcgraphError::inconsistent(format!(
                "initial state '{}' not in states",
                self.initial
            )));
        }
        for t in &self.transitions {
            if !self.states.contains(&t.source) {
                return Err(ProcgraphError::inconsistent(format!(
                    "transition source '{}' not in states",
                    t.source
                )));
            }
            if !self.states.contains(&t.target) {
                return Err(ProcgraphError::inconsistent(format!(
                    "transition target '{}' not in states",
                    t.target
                )));
            }
        }
        Ok(())
    }

    /// Fresh variable state with every declared variable unset
    pub fn initial_var_state(&self) -> VarState {
        self.variables
            .keys()
            .map(|name| (name.clone(), None))
            .collect()
    }

    /// Execute the EFSM against a trace
    ///
    /// At each event the first transition from the current state with a
    /// matching label and a guard that evaluates to true fires; a guard
    /// that raises counts as not enabled. If nothing fires the trace is
    /// rejected at that position.
    pub fn simulate_trace(&self, trace: &Trace) -> SimulationOutcome {
        let mut current = self.initial.clone();
        let mut vars = self.initial_var_state();
        let mut path = vec![current.clone()];

        for event in trace {
            let mut fired = false;
            for t in &self.transitions {
                if t.source != current || t.label != event.activity {
                    continue;
                }
                if matches!(t.guard.evaluate(&vars), Ok(true)) {
                    t.update.apply(&mut vars, &event.attrs);
                    current = t.target.clone();
                    path.push(current.clone());
                    fired = true;
                    break;
                }
            }
            if !fired {
                return SimulationOutcome {
                    accepted: false,
                    state_path: path,
                    final_vars: vars,
                };
            }
        }

        SimulationOutcome {
            accepted: true,
            state_path: path,
            final_vars: vars,
        }
    }

    /// Serialize to the canonical JSON form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from the canonical JSON form, re-validating invariants
    pub fn from_json(text: &str) -> Result<Self> {
        let efsm: Efsm = serde_json::from_str(text)?;
        efsm.validate()?;
        Ok(efsm)
    }
}
