/*
 * Procgraph - Data-Aware Process Discovery Engine
 *
 * Feature-first layout:
 * - shared/    : event model (AttrValue, Event, Trace)
 * - domain/    : guards, updates, EFSM, DPN
 * - features/  : pipeline stages (ingest → domains → pta → merging →
 *                guards → mapping) plus conformance and export
 * - pipeline/  : orchestration
 *
 * The engine learns an Extended Finite State Machine with data guards from
 * an event log (prefix tree + blue-fringe merging + guard synthesis) and
 * projects it onto a data-aware Petri net for export and conformance
 * checking.
 */

#![allow(clippy::new_without_default)] // Default impl not always needed
#![allow(clippy::collapsible_if)] // Readability over brevity

/// Shared models and utilities
pub mod shared;

/// Core model types (guards, updates, EFSM, DPN)
pub mod domain;

/// Feature modules (pipeline stages)
pub mod features;

/// Pipeline orchestration
pub mod pipeline;

/// Configuration
pub mod config;

/// Error types
pub mod errors;

// Re-exports for the public API
pub use config::{DiscoveryConfig, ProjectionKind};
pub use domain::{Dpn, DpnTransition, Dtype, Efsm, Guard, Transition, Update, Variable};
pub use errors::{ProcgraphError, Result};
pub use features::conformance::{evaluate_conformance, ConformanceReport};
pub use features::domains::{
    detect_variable_propagation, infer_attribute_domains, AttributeDomain, PropagationClass,
};
pub use features::export::{export_dpn_to_json, export_dpn_to_pnml, import_pnml};
pub use features::ingest::{read_log, EventLog};
pub use features::mapping::project_efsm;
pub use pipeline::{discover, learn_efsm_from_traces, DiscoveryOutcome};
pub use shared::models::{AttrMap, AttrValue, Event, Trace, VarState};
