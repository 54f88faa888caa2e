//! Core model types: guards, updates, EFSM, and DPN

pub mod dpn;
pub mod efsm;
pub mod guard;
pub mod update;

pub use dpn::{Arc, Dpn, DpnTransition, NetNode};
pub use efsm::{Dtype, Efsm, SimulationOutcome, Transition, Variable};
pub use guard::{AtomicPredicate, ComparisonOp, Guard};
pub use update::{ArithOp, Operand, Update, UpdateExpr};
