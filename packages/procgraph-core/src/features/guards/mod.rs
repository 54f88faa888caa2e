//! Guard synthesis: candidate generation, validation, and search

pub mod predicates;
pub mod solver;
pub mod synthesis;

pub use predicates::candidate_predicates;
pub use solver::{ValidationSolver, Verdict};
pub use synthesis::{synthesize_guard, SynthesisOptions};
