//! State merging: compatibility testing and the blue-fringe driver

pub mod blue_fringe;
pub mod compatibility;

pub use blue_fringe::{blue_fringe_merge, merge_states, StateMap};
pub use compatibility::{
    are_states_compatible, attribute_divergence, jensen_shannon_distance, CompatibilityOptions,
};
