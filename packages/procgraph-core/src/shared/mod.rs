//! Shared models and utilities

pub mod models;

pub use models::{AttrMap, AttrValue, Event, Trace, VarState};
