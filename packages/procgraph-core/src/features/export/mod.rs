//! DPN export and import: PNML with data annotations, editor JSON

pub mod json;
pub mod pnml;

pub use json::{dpn_to_json, export_dpn_to_json};
pub use pnml::{dpn_from_pnml, dpn_to_pnml, export_dpn_to_pnml, import_pnml};
