//! JSON export of data-aware Petri nets
//!
//! Produces the editor-friendly JSON schema: places, transitions, and arcs
//! with presentational defaults, plus the declared data variables with a
//! coarse number/boolean/string type mapping.

use crate::domain::dpn::Dpn;
use crate::errors::Result;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;

#[derive(Debug, Serialize)]
struct PositionJson {
    x: f64,
    y: f64,
}

#[derive(Debug, Serialize)]
struct PlaceJson {
    id: String,
    position: PositionJson,
    label: String,
    tokens: u32,
    capacity: Option<u32>,
    radius: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransitionJson {
    id: String,
    position: PositionJson,
    label: String,
    width: u32,
    height: u32,
    is_enabled: bool,
    priority: u32,
    delay: u32,
    precondition: String,
    postcondition: String,
}

#[derive(Debug, Serialize)]
struct ArcJson {
    id: String,
    source: String,
    target: String,
    weight: u32,
    #[serde(rename = "type")]
    kind: String,
    points: Vec<PositionJson>,
    label: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DataVariableJson {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: String,
    current_value: Value,
    description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DpnJson {
    name: String,
    description: String,
    places: Vec<PlaceJson>,
    transitions: Vec<TransitionJson>,
    arcs: Vec<ArcJson>,
    data_variables: Vec<DataVariableJson>,
}

/// Map a declared variable type onto the JSON type vocabulary
fn json_type(dtype: &str) -> &'static str {
    match dtype {
        "int" | "integer" | "float" | "double" | "real" => "number",
        "bool" | "boolean" => "boolean",
        _ => "string",
    }
}

fn default_value(kind: &str) -> Value {
    match kind {
        "number" => json!(0),
        "boolean" => json!(false),
        _ => json!(""),
    }
}

/// Render the export document
pub fn dpn_to_json(dpn: &Dpn, name: &str, description: &str) -> Result<String> {
    let places: Vec<PlaceJson> = dpn
        .places()
        .into_iter()
        .map(|(id, label)| PlaceJson {
            id: format!("P_{}", id),
            position: PositionJson { x: 0.0, y: 0.0 },
            label: label.to_string(),
            tokens: dpn.initial_marking.get(id).copied().unwrap_or(0),
            capacity: None,
            radius: 20,
        })
        .collect();

    let transitions: Vec<TransitionJson> = dpn
        .transitions()
        .into_iter()
        .map(|(id, label)| {
            let (precondition, postcondition) = match dpn.data_transitions.get(id) {
                Some(data) => (data.guard.serialized(), data.update.to_string()),
                None => (String::new(), String::new()),
            };
            TransitionJson {
                id: format!("T_{}", id),
                position: PositionJson { x: 0.0, y: 0.0 },
                label: label.unwrap_or(id).to_string(),
                width: 20,
                height: 50,
                is_enabled: false,
                priority: 1,
                delay: 0,
                precondition,
                postcondition,
            }
        })
        .collect();

    let arcs: Vec<ArcJson> = dpn
        .arcs()
        .into_iter()
        .enumerate()
        .map(|(index, arc)| {
            let source_is_place = dpn.places().iter().any(|(id, _)| *id == arc.source);
            let prefix = |id: &str, is_place: bool| {
                if is_place {
                    format!("P_{}", id)
                } else {
                    format!("T_{}", id)
                }
            };
            ArcJson {
                id: format!("A{}", index + 1),
                source: prefix(&arc.source, source_is_place),
                target: prefix(&arc.target, !source_is_place),
                weight: arc.weight,
                kind: "regular".into(),
                points: Vec::new(),
                label: arc.weight.to_string(),
            }
        })
        .collect();

    let data_variables: Vec<DataVariableJson> = dpn
        .variables
        .iter()
        .map(|(name, dtype)| {
            let kind = json_type(dtype);
            DataVariableJson {
                id: format!("var_{}", name),
                name: name.clone(),
                kind: kind.to_string(),
                current_value: default_value(kind),
                description: format!("Variable {} of type {}", name, dtype),
            }
        })
        .collect();

    let document = DpnJson {
        name: name.to_string(),
        description: description.to_string(),
        places,
        transitions,
        arcs,
        data_variables,
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Write the export document to a file
pub fn export_dpn_to_json(dpn: &Dpn, path: &Path, name: &str, description: &str) -> Result<()> {
    let text = dpn_to_json(dpn, name, description)?;
    std::fs::write(path, text)?;
    Ok(())
}
