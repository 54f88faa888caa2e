//! Event log ingestion
//!
//! Reads CSV event logs into the canonical in-memory form. Expected
//! columns: `case_id`, `activity`, an optional `timestamp`, and any number
//! of attribute columns. Attribute cells are sniffed as integer, real,
//! boolean, or string; empty cells are missing values.
//!
//! Events of a case are ordered by timestamp with a stable sort, so input
//! order breaks ties; cases come out in sorted case-id order. Downsampling
//! keeps the deterministic head of that order so repeated runs learn from
//! the same sublog. XES input is handled outside the core.

use crate::errors::{ProcgraphError, Result};
use crate::shared::models::{AttrMap, AttrValue, Event, Trace};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

const CASE_COLUMN: &str = "case_id";
const ACTIVITY_COLUMN: &str = "activity";
const TIMESTAMP_COLUMN: &str = "timestamp";

/// An ingested event log
#[derive(Debug, Clone, PartialEq)]
pub struct EventLog {
    /// Case ids in the order of `traces`
    pub case_ids: Vec<String>,
    pub traces: Vec<Trace>,
}

impl EventLog {
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }
}

/// Read an event log, dispatching on the file extension
pub fn read_log(path: &Path, sample_ratio: f64) -> Result<EventLog> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("csv") => read_csv_log(path, sample_ratio),
        other => Err(ProcgraphError::input_format(format!(
            "unsupported log format '{}' for {}",
            other.unwrap_or("<none>"),
            path.display()
        ))),
    }
}

fn read_csv_log(path: &Path, sample_ratio: f64) -> Result<EventLog> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| ProcgraphError::input_format(format!("{}: {}", path.display(), e)))?;
    let headers = reader
        .headers()
        .map_err(|e| ProcgraphError::input_format(e.to_string()))?
        .clone();

    let case_idx = column_index(&headers, CASE_COLUMN, path)?;
    let activity_idx = column_index(&headers, ACTIVITY_COLUMN, path)?;
    let timestamp_idx = headers
        .iter()
        .position(|name| name == TIMESTAMP_COLUMN);

    let attribute_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, name)| {
            *name != CASE_COLUMN && *name != ACTIVITY_COLUMN && *name != TIMESTAMP_COLUMN
        })
        .map(|(idx, name)| (idx, name.to_string()))
        .collect();

    // case id → events with their sort keys
    let mut cases: BTreeMap<String, Vec<(Option<NaiveDateTime>, Event)>> = BTreeMap::new();
    for (row_number, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| ProcgraphError::input_format(format!("row {}: {}", row_number + 2, e)))?;
        let case_id = field(&record, case_idx);
        let activity = field(&record, activity_idx);
        if case_id.is_empty() || activity.is_empty() {
            return Err(ProcgraphError::input_format(format!(
                "row {}: empty case_id or activity",
                row_number + 2
            )));
        }

        let timestamp = match timestamp_idx {
            Some(idx) => {
                let raw = field(&record, idx);
                if raw.is_empty() {
                    None
                } else {
                    Some(parse_timestamp(&raw)?)
                }
            }
            None => None,
        };

        let mut attrs = AttrMap::default();
        for (idx, name) in &attribute_columns {
            let raw = field(&record, *idx);
            if !raw.is_empty() {
                attrs.insert(name.clone(), sniff_value(&raw));
            }
        }

        cases
            .entry(case_id)
            .or_default()
            .push((timestamp, Event::new(activity, attrs)));
    }

    let mut case_ids: Vec<String> = cases.keys().cloned().collect();
    if sample_ratio < 1.0 {
        let keep = ((case_ids.len() as f64) * sample_ratio).ceil() as usize;
        case_ids.truncate(keep);
    }

    let mut traces = Vec::with_capacity(case_ids.len());
    for case_id in &case_ids {
        let mut events = cases.remove(case_id).unwrap_or_default();
        // Stable: ties keep their input order.
        events.sort_by_key(|(timestamp, _)| *timestamp);
        traces.push(events.into_iter().map(|(_, event)| event).collect());
    }

    info!(
        cases = traces.len(),
        events = traces.iter().map(Vec::len).sum::<usize>(),
        "ingested event log from {}",
        path.display()
    );
    Ok(EventLog { case_ids, traces })
}

fn column_index(headers: &csv::StringRecord, name: &str, path: &Path) -> Result<usize> {
    headers.iter().position(|h| h == name).ok_or_else(|| {
        ProcgraphError::input_format(format!(
            "{}: missing required column '{}'",
            path.display(),
            name
        ))
    })
}

fn field(record: &csv::StringRecord, index: usize) -> String {
    record.get(index).unwrap_or("").trim().to_string()
}

/// Sniff a cell: integer, real, boolean, then string
fn sniff_value(raw: &str) -> AttrValue {
    if let Ok(i) = raw.parse::<i64>() {
        return AttrValue::Int(i);
    }
    if let Ok(r) = raw.parse::<f64>() {
        return AttrValue::Real(r);
    }
    match raw {
        "true" | "True" => AttrValue::Bool(true),
        "false" | "False" => AttrValue::Bool(false),
        _ => AttrValue::Str(raw.to_string()),
    }
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(ts);
        }
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(ts) = date.and_hms_opt(0, 0, 0) {
            return Ok(ts);
        }
    }
    Err(ProcgraphError::input_format(format!(
        "unparseable timestamp '{}'",
        raw
    )))
}
