//! PNML serialisation of data-aware Petri nets
//!
//! Writes standard place/transition/arc PNML augmented with a `<data>`
//! child per transition (`<guard>`, `<update>`, `<read>`, `<write>`) and a
//! `<variables>` element declaring the variable store. The reader
//! reconstructs the net, the initial marking, and the data annotations, so
//! a written net replays with the same guard semantics after a round trip.

use crate::domain::dpn::{Dpn, DpnTransition};
use crate::domain::guard::Guard;
use crate::domain::update::{Update, UpdateExpr};
use crate::errors::{ProcgraphError, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::collections::BTreeMap;
use std::path::Path;

const PNML_NET_TYPE: &str = "http://www.pnml.org/version-2009/grammar/pnmlcoremodel";

/// Serialise a DPN to PNML text
pub fn dpn_to_pnml(dpn: &Dpn) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    let map_err = |e| ProcgraphError::parse(format!("pnml write: {}", e));

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(map_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("pnml")))
        .map_err(map_err)?;

    let mut net = BytesStart::new("net");
    net.push_attribute(("id", dpn.name.as_str()));
    net.push_attribute(("type", PNML_NET_TYPE));
    writer.write_event(Event::Start(net)).map_err(map_err)?;

    let mut page = BytesStart::new("page");
    page.push_attribute(("id", "page1"));
    writer.write_event(Event::Start(page)).map_err(map_err)?;

    for (id, label) in dpn.places() {
        let mut place = BytesStart::new("place");
        place.push_attribute(("id", id));
        writer.write_event(Event::Start(place)).map_err(map_err)?;
        write_named_text(&mut writer, "name", label)?;
        if let Some(tokens) = dpn.initial_marking.get(id) {
            if *tokens > 0 {
                write_named_text(&mut writer, "initialMarking", &tokens.to_string())?;
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new("place")))
            .map_err(map_err)?;
    }

    for (id, label) in dpn.transitions() {
        let mut transition = BytesStart::new("transition");
        transition.push_attribute(("id", id));
        writer
            .write_event(Event::Start(transition))
            .map_err(map_err)?;
        if let Some(label) = label {
            write_named_text(&mut writer, "name", label)?;
        }
        if let Some(data) = dpn.data_transitions.get(id) {
            writer
                .write_event(Event::Start(BytesStart::new("data")))
                .map_err(map_err)?;
            write_text_element(&mut writer, "guard", &data.guard.serialized())?;
            write_text_element(&mut writer, "update", &data.update.to_string())?;
            let read: Vec<&str> = data.read_vars.iter().map(String::as_str).collect();
            write_text_element(&mut writer, "read", &read.join(","))?;
            let write: Vec<&str> = data.write_vars.iter().map(String::as_str).collect();
            write_text_element(&mut writer, "write", &write.join(","))?;
            writer
                .write_event(Event::End(BytesEnd::new("data")))
                .map_err(map_err)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("transition")))
            .map_err(map_err)?;
    }

    for (index, arc) in dpn.arcs().iter().enumerate() {
        let mut element = BytesStart::new("arc");
        element.push_attribute(("id", format!("a{}", index).as_str()));
        element.push_attribute(("source", arc.source.as_str()));
        element.push_attribute(("target", arc.target.as_str()));
        if arc.weight > 1 {
            writer.write_event(Event::Start(element)).map_err(map_err)?;
            write_named_text(&mut writer, "inscription", &arc.weight.to_string())?;
            writer
                .write_event(Event::End(BytesEnd::new("arc")))
                .map_err(map_err)?;
        } else {
            writer.write_event(Event::Empty(element)).map_err(map_err)?;
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new("page")))
        .map_err(map_err)?;

    writer
        .write_event(Event::Start(BytesStart::new("variables")))
        .map_err(map_err)?;
    for (name, dtype) in &dpn.variables {
        let mut variable = BytesStart::new("variable");
        variable.push_attribute(("name", name.as_str()));
        variable.push_attribute(("type", dtype.as_str()));
        writer
            .write_event(Event::Empty(variable))
            .map_err(map_err)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("variables")))
        .map_err(map_err)?;

    writer
        .write_event(Event::End(BytesEnd::new("net")))
        .map_err(map_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("pnml")))
        .map_err(map_err)?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| ProcgraphError::parse(format!("pnml write: {}", e)))
}

/// Write `<tag><text>value</text></tag>`
fn write_named_text<W: std::io::Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: &str,
) -> Result<()> {
    let map_err = |e| ProcgraphError::parse(format!("pnml write: {}", e));
    writer
        .write_event(Event::Start(BytesStart::new(tag)))
        .map_err(map_err)?;
    write_text_element(writer, "text", value)?;
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(map_err)
}

/// Write `<tag>value</tag>`
fn write_text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: &str,
) -> Result<()> {
    let map_err = |e| ProcgraphError::parse(format!("pnml write: {}", e));
    writer
        .write_event(Event::Start(BytesStart::new(tag)))
        .map_err(map_err)?;
    writer
        .write_event(Event::Text(BytesText::new(value)))
        .map_err(map_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(map_err)
}

/// Write a DPN to a PNML file
pub fn export_dpn_to_pnml(dpn: &Dpn, path: &Path) -> Result<()> {
    let xml = dpn_to_pnml(dpn)?;
    std::fs::write(path, xml)?;
    Ok(())
}

/// Parse a DPN from PNML text
pub fn dpn_from_pnml(text: &str) -> Result<Dpn> {
    let document = roxmltree::Document::parse(text)
        .map_err(|e| ProcgraphError::input_format(format!("pnml parse: {}", e)))?;
    let root = document.root_element();

    let net = root
        .descendants()
        .find(|node| node.tag_name().name() == "net")
        .ok_or_else(|| ProcgraphError::input_format("pnml has no <net> element"))?;
    let name = net.attribute("id").unwrap_or("imported_net");
    let mut dpn = Dpn::new(name);

    for node in net.descendants() {
        match node.tag_name().name() {
            "place" => {
                let id = require_attribute(&node, "id")?;
                let label = named_text(&node).unwrap_or_else(|| id.to_string());
                dpn.add_place(id, label)?;
                if let Some(tokens) = child_element(&node, "initialMarking")
                    .and_then(|marking| text_of(&marking))
                {
                    let tokens: u32 = tokens.trim().parse().map_err(|_| {
                        ProcgraphError::input_format(format!(
                            "bad initial marking '{}' on place {}",
                            tokens, id
                        ))
                    })?;
                    if tokens > 0 {
                        dpn.initial_marking.insert(id.to_string(), tokens);
                    }
                }
            }
            "transition" => {
                let id = require_attribute(&node, "id")?;
                let label = named_text(&node);
                dpn.add_transition(id, label)?;
                if let Some(data) = child_element(&node, "data") {
                    let annotation = parse_data_annotation(&data)?;
                    dpn.data_transitions.insert(id.to_string(), annotation);
                }
            }
            _ => {}
        }
    }

    for node in net.descendants() {
        if node.tag_name().name() == "arc" {
            let source = require_attribute(&node, "source")?;
            let target = require_attribute(&node, "target")?;
            let weight = child_element(&node, "inscription")
                .and_then(|inscription| text_of(&inscription))
                .and_then(|text| text.trim().parse().ok())
                .unwrap_or(1);
            dpn.add_arc(source, target, weight)?;
        }
    }

    for node in root.descendants() {
        if node.tag_name().name() == "variable" {
            let name = require_attribute(&node, "name")?;
            let dtype = node.attribute("type").unwrap_or("string");
            dpn.variables.insert(name.to_string(), dtype.to_string());
        }
    }

    Ok(dpn)
}

/// Read a DPN from a PNML file
pub fn import_pnml(path: &Path) -> Result<Dpn> {
    let text = std::fs::read_to_string(path)?;
    dpn_from_pnml(&text)
}

fn parse_data_annotation(data: &roxmltree::Node) -> Result<DpnTransition> {
    let guard = match child_element(data, "guard").and_then(|n| text_of(&n)) {
        Some(text) => Guard::parse(&text)?,
        None => Guard::True,
    };
    let update = match child_element(data, "update").and_then(|n| text_of(&n)) {
        Some(text) => parse_update_text(&text)?,
        None => Update::empty(),
    };
    let read_vars = child_element(data, "read")
        .and_then(|n| text_of(&n))
        .map(|text| split_names(&text))
        .unwrap_or_default();
    let write_vars = child_element(data, "write")
        .and_then(|n| text_of(&n))
        .map(|text| split_names(&text))
        .unwrap_or_default();
    Ok(DpnTransition {
        guard,
        update,
        read_vars,
        write_vars,
    })
}

/// Parse the `var := expr; var := expr` update text; `ε` is the empty
/// update
fn parse_update_text(text: &str) -> Result<Update> {
    let text = text.trim();
    if text.is_empty() || text == "\u{03b5}" {
        return Ok(Update::empty());
    }
    let mut assignments = BTreeMap::new();
    for entry in text.split(';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (var, expr) = entry.split_once(":=").ok_or_else(|| {
            ProcgraphError::parse(format!("malformed assignment '{}'", entry))
        })?;
        assignments.insert(var.trim().to_string(), UpdateExpr::parse(expr.trim())?);
    }
    Ok(Update::new(assignments))
}

fn split_names(text: &str) -> std::collections::BTreeSet<String> {
    text.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn require_attribute<'a>(node: &roxmltree::Node<'a, '_>, name: &str) -> Result<&'a str> {
    node.attribute(name).ok_or_else(|| {
        ProcgraphError::input_format(format!(
            "<{}> is missing the '{}' attribute",
            node.tag_name().name(),
            name
        ))
    })
}

/// Text of the `<name><text>…</text></name>` child, if present
fn named_text(node: &roxmltree::Node) -> Option<String> {
    child_element(node, "name").and_then(|name| text_of(&name))
}

fn child_element<'a, 'input>(
    node: &roxmltree::Node<'a, 'input>,
    tag: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|child| child.tag_name().name() == tag)
}

/// Concatenated text content of an element (descends into `<text>`)
fn text_of(node: &roxmltree::Node) -> Option<String> {
    let text: String = node
        .descendants()
        .filter_map(|n| n.text())
        .collect::<Vec<_>>()
        .join("");
    let text = text.trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
