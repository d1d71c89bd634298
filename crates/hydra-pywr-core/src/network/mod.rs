//! In-memory model of a Pywr network.
//!
//! A [`PywrNetwork`] is parsed from a Pywr JSON document and keeps every
//! collection in document order so that it can be written back without
//! reshuffling keys.

mod component;
mod error;
mod integrated;
mod node;
mod parameter;

pub use component::{Metadata, Scenario, Table, Timestepper};
pub use error::NetworkError;
pub use integrated::{engine_file, IntegratedNetwork};
pub use node::{PywrEdge, PywrNode, NODE_RESERVED_KEYS};
pub use parameter::{is_recorder_type, Parameter, ParameterKind, Recorder, RecorderKind};

use std::collections::HashSet;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::writer::PywrJsonWriter;
use component::{array_section, object_section};

/// A complete Pywr network.
#[derive(Debug, Clone, PartialEq)]
pub struct PywrNetwork {
    pub metadata: Metadata,
    pub timestepper: Timestepper,
    pub nodes: Vec<PywrNode>,
    pub edges: Vec<PywrEdge>,
    pub parameters: Vec<Parameter>,
    pub recorders: Vec<Recorder>,
    pub tables: Vec<Table>,
    pub scenarios: Vec<Scenario>,
}

impl PywrNetwork {
    /// Creates an empty network with the given metadata.
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            timestepper: Timestepper::default(),
            nodes: Vec::new(),
            edges: Vec::new(),
            parameters: Vec::new(),
            recorders: Vec::new(),
            tables: Vec::new(),
            scenarios: Vec::new(),
        }
    }

    /// Parses a Pywr document.
    pub fn from_value(value: Value) -> Result<Self, NetworkError> {
        let Value::Object(mut doc) = value else {
            return Err(NetworkError::InvalidSection("network".to_string()));
        };

        let metadata = Metadata::from_section(doc.remove("metadata"))?;
        let timestepper = Timestepper::from_section(doc.remove("timestepper"))?;

        let mut nodes = Vec::new();
        let mut seen = HashSet::new();
        for (index, raw) in array_section("nodes", doc.remove("nodes"))?.into_iter().enumerate() {
            let node = PywrNode::from_value(index, raw)?;
            if !seen.insert(node.name.clone()) {
                return Err(NetworkError::DuplicateNode(node.name));
            }
            nodes.push(node);
        }

        let mut edges = Vec::new();
        for (index, raw) in array_section("edges", doc.remove("edges"))?.iter().enumerate() {
            let edge = PywrEdge::from_value(index, raw)?;
            for end in [&edge.src, &edge.dest] {
                if !seen.contains(end) {
                    return Err(NetworkError::UnknownEdgeNode {
                        src: edge.src.clone(),
                        dest: edge.dest.clone(),
                        missing: end.clone(),
                    });
                }
            }
            edges.push(edge);
        }

        let parameters = object_section("parameters", doc.remove("parameters"))?
            .into_iter()
            .map(|(name, data)| Parameter::new(name, data))
            .collect::<Result<Vec<_>, _>>()?;

        let recorders = object_section("recorders", doc.remove("recorders"))?
            .into_iter()
            .map(|(name, data)| Recorder::new(name, data))
            .collect::<Result<Vec<_>, _>>()?;

        let tables = object_section("tables", doc.remove("tables"))?
            .into_iter()
            .map(|(name, data)| match data {
                Value::Object(data) => Ok(Table::new(name, data)),
                _ => Err(NetworkError::InvalidSection(format!("tables.{name}"))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let scenarios = array_section("scenarios", doc.remove("scenarios"))?
            .into_iter()
            .enumerate()
            .map(|(index, data)| match data {
                Value::Object(data) => Ok(Scenario::new(data)),
                _ => Err(NetworkError::InvalidSection(format!("scenarios[{index}]"))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            title = metadata.title(),
            nodes = nodes.len(),
            edges = edges.len(),
            parameters = parameters.len(),
            recorders = recorders.len(),
            "parsed pywr network"
        );

        Ok(Self {
            metadata,
            timestepper,
            nodes,
            edges,
            parameters,
            recorders,
            tables,
            scenarios,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, NetworkError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, NetworkError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| NetworkError::io(path, e))?;
        Self::from_json_str(&json)
    }

    pub fn title(&self) -> &str {
        self.metadata.title()
    }

    pub fn description(&self) -> &str {
        self.metadata.description()
    }

    pub fn projection(&self) -> Option<&str> {
        self.metadata.projection()
    }

    pub fn node(&self, name: &str) -> Option<&PywrNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn recorder(&self, name: &str) -> Option<&Recorder> {
        self.recorders.iter().find(|r| r.name == name)
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Moves node-owned global components inline.
    ///
    /// A parameter or recorder named `__<node>__:<attr>` is node-owned when
    /// `<node>` exists and its `<attr>` refers to that name. Returns the
    /// number of components moved.
    pub fn attach_parameters(&mut self) -> usize {
        let mut moved = 0;

        let mut kept = Vec::with_capacity(self.parameters.len());
        for parameter in std::mem::take(&mut self.parameters) {
            if self.inline_component(&parameter.name, &parameter.data) {
                moved += 1;
            } else {
                kept.push(parameter);
            }
        }
        self.parameters = kept;

        let mut kept = Vec::with_capacity(self.recorders.len());
        for recorder in std::mem::take(&mut self.recorders) {
            if self.inline_component(&recorder.name, &recorder.data) {
                moved += 1;
            } else {
                kept.push(recorder);
            }
        }
        self.recorders = kept;

        if moved > 0 {
            debug!(moved, "attached node-owned components");
        }
        moved
    }

    fn inline_component(&mut self, name: &str, data: &Map<String, Value>) -> bool {
        let Some((node_name, attr)) = split_component_name(name) else {
            return false;
        };
        let Some(node) = self.nodes.iter_mut().find(|n| n.name == node_name) else {
            return false;
        };
        match node.data.get_mut(attr) {
            Some(slot) if slot.as_str() == Some(name) => {
                *slot = Value::Object(data.clone());
                true
            }
            _ => false,
        }
    }

    /// Lifts inline node components into the global tables.
    ///
    /// Every node attribute that is an object with a `type` key is moved to
    /// `parameters` (or `recorders` when its type ends with `recorder`)
    /// under the name `__<node>__:<attr>`, and the node attribute is
    /// replaced by that name. Returns the number of components lifted.
    pub fn detach_parameters(&mut self) -> usize {
        let mut lifted = 0;

        for node in &mut self.nodes {
            let keys: Vec<String> = node.attribute_names().map(str::to_string).collect();
            for attr in keys {
                let Some(Value::Object(data)) = node.data.get(&attr) else {
                    continue;
                };
                let Some(type_name) = data.get("type").and_then(Value::as_str) else {
                    continue;
                };

                let name = component_name(&node.name, &attr);
                if is_recorder_type(type_name) {
                    self.recorders
                        .push(Recorder::from_typed(name.clone(), type_name, data.clone()));
                } else {
                    self.parameters
                        .push(Parameter::from_typed(name.clone(), type_name, data.clone()));
                }

                node.data.insert(attr, Value::String(name));
                lifted += 1;
            }
        }

        if lifted > 0 {
            debug!(lifted, "detached inline components");
        }
        lifted
    }

    /// The engine document as a JSON value.
    pub fn as_dict(&self) -> Value {
        PywrJsonWriter::new(self).as_dict()
    }

    pub fn as_json(&self, pretty: bool) -> Result<String, NetworkError> {
        Ok(PywrJsonWriter::new(self).as_json(pretty)?)
    }
}

/// Name of a node-owned global component: `__<node>__:<attr>`.
pub fn component_name(node: &str, attr: &str) -> String {
    format!("__{node}__:{attr}")
}

/// Splits `__<node>__:<attr>` into its node and attribute names.
pub fn split_component_name(name: &str) -> Option<(&str, &str)> {
    let rest = name.strip_prefix("__")?;
    let (node, attr) = rest.rsplit_once("__:")?;
    if node.is_empty() || attr.is_empty() {
        return None;
    }
    Some((node, attr))
}
