//! Serde models of the Hydra graph-resource schema.
//!
//! Only the fields this crate reads or writes are modelled. Unknown server
//! fields are ignored on input, and scenarios keep them in `extra` so they
//! survive a read/update cycle.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A network as posted to or returned by `add_network` / `get_network`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HydraNetwork {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default, deserialize_with = "null_default")]
    pub nodes: Vec<HydraNode>,
    #[serde(default, deserialize_with = "null_default")]
    pub links: Vec<HydraLink>,
    #[serde(default)]
    pub layout: Option<Value>,
    #[serde(default, deserialize_with = "null_default")]
    pub scenarios: Vec<HydraScenario>,
    #[serde(default)]
    pub projection: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub attributes: Vec<ResourceAttribute>,
    #[serde(default, deserialize_with = "null_default")]
    pub types: Vec<TypeRef>,
}

impl HydraNetwork {
    pub fn node(&self, name: &str) -> Option<&HydraNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn node_by_id(&self, id: i64) -> Option<&HydraNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydraNode {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "node_resource_type")]
    pub resource_type: String,
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default)]
    pub layout: Option<Value>,
    #[serde(default, deserialize_with = "null_default")]
    pub attributes: Vec<ResourceAttribute>,
    #[serde(default, deserialize_with = "null_default")]
    pub types: Vec<TypeRef>,
}

impl HydraNode {
    /// Name of the node's first type, when the server supplied one.
    pub fn type_name(&self) -> Option<&str> {
        self.types.first().and_then(|t| t.name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydraLink {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "link_resource_type")]
    pub resource_type: String,
    pub node_1_id: i64,
    pub node_2_id: i64,
    #[serde(default)]
    pub layout: Option<Value>,
    #[serde(default, alias = "resource_attributes", deserialize_with = "null_default")]
    pub attributes: Vec<ResourceAttribute>,
    #[serde(default, deserialize_with = "null_default")]
    pub types: Vec<TypeRef>,
}

impl HydraLink {
    /// Edge slots stored under `layout.slots`.
    pub fn slots(&self) -> Option<(Value, Value)> {
        let slots = self.layout.as_ref()?.get("slots")?.as_array()?;
        match slots.as_slice() {
            [from, to] => Some((from.clone(), to.clone())),
            _ => None,
        }
    }
}

/// Binding of an attribute to a node, link or network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAttribute {
    pub id: i64,
    pub attr_id: i64,
    #[serde(default = "flag_no")]
    pub attr_is_var: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_key: Option<String>,
}

impl ResourceAttribute {
    pub fn new(id: i64, attr_id: i64) -> Self {
        Self {
            id,
            attr_id,
            attr_is_var: flag_no(),
            ref_key: None,
        }
    }

    pub fn is_var(&self) -> bool {
        self.attr_is_var == "Y"
    }
}

/// Reference to a template type from a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRef {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_template_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl TypeRef {
    pub fn new(id: i64, child_template_id: Option<i64>) -> Self {
        Self {
            id,
            child_template_id,
            template_id: None,
            name: None,
        }
    }

    /// The template this type belongs to, whichever field carries it.
    pub fn template(&self) -> Option<i64> {
        self.template_id.or(self.child_template_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HydraScenario {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<i64>,
    #[serde(default, deserialize_with = "null_default")]
    pub resourcescenarios: Vec<ResourceScenario>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HydraScenario {
    /// The dataset bound to a resource attribute in this scenario.
    pub fn dataset_for(&self, resource_attr_id: i64) -> Option<&Dataset> {
        self.resourcescenarios
            .iter()
            .find(|rs| rs.resource_attr_id == resource_attr_id)
            .map(|rs| &rs.dataset)
    }
}

/// A dataset bound to a resource attribute within a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceScenario {
    pub resource_attr_id: i64,
    pub dataset: Dataset,
}

impl ResourceScenario {
    pub fn new(resource_attr_id: i64, dataset: Dataset) -> Self {
        Self {
            resource_attr_id,
            dataset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(deserialize_with = "de_value_string")]
    pub value: String,
    #[serde(default = "empty_metadata")]
    pub metadata: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<i64>,
    #[serde(default = "flag_no", deserialize_with = "de_flag")]
    pub hidden: String,
}

impl Dataset {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            data_type: data_type.into(),
            value: value.into(),
            metadata: empty_metadata(),
            unit: Some("-".to_string()),
            unit_id: None,
            hidden: flag_no(),
        }
    }

    pub fn with_unit_id(mut self, unit_id: Option<i64>) -> Self {
        self.unit_id = unit_id;
        self
    }

    /// The value decoded as JSON, or the raw string when it is not JSON.
    pub fn parsed_value(&self) -> Value {
        serde_json::from_str(&self.value).unwrap_or_else(|_| Value::String(self.value.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: i64,
    pub name: String,
    #[serde(default, alias = "types", deserialize_with = "null_default")]
    pub templatetypes: Vec<TemplateType>,
}

impl Template {
    /// The type describing the network itself.
    pub fn network_type(&self) -> Option<&TemplateType> {
        self.templatetypes
            .iter()
            .find(|t| t.resource_type.eq_ignore_ascii_case("NETWORK"))
    }

    pub fn type_id_by_name(&self, name: &str) -> Option<i64> {
        self.templatetypes
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .map(|t| t.id)
    }

    pub fn type_by_id(&self, id: i64) -> Option<&TemplateType> {
        self.templatetypes.iter().find(|t| t.id == id)
    }

    /// Attribute name to id over every type attribute of the template.
    pub fn attribute_ids(&self) -> HashMap<String, i64> {
        self.templatetypes
            .iter()
            .flat_map(|t| t.typeattrs.iter())
            .filter_map(|ta| ta.attr.as_ref().map(|a| (a.name.clone(), a.id)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateType {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default, deserialize_with = "null_default")]
    pub typeattrs: Vec<TypeAttr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeAttr {
    pub attr_id: i64,
    #[serde(default)]
    pub attr: Option<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub dimension_id: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Attribute definition sent to `add_attributes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAttribute {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_id: Option<i64>,
}

impl NewAttribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            dimension_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(deserialize_with = "de_value_string")]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: i64,
    pub name: String,
    pub abbreviation: String,
    #[serde(default)]
    pub dimension_id: Option<i64>,
}

fn node_resource_type() -> String {
    "NODE".to_string()
}

fn link_resource_type() -> String {
    "LINK".to_string()
}

fn flag_no() -> String {
    "N".to_string()
}

fn empty_metadata() -> Value {
    Value::String("{}".to_string())
}

fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn de_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid coordinate `{s}`"))),
        _ => Ok(None),
    }
}

fn de_value_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn de_flag<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        Some(Value::Bool(true)) => "Y".to_string(),
        _ => flag_no(),
    })
}
