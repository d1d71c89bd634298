use serde_json::{Map, Value};

use super::error::NetworkError;

/// Node keys that describe the node itself rather than a model attribute.
pub const NODE_RESERVED_KEYS: &[&str] = &["name", "type", "position", "comment"];

/// A single Pywr node.
///
/// `data` keeps every key of the source document, including `name`
/// and `type`, so the node serializes back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct PywrNode {
    pub name: String,
    pub node_type: String,
    pub data: Map<String, Value>,
}

impl PywrNode {
    /// Builds a node from its JSON object, as found at `nodes[index]`.
    pub fn from_value(index: usize, value: Value) -> Result<Self, NetworkError> {
        let Value::Object(data) = value else {
            return Err(NetworkError::InvalidNode {
                index,
                reason: "not an object".to_string(),
            });
        };
        Self::from_map(index, data)
    }

    pub(crate) fn from_map(index: usize, data: Map<String, Value>) -> Result<Self, NetworkError> {
        let name = data
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| NetworkError::InvalidNode {
                index,
                reason: "missing string `name`".to_string(),
            })?
            .to_string();

        let node_type = data
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| NetworkError::InvalidNode {
                index,
                reason: format!("node `{name}` has no string `type`"),
            })?
            .to_string();

        Ok(Self {
            name,
            node_type,
            data,
        })
    }

    /// The node's free-text comment, if any.
    pub fn comment(&self) -> Option<&str> {
        self.data.get("comment").and_then(Value::as_str)
    }

    /// The `position` object, if any.
    pub fn position(&self) -> Option<&Map<String, Value>> {
        self.data.get("position").and_then(Value::as_object)
    }

    /// Names of model attributes carried by this node, in document order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.data
            .keys()
            .map(String::as_str)
            .filter(|k| !NODE_RESERVED_KEYS.contains(k))
    }

    /// Picks the x/y coordinates to store for this node.
    ///
    /// With a projection the `geographic` entry is preferred, otherwise
    /// `schematic`. When neither is present the last entry is used.
    pub fn coordinates(&self, projected: bool) -> Option<(Value, Value)> {
        let position = self.position()?;
        let preferred = if projected { "geographic" } else { "schematic" };

        let entry = position
            .get(preferred)
            .or_else(|| position.values().last())?;

        match entry.as_array().map(Vec::as_slice) {
            Some([x, y, ..]) => Some((x.clone(), y.clone())),
            _ => None,
        }
    }
}

/// A directed edge between two nodes, with optional slots.
#[derive(Debug, Clone, PartialEq)]
pub struct PywrEdge {
    pub src: String,
    pub dest: String,
    pub slots: Option<(Value, Value)>,
}

impl PywrEdge {
    pub fn new(src: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dest: dest.into(),
            slots: None,
        }
    }

    pub fn with_slots(mut self, from: Value, to: Value) -> Self {
        self.slots = Some((from, to));
        self
    }

    /// Parses `[src, dest]` or `[src, dest, slot_from, slot_to]`.
    pub fn from_value(index: usize, value: &Value) -> Result<Self, NetworkError> {
        let invalid = |reason: &str| NetworkError::InvalidEdge {
            index,
            reason: reason.to_string(),
        };

        let items = value.as_array().ok_or_else(|| invalid("not a list"))?;
        let (src, dest) = match items.as_slice() {
            [Value::String(src), Value::String(dest), ..] => (src.clone(), dest.clone()),
            _ => return Err(invalid("needs at least two node names")),
        };

        let slots = match items.as_slice() {
            [_, _, from, to, ..] => Some((from.clone(), to.clone())),
            _ => None,
        };

        Ok(Self { src, dest, slots })
    }

    /// Link name used in the graph database.
    pub fn name(&self) -> String {
        format!("{} to {}", self.src, self.dest)
    }

    /// The engine-facing list form.
    pub fn value(&self) -> Value {
        let mut items = vec![Value::String(self.src.clone()), Value::String(self.dest.clone())];
        if let Some((from, to)) = &self.slots {
            items.push(from.clone());
            items.push(to.clone());
        }
        Value::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_requires_name_and_type() {
        let err = PywrNode::from_value(3, json!({"type": "input"})).unwrap_err();
        assert!(matches!(err, NetworkError::InvalidNode { index: 3, .. }));

        let err = PywrNode::from_value(0, json!({"name": "a"})).unwrap_err();
        assert!(err.to_string().contains("`a`"));
    }

    #[test]
    fn test_attribute_names_skip_reserved() {
        let node = PywrNode::from_value(
            0,
            json!({"name": "r1", "type": "storage", "comment": "c", "max_volume": 10, "position": {}, "cost": -1}),
        )
        .unwrap();

        let names: Vec<_> = node.attribute_names().collect();
        assert_eq!(names, vec!["max_volume", "cost"]);
        assert_eq!(node.comment(), Some("c"));
    }

    #[test]
    fn test_coordinates_prefer_projection() {
        let node = PywrNode::from_value(
            0,
            json!({"name": "a", "type": "input", "position": {"schematic": [1, 2], "geographic": [3.5, 4.5]}}),
        )
        .unwrap();

        assert_eq!(node.coordinates(true), Some((json!(3.5), json!(4.5))));
        assert_eq!(node.coordinates(false), Some((json!(1), json!(2))));
    }

    #[test]
    fn test_coordinates_fall_back_to_last_entry() {
        let node = PywrNode::from_value(
            0,
            json!({"name": "a", "type": "input", "position": {"schematic": [1, 2]}}),
        )
        .unwrap();

        assert_eq!(node.coordinates(true), Some((json!(1), json!(2))));
    }

    #[test]
    fn test_edge_with_slots() {
        let edge = PywrEdge::from_value(0, &json!(["a", "b", 1, "x"])).unwrap();
        assert_eq!(edge.slots, Some((json!(1), json!("x"))));
        assert_eq!(edge.value(), json!(["a", "b", 1, "x"]));
        assert_eq!(edge.name(), "a to b");
    }

    #[test]
    fn test_edge_rejects_short_list() {
        assert!(PywrEdge::from_value(0, &json!(["a"])).is_err());
        assert!(PywrEdge::from_value(0, &json!(["a", 2])).is_err());
        assert!(PywrEdge::from_value(0, &json!("a")).is_err());
    }
}
