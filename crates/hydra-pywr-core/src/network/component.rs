//! Flat dictionary holders for the network-level sections.

use serde_json::{Map, Value};

use super::error::NetworkError;

/// The `timestepper` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timestepper {
    pub data: Map<String, Value>,
}

impl Timestepper {
    pub fn new(data: Map<String, Value>) -> Self {
        Self { data }
    }

    pub(crate) fn from_section(section: Option<Value>) -> Result<Self, NetworkError> {
        Ok(Self::new(object_section("timestepper", section)?))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

/// The `metadata` section. `title` and `description` are always present
/// and always first.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub data: Map<String, Value>,
}

impl Metadata {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("title".to_string(), Value::String(title.into()));
        data.insert("description".to_string(), Value::String(description.into()));
        Self { data }
    }

    /// Builds metadata from a raw section. A missing `description` becomes `""`.
    pub fn from_map(mut raw: Map<String, Value>) -> Result<Self, NetworkError> {
        let title = match raw.remove("title") {
            Some(Value::String(title)) => title,
            _ => return Err(NetworkError::MissingTitle),
        };
        let description = match raw.remove("description") {
            Some(Value::String(description)) => description,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        let mut metadata = Self::new(title, description);
        metadata.data.extend(raw);
        Ok(metadata)
    }

    pub(crate) fn from_section(section: Option<Value>) -> Result<Self, NetworkError> {
        match section {
            Some(Value::Object(raw)) => Self::from_map(raw),
            Some(_) => Err(NetworkError::InvalidSection("metadata".to_string())),
            None => Err(NetworkError::MissingTitle),
        }
    }

    pub fn title(&self) -> &str {
        self.data.get("title").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn description(&self) -> &str {
        self.data
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn projection(&self) -> Option<&str> {
        self.data.get("projection").and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }
}

/// A named entry of the `tables` section.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub data: Map<String, Value>,
}

impl Table {
    pub fn new(name: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// One entry of the `scenarios` list.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub data: Map<String, Value>,
}

impl Scenario {
    pub fn new(data: Map<String, Value>) -> Self {
        Self { data }
    }

    pub fn name(&self) -> Option<&str> {
        self.data.get("name").and_then(Value::as_str)
    }
}

/// Returns the object held by an optional section, or an empty map.
pub(crate) fn object_section(
    name: &str,
    section: Option<Value>,
) -> Result<Map<String, Value>, NetworkError> {
    match section {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(NetworkError::InvalidSection(name.to_string())),
    }
}

/// Returns the list held by an optional section, or an empty list.
pub(crate) fn array_section(name: &str, section: Option<Value>) -> Result<Vec<Value>, NetworkError> {
    match section {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(NetworkError::InvalidSection(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_metadata_orders_title_first() {
        let metadata = Metadata::from_map(as_map(json!({
            "minimum_version": "1.0",
            "description": "d",
            "title": "t"
        })))
        .unwrap();

        let keys: Vec<_> = metadata.data.keys().cloned().collect();
        assert_eq!(keys, vec!["title", "description", "minimum_version"]);
    }

    #[test]
    fn test_metadata_defaults_description() {
        let metadata = Metadata::from_map(as_map(json!({"title": "t"}))).unwrap();
        assert_eq!(metadata.description(), "");
        assert!(metadata.projection().is_none());
    }

    #[test]
    fn test_metadata_requires_title() {
        let err = Metadata::from_map(as_map(json!({"description": "d"}))).unwrap_err();
        assert!(matches!(err, NetworkError::MissingTitle));
        assert!(matches!(Metadata::from_section(None), Err(NetworkError::MissingTitle)));
    }

    #[test]
    fn test_sections_default_to_empty() {
        assert!(object_section("tables", None).unwrap().is_empty());
        assert!(array_section("scenarios", Some(Value::Null)).unwrap().is_empty());
        assert!(array_section("edges", Some(json!({}))).is_err());
    }
}
