use serde_json::{Map, Value};

use crate::network::PywrNetwork;

/// Writes a [`PywrNetwork`] as a Pywr engine document.
pub struct PywrJsonWriter<'a> {
    network: &'a PywrNetwork,
}

impl<'a> PywrJsonWriter<'a> {
    pub fn new(network: &'a PywrNetwork) -> Self {
        Self { network }
    }

    /// Builds the document. `tables` and `scenarios` are only emitted when
    /// the network has any.
    pub fn as_dict(&self) -> Value {
        let network = self.network;
        let mut out = Map::new();

        out.insert(
            "timestepper".to_string(),
            Value::Object(network.timestepper.data.clone()),
        );
        out.insert(
            "metadata".to_string(),
            Value::Object(network.metadata.data.clone()),
        );
        out.insert(
            "parameters".to_string(),
            Value::Object(
                network
                    .parameters
                    .iter()
                    .map(|p| (p.name.clone(), p.value()))
                    .collect(),
            ),
        );
        out.insert(
            "recorders".to_string(),
            Value::Object(
                network
                    .recorders
                    .iter()
                    .map(|r| (r.name.clone(), r.value()))
                    .collect(),
            ),
        );
        out.insert(
            "nodes".to_string(),
            Value::Array(
                network
                    .nodes
                    .iter()
                    .map(|n| Value::Object(n.data.clone()))
                    .collect(),
            ),
        );
        out.insert(
            "edges".to_string(),
            Value::Array(network.edges.iter().map(|e| e.value()).collect()),
        );

        if !network.tables.is_empty() {
            out.insert(
                "tables".to_string(),
                Value::Object(
                    network
                        .tables
                        .iter()
                        .map(|t| (t.name.clone(), Value::Object(t.data.clone())))
                        .collect(),
                ),
            );
        }

        if !network.scenarios.is_empty() {
            out.insert(
                "scenarios".to_string(),
                Value::Array(
                    network
                        .scenarios
                        .iter()
                        .map(|s| Value::Object(s.data.clone()))
                        .collect(),
                ),
            );
        }

        Value::Object(out)
    }

    pub fn as_json(&self, pretty: bool) -> Result<String, serde_json::Error> {
        let doc = self.as_dict();
        if pretty {
            serde_json::to_string_pretty(&doc)
        } else {
            serde_json::to_string(&doc)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_key_order_and_optional_sections() {
        let network = PywrNetwork::from_value(json!({
            "nodes": [{"name": "a", "type": "input"}, {"name": "b", "type": "output"}],
            "edges": [["a", "b"]],
            "metadata": {"title": "t"},
            "timestepper": {"start": "2020-01-01"}
        }))
        .unwrap();

        let doc = PywrJsonWriter::new(&network).as_dict();
        let keys: Vec<_> = doc.as_object().unwrap().keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["timestepper", "metadata", "parameters", "recorders", "nodes", "edges"]
        );
        assert_eq!(doc["metadata"], json!({"title": "t", "description": ""}));
    }

    #[test]
    fn test_tables_scenarios_and_slots() {
        let network = PywrNetwork::from_value(json!({
            "metadata": {"title": "t", "description": "d", "projection": "EPSG:4326"},
            "nodes": [{"name": "a", "type": "input"}, {"name": "b", "type": "output"}],
            "edges": [["a", "b", 0, 1]],
            "tables": {"demands": {"url": "demands.csv", "index_col": 0}},
            "scenarios": [{"name": "climate", "size": 3}]
        }))
        .unwrap();

        let doc = PywrJsonWriter::new(&network).as_dict();
        assert_eq!(doc["edges"], json!([["a", "b", 0, 1]]));
        assert_eq!(doc["tables"]["demands"]["url"], json!("demands.csv"));
        assert_eq!(doc["scenarios"][0]["size"], json!(3));
        assert_eq!(doc["metadata"]["projection"], json!("EPSG:4326"));
    }

    #[test]
    fn test_parameters_use_engine_form() {
        let network = PywrNetwork::from_value(json!({
            "metadata": {"title": "t"},
            "parameters": {"inflow": {"type": "dataframe", "url": "f.csv", "pandas_kwargs": {}}}
        }))
        .unwrap();

        let json = PywrJsonWriter::new(&network).as_json(false).unwrap();
        let doc: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            doc["parameters"]["inflow"],
            json!({"type": "dataframeparameter", "url": "f.csv", "parse_dates": true})
        );
    }
}
