//! Reader from the graph-resource model back to the network model.

mod rules;

pub use rules::render_rules_module;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::client::{ClientError, HydraClient};
use crate::hydra::datatype;
use crate::hydra::{Attribute, Dataset, HydraNetwork, HydraScenario, ResourceAttribute, Rule, Template};
use crate::network::{
    IntegratedNetwork, Metadata, NetworkError, PywrEdge, PywrNetwork, PywrNode, Scenario, Table,
    Timestepper,
};
use crate::storage::{Storage, StorageError};

/// Hydra resource keys that never become node attributes.
const HYDRA_BOOKKEEPING_KEYS: &[&str] = &[
    "id",
    "status",
    "cr_date",
    "network_id",
    "x",
    "y",
    "types",
    "attributes",
    "layout",
    "network",
    "description",
];

const TABLE_PREFIX: &str = "tbl_";

/// Errors that can occur while reading a network back from Hydra.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("Scenario {0} does not name its network")]
    MissingNetworkId(i64),

    #[error("Network has no template type at index {0}")]
    MissingTemplate(usize),

    #[error("Network has no `{0}` attribute with data")]
    MissingAttribute(String),

    #[error("Attribute `{attr}` holds an invalid value: {reason}")]
    InvalidValue { attr: String, reason: String },

    #[error("Use of `{word}` is forbidden in custom rule `{rule}`")]
    ForbiddenRule { rule: String, word: &'static str },

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Rebuilds a [`PywrNetwork`] from one scenario of a Hydra network.
///
/// Only nodes typed by the selected template are read, so each domain of
/// an integrated network is read by its own reader.
pub struct HydraToPywrNetwork {
    network: HydraNetwork,
    scenario: HydraScenario,
    rules: Vec<Rule>,
    attributes: HashMap<i64, Attribute>,
    template: Template,
}

impl HydraToPywrNetwork {
    /// Fetches everything needed to read `scenario_id` with the template of
    /// the network's `index`th type.
    #[instrument(skip(client))]
    pub async fn from_scenario_id<C: HydraClient + ?Sized>(
        client: &C,
        scenario_id: i64,
        index: usize,
    ) -> Result<Self, ReaderError> {
        let scenario = client.get_scenario(scenario_id, true).await?;
        let network_id = scenario
            .network_id
            .ok_or(ReaderError::MissingNetworkId(scenario_id))?;

        let network = client.get_network(network_id, true, None).await?;
        let rules = client.get_resource_rules("NETWORK", network_id).await?;
        let attributes = client
            .get_attributes()
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        let template_id = network
            .types
            .get(index)
            .and_then(|t| t.template())
            .ok_or(ReaderError::MissingTemplate(index))?;
        info!(template_id, network_id, "retrieving template");
        let template = client.get_template(template_id).await?;

        Ok(Self::new(network, scenario, rules, attributes, template))
    }

    pub fn new(
        network: HydraNetwork,
        scenario: HydraScenario,
        rules: Vec<Rule>,
        attributes: HashMap<i64, Attribute>,
        template: Template,
    ) -> Self {
        Self {
            network,
            scenario,
            rules,
            attributes,
            template,
        }
    }

    pub fn hydra_network(&self) -> &HydraNetwork {
        &self.network
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn has_rules(&self) -> bool {
        !self.rules.is_empty()
    }

    /// Builds the network model.
    ///
    /// With a `domain`, network-level sections come from the
    /// `<domain>_data` descriptor instead of individual attributes.
    pub fn build_pywr_network(&self, domain: Option<&str>) -> Result<PywrNetwork, ReaderError> {
        let (nodes, names_by_id) = self.build_nodes()?;
        let edges = self.build_edges(&names_by_id);

        let mut network = match domain {
            Some(domain) => self.build_domain_sections(domain)?,
            None => self.build_network_sections()?,
        };

        let listed = match domain {
            Some(domain) => self.domain_components(domain)?,
            None => None,
        };
        self.build_parameters_recorders(&mut network, listed.as_ref())?;

        network.nodes = nodes;
        network.edges = edges;

        debug!(
            title = network.title(),
            nodes = network.nodes.len(),
            edges = network.edges.len(),
            parameters = network.parameters.len(),
            recorders = network.recorders.len(),
            "read pywr network"
        );
        Ok(network)
    }

    /// Writes the network's rules as an importable module.
    pub fn write_rules_module(&self, storage: &dyn Storage, file: &str) -> Result<PathBuf, ReaderError> {
        let module = render_rules_module(&self.rules)?;
        let path = storage.write_text(file, &module)?;
        info!(rules = self.rules.len(), path = %path.display(), "wrote rules module");
        Ok(path)
    }

    fn dataset(&self, ra: &ResourceAttribute) -> Option<&Dataset> {
        self.scenario.dataset_for(ra.id)
    }

    fn attr_name(&self, ra: &ResourceAttribute) -> Option<&str> {
        self.attributes.get(&ra.attr_id).map(|a| a.name.as_str())
    }

    /// Network attributes with data, as `(attribute name, dataset)`.
    fn network_values(&self) -> impl Iterator<Item = (&str, &Dataset)> {
        self.network
            .attributes
            .iter()
            .filter_map(|ra| Some((self.attr_name(ra)?, self.dataset(ra)?)))
    }

    fn network_value(&self, name: &str) -> Option<Value> {
        self.network_values()
            .find(|(attr, _)| *attr == name)
            .map(|(_, ds)| ds.parsed_value())
    }

    fn node_type_name(&self, types: &[crate::hydra::TypeRef]) -> Option<&str> {
        types
            .iter()
            .filter(|t| t.template().map_or(true, |id| id == self.template.id))
            .find_map(|t| self.template.type_by_id(t.id))
            .map(|t| t.name.as_str())
    }

    fn build_nodes(&self) -> Result<(Vec<PywrNode>, HashMap<i64, String>), ReaderError> {
        let mut nodes = Vec::new();
        let mut names_by_id = HashMap::new();

        for (index, hydra_node) in self.network.nodes.iter().enumerate() {
            let Some(node_type) = self.node_type_name(&hydra_node.types) else {
                continue;
            };

            let mut data = Map::new();
            data.insert("name".to_string(), json!(hydra_node.name));
            data.insert("type".to_string(), json!(node_type));

            for ra in &hydra_node.attributes {
                let Some(name) = self.attr_name(ra) else {
                    continue;
                };
                let Some(dataset) = self.dataset(ra) else {
                    continue;
                };
                if ra.is_var() && !name.to_lowercase().contains("recorder") {
                    continue;
                }
                if HYDRA_BOOKKEEPING_KEYS.contains(&name) || name == "name" || name == "type" {
                    continue;
                }
                data.insert(name.to_string(), dataset.parsed_value());
            }

            data.insert(
                "position".to_string(),
                json!({"geographic": [hydra_node.x.unwrap_or(0.0), hydra_node.y.unwrap_or(0.0)]}),
            );
            if let Some(comment) = hydra_node.description.as_deref().filter(|c| !c.is_empty()) {
                data.insert("comment".to_string(), json!(comment));
            }

            names_by_id.insert(hydra_node.id, hydra_node.name.clone());
            nodes.push(PywrNode::from_map(index, data)?);
        }

        Ok((nodes, names_by_id))
    }

    fn build_edges(&self, names_by_id: &HashMap<i64, String>) -> Vec<PywrEdge> {
        self.network
            .links
            .iter()
            .filter_map(|link| {
                let src = names_by_id.get(&link.node_1_id)?;
                let dest = names_by_id.get(&link.node_2_id)?;
                let edge = PywrEdge::new(src, dest);
                Some(match link.slots() {
                    Some((from, to)) => edge.with_slots(from, to),
                    None => edge,
                })
            })
            .collect()
    }

    fn build_parameters_recorders(
        &self,
        network: &mut PywrNetwork,
        listed: Option<&HashSet<String>>,
    ) -> Result<(), ReaderError> {
        for (_, dataset) in self.network_values() {
            if listed.is_some_and(|names| !names.contains(&dataset.name)) {
                continue;
            }
            if datatype::is_parameter(&dataset.data_type) {
                network
                    .parameters
                    .push(crate::network::Parameter::new(&dataset.name, dataset.parsed_value())?);
            } else if datatype::is_recorder(&dataset.data_type) {
                network
                    .recorders
                    .push(crate::network::Recorder::new(&dataset.name, dataset.parsed_value())?);
            }
        }
        Ok(())
    }

    fn build_network_sections(&self) -> Result<PywrNetwork, ReaderError> {
        let mut metadata = Metadata::new(&self.network.name, &self.network.description);
        if let Some(projection) = &self.network.projection {
            metadata.insert("projection", json!(projection));
        }

        let mut timestepper = Map::new();
        let mut tables: Vec<Table> = Vec::new();

        for (name, dataset) in self.network_values() {
            let (group, key) = name.split_once('.').unwrap_or((name, ""));
            if group == "timestepper" {
                let key = name.rsplit('.').next().unwrap_or(key);
                timestepper.insert(key.to_string(), dataset.parsed_value());
            } else if group == "metadata" {
                let key = name.rsplit('.').next().unwrap_or(key);
                metadata.insert(key, dataset.parsed_value());
            } else if let Some(rest) = name.strip_prefix(TABLE_PREFIX) {
                let Some((table, key)) = rest.split_once('.') else {
                    warn!(attr = name, "table attribute without a key");
                    continue;
                };
                match tables.iter_mut().find(|t| t.name == table) {
                    Some(existing) => {
                        existing.data.insert(key.to_string(), dataset.parsed_value());
                    }
                    None => {
                        let mut data = Map::new();
                        data.insert(key.to_string(), dataset.parsed_value());
                        tables.push(Table::new(table, data));
                    }
                }
            }
        }

        let scenarios = match self.network_value("scenarios") {
            Some(value) => scenarios_from(value.get("scenarios"), "scenarios")?,
            None => Vec::new(),
        };

        let mut network = PywrNetwork::new(metadata);
        network.timestepper = Timestepper::new(coerce_timestep(timestepper));
        network.tables = tables;
        network.scenarios = scenarios;
        Ok(network)
    }

    fn domain_descriptor(&self, domain: &str) -> Result<Map<String, Value>, ReaderError> {
        let attr = format!("{domain}_data");
        match self.network_value(&attr) {
            Some(Value::Object(data)) => Ok(data),
            Some(_) => Err(ReaderError::InvalidValue {
                attr,
                reason: "not an object".to_string(),
            }),
            None => Err(ReaderError::MissingAttribute(attr)),
        }
    }

    fn domain_components(&self, domain: &str) -> Result<Option<HashSet<String>>, ReaderError> {
        let data = self.domain_descriptor(domain)?;
        Ok(data.get("components").and_then(Value::as_array).map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        }))
    }

    fn build_domain_sections(&self, domain: &str) -> Result<PywrNetwork, ReaderError> {
        let attr = format!("{domain}_data");
        let mut data = self.domain_descriptor(domain)?;

        let metadata = match data.remove("metadata") {
            Some(Value::Object(map)) => Metadata::from_map(map)?,
            _ => Metadata::new(&self.network.name, &self.network.description),
        };
        let timestepper = match data.remove("timestepper") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let tables = match data.remove("tables") {
            Some(Value::Object(tables)) => tables
                .into_iter()
                .map(|(name, value)| match value {
                    Value::Object(data) => Ok(Table::new(name, data)),
                    _ => Err(ReaderError::InvalidValue {
                        attr: attr.clone(),
                        reason: format!("table `{name}` is not an object"),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => Vec::new(),
        };

        let mut network = PywrNetwork::new(metadata);
        network.timestepper = Timestepper::new(coerce_timestep(timestepper));
        network.tables = tables;
        network.scenarios = scenarios_from(data.get("scenarios"), &attr)?;
        Ok(network)
    }
}

/// Reads both domains of an integrated network plus its pynsim config.
#[instrument(skip(client))]
pub async fn read_integrated<C: HydraClient + ?Sized>(
    client: &C,
    scenario_id: i64,
) -> Result<(IntegratedNetwork, Vec<Rule>), ReaderError> {
    let water_reader = HydraToPywrNetwork::from_scenario_id(client, scenario_id, 0).await?;
    let energy_reader = HydraToPywrNetwork::from_scenario_id(client, scenario_id, 1).await?;

    let water = water_reader.build_pywr_network(Some("water"))?;
    let energy = energy_reader.build_pywr_network(Some("energy"))?;

    let config = match water_reader.network_value("config") {
        Some(Value::Object(mut wrapper)) => match wrapper.remove("config") {
            Some(Value::Object(config)) => config,
            _ => {
                return Err(ReaderError::InvalidValue {
                    attr: "config".to_string(),
                    reason: "missing `config` object".to_string(),
                })
            }
        },
        Some(_) => {
            return Err(ReaderError::InvalidValue {
                attr: "config".to_string(),
                reason: "not an object".to_string(),
            })
        }
        None => return Err(ReaderError::MissingAttribute("config".to_string())),
    };

    Ok((
        IntegratedNetwork::new(config, water, energy),
        water_reader.rules,
    ))
}

/// Coerces a numeric `timestep` to an integer, defaulting it to 1.
fn coerce_timestep(mut data: Map<String, Value>) -> Map<String, Value> {
    let timestep = match data.remove("timestep") {
        None => json!(1),
        Some(Value::Number(n)) => n.as_f64().map_or(Value::Number(n), |f| json!(f as i64)),
        Some(Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(f) => json!(f as i64),
            Err(_) => Value::String(s),
        },
        Some(other) => other,
    };
    data.insert("timestep".to_string(), timestep);
    data
}

fn scenarios_from(value: Option<&Value>, attr: &str) -> Result<Vec<Scenario>, ReaderError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let Value::Array(items) = value else {
        return Err(ReaderError::InvalidValue {
            attr: attr.to_string(),
            reason: "scenarios is not a list".to_string(),
        });
    };
    items
        .iter()
        .map(|item| match item {
            Value::Object(data) => Ok(Scenario::new(data.clone())),
            _ => Err(ReaderError::InvalidValue {
                attr: attr.to_string(),
                reason: "scenario is not an object".to_string(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryClient;
    use crate::test_support::{sample_network, sample_template, TEMPLATE_ID};
    use crate::writer::PywrHydraWriter;
    use pretty_assertions::assert_eq;

    async fn stored(client: &MemoryClient, domain: Option<&str>) -> i64 {
        client.add_template(sample_template());
        let mut writer = PywrHydraWriter::new(client, sample_network(), TEMPLATE_ID);
        writer.build_hydra_network(None, domain).await.unwrap();
        let network = writer.add_network_to_hydra().await.unwrap();
        network.scenarios[0].id.unwrap()
    }

    #[test]
    fn test_coerce_timestep() {
        let data = coerce_timestep(Map::new());
        assert_eq!(data["timestep"], json!(1));

        let mut raw = Map::new();
        raw.insert("timestep".to_string(), json!("7.0"));
        assert_eq!(coerce_timestep(raw)["timestep"], json!(7));

        let mut raw = Map::new();
        raw.insert("timestep".to_string(), json!("1D"));
        assert_eq!(coerce_timestep(raw)["timestep"], json!("1D"));
    }

    #[tokio::test]
    async fn test_reads_nodes_edges_and_sections() {
        let client = MemoryClient::new();
        let scenario_id = stored(&client, None).await;

        let reader = HydraToPywrNetwork::from_scenario_id(&client, scenario_id, 0)
            .await
            .unwrap();
        let network = reader.build_pywr_network(None).unwrap();

        assert_eq!(network.title(), "Demo");
        assert_eq!(network.description(), "demo network");
        assert_eq!(network.metadata.data["minimum_version"], json!("1.0"));
        assert_eq!(network.timestepper.data["timestep"], json!(1));
        assert_eq!(network.timestepper.data["start"], json!("2020-01-01"));

        let reservoir = network.node("reservoir").unwrap();
        assert_eq!(reservoir.node_type, "Storage");
        assert_eq!(reservoir.data["max_volume"], json!(100));
        assert_eq!(reservoir.comment(), Some("main store"));
        assert_eq!(reservoir.data["position"], json!({"geographic": [10.0, 20.0]}));

        let catchment = network.node("catchment").unwrap();
        assert_eq!(catchment.data["flow"], json!({"type": "constant", "value": 5}));

        assert_eq!(network.edges.len(), 2);
        assert_eq!(network.edges[0].name(), "catchment to reservoir");
        assert!(network.parameter("shared").is_some());
        assert!(network.recorder("demand_flow").is_some());
        assert_eq!(network.table("demands").unwrap().data["index_col"], json!(0));
        assert_eq!(network.scenarios[0].name(), Some("climate"));
    }

    #[tokio::test]
    async fn test_reads_domain_descriptor() {
        let client = MemoryClient::new();
        let scenario_id = stored(&client, Some("water")).await;

        let reader = HydraToPywrNetwork::from_scenario_id(&client, scenario_id, 0)
            .await
            .unwrap();
        let network = reader.build_pywr_network(Some("water")).unwrap();
        assert_eq!(network.title(), "Demo");
        assert_eq!(network.tables.len(), 1);
        assert_eq!(network.parameters.len(), 1);

        let err = reader.build_pywr_network(Some("energy")).unwrap_err();
        assert!(matches!(err, ReaderError::MissingAttribute(name) if name == "energy_data"));
    }

    #[tokio::test]
    async fn test_missing_template_index() {
        let client = MemoryClient::new();
        let scenario_id = stored(&client, None).await;
        let err = HydraToPywrNetwork::from_scenario_id(&client, scenario_id, 3)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ReaderError::MissingTemplate(3)));
    }
}
