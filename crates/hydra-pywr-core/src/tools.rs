//! Exporting and merging multi-network Hydra models.
//!
//! A multi-network model is one Hydra network holding several Pywr
//! networks, each stored under its own `<title>_data` descriptor, plus a
//! `network_profile` attribute naming the scenario each one came from.

use std::collections::HashSet;
use std::path::PathBuf;

use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{info, instrument};

use crate::client::{ClientError, HydraClient};
use crate::config::INTEGRATED_PROJECTION;
use crate::hydra::datatype::DESCRIPTOR;
use crate::hydra::{
    baseline_scenario, Dataset, HydraNetwork, NewAttribute, ResourceAttribute, ResourceScenario,
    TypeRef,
};
use crate::network::PywrNetwork;
use crate::reader::{HydraToPywrNetwork, ReaderError};
use crate::storage::{file_name_for, Storage, StorageError};
use crate::writer::{IdAllocator, PywrHydraWriter, WriterError};

#[derive(Debug, Error)]
pub enum ToolsError {
    #[error("Attribute `{0}` does not exist")]
    MissingAttribute(String),

    #[error("Network {network_id} has no `{key}` attribute")]
    MissingResourceAttribute { key: String, network_id: i64 },

    #[error("Invalid network profile: {0}")]
    InvalidProfile(String),

    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("Writer error: {0}")]
    Writer(#[from] WriterError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One network to merge, with the template it is typed by and the
/// scenario it was read from.
#[derive(Debug, Clone)]
pub struct MultiEntry {
    pub template_id: i64,
    pub scenario_id: i64,
    pub network: PywrNetwork,
}

impl MultiEntry {
    /// Domain name the network is stored under.
    pub fn domain(&self) -> String {
        self.network.title().replace(' ', "_")
    }
}

/// The pynsim config for a coupled water-energy model.
pub fn default_pynsim_config() -> Value {
    json!({
        "name": "Water-energy system",
        "timesteps": {
            "start": "1970-01-01",
            "end": "1970-12-31",
            "freq": "W"
        },
        "engines": [
            {
                "name": "water",
                "engine": "PywrEngine",
                "args": ["Water_system.json"],
                "kwargs": {"output_directory": "output"},
                "end_points": [
                    {"type": "pywr_array_recorder", "name": "HP_out", "recorder": "__node__:attr"}
                ]
            },
            {
                "name": "energy",
                "engine": "PywrEngine",
                "args": ["Energy_system.json"],
                "kwargs": {"solver": "glpk-dcopf", "output_directory": "output"},
                "end_points": [
                    {"type": "pywr_parameter", "name": "HP_in", "parameter": "__node__:attr"}
                ]
            }
        ],
        "connections": [{"start": "HP_out", "end": "HP_in"}]
    })
}

/// Decoded value of a network attribute in a scenario.
pub async fn get_network_attr<C: HydraClient + ?Sized>(
    client: &C,
    scenario_id: i64,
    network_id: i64,
    key: &str,
) -> Result<Value, ToolsError> {
    let attr = client
        .get_attribute_by_name_and_dimension(key, None)
        .await?
        .ok_or_else(|| ToolsError::MissingAttribute(key.to_string()))?;

    let ra = client
        .get_resource_attributes("NETWORK", network_id)
        .await?
        .into_iter()
        .find(|ra| ra.attr_id == attr.id)
        .ok_or_else(|| ToolsError::MissingResourceAttribute {
            key: key.to_string(),
            network_id,
        })?;

    let rs = client.get_resource_scenario(ra.id, scenario_id).await?;
    Ok(serde_json::from_str(&rs.dataset.value)?)
}

/// Exports every network named in a multi-network profile.
///
/// Each profiled scenario is written to `<network>.json`, then the
/// multi-network config to `config_file`. Returns the written paths.
#[instrument(skip(client, storage))]
pub async fn export_multi<C: HydraClient + ?Sized>(
    client: &C,
    scenario_id: i64,
    network_id: i64,
    storage: &dyn Storage,
    config_file: &str,
) -> Result<Vec<PathBuf>, ToolsError> {
    let config = get_network_attr(client, scenario_id, network_id, "config").await?;
    let profile = get_network_attr(client, scenario_id, network_id, "network_profile").await?;

    let Value::Object(profile) = profile else {
        return Err(ToolsError::InvalidProfile("not an object".to_string()));
    };

    let mut written = Vec::new();
    for (template_id, networks) in &profile {
        let networks = networks.as_array().ok_or_else(|| {
            ToolsError::InvalidProfile(format!("template {template_id} is not a list"))
        })?;
        for entry in networks {
            let scenario_id = entry
                .get("scenario_id")
                .and_then(Value::as_i64)
                .ok_or_else(|| ToolsError::InvalidProfile("entry without `scenario_id`".to_string()))?;
            let name = entry
                .get("network")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolsError::InvalidProfile("entry without `network`".to_string()))?;

            let reader = HydraToPywrNetwork::from_scenario_id(client, scenario_id, 0).await?;
            let network = reader.build_pywr_network(None)?;
            written.push(storage.write_json(&format!("{}.json", file_name_for(name)), &network.as_dict())?);
        }
    }

    written.push(storage.write_json(config_file, &config)?);
    info!(files = written.len(), "exported multi-network model");
    Ok(written)
}

/// Merges several networks into one Hydra network and posts it.
#[instrument(skip(client, entries), fields(entries = entries.len()))]
pub async fn merge_multi<C: HydraClient + ?Sized>(
    client: &C,
    entries: &[MultiEntry],
    project_id: Option<i64>,
    name: &str,
    description: &str,
) -> Result<HydraNetwork, ToolsError> {
    let mut ids = IdAllocator::new();
    let mut nodes = Vec::new();
    let mut links = Vec::new();
    let mut attributes = Vec::new();
    let mut resource_scenarios = Vec::new();
    let mut types: Vec<TypeRef> = Vec::new();
    let mut seen_types = HashSet::new();

    for entry in entries {
        let domain = entry.domain();
        let mut writer = PywrHydraWriter::new(client, entry.network.clone(), entry.template_id)
            .with_project(project_id);
        writer.ids_mut().continue_from(&ids);
        let built = writer
            .build_hydra_network(Some(INTEGRATED_PROJECTION), Some(&domain))
            .await?;
        ids = *writer.ids();

        nodes.extend(built.nodes);
        links.extend(built.links);
        attributes.extend(built.attributes);
        resource_scenarios.extend(built.scenarios.into_iter().flat_map(|s| s.resourcescenarios));
        for t in built.types {
            if seen_types.insert((t.id, t.template())) {
                types.push(t);
            }
        }
    }

    let mut profile = Map::new();
    for entry in entries {
        let list = profile
            .entry(entry.template_id.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = list {
            list.push(json!({"scenario_id": entry.scenario_id, "network": entry.domain()}));
        }
    }

    for (attr_name, attr_description, value) in [
        ("config", "Pynsim config", default_pynsim_config()),
        ("network_profile", "Network profile", Value::Object(profile)),
    ] {
        let registered = client
            .add_attributes(&[NewAttribute::new(attr_name).with_description(attr_description)])
            .await?;
        let attr_id = registered
            .first()
            .map(|a| a.id)
            .ok_or_else(|| WriterError::UnregisteredAttribute(attr_name.to_string()))?;

        let ra = ResourceAttribute::new(ids.next_attr(), attr_id);
        resource_scenarios.push(ResourceScenario::new(
            ra.id,
            Dataset::new(attr_name, DESCRIPTOR, serde_json::to_string(&value)?),
        ));
        attributes.push(ra);
    }

    let network = HydraNetwork {
        id: None,
        name: name.to_string(),
        description: description.to_string(),
        project_id,
        nodes,
        links,
        layout: None,
        scenarios: vec![baseline_scenario(resource_scenarios)],
        projection: Some(INTEGRATED_PROJECTION.to_string()),
        attributes,
        types,
    };

    let stored = client.add_network(&network).await?;
    info!(network_id = ?stored.id, nodes = stored.nodes.len(), "merged networks");
    Ok(stored)
}
