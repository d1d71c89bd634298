use serde_json::{json, Map, Value};
use tracing::info;

use super::{PywrHydraWriter, PywrJsonWriter, WriterError};
use crate::client::HydraClient;
use crate::config::INTEGRATED_PROJECTION;
use crate::hydra::datatype::DESCRIPTOR;
use crate::hydra::{baseline_scenario, Dataset, HydraNetwork, NewAttribute, ResourceAttribute, ResourceScenario};
use crate::network::{engine_file, IntegratedNetwork};
use crate::storage::Storage;

/// Writes an [`IntegratedNetwork`] as pynsim config plus Pywr documents.
pub struct IntegratedJsonWriter<'a> {
    network: &'a IntegratedNetwork,
}

impl<'a> IntegratedJsonWriter<'a> {
    pub fn new(network: &'a IntegratedNetwork) -> Self {
        Self { network }
    }

    pub fn as_dict(&self) -> Value {
        json!({
            "config": Value::Object(self.network.config.clone()),
            "water": PywrJsonWriter::new(&self.network.water).as_dict(),
            "energy": PywrJsonWriter::new(&self.network.energy).as_dict(),
        })
    }

    /// Writes each domain to the file its engine names, then the config.
    ///
    /// Returns a manifest of what was written.
    pub fn write_as_pynsim(&self, storage: &dyn Storage, pynsim_file: &str) -> Result<Value, WriterError> {
        let mut manifest = Map::new();
        manifest.insert("engines".to_string(), json!(self.network.domains()));

        for domain in self.network.domains() {
            let Some(network) = self.network.domain(domain) else {
                continue;
            };
            let file = engine_file(&self.network.config, domain)?;
            storage.write_json(file, &PywrJsonWriter::new(network).as_dict())?;
            manifest.insert(domain.to_string(), json!({"file": file}));
        }

        storage.write_json(pynsim_file, &Value::Object(self.network.config.clone()))?;
        manifest.insert("config".to_string(), json!(pynsim_file));

        info!(pynsim_file, "wrote integrated model");
        Ok(Value::Object(manifest))
    }
}

/// Builds one Hydra network holding both domains of an integrated model.
pub struct HydraIntegratedWriter<'c, C: HydraClient + ?Sized> {
    client: &'c C,
    network: IntegratedNetwork,
    water_template_id: i64,
    energy_template_id: i64,
    project_id: Option<i64>,
    built: Option<HydraNetwork>,
}

impl<'c, C: HydraClient + ?Sized> HydraIntegratedWriter<'c, C> {
    pub fn new(
        client: &'c C,
        network: IntegratedNetwork,
        water_template_id: i64,
        energy_template_id: i64,
    ) -> Self {
        Self {
            client,
            network,
            water_template_id,
            energy_template_id,
            project_id: None,
            built: None,
        }
    }

    pub fn with_project(mut self, project_id: Option<i64>) -> Self {
        self.project_id = project_id;
        self
    }

    pub async fn build_hydra_integrated_network(
        &mut self,
        projection: Option<&str>,
    ) -> Result<HydraNetwork, WriterError> {
        let config = &self.network.config;
        let name = config
            .get("name")
            .and_then(Value::as_str)
            .ok_or(WriterError::MissingConfigField("name"))?
            .to_string();
        let description = config
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut water = PywrHydraWriter::new(self.client, self.network.water.clone(), self.water_template_id)
            .with_project(self.project_id);
        let water_net = water
            .build_hydra_network(Some(INTEGRATED_PROJECTION), Some("water"))
            .await?;

        let mut energy = PywrHydraWriter::new(self.client, self.network.energy.clone(), self.energy_template_id)
            .with_project(self.project_id);
        energy.ids_mut().continue_from(water.ids());
        let energy_net = energy
            .build_hydra_network(Some(INTEGRATED_PROJECTION), Some("energy"))
            .await?;

        let mut nodes = water_net.nodes;
        nodes.extend(energy_net.nodes);
        let mut links = water_net.links;
        links.extend(energy_net.links);
        let mut attributes = water_net.attributes;
        attributes.extend(energy_net.attributes);
        let mut resource_scenarios: Vec<ResourceScenario> = water_net
            .scenarios
            .into_iter()
            .chain(energy_net.scenarios)
            .flat_map(|s| s.resourcescenarios)
            .collect();
        let mut types = water_net.types;
        types.extend(energy_net.types);

        let registered = self
            .client
            .add_attributes(&[NewAttribute::new("config")])
            .await?;
        let attr_id = registered
            .first()
            .map(|a| a.id)
            .ok_or_else(|| WriterError::UnregisteredAttribute("config".to_string()))?;

        let value = json!({"config": Value::Object(self.network.config.clone())});
        let ra = ResourceAttribute::new(energy.ids_mut().next_attr(), attr_id);
        resource_scenarios.push(ResourceScenario::new(
            ra.id,
            Dataset::new("config", DESCRIPTOR, serde_json::to_string(&value)?),
        ));
        attributes.push(ra);

        let network = HydraNetwork {
            id: None,
            name,
            description,
            project_id: self.project_id,
            nodes,
            links,
            layout: None,
            scenarios: vec![baseline_scenario(resource_scenarios)],
            projection: projection.map(str::to_string),
            attributes,
            types,
        };

        info!(
            name = %network.name,
            nodes = network.nodes.len(),
            "built integrated hydra network"
        );
        self.built = Some(network.clone());
        Ok(network)
    }

    pub async fn add_network_to_hydra(&self) -> Result<HydraNetwork, WriterError> {
        let network = self.built.as_ref().ok_or(WriterError::NotBuilt)?;
        Ok(self.client.add_network(network).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryClient;
    use crate::storage::FileStorage;
    use crate::test_support::{energy_network, energy_template, sample_network, sample_template, ENERGY_TEMPLATE_ID, TEMPLATE_ID};
    use tempfile::TempDir;

    fn integrated() -> IntegratedNetwork {
        let config = json!({
            "name": "Water-energy system",
            "engines": [
                {"name": "water", "engine": "PywrEngine", "args": ["water.json"]},
                {"name": "energy", "engine": "PywrEngine", "args": ["energy.json"]}
            ]
        });
        IntegratedNetwork::new(
            config.as_object().cloned().unwrap(),
            sample_network(),
            energy_network(),
        )
    }

    #[test]
    fn test_as_dict_sections() {
        let network = integrated();
        let doc = IntegratedJsonWriter::new(&network).as_dict();
        assert_eq!(doc["config"]["name"], json!("Water-energy system"));
        assert_eq!(doc["water"]["metadata"]["title"], json!("Demo"));
        assert_eq!(doc["energy"]["metadata"]["title"], json!("Grid"));
    }

    #[test]
    fn test_write_as_pynsim() {
        let temp = TempDir::new().unwrap();
        let storage = FileStorage::new(temp.path());
        let network = integrated();

        let manifest = IntegratedJsonWriter::new(&network)
            .write_as_pynsim(&storage, "pynsim_model.json")
            .unwrap();

        assert_eq!(manifest["engines"], json!(["water", "energy"]));
        assert_eq!(manifest["water"]["file"], json!("water.json"));
        assert_eq!(manifest["config"], json!("pynsim_model.json"));
        assert_eq!(
            storage.read_json("energy.json").unwrap()["metadata"]["title"],
            json!("Grid")
        );
        assert!(temp.path().join("pynsim_model.json").exists());
    }

    #[tokio::test]
    async fn test_integrated_network_shares_id_space() {
        let client = MemoryClient::new();
        client.add_template(sample_template());
        client.add_template(energy_template());

        let mut writer = HydraIntegratedWriter::new(&client, integrated(), TEMPLATE_ID, ENERGY_TEMPLATE_ID);
        let network = writer.build_hydra_integrated_network(None).await.unwrap();

        let ids: Vec<_> = network.nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![-1, -2, -3, -4, -5]);
        assert_eq!(network.types.len(), 2);
        assert_eq!(network.name, "Water-energy system");
        assert_eq!(network.description, "");

        let names: Vec<_> = network.scenarios[0]
            .resourcescenarios
            .iter()
            .map(|rs| rs.dataset.name.as_str())
            .collect();
        assert!(names.contains(&"water_data"));
        assert!(names.contains(&"energy_data"));
        assert_eq!(names.last(), Some(&"config"));

        let stored = writer.add_network_to_hydra().await.unwrap();
        assert!(stored.id.unwrap() > 0);
    }
}
