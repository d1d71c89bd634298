use std::collections::{BTreeSet, HashMap};

use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};

use super::{IdAllocator, WriterError};
use crate::client::HydraClient;
use crate::config::EDGE_TYPE_NAME;
use crate::hydra::datatype::{self, DESCRIPTOR, PYWR_SCENARIOS};
use crate::hydra::{
    baseline_scenario, Dataset, HydraLink, HydraNetwork, HydraNode, NewAttribute,
    ResourceAttribute, ResourceScenario, Template, TypeRef,
};
use crate::network::{PywrNetwork, NODE_RESERVED_KEYS};

/// Metadata keys that live on the Hydra network itself.
const NETWORK_METADATA_KEYS: &[&str] = &["title", "description", "projection"];

/// Builds a Hydra network from a [`PywrNetwork`].
///
/// Ids in the built network are local and negative; the server assigns
/// real ids when the network is posted.
pub struct PywrHydraWriter<'c, C: HydraClient + ?Sized> {
    client: &'c C,
    network: PywrNetwork,
    template_id: i64,
    project_id: Option<i64>,
    default_projection: Option<String>,
    ids: IdAllocator,
    attr_ids: HashMap<String, i64>,
    built: Option<HydraNetwork>,
}

impl<'c, C: HydraClient + ?Sized> PywrHydraWriter<'c, C> {
    pub fn new(client: &'c C, network: PywrNetwork, template_id: i64) -> Self {
        Self {
            client,
            network,
            template_id,
            project_id: None,
            default_projection: None,
            ids: IdAllocator::new(),
            attr_ids: HashMap::new(),
            built: None,
        }
    }

    pub fn with_project(mut self, project_id: Option<i64>) -> Self {
        self.project_id = project_id;
        self
    }

    /// Projection used when neither the caller nor the metadata names one.
    pub fn with_default_projection(mut self, projection: Option<String>) -> Self {
        self.default_projection = projection;
        self
    }

    pub fn network(&self) -> &PywrNetwork {
        &self.network
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    pub fn ids_mut(&mut self) -> &mut IdAllocator {
        &mut self.ids
    }

    pub fn template_id(&self) -> i64 {
        self.template_id
    }

    /// The most recently built network.
    pub fn hydra_network(&self) -> Option<&HydraNetwork> {
        self.built.as_ref()
    }

    /// Builds the Hydra network.
    ///
    /// With a `domain` the network-level sections are stored as a single
    /// `<domain>_data` descriptor so several domains can share one Hydra
    /// network.
    #[instrument(skip(self), fields(title = self.network.title(), template_id = self.template_id))]
    pub async fn build_hydra_network(
        &mut self,
        projection: Option<&str>,
        domain: Option<&str>,
    ) -> Result<HydraNetwork, WriterError> {
        let projection = projection
            .map(str::to_string)
            .or_else(|| self.network.projection().map(str::to_string))
            .or_else(|| self.default_projection.clone());

        let template = self.client.get_template(self.template_id).await?;
        self.network.attach_parameters();

        self.register_attributes(&template).await?;

        let (nodes, node_scenarios) = self.build_nodes(&template, projection.is_some())?;

        let (mut attributes, network_scenarios) = match domain {
            Some(domain) => self.build_domain_descriptor(domain).await?,
            None => self.build_network_attributes()?,
        };

        let links = self.build_links(&template, &nodes)?;

        let (paramrec_attrs, paramrec_scenarios) = self.build_parameters_recorders()?;
        attributes.extend(paramrec_attrs);

        let network_type = template
            .network_type()
            .ok_or(WriterError::MissingNetworkType(self.template_id))?;

        let mut resource_scenarios = node_scenarios;
        resource_scenarios.extend(network_scenarios);
        resource_scenarios.extend(paramrec_scenarios);

        let network = HydraNetwork {
            id: None,
            name: self.network.title().to_string(),
            description: self.network.description().to_string(),
            project_id: self.project_id,
            nodes,
            links,
            layout: None,
            scenarios: vec![baseline_scenario(resource_scenarios)],
            projection,
            attributes,
            types: vec![TypeRef::new(network_type.id, Some(self.template_id))],
        };

        info!(
            nodes = network.nodes.len(),
            links = network.links.len(),
            attributes = network.attributes.len(),
            "built hydra network"
        );

        self.built = Some(network.clone());
        Ok(network)
    }

    /// Posts the built network to the server.
    pub async fn add_network_to_hydra(&self) -> Result<HydraNetwork, WriterError> {
        let network = self.built.as_ref().ok_or(WriterError::NotBuilt)?;
        Ok(self.client.add_network(network).await?)
    }

    async fn register_attributes(&mut self, template: &Template) -> Result<(), WriterError> {
        let template_attrs = template.attribute_ids();
        let network = &self.network;

        let mut pending = BTreeSet::new();
        pending.extend(network.timestepper.data.keys().map(|k| format!("timestepper.{k}")));
        pending.insert("scenarios".to_string());
        for node in &network.nodes {
            pending.extend(node.attribute_names().map(str::to_string));
        }
        pending.extend(network.parameters.iter().map(|p| p.name.clone()));
        pending.extend(network.recorders.iter().map(|r| r.name.clone()));
        pending.extend(network.metadata.data.keys().map(|k| format!("metadata.{k}")));
        for table in &network.tables {
            pending.extend(table.data.keys().map(|k| format!("tbl_{}.{k}", table.name)));
        }

        let attrs: Vec<NewAttribute> = pending
            .into_iter()
            .filter(|name| !NODE_RESERVED_KEYS.contains(&name.as_str()))
            .filter(|name| !template_attrs.contains_key(name))
            .map(NewAttribute::new)
            .collect();

        debug!(count = attrs.len(), "registering attributes");
        let registered = self.client.add_attributes(&attrs).await?;

        self.attr_ids = template_attrs;
        self.attr_ids
            .extend(registered.into_iter().map(|a| (a.name, a.id)));
        Ok(())
    }

    fn attr_id(&self, name: &str) -> Result<i64, WriterError> {
        self.attr_ids
            .get(name)
            .copied()
            .ok_or_else(|| WriterError::UnregisteredAttribute(name.to_string()))
    }

    fn resource_attr_and_scenario(
        &mut self,
        attr_name: &str,
        dataset: Dataset,
    ) -> Result<(ResourceAttribute, ResourceScenario), WriterError> {
        let attr_id = self.attr_id(attr_name)?;
        let ra = ResourceAttribute::new(self.ids.next_attr(), attr_id);
        let rs = ResourceScenario::new(ra.id, dataset);
        Ok((ra, rs))
    }

    fn build_nodes(
        &mut self,
        template: &Template,
        projected: bool,
    ) -> Result<(Vec<HydraNode>, Vec<ResourceScenario>), WriterError> {
        let mut nodes = Vec::with_capacity(self.network.nodes.len());
        let mut scenarios = Vec::new();

        for node in self.network.nodes.clone() {
            let type_id = template.type_id_by_name(&node.node_type).ok_or_else(|| {
                WriterError::UnknownNodeType {
                    node: node.name.clone(),
                    node_type: node.node_type.clone(),
                }
            })?;

            let id = self.ids.next_node();
            let mut attributes = Vec::new();
            for attr in node.attribute_names() {
                let value = &node.data[attr];
                let data_type = datatype::infer(value).map_err(|source| WriterError::UnsupportedValue {
                    element: node.name.clone(),
                    attr: attr.to_string(),
                    source,
                })?;
                let dataset = Dataset::new(attr, data_type, serde_json::to_string(value)?);
                let (ra, rs) = self.resource_attr_and_scenario(attr, dataset)?;
                attributes.push(ra);
                scenarios.push(rs);
            }

            let (x, y) = match node.coordinates(projected) {
                Some((x, y)) => (coordinate(&x), coordinate(&y)),
                None => (None, None),
            };

            nodes.push(HydraNode {
                id,
                name: node.name.clone(),
                description: node.comment().map(str::to_string),
                resource_type: "NODE".to_string(),
                x,
                y,
                layout: Some(json!({})),
                attributes,
                types: vec![TypeRef::new(type_id, Some(self.template_id))],
            });
        }

        Ok((nodes, scenarios))
    }

    fn build_network_attributes(
        &mut self,
    ) -> Result<(Vec<ResourceAttribute>, Vec<ResourceScenario>), WriterError> {
        let mut entries: Vec<(String, Value)> = Vec::new();

        for (key, value) in &self.network.timestepper.data {
            entries.push((format!("timestepper.{key}"), value.clone()));
        }
        for (key, value) in &self.network.metadata.data {
            if !NETWORK_METADATA_KEYS.contains(&key.as_str()) {
                entries.push((format!("metadata.{key}"), value.clone()));
            }
        }
        for table in &self.network.tables {
            for (key, value) in &table.data {
                entries.push((format!("tbl_{}.{key}", table.name), value.clone()));
            }
        }

        let mut attributes = Vec::new();
        let mut scenarios = Vec::new();
        for (name, value) in entries {
            let data_type = datatype::infer(&value).map_err(|source| WriterError::UnsupportedValue {
                element: "network".to_string(),
                attr: name.clone(),
                source,
            })?;
            let dataset = Dataset::new(&name, data_type, serde_json::to_string(&value)?);
            let (ra, rs) = self.resource_attr_and_scenario(&name, dataset)?;
            attributes.push(ra);
            scenarios.push(rs);
        }

        if !self.network.scenarios.is_empty() {
            let value = json!({
                "scenarios": self.network.scenarios.iter().map(|s| Value::Object(s.data.clone())).collect::<Vec<_>>()
            });
            let dataset = Dataset::new("scenarios", PYWR_SCENARIOS, serde_json::to_string(&value)?);
            let (ra, rs) = self.resource_attr_and_scenario("scenarios", dataset)?;
            attributes.push(ra);
            scenarios.push(rs);
        }

        Ok((attributes, scenarios))
    }

    async fn build_domain_descriptor(
        &mut self,
        domain: &str,
    ) -> Result<(Vec<ResourceAttribute>, Vec<ResourceScenario>), WriterError> {
        let attr_name = format!("{domain}_data");
        let registered = self
            .client
            .add_attributes(&[NewAttribute::new(attr_name.clone())])
            .await?;
        self.attr_ids
            .extend(registered.into_iter().map(|a| (a.name, a.id)));

        let network = &self.network;
        let mut data = Map::new();
        data.insert(
            "timestepper".to_string(),
            Value::Object(network.timestepper.data.clone()),
        );
        data.insert(
            "metadata".to_string(),
            Value::Object(network.metadata.data.clone()),
        );
        if !network.tables.is_empty() {
            data.insert(
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
            data.insert(
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

        let components: Vec<&str> = network
            .parameters
            .iter()
            .map(|p| p.name.as_str())
            .chain(network.recorders.iter().map(|r| r.name.as_str()))
            .collect();
        data.insert("components".to_string(), json!(components));

        let dataset = Dataset::new(&attr_name, DESCRIPTOR, serde_json::to_string(&Value::Object(data))?);
        let (ra, rs) = self.resource_attr_and_scenario(&attr_name, dataset)?;
        Ok((vec![ra], vec![rs]))
    }

    fn build_links(
        &mut self,
        template: &Template,
        nodes: &[HydraNode],
    ) -> Result<Vec<HydraLink>, WriterError> {
        let edge_type = template.type_id_by_name(EDGE_TYPE_NAME);
        if edge_type.is_none() && !self.network.edges.is_empty() {
            debug!(template_id = self.template_id, "template has no edge type");
        }

        let node_id = |name: &str| nodes.iter().find(|n| n.name == name).map(|n| n.id);

        let mut links = Vec::with_capacity(self.network.edges.len());
        for edge in &self.network.edges {
            let missing = |name: &str| WriterError::MissingNode {
                src: edge.src.clone(),
                dest: edge.dest.clone(),
                missing: name.to_string(),
            };
            let node_1_id = node_id(&edge.src).ok_or_else(|| missing(&edge.src))?;
            let node_2_id = node_id(&edge.dest).ok_or_else(|| missing(&edge.dest))?;

            let layout = match &edge.slots {
                Some((from, to)) => json!({"slots": [from, to]}),
                None => json!({}),
            };

            links.push(HydraLink {
                id: self.ids.next_link(),
                name: edge.name(),
                description: None,
                resource_type: "LINK".to_string(),
                node_1_id,
                node_2_id,
                layout: Some(layout),
                attributes: Vec::new(),
                types: edge_type
                    .map(|id| vec![TypeRef::new(id, Some(self.template_id))])
                    .unwrap_or_default(),
            });
        }

        Ok(links)
    }

    fn build_parameters_recorders(
        &mut self,
    ) -> Result<(Vec<ResourceAttribute>, Vec<ResourceScenario>), WriterError> {
        let mut components: Vec<(String, &'static str, Value)> = Vec::new();
        for parameter in &self.network.parameters {
            components.push((parameter.name.clone(), parameter.hydra_datatype(), parameter.value()));
        }
        for recorder in &self.network.recorders {
            components.push((recorder.name.clone(), recorder.hydra_datatype(), recorder.value()));
        }

        let mut attributes = Vec::with_capacity(components.len());
        let mut scenarios = Vec::with_capacity(components.len());
        for (name, data_type, value) in components {
            let dataset = Dataset::new(&name, data_type, serde_json::to_string(&value)?);
            let (ra, rs) = self.resource_attr_and_scenario(&name, dataset)?;
            attributes.push(ra);
            scenarios.push(rs);
        }

        Ok((attributes, scenarios))
    }
}

fn coordinate(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
