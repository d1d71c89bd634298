use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::{ClientError, HydraClient};
use crate::hydra::{
    Attribute, Dimension, HydraNetwork, HydraScenario, NewAttribute, ResourceAttribute,
    ResourceScenario, Rule, Template, Unit,
};

/// An in-process Hydra database.
///
/// Used for offline conversion and tests. Networks posted through
/// [`HydraClient::add_network`] get positive ids in place of the writer's
/// local negative ids, as a real server would assign.
#[derive(Default)]
pub struct MemoryClient {
    state: RwLock<MemoryState>,
}

#[derive(Clone, Default)]
struct MemoryState {
    next_id: i64,
    templates: HashMap<i64, Template>,
    attributes: Vec<Attribute>,
    networks: BTreeMap<i64, HydraNetwork>,
    scenarios: BTreeMap<i64, HydraScenario>,
    resource_attrs: BTreeMap<i64, StoredResourceAttr>,
    rules: HashMap<i64, Vec<Rule>>,
    dimensions: Vec<Dimension>,
    units: Vec<Unit>,
}

#[derive(Debug, Clone)]
struct StoredResourceAttr {
    ref_key: String,
    ref_id: i64,
    attr: ResourceAttribute,
}

impl MemoryState {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn attribute(&mut self, name: &str, dimension_id: Option<i64>) -> Attribute {
        if let Some(existing) = self
            .attributes
            .iter()
            .find(|a| a.name == name && a.dimension_id == dimension_id)
        {
            return existing.clone();
        }
        let attr = Attribute {
            id: self.allocate(),
            name: name.to_string(),
            dimension_id,
            description: None,
        };
        self.attributes.push(attr.clone());
        attr
    }

    fn has_attribute(&self, attr_id: i64) -> bool {
        self.attributes.iter().any(|a| a.id == attr_id)
    }

    fn bind(
        &mut self,
        ref_key: &str,
        ref_id: i64,
        mut attr: ResourceAttribute,
        remap: &mut HashMap<i64, i64>,
    ) -> Result<ResourceAttribute, ClientError> {
        if !self.has_attribute(attr.attr_id) {
            return Err(ClientError::not_found("Attribute", attr.attr_id));
        }
        let id = self.allocate();
        remap.insert(attr.id, id);
        attr.id = id;
        attr.ref_key = Some(ref_key.to_string());
        self.resource_attrs.insert(
            id,
            StoredResourceAttr {
                ref_key: ref_key.to_string(),
                ref_id,
                attr: attr.clone(),
            },
        );
        Ok(attr)
    }

    fn insert_network(&mut self, network: &HydraNetwork) -> Result<HydraNetwork, ClientError> {
        let mut stored = network.clone();
        let network_id = self.allocate();
        stored.id = Some(network_id);

        let mut node_ids = HashMap::new();
        let mut ra_ids = HashMap::new();

        for node in &mut stored.nodes {
            let id = self.allocate();
            node_ids.insert(node.id, id);
            node.id = id;
            for ra in &mut node.attributes {
                *ra = self.bind("NODE", id, ra.clone(), &mut ra_ids)?;
            }
            for t in &mut node.types {
                t.template_id = t.template();
                t.name = self.type_name(t.template_id, t.id);
            }
        }

        for link in &mut stored.links {
            let id = self.allocate();
            link.id = id;
            for (end, name) in [(&mut link.node_1_id, "node_1_id"), (&mut link.node_2_id, "node_2_id")] {
                *end = *node_ids.get(&*end).ok_or_else(|| {
                    ClientError::Invalid(format!("link `{}` {name} is not a node", link.name))
                })?;
            }
            for ra in &mut link.attributes {
                *ra = self.bind("LINK", id, ra.clone(), &mut ra_ids)?;
            }
            for t in &mut link.types {
                t.template_id = t.template();
                t.name = self.type_name(t.template_id, t.id);
            }
        }

        let mut network_attrs = std::mem::take(&mut stored.attributes);
        for ra in &mut network_attrs {
            *ra = self.bind("NETWORK", network_id, ra.clone(), &mut ra_ids)?;
        }
        stored.attributes = network_attrs;

        for t in &mut stored.types {
            t.template_id = t.template();
        }

        for scenario in &mut stored.scenarios {
            let scenario_id = self.allocate();
            scenario.id = Some(scenario_id);
            scenario.network_id = Some(network_id);
            for rs in &mut scenario.resourcescenarios {
                rs.resource_attr_id = *ra_ids.get(&rs.resource_attr_id).ok_or_else(|| {
                    ClientError::Invalid(format!(
                        "resource scenario `{}` refers to unknown resource attribute {}",
                        rs.dataset.name, rs.resource_attr_id
                    ))
                })?;
                rs.dataset.id = Some(self.allocate());
            }
            self.scenarios.insert(scenario_id, scenario.clone());
        }

        debug!(
            network_id,
            nodes = stored.nodes.len(),
            links = stored.links.len(),
            resource_attributes = ra_ids.len(),
            "stored network"
        );
        self.networks.insert(network_id, stored.clone());
        Ok(stored)
    }

    fn type_name(&self, template_id: Option<i64>, type_id: i64) -> Option<String> {
        let template = self.templates.get(&template_id?)?;
        template.type_by_id(type_id).map(|t| t.name.clone())
    }
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a template and registers every attribute it references.
    pub fn add_template(&self, template: Template) {
        let mut state = self.state.write();
        for attr in template
            .templatetypes
            .iter()
            .flat_map(|t| t.typeattrs.iter())
            .filter_map(|ta| ta.attr.as_ref())
        {
            if !state.has_attribute(attr.id) {
                state.attributes.push(attr.clone());
            }
            state.next_id = state.next_id.max(attr.id);
        }
        state.next_id = state.next_id.max(template.id);
        for t in &template.templatetypes {
            state.next_id = state.next_id.max(t.id);
        }
        state.templates.insert(template.id, template);
    }

    pub fn add_dimension(&self, name: &str) -> Dimension {
        let mut state = self.state.write();
        let dimension = Dimension {
            id: state.allocate(),
            name: name.to_string(),
        };
        state.dimensions.push(dimension.clone());
        dimension
    }

    pub fn add_unit(&self, name: &str, abbreviation: &str, dimension_id: Option<i64>) -> Unit {
        let mut state = self.state.write();
        let unit = Unit {
            id: state.allocate(),
            name: name.to_string(),
            abbreviation: abbreviation.to_string(),
            dimension_id,
        };
        state.units.push(unit.clone());
        unit
    }

    /// Registers an attribute with a dimension, returning the existing one
    /// when already present.
    pub fn add_attribute(&self, name: &str, dimension_id: Option<i64>) -> Attribute {
        self.state.write().attribute(name, dimension_id)
    }

    /// Attaches a custom rule to a network.
    pub fn add_rule(&self, network_id: i64, name: &str, value: &str) -> Rule {
        let mut state = self.state.write();
        let rule = Rule {
            id: Some(state.allocate()),
            name: name.to_string(),
            value: value.to_string(),
        };
        state.rules.entry(network_id).or_default().push(rule.clone());
        rule
    }

    /// Ids of all stored networks, in creation order.
    pub fn network_ids(&self) -> Vec<i64> {
        self.state.read().networks.keys().copied().collect()
    }

    /// Ids of the scenarios belonging to a network.
    pub fn scenario_ids(&self, network_id: i64) -> Vec<i64> {
        self.state
            .read()
            .scenarios
            .iter()
            .filter(|(_, s)| s.network_id == Some(network_id))
            .map(|(id, _)| *id)
            .collect()
    }
}

#[async_trait]
impl HydraClient for MemoryClient {
    async fn get_template(&self, template_id: i64) -> Result<Template, ClientError> {
        self.state
            .read()
            .templates
            .get(&template_id)
            .cloned()
            .ok_or_else(|| ClientError::not_found("Template", template_id))
    }

    async fn add_attributes(&self, attrs: &[NewAttribute]) -> Result<Vec<Attribute>, ClientError> {
        let mut state = self.state.write();
        Ok(attrs
            .iter()
            .map(|a| state.attribute(&a.name, a.dimension_id))
            .collect())
    }

    async fn add_network(&self, network: &HydraNetwork) -> Result<HydraNetwork, ClientError> {
        let mut state = self.state.write();
        // Staged on a copy and committed only once the whole network is accepted.
        let mut staged = state.clone();
        let stored = staged.insert_network(network)?;
        *state = staged;
        Ok(stored)
    }

    async fn get_network(
        &self,
        network_id: i64,
        include_data: bool,
        template_id: Option<i64>,
    ) -> Result<HydraNetwork, ClientError> {
        let state = self.state.read();
        let mut network = state
            .networks
            .get(&network_id)
            .cloned()
            .ok_or_else(|| ClientError::not_found("Network", network_id))?;

        network.scenarios = state
            .scenarios
            .values()
            .filter(|s| s.network_id == Some(network_id))
            .cloned()
            .collect();

        if !include_data {
            for scenario in &mut network.scenarios {
                scenario.resourcescenarios.clear();
            }
        }

        if let Some(template_id) = template_id {
            for node in &mut network.nodes {
                node.types.retain(|t| t.template() == Some(template_id));
            }
            for link in &mut network.links {
                link.types.retain(|t| t.template() == Some(template_id));
            }
        }

        Ok(network)
    }

    async fn get_scenario(
        &self,
        scenario_id: i64,
        include_data: bool,
    ) -> Result<HydraScenario, ClientError> {
        let mut scenario = self
            .state
            .read()
            .scenarios
            .get(&scenario_id)
            .cloned()
            .ok_or_else(|| ClientError::not_found("Scenario", scenario_id))?;

        if !include_data {
            scenario.resourcescenarios.clear();
        }
        Ok(scenario)
    }

    async fn update_scenario(&self, scenario: &HydraScenario) -> Result<HydraScenario, ClientError> {
        let scenario_id = scenario
            .id
            .ok_or_else(|| ClientError::Invalid("scenario has no id".to_string()))?;

        let mut state = self.state.write();
        for rs in &scenario.resourcescenarios {
            if !state.resource_attrs.contains_key(&rs.resource_attr_id) {
                return Err(ClientError::not_found("ResourceAttribute", rs.resource_attr_id));
            }
        }

        let mut dataset_ids = Vec::with_capacity(scenario.resourcescenarios.len());
        for _ in &scenario.resourcescenarios {
            dataset_ids.push(state.allocate());
        }

        let stored = state
            .scenarios
            .get_mut(&scenario_id)
            .ok_or_else(|| ClientError::not_found("Scenario", scenario_id))?;

        stored.name = scenario.name.clone();
        stored.description = scenario.description.clone();
        for (rs, dataset_id) in scenario.resourcescenarios.iter().zip(dataset_ids) {
            let mut rs = rs.clone();
            rs.dataset.id = Some(dataset_id);
            match stored
                .resourcescenarios
                .iter_mut()
                .find(|existing| existing.resource_attr_id == rs.resource_attr_id)
            {
                Some(existing) => *existing = rs,
                None => stored.resourcescenarios.push(rs),
            }
        }

        Ok(stored.clone())
    }

    async fn get_attributes(&self) -> Result<Vec<Attribute>, ClientError> {
        Ok(self.state.read().attributes.clone())
    }

    async fn get_attribute_by_name_and_dimension(
        &self,
        name: &str,
        dimension_id: Option<i64>,
    ) -> Result<Option<Attribute>, ClientError> {
        Ok(self
            .state
            .read()
            .attributes
            .iter()
            .find(|a| a.name == name && a.dimension_id == dimension_id)
            .cloned())
    }

    async fn get_resource_attributes(
        &self,
        ref_key: &str,
        ref_id: i64,
    ) -> Result<Vec<ResourceAttribute>, ClientError> {
        Ok(self
            .state
            .read()
            .resource_attrs
            .values()
            .filter(|s| s.ref_key.eq_ignore_ascii_case(ref_key) && s.ref_id == ref_id)
            .map(|s| s.attr.clone())
            .collect())
    }

    async fn get_resource_scenario(
        &self,
        resource_attr_id: i64,
        scenario_id: i64,
    ) -> Result<ResourceScenario, ClientError> {
        let state = self.state.read();
        let scenario = state
            .scenarios
            .get(&scenario_id)
            .ok_or_else(|| ClientError::not_found("Scenario", scenario_id))?;

        scenario
            .resourcescenarios
            .iter()
            .find(|rs| rs.resource_attr_id == resource_attr_id)
            .cloned()
            .ok_or_else(|| {
                ClientError::not_found(
                    "ResourceScenario",
                    format!("{resource_attr_id} in scenario {scenario_id}"),
                )
            })
    }

    async fn add_resource_attribute(
        &self,
        ref_key: &str,
        ref_id: i64,
        attr_id: i64,
        is_var: bool,
    ) -> Result<ResourceAttribute, ClientError> {
        let ref_key = ref_key.to_uppercase();
        let mut state = self.state.write();

        if let Some(existing) = state
            .resource_attrs
            .values()
            .find(|s| s.ref_key == ref_key && s.ref_id == ref_id && s.attr.attr_id == attr_id)
        {
            return Ok(existing.attr.clone());
        }

        let network_id = match ref_key.as_str() {
            "NETWORK" => state.networks.contains_key(&ref_id).then_some(ref_id),
            "NODE" => state
                .networks
                .iter()
                .find(|(_, n)| n.nodes.iter().any(|node| node.id == ref_id))
                .map(|(id, _)| *id),
            "LINK" => state
                .networks
                .iter()
                .find(|(_, n)| n.links.iter().any(|link| link.id == ref_id))
                .map(|(id, _)| *id),
            _ => None,
        }
        .ok_or_else(|| ClientError::not_found("Resource", format!("{ref_key} {ref_id}")))?;

        let mut attr = ResourceAttribute::new(0, attr_id);
        attr.attr_is_var = if is_var { "Y" } else { "N" }.to_string();
        let attr = state.bind(&ref_key, ref_id, attr, &mut HashMap::new())?;

        if let Some(network) = state.networks.get_mut(&network_id) {
            match ref_key.as_str() {
                "NODE" => {
                    if let Some(node) = network.nodes.iter_mut().find(|n| n.id == ref_id) {
                        node.attributes.push(attr.clone());
                    }
                }
                "LINK" => {
                    if let Some(link) = network.links.iter_mut().find(|l| l.id == ref_id) {
                        link.attributes.push(attr.clone());
                    }
                }
                _ => network.attributes.push(attr.clone()),
            }
        }

        Ok(attr)
    }

    async fn get_resource_rules(&self, ref_key: &str, ref_id: i64) -> Result<Vec<Rule>, ClientError> {
        if !ref_key.eq_ignore_ascii_case("NETWORK") {
            return Ok(Vec::new());
        }
        Ok(self.state.read().rules.get(&ref_id).cloned().unwrap_or_default())
    }

    async fn get_dimension_by_name(&self, name: &str) -> Result<Dimension, ClientError> {
        self.state
            .read()
            .dimensions
            .iter()
            .find(|d| d.name == name)
            .cloned()
            .ok_or_else(|| ClientError::not_found("Dimension", name))
    }

    async fn get_unit_by_abbreviation(&self, abbreviation: &str) -> Result<Option<Unit>, ClientError> {
        Ok(self
            .state
            .read()
            .units
            .iter()
            .find(|u| u.abbreviation == abbreviation)
            .cloned())
    }
}
