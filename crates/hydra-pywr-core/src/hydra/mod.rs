//! The Hydra graph-resource model.

pub mod datatype;
mod models;

pub use models::{
    Attribute, Dataset, Dimension, HydraLink, HydraNetwork, HydraNode, HydraScenario,
    NewAttribute, ResourceAttribute, ResourceScenario, Rule, Template, TemplateType, TypeAttr,
    TypeRef, Unit,
};

use serde_json::Map;

use crate::config::{BASELINE_SCENARIO_DESCRIPTION, BASELINE_SCENARIO_NAME};

/// The single scenario every imported network is created with.
pub fn baseline_scenario(resourcescenarios: Vec<ResourceScenario>) -> HydraScenario {
    HydraScenario {
        id: None,
        name: BASELINE_SCENARIO_NAME.to_string(),
        description: BASELINE_SCENARIO_DESCRIPTION.to_string(),
        network_id: None,
        resourcescenarios,
        extra: Map::new(),
    }
}
