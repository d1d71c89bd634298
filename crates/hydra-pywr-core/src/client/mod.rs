//! Access to a Hydra graph database.
//!
//! [`HydraClient`] is the seam between the translators and the server.
//! [`JsonConnection`] talks to a real server over its JSON endpoint and
//! [`MemoryClient`] keeps everything in process.

mod error;
mod json;
mod memory;

pub use error::ClientError;
pub use json::JsonConnection;
pub use memory::MemoryClient;

use async_trait::async_trait;

use crate::hydra::{
    Attribute, Dimension, HydraNetwork, HydraScenario, NewAttribute, ResourceAttribute,
    ResourceScenario, Rule, Template, Unit,
};

/// The Hydra functions used by the readers and writers.
#[async_trait]
pub trait HydraClient: Send + Sync {
    async fn get_template(&self, template_id: i64) -> Result<Template, ClientError>;

    /// Registers attributes, returning existing definitions for names that
    /// are already known.
    async fn add_attributes(&self, attrs: &[NewAttribute]) -> Result<Vec<Attribute>, ClientError>;

    async fn add_network(&self, network: &HydraNetwork) -> Result<HydraNetwork, ClientError>;

    async fn get_network(
        &self,
        network_id: i64,
        include_data: bool,
        template_id: Option<i64>,
    ) -> Result<HydraNetwork, ClientError>;

    async fn get_scenario(
        &self,
        scenario_id: i64,
        include_data: bool,
    ) -> Result<HydraScenario, ClientError>;

    async fn update_scenario(&self, scenario: &HydraScenario) -> Result<HydraScenario, ClientError>;

    async fn get_attributes(&self) -> Result<Vec<Attribute>, ClientError>;

    async fn get_attribute_by_name_and_dimension(
        &self,
        name: &str,
        dimension_id: Option<i64>,
    ) -> Result<Option<Attribute>, ClientError>;

    async fn get_resource_attributes(
        &self,
        ref_key: &str,
        ref_id: i64,
    ) -> Result<Vec<ResourceAttribute>, ClientError>;

    async fn get_resource_scenario(
        &self,
        resource_attr_id: i64,
        scenario_id: i64,
    ) -> Result<ResourceScenario, ClientError>;

    /// Binds an attribute to a resource. Binding an attribute twice returns
    /// the existing resource attribute.
    async fn add_resource_attribute(
        &self,
        ref_key: &str,
        ref_id: i64,
        attr_id: i64,
        is_var: bool,
    ) -> Result<ResourceAttribute, ClientError>;

    async fn get_resource_rules(&self, ref_key: &str, ref_id: i64) -> Result<Vec<Rule>, ClientError>;

    async fn get_dimension_by_name(&self, name: &str) -> Result<Dimension, ClientError>;

    async fn get_unit_by_abbreviation(&self, abbreviation: &str) -> Result<Option<Unit>, ClientError>;
}
