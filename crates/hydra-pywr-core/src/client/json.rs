use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use super::{ClientError, HydraClient};
use crate::config::{HydraConfig, SESSION_COOKIE};
use crate::hydra::{
    Attribute, Dimension, HydraNetwork, HydraScenario, NewAttribute, ResourceAttribute,
    ResourceScenario, Rule, Template, Unit,
};

/// Client for the Hydra JSON endpoint.
///
/// Every call is a POST of `{"<function>": {args}}` to `<url>/json`.
pub struct JsonConnection {
    endpoint: String,
    app_name: String,
    session_id: Option<String>,
    user_id: Option<i64>,
    client: Client,
}

impl JsonConnection {
    /// Creates a connection to the server at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            endpoint: format!("{}/json", url.trim_end_matches('/')),
            app_name: crate::config::DEFAULT_APP_NAME.to_string(),
            session_id: None,
            user_id: None,
            client: Client::new(),
        }
    }

    /// Creates a connection from configuration, without logging in.
    pub fn from_config(config: &HydraConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let mut conn = Self::new(&config.url);
        conn.client = client;
        conn.app_name = config.app_name.clone();
        conn.session_id = config.session_id.clone();
        conn.user_id = config.user_id;
        Ok(conn)
    }

    /// Creates a connection and logs in when credentials are configured and
    /// no session id was given.
    pub async fn connect(config: &HydraConfig) -> Result<Self, ClientError> {
        let mut conn = Self::from_config(config)?;
        if conn.session_id.is_none() {
            if let (Some(username), Some(password)) = (&config.username, &config.password) {
                conn.login(username, password).await?;
            }
        }
        Ok(conn)
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    /// Logs in and stores the returned session id.
    #[instrument(skip(self, password))]
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), ClientError> {
        let args = json!({"username": username, "password": password});
        let (body, cookie) = self.post("login", args).await?;

        let session = body
            .get("session_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(cookie)
            .ok_or_else(|| ClientError::Login("no session id in response".to_string()))?;

        if let Some(user_id) = body.get("user_id").and_then(Value::as_i64) {
            self.user_id = Some(user_id);
        }
        self.session_id = Some(session);
        info!(username, "logged in to hydra");
        Ok(())
    }

    /// Calls a Hydra function and decodes its result.
    pub async fn call<T: DeserializeOwned>(&self, function: &str, args: Value) -> Result<T, ClientError> {
        let (body, _) = self.post(function, args).await?;
        serde_json::from_value(body).map_err(|e| ClientError::Parse {
            function: function.to_string(),
            message: e.to_string(),
        })
    }

    async fn post(&self, function: &str, args: Value) -> Result<(Value, Option<String>), ClientError> {
        debug!(function, endpoint = %self.endpoint, "hydra call");

        let mut body = serde_json::Map::new();
        body.insert(function.to_string(), args);

        let mut req = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header("app_name", &self.app_name);

        if let Some(session) = &self.session_id {
            req = req
                .header("session_id", session)
                .header(COOKIE, format!("{SESSION_COOKIE}={session}"));
        }
        if let Some(user_id) = self.user_id {
            req = req.header("user_id", user_id.to_string());
        }

        let response = req.json(&Value::Object(body)).send().await?;
        let status = response.status();
        let cookie = session_cookie(response.headers().get_all(SET_COOKIE).iter());
        let text = response.text().await?;

        let value: Value = serde_json::from_str(&text).unwrap_or(Value::String(text.clone()));

        if let Some(code) = value.get("faultcode") {
            return Err(ClientError::Fault {
                code: fault_text(code),
                message: value.get("faultstring").map(fault_text).unwrap_or_default(),
            });
        }

        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: text,
            });
        }

        Ok((value, cookie))
    }
}

fn fault_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn session_cookie<'a>(
    headers: impl Iterator<Item = &'a reqwest::header::HeaderValue>,
) -> Option<String> {
    headers
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

fn to_arg<T: Serialize>(value: &T) -> Result<Value, ClientError> {
    serde_json::to_value(value).map_err(|e| ClientError::Invalid(e.to_string()))
}

#[async_trait]
impl HydraClient for JsonConnection {
    #[instrument(skip(self))]
    async fn get_template(&self, template_id: i64) -> Result<Template, ClientError> {
        self.call("get_template", json!({"template_id": template_id})).await
    }

    #[instrument(skip(self, attrs), fields(count = attrs.len()))]
    async fn add_attributes(&self, attrs: &[NewAttribute]) -> Result<Vec<Attribute>, ClientError> {
        if attrs.is_empty() {
            return Ok(Vec::new());
        }
        self.call("add_attributes", json!({"attrs": to_arg(&attrs)?})).await
    }

    #[instrument(skip(self, network), fields(name = %network.name, nodes = network.nodes.len()))]
    async fn add_network(&self, network: &HydraNetwork) -> Result<HydraNetwork, ClientError> {
        self.call("add_network", json!({"net": to_arg(network)?})).await
    }

    #[instrument(skip(self))]
    async fn get_network(
        &self,
        network_id: i64,
        include_data: bool,
        template_id: Option<i64>,
    ) -> Result<HydraNetwork, ClientError> {
        self.call(
            "get_network",
            json!({
                "network_id": network_id,
                "include_data": include_data,
                "include_results": false,
                "template_id": template_id,
            }),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn get_scenario(
        &self,
        scenario_id: i64,
        include_data: bool,
    ) -> Result<HydraScenario, ClientError> {
        self.call(
            "get_scenario",
            json!({
                "scenario_id": scenario_id,
                "include_data": include_data,
                "include_results": false,
                "include_metadata": false,
                "include_attr": false,
            }),
        )
        .await
    }

    #[instrument(skip(self, scenario), fields(id = ?scenario.id))]
    async fn update_scenario(&self, scenario: &HydraScenario) -> Result<HydraScenario, ClientError> {
        self.call("update_scenario", json!({"scen": to_arg(scenario)?})).await
    }

    #[instrument(skip(self))]
    async fn get_attributes(&self) -> Result<Vec<Attribute>, ClientError> {
        self.call("get_attributes", json!({})).await
    }

    #[instrument(skip(self))]
    async fn get_attribute_by_name_and_dimension(
        &self,
        name: &str,
        dimension_id: Option<i64>,
    ) -> Result<Option<Attribute>, ClientError> {
        self.call(
            "get_attribute_by_name_and_dimension",
            json!({"name": name, "dimension_id": dimension_id}),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn get_resource_attributes(
        &self,
        ref_key: &str,
        ref_id: i64,
    ) -> Result<Vec<ResourceAttribute>, ClientError> {
        self.call(
            "get_resource_attributes",
            json!({"ref_key": ref_key.to_uppercase(), "ref_id": ref_id}),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn get_resource_scenario(
        &self,
        resource_attr_id: i64,
        scenario_id: i64,
    ) -> Result<ResourceScenario, ClientError> {
        self.call(
            "get_resource_scenario",
            json!({
                "resource_attr_id": resource_attr_id,
                "scenario_id": scenario_id,
                "get_parent_data": false,
            }),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn add_resource_attribute(
        &self,
        ref_key: &str,
        ref_id: i64,
        attr_id: i64,
        is_var: bool,
    ) -> Result<ResourceAttribute, ClientError> {
        self.call(
            "add_resource_attribute",
            json!({
                "resource_type": ref_key.to_uppercase(),
                "resource_id": ref_id,
                "attr_id": attr_id,
                "is_var": if is_var { "Y" } else { "N" },
                "error_on_duplicate": false,
            }),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn get_resource_rules(&self, ref_key: &str, ref_id: i64) -> Result<Vec<Rule>, ClientError> {
        self.call(
            "get_resource_rules",
            json!({"ref_key": ref_key.to_uppercase(), "ref_id": ref_id}),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn get_dimension_by_name(&self, name: &str) -> Result<Dimension, ClientError> {
        self.call("get_dimension_by_name", json!({"dimension_name": name})).await
    }

    #[instrument(skip(self))]
    async fn get_unit_by_abbreviation(&self, abbreviation: &str) -> Result<Option<Unit>, ClientError> {
        self.call(
            "get_unit_by_abbreviation",
            json!({"unit_abbreviation": abbreviation}),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_appends_json() {
        let conn = JsonConnection::new("http://hydra.local/");
        assert_eq!(conn.endpoint, "http://hydra.local/json");
        assert!(conn.session_id().is_none());
    }

    #[test]
    fn test_from_config_copies_session() {
        let config = HydraConfig {
            session_id: Some("abc".to_string()),
            user_id: Some(3),
            ..HydraConfig::default()
        };
        let conn = JsonConnection::from_config(&config).unwrap();
        assert_eq!(conn.session_id(), Some("abc"));
        assert_eq!(conn.user_id(), Some(3));
    }

    #[test]
    fn test_session_cookie_parsing() {
        let header = reqwest::header::HeaderValue::from_static(
            "beaker.session.id=xyz; Path=/; HttpOnly",
        );
        assert_eq!(session_cookie([&header].into_iter()), Some("xyz".to_string()));
    }
}
