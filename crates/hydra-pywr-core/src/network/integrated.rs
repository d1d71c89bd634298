use std::path::Path;

use serde_json::{Map, Value};
use tracing::info;

use super::error::NetworkError;
use super::PywrNetwork;
use crate::config::INTEGRATED_DOMAINS;

/// A coupled water/energy model driven by a pynsim config.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegratedNetwork {
    pub config: Map<String, Value>,
    pub water: PywrNetwork,
    pub energy: PywrNetwork,
}

impl IntegratedNetwork {
    pub fn new(config: Map<String, Value>, water: PywrNetwork, energy: PywrNetwork) -> Self {
        Self {
            config,
            water,
            energy,
        }
    }

    /// Domain names in the order they are written.
    pub fn domains(&self) -> &'static [&'static str] {
        INTEGRATED_DOMAINS
    }

    pub fn domain(&self, name: &str) -> Option<&PywrNetwork> {
        match name {
            "water" => Some(&self.water),
            "energy" => Some(&self.energy),
            _ => None,
        }
    }

    /// Loads a pynsim config and the two Pywr documents it references.
    ///
    /// Engine file arguments are resolved against the config's directory.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, NetworkError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| NetworkError::io(path, e))?;
        let config = match serde_json::from_str(&raw)? {
            Value::Object(config) => config,
            _ => return Err(NetworkError::InvalidSection("config".to_string())),
        };

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let load = |domain: &str| -> Result<PywrNetwork, NetworkError> {
            let file = engine_file(&config, domain)?;
            info!(domain, file, "loading integrated domain network");
            PywrNetwork::from_file(base.join(file))
        };

        let water = load("water")?;
        let energy = load("energy")?;
        Ok(Self::new(config, water, energy))
    }
}

/// First `args` entry of the engine named `domain`.
pub fn engine_file<'a>(config: &'a Map<String, Value>, domain: &str) -> Result<&'a str, NetworkError> {
    config
        .get("engines")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find(|engine| engine.get("name").and_then(Value::as_str) == Some(domain))
        .and_then(|engine| engine.get("args"))
        .and_then(Value::as_array)
        .and_then(|args| args.first())
        .and_then(Value::as_str)
        .ok_or_else(|| NetworkError::MissingEngine(domain.to_string()))
}
