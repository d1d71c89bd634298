//! Writers from the network model to other representations.

mod hydra;
mod ids;
mod integrated;
mod json;

pub use hydra::PywrHydraWriter;
pub use ids::IdAllocator;
pub use integrated::{HydraIntegratedWriter, IntegratedJsonWriter};
pub use json::PywrJsonWriter;

use thiserror::Error;

use crate::client::ClientError;
use crate::network::NetworkError;
use crate::storage::StorageError;

/// Errors that can occur while writing a network.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("Template has no type `{node_type}` for node `{node}`")]
    UnknownNodeType { node: String, node_type: String },

    #[error("Template {0} has no NETWORK type")]
    MissingNetworkType(i64),

    #[error("Attribute `{0}` was not registered")]
    UnregisteredAttribute(String),

    #[error("Attribute `{attr}` of `{element}`: {source}")]
    UnsupportedValue {
        element: String,
        attr: String,
        #[source]
        source: crate::hydra::datatype::UnsupportedValue,
    },

    #[error("Edge {src} -> {dest} references missing node `{missing}`")]
    MissingNode {
        src: String,
        dest: String,
        missing: String,
    },

    #[error("Integrated config has no `{0}`")]
    MissingConfigField(&'static str),

    #[error("Network has not been built yet")]
    NotBuilt,

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
