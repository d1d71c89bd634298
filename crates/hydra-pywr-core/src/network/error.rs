use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while parsing or reshaping a Pywr network.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Section `{0}` has an invalid shape")]
    InvalidSection(String),

    #[error("Node at index {index} is invalid: {reason}")]
    InvalidNode { index: usize, reason: String },

    #[error("Duplicate node name: {0}")]
    DuplicateNode(String),

    #[error("Edge at index {index} is invalid: {reason}")]
    InvalidEdge { index: usize, reason: String },

    #[error("Edge {src} -> {dest} references unknown node `{missing}`")]
    UnknownEdgeNode {
        src: String,
        dest: String,
        missing: String,
    },

    #[error("{kind} `{name}` has no string `type`")]
    MissingType { kind: &'static str, name: String },

    #[error("Network metadata has no `title`")]
    MissingTitle,

    #[error("Integrated config has no engine named `{0}` with a file argument")]
    MissingEngine(String),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NetworkError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        NetworkError::Io {
            path: path.into(),
            source,
        }
    }
}
