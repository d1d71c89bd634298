use thiserror::Error;

/// Errors that can occur while talking to a Hydra server.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Hydra fault {code}: {message}")]
    Fault { code: String, message: String },

    #[error("Hydra returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse response for `{function}`: {message}")]
    Parse { function: String, message: String },

    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Login failed: {0}")]
    Login(String),
}

impl ClientError {
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        ClientError::NotFound {
            kind,
            key: key.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network(err.to_string())
    }
}
