/// Outcome of a failed control-plane call, classified by meaning.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Environment variable {0} is not set")]
    Missing(&'static str),

    #[error("Environment variable {0} is invalid: {1}")]
    Invalid(&'static str, String),
}

#[derive(thiserror::Error, Debug)]
pub enum EventError {
    #[error("Queued message has no body")]
    MissingBody,

    #[error("Parsing error: {0}")]
    Parsing(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ResponseError {
    #[error("Unable to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Unable to deliver response: {0}")]
    Delivery(String),
}
