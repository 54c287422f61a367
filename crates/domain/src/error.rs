/// Shared error type used across all sinain crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("model {model}: {message}")]
    Model { model: String, message: String },

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("gateway: {0}")]
    Gateway(String),

    #[error("bad input: {0}")]
    BadInput(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
