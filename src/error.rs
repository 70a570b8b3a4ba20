/* src/error.rs */

use std::io;
use thiserror::Error;

/// Errors raised while configuring or starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid port number: {0}")]
    InvalidPort(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidConfig { key: &'static str, value: String },

    #[error("Server is already running on {0}")]
    AlreadyRunning(std::net::SocketAddr),

    #[error("Failed to bind listener: {0}")]
    Bind(#[source] io::Error),
}

/// Errors raised while registering a route.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Invalid route template `{template}`: {reason}")]
    InvalidTemplate { template: String, reason: String },
}

/// Per-request failures. None of these outlive the request that caused them.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    #[error("Content-Length required")]
    LengthRequired,

    #[error("Request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("Timed out reading request body")]
    BodyTimeout,

    #[error("Malformed JSON body: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("Failed to read request body: {0}")]
    Io(#[from] io::Error),
}

impl DispatchError {
    /// Gets the status code the failed request is answered with.
    pub fn status_code(&self) -> u16 {
        match self {
            DispatchError::InvalidContentLength(_)
            | DispatchError::MalformedJson(_)
            | DispatchError::Io(_) => 400,
            DispatchError::LengthRequired => 411,
            DispatchError::BodyTooLarge { .. } => 413,
            DispatchError::BodyTimeout => 408,
        }
    }
}
