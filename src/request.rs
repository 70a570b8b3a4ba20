/* src/request.rs */

use crate::query;
use crate::router::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;

/// Decoded request body, injected by the dispatcher before the handler runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    /// No body was sent, or the method does not carry one.
    #[default]
    Empty,
    /// Body sent as `application/json`.
    Json(Value),
    /// Any other UTF-8 body, unmodified.
    Text(String),
    /// Any other body that is not valid UTF-8.
    Bytes(Vec<u8>),
}

impl Body {
    /// Returns true if no body was sent.
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// Gets the parsed JSON value, if the body was JSON.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Gets the body as text, if it was a UTF-8 non-JSON body.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Represents an incoming HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    version: String,
    headers: HashMap<String, String>,
    remote_addr: Option<SocketAddr>,
    params: HashMap<String, String>,
    body: Body,
}

impl Request {
    /// Creates a new Request. Header names are stored lowercased.
    pub fn new(method: Method, url: impl Into<String>, headers: HashMap<String, String>) -> Self {
        Self {
            method,
            url: url.into(),
            version: "HTTP/1.1".to_string(),
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
            remote_addr: None,
            params: HashMap::new(),
            body: Body::Empty,
        }
    }

    /// Sets the protocol version from the request line.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the peer address of the connection.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Gets the request method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Gets the full request URL, including query string.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Gets the path part of the URL, without the query string.
    pub fn path(&self) -> &str {
        query::path_of(&self.url)
    }

    /// Gets the protocol version, e.g. `HTTP/1.1`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Gets the peer address, when the request came from a socket.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Gets all request headers, keyed by lowercase name.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Gets a specific header value by name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Gets the merged path variables and query parameters.
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Gets a single path variable or query parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Gets the decoded request body.
    pub fn body(&self) -> &Body {
        &self.body
    }

    pub(crate) fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub(crate) fn set_body(&mut self, body: Body) {
        self.body = body;
    }
}
