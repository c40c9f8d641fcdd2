//! Core types for the Nolij Web client

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Flat attribute map extracted from one XML element.
pub type AttributeMap = HashMap<String, String>;

/// Immutable per-connection settings resolved from a configuration source.
///
/// Created once at connection construction and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Server base URL. May include a path prefix ("http://host/NolijWeb");
    /// no trailing slash required.
    pub base_url: String,
    /// Login user name.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Whether to verify the server TLS certificate. Defaults to true.
    pub verify_ssl: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            verify_ssl: true,
        }
    }
}

/// One completed HTTP exchange, as handed to response policies and callers.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Cookies set by this response (name to value, attributes dropped).
    pub cookies: HashMap<String, String>,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl RawResponse {
    /// The body decoded lossily as UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Metadata for one stored document: the document's own attributes plus one
/// attribute map per page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Attributes of the `documentmeta` element.
    pub attributes: AttributeMap,
    /// Attributes of each `pagemeta` element, in page order.
    pub pages: Vec<AttributeMap>,
}
