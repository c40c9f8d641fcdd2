//! # Nolij Web Client
//!
//! HTTP client for the Nolij Web document-management API.
//!
//! [`Connection`] owns the authenticated session lifecycle: it logs in with
//! the server's form-based flow, keeps the session cookie jar, and tears the
//! session down on every exit path. [`Handler`] sits on top of it and
//! translates document and workflow operations into requests.
//!
//! `Connection::get`/`post`/`delete` wrap a single request in its own
//! open-session/close-session bracket. To batch several requests into one
//! session, call `establish`, then the `*_in_session` methods, then `close`.

pub mod api;
pub mod config;
pub mod http;

// Re-export commonly used items
pub use api::Handler;
pub use config::ConfigSource;
pub use http::{Connection, Payload, RequestOptions};
pub use nolijweb_domain::{
    AttributeMap, ConnectionSettings, DocumentMetadata, NolijError, RawResponse, Result,
};
