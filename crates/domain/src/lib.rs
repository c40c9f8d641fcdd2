//! # Nolij Web Domain
//!
//! Pure types shared across the Nolij Web client: the error taxonomy and the
//! settings/response/metadata records. No I/O lives here.

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{NolijError, Result};
pub use types::{AttributeMap, ConnectionSettings, DocumentMetadata, RawResponse};
