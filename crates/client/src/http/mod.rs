//! Session-scoped HTTP connection to a Nolij Web server.

mod connection;

pub use connection::{
    default_response_policy, Connection, Payload, RequestOptions, ResponsePolicy,
};
