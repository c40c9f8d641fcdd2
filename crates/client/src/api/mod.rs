//! Resource handler: document and workflow operations over a session
//! connection.

mod handler;
pub mod xml;

pub use handler::{
    DeleteDocumentQuery, DocumentImageQuery, DocumentMetadataQuery, FolderQuery, Handler,
    LoginCheckOptions, PrintQuery, SubmitDocumentOptions, ViewerUrlOptions, WorkCompleteOptions,
};
