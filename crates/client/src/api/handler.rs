//! Document and workflow operations.
//!
//! Each operation validates its required identifiers before any network
//! call, builds a relative path and an allow-listed query string, and
//! delegates the exchange to the session connection. Query keys are sent
//! with underscores stripped (`user_code` goes over the wire as `usercode`)
//! and empty values are dropped.

use std::collections::HashMap;
use std::path::Path;

use nolijweb_domain::{AttributeMap, DocumentMetadata, NolijError, RawResponse, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::debug;

use crate::config::ConfigSource;
use crate::http::{Connection, Payload, RequestOptions};

use super::xml;

const DOC_HANDLER_PATH: &str = "handler/api/docs";
const WORKFLOW_PATH: &str = "handler/api/workflow/workcomplete";
const API_PATH: &str = "handler/api";
const VIEWER_PATH: &str = "documentviewer";
const LOGIN_CHECK_PATH: &str = "public/apiLoginCheck.jsp";

/// Characters escaped in hand-built query strings for derived URLs.
const QUERY_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'&')
    .add(b'=')
    .add(b'+')
    .add(b'%')
    .add(b'?');

/// Options for [`Handler::folder_info`] and [`Handler::folder_contents`].
#[derive(Debug, Clone, Default)]
pub struct FolderQuery {
    /// Folder to list. Required.
    pub folder_id: String,
    pub user_code: Option<String>,
    pub user_id: Option<String>,
    pub sort: Option<String>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
    pub wfma_code: Option<String>,
    /// Extra headers for this call.
    pub headers: HashMap<String, String>,
}

/// Options for [`Handler::submit_document`].
#[derive(Debug, Clone, Default)]
pub struct SubmitDocumentOptions {
    /// Folder the document lands in. Required.
    pub folder_id: String,
    pub user_code: Option<String>,
    pub wfma_code: Option<String>,
    pub index_code: Option<String>,
    pub dept_code: Option<String>,
    pub custom_name: Option<String>,
    /// OCR words submitted alongside the file.
    pub ocr_words: Option<String>,
    pub headers: HashMap<String, String>,
}

/// Options for [`Handler::print_document`].
#[derive(Debug, Clone, Default)]
pub struct PrintQuery {
    /// Documents to print into a single PDF. At least one is required.
    pub document_ids: Vec<u64>,
    pub user_code: Option<String>,
    pub wfma_code: Option<String>,
    pub user_id: Option<String>,
    pub headers: HashMap<String, String>,
}

/// Options for [`Handler::retrieve_document_image`].
#[derive(Debug, Clone, Default)]
pub struct DocumentImageQuery {
    /// Folder holding the document. Required.
    pub folder_id: String,
    /// Document to render. Required (non-zero).
    pub document_id: u64,
    /// Page to render; defaults to 1.
    pub page: Option<u32>,
    pub user_code: Option<String>,
    pub user_id: Option<String>,
    pub rotation: Option<i32>,
    pub wpixels: Option<u32>,
    pub hpixels: Option<u32>,
    pub redact: Option<String>,
    pub annot: Option<String>,
    pub wfma_code: Option<String>,
    pub headers: HashMap<String, String>,
}

/// Options for [`Handler::delete_document`].
#[derive(Debug, Clone, Default)]
pub struct DeleteDocumentQuery {
    /// Folder holding the document. Required.
    pub folder_id: String,
    /// Document to delete. Required.
    pub document_id: String,
    pub user_code: Option<String>,
    pub user_id: Option<String>,
    pub wfma_code: Option<String>,
    pub headers: HashMap<String, String>,
}

/// Options for [`Handler::document_metadata_xml`] and
/// [`Handler::document_metadata`].
#[derive(Debug, Clone, Default)]
pub struct DocumentMetadataQuery {
    /// Folder holding the document. Required.
    pub folder_id: String,
    /// Document to describe. Required (non-zero).
    pub document_id: u64,
    pub user_code: Option<String>,
    pub user_id: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub wfma_code: Option<String>,
    pub headers: HashMap<String, String>,
}

/// Options for [`Handler::work_complete`].
#[derive(Debug, Clone, Default)]
pub struct WorkCompleteOptions {
    /// Workflow master code. Required.
    pub wfma_code: String,
    /// Folder the item sits in. Required.
    pub folder_id: String,
    /// Folder name. Required.
    pub folder_name: String,
    pub user_id: Option<String>,
    pub user_code: Option<String>,
    pub headers: HashMap<String, String>,
}

/// Options for [`Handler::login_check`].
#[derive(Debug, Clone, Default)]
pub struct LoginCheckOptions {
    /// Where to send the user once authenticated, relative to `/public`.
    /// Required.
    pub redir: String,
    /// Return a full URL instead of a relative path.
    pub full_url: bool,
}

/// Options for [`Handler::viewer_url`].
#[derive(Debug, Clone, Default)]
pub struct ViewerUrlOptions {
    /// Document to open in the viewer. Required.
    pub document_id: String,
    pub user_code: Option<String>,
    pub wfma_code: Option<String>,
    /// Return a full URL instead of a relative path.
    pub full_url: bool,
}

/// Translates Nolij Web document and workflow operations into requests on a
/// [`Connection`].
///
/// Every network operation here runs in one-shot mode: its own login/logout
/// bracket around a single request. For batching, drive the connection
/// directly via [`Handler::connection_mut`].
pub struct Handler {
    connection: Connection,
}

impl Handler {
    /// Create a handler with its own connection from a configuration source.
    ///
    /// # Errors
    /// Returns `NolijError::Config` when the source is invalid.
    pub fn new(config: ConfigSource) -> Result<Self> {
        Ok(Self { connection: Connection::new(config)? })
    }

    /// Wrap an existing connection.
    pub fn with_connection(connection: Connection) -> Self {
        Self { connection }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Mutable access to the underlying connection, for manual session
    /// management.
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }

    /// Folder contents as raw XML.
    ///
    /// # Errors
    /// `NolijError::MissingAttribute` when `folder_id` is empty.
    pub async fn folder_info(&mut self, query: &FolderQuery) -> Result<String> {
        let response = self.folder_info_response(query).await?;
        Ok(response.text())
    }

    /// Folder contents as one attribute map per file.
    pub async fn folder_contents(&mut self, query: &FolderQuery) -> Result<Vec<AttributeMap>> {
        let body = self.folder_info(query).await?;
        xml::element_attributes(&body, "folderobject")
    }

    async fn folder_info_response(&mut self, query: &FolderQuery) -> Result<RawResponse> {
        require(&query.folder_id, "folder ID is required")?;

        let opts = RequestOptions {
            query: query_pairs(&[
                ("user_code", query.user_code.clone()),
                ("user_id", query.user_id.clone()),
                ("sort", query.sort.clone()),
                ("offset", query.offset.map(|v| v.to_string())),
                ("limit", query.limit.map(|v| v.to_string())),
                ("wfma_code", query.wfma_code.clone()),
            ]),
            headers: query.headers.clone(),
            ..RequestOptions::default()
        };
        let path = format!("{DOC_HANDLER_PATH}/{}", query.folder_id);

        self.connection.get(&path, &opts).await
    }

    /// Upload a local file into a folder. Returns the new document id when
    /// the server reports one.
    ///
    /// # Errors
    /// `NolijError::MissingAttribute` when `folder_id` is empty or the file
    /// cannot be read.
    pub async fn submit_document(
        &mut self,
        local_file: &Path,
        opts: &SubmitDocumentOptions,
    ) -> Result<Option<String>> {
        require(&opts.folder_id, "folder ID is required to submit a document")?;

        let content = std::fs::read(local_file).map_err(|_| {
            NolijError::MissingAttribute(
                "valid file or local filepath is required to submit a document".to_string(),
            )
        })?;
        let file_name = local_file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                NolijError::MissingAttribute(
                    "valid file or local filepath is required to submit a document".to_string(),
                )
            })?;

        debug!(folder_id = %opts.folder_id, file = %file_name, "submitting document");

        let query = query_pairs(&[
            ("user_code", opts.user_code.clone()),
            ("wfma_code", opts.wfma_code.clone()),
            ("index_code", opts.index_code.clone()),
            ("dept_code", opts.dept_code.clone()),
            ("custom_name", opts.custom_name.clone()),
            ("file_name", Some(file_name.clone())),
        ]);

        let mut fields = Vec::new();
        if let Some(words) = &opts.ocr_words {
            fields.push(("ocrwords".to_string(), words.clone()));
        }
        let payload = Payload::Multipart {
            fields,
            file_part: "my_file".to_string(),
            file_name,
            content,
        };

        let request =
            RequestOptions { query, headers: opts.headers.clone(), ..RequestOptions::default() };
        let path = format!("{DOC_HANDLER_PATH}/{}", opts.folder_id);

        let response = self.connection.post(&path, payload, &request).await?;
        let metas = xml::element_attributes(&response.text(), "documentmeta")?;
        Ok(metas.into_iter().next().and_then(|attrs| attrs.get("documentid").cloned()))
    }

    /// Print one or more documents to a single PDF; returns the PDF bytes.
    ///
    /// # Errors
    /// `NolijError::MissingAttribute` when no document id is supplied.
    pub async fn print_document(&mut self, query: &PrintQuery) -> Result<Vec<u8>> {
        if query.document_ids.is_empty() {
            return Err(NolijError::MissingAttribute(
                "at least one document ID is required to print a document".to_string(),
            ));
        }

        let joined =
            query.document_ids.iter().map(ToString::to_string).collect::<Vec<_>>().join("-");
        let opts = RequestOptions {
            query: query_pairs(&[
                ("user_code", query.user_code.clone()),
                ("wfma_code", query.wfma_code.clone()),
                ("user_id", query.user_id.clone()),
                ("document_id", Some(joined)),
            ]),
            headers: query.headers.clone(),
            ..RequestOptions::default()
        };
        let path = format!("{DOC_HANDLER_PATH}/print");

        let response = self.connection.get(&path, &opts).await?;
        Ok(response.body)
    }

    /// Render one page of a document as a JPEG; returns the image bytes.
    /// The page defaults to 1.
    ///
    /// # Errors
    /// `NolijError::MissingAttribute` when `folder_id` is empty or
    /// `document_id` is zero.
    pub async fn retrieve_document_image(
        &mut self,
        query: &DocumentImageQuery,
    ) -> Result<Vec<u8>> {
        require(&query.folder_id, "folder ID is required to retrieve a document")?;
        if query.document_id == 0 {
            return Err(NolijError::MissingAttribute(
                "document ID is required to retrieve a document".to_string(),
            ));
        }
        let page = match query.page {
            None | Some(0) => 1,
            Some(page) => page,
        };

        let opts = RequestOptions {
            query: query_pairs(&[
                ("user_code", query.user_code.clone()),
                ("user_id", query.user_id.clone()),
                ("rotation", query.rotation.map(|v| v.to_string())),
                ("wpixels", query.wpixels.map(|v| v.to_string())),
                ("hpixels", query.hpixels.map(|v| v.to_string())),
                ("redact", query.redact.clone()),
                ("annot", query.annot.clone()),
                ("wfma_code", query.wfma_code.clone()),
            ]),
            headers: query.headers.clone(),
            ..RequestOptions::default()
        };
        let path =
            format!("{DOC_HANDLER_PATH}/{}/{}/page/{page}", query.folder_id, query.document_id);

        let response = self.connection.get(&path, &opts).await?;
        Ok(response.body)
    }

    /// Delete a document.
    ///
    /// # Errors
    /// `NolijError::MissingAttribute` when `folder_id` or `document_id` is
    /// empty.
    pub async fn delete_document(&mut self, query: &DeleteDocumentQuery) -> Result<()> {
        require(&query.folder_id, "folder ID is required to delete a document")?;
        require(&query.document_id, "document ID is required to delete a document")?;

        let opts = RequestOptions {
            query: query_pairs(&[
                ("user_code", query.user_code.clone()),
                ("user_id", query.user_id.clone()),
                ("wfma_code", query.wfma_code.clone()),
            ]),
            headers: query.headers.clone(),
            ..RequestOptions::default()
        };
        let path =
            format!("{DOC_HANDLER_PATH}/delete/{}/{}", query.folder_id, query.document_id);

        self.connection.delete(&path, &opts).await?;
        Ok(())
    }

    /// Document metadata as raw XML.
    ///
    /// # Errors
    /// `NolijError::MissingAttribute` when `folder_id` is empty or
    /// `document_id` is zero.
    pub async fn document_metadata_xml(
        &mut self,
        query: &DocumentMetadataQuery,
    ) -> Result<String> {
        require(&query.folder_id, "folder ID is required to retrieve a document")?;
        if query.document_id == 0 {
            return Err(NolijError::MissingAttribute(
                "document ID is required to retrieve a document".to_string(),
            ));
        }

        let opts = RequestOptions {
            query: query_pairs(&[
                ("user_code", query.user_code.clone()),
                ("user_id", query.user_id.clone()),
                ("start", query.start.clone()),
                ("end", query.end.clone()),
                ("wfma_code", query.wfma_code.clone()),
            ]),
            headers: query.headers.clone(),
            ..RequestOptions::default()
        };
        let path = format!(
            "{DOC_HANDLER_PATH}/{}/{}/documentmeta",
            query.folder_id, query.document_id
        );

        let response = self.connection.get(&path, &opts).await?;
        Ok(response.text())
    }

    /// Document metadata decoded into attribute maps: the document's own
    /// attributes plus one map per page.
    pub async fn document_metadata(
        &mut self,
        query: &DocumentMetadataQuery,
    ) -> Result<DocumentMetadata> {
        let body = self.document_metadata_xml(query).await?;

        let attributes = xml::element_attributes(&body, "documentmeta")?
            .into_iter()
            .next()
            .ok_or_else(|| {
                NolijError::InvalidResponse(
                    "response did not contain document metadata".to_string(),
                )
            })?;
        let pages = xml::element_attributes(&body, "pagemeta")?;

        Ok(DocumentMetadata { attributes, pages })
    }

    /// Issue a work-complete to push an item along in its workflow.
    ///
    /// # Errors
    /// `NolijError::MissingAttribute` when `wfma_code`, `folder_id`, or
    /// `folder_name` is empty.
    pub async fn work_complete(&mut self, opts: &WorkCompleteOptions) -> Result<()> {
        require(&opts.wfma_code, "workflow master code is required for workflow requests")?;
        require(&opts.folder_id, "folder ID is required")?;
        require(&opts.folder_name, "folder name is required")?;

        let request = RequestOptions {
            query: query_pairs(&[
                ("wfma_code", Some(opts.wfma_code.clone())),
                ("user_id", opts.user_id.clone()),
                ("user_code", opts.user_code.clone()),
                ("folder_name", Some(opts.folder_name.clone())),
            ]),
            headers: opts.headers.clone(),
            ..RequestOptions::default()
        };
        let path = format!("{WORKFLOW_PATH}/{}", opts.folder_id);

        self.connection.post(&path, Payload::Empty, &request).await?;
        Ok(())
    }

    /// Server version information as an attribute map.
    pub async fn version(&mut self) -> Result<AttributeMap> {
        let path = format!("{API_PATH}/version");
        let response = self.connection.get(&path, &RequestOptions::default()).await?;

        let info = xml::element_attributes(&response.text(), "version")?;
        Ok(info.into_iter().next().unwrap_or_default())
    }

    /// Path (or full URL) that verifies in the browser that a user holds a
    /// Nolij Web session, redirecting to `redir` once authenticated. Never
    /// requested by this client; it is handed to browsers.
    ///
    /// # Errors
    /// `NolijError::MissingAttribute` when `redir` is empty.
    pub fn login_check(&self, opts: &LoginCheckOptions) -> Result<String> {
        require(&opts.redir, "redirect path is required to check login")?;

        let query = query_str(&[("redir", Some(opts.redir.clone()))]);
        let path = format!("{LOGIN_CHECK_PATH}{query}");
        Ok(self.derived_url(path, opts.full_url))
    }

    /// Path (or full URL) that opens the standalone document viewer. Never
    /// requested by this client; it is handed to browsers.
    ///
    /// # Errors
    /// `NolijError::MissingAttribute` when `document_id` is empty.
    pub fn viewer_url(&self, opts: &ViewerUrlOptions) -> Result<String> {
        require(&opts.document_id, "document ID is required to launch viewer")?;

        let query = query_str(&[
            ("document_id", Some(opts.document_id.clone())),
            ("user_code", opts.user_code.clone()),
            ("wfma_code", opts.wfma_code.clone()),
        ]);
        let path = format!("{VIEWER_PATH}{query}");
        Ok(self.derived_url(path, opts.full_url))
    }

    fn derived_url(&self, path: String, full_url: bool) -> String {
        if full_url {
            format!("{}/{path}", self.connection.base_url().trim_end_matches('/'))
        } else {
            path
        }
    }
}

/// Non-empty check for required identifiers.
fn require(value: &str, message: &str) -> Result<()> {
    if value.is_empty() {
        return Err(NolijError::MissingAttribute(message.to_string()));
    }
    Ok(())
}

/// Ordered query pairs with underscore-stripped key names. Absent and empty
/// values are dropped.
fn query_pairs(pairs: &[(&str, Option<String>)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .filter_map(|(key, value)| {
            value.as_ref().and_then(|v| {
                if v.is_empty() {
                    None
                } else {
                    Some((key.replace('_', ""), v.clone()))
                }
            })
        })
        .collect()
}

/// Hand-built query string for derived URLs; empty when no pair survives.
fn query_str(pairs: &[(&str, Option<String>)]) -> String {
    let encoded: Vec<String> = query_pairs(pairs)
        .into_iter()
        .map(|(key, value)| format!("{key}={}", utf8_percent_encode(&value, QUERY_SET)))
        .collect();

    if encoded.is_empty() {
        String::new()
    } else {
        format!("?{}", encoded.join("&"))
    }
}
