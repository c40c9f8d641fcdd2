//! Authenticated session connection and request execution.
//!
//! The server uses Spring Security's form login: a POST to
//! `j_spring_security_check` answers with a redirect and a session cookie,
//! and `j_spring_security_logout` invalidates that cookie. Everything in
//! between is a plain request carrying the session cookie jar.

use std::collections::HashMap;

use nolijweb_domain::{ConnectionSettings, NolijError, RawResponse, Result};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, Method};
use tracing::{debug, warn};
use url::Url;

use crate::config::ConfigSource;

const LOGIN_PATH: &str = "j_spring_security_check";
const LOGOUT_PATH: &str = "j_spring_security_logout";

/// Maps a completed exchange to a success value or a typed error.
///
/// The default is [`default_response_policy`]; callers may substitute their
/// own for one call through [`RequestOptions::policy`]. `establish` does
/// this internally to treat the login redirect as success.
pub type ResponsePolicy = fn(RawResponse) -> Result<RawResponse>;

/// Options attached to a single request. Not retained after the call.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query parameters appended to the URL, in order.
    pub query: Vec<(String, String)>,
    /// Extra headers, shallow-merged over the session's headers.
    pub headers: HashMap<String, String>,
    /// Extra cookies for this call; they override session cookies only
    /// where keys collide.
    pub cookies: HashMap<String, String>,
    /// Per-call response policy; `None` uses [`default_response_policy`].
    pub policy: Option<ResponsePolicy>,
}

/// Request body for POST calls.
#[derive(Debug, Clone, Default)]
pub enum Payload {
    /// No body.
    #[default]
    Empty,
    /// URL-encoded form fields.
    Form(Vec<(String, String)>),
    /// Multipart upload: one file part plus any extra form fields.
    Multipart {
        /// Plain form fields sent alongside the file.
        fields: Vec<(String, String)>,
        /// Name of the file part.
        file_part: String,
        /// File name reported to the server.
        file_name: String,
        /// File contents.
        content: Vec<u8>,
    },
    /// Raw bytes.
    Bytes(Vec<u8>),
}

/// An authenticated session with a Nolij Web server.
///
/// [`get`](Self::get)/[`post`](Self::post)/[`delete`](Self::delete) wrap a
/// single request in a full establish/dispatch/close cycle, with close
/// running on every exit path. For several requests under one login, call
/// [`establish`](Self::establish), the `*_in_session` methods, then
/// [`close`](Self::close).
///
/// One connection owns one logical session; for concurrent sessions against
/// the same server, create one connection per session.
pub struct Connection {
    settings: ConnectionSettings,
    client: Client,
    open: bool,
    cookie_jar: HashMap<String, String>,
    session_headers: HashMap<String, String>,
}

impl Connection {
    /// Create a connection from a configuration source.
    ///
    /// # Errors
    /// Returns `NolijError::Config` when the source is invalid, missing, or
    /// unparsable.
    pub fn new(config: ConfigSource) -> Result<Self> {
        Self::with_settings(config.resolve()?)
    }

    /// Create a connection from already-resolved settings.
    ///
    /// Redirect following is disabled on the underlying client: the login
    /// flow signals success with a redirect status that must reach the
    /// response policy untouched.
    pub fn with_settings(settings: ConnectionSettings) -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(!settings.verify_ssl)
            .build()
            .map_err(|e| NolijError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            settings,
            client,
            open: false,
            cookie_jar: HashMap::new(),
            session_headers: HashMap::new(),
        })
    }

    /// Server base URL, including any path prefix.
    pub fn base_url(&self) -> &str {
        &self.settings.base_url
    }

    /// Login user name.
    pub fn username(&self) -> &str {
        &self.settings.username
    }

    /// Whether a session is currently open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Current session cookie jar. Non-empty only while a session is open.
    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookie_jar
    }

    /// Headers accumulated for the current session.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.session_headers
    }

    /// Open a session by posting the login form.
    ///
    /// The server answers a successful login with a redirect; that
    /// response's cookies become the session cookie jar. Returns whether the
    /// session opened.
    ///
    /// # Errors
    /// A login response that is neither a success nor a redirect surfaces as
    /// `NolijError::Http`; transport failures as `NolijError::Network`.
    pub async fn establish(&mut self) -> Result<bool> {
        let payload = Payload::Form(vec![
            ("j_username".to_string(), self.settings.username.clone()),
            ("j_password".to_string(), self.settings.password.clone()),
        ]);
        let opts =
            RequestOptions { policy: Some(login_response_policy), ..RequestOptions::default() };

        let response = self.dispatch(Method::POST, LOGIN_PATH, payload, &opts).await?;

        self.cookie_jar = response.cookies;
        self.session_headers.clear();
        self.open = true;
        debug!(username = %self.settings.username, cookies = self.cookie_jar.len(), "session opened");
        Ok(true)
    }

    /// Close the session.
    ///
    /// Logs out if a session is open, then unconditionally clears the open
    /// flag, cookie jar, and session headers. Idempotent: closing a
    /// never-opened connection is a successful no-op. Logout transport
    /// failures are logged, not raised, so a close in finalizer position
    /// never masks the primary error.
    pub async fn close(&mut self) -> Result<()> {
        if self.open {
            match join_url(&self.settings.base_url, LOGOUT_PATH, &[]) {
                Ok(url) => {
                    debug!(%url, "closing session");
                    let mut request = self.client.get(url);
                    if !self.cookie_jar.is_empty() {
                        request = request.header(COOKIE, cookie_header(&self.cookie_jar));
                    }
                    // fire and forget: the logout response is not interpreted
                    if let Err(e) = request.send().await {
                        warn!(error = %e, "logout request failed");
                    }
                }
                Err(e) => warn!(error = %e, "could not build logout URL"),
            }
        }

        self.open = false;
        self.cookie_jar.clear();
        self.session_headers.clear();
        Ok(())
    }

    /// One-shot GET: establish, dispatch, close.
    pub async fn get(&mut self, path: &str, opts: &RequestOptions) -> Result<RawResponse> {
        self.run_one_shot(Method::GET, path, Payload::Empty, opts).await
    }

    /// One-shot POST: establish, dispatch, close.
    pub async fn post(
        &mut self,
        path: &str,
        payload: Payload,
        opts: &RequestOptions,
    ) -> Result<RawResponse> {
        self.run_one_shot(Method::POST, path, payload, opts).await
    }

    /// One-shot DELETE: establish, dispatch, close.
    pub async fn delete(&mut self, path: &str, opts: &RequestOptions) -> Result<RawResponse> {
        self.run_one_shot(Method::DELETE, path, Payload::Empty, opts).await
    }

    /// Perform one GET under the currently open session, without touching
    /// session state.
    pub async fn get_in_session(&self, path: &str, opts: &RequestOptions) -> Result<RawResponse> {
        self.dispatch(Method::GET, path, Payload::Empty, opts).await
    }

    /// Perform one POST under the currently open session, without touching
    /// session state.
    pub async fn post_in_session(
        &self,
        path: &str,
        payload: Payload,
        opts: &RequestOptions,
    ) -> Result<RawResponse> {
        self.dispatch(Method::POST, path, payload, opts).await
    }

    /// Perform one DELETE under the currently open session, without touching
    /// session state.
    pub async fn delete_in_session(
        &self,
        path: &str,
        opts: &RequestOptions,
    ) -> Result<RawResponse> {
        self.dispatch(Method::DELETE, path, Payload::Empty, opts).await
    }

    /// Establish, run exactly one request, close. Close runs on every exit
    /// path, including a failed establish.
    async fn run_one_shot(
        &mut self,
        method: Method,
        path: &str,
        payload: Payload,
        opts: &RequestOptions,
    ) -> Result<RawResponse> {
        let result = match self.establish().await {
            Ok(true) => {
                // headers supplied to a one-shot call stick to the session
                // until close clears them
                for (name, value) in &opts.headers {
                    self.session_headers.insert(name.clone(), value.clone());
                }
                self.dispatch(method, path, payload, opts).await
            }
            Ok(false) => Err(NolijError::Auth("unable to establish a session".to_string())),
            Err(e) => Err(e),
        };

        self.close().await?;
        result
    }

    /// Execute one request against the server.
    ///
    /// Cookies sent are the session jar with the caller's cookies merged
    /// over it; other headers are the session headers with the caller's
    /// shallow-merged over them. Neither the caller's maps nor the session
    /// state are mutated.
    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
        opts: &RequestOptions,
    ) -> Result<RawResponse> {
        let url = join_url(&self.settings.base_url, path, &opts.query)?;
        let headers = merged(&self.session_headers, &opts.headers);
        let cookies = merged(&self.cookie_jar, &opts.cookies);
        debug!(%method, %url, "dispatching request");

        let mut request = self.client.request(method, url);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !cookies.is_empty() {
            request = request.header(COOKIE, cookie_header(&cookies));
        }
        request = match payload {
            Payload::Empty => request,
            Payload::Form(fields) => request.form(&fields),
            Payload::Multipart { fields, file_part, file_name, content } => {
                let mut form = reqwest::multipart::Form::new();
                for (name, value) in fields {
                    form = form.text(name, value);
                }
                let part = reqwest::multipart::Part::bytes(content).file_name(file_name);
                request.multipart(form.part(file_part, part))
            }
            Payload::Bytes(bytes) => request.body(bytes),
        };

        let response =
            request.send().await.map_err(|e| NolijError::Network(e.to_string()))?;
        let raw = read_response(response).await?;
        debug!(status = raw.status, "received response");

        let policy = opts.policy.unwrap_or(default_response_policy);
        policy(raw)
    }
}

/// Default response policy: 200 is success, 302 and 401 are authentication
/// failures, anything else is surfaced with its status and body.
pub fn default_response_policy(response: RawResponse) -> Result<RawResponse> {
    match response.status {
        200 => Ok(response),
        302 => Err(NolijError::Auth("user is not logged in".to_string())),
        401 => Err(NolijError::Auth("request requires authentication".to_string())),
        status => Err(NolijError::Http { status, body: response.text() }),
    }
}

/// Policy for the login call: the server redirects on success, and a plain
/// success status is accepted too. Anything else is surfaced raw.
fn login_response_policy(response: RawResponse) -> Result<RawResponse> {
    match response.status {
        301 | 302 | 307 => Ok(response),
        200..=299 => Ok(response),
        status => Err(NolijError::Http { status, body: response.text() }),
    }
}

/// Join a relative path onto the base URL, preserving the base URL's own
/// path prefix and percent-encoding each relative segment.
fn join_url(base_url: &str, relative: &str, query: &[(String, String)]) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| NolijError::Config(format!("invalid base URL {base_url:?}: {e}")))?;

    {
        let mut segments = url.path_segments_mut().map_err(|()| {
            NolijError::Config(format!("invalid base URL {base_url:?}: cannot be a base"))
        })?;
        segments.pop_if_empty();
        for segment in relative.split('/').filter(|s| !s.is_empty()) {
            segments.push(segment);
        }
    }

    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in query {
            pairs.append_pair(name, value);
        }
    }
    Ok(url)
}

/// Shallow-merge `extra` over `base` without mutating either.
fn merged(
    base: &HashMap<String, String>,
    extra: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut out = base.clone();
    for (name, value) in extra {
        out.insert(name.clone(), value.clone());
    }
    out
}

/// Format a cookie jar as a `Cookie` header value, sorted by name so the
/// header is deterministic.
fn cookie_header(cookies: &HashMap<String, String>) -> String {
    let mut pairs: Vec<String> =
        cookies.iter().map(|(name, value)| format!("{name}={value}")).collect();
    pairs.sort();
    pairs.join("; ")
}

/// Extract the name/value pair from a `Set-Cookie` header, dropping
/// attributes like `Path` and `Expires`.
fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

async fn read_response(response: reqwest::Response) -> Result<RawResponse> {
    let status = response.status().as_u16();
    let cookies = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(parse_set_cookie)
        .collect();
    let body =
        response.bytes().await.map_err(|e| NolijError::Network(e.to_string()))?.to_vec();
    Ok(RawResponse { status, cookies, body })
}
