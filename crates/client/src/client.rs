use std::fs;
use std::path::PathBuf;

use bytes::Bytes;
use http::StatusCode;
use micro_message::{IntoUri, Message, Request, RequestMessage, Response, Uri};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::{TcpTransport, Transport};
use crate::utils::ensure;

/// Per-call extras for the verb helpers on [`Client`].
///
/// Which parts are sent depends on the verb: `GET`, `HEAD` and `OPTIONS` only send
/// headers, `POST` prefers `fields`, then `json`, then `body`, while `PUT`, `PATCH` and
/// `DELETE` prefer `json` over `body`.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    json: Option<Value>,
    fields: Vec<(String, String)>,
    download: Option<PathBuf>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sent with `Content-Type: application/json`.
    pub fn json(mut self, json: Value) -> Self {
        self.json = Some(json);
        self
    }

    /// A form field, all fields are sent urlencoded.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Writes the response payload to `path` instead of keeping it in the response body.
    pub fn download(mut self, path: impl Into<PathBuf>) -> Self {
        self.download = Some(path.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payload {
    None,
    Form,
    Json,
}

/// A blocking HTTP client.
///
/// Every status is returned as a [`Response`], errors are reserved for requests that
/// could not be made or answered.
#[derive(Debug, Clone, Default)]
pub struct Client<T: Transport = TcpTransport> {
    config: ClientConfig,
    transport: T,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self { config, transport: TcpTransport }
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ClientConfig {
        &mut self.config
    }

    pub fn get(&self, uri: impl IntoUri, options: RequestOptions) -> Result<Response, ClientError> {
        self.send_with("GET", uri, options, Payload::None)
    }

    pub fn post(&self, uri: impl IntoUri, options: RequestOptions) -> Result<Response, ClientError> {
        self.send_with("POST", uri, options, Payload::Form)
    }

    pub fn put(&self, uri: impl IntoUri, options: RequestOptions) -> Result<Response, ClientError> {
        self.send_with("PUT", uri, options, Payload::Json)
    }

    pub fn patch(&self, uri: impl IntoUri, options: RequestOptions) -> Result<Response, ClientError> {
        self.send_with("PATCH", uri, options, Payload::Json)
    }

    pub fn delete(&self, uri: impl IntoUri, options: RequestOptions) -> Result<Response, ClientError> {
        self.send_with("DELETE", uri, options, Payload::Json)
    }

    pub fn options(&self, uri: impl IntoUri, options: RequestOptions) -> Result<Response, ClientError> {
        self.send_with("OPTIONS", uri, options, Payload::None)
    }

    pub fn head(&self, uri: impl IntoUri, options: RequestOptions) -> Result<Response, ClientError> {
        self.send_with("HEAD", uri, options, Payload::None)
    }

    /// Sends `request`, following redirects when the config allows it.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Configuration`] for an `https` URI without an existing CA bundle
    /// - [`ClientError::TooManyRedirects`] once `max_redirects` is exceeded
    /// - whatever the transport fails with
    pub fn send_request(&self, request: Request) -> Result<Response, ClientError> {
        let mut request = self.prepare(request)?;
        let mut redirects = 0;

        loop {
            self.check_trust(request.uri())?;
            debug!(method = request.method(), uri = %request.uri(), "sending request");

            let response = self.transport.round_trip(&request, &self.config)?;
            let status = response.status();
            if !self.config.follow_redirects || !is_redirect(status) {
                return Ok(response);
            }
            let Some(location) = response.header("Location").first() else {
                return Ok(response);
            };

            ensure!(redirects < self.config.max_redirects, ClientError::TooManyRedirects { max: self.config.max_redirects });
            redirects += 1;

            debug!(status = status.as_u16(), location = location.as_str(), redirects, "following redirect");
            request = redirect(&request, status, location)?;
        }
    }

    fn send_with(&self, method: &str, uri: impl IntoUri, options: RequestOptions, payload: Payload) -> Result<Response, ClientError> {
        let RequestOptions { headers, body, json, fields, download } = options;
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in &headers {
            builder = builder.header(name, value);
        }

        let mut request = builder.build()?;
        if payload == Payload::Form && !fields.is_empty() {
            let form = serde_urlencoded::to_string(&fields).map_err(ClientError::encode)?;
            request = request.with_body(form);
            if !request.has_header("Content-Type") {
                request = request.with_header("Content-Type", "application/x-www-form-urlencoded")?;
            }
        } else if let (Payload::Form | Payload::Json, Some(json)) = (payload, json) {
            let body = serde_json::to_vec(&json).map_err(ClientError::encode)?;
            request = request.with_body(body).with_header("Content-Type", "application/json")?;
        } else if let (Payload::Form | Payload::Json, Some(body)) = (payload, body) {
            request = request.with_body(body);
        }

        let response = self.send_request(request)?;
        match download {
            Some(path) => save(response, path),
            None => Ok(response),
        }
    }

    fn prepare(&self, request: Request) -> Result<Request, ClientError> {
        let mut request = request;
        if let Some(user_agent) = &self.config.user_agent
            && !request.has_header("User-Agent")
        {
            request = request.with_header("User-Agent", user_agent.as_str())?;
        }
        if let Some(referer) = &self.config.referer
            && !request.has_header("Referer")
        {
            request = request.with_header("Referer", referer.as_str())?;
        }
        Ok(request)
    }

    fn check_trust(&self, uri: &Uri) -> Result<(), ClientError> {
        if uri.scheme().eq_ignore_ascii_case("https") && self.config.usable_ca_bundle().is_none() {
            return Err(ClientError::configuration(
                "invalid certificate authority (CA) bundle path, a valid copy is required to perform HTTPS requests",
            ));
        }
        Ok(())
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// The next request of a redirect chain.
///
/// `303` turns everything but `HEAD` into a body-less `GET`, `301` and `302` do the same
/// for `POST`. Credentials are not forwarded to another host.
fn redirect(request: &Request, status: StatusCode, location: &str) -> Result<Request, ClientError> {
    let target = resolve_location(request.uri(), location)?;
    let same_origin = target.host() == request.uri().host() && target.port() == request.uri().port();

    let mut next = request.with_uri(target, false);
    if !same_origin {
        next = next.without_header("Authorization").without_header("Cookie");
    }

    let method = request.method();
    let to_get = match status {
        StatusCode::SEE_OTHER => method != "HEAD",
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => method == "POST",
        _ => false,
    };
    if to_get {
        next = next
            .with_method("GET")?
            .with_body(Bytes::new())
            .without_header("Content-Type")
            .without_header("Content-Length");
    }
    Ok(next)
}

/// Resolves a `Location` value against the URI of the request that received it.
fn resolve_location(base: &Uri, location: &str) -> Result<Uri, ClientError> {
    let reference: Uri = location.parse()?;

    if !reference.scheme().is_empty() {
        return Ok(reference);
    }
    if !reference.host().is_empty() {
        return Ok(reference.with_scheme(base.scheme()));
    }

    let path = if reference.path().is_empty() {
        base.path().to_string()
    } else if reference.path().starts_with('/') {
        reference.path().to_string()
    } else {
        let dir = base.path().rsplit_once('/').map_or("", |(dir, _)| dir);
        format!("{dir}/{}", reference.path())
    };
    let query = if reference.path().is_empty() && reference.query().is_empty() { base.query() } else { reference.query() };

    Ok(base.with_path(&path).with_query(query).with_fragment(reference.fragment()))
}

fn save(response: Response, path: PathBuf) -> Result<Response, ClientError> {
    let payload = response.body().contents()?;
    fs::write(&path, &payload)?;
    info!(path = %path.display(), len = payload.len(), "response saved");
    Ok(response.with_body(Bytes::new()))
}
