use http::Method;

use super::sealed::{HasHead, MessageHead};
use super::{HeadParts, IntoHeaderValues, Message};
use crate::error::ValidationError;
use crate::stream::Body;
use crate::uri::{IntoUri, Uri};
use crate::utils::ensure;

pub(crate) mod private {
    use http::Method;

    use crate::uri::Uri;

    #[derive(Debug, Clone)]
    pub struct RequestLine {
        pub(crate) method: Method,
        pub(crate) uri: Uri,
        pub(crate) target: Option<String>,
    }

    pub trait HasRequestLine {
        fn line(&self) -> &RequestLine;

        fn line_mut(&mut self) -> &mut RequestLine;
    }
}

use private::{HasRequestLine, RequestLine};

/// The request line part of a message: method, target URI and request-target.
pub trait RequestMessage: Message + HasRequestLine {
    /// The method, always upper-cased.
    fn method(&self) -> &str {
        self.line().method.as_str()
    }

    fn with_method(&self, method: &str) -> Result<Self, ValidationError> {
        let method = parse_method(method)?;
        let mut new = self.clone();
        new.line_mut().method = method;
        Ok(new)
    }

    fn uri(&self) -> &Uri {
        &self.line().uri
    }

    /// Replaces the URI and derives the `Host` header from it, unless `preserve_host` is set
    /// and a `Host` header is already present.
    fn with_uri(&self, uri: Uri, preserve_host: bool) -> Self {
        let mut new = self.clone();
        if new.line().uri == uri {
            return new;
        }

        if !(preserve_host && self.has_header("Host")) {
            update_host(new.head_mut(), &uri);
        }
        new.line_mut().uri = uri;
        new
    }

    /// The explicit request-target if one was set, else the URI path (defaulting to `/`)
    /// followed by the query.
    fn request_target(&self) -> String {
        let line = self.line();
        if let Some(target) = &line.target {
            return target.clone();
        }

        let mut target = match line.uri.path() {
            "" => "/".to_string(),
            path => path.to_string(),
        };
        if !line.uri.query().is_empty() {
            target.push('?');
            target.push_str(line.uri.query());
        }
        target
    }

    fn with_request_target(&self, target: &str) -> Result<Self, ValidationError> {
        ensure!(
            !target.contains(char::is_whitespace),
            ValidationError::InvalidRequestTarget { target: target.to_string() }
        );
        let mut new = self.clone();
        new.line_mut().target = Some(target.to_string());
        Ok(new)
    }
}

pub(super) fn parse_method(method: &str) -> Result<Method, ValidationError> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| ValidationError::InvalidMethod { method: method.to_string() })
}

/// Puts `Host: host[:port]` first in the headers, replacing any previous value.
/// Does nothing when the URI has no host.
pub(super) fn update_host(head: &mut MessageHead, uri: &Uri) {
    if uri.host().is_empty() {
        return;
    }
    let host = match uri.port() {
        Some(port) => format!("{}:{port}", uri.host()),
        None => uri.host().to_string(),
    };
    head.headers.set_first("Host", vec![host]);
}

/// An outgoing HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    head: MessageHead,
    line: RequestLine,
}

impl Request {
    /// A request with an empty body and no headers besides the `Host` derived from `uri`.
    pub fn new(method: &str, uri: impl IntoUri) -> Result<Self, ValidationError> {
        Self::builder().method(method).uri(uri).build()
    }

    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }

    pub(crate) fn from_parts(head: MessageHead, method: Method, uri: Uri) -> Self {
        let mut request = Self { head, line: RequestLine { method, uri, target: None } };
        if !request.has_header("Host") {
            update_host(&mut request.head, &request.line.uri);
        }
        request
    }
}

impl HasHead for Request {
    fn head(&self) -> &MessageHead {
        &self.head
    }

    fn head_mut(&mut self) -> &mut MessageHead {
        &mut self.head
    }
}

impl HasRequestLine for Request {
    fn line(&self) -> &RequestLine {
        &self.line
    }

    fn line_mut(&mut self) -> &mut RequestLine {
        &mut self.line
    }
}

impl Message for Request {}

impl RequestMessage for Request {}

/// Builds a [`Request`], input is validated by [`RequestBuilder::build`].
#[derive(Debug)]
pub struct RequestBuilder {
    method: String,
    uri: Result<Uri, ValidationError>,
    parts: HeadParts,
}

impl RequestBuilder {
    fn new() -> Self {
        Self { method: Method::GET.to_string(), uri: Ok(Uri::new()), parts: HeadParts::default() }
    }

    pub fn method(mut self, method: &str) -> Self {
        self.method = method.to_string();
        self
    }

    pub fn uri(mut self, uri: impl IntoUri) -> Self {
        self.uri = uri.into_uri();
        self
    }

    /// Adds a header, repeated names are merged.
    pub fn header(mut self, name: &str, values: impl IntoHeaderValues) -> Self {
        self.parts.header(name, values);
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.parts.body(body.into());
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.parts.version(version);
        self
    }

    /// The `Host` header is derived from the URI unless one was given explicitly.
    pub fn build(self) -> Result<Request, ValidationError> {
        let method = parse_method(&self.method)?;
        let uri = self.uri?;
        let head = self.parts.build()?;
        Ok(Request::from_parts(head, method, uri))
    }
}
