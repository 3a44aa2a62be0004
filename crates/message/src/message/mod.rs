//! The immutable HTTP message family.
//!
//! Every `with_*` method takes `&self` and returns a new value, the receiver is never
//! changed. Validating mutators return [`ValidationError`] and leave the receiver usable.
//!
//! ```text
//!             Message
//!            /       \
//!   RequestMessage   Response
//!      /      \
//!  Request  ServerRequest
//! ```

mod headers;
mod request;
mod response;
mod server_request;

pub use headers::{Headers, IntoHeaderValues};
pub use request::{Request, RequestBuilder, RequestMessage};
pub use response::{Response, ResponseBuilder, reason_phrase};
pub use server_request::{Attribute, Params, ServerRequest, ServerRequestBuilder, UploadedFileNode, UploadedFiles};

use crate::error::ValidationError;
use crate::stream::Body;

pub(crate) mod sealed {
    use once_cell::sync::OnceCell;

    use super::Headers;
    use crate::stream::Body;

    pub const DEFAULT_VERSION: &str = "1.1";

    /// State shared by every message: protocol version, headers and the lazily created body.
    #[derive(Debug, Clone)]
    pub struct MessageHead {
        pub(crate) version: String,
        pub(crate) headers: Headers,
        pub(crate) body: OnceCell<Body>,
    }

    impl Default for MessageHead {
        fn default() -> Self {
            Self { version: DEFAULT_VERSION.to_string(), headers: Headers::new(), body: OnceCell::new() }
        }
    }

    pub trait HasHead {
        fn head(&self) -> &MessageHead;

        fn head_mut(&mut self) -> &mut MessageHead;
    }
}

use sealed::{HasHead, MessageHead};

/// Read access and copy-on-write mutators shared by requests and responses.
pub trait Message: HasHead + Clone {
    fn protocol_version(&self) -> &str {
        &self.head().version
    }

    fn with_protocol_version(&self, version: &str) -> Self {
        let mut new = self.clone();
        if new.head().version != version {
            new.head_mut().version = version.to_string();
        }
        new
    }

    fn headers(&self) -> &Headers {
        &self.head().headers
    }

    fn has_header(&self, name: &str) -> bool {
        self.head().headers.contains(name)
    }

    fn header(&self, name: &str) -> &[String] {
        self.head().headers.get(name)
    }

    fn header_line(&self, name: &str) -> String {
        self.head().headers.line(name)
    }

    /// Replaces every value of the case-insensitively matched header.
    fn with_header(&self, name: &str, values: impl IntoHeaderValues) -> Result<Self, ValidationError> {
        headers::validate_name(name)?;
        let values = headers::normalize_values(name, values.into_header_values())?;

        let mut new = self.clone();
        new.head_mut().headers.set(name, values);
        Ok(new)
    }

    /// Appends to the values of the case-insensitively matched header, creating it if absent.
    fn with_added_header(&self, name: &str, values: impl IntoHeaderValues) -> Result<Self, ValidationError> {
        headers::validate_name(name)?;
        let values = headers::normalize_values(name, values.into_header_values())?;

        let mut new = self.clone();
        new.head_mut().headers.append(name, values);
        Ok(new)
    }

    fn without_header(&self, name: &str) -> Self {
        let mut new = self.clone();
        new.head_mut().headers.remove(name);
        new
    }

    /// The body handle, an empty in-memory stream is created on first access.
    fn body(&self) -> Body {
        self.head().body.get_or_init(Body::empty).clone()
    }

    fn with_body(&self, body: impl Into<Body>) -> Self {
        let body = body.into();
        let mut new = self.clone();
        if new.head().body.get().is_some_and(|current| current.ptr_eq(&body)) {
            return new;
        }
        new.head_mut().body = body.into();
        new
    }
}

/// Collects headers, body and version for the builders, validation happens in [`HeadParts::build`].
#[derive(Debug, Default)]
pub(crate) struct HeadParts {
    version: Option<String>,
    headers: Vec<(String, Vec<String>)>,
    body: Option<Body>,
}

impl HeadParts {
    pub(crate) fn version(&mut self, version: &str) {
        self.version = Some(version.to_string());
    }

    pub(crate) fn header(&mut self, name: &str, values: impl IntoHeaderValues) {
        self.headers.push((name.to_string(), values.into_header_values()));
    }

    pub(crate) fn body(&mut self, body: Body) {
        self.body = Some(body);
    }

    pub(crate) fn build(self) -> Result<MessageHead, ValidationError> {
        let mut head = MessageHead::default();
        if let Some(version) = self.version {
            head.version = version;
        }
        for (name, values) in self.headers {
            headers::validate_name(&name)?;
            let values = headers::normalize_values(&name, values)?;
            head.headers.append(&name, values);
        }
        if let Some(body) = self.body {
            head.body = body.into();
        }
        Ok(head)
    }
}
