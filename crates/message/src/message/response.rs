use http::StatusCode;

use super::sealed::{HasHead, MessageHead};
use super::{HeadParts, IntoHeaderValues, Message};
use crate::error::ValidationError;
use crate::stream::Body;

/// The reason phrase used when none is supplied explicitly.
pub fn reason_phrase(code: u16) -> Option<&'static str> {
    let phrase = match code {
        100 => "Continue",
        101 => "Switching Protocols",
        102 => "Processing",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        207 => "Multi-status",
        208 => "Already Reported",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        306 => "Switch Proxy",
        307 => "Temporary Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Time-out",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Request Entity Too Large",
        414 => "Request-URI Too Large",
        415 => "Unsupported Media Type",
        416 => "Requested range not satisfiable",
        417 => "Expectation Failed",
        418 => "I'm a teapot",
        422 => "Unprocessable Entity",
        423 => "Locked",
        424 => "Failed Dependency",
        425 => "Unordered Collection",
        426 => "Upgrade Required",
        428 => "Precondition Required",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Time-out",
        505 => "HTTP Version not supported",
        506 => "Variant Also Negotiates",
        507 => "Insufficient Storage",
        508 => "Loop Detected",
        511 => "Network Authentication Required",
        _ => return None,
    };
    Some(phrase)
}

fn parse_status(code: u16) -> Result<StatusCode, ValidationError> {
    StatusCode::from_u16(code).map_err(|_| ValidationError::InvalidStatus { code })
}

fn phrase_or_default(status: StatusCode, reason: &str) -> String {
    if reason.is_empty() { reason_phrase(status.as_u16()).unwrap_or_default().to_string() } else { reason.to_string() }
}

#[derive(Debug, Clone)]
pub struct Response {
    head: MessageHead,
    status: StatusCode,
    reason: String,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self { head: MessageHead::default(), status, reason: phrase_or_default(status, "") }
    }

    /// Accepts any three digit code in `100..=999`.
    pub fn from_code(code: u16) -> Result<Self, ValidationError> {
        Ok(Self::new(parse_status(code)?))
    }

    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::new()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn reason_phrase(&self) -> &str {
        &self.reason
    }

    /// An empty `reason` falls back to the standard phrase of `code`, if there is one.
    pub fn with_status(&self, code: u16, reason: &str) -> Result<Self, ValidationError> {
        let status = parse_status(code)?;
        let mut new = self.clone();
        new.status = status;
        new.reason = phrase_or_default(status, reason);
        Ok(new)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

impl HasHead for Response {
    fn head(&self) -> &MessageHead {
        &self.head
    }

    fn head_mut(&mut self) -> &mut MessageHead {
        &mut self.head
    }
}

impl Message for Response {}

#[derive(Debug)]
pub struct ResponseBuilder {
    code: u16,
    reason: String,
    parts: HeadParts,
}

impl ResponseBuilder {
    fn new() -> Self {
        Self { code: StatusCode::OK.as_u16(), reason: String::new(), parts: HeadParts::default() }
    }

    pub fn status(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    pub fn reason(mut self, reason: &str) -> Self {
        self.reason = reason.to_string();
        self
    }

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

    pub fn build(self) -> Result<Response, ValidationError> {
        let status = parse_status(self.code)?;
        let head = self.parts.build()?;
        Ok(Response { head, status, reason: phrase_or_default(status, &self.reason) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reason_phrases() {
        assert_eq!(Response::default().status_code(), 200);
        assert_eq!(Response::default().reason_phrase(), "OK");
        assert_eq!(Response::new(StatusCode::REQUEST_TIMEOUT).reason_phrase(), "Request Time-out");
        assert_eq!(Response::from_code(207).unwrap().reason_phrase(), "Multi-status");
        // no entry in the table
        assert_eq!(Response::from_code(299).unwrap().reason_phrase(), "");
    }

    #[test]
    fn with_status() {
        let response = Response::default();

        let not_found = response.with_status(404, "").unwrap();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.reason_phrase(), "Not Found");

        let custom = response.with_status(404, "Nothing Here").unwrap();
        assert_eq!(custom.reason_phrase(), "Nothing Here");

        assert_eq!(response.with_status(42, "").unwrap_err(), ValidationError::InvalidStatus { code: 42 });
        assert_eq!(response.status_code(), 200);
    }

    #[test]
    fn builder() {
        let response = Response::builder()
            .status(201)
            .header("Location", "/items/1")
            .header("X-Trace", ["a", "b"])
            .body("{}")
            .build()
            .unwrap();

        assert_eq!(response.reason_phrase(), "Created");
        assert_eq!(response.header_line("location"), "/items/1");
        assert_eq!(response.header_line("x-trace"), "a, b");
        assert_eq!(response.body().to_string(), "{}");

        assert!(Response::builder().status(1000).build().is_err());
        assert_eq!(Response::builder().status(500).reason("Oops").build().unwrap().reason_phrase(), "Oops");
    }

    #[test]
    fn phrase_table_size() {
        let known = (100..=599).filter_map(reason_phrase).count();
        assert_eq!(known, 57);
    }
}
