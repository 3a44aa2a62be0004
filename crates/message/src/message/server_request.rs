use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::request::private::{HasRequestLine, RequestLine};
use super::sealed::{HasHead, MessageHead};
use super::{IntoHeaderValues, Message, Request, RequestBuilder, RequestMessage};
use crate::error::ValidationError;
use crate::stream::Body;
use crate::upload::UploadedFile;
use crate::uri::IntoUri;

/// A value stored in the attribute bag of a [`ServerRequest`].
pub type Attribute = Arc<dyn Any + Send + Sync>;

/// Uploaded files keyed by form field name.
pub type UploadedFiles = BTreeMap<String, UploadedFileNode>;

/// Query or form parameters. Repeated `name[]` fields become arrays and `name[key]`
/// fields become nested objects, other values are strings.
pub type Params = Map<String, Value>;

/// A leaf file, a nested group of fields as produced by `field[a][b]` style names, or the
/// files of a `field[]` upload in submission order.
#[derive(Debug, Clone)]
pub enum UploadedFileNode {
    File(Arc<UploadedFile>),
    Nested(UploadedFiles),
    List(Vec<UploadedFileNode>),
}

impl UploadedFileNode {
    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            UploadedFileNode::File(file) => Some(file),
            _ => None,
        }
    }

    pub fn as_nested(&self) -> Option<&UploadedFiles> {
        match self {
            UploadedFileNode::Nested(files) => Some(files),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[UploadedFileNode]> {
        match self {
            UploadedFileNode::List(files) => Some(files),
            _ => None,
        }
    }
}

impl From<UploadedFile> for UploadedFileNode {
    fn from(file: UploadedFile) -> Self {
        Self::File(Arc::new(file))
    }
}

/// An incoming request as seen by the server, with its environment snapshot.
#[derive(Clone)]
pub struct ServerRequest {
    request: Request,
    server_params: Arc<HashMap<String, String>>,
    cookie_params: HashMap<String, String>,
    query_params: Params,
    parsed_body: Option<Value>,
    uploaded_files: UploadedFiles,
    attributes: HashMap<String, Attribute>,
}

impl ServerRequest {
    pub fn new(method: &str, uri: impl IntoUri) -> Result<Self, ValidationError> {
        Self::builder().method(method).uri(uri).build()
    }

    pub fn builder() -> ServerRequestBuilder {
        ServerRequestBuilder::new()
    }

    pub fn from_request(request: Request, server_params: HashMap<String, String>) -> Self {
        Self {
            request,
            server_params: Arc::new(server_params),
            cookie_params: HashMap::new(),
            query_params: Params::new(),
            parsed_body: None,
            uploaded_files: UploadedFiles::new(),
            attributes: HashMap::new(),
        }
    }

    pub fn server_params(&self) -> &HashMap<String, String> {
        &self.server_params
    }

    pub fn server_param(&self, name: &str) -> Option<&str> {
        self.server_params.get(name).map(String::as_str)
    }

    pub fn cookie_params(&self) -> &HashMap<String, String> {
        &self.cookie_params
    }

    pub fn with_cookie_params(&self, cookies: HashMap<String, String>) -> Self {
        let mut new = self.clone();
        new.cookie_params = cookies;
        new
    }

    pub fn query_params(&self) -> &Params {
        &self.query_params
    }

    pub fn with_query_params(&self, query: Params) -> Self {
        let mut new = self.clone();
        new.query_params = query;
        new
    }

    pub fn uploaded_files(&self) -> &UploadedFiles {
        &self.uploaded_files
    }

    pub fn with_uploaded_files(&self, files: UploadedFiles) -> Self {
        let mut new = self.clone();
        new.uploaded_files = files;
        new
    }

    pub fn parsed_body(&self) -> Option<&Value> {
        self.parsed_body.as_ref()
    }

    /// Accepts an array, an object, or nothing (`None` or `Value::Null`).
    pub fn with_parsed_body(&self, data: Option<Value>) -> Result<Self, ValidationError> {
        let data = match data {
            None | Some(Value::Null) => None,
            Some(value @ (Value::Array(_) | Value::Object(_))) => Some(value),
            Some(Value::Bool(_)) => return Err(ValidationError::InvalidParsedBody { kind: "boolean" }),
            Some(Value::Number(_)) => return Err(ValidationError::InvalidParsedBody { kind: "number" }),
            Some(Value::String(_)) => return Err(ValidationError::InvalidParsedBody { kind: "string" }),
        };
        let mut new = self.clone();
        new.parsed_body = data;
        Ok(new)
    }

    pub fn attributes(&self) -> &HashMap<String, Attribute> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// The attribute `name` if it holds a `T`.
    pub fn attribute_as<T: Any>(&self, name: &str) -> Option<&T> {
        self.attributes.get(name).and_then(|value| value.downcast_ref::<T>())
    }

    pub fn with_attribute<T: Any + Send + Sync>(&self, name: &str, value: T) -> Self {
        let mut new = self.clone();
        new.attributes.insert(name.to_string(), Arc::new(value));
        new
    }

    pub fn without_attribute(&self, name: &str) -> Self {
        let mut new = self.clone();
        new.attributes.remove(name);
        new
    }

    /// Drops the server side state and keeps the plain request.
    pub fn into_request(self) -> Request {
        self.request
    }
}

impl fmt::Debug for ServerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut attributes: Vec<&str> = self.attributes.keys().map(String::as_str).collect();
        attributes.sort_unstable();

        f.debug_struct("ServerRequest")
            .field("request", &self.request)
            .field("server_params", &self.server_params)
            .field("cookie_params", &self.cookie_params)
            .field("query_params", &self.query_params)
            .field("parsed_body", &self.parsed_body)
            .field("uploaded_files", &self.uploaded_files)
            .field("attributes", &attributes)
            .finish()
    }
}

impl HasHead for ServerRequest {
    fn head(&self) -> &MessageHead {
        self.request.head()
    }

    fn head_mut(&mut self) -> &mut MessageHead {
        self.request.head_mut()
    }
}

impl HasRequestLine for ServerRequest {
    fn line(&self) -> &RequestLine {
        self.request.line()
    }

    fn line_mut(&mut self) -> &mut RequestLine {
        self.request.line_mut()
    }
}

impl Message for ServerRequest {}

impl RequestMessage for ServerRequest {}

#[derive(Debug)]
pub struct ServerRequestBuilder {
    request: RequestBuilder,
    server_params: HashMap<String, String>,
}

impl ServerRequestBuilder {
    fn new() -> Self {
        Self { request: Request::builder(), server_params: HashMap::new() }
    }

    pub fn method(mut self, method: &str) -> Self {
        self.request = self.request.method(method);
        self
    }

    pub fn uri(mut self, uri: impl IntoUri) -> Self {
        self.request = self.request.uri(uri);
        self
    }

    pub fn header(mut self, name: &str, values: impl IntoHeaderValues) -> Self {
        self.request = self.request.header(name, values);
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.request = self.request.body(body);
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.request = self.request.version(version);
        self
    }

    pub fn server_params(mut self, params: HashMap<String, String>) -> Self {
        self.server_params = params;
        self
    }

    pub fn server_param(mut self, name: &str, value: &str) -> Self {
        self.server_params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> Result<ServerRequest, ValidationError> {
        Ok(ServerRequest::from_request(self.request.build()?, self.server_params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::UploadErrorCode;
    use crate::stream::Stream;
    use serde_json::json;

    fn request() -> ServerRequest {
        ServerRequest::builder()
            .method("get")
            .uri("http://example.com/path?a=1")
            .server_param("REMOTE_ADDR", "127.0.0.1")
            .build()
            .unwrap()
    }

    #[test]
    fn request_line_and_host() {
        let request = request();

        assert_eq!(request.method(), "GET");
        assert_eq!(request.request_target(), "/path?a=1");
        assert_eq!(request.header_line("Host"), "example.com");
        assert_eq!(request.server_param("REMOTE_ADDR"), Some("127.0.0.1"));
        assert_eq!(request.server_param("missing"), None);
    }

    #[test]
    fn params_are_replaced_wholesale() {
        let request = request();
        let cookies = HashMap::from([("session".to_string(), "abc".to_string())]);
        let query = Params::from_iter([("page".to_string(), json!("2")), ("tags".to_string(), json!(["a", "b"]))]);

        let changed = request.with_cookie_params(cookies.clone()).with_query_params(query.clone());

        assert_eq!(changed.cookie_params(), &cookies);
        assert_eq!(changed.query_params(), &query);
        assert!(request.cookie_params().is_empty());
        assert!(request.query_params().is_empty());
        assert_eq!(changed.server_params(), request.server_params());
    }

    #[test]
    fn parsed_body_accepts_arrays_objects_and_nothing() {
        let request = request();

        let with_object = request.with_parsed_body(Some(json!({"name": "value"}))).unwrap();
        assert_eq!(with_object.parsed_body(), Some(&json!({"name": "value"})));

        let with_array = request.with_parsed_body(Some(json!([1, 2]))).unwrap();
        assert_eq!(with_array.parsed_body(), Some(&json!([1, 2])));

        assert!(with_object.with_parsed_body(Some(Value::Null)).unwrap().parsed_body().is_none());
        assert!(with_object.with_parsed_body(None).unwrap().parsed_body().is_none());

        assert_eq!(
            request.with_parsed_body(Some(json!("text"))).unwrap_err(),
            ValidationError::InvalidParsedBody { kind: "string" }
        );
        assert!(request.with_parsed_body(Some(json!(1))).is_err());
        assert!(request.with_parsed_body(Some(json!(true))).is_err());
    }

    #[test]
    fn attributes() {
        let request = request();
        let with = request.with_attribute("user_id", 42_u32).with_attribute("role", "admin".to_string());

        assert_eq!(with.attribute_as::<u32>("user_id"), Some(&42));
        assert_eq!(with.attribute_as::<String>("role").map(String::as_str), Some("admin"));
        assert_eq!(with.attribute_as::<i64>("user_id"), None);
        assert!(request.attribute("user_id").is_none());

        let without = with.without_attribute("user_id").without_attribute("missing");
        assert!(without.attribute("user_id").is_none());
        assert_eq!(without.attributes().len(), 1);
        assert!(format!("{without:?}").contains("role"));
    }

    #[test]
    fn uploaded_files_tree() {
        let avatar = UploadedFile::new(Stream::from("png"), Some(3), UploadErrorCode::Ok);
        let doc = UploadedFile::new(Stream::from("pdf"), Some(3), UploadErrorCode::Ok);
        let nested = UploadedFiles::from([("doc".to_string(), UploadedFileNode::from(doc))]);
        let files = UploadedFiles::from([
            ("avatar".to_string(), UploadedFileNode::from(avatar)),
            ("documents".to_string(), UploadedFileNode::Nested(nested)),
        ]);

        let request = request().with_uploaded_files(files);

        let avatar = request.uploaded_files()["avatar"].as_file().unwrap();
        assert_eq!(avatar.stream().unwrap().to_string(), "png");

        let documents = request.uploaded_files()["documents"].as_nested().unwrap();
        assert_eq!(documents["doc"].as_file().unwrap().size(), Some(3));
    }

    #[test]
    fn message_operations_carry_server_state() {
        let request = request().with_attribute("k", 1_u8);
        let changed = request.with_header("X-Test", "1").unwrap().with_method("post").unwrap();

        assert_eq!(changed.method(), "POST");
        assert_eq!(changed.attribute_as::<u8>("k"), Some(&1));
        assert!(!request.has_header("x-test"));
        assert_eq!(changed.into_request().header_line("x-test"), "1");
    }
}
