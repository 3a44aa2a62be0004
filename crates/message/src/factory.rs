//! Creation helpers for every message type, and the server request builder that turns
//! a CGI style environment into a [`ServerRequest`].
//!
//! The environment is always passed in explicitly as a [`ServerEnvironment`], nothing
//! here reads process state.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{HttpError, StreamError, ValidationError};
use crate::message::{Message, Params, Request, Response, ServerRequest, UploadedFileNode, UploadedFiles};
use crate::stream::{Body, OpenMode, Stream};
use crate::upload::{UploadErrorCode, UploadedFile};
use crate::uri::{IntoUri, Uri};

const FILE_SPEC_FIELDS: [&str; 5] = ["tmp_name", "size", "error", "name", "type"];

/// The request environment of a CGI style server.
///
/// `server` holds the server variables (`REQUEST_METHOD`, `HTTP_HOST`, `REQUEST_URI`, ...),
/// `files` the upload tree in the usual `name`/`type`/`tmp_name`/`error`/`size` layout.
/// Headers default to the `HTTP_*` server variables when `headers` is empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerEnvironment {
    pub server: HashMap<String, String>,
    pub headers: Vec<(String, String)>,
    pub cookies: HashMap<String, String>,
    pub query: Option<Params>,
    pub post: Option<Value>,
    pub files: Value,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Factory;

impl Factory {
    pub fn new() -> Self {
        Self
    }

    pub fn create_request(&self, method: &str, uri: impl IntoUri) -> Result<Request, ValidationError> {
        Request::new(method, uri)
    }

    /// An empty `reason` selects the standard phrase of `code`.
    pub fn create_response(&self, code: u16, reason: &str) -> Result<Response, ValidationError> {
        Response::builder().status(code).reason(reason).build()
    }

    pub fn create_server_request(
        &self,
        method: &str,
        uri: impl IntoUri,
        server_params: HashMap<String, String>,
    ) -> Result<ServerRequest, ValidationError> {
        ServerRequest::builder().method(method).uri(uri).server_params(server_params).build()
    }

    pub fn create_stream(&self, content: &str) -> Stream {
        Stream::from(content)
    }

    pub fn create_stream_from_file(&self, path: impl AsRef<Path>, mode: &str) -> Result<Stream, HttpError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            let e = io::Error::new(io::ErrorKind::InvalidInput, "path cannot be empty");
            return Err(StreamError::open(path, e).into());
        }
        let mode = OpenMode::new(mode)?;
        Ok(Stream::open(path, &mode)?)
    }

    pub fn create_stream_from_file_handle(&self, file: File, mode: &str) -> Result<Stream, ValidationError> {
        Ok(Stream::from_file(file, OpenMode::new(mode)?))
    }

    /// The size defaults to the size of the stream.
    pub fn create_uploaded_file(
        &self,
        body: Body,
        size: Option<u64>,
        error: UploadErrorCode,
        client_filename: Option<String>,
        client_media_type: Option<String>,
    ) -> UploadedFile {
        let size = size.or_else(|| body.size());
        UploadedFile::new(body, size, error).with_client_info(client_filename, client_media_type)
    }

    pub fn create_uri(&self, uri: &str) -> Result<Uri, ValidationError> {
        uri.parse()
    }

    pub fn create_server_request_from_env(&self, env: &ServerEnvironment) -> Result<ServerRequest, HttpError> {
        let server = &env.server;
        let method = server.get("REQUEST_METHOD").map_or("GET", String::as_str);
        let version = server.get("SERVER_PROTOCOL").map_or("1.1", |protocol| protocol.trim_start_matches("HTTP/"));
        let uri = uri_from_server_params(server);

        let headers = if env.headers.is_empty() { headers_from_server_params(server) } else { env.headers.clone() };
        let mut builder = ServerRequest::builder().method(method).version(version).server_params(server.clone());
        for (name, value) in &headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = env.body.as_deref().filter(|body| !body.is_empty()) {
            builder = builder.body(body);
        }
        let request = builder.uri(&uri).build()?;

        let query = match &env.query {
            Some(query) => query.clone(),
            None => query_params_from_str(uri.query()),
        };
        let parsed_body = match &env.post {
            Some(post) => Some(post.clone()),
            None => parse_body(&request, env.body.as_deref().unwrap_or_default()),
        };

        debug!(method, uri = %uri, "server request created from environment");
        Ok(request
            .with_cookie_params(env.cookies.clone())
            .with_query_params(query)
            .with_parsed_body(parsed_body)?
            .with_uploaded_files(normalize_files(&env.files)?))
    }
}

/// Parses a query or form string into [`Params`].
///
/// `name[]=a&name[]=b` collects an array and `name[key]=v` a nested object, brackets may
/// be percent-encoded. A repeated name without a trailing `[]` keeps its last value.
pub fn query_params_from_str(query: &str) -> Params {
    let query = last_values_only(query);
    match serde_qs::from_str::<Params>(&query) {
        Ok(params) => params,
        Err(e) => {
            warn!(cause = %e, "falling back to flat query parameters");
            flat_params(&query)
        }
    }
}

fn last_values_only(query: &str) -> String {
    let pairs: Vec<(String, &str)> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (decode_brackets(key), value),
            None => (decode_brackets(pair), ""),
        })
        .collect();

    pairs
        .iter()
        .enumerate()
        .filter(|(i, (key, _))| key.ends_with("[]") || !pairs[i + 1..].iter().any(|(later, _)| later == key))
        .map(|(_, (key, value))| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn decode_brackets(key: &str) -> String {
    key.replace("%5B", "[").replace("%5b", "[").replace("%5D", "]").replace("%5d", "]")
}

fn flat_params(query: &str) -> Params {
    match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
        Ok(pairs) => pairs.into_iter().map(|(key, value)| (key, Value::String(value))).collect(),
        Err(e) => {
            warn!(cause = %e, "ignoring malformed query string");
            Params::new()
        }
    }
}

fn parse_body(request: &ServerRequest, body: &str) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    let content_type = request.header_line("Content-Type").to_ascii_lowercase();
    if content_type.starts_with("application/x-www-form-urlencoded") {
        return Some(Value::Object(query_params_from_str(body)));
    }
    if content_type.starts_with("application/json") {
        return match serde_json::from_str::<Value>(body) {
            Ok(value @ (Value::Array(_) | Value::Object(_))) => Some(value),
            Ok(_) => None,
            Err(e) => {
                warn!(cause = %e, "ignoring malformed json body");
                None
            }
        };
    }
    None
}

/// Builds the request URI from `HTTPS`, `HTTP_HOST`/`SERVER_NAME`/`SERVER_ADDR`,
/// `SERVER_PORT`, `REQUEST_URI` and `QUERY_STRING`.
pub fn uri_from_server_params(server: &HashMap<String, String>) -> Uri {
    let https = server.get("HTTPS").is_some_and(|value| !value.is_empty() && value != "off");
    let mut uri = Uri::new().with_scheme(if https { "https" } else { "http" });

    let mut has_port = false;
    if let Some(authority) = server.get("HTTP_HOST") {
        let (host, port) = split_authority(authority);
        if !host.is_empty() {
            uri = uri.with_host(host);
        }
        if port.is_some() {
            has_port = true;
            uri = uri.with_port(port);
        }
    } else if let Some(host) = server.get("SERVER_NAME").or_else(|| server.get("SERVER_ADDR")) {
        uri = uri.with_host(host);
    }

    if !has_port {
        if let Some(port) = server.get("SERVER_PORT") {
            match port.parse::<u16>() {
                Ok(port) => uri = uri.with_port(Some(port)),
                Err(e) => debug!(port = %port, cause = %e, "ignoring invalid SERVER_PORT"),
            }
        }
    }

    let mut has_query = false;
    if let Some(request_uri) = server.get("REQUEST_URI") {
        let (path, query) = match request_uri.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (request_uri.as_str(), None),
        };
        uri = uri.with_path(path);
        if let Some(query) = query {
            has_query = true;
            uri = uri.with_query(query);
        }
    }
    if !has_query {
        if let Some(query) = server.get("QUERY_STRING") {
            uri = uri.with_query(query);
        }
    }
    uri
}

/// Splits `host[:port]`, keeping the brackets of an IPv6 literal.
fn split_authority(authority: &str) -> (&str, Option<u16>) {
    let (host, port) = match authority.rfind(':') {
        Some(i) if !authority[i..].contains(']') => (&authority[..i], Some(&authority[i + 1..])),
        _ => (authority, None),
    };
    // a bare IPv6 address without brackets has no port
    if host.contains(':') && !host.starts_with('[') {
        return (authority, None);
    }
    (host, port.and_then(|port| port.parse().ok()))
}

/// Recovers request headers from `HTTP_*` server variables, plus `CONTENT_TYPE` and `CONTENT_LENGTH`.
pub fn headers_from_server_params(server: &HashMap<String, String>) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = server
        .iter()
        .filter_map(|(key, value)| {
            let name = match key.as_str() {
                "CONTENT_TYPE" | "CONTENT_LENGTH" | "CONTENT_MD5" => key.as_str(),
                _ => key.strip_prefix("HTTP_")?,
            };
            Some((header_case(name), value.clone()))
        })
        .collect();
    headers.sort();
    headers
}

fn header_case(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Normalizes an upload tree into [`UploadedFiles`]. Accepts `null` for no uploads.
pub fn normalize_files(files: &Value) -> Result<UploadedFiles, ValidationError> {
    match files {
        Value::Null => Ok(UploadedFiles::new()),
        Value::Object(map) => normalize_map(map),
        _ => Err(ValidationError::invalid_file_spec("the upload tree must be an object")),
    }
}

fn normalize_map(map: &Map<String, Value>) -> Result<UploadedFiles, ValidationError> {
    let mut normalized = UploadedFiles::new();
    for (key, value) in map {
        let node = match value {
            Value::Object(spec) => match spec.get("tmp_name") {
                Some(tmp_name) => file_from_spec(spec, tmp_name)?,
                None => UploadedFileNode::Nested(normalize_map(spec)?),
            },
            _ => return Err(ValidationError::invalid_file_spec(format!("field {key:?} is not an object"))),
        };
        normalized.insert(key.clone(), node);
    }
    Ok(normalized)
}

fn file_from_spec(spec: &Map<String, Value>, tmp_name: &Value) -> Result<UploadedFileNode, ValidationError> {
    let tmp_name = match tmp_name {
        Value::String(tmp_name) => tmp_name,
        Value::Array(_) | Value::Object(_) => return nested_file_spec(spec, tmp_name),
        _ => return Err(ValidationError::invalid_file_spec("tmp_name must be a string")),
    };

    let size = spec.get("size").and_then(as_u64);
    let error = UploadErrorCode::from_code(spec.get("error").and_then(as_i64).unwrap_or_default())?;
    let name = spec.get("name").and_then(Value::as_str).map(str::to_string);
    let media_type = spec.get("type").and_then(Value::as_str).map(str::to_string);

    let file = UploadedFile::new(PathBuf::from(tmp_name), size, error).with_client_info(name, media_type);
    Ok(UploadedFileNode::from(file))
}

/// A spec whose attributes are arrays (`name[]` fields) or objects (`name[key]` fields):
/// one file per entry of `tmp_name`, arrays keep their order.
fn nested_file_spec(spec: &Map<String, Value>, tmp_names: &Value) -> Result<UploadedFileNode, ValidationError> {
    match tmp_names {
        Value::Array(items) => {
            let files = (0..items.len()).map(|i| file_at(spec, &i.to_string())).collect::<Result<Vec<_>, _>>()?;
            Ok(UploadedFileNode::List(files))
        }
        Value::Object(map) => {
            let mut normalized = UploadedFiles::new();
            for key in map.keys() {
                normalized.insert(key.clone(), file_at(spec, key)?);
            }
            Ok(UploadedFileNode::Nested(normalized))
        }
        _ => Err(ValidationError::invalid_file_spec("tmp_name must be a string, an array or an object")),
    }
}

/// The file at `key` of every attribute array of `spec`.
fn file_at(spec: &Map<String, Value>, key: &str) -> Result<UploadedFileNode, ValidationError> {
    let mut sub_spec = Map::new();
    for field in FILE_SPEC_FIELDS {
        if let Some(value) = spec.get(field).and_then(|values| lookup(values, key)) {
            sub_spec.insert(field.to_string(), value.clone());
        }
    }
    match sub_spec.get("tmp_name") {
        Some(tmp_name) => file_from_spec(&sub_spec, tmp_name),
        None => Err(ValidationError::invalid_file_spec(format!("missing tmp_name for {key:?}"))),
    }
}

fn lookup<'a>(values: &'a Value, key: &str) -> Option<&'a Value> {
    match values {
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        Value::Object(map) => map.get(key),
        _ => None,
    }
}

// numbers may arrive as strings from form encoded environments
fn as_u64(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn as_i64(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}
