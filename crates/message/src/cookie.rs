//! `Set-Cookie` values and a per-request cookie jar.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use http::HeaderName;

use crate::error::{CookieError, ValidationError};
use crate::message::{Message, ServerRequest};
use crate::utils::ensure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SameSite {
    None,
    Lax,
    Strict,
}

impl SameSite {
    pub fn as_str(self) -> &'static str {
        match self {
            SameSite::None => "None",
            SameSite::Lax => "Lax",
            SameSite::Strict => "Strict",
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable cookie definition, rendered with [`Cookie::build`].
///
/// Defaults: empty value, path `/`, `HttpOnly`, not `Secure`, `SameSite=Lax`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    expiration: Option<SystemTime>,
    max_age: Option<u64>,
    path: String,
    domain: String,
    http_only: bool,
    secure: bool,
    same_site: Option<SameSite>,
}

impl Cookie {
    /// The name must be an RFC 7230 token.
    pub fn new(name: &str) -> Result<Self, CookieError> {
        ensure!(HeaderName::from_bytes(name.as_bytes()).is_ok(), CookieError::InvalidName { name: name.to_string() });
        Ok(Self {
            name: name.to_string(),
            value: String::new(),
            expiration: None,
            max_age: None,
            path: "/".to_string(),
            domain: String::new(),
            http_only: true,
            secure: false,
            same_site: Some(SameSite::Lax),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expiration(&self) -> Option<SystemTime> {
        self.expiration
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age.map(Duration::from_secs)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn is_http_only(&self) -> bool {
        self.http_only
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn same_site(&self) -> Option<SameSite> {
        self.same_site
    }

    #[must_use]
    pub fn with_value(&self, value: &str) -> Self {
        Self { value: value.to_string(), ..self.clone() }
    }

    #[must_use]
    pub fn with_expiration(&self, expiration: SystemTime) -> Self {
        Self { expiration: Some(expiration), ..self.clone() }
    }

    /// A zero duration removes the attribute.
    #[must_use]
    pub fn with_max_age(&self, max_age: Duration) -> Self {
        Self { max_age: Some(max_age.as_secs()).filter(|&secs| secs > 0), ..self.clone() }
    }

    /// An empty path removes the attribute.
    #[must_use]
    pub fn with_path(&self, path: &str) -> Self {
        Self { path: path.to_string(), ..self.clone() }
    }

    #[must_use]
    pub fn with_domain(&self, domain: &str) -> Self {
        Self { domain: domain.to_string(), ..self.clone() }
    }

    #[must_use]
    pub fn with_same_site(&self, same_site: Option<SameSite>) -> Self {
        Self { same_site, ..self.clone() }
    }

    #[must_use]
    pub fn with_http_only(&self, http_only: bool) -> Self {
        Self { http_only, ..self.clone() }
    }

    #[must_use]
    pub fn with_secure(&self, secure: bool) -> Self {
        Self { secure, ..self.clone() }
    }

    /// A copy that makes the client drop the cookie.
    #[must_use]
    pub fn expired(&self) -> Self {
        Self { value: String::new(), expiration: Some(UNIX_EPOCH + Duration::from_secs(1)), max_age: None, ..self.clone() }
    }

    /// Renders the `Set-Cookie` header value.
    ///
    /// `Expires` is only emitted without a `Max-Age`. `SameSite=None` requires `Secure`.
    pub fn build(&self) -> Result<String, CookieError> {
        ensure!(!(self.same_site == Some(SameSite::None) && !self.secure), CookieError::InsecureSameSiteNone);

        let mut parts = vec![format!("{}={}", self.name, urlencoding::encode(&self.value))];
        if let (Some(expiration), None) = (self.expiration, self.max_age) {
            parts.push(format!("Expires={}", httpdate::fmt_http_date(expiration)));
        }
        if let Some(max_age) = self.max_age {
            parts.push(format!("Max-Age={max_age}"));
        }
        if !self.domain.is_empty() {
            parts.push(format!("Domain={}", self.domain));
        }
        if !self.path.is_empty() {
            parts.push(format!("Path={}", self.path));
        }
        if self.secure {
            parts.push("Secure".to_string());
        }
        if self.http_only {
            parts.push("HttpOnly".to_string());
        }
        if let Some(same_site) = self.same_site {
            parts.push(format!("SameSite={same_site}"));
        }
        Ok(parts.join("; "))
    }
}

/// The cookies of one request plus the `Set-Cookie` headers queued for its response.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: HashMap<String, String>,
    queued: Vec<String>,
}

impl CookieJar {
    pub fn new(cookies: HashMap<String, String>) -> Self {
        Self { cookies, queued: Vec::new() }
    }

    pub fn from_request(request: &ServerRequest) -> Self {
        Self::new(request.cookie_params().clone())
    }

    pub fn has(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Queues `cookie` and records its value in the jar.
    pub fn set(&mut self, cookie: &Cookie) -> Result<(), CookieError> {
        let header = cookie.build()?;
        self.cookies.insert(cookie.name().to_string(), cookie.value().to_string());
        self.queued.push(header);
        Ok(())
    }

    /// Queues an expired cookie and forgets the current value.
    pub fn delete(&mut self, name: &str, domain: &str, path: &str) -> Result<(), CookieError> {
        let cookie = Cookie::new(name)?.with_domain(domain).with_path(path).with_http_only(false).expired();
        let header = cookie.build()?;
        self.cookies.remove(name);
        self.queued.push(header);
        Ok(())
    }

    /// The rendered `Set-Cookie` values, in the order they were queued.
    pub fn queued(&self) -> &[String] {
        &self.queued
    }

    /// Appends one `Set-Cookie` header per queued cookie to `message`.
    pub fn apply<M: Message>(&self, message: &M) -> Result<M, ValidationError> {
        if self.queued.is_empty() {
            return Ok(message.clone());
        }
        message.with_added_header("Set-Cookie", self.queued.clone())
    }
}
