use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Client options, loadable from JSON. Missing fields take their defaults.
///
/// ```
/// use micro_client::ClientConfig;
///
/// let config = ClientConfig::from_json(r#"{ "timeout_secs": 5, "user_agent": "agent/1.0" }"#).unwrap();
/// assert_eq!(config.timeout(), Some(std::time::Duration::from_secs(5)));
/// assert!(config.follow_redirects);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Certificate authority bundle, required before any `https` request is made
    #[serde(default)]
    pub ca_bundle: Option<PathBuf>,
    /// Applies to connect, read and write separately, `0` disables it
    #[serde(default)]
    pub timeout_secs: u64,
    #[serde(default = "default_follow_redirects")]
    pub follow_redirects: bool,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub referer: Option<String>,
}

fn default_follow_redirects() -> bool {
    true
}

fn default_max_redirects() -> usize {
    10
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ca_bundle: None,
            timeout_secs: 0,
            follow_redirects: default_follow_redirects(),
            max_redirects: default_max_redirects(),
            user_agent: None,
            referer: None,
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self, ClientError> {
        serde_json::from_str(json).map_err(|e| ClientError::configuration(format!("invalid client config: {e}")))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ClientError::configuration(format!("failed to read config from {}: {e}", path.display())))?;
        Self::from_json(&content)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn with_ca_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_bundle = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// The bundle path when it points at an existing file.
    pub(crate) fn usable_ca_bundle(&self) -> Option<&Path> {
        self.ca_bundle.as_deref().filter(|path| path.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert!(config.follow_redirects);
        assert_eq!(config.max_redirects, 10);
        assert_eq!(config.timeout(), None);
        assert_eq!(ClientConfig::from_json("{}").unwrap(), config);
    }

    #[test]
    fn from_json() {
        let config = ClientConfig::from_json(
            r#"{ "ca_bundle": "/etc/ssl/cert.pem", "follow_redirects": false, "max_redirects": 3, "referer": "http://a/" }"#,
        )
        .unwrap();

        assert_eq!(config.ca_bundle.as_deref(), Some(Path::new("/etc/ssl/cert.pem")));
        assert!(!config.follow_redirects);
        assert_eq!(config.max_redirects, 3);
        assert_eq!(config.referer.as_deref(), Some("http://a/"));

        assert!(matches!(ClientConfig::from_json("[1]"), Err(ClientError::Configuration { .. })));
    }

    #[test]
    fn fluent_setters() {
        let config = ClientConfig::default()
            .with_timeout(Duration::from_millis(2500))
            .with_user_agent("agent")
            .with_follow_redirects(false)
            .with_max_redirects(1);

        assert_eq!(config.timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.user_agent.as_deref(), Some("agent"));
        assert!(!config.follow_redirects);
        assert_eq!(config.max_redirects, 1);
    }

    #[test]
    fn ca_bundle_must_exist() {
        let missing = ClientConfig::default().with_ca_bundle("/definitely/not/here.pem");
        assert!(missing.usable_ca_bundle().is_none());

        let path = std::env::temp_dir().join(format!("micro-client-ca-{}.pem", std::process::id()));
        fs::write(&path, "-----BEGIN CERTIFICATE-----").unwrap();
        assert_eq!(ClientConfig::default().with_ca_bundle(&path).usable_ca_bundle(), Some(path.as_path()));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join(format!("micro-client-config-{}.json", std::process::id()));
        fs::write(&path, r#"{ "timeout_secs": 9 }"#).unwrap();
        assert_eq!(ClientConfig::load(&path).unwrap().timeout_secs, 9);
        fs::remove_file(&path).unwrap();

        assert!(ClientConfig::load(&path).is_err());
    }
}
