//! Source for lock data from a Nuki bridge
use std::fmt;
use std::time::Duration;

use nuki_common::nuki::{LockList, LockRecord};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tap::Pipe;
use thiserror::Error;
use tracing::debug;

const fn default_port() -> u16 {
    8080
}

const fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Where to find the bridge and how to talk to it.
#[derive(Deserialize, Clone)]
pub struct Config {
    /// IP address or host name of the bridge. Nothing is fetched while empty.
    #[serde(default)]
    pub bridge_ip: String,

    /// Port of the bridge HTTP API
    #[serde(default = "default_port")]
    pub bridge_port: u16,

    /// API token configured on the bridge
    #[serde(default)]
    pub token: String,

    /// Name used for the top level of the state tree, defaults to the IP address
    #[serde(default)]
    pub bridge_name: Option<String>,

    /// Give up on a request after this long
    #[serde(default = "default_timeout", with = "crate::serde::with_seconds")]
    pub timeout: Duration,
}

impl Config {
    /// Create a config with default port and timeout.
    #[must_use]
    pub fn new(bridge_ip: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            bridge_ip: bridge_ip.into(),
            bridge_port: default_port(),
            token: token.into(),
            bridge_name: None,
            timeout: default_timeout(),
        }
    }

    /// The namespace the locks of this bridge are mirrored under.
    ///
    /// This is the bridge name, or the IP address if there is no name, with
    /// dots replaced so it stays a single path component.
    #[must_use]
    pub fn namespace(&self) -> String {
        let name = self
            .bridge_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.bridge_ip.trim());
        name.replace('.', "_")
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bridge_ip", &self.bridge_ip)
            .field("bridge_port", &self.bridge_port)
            .field("token", &"<redacted>")
            .field("bridge_name", &self.bridge_name)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Error talking to the bridge
#[derive(Error, Debug)]
pub enum Error {
    /// The bridge address is missing or invalid, nothing was requested.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The request could not be completed.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The bridge answered with something other than 200.
    #[error("Bridge returned HTTP status {0}")]
    Status(StatusCode),

    /// The bridge answered with an empty body.
    #[error("Bridge returned no content")]
    EmptyResponse,

    /// The body was not a list of locks.
    #[error("Invalid lock list: {0}")]
    Parse(String),
}

impl Error {
    /// Is this a problem with what we asked for rather than a failure?
    ///
    /// These are worth a warning, everything else is an error.
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(self, Error::Config(_) | Error::EmptyResponse)
    }
}

/// Fetch the list of locks from a bridge.
pub struct BridgeClient {
    client: reqwest::Client,
    host: String,
    port: u16,
    token: String,
}

impl BridgeClient {
    /// Create a client for the bridge described by `config`.
    ///
    /// # Errors
    ///
    /// If the HTTP client cannot be created.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            host: config.bridge_ip.trim().to_string(),
            port: config.bridge_port,
            token: config.token.clone(),
        })
    }

    /// The URL of the lock list, safe to log.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}:{}/list?token=<redacted>", self.host, self.port)
    }

    fn list_url(&self) -> Result<Url, Error> {
        if self.host.is_empty() {
            return Err(Error::Config("no bridge address configured".to_string()));
        }

        let base = format!("http://{}:{}/list", self.host, self.port);
        Url::parse_with_params(&base, &[("token", &self.token)]).map_err(|e| {
            Error::Config(format!(
                "invalid bridge address {}:{}: {e}",
                self.host, self.port
            ))
        })
    }

    /// Request the list of locks known to the bridge.
    ///
    /// Either every lock in the response is returned or an error, never part
    /// of the list.
    ///
    /// # Errors
    ///
    /// If the address is not configured, the request fails, the bridge does
    /// not answer with 200, or the body is empty or not a list of locks.
    #[tracing::instrument(skip(self), fields(url = %self.url()))]
    pub async fn fetch_locks(&self) -> Result<Vec<LockRecord>, Error> {
        let url = self.list_url()?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::Status(status));
        }

        let payload = response
            .text()
            .await
            .map_err(reqwest::Error::without_url)?;
        if payload.trim().is_empty() {
            return Err(Error::EmptyResponse);
        }

        let list = decode_lock_list(&payload)?;
        debug!("Bridge returned {} locks", list.len());
        list.into_records().pipe(Ok)
    }
}

/// Decode the body of a `/list` response.
///
/// # Errors
///
/// If the body is not an array or object of locks. The error names the
/// offending JSON path.
pub fn decode_lock_list(payload: &str) -> Result<LockList, Error> {
    let d = &mut serde_json::Deserializer::from_str(payload);
    let list: LockList =
        serde_path_to_error::deserialize(&mut *d).map_err(|e| Error::Parse(e.to_string()))?;
    d.end().map_err(|e| Error::Parse(e.to_string()))?;
    Ok(list)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("192.168.1.10", None, "192_168_1_10")]
    #[case("192.168.1.10", Some(""), "192_168_1_10")]
    #[case("192.168.1.10", Some("  "), "192_168_1_10")]
    #[case("192.168.1.10", Some("hall.way"), "hall_way")]
    #[case("nuki.local", Some("Hallway"), "Hallway")]
    #[case("", None, "")]
    fn test_namespace(#[case] ip: &str, #[case] name: Option<&str>, #[case] expected: &str) {
        let mut config = Config::new(ip, "abc123");
        config.bridge_name = name.map(ToString::to_string);
        assert_eq!(config.namespace(), expected);
    }

    #[test]
    fn test_config_defaults() {
        let config: Config =
            serde_yml::from_str("bridge_ip: 192.168.1.10\ntoken: abc123\n").unwrap();
        assert_eq!(config.bridge_port, 8080);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.bridge_name, None);
    }

    #[test]
    fn test_debug_hides_token() {
        let config = Config::new("192.168.1.10", "abc123");
        let string = format!("{config:?}");
        assert!(!string.contains("abc123"));
    }

    #[test]
    fn test_url() {
        let mut config = Config::new("192.168.1.10", "abc 123");
        config.bridge_port = 8080;
        let client = BridgeClient::new(&config).unwrap();
        assert_eq!(
            client.list_url().unwrap().as_str(),
            "http://192.168.1.10:8080/list?token=abc+123"
        );
        assert_eq!(
            client.url(),
            "http://192.168.1.10:8080/list?token=<redacted>"
        );
    }

    #[tokio::test]
    async fn test_no_address() {
        let config = Config::new("  ", "abc123");
        let client = BridgeClient::new(&config).unwrap();
        let err = client.fetch_locks().await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.is_warning());
    }

    #[test]
    fn test_decode_trailing_garbage() {
        let err = decode_lock_list("[] []").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_decode_reports_path() {
        let json = r#"[{"id": "1", "name": "x", "lastKnownState": {"state": "one", "stateName": "a", "batteryCritical": false, "timestamp": "t"}}]"#;
        let err = decode_lock_list(json).unwrap_err();
        assert!(err.to_string().contains("[0].lastKnownState.state"));
    }

    #[test]
    fn test_decode_rejects_id_clashing_with_leaf() {
        let lock = |id: &str| {
            format!(
                r#"{{"id": "{id}", "name": "x", "lastKnownState": {{"state": 1, "stateName": "locked", "batteryCritical": false, "timestamp": "t"}}}}"#
            )
        };
        let json = format!("[{}, {}]", lock("1.state"), lock("1"));
        let err = decode_lock_list(&json).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert!(err.to_string().contains(r#"invalid lock id "1.state""#), "{err}");
    }
}
