//! Engine configuration resolution.
//!
//! The remote payload is a JSON object describing the organization and
//! credentials. It is merged with the component's search options into a
//! [`Configuration`]. An empty, `null`, or malformed payload, or a failed
//! fetch, resolves to `None`: the session stays uninitialized and the
//! failure is only visible as a warning. There is no retry.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use caseassist_config::AppConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::BoxFuture;

/// Organization and credentials parsed from the remote payload.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfiguration {
    pub organization_id: String,
    pub access_token: String,
    #[serde(default)]
    pub platform_url: Option<String>,
    /// Anything else in the payload, passed through to the engine.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for RemoteConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfiguration")
            .field("organization_id", &self.organization_id)
            .field("access_token", &"[REDACTED]")
            .field("platform_url", &self.platform_url)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Component-supplied overrides applied on top of the remote payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub search_hub: String,
    pub pipeline: Option<String>,
    pub locale: String,
    pub timezone: String,
    /// Raw fields every search must return, so result templates can render.
    pub fields_to_include: Vec<String>,
}

impl SearchOptions {
    /// Options from the `[interface]` section of the app config. The fields
    /// to include come from the configured result templates.
    pub fn from_config(config: &AppConfig) -> Self {
        let fields_to_include = match config.build_template_selector() {
            Ok(selector) => selector
                .required_fields()
                .into_iter()
                .map(String::from)
                .collect(),
            Err(e) => {
                warn!(error = %e, "Invalid result templates; no extra fields requested");
                Vec::new()
            }
        };
        Self {
            search_hub: config.interface.search_hub.clone(),
            pipeline: config.interface.pipeline.clone(),
            locale: config.interface.locale.clone(),
            timezone: config.interface.timezone.clone(),
            fields_to_include,
        }
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// The configuration an engine session is constructed from. Immutable once
/// used.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub remote: RemoteConfiguration,
    pub search: SearchOptions,
}

/// Why a payload could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("configuration payload is empty")]
    Empty,

    #[error("configuration payload is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("configuration payload is missing {0}")]
    MissingField(&'static str),

    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration fetch failed: {0}")]
    Fetch(String),
}

/// Parse a remote configuration payload.
pub fn parse_configuration(payload: &str) -> Result<RemoteConfiguration, ResolveError> {
    let trimmed = payload.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(ResolveError::Empty);
    }
    let remote: RemoteConfiguration = serde_json::from_str(trimmed)?;
    if remote.organization_id.is_empty() {
        return Err(ResolveError::MissingField("organizationId"));
    }
    if remote.access_token.is_empty() {
        return Err(ResolveError::MissingField("accessToken"));
    }
    Ok(remote)
}

/// Where the raw configuration payload comes from.
pub trait ConfigSource: Send + Sync {
    /// Fetch the payload. `Ok(None)` means the backend returned nothing.
    fn fetch(&self) -> BoxFuture<'_, Result<Option<String>, ResolveError>>;
}

/// A payload known up front.
#[derive(Debug, Clone, Default)]
pub struct InlineConfigSource {
    payload: Option<String>,
}

impl InlineConfigSource {
    pub fn new(payload: Option<String>) -> Self {
        Self { payload }
    }
}

impl ConfigSource for InlineConfigSource {
    fn fetch(&self) -> BoxFuture<'_, Result<Option<String>, ResolveError>> {
        Box::pin(async move { Ok(self.payload.clone()) })
    }
}

/// Reads the payload from a local JSON file.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for FileConfigSource {
    fn fetch(&self) -> BoxFuture<'_, Result<Option<String>, ResolveError>> {
        Box::pin(async move {
            let content = tokio::fs::read_to_string(&self.path).await?;
            Ok(Some(content))
        })
    }
}

/// Fetches the payload from an HTTP endpoint.
pub struct HttpConfigSource {
    client: reqwest::Client,
    url: String,
}

impl HttpConfigSource {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
        }
    }
}

impl ConfigSource for HttpConfigSource {
    fn fetch(&self) -> BoxFuture<'_, Result<Option<String>, ResolveError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(&self.url)
                .send()
                .await
                .map_err(|e| ResolveError::Fetch(e.to_string()))?;
            if response.status() == reqwest::StatusCode::NO_CONTENT {
                return Ok(None);
            }
            let response = response
                .error_for_status()
                .map_err(|e| ResolveError::Fetch(e.to_string()))?;
            let body = response
                .text()
                .await
                .map_err(|e| ResolveError::Fetch(e.to_string()))?;
            Ok(Some(body))
        })
    }
}

/// Pick a source from the `[remote]` config section. A file wins over a URL;
/// with neither, the source yields nothing.
pub fn source_from_config(config: &AppConfig) -> Arc<dyn ConfigSource> {
    if let Some(path) = &config.remote.configuration_file {
        return Arc::new(FileConfigSource::new(path));
    }
    if let Some(url) = &config.remote.configuration_url {
        return Arc::new(HttpConfigSource::new(url));
    }
    Arc::new(InlineConfigSource::default())
}

/// Turns a [`ConfigSource`] payload into a [`Configuration`].
#[derive(Clone)]
pub struct ConfigResolver {
    source: Arc<dyn ConfigSource>,
}

impl ConfigResolver {
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self { source }
    }

    /// Fetch and parse the configuration for `engine_id`.
    ///
    /// Returns `None` on any failure, after logging a warning. Callers treat
    /// `None` as "not ready".
    pub async fn resolve(&self, engine_id: &str, overrides: &SearchOptions) -> Option<Configuration> {
        debug!(engine_id = %engine_id, "Fetching engine configuration");
        let payload = match self.source.fetch().await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                warn!(engine_id = %engine_id, "Configuration unavailable: empty response");
                return None;
            }
            Err(e) => {
                warn!(engine_id = %engine_id, error = %e, "Configuration unavailable");
                return None;
            }
        };

        match parse_configuration(&payload) {
            Ok(remote) => {
                info!(
                    engine_id = %engine_id,
                    organization = %remote.organization_id,
                    search_hub = %overrides.search_hub,
                    "Engine configuration resolved"
                );
                Some(Configuration {
                    remote,
                    search: overrides.clone(),
                })
            }
            Err(e) => {
                warn!(engine_id = %engine_id, error = %e, "Configuration unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const PAYLOAD: &str =
        r#"{"organizationId": "barcagroup", "accessToken": "xx-token", "renewAccessToken": false}"#;

    fn resolver(payload: Option<&str>) -> ConfigResolver {
        ConfigResolver::new(Arc::new(InlineConfigSource::new(payload.map(String::from))))
    }

    /// Answer one HTTP request with `status` and `body`; returns the URL.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/headless.json")
    }

    #[test]
    fn test_parse_configuration() {
        let remote = parse_configuration(PAYLOAD).unwrap();
        assert_eq!(remote.organization_id, "barcagroup");
        assert_eq!(remote.access_token, "xx-token");
        assert_eq!(remote.platform_url, None);
        assert_eq!(remote.extra["renewAccessToken"], Value::Bool(false));
    }

    #[test]
    fn test_parse_rejects_empty_and_malformed() {
        assert!(matches!(parse_configuration(""), Err(ResolveError::Empty)));
        assert!(matches!(parse_configuration(" null "), Err(ResolveError::Empty)));
        assert!(matches!(parse_configuration("{"), Err(ResolveError::Malformed(_))));
        assert!(matches!(parse_configuration("[]"), Err(ResolveError::Malformed(_))));
        assert!(matches!(
            parse_configuration(r#"{"organizationId": "", "accessToken": "t"}"#),
            Err(ResolveError::MissingField("organizationId"))
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let remote = parse_configuration(PAYLOAD).unwrap();
        let debug = format!("{remote:?}");
        assert!(!debug.contains("xx-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_resolve_applies_overrides() {
        let overrides = SearchOptions {
            search_hub: "CaseAssist_GenAI".to_string(),
            pipeline: Some("genai".to_string()),
            locale: "fr-CA".to_string(),
            timezone: "America/Montreal".to_string(),
            fields_to_include: vec!["objecttype".to_string()],
        };
        let config = resolver(Some(PAYLOAD)).resolve("e1", &overrides).await.unwrap();
        assert_eq!(config.search, overrides);
        assert_eq!(config.remote.organization_id, "barcagroup");
    }

    #[tokio::test]
    async fn test_resolve_empty_is_none() {
        let options = SearchOptions::default();
        assert!(resolver(None).resolve("e1", &options).await.is_none());
        assert!(resolver(Some("")).resolve("e1", &options).await.is_none());
        assert!(resolver(Some("{bad")).resolve("e1", &options).await.is_none());
    }

    #[tokio::test]
    async fn test_file_source() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("headless.json");
        tokio::fs::write(&path, PAYLOAD).await.unwrap();

        let resolver = ConfigResolver::new(Arc::new(FileConfigSource::new(&path)));
        let config = resolver.resolve("e1", &SearchOptions::default()).await;
        assert!(config.is_some());
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let resolver = ConfigResolver::new(Arc::new(FileConfigSource::new("/nonexistent/headless.json")));
        assert!(resolver.resolve("e1", &SearchOptions::default()).await.is_none());
    }

    #[test]
    fn test_source_from_config_defaults_to_empty() {
        let source = source_from_config(&AppConfig::default());
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let payload = rt.block_on(source.fetch()).unwrap();
        assert!(payload.is_none());
    }

    #[tokio::test]
    async fn test_http_source_ok() {
        let url = serve_once("200 OK", PAYLOAD).await;
        let resolver = ConfigResolver::new(Arc::new(HttpConfigSource::new(&url)));
        let config = resolver.resolve("e1", &SearchOptions::default()).await.unwrap();
        assert_eq!(config.remote.organization_id, "barcagroup");
    }

    #[tokio::test]
    async fn test_http_source_no_content() {
        let url = serve_once("204 No Content", "").await;
        let fetched = HttpConfigSource::new(&url).fetch().await.unwrap();
        assert_eq!(fetched, None);
    }

    #[tokio::test]
    async fn test_http_source_server_error() {
        let url = serve_once("500 Internal Server Error", "boom").await;
        let err = HttpConfigSource::new(&url).fetch().await.unwrap_err();
        assert!(matches!(err, ResolveError::Fetch(_)));

        let url = serve_once("500 Internal Server Error", "boom").await;
        let resolver = ConfigResolver::new(Arc::new(HttpConfigSource::new(&url)));
        assert!(resolver.resolve("e1", &SearchOptions::default()).await.is_none());
    }
}
