//! HTTP client for the upstream REST API.
//!
//! Every call goes to one configured base URL. The client attaches the
//! caller's credential headers and a fixed `User-Agent`, enforces a request
//! timeout, and turns every transport or status failure into a
//! [`ClientError`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Request};
use scalegate_common::{HttpMethod, ProxyRequest};
use serde_json::Value;
use url::Url;

use crate::error::ClientError;
use crate::target;

/// Default total request timeout (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Identification header sent with every upstream request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Configuration for the upstream client.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use scalegate_client::UpstreamConfig;
///
/// let config = UpstreamConfig::new("https://scale.local/rest/v1")
///     .unwrap()
///     .with_timeout(Duration::from_secs(10));
/// assert!(!config.insecure_skip_tls_verify);
/// ```
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL every request path is joined onto.
    pub base_url: Url,
    /// Total request timeout (defaults to 30 seconds).
    pub timeout: Option<Duration>,
    /// Connection timeout (defaults to 10 seconds).
    pub connect_timeout: Option<Duration>,
    /// `User-Agent` override.
    pub user_agent: Option<String>,
    /// Accept any TLS certificate. Credentials are forwarded, so this is opt-in only.
    pub insecure_skip_tls_verify: bool,
}

impl UpstreamConfig {
    /// Creates a configuration with secure defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not a valid http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: target::parse_base_url(base_url)?,
            timeout: None,
            connect_timeout: None,
            user_agent: None,
            insecure_skip_tls_verify: false,
        })
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    #[must_use]
    pub const fn with_insecure_skip_tls_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_tls_verify = skip;
        self
    }
}

/// HTTP client bound to the upstream API.
///
/// The client is cheaply cloneable and can be shared across tasks.
#[derive(Clone)]
pub struct UpstreamClient {
    inner: Client,
    config: Arc<UpstreamConfig>,
}

impl UpstreamClient {
    /// Creates a new upstream client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new(config: UpstreamConfig) -> Result<Self, ClientError> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let client = Client::builder()
            .connect_timeout(config.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
            .timeout(config.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .user_agent(user_agent)
            .danger_accept_invalid_certs(config.insecure_skip_tls_verify)
            .build()
            .map_err(|e| ClientError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner: client,
            config: Arc::new(config),
        })
    }

    /// The configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    /// Sends one request and returns the parsed JSON body.
    ///
    /// An empty 2xx body yields `Value::Null`. The body is only sent for POST
    /// and PUT.
    ///
    /// # Errors
    ///
    /// - [`ClientError::InvalidPath`] if `path` is rejected (nothing is sent)
    /// - [`ClientError::Timeout`] if the upstream does not answer in time
    /// - [`ClientError::Network`] for connection, DNS or TLS failures
    /// - [`ClientError::HttpStatus`] for any non-2xx status
    /// - [`ClientError::InvalidResponse`] if a 2xx body is not JSON
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        headers: &BTreeMap<String, String>,
        body: Option<&Value>,
        query: Option<&BTreeMap<String, String>>,
    ) -> Result<Value, ClientError> {
        let request = self.build_request(method, path, headers, body, query)?;
        log::debug!("{method} {}", request.url().path());

        let response = self.inner.execute(request).await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            log::debug!("{method} {path} failed with HTTP {}", status.as_u16());
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    /// Sends a [`ProxyRequest`] with the given credential headers.
    ///
    /// # Errors
    ///
    /// See [`UpstreamClient::request`].
    pub async fn send(
        &self,
        request: &ProxyRequest,
        headers: &BTreeMap<String, String>,
    ) -> Result<Value, ClientError> {
        self.request(
            request.method,
            &request.path,
            headers,
            request.payload.as_ref(),
            request.query.as_ref(),
        )
        .await
    }

    /// Builds the outgoing request.
    ///
    /// This method:
    /// 1. Resolves the untrusted path against the base URL
    /// 2. Copies the credential headers
    /// 3. Attaches a JSON body only for POST and PUT
    fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        headers: &BTreeMap<String, String>,
        body: Option<&Value>,
        query: Option<&BTreeMap<String, String>>,
    ) -> Result<Request, ClientError> {
        let url = target::resolve(&self.config.base_url, path, query)?;

        let mut builder = self.inner.request(to_reqwest(method), url);
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if method.sends_body()
            && let Some(body) = body
        {
            builder = builder.json(body);
        }

        Ok(builder.build()?)
    }
}

const fn to_reqwest(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("base_url", &self.config.base_url.as_str())
            .field("timeout", &self.config.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .field(
                "insecure_skip_tls_verify",
                &self.config.insecure_skip_tls_verify,
            )
            .finish_non_exhaustive()
    }
}
