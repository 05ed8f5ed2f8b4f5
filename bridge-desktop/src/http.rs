//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse},
};
use reqwest::{redirect, Client};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::time::Duration;
use tracing::debug;

/// Transport settings for [`ReqwestHttpClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Whole-request timeout
    pub timeout: Duration,
    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,
    /// Identifying client string sent with every request
    pub user_agent: String,
    /// Redirects followed before giving up
    pub max_redirects: usize,
    /// Disable certificate verification. Off unless a host explicitly opts in.
    pub accept_invalid_certs: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("gamemeta/", env!("CARGO_PKG_VERSION")).to_string(),
            max_redirects: 10,
            accept_invalid_certs: false,
        }
    }
}

/// Reqwest-based HTTP client implementation
///
/// Provides HTTP operations with:
/// - Connection pooling via reqwest
/// - Single-attempt `execute`; callers own retry and backoff
/// - TLS verification by default, failures reported per host
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client from transport settings
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(4)
            .user_agent(config.user_agent)
            .redirect(redirect::Policy::limited(config.max_redirects))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| {
                BridgeError::NotAvailable(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Self::new(HttpClientConfig {
            timeout,
            ..HttpClientConfig::default()
        })
    }

    /// Wrap an already configured reqwest client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Convert bridge HttpMethod to reqwest Method
    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }

    /// Build reqwest request from bridge request
    fn build_request(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        for (key, value) in request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = request.body {
            req = req.body(body);
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    async fn send_once(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = without_query(&request.url);
        debug!(method = ?request.method, url = %url, "Executing HTTP request");
        let response = self
            .build_request(request)
            .send()
            .await
            .map_err(|e| classify_error(&url, e))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        let body = response.bytes().await.map_err(|e| classify_error(&url, e))?;
        debug!(status, bytes = body.len(), url = %url, "HTTP response received");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Map a reqwest failure onto the bridge error taxonomy.
///
/// `url` must already be stripped of its query; reqwest's own copy of the
/// URL is dropped so credentials passed as query parameters never reach an
/// error message.
fn classify_error(url: &str, error: reqwest::Error) -> BridgeError {
    let error = error.without_url();
    if error.is_timeout() {
        return BridgeError::Timeout(url.to_string());
    }

    if is_tls_failure(&error) {
        return BridgeError::TlsVerification {
            host: host_of(url),
            message: error.to_string(),
        };
    }

    if error.is_connect() {
        return BridgeError::ConnectionFailed(format!("{}: {}", url, error));
    }

    if error.is_redirect() {
        return BridgeError::OperationFailed(format!("Too many redirects for {}", url));
    }

    BridgeError::OperationFailed(error.to_string())
}

fn is_tls_failure(error: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = error.source();
    while let Some(inner) = source {
        let text = inner.to_string().to_ascii_lowercase();
        if text.contains("certificate") || text.contains("tls") || text.contains("handshake") {
            return true;
        }
        source = inner.source();
    }
    false
}

/// Scheme, host and path of `url`. Query and fragment are dropped.
fn without_query(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

fn host_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.send_once(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_client_creation() {
        let client = ReqwestHttpClient::new(HttpClientConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Get),
            reqwest::Method::GET
        );
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Head),
            reqwest::Method::HEAD
        );
    }

    #[test]
    fn test_default_config_verifies_tls() {
        let config = HttpClientConfig::default();
        assert!(!config.accept_invalid_certs);
        assert!(config.user_agent.starts_with("gamemeta/"));
    }

    #[test]
    fn test_host_extraction() {
        assert_eq!(host_of("https://api.thegamesdb.net/v1/Games"), "api.thegamesdb.net");
        assert_eq!(host_of("not a url"), "not a url");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transient() {
        let client = ReqwestHttpClient::new(HttpClientConfig {
            timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(1),
            ..HttpClientConfig::default()
        })
        .unwrap();

        // Port 9 on localhost is the discard service and is closed on test hosts.
        let err = client
            .execute(HttpRequest::get("http://127.0.0.1:9/"))
            .await
            .unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
    }

    #[test]
    fn test_query_is_stripped_from_logged_urls() {
        assert_eq!(
            without_query("https://api.example.net/v1/Games/ByGameName?apikey=SECRETKEY123&name=Halo"),
            "https://api.example.net/v1/Games/ByGameName"
        );
        assert_eq!(without_query("not a url?apikey=SECRETKEY123"), "not a url");
    }

    #[tokio::test]
    async fn test_connection_error_omits_query_credentials() {
        let client = ReqwestHttpClient::new(HttpClientConfig {
            timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(1),
            ..HttpClientConfig::default()
        })
        .unwrap();

        let err = client
            .execute(HttpRequest::get("http://127.0.0.1:9/v1/Games?apikey=SECRETKEY123&name=Halo"))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(!message.contains("SECRETKEY123"), "credential leaked: {message}");
        assert!(!message.contains("apikey"), "query leaked: {message}");
    }
}
