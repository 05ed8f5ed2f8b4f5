//! Rate-limited HTTP access shared by the adapters.

use super::{classify_status, parse_retry_after, SourceFailure, SourceSettings};
use crate::rate_limit::RateLimiter;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_runtime::logging::redact_url_secrets;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest pause a `Retry-After` header can impose.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// One source's view of the network: identifying user agent, per-request
/// timeout and a rate limiter that backs off after failures.
pub struct SourceTransport {
    source_id: String,
    http: Arc<dyn HttpClient>,
    limiter: RateLimiter,
    user_agent: String,
    request_timeout: Duration,
    transient_backoff: Duration,
}

impl SourceTransport {
    pub fn new(
        source_id: impl Into<String>,
        http: Arc<dyn HttpClient>,
        settings: &SourceSettings,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            http,
            limiter: RateLimiter::new(settings.min_delay),
            user_agent: settings.user_agent.clone(),
            request_timeout: settings.request_timeout,
            transient_backoff: settings.transient_backoff,
        }
    }

    /// Send one request and return the response whatever its status.
    ///
    /// Transport errors come back classified. Failed and throttled requests
    /// push the next request of this source back by the transient backoff
    /// (or the server's `Retry-After`, if longer).
    pub async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        accept: &str,
    ) -> Result<HttpResponse, SourceFailure> {
        self.limiter.wait_if_needed().await;

        debug!(source = %self.source_id, url = %redact_url_secrets(url), "Requesting");

        let request = HttpRequest::new(method, url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", accept)
            .timeout(self.request_timeout);

        let response = match self.http.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                let failure = SourceFailure::from(e);
                if matches!(failure, SourceFailure::Transient(_)) {
                    self.limiter.penalize(self.transient_backoff).await;
                }
                warn!(source = %self.source_id, error = %failure, "Request failed");
                return Err(failure);
            }
        };

        if response.status == 429 {
            let wait = parse_retry_after(&response)
                .unwrap_or(self.transient_backoff)
                .max(self.transient_backoff)
                .min(MAX_RETRY_AFTER);
            self.limiter.penalize(wait).await;
        } else if response.is_server_error() || response.status == 408 {
            self.limiter.penalize(self.transient_backoff).await;
        }

        Ok(response)
    }

    /// GET and require a 2xx status.
    pub async fn get_ok(&self, url: &str, accept: &str) -> Result<HttpResponse, SourceFailure> {
        let response = self.send(HttpMethod::Get, url, accept).await?;
        classify_status(&response)?;
        Ok(response)
    }

    /// GET a page and decode it as text.
    pub async fn get_text(&self, url: &str) -> Result<String, SourceFailure> {
        let response = self.get_ok(url, "text/html,application/xhtml+xml").await?;
        Ok(String::from_utf8_lossy(&response.body).into_owned())
    }
}
