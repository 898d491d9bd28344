//! Outbound HTTP plumbing shared by the geocoding, measurement and forecast providers.
//!
//! Every upstream failure is classified once, here. Credential and rate-limit
//! rejections are fatal for the request that hit them; everything else
//! (timeouts, 5xx, malformed or empty bodies) is transient and callers degrade
//! it to "nothing found" for the probe that failed.

use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("{provider} rejected the request credentials")]
    Unauthorized { provider: &'static str },

    #[error("{provider} rate limit exceeded")]
    RateLimited { provider: &'static str },

    #[error("{provider} request failed: {reason}")]
    Transient { provider: &'static str, reason: String },
}

impl UpstreamError {
    pub fn transient(provider: &'static str, reason: impl Into<String>) -> Self {
        Self::Transient {
            provider,
            reason: reason.into(),
        }
    }

    /// Fatal errors abort the whole resolution instead of widening the search.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Transient { .. })
    }

    /// HTTP status to pass through to our own callers.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized { .. } => 401,
            Self::RateLimited { .. } => 429,
            Self::Transient { .. } => 502,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized { provider } => format!("Invalid {} API key.", provider),
            Self::RateLimited { provider } => {
                format!("Rate limited by {}. Try again soon.", provider)
            }
            Self::Transient { provider, .. } => format!("Upstream error from {}.", provider),
        }
    }
}

/// Turn a raw upstream result into a probe outcome.
///
/// `Ok(Some(_))` is a hit, `Ok(None)` a recoverable miss, `Err(_)` is always fatal.
pub fn probe<T>(result: Result<T, UpstreamError>) -> Result<Option<T>, UpstreamError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_fatal() => {
            tracing::warn!(error = %e, "fatal upstream failure");
            Err(e)
        }
        Err(e) => {
            tracing::debug!(error = %e, "treating transient upstream failure as empty");
            Ok(None)
        }
    }
}

/// A JSON-over-HTTP client bound to one provider's base URL.
#[derive(Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
    provider: &'static str,
    base_url: String,
    headers: Vec<(String, String)>,
}

impl HttpClient {
    pub fn new(provider: &'static str, base_url: &str, user_agent: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(user_agent)
            .build();
        Self {
            agent,
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers: vec![("Accept".into(), "application/json".into())],
        }
    }

    /// Attach a header sent with every request (e.g. an API key).
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.agent.get(&url);
        for (name, value) in &self.headers {
            request = request.set(name, value);
        }
        for (key, value) in query {
            request = request.query(key, value);
        }

        tracing::trace!(provider = self.provider, %url, "GET");
        let response = request.call().map_err(|e| classify(self.provider, e))?;

        response.into_json::<T>().map_err(|e| {
            UpstreamError::transient(self.provider, format!("malformed payload: {}", e))
        })
    }
}

fn classify(provider: &'static str, err: ureq::Error) -> UpstreamError {
    match err {
        ureq::Error::Status(401 | 403, _) => UpstreamError::Unauthorized { provider },
        ureq::Error::Status(429, _) => UpstreamError::RateLimited { provider },
        ureq::Error::Status(code, _) => UpstreamError::transient(provider, format!("HTTP {}", code)),
        ureq::Error::Transport(t) => UpstreamError::transient(provider, t.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(UpstreamError::Unauthorized { provider: "OpenAQ" }.is_fatal());
        assert!(UpstreamError::RateLimited { provider: "OpenAQ" }.is_fatal());
        assert!(!UpstreamError::transient("OpenAQ", "timeout").is_fatal());
    }

    #[test]
    fn test_user_messages() {
        let e = UpstreamError::Unauthorized { provider: "OpenAQ" };
        assert_eq!(e.user_message(), "Invalid OpenAQ API key.");
        assert_eq!(e.status_code(), 401);

        let e = UpstreamError::RateLimited { provider: "OpenAQ" };
        assert_eq!(e.user_message(), "Rate limited by OpenAQ. Try again soon.");
        assert_eq!(e.status_code(), 429);
    }

    #[test]
    fn test_probe_outcomes() {
        assert_eq!(probe::<u8>(Ok(3)), Ok(Some(3)));
        assert_eq!(probe::<u8>(Err(UpstreamError::transient("X", "boom"))), Ok(None));
        let fatal = UpstreamError::RateLimited { provider: "X" };
        assert_eq!(probe::<u8>(Err(fatal.clone())), Err(fatal));
    }

    #[test]
    fn test_unreachable_host_is_transient() {
        let client = HttpClient::new(
            "Nowhere",
            "http://127.0.0.1:9",
            "airsense-test",
            Duration::from_millis(500),
        );
        let err = client
            .get_json::<serde_json::Value>("/ping", &[])
            .unwrap_err();
        assert!(!err.is_fatal());
    }
}
