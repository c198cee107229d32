//! Shared HTTP client construction and error mapping for collaborators.

use coderag_protocol::ProviderError;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client with the standard connect timeout, the given request timeout and a
/// `coderag/{version}` user agent.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(timeout)
        .user_agent(concat!("coderag/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| ProviderError::Misconfigured(format!("HTTP client construction failed: {e}")))
}

/// Trim a configured base URL, rejecting blanks.
pub(crate) fn base_url(service: &str, url: &str) -> Result<String, ProviderError> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ProviderError::Misconfigured(format!("{service} URL is empty")));
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(ProviderError::Misconfigured(format!(
            "{service} URL must start with http:// or https://, got '{trimmed}'"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn map_send_error(service: &str, timeout: Duration, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::timeout(service, timeout)
    } else if err.is_connect() {
        ProviderError::connection(service, err)
    } else {
        ProviderError::request(service, err)
    }
}

/// Decode a JSON body, turning non-2xx statuses into `Request` errors.
pub(crate) async fn read_json<T: DeserializeOwned>(
    service: &str,
    timeout: Duration,
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| map_send_error(service, timeout, e))?;

    if !status.is_success() {
        log::warn!("{service} answered {status}: {text}");
        return Err(ProviderError::request(service, format!("HTTP {status}")));
    }

    serde_json::from_str(&text).map_err(|e| ProviderError::invalid_response(service, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn base_url_is_trimmed_and_validated() {
        assert_eq!(
            base_url("ollama", " http://localhost:11434/ ").unwrap(),
            "http://localhost:11434"
        );
        assert!(matches!(
            base_url("ollama", "  "),
            Err(ProviderError::Misconfigured(_))
        ));
        assert!(matches!(
            base_url("retriever", "localhost:8000"),
            Err(ProviderError::Misconfigured(_))
        ));
    }

    #[test]
    fn client_builds_with_standard_settings() {
        assert!(build_client(Duration::from_secs(1)).is_ok());
    }
}
