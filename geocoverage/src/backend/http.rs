//! Blocking HTTP fetches for the WCS and Bing backends
//!
//! Both backends fetch one encoded image per request: a `GetCoverage`
//! response or a single tile. The fetch either returns the whole body or a
//! [`BackendError`] already sorted into transient and structural, so the
//! retry loop only repeats requests that can succeed on a later attempt.

use std::time::Duration;

use super::BackendError;

/// Per-request timeout in seconds, connect and body included.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Fetches encoded image bytes by URL.
///
/// Implementations must report timeouts, connection failures, throttling
/// and server errors as `BackendError::Read`, and requests the server
/// rejects outright as `BackendError::Structure`. An empty body counts as a
/// failed read.
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str) -> Result<Vec<u8>, BackendError>;
}

/// [`HttpClient`] over a shared `reqwest` blocking client.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, BackendError> {
        Self::with_timeout(DEFAULT_HTTP_TIMEOUT_SECS)
    }

    /// Builds the client. Failure here is a setup problem, not a read.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, BackendError> {
        reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("geocoverage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map(|client| Self { client })
            .map_err(|e| BackendError::Structure(format!("HTTP client setup failed: {}", e)))
    }
}

/// Sorts a non-success status into a retryable or a terminal error.
///
/// Request timeouts (408), throttling (429) and every 5xx are transient.
/// Any other status means the URL itself is wrong for this dataset.
pub fn status_error(status: u16, url: &str) -> BackendError {
    let message = format!("HTTP {} from {}", status, url);
    match status {
        408 | 429 | 500..=599 => BackendError::Read(message),
        _ => BackendError::Structure(message),
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<Vec<u8>, BackendError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| BackendError::Read(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status.as_u16(), url));
        }

        let body = response
            .bytes()
            .map_err(|e| BackendError::Read(format!("Body of {} cut short: {}", url, e)))?;
        if body.is_empty() {
            return Err(BackendError::Read(format!("Empty body from {}", url)));
        }
        Ok(body.to_vec())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Answers every URL with the same canned result and logs the URLs.
    pub struct MockHttpClient {
        pub response: Result<Vec<u8>, BackendError>,
        pub requests: Mutex<Vec<String>>,
    }

    impl MockHttpClient {
        pub fn new(response: Result<Vec<u8>, BackendError>) -> Self {
            Self {
                response,
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().len()
        }

        pub fn requested_urls(&self) -> Vec<String> {
            self.requests.lock().clone()
        }
    }

    impl HttpClient for MockHttpClient {
        fn get(&self, url: &str) -> Result<Vec<u8>, BackendError> {
            self.requests.lock().push(url.to_string());
            self.response.clone()
        }
    }

    #[test]
    fn test_server_side_statuses_are_transient() {
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(
                matches!(status_error(status, "http://wcs"), BackendError::Read(_)),
                "status {}",
                status
            );
        }
    }

    #[test]
    fn test_rejected_requests_are_structural() {
        let err = status_error(400, "http://wcs?REQUEST=GetCoverage");
        assert_eq!(
            err,
            BackendError::Structure("HTTP 400 from http://wcs?REQUEST=GetCoverage".to_string())
        );
        assert!(matches!(status_error(404, "http://tiles/0.jpeg"), BackendError::Structure(_)));
        assert!(matches!(status_error(403, "http://tiles/0.jpeg"), BackendError::Structure(_)));
    }

    #[test]
    fn test_mock_records_urls() {
        let mock = MockHttpClient::new(Ok(vec![1, 2, 3]));
        assert_eq!(mock.get("http://a").unwrap(), vec![1, 2, 3]);
        mock.get("http://b").unwrap();
        assert_eq!(mock.requested_urls(), vec!["http://a", "http://b"]);
    }

    #[test]
    fn test_client_builds_with_timeout() {
        assert!(ReqwestClient::with_timeout(5).is_ok());
    }
}
