//! Shared HTTP client for `heartline fetch`.
//!
//! Retry policy:
//! - 429 and 5xx responses and network/timeout errors are retried with
//!   exponential backoff, honoring `Retry-After` (seconds) on 429;
//! - any other 4xx fails immediately;
//! - bodies larger than [`MAX_RESPONSE_BYTES`] are refused.

use std::thread;
use std::time::Duration;

use heartline_config::FetchSettings;
use log::{debug, warn};

pub(super) const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;
pub(super) const USER_AGENT: &str = concat!("heartline/", env!("CARGO_PKG_VERSION"));

pub(crate) struct FetchClient {
    http: reqwest::blocking::Client,
    attempts: u32,
    backoff: Duration,
}

impl FetchClient {
    pub(crate) fn new(settings: &FetchSettings) -> Result<Self, String> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            http,
            attempts: settings.attempts.max(1),
            backoff: Duration::from_millis(settings.backoff_ms),
        })
    }

    /// GET `url` and return the body. The error is a human-readable reason.
    pub(crate) fn get_bytes(&self, url: &str) -> Result<Vec<u8>, String> {
        let mut backoff = self.backoff;

        for attempt in 1..=self.attempts {
            let last = attempt == self.attempts;
            debug!("GET {url} (attempt {attempt}/{})", self.attempts);

            let wait = match self.http.get(url).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if resp.status().is_success() {
                        return read_body(resp);
                    }
                    if status != 429 && status < 500 {
                        return Err(format!("HTTP {status}"));
                    }
                    if last {
                        let what = if status == 429 { "rate limited" } else { "upstream error" };
                        return Err(format!("{what} after {} attempts (HTTP {status})", self.attempts));
                    }
                    let retry_after = if status == 429 {
                        resp.headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.trim().parse::<u64>().ok())
                            .map(Duration::from_secs)
                    } else {
                        None
                    };
                    let wait = retry_after.unwrap_or(backoff);
                    warn!(
                        "retry {attempt}/{} in {}ms (HTTP {status})",
                        self.attempts - 1,
                        wait.as_millis()
                    );
                    wait
                }
                Err(e) => {
                    if last {
                        return Err(format!("network error after {} attempts: {e}", self.attempts));
                    }
                    warn!("retry {attempt}/{} in {}ms ({e})", self.attempts - 1, backoff.as_millis());
                    backoff
                }
            };

            thread::sleep(wait);
            backoff *= 2;
        }

        Err("no attempts made".into())
    }
}

fn read_body(resp: reqwest::blocking::Response) -> Result<Vec<u8>, String> {
    if let Some(len) = resp.content_length() {
        if len as usize > MAX_RESPONSE_BYTES {
            return Err(format!("response too large ({len} bytes)"));
        }
    }
    let bytes = resp.bytes().map_err(|e| format!("failed to read response body: {e}"))?;
    if bytes.len() > MAX_RESPONSE_BYTES {
        return Err(format!("response too large ({} bytes)", bytes.len()));
    }
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(attempts: u32) -> FetchClient {
        FetchClient::new(&FetchSettings {
            timeout_secs: 5,
            attempts,
            backoff_ms: 0,
        })
        .unwrap()
    }

    #[test]
    fn test_success_returns_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/heart.csv");
            then.status(200).body("age,sex\n63,1\n");
        });
        let body = client(3).get_bytes(&server.url("/heart.csv")).unwrap();
        mock.assert();
        assert_eq!(body, b"age,sex\n63,1\n");
    }

    #[test]
    fn test_not_found_fails_without_retry() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/missing.csv");
            then.status(404);
        });
        let err = client(3).get_bytes(&server.url("/missing.csv")).unwrap_err();
        assert_eq!(err, "HTTP 404");
        mock.assert_calls(1);
    }

    #[test]
    fn test_server_errors_retried_until_exhausted() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/flaky.csv");
            then.status(503);
        });
        let err = client(3).get_bytes(&server.url("/flaky.csv")).unwrap_err();
        assert!(err.contains("upstream error after 3 attempts"), "{err}");
        mock.assert_calls(3);
    }

    #[test]
    fn test_rate_limit_honors_retry_after() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/limited.csv");
            then.status(429).header("retry-after", "0");
        });
        let err = client(2).get_bytes(&server.url("/limited.csv")).unwrap_err();
        assert!(err.contains("rate limited"), "{err}");
        mock.assert_calls(2);
    }
}
