// src/session.rs

use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::{EtlError, FetchError};

const BODY_SNIPPET_LEN: usize = 200;

/// Shared HTTP client for all upstream sources.
///
/// Cloning is cheap; clones share one connection pool.
#[derive(Clone)]
pub struct HttpSession {
    client: Client,
}

impl HttpSession {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(timeout: Duration) -> Result<Self, EtlError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("stockflow/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpSession { client })
    }

    /// Sends a GET and decodes a JSON body.
    ///
    /// Query values are never echoed into errors, so API keys stay out of logs.
    pub async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, FetchError> {
        let body = self.get_text(url, query).await?;
        serde_json::from_str(&body).map_err(|error| {
            FetchError::MalformedResponse(format!("{}: {}", error, snippet(&body)))
        })
    }

    pub async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String, FetchError> {
        debug!(url, "sending request");
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(classify)?;

        let response = check_status(response).await?;
        response.text().await.map_err(classify)
    }
}

async fn check_status(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(FetchError::HttpStatus {
        status: status.as_u16(),
        body: snippet(&body),
    })
}

fn classify(error: reqwest::Error) -> FetchError {
    let error = error.without_url();
    if error.is_timeout() {
        FetchError::Timeout(error.to_string())
    } else if error.is_connect() {
        FetchError::Connection(error.to_string())
    } else if let Some(status) = error.status() {
        FetchError::HttpStatus {
            status: status.as_u16(),
            body: String::new(),
        }
    } else if error.is_decode() || error.is_body() {
        FetchError::MalformedResponse(error.to_string())
    } else {
        FetchError::Other(error.to_string())
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_truncates_on_char_boundary() {
        let body = "é".repeat(300);
        assert_eq!(snippet(&body).chars().count(), BODY_SNIPPET_LEN);
        assert_eq!(snippet("short"), "short");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transient_failure() {
        let session = HttpSession::new(Duration::from_secs(2)).unwrap();
        let error = session
            .get_json("http://127.0.0.1:9/", &[("apikey", "secret")])
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            FetchError::Connection(_) | FetchError::Timeout(_)
        ));
        assert!(!error.to_string().contains("secret"));
    }
}
