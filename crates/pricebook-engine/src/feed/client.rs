//! HTTP access to the price feeds.

use std::time::Duration;

use tracing::warn;

use pricebook_common::{PricebookError, Result};

/// Thin wrapper around `reqwest` resolving relative feed paths
/// against the configured base URL.
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: reqwest::Client,
    base_url: String,
}

impl FeedClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| PricebookError::Network(format!("cannot build HTTP client: {e}")))?;
        Ok(FeedClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve a possibly relative feed path to an absolute URL.
    pub fn resolve(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Fetch a mandatory document. Any failure is an error for the
    /// caller to propagate.
    pub async fn fetch_text(&self, path: &str) -> Result<String> {
        let url = self.resolve(path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PricebookError::FeedUnreachable(format!("{url}: {e}")))?;
        if !response.status().is_success() {
            return Err(PricebookError::FeedUnreachable(format!(
                "{url}: HTTP {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| PricebookError::FeedUnreachable(format!("{url}: {e}")))
    }

    /// Fetch an optional document; unreachability degrades to `None`
    /// with a warning instead of failing the caller.
    pub async fn fetch_optional_text(&self, path: &str) -> Option<String> {
        match self.fetch_text(path).await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(path = %path, error = %e, "optional feed unavailable, skipping");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_absolute() {
        let client = FeedClient::new("https://feeds.example.com/").unwrap();
        assert_eq!(
            client.resolve("/offers/index.json"),
            "https://feeds.example.com/offers/index.json"
        );
        assert_eq!(
            client.resolve("offers/index.json"),
            "https://feeds.example.com/offers/index.json"
        );
        assert_eq!(
            client.resolve("https://mirror.example.org/x.json"),
            "https://mirror.example.org/x.json"
        );
    }
}
