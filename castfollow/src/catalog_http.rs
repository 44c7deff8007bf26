//! Catalog collaborator over a remote HTTP catalog service.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use cfsession::{Catalog, SearchHit, Track};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use tracing::debug;

/// JSON client for the catalog service configured in `catalog.base_url`.
///
/// Expected endpoints:
/// - `GET /search?q=<query>&limit=<n>` → array of search hits
/// - `GET /albums/{id}/tracks` → array of tracks
/// - `GET /tracks/{id}/stream-url` → `{ "url": "..." }`
#[derive(Clone)]
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct StreamUrlResponse {
    url: String,
}

impl HttpCatalog {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("Catalog request: {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("catalog request {}", url))?;

        if !response.status().is_success() {
            return Err(anyhow!("catalog returned HTTP {} for {}", response.status(), url));
        }
        response
            .json()
            .await
            .with_context(|| format!("decoding catalog response from {}", url))
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let url = format!(
            "{}/search?q={}&limit={}",
            self.base_url,
            urlencode(query),
            limit
        );
        self.get_json(&url).await
    }

    async fn album_tracks(&self, album_id: &str) -> Result<Vec<Track>> {
        let url = format!("{}/albums/{}/tracks", self.base_url, urlencode(album_id));
        self.get_json(&url).await
    }

    async fn stream_url(&self, track_id: &str) -> Result<String> {
        let url = format!("{}/tracks/{}/stream-url", self.base_url, urlencode(track_id));
        let response: StreamUrlResponse = self.get_json(&url).await?;
        Ok(response.url)
    }
}

/// Percent-encoding for path and query components.
fn urlencode(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlencode_escapes_reserved_characters() {
        assert_eq!(urlencode("hello world"), "hello%20world");
        assert_eq!(urlencode("a/b?c"), "a%2Fb%3Fc");
        assert_eq!(urlencode("Track42"), "Track42");
    }
}
