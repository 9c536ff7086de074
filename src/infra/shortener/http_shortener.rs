// Bitly-backed URL shortener. Failures are reported to the caller, which
// falls back to the original URL, so nothing here is fatal.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::core::engine::UrlShortener;

pub struct BitlyShortener {
    client: Client,
    access_token: String,
}

impl BitlyShortener {
    pub fn new(access_token: String) -> Self {
        Self {
            client: Client::new(),
            access_token,
        }
    }
}

#[async_trait]
impl UrlShortener for BitlyShortener {
    async fn shorten(&self, url: &str) -> anyhow::Result<String> {
        let endpoint = "https://api-ssl.bitly.com/v4/shorten";

        let payload = json!({ "long_url": url });

        let response = self
            .client
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .context("Bitly request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Bitly API error: {} - {}", status, text));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .context("Bitly response was not JSON")?;

        let link = response_json["link"]
            .as_str()
            .ok_or_else(|| anyhow!("Bitly response missing link field"))?
            .to_string();

        Ok(link)
    }
}

/// Pass-through shortener for running without a Bitly token.
pub struct IdentityShortener;

#[async_trait]
impl UrlShortener for IdentityShortener {
    async fn shorten(&self, url: &str) -> anyhow::Result<String> {
        Ok(url.to_string())
    }
}
