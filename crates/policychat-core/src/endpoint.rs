use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SendFailure;

/// Remote service that answers chat messages
#[async_trait]
pub trait ChatEndpoint: Send + Sync {
    async fn send(&self, message: &str) -> Result<String, SendFailure>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    response: String,
}

#[derive(Deserialize)]
struct RootResponse {
    message: String,
}

/// JSON-over-HTTP client for the policy assistant backend
#[derive(Clone)]
pub struct HttpChatEndpoint {
    client: Client,
    base_url: String,
}

impl HttpChatEndpoint {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Backend greeting from `GET /`, used as a reachability check
    pub async fn health(&self) -> Result<String, SendFailure> {
        let url = format!("{}/", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(SendFailure::status(format!(
                "health check failed with status: {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let root: RootResponse = serde_json::from_str(&body)
            .map_err(|e| SendFailure::malformed(format!("unexpected health body: {e}")))?;
        Ok(root.message)
    }

    /// Ask the backend to (re)build its document index
    pub async fn ingest(&self) -> Result<Value, SendFailure> {
        let url = format!("{}/ingest", self.base_url);

        let response = self.client.post(&url).send().await?;

        if !response.status().is_success() {
            return Err(SendFailure::status(format!(
                "ingest failed with status: {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| SendFailure::malformed(format!("unexpected ingest body: {e}")))
    }
}

#[async_trait]
impl ChatEndpoint for HttpChatEndpoint {
    async fn send(&self, message: &str) -> Result<String, SendFailure> {
        let url = format!("{}/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { message })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SendFailure::status(format!(
                "chat request failed with status: {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let chat: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| SendFailure::malformed(format!("unexpected chat body: {e}")))?;
        Ok(chat.response)
    }
}
