use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/ask";

#[derive(Serialize)]
struct AskRequest<'a> {
    question: &'a str,
}

#[derive(Debug, Error)]
pub enum AskError {
    #[error("request to tutor failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("tutor responded with status {0}")]
    Status(StatusCode),
}

#[derive(Clone)]
pub struct TutorClient {
    client: Client,
    endpoint: String,
}

impl TutorClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    /// Build a client whose requests give up after `timeout`.
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self, AskError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one question and return the response body as raw text.
    pub async fn ask(&self, question: &str) -> Result<String, AskError> {
        tracing::debug!(endpoint = %self.endpoint, chars = question.chars().count(), "asking tutor");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&AskRequest { question })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AskError::Status(status));
        }

        let body = response.text().await?;
        tracing::debug!(status = %status, bytes = body.len(), "tutor answered");
        Ok(body)
    }
}
