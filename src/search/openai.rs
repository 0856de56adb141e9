//! OpenAI-compatible embedding provider
//!
//! `POST {base_url}/embeddings` with `{"model", "input"}` and a bearer key.
//! Works against api.openai.com and any server speaking the same protocol.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::embedding::EmbeddingProvider;
use crate::error::{KbError, ProviderError};

/// Error bodies longer than this are cut in error messages.
const MAX_ERROR_BODY: usize = 500;

pub struct OpenAiProvider {
    endpoint: String,
    api_key: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

impl OpenAiProvider {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self, KbError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProviderError::from)?;

        Ok(Self {
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            api_key,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl EmbeddingProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn embed_text(&self, text: &str, model_id: &str) -> Result<Vec<f32>, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbedRequest {
                model: model_id,
                input: text,
            })
            .send()?;

        let status = response.status().as_u16();
        let body = response.text()?;
        parse_embedding_response(status, &body)
    }
}

/// Map an HTTP status and body to the first embedding in the response.
fn parse_embedding_response(status: u16, body: &str) -> Result<Vec<f32>, ProviderError> {
    if status == 429 {
        return Err(ProviderError::Quota(truncate(body)));
    }
    if !(200..300).contains(&status) {
        return Err(ProviderError::Http {
            status,
            body: truncate(body),
        });
    }

    let payload: EmbedResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Malformed(format!("invalid embedding payload: {e}")))?;

    payload
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ProviderError::Malformed("response contains no embedding".to_string()))
}

fn truncate(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY {
        format!("{}...", body.chars().take(MAX_ERROR_BODY).collect::<String>())
    } else {
        body.to_string()
    }
}
