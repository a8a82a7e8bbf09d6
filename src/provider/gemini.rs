use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{classify_status, non_empty};
use crate::config::GenerationBudget;
use crate::errors::{GenError, GenResult};

/// `models/{model}:generateContent` with the key in the `x-goog-api-key` header.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(client: Client, base_url: String, model: String, api_key: String) -> Self {
        Self { client, base_url, model, api_key }
    }
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

/// Concatenated text parts of the first candidate.
fn candidate_text(body: &str) -> GenResult<Option<String>> {
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| GenError::ProviderUnavailable(format!("unreadable gemini response: {e}")))?;
    let text = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<String>());
    Ok(text)
}

#[async_trait]
impl super::Provider for GeminiProvider {
    async fn generate(&self, prompt: &str, budget: &GenerationBudget) -> GenResult<String> {
        let body = json!({
            "contents": [
                { "role": "user", "parts": [ { "text": prompt } ] }
            ],
            "generationConfig": {
                "temperature": budget.temperature,
                "maxOutputTokens": budget.max_output_tokens,
            }
        });

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        debug!(%url, prompt_chars = prompt.len(), "gemini request");

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        debug!(%status, bytes = text.len(), "gemini response");

        if !status.is_success() {
            return Err(classify_status("gemini", status, &text));
        }
        non_empty(candidate_text(&text)?)
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
