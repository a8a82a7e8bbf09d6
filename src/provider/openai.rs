use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{classify_status, non_empty};
use crate::config::GenerationBudget;
use crate::errors::{GenError, GenResult};

/// Chat-completions provider; the whole prompt goes in a single user message.
pub struct OpenAIProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAIProvider {
    pub fn new(client: Client, base_url: String, model: String, api_key: String) -> Self {
        Self { client, base_url, model, api_key }
    }
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

fn first_content(body: &str) -> GenResult<Option<String>> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GenError::ProviderUnavailable(format!("unreadable openai response: {e}")))?;
    Ok(parsed.choices.into_iter().next().and_then(|c| c.message.content))
}

#[async_trait]
impl super::Provider for OpenAIProvider {
    async fn generate(&self, prompt: &str, budget: &GenerationBudget) -> GenResult<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "temperature": budget.temperature,
            "max_tokens": budget.max_output_tokens,
        });

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!(%url, model = %self.model, prompt_chars = prompt.len(), "openai request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        debug!(%status, bytes = text.len(), "openai response");

        if !status.is_success() {
            return Err(classify_status("openai", status, &text));
        }
        non_empty(first_content(&text)?)
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"a\":1}"}},{"message":{"content":"x"}}]}"#;
        assert_eq!(first_content(body).unwrap().as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn no_choices_is_none() {
        assert_eq!(first_content(r#"{"choices":[]}"#).unwrap(), None);
        assert_eq!(first_content(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap(), None);
    }

    #[test]
    fn garbage_body_is_unavailable() {
        assert!(matches!(first_content("<html>"), Err(GenError::ProviderUnavailable(_))));
    }
}
