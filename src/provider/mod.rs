use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::ProviderKind;
use crate::config::{Config, GenerationBudget};
use crate::errors::{GenError, GenResult};

pub mod gemini;
pub mod openai;

/// A generative text backend: prompt in, free text out. No retries.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn generate(&self, prompt: &str, budget: &GenerationBudget) -> GenResult<String>;
    fn name(&self) -> &str;
    fn model(&self) -> &str;
}

pub type DynProvider = Arc<dyn Provider>;

/// Which backend is selected and which keys are present. Never exposes key
/// material.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderStatus {
    pub current: ProviderKind,
    pub model: String,
    pub gemini_key: bool,
    pub openai_key: bool,
}

fn has_key(key: Option<&str>) -> bool {
    key.is_some_and(|k| !k.trim().is_empty())
}

pub fn status(cfg: &Config) -> ProviderStatus {
    ProviderStatus {
        current: cfg.provider,
        model: cfg.model.clone(),
        gemini_key: has_key(cfg.gemini_api_key.as_deref()),
        openai_key: has_key(cfg.openai_api_key.as_deref()),
    }
}

pub fn make_provider(cfg: &Config) -> GenResult<DynProvider> {
    let key = cfg
        .api_key()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| GenError::Config(format!("no API key configured for {}", cfg.provider.as_str())))?
        .to_string();
    let client = http_client(cfg.timeout_secs)?;
    match cfg.provider {
        ProviderKind::Gemini => Ok(Arc::new(gemini::GeminiProvider::new(
            client,
            cfg.gemini_base_url.clone(),
            cfg.model.clone(),
            key,
        ))),
        ProviderKind::OpenAI => Ok(Arc::new(openai::OpenAIProvider::new(
            client,
            cfg.openai_base_url.clone(),
            cfg.model.clone(),
            key,
        ))),
    }
}

/// Stands in when no backend can be built; every call fails with the reason.
pub struct Disabled {
    reason: String,
}

impl Disabled {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl Provider for Disabled {
    async fn generate(&self, _prompt: &str, _budget: &GenerationBudget) -> GenResult<String> {
        Err(GenError::Config(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "disabled"
    }

    fn model(&self) -> &str {
        "none"
    }
}

fn http_client(timeout_secs: u64) -> GenResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| GenError::Config(format!("building HTTP client: {e}")))
}

/// Maps a non-success HTTP status onto the provider error taxonomy.
pub(crate) fn classify_status(provider: &str, status: StatusCode, body: &str) -> GenError {
    let detail = format!("{provider} returned {status}: {}", truncate(body, 300));
    match status {
        StatusCode::TOO_MANY_REQUESTS => GenError::RateLimited(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenError::AuthFailure(detail),
        _ => GenError::ProviderUnavailable(detail),
    }
}

/// Provider text with whitespace-only output treated as no output.
pub(crate) fn non_empty(text: Option<String>) -> GenResult<String> {
    match text {
        Some(t) if !t.trim().is_empty() => Ok(t),
        _ => Err(GenError::EmptyResponse),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
