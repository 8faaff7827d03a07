use crate::domain::{PromptSpec, ProviderId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub id: ProviderId,
    pub name: String,
    pub model: String,
}

/// A single completion call as sent to a backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub provider_id: ProviderId,
    pub model: String,
    pub prompt: PromptSpec,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionResult {
    pub provider_id: ProviderId,
    pub model: String,
    pub raw_output: String,
    pub latency: Duration,
    pub usage: Option<TokenUsage>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("transport error")]
    Transport,
    #[error("request timed out")]
    Timeout,
    #[error("rate limited")]
    RateLimited,
    #[error("invalid response")]
    InvalidResponse,
    #[error("provider unavailable")]
    Unavailable,
    #[error("{0}")]
    Critical(String),
}

impl ProviderError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport
        }
    }

    pub(crate) async fn from_status(vendor: &str, resp: reqwest::Response) -> Self {
        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Self::RateLimited;
        }
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Self::Unavailable;
        }
        let body = resp.text().await.unwrap_or_default();
        Self::Critical(format!("{vendor} error {status}: {body}"))
    }
}

#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn metadata(&self) -> ProviderMetadata;

    async fn generate(&self, request: CompletionRequest)
        -> Result<CompletionResult, ProviderError>;

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Everything needed to construct one backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProviderConfig {
    OpenAi {
        id: ProviderId,
        base_url: String,
        api_key: String,
        model: String,
    },
    Anthropic {
        id: ProviderId,
        base_url: String,
        api_key: String,
        model: String,
    },
    Google {
        id: ProviderId,
        base_url: String,
        api_key: String,
        model: String,
    },
    Cohere {
        id: ProviderId,
        base_url: String,
        api_key: String,
        model: String,
    },
    Ollama {
        id: ProviderId,
        base_url: String,
        model: String,
    },
}

impl ProviderConfig {
    pub fn id(&self) -> &ProviderId {
        match self {
            Self::OpenAi { id, .. }
            | Self::Anthropic { id, .. }
            | Self::Google { id, .. }
            | Self::Cohere { id, .. }
            | Self::Ollama { id, .. } => id,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::OpenAi { model, .. }
            | Self::Anthropic { model, .. }
            | Self::Google { model, .. }
            | Self::Cohere { model, .. }
            | Self::Ollama { model, .. } => model,
        }
    }
}
