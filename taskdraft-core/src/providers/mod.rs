mod anthropic;
mod cohere;
mod google;
mod mock;
mod ollama;
mod openai;

pub use anthropic::AnthropicProvider;
pub use cohere::CohereProvider;
pub use google::GoogleProvider;
pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

pub mod defaults {
    pub use super::anthropic::DEFAULT_BASE_URL as ANTHROPIC_BASE_URL;
    pub use super::cohere::DEFAULT_BASE_URL as COHERE_BASE_URL;
    pub use super::google::DEFAULT_BASE_URL as GOOGLE_BASE_URL;
    pub use super::openai::DEFAULT_BASE_URL as OPENAI_BASE_URL;
}

use crate::logging::SharedEventLogger;
use crate::provider::{ModelProvider, ProviderConfig};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

pub(crate) fn http_client() -> Client {
    reqwest::ClientBuilder::new()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}

pub fn create_provider(config: ProviderConfig, logger: SharedEventLogger) -> Arc<dyn ModelProvider> {
    match config {
        ProviderConfig::OpenAi {
            id,
            base_url,
            api_key,
            model,
        } => Arc::new(OpenAiProvider::new(id, base_url, api_key, model)),
        ProviderConfig::Anthropic {
            id,
            base_url,
            api_key,
            model,
        } => Arc::new(AnthropicProvider::new(id, base_url, api_key, model)),
        ProviderConfig::Google {
            id,
            base_url,
            api_key,
            model,
        } => Arc::new(GoogleProvider::new(id, base_url, api_key, model)),
        ProviderConfig::Cohere {
            id,
            base_url,
            api_key,
            model,
        } => Arc::new(CohereProvider::new(id, base_url, api_key, model)),
        ProviderConfig::Ollama {
            id,
            base_url,
            model,
        } => Arc::new(OllamaProvider::new(id, base_url, model, logger)),
    }
}
