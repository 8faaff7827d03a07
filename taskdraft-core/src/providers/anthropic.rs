use crate::domain::ProviderId;
use crate::provider::{
    CompletionRequest, CompletionResult, ModelProvider, ProviderError, ProviderMetadata,
    TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
// The messages API requires max_tokens.
const DEFAULT_MAX_TOKENS: u32 = 500;

pub struct AnthropicProvider {
    id: ProviderId,
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(id: ProviderId, base_url: String, api_key: String, model: String) -> Self {
        Self::with_client(id, base_url, api_key, model, super::http_client())
    }

    pub fn with_client(
        id: ProviderId,
        base_url: String,
        api_key: String,
        model: String,
        client: Client,
    ) -> Self {
        Self {
            id,
            client,
            base_url,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            id: self.id.clone(),
            name: "AnthropicProvider".to_string(),
            model: self.model.clone(),
        }
    }

    async fn generate(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResult, ProviderError> {
        let url = format!("{}/messages", self.base_url.trim_end_matches('/'));
        let mut payload = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": [{"role": "user", "content": request.prompt.user}],
        });
        if let Some(sys) = &request.prompt.system {
            payload["system"] = serde_json::json!(sys);
        }
        if let Some(t) = request.temperature {
            payload["temperature"] = serde_json::json!(t);
        }

        let start = std::time::Instant::now();
        let resp = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&payload)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        if !resp.status().is_success() {
            return Err(ProviderError::from_status("Anthropic", resp).await);
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|_| ProviderError::InvalidResponse)?;
        let content = body
            .pointer("/content/0/text")
            .and_then(|v| v.as_str())
            .ok_or(ProviderError::InvalidResponse)?;

        let usage = body.get("usage").and_then(|u| {
            let input = u.get("input_tokens")?.as_u64()? as u32;
            let output = u.get("output_tokens")?.as_u64()? as u32;
            Some(TokenUsage {
                prompt_tokens: input,
                completion_tokens: output,
                total_tokens: input.saturating_add(output),
            })
        });

        Ok(CompletionResult {
            provider_id: request.provider_id,
            model: self.model.clone(),
            raw_output: content.to_string(),
            latency: start.elapsed(),
            usage,
        })
    }
}
