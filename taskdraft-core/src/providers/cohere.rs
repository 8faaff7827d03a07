use crate::domain::ProviderId;
use crate::provider::{
    CompletionRequest, CompletionResult, ModelProvider, ProviderError, ProviderMetadata,
};
use async_trait::async_trait;
use reqwest::Client;

pub const DEFAULT_BASE_URL: &str = "https://api.cohere.com/v2";

pub struct CohereProvider {
    id: ProviderId,
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl CohereProvider {
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
impl ModelProvider for CohereProvider {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            id: self.id.clone(),
            name: "CohereProvider".to_string(),
            model: self.model.clone(),
        }
    }

    async fn generate(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResult, ProviderError> {
        let url = format!("{}/chat", self.base_url.trim_end_matches('/'));
        let mut messages = Vec::<serde_json::Value>::new();
        if let Some(sys) = &request.prompt.system {
            messages.push(serde_json::json!({"role": "system", "content": sys}));
        }
        messages.push(serde_json::json!({"role": "user", "content": request.prompt.user}));

        let mut payload = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        if let Some(t) = request.temperature {
            payload["temperature"] = serde_json::json!(t);
        }
        if let Some(m) = request.max_tokens {
            payload["max_tokens"] = serde_json::json!(m);
        }

        let start = std::time::Instant::now();
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        if !resp.status().is_success() {
            return Err(ProviderError::from_status("Cohere", resp).await);
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|_| ProviderError::InvalidResponse)?;
        let content = body
            .pointer("/message/content/0/text")
            .and_then(|v| v.as_str())
            .ok_or(ProviderError::InvalidResponse)?;

        Ok(CompletionResult {
            provider_id: request.provider_id,
            model: self.model.clone(),
            raw_output: content.to_string(),
            latency: start.elapsed(),
            usage: None,
        })
    }
}
