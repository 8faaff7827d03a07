use crate::domain::ProviderId;
use crate::provider::{
    CompletionRequest, CompletionResult, ModelProvider, ProviderError, ProviderMetadata,
};
use async_trait::async_trait;
use reqwest::Client;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini `generateContent` backend. `model` is the bare model name, without the `gemini/` prefix.
pub struct GoogleProvider {
    id: ProviderId,
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GoogleProvider {
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
impl ModelProvider for GoogleProvider {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            id: self.id.clone(),
            name: "GoogleProvider".to_string(),
            model: self.model.clone(),
        }
    }

    async fn generate(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResult, ProviderError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let mut generation_config = serde_json::Map::new();
        if let Some(t) = request.temperature {
            generation_config.insert("temperature".into(), serde_json::json!(t));
        }
        if let Some(m) = request.max_tokens {
            generation_config.insert("maxOutputTokens".into(), serde_json::json!(m));
        }
        let mut payload = serde_json::json!({
            "contents": [{"role": "user", "parts": [{"text": request.prompt.user}]}],
            "generationConfig": generation_config,
        });
        if let Some(sys) = &request.prompt.system {
            payload["systemInstruction"] = serde_json::json!({"parts": [{"text": sys}]});
        }

        let start = std::time::Instant::now();
        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        if !resp.status().is_success() {
            return Err(ProviderError::from_status("Gemini", resp).await);
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|_| ProviderError::InvalidResponse)?;
        let content = body
            .pointer("/candidates/0/content/parts/0/text")
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
