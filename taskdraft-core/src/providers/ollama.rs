use crate::domain::ProviderId;
use crate::logging::{LogEvent, LogLevel, SharedEventLogger};
use crate::provider::{
    CompletionRequest, CompletionResult, ModelProvider, ProviderError, ProviderMetadata,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tokio::time::timeout;

const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(300);

/// Local Ollama backend using the streaming `/api/generate` endpoint.
pub struct OllamaProvider {
    id: ProviderId,
    client: Client,
    base_url: String,
    model: String,
    logger: SharedEventLogger,
    stream_timeout: Duration,
}

/// Text accumulated from NDJSON stream lines.
#[derive(Default)]
struct StreamState {
    content: String,
    done: bool,
}

impl StreamState {
    fn absorb(&mut self, line: &str, logger: &SharedEventLogger) -> Result<(), ProviderError> {
        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                logger.log(
                    LogEvent::new(LogLevel::Warn, "ollama.json.parse.error")
                        .with_field("error", e.to_string())
                        .with_field("line", line.to_string()),
                );
                return Ok(());
            }
        };
        if let Some(err) = value.get("error").and_then(|v| v.as_str()) {
            return Err(ProviderError::Critical(err.to_string()));
        }
        if let Some(text) = value.get("response").and_then(|v| v.as_str()) {
            self.content.push_str(text);
        }
        if value.get("done").and_then(|v| v.as_bool()) == Some(true) {
            self.done = true;
        }
        Ok(())
    }
}

impl OllamaProvider {
    pub fn new(id: ProviderId, base_url: String, model: String, logger: SharedEventLogger) -> Self {
        Self::with_client(id, base_url, model, super::http_client(), logger)
    }

    pub fn with_client(
        id: ProviderId,
        base_url: String,
        model: String,
        client: Client,
        logger: SharedEventLogger,
    ) -> Self {
        Self {
            id,
            client,
            base_url,
            model,
            logger,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
        }
    }

    pub fn with_stream_timeout(mut self, stream_timeout: Duration) -> Self {
        self.stream_timeout = stream_timeout;
        self
    }
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            id: self.id.clone(),
            name: "OllamaProvider".to_string(),
            model: self.model.clone(),
        }
    }

    async fn generate(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResult, ProviderError> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let mut options = serde_json::Map::new();
        if let Some(t) = request.temperature {
            options.insert("temperature".into(), serde_json::json!(t));
        }
        if let Some(m) = request.max_tokens {
            options.insert("num_predict".into(), serde_json::json!(m));
        }
        let payload = serde_json::json!({
            "model": self.model,
            "prompt": request.prompt.user,
            "system": request.prompt.system,
            "options": options,
            "stream": true
        });

        let start = std::time::Instant::now();
        let send_fut = self.client.post(url).json(&payload).send();
        let resp = match timeout(self.stream_timeout, send_fut).await {
            Ok(r) => r.map_err(ProviderError::from_reqwest)?,
            Err(_) => return Err(ProviderError::Timeout),
        };

        if !resp.status().is_success() {
            return Err(ProviderError::from_status("Ollama", resp).await);
        }
        let mut stream = resp.bytes_stream();

        let streamed = timeout(self.stream_timeout, async {
            let mut buffer: Vec<u8> = Vec::new();
            let mut state = StreamState::default();

            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|_| ProviderError::Transport)?;
                buffer.extend_from_slice(&chunk);

                while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line = buffer.drain(..=pos).collect::<Vec<u8>>();
                    let line = std::str::from_utf8(&line)
                        .map_err(|_| ProviderError::InvalidResponse)?
                        .trim();
                    if !line.is_empty() {
                        state.absorb(line, &self.logger)?;
                    }
                    if state.done {
                        return Ok(state);
                    }
                }
            }

            // Final line without a trailing newline.
            let rest = std::str::from_utf8(&buffer)
                .map_err(|_| ProviderError::InvalidResponse)?
                .trim();
            if !rest.is_empty() {
                state.absorb(rest, &self.logger)?;
            }
            Ok::<_, ProviderError>(state)
        })
        .await;

        let state = match streamed {
            Ok(r) => r?,
            Err(_) => return Err(ProviderError::Timeout),
        };

        if !state.done {
            self.logger
                .log(LogEvent::new(LogLevel::Warn, "ollama.done.not_received"));
        }
        if state.content.trim().is_empty() {
            return Err(ProviderError::InvalidResponse);
        }

        Ok(CompletionResult {
            provider_id: request.provider_id,
            model: self.model.clone(),
            raw_output: state.content,
            latency: start.elapsed(),
            usage: None,
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let url = format!("{}/api/tags", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::Unavailable)
        }
    }
}
