use crate::domain::{GenerationOutcome, GenerationRequest, PromptSpec};
use crate::fallback::derive_fallback;
use crate::logging::{LogEvent, LogLevel, NoopEventLogger, SharedEventLogger};
use crate::metrics::{InMemoryMetrics, Metrics};
use crate::parser::try_parse_response;
use crate::prompt::build_prompt;
use crate::provider::CompletionRequest;
use crate::registry::{ProviderRegistry, RegisteredCandidate};
use crate::retry::{with_retry, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const NO_PROVIDERS_MESSAGE: &str = "No AI providers configured. Please check your API keys.";

/// Sampling parameters sent with every completion call.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 500,
        }
    }
}

/// Turns a [`GenerationRequest`] into a [`GenerationOutcome`] by trying each candidate in
/// order and falling back to the heuristic draft when none yields a usable response.
#[derive(Clone)]
pub struct Orchestrator {
    candidates: Arc<[RegisteredCandidate]>,
    retry: RetryPolicy,
    settings: GenerationSettings,
    metrics: Arc<dyn Metrics>,
    logger: SharedEventLogger,
    request_seq: Arc<AtomicU64>,
}

impl Orchestrator {
    pub fn new(candidates: Vec<RegisteredCandidate>) -> Self {
        Self {
            candidates: candidates.into(),
            retry: RetryPolicy::default(),
            settings: GenerationSettings::default(),
            metrics: Arc::new(InMemoryMetrics::new()),
            logger: Arc::new(NoopEventLogger),
            request_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_registry(registry: &ProviderRegistry, logger: SharedEventLogger) -> Self {
        Self::new(registry.build_providers(logger.clone())).with_logger(logger)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_generation_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_logger(mut self, logger: SharedEventLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn candidate_labels(&self) -> Vec<String> {
        self.candidates.iter().map(RegisteredCandidate::label).collect()
    }

    pub fn metrics(&self) -> &Arc<dyn Metrics> {
        &self.metrics
    }

    pub async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        let request_id = format!("gen-{}", self.request_seq.fetch_add(1, Ordering::Relaxed) + 1);
        self.metrics.inc_generation_requested();
        self.logger.log(
            LogEvent::new(LogLevel::Info, "generate.start")
                .with_request(request_id.clone())
                .with_field("candidates", self.candidates.len().to_string()),
        );

        for pattern in request.suspicious_patterns() {
            self.logger.log(
                LogEvent::new(LogLevel::Warn, "request.suspicious_input")
                    .with_request(request_id.clone())
                    .with_field("pattern", pattern),
            );
        }

        if self.candidates.is_empty() {
            self.metrics.inc_unconfigured_failure();
            self.logger.log(
                LogEvent::new(LogLevel::Error, "generate.no_providers").with_request(request_id),
            );
            return GenerationOutcome::failure(NO_PROVIDERS_MESSAGE);
        }

        let prompt = build_prompt(request.user_input());

        for registered in self.candidates.iter() {
            if let Some(outcome) = self.try_candidate(&request_id, registered, &prompt).await {
                return outcome;
            }
        }

        self.metrics.inc_fallback_used();
        self.logger
            .log(LogEvent::new(LogLevel::Warn, "generate.fallback").with_request(request_id));
        GenerationOutcome::from_fallback(derive_fallback(request.user_input()))
    }

    /// Invokes one candidate under the retry policy. `None` means move on to the next one.
    async fn try_candidate(
        &self,
        request_id: &str,
        registered: &RegisteredCandidate,
        prompt: &PromptSpec,
    ) -> Option<GenerationOutcome> {
        let label = registered.label();
        let completion = CompletionRequest {
            provider_id: label.clone(),
            model: registered.candidate.model.clone(),
            prompt: prompt.clone(),
            max_tokens: Some(self.settings.max_tokens),
            temperature: Some(self.settings.temperature),
        };

        let result = with_retry(
            &self.retry,
            |attempt| {
                self.metrics.inc_provider_attempt();
                self.logger.log(
                    LogEvent::new(LogLevel::Info, "provider.attempt")
                        .with_request(request_id)
                        .with_candidate(label.clone())
                        .with_field("attempt", attempt.to_string()),
                );
                registered.provider.generate(completion.clone())
            },
            |attempt, err| {
                self.metrics.inc_provider_failure();
                self.logger.log(
                    LogEvent::new(LogLevel::Warn, "provider.attempt.failed")
                        .with_request(request_id)
                        .with_candidate(label.clone())
                        .with_field("attempt", attempt.to_string())
                        .with_field("error", err.to_string()),
                );
            },
        )
        .await;

        let completion = match result {
            Ok(c) => c,
            Err(e) => {
                self.logger.log(
                    LogEvent::new(LogLevel::Error, "provider.exhausted")
                        .with_request(request_id)
                        .with_candidate(label)
                        .with_field("error", e.to_string()),
                );
                return None;
            }
        };

        match try_parse_response(&completion.raw_output) {
            Ok(draft) => {
                self.metrics.inc_provider_success();
                self.logger.log(
                    LogEvent::new(LogLevel::Info, "provider.success")
                        .with_request(request_id)
                        .with_candidate(label.clone())
                        .with_field("latency_ms", completion.latency.as_millis().to_string()),
                );
                Some(GenerationOutcome::from_provider(draft, label))
            }
            Err(e) => {
                self.metrics.inc_parse_failure();
                self.logger.log(
                    LogEvent::new(LogLevel::Warn, "provider.parse_failed")
                        .with_request(request_id)
                        .with_candidate(label)
                        .with_field("error", e.to_string()),
                );
                None
            }
        }
    }
}
