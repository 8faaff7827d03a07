use crate::domain::ProviderId;
use crate::provider::{
    CompletionRequest, CompletionResult, ModelProvider, ProviderError, ProviderMetadata,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scripted provider: replays queued replies in order, then repeats the last one.
pub struct MockProvider {
    id: ProviderId,
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    last: Mutex<Option<Result<String, ProviderError>>>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(id: impl Into<ProviderId>) -> Self {
        Self {
            id: id.into(),
            replies: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn replying(id: impl Into<ProviderId>, output: impl Into<String>) -> Self {
        Self::new(id).then_reply(output)
    }

    pub fn failing(id: impl Into<ProviderId>, error: ProviderError) -> Self {
        Self::new(id).then_fail(error)
    }

    pub fn then_reply(self, output: impl Into<String>) -> Self {
        self.push(Ok(output.into()))
    }

    pub fn then_fail(self, error: ProviderError) -> Self {
        self.push(Err(error))
    }

    fn push(self, reply: Result<String, ProviderError>) -> Self {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(reply);
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Result<String, ProviderError> {
        let queued = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        let Ok(mut last) = self.last.lock() else {
            return Err(ProviderError::Unavailable);
        };
        if let Some(reply) = queued {
            *last = Some(reply);
        }
        last.clone().unwrap_or(Err(ProviderError::Unavailable))
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            id: self.id.clone(),
            name: "MockProvider".to_string(),
            model: "mock".to_string(),
        }
    }

    async fn generate(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let raw_output = self.next_reply()?;
        Ok(CompletionResult {
            provider_id: request.provider_id,
            model: "mock".to_string(),
            raw_output,
            latency: Duration::from_millis(5),
            usage: None,
        })
    }
}
