use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{AssistantTurn, CompletionRequest, LlmClient, LlmError, TextStream, ToolSpec};

/// Replays queued replies in order and records every request it receives.
///
/// Used by tests and by offline runs that should never reach a provider.
#[derive(Default)]
pub struct ScriptedLlm {
    completions: Mutex<VecDeque<String>>,
    streams: Mutex<VecDeque<Vec<String>>>,
    turns: Mutex<VecDeque<AssistantTurn>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_completion(self, text: impl Into<String>) -> Self {
        lock(&self.completions).push_back(text.into());
        self
    }

    pub fn with_stream<I, S>(self, deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.streams).push_back(deltas.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_turn(self, turn: AssistantTurn) -> Self {
        lock(&self.turns).push_back(turn);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    fn record(&self, request: &CompletionRequest) {
        lock(&self.requests).push(request.clone());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn exhausted(kind: &str) -> LlmError {
    LlmError::Transport(format!("scripted model has no {kind} left"))
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.record(request);
        lock(&self.completions).pop_front().ok_or_else(|| exhausted("completions"))
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, LlmError> {
        self.record(request);
        let deltas = lock(&self.streams).pop_front().ok_or_else(|| exhausted("streams"))?;
        Ok(Box::pin(futures::stream::iter(deltas.into_iter().map(Ok::<String, LlmError>))))
    }

    async fn complete_with_tools(
        &self,
        request: &CompletionRequest,
        _tools: &[ToolSpec],
    ) -> Result<AssistantTurn, LlmError> {
        self.record(request);
        lock(&self.turns).pop_front().ok_or_else(|| exhausted("tool turns"))
    }
}
