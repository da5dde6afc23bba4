use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{GenerationOptions, LlmError, TextGenerationProvider};

type Reply = Result<String, String>;

/// Scripted backend for tests and offline dry runs.
///
/// Replies are chosen by the first rule whose needle occurs in the prompt,
/// otherwise taken from the queue in call order. Every prompt is recorded.
pub struct ScriptedProvider {
    rules: Vec<(String, Reply)>,
    queue: Mutex<VecDeque<Reply>>,
    prompts: Mutex<Vec<String>>,
    offline: bool,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            queue: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            offline: false,
        }
    }

    /// Backend that answers every prompt with canned, citation-bearing text.
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::new()
        }
    }

    pub fn with_reply(self, text: &str) -> Self {
        self.push(Ok(text.to_string()));
        self
    }

    pub fn with_failure(self, message: &str) -> Self {
        self.push(Err(message.to_string()));
        self
    }

    /// Answer any prompt containing `needle` with `text`.
    pub fn when(mut self, needle: &str, text: &str) -> Self {
        self.rules.push((needle.to_string(), Ok(text.to_string())));
        self
    }

    /// Fail any prompt containing `needle`.
    pub fn fail_when(mut self, needle: &str, message: &str) -> Self {
        self.rules.push((needle.to_string(), Err(message.to_string())));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn push(&self, reply: Reply) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    fn next_reply(&self, prompt: &str) -> Option<Reply> {
        if let Some((_, reply)) = self.rules.iter().find(|(needle, _)| prompt.contains(needle)) {
            return Some(reply.clone());
        }
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn canned_reply(prompt: &str) -> String {
    if prompt.contains("\"sections\"") {
        r#"{"title": "Draft document", "sections": [
            {"title": "Overview", "content": "Offline draft paragraph [1] [2]."},
            {"title": "Details", "content": "Offline draft paragraph [2] [3]."},
            {"title": "Outlook", "content": "Offline draft paragraph [1] [3]."}
        ]}"#
        .to_string()
    } else {
        "Offline draft paragraph grounded in the supplied passages [1] [2].".to_string()
    }
}

#[async_trait]
impl TextGenerationProvider for ScriptedProvider {
    async fn generate(&self, prompt: &str, _options: GenerationOptions) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());

        match self.next_reply(prompt) {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(LlmError::Scripted(message)),
            None if self.offline => Ok(canned_reply(prompt)),
            None => Err(LlmError::Scripted("no scripted reply left".into())),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
