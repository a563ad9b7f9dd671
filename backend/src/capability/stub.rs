//! In-memory capability that replays queued replies, for tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{CapabilityError, ModelCapability, ModelPrompt};

#[derive(Debug, Clone)]
enum StubReply {
    Value(serde_json::Value),
    Error(CapabilityError),
    Panic(String),
}

#[derive(Clone, Default)]
pub struct StubCapability {
    replies: Arc<Mutex<VecDeque<StubReply>>>,
    prompts: Arc<Mutex<Vec<ModelPrompt>>>,
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl StubCapability {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every reply, e.g. to exercise call timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_ok(&self, value: serde_json::Value) {
        self.push(StubReply::Value(value));
    }

    pub fn push_err(&self, error: CapabilityError) {
        self.push(StubReply::Error(error));
    }

    pub fn push_panic(&self, message: impl Into<String>) {
        self.push(StubReply::Panic(message.into()));
    }

    fn push(&self, reply: StubReply) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<ModelPrompt> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ModelCapability for StubCapability {
    fn name(&self) -> &str {
        "stub"
    }

    async fn generate(&self, prompt: &ModelPrompt) -> Result<serde_json::Value, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match reply {
            Some(StubReply::Value(value)) => Ok(value),
            Some(StubReply::Error(error)) => Err(error),
            Some(StubReply::Panic(message)) => panic!("{}", message),
            None => Err(CapabilityError::Malformed(
                "stub has no queued reply".to_string(),
            )),
        }
    }
}
