pub mod gemini;
pub mod retry;
pub mod stub;

use async_trait::async_trait;
use std::time::Duration;

use crate::intake::DataUri;

/// One structured-output request to a model-backed capability.
#[derive(Debug, Clone)]
pub struct ModelPrompt {
    /// Short identifier used in logs.
    pub name: &'static str,
    pub text: String,
    pub image: Option<DataUri>,
    /// JSON schema the response must match.
    pub output_schema: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CapabilityError {
    #[error("model client is not configured: {0}")]
    NotConfigured(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("model API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("malformed model response: {0}")]
    Malformed(String),
}

impl CapabilityError {
    /// Failures worth another attempt: connectivity, timeouts, throttling and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            CapabilityError::Network(_)
            | CapabilityError::Timeout(_)
            | CapabilityError::RateLimited => true,
            CapabilityError::Api { status, .. } => *status >= 500,
            CapabilityError::NotConfigured(_) | CapabilityError::Malformed(_) => false,
        }
    }
}

/// An external model that turns a prompt into a JSON value matching
/// `prompt.output_schema`, or fails.
#[async_trait]
pub trait ModelCapability: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &ModelPrompt) -> Result<serde_json::Value, CapabilityError>;
}
