use phytoscan_shared::AdviceMode;
use std::sync::Arc;
use std::time::Duration;

use super::{generate_within, prompts, AdviceResult};
use crate::capability::{CapabilityError, ModelCapability};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdviceError {
    #[error("{0} is required")]
    MissingInput(&'static str),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

/// Asks the advice capability for prevention or treatment tips. Callers only
/// invoke it for diseased plants.
#[derive(Clone)]
pub struct AdviceInvoker {
    capability: Arc<dyn ModelCapability>,
    mode: AdviceMode,
    deadline: Duration,
}

impl AdviceInvoker {
    pub fn new(capability: Arc<dyn ModelCapability>, mode: AdviceMode, deadline: Duration) -> Self {
        Self {
            capability,
            mode,
            deadline,
        }
    }

    pub fn mode(&self) -> AdviceMode {
        self.mode
    }

    pub async fn advise(&self, plant_name: &str, disease_name: &str) -> Result<AdviceResult, AdviceError> {
        let plant_name = plant_name.trim();
        let disease_name = disease_name.trim();
        if plant_name.is_empty() {
            return Err(AdviceError::MissingInput("plant name"));
        }
        if disease_name.is_empty() {
            return Err(AdviceError::MissingInput("disease name"));
        }

        let prompt = prompts::advice_prompt(self.mode, plant_name, disease_name);
        let value = generate_within(self.capability.as_ref(), &prompt, self.deadline).await?;
        Ok(self.parse_advice(&value)?)
    }

    fn parse_advice(&self, value: &serde_json::Value) -> Result<AdviceResult, CapabilityError> {
        let field = self.mode.tips_field();
        let tips_text = value
            .get(field)
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                CapabilityError::Malformed(format!("advice response: missing string field `{field}`"))
            })?;

        if tips_text.trim().is_empty() {
            return Err(CapabilityError::Malformed(format!(
                "advice response: `{field}` is empty"
            )));
        }

        Ok(AdviceResult {
            mode: self.mode,
            tips_text: tips_text.to_string(),
        })
    }
}
