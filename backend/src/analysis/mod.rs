pub mod advice;
pub mod detection;
pub mod pipeline;
pub mod prompts;

use phytoscan_shared::{AdviceMode, AdviceReport, DetectionReport};
use std::time::Duration;

use crate::capability::{CapabilityError, ModelCapability, ModelPrompt};

/// Model confidence, guaranteed to lie in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Confidence(f64);

impl Confidence {
    pub fn new(value: f64) -> Result<Self, CapabilityError> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(CapabilityError::Malformed(format!(
                "confidence {value} is outside [0, 1]"
            )))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Healthy,
    Diseased { name: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlantIdentity {
    pub common_name: Option<String>,
    pub scientific_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub verdict: Verdict,
    pub confidence: Confidence,
    pub plant: PlantIdentity,
}

impl DetectionResult {
    pub fn disease_name(&self) -> Option<&str> {
        match &self.verdict {
            Verdict::Diseased { name } => Some(name),
            Verdict::Healthy => None,
        }
    }

    pub fn to_report(&self) -> DetectionReport {
        DetectionReport {
            disease_detected: matches!(self.verdict, Verdict::Diseased { .. }),
            disease_name: self.disease_name().unwrap_or_default().to_string(),
            confidence: self.confidence.value(),
            plant_name: self.plant.common_name.clone(),
            scientific_name: self.plant.scientific_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdviceResult {
    pub mode: AdviceMode,
    pub tips_text: String,
}

impl AdviceResult {
    pub fn to_report(&self) -> AdviceReport {
        AdviceReport::new(self.mode, self.tips_text.clone())
    }
}

async fn generate_within(
    capability: &dyn ModelCapability,
    prompt: &ModelPrompt,
    deadline: Duration,
) -> Result<serde_json::Value, CapabilityError> {
    tokio::time::timeout(deadline, capability.generate(prompt))
        .await
        .map_err(|_| CapabilityError::Timeout(deadline))?
}

/// Trims and drops blank model-supplied text.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
