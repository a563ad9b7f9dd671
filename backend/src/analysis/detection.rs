use phytoscan_shared::PlantNameSource;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::{generate_within, non_blank, prompts, Confidence, DetectionResult, PlantIdentity, Verdict};
use crate::capability::{CapabilityError, ModelCapability};
use crate::intake::AnalysisRequest;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error(transparent)]
pub struct DetectionError(#[from] pub CapabilityError);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectionResponse {
    disease_detected: bool,
    #[serde(default)]
    disease_name: Option<String>,
    confidence: f64,
    #[serde(default)]
    plant_name: Option<String>,
    #[serde(default)]
    scientific_name: Option<String>,
}

/// Asks the detection capability for a verdict on one image. Exactly one
/// capability call per `detect`; no retries here.
#[derive(Clone)]
pub struct DetectionInvoker {
    capability: Arc<dyn ModelCapability>,
    plant_name_source: PlantNameSource,
    deadline: Duration,
}

impl DetectionInvoker {
    pub fn new(
        capability: Arc<dyn ModelCapability>,
        plant_name_source: PlantNameSource,
        deadline: Duration,
    ) -> Self {
        Self {
            capability,
            plant_name_source,
            deadline,
        }
    }

    pub async fn detect(&self, request: &AnalysisRequest) -> Result<DetectionResult, DetectionError> {
        let prompt = prompts::detection_prompt(request, self.plant_name_source);
        let value = generate_within(self.capability.as_ref(), &prompt, self.deadline).await?;
        Ok(parse_detection(value)?)
    }
}

fn parse_detection(value: serde_json::Value) -> Result<DetectionResult, CapabilityError> {
    let response: DetectionResponse = serde_json::from_value(value)
        .map_err(|e| CapabilityError::Malformed(format!("detection response: {e}")))?;

    let confidence = Confidence::new(response.confidence)?;
    let verdict = if response.disease_detected {
        let name = non_blank(response.disease_name).ok_or_else(|| {
            CapabilityError::Malformed("disease detected without a disease name".to_string())
        })?;
        Verdict::Diseased { name }
    } else {
        Verdict::Healthy
    };

    Ok(DetectionResult {
        verdict,
        confidence,
        plant: PlantIdentity {
            common_name: non_blank(response.plant_name),
            scientific_name: non_blank(response.scientific_name),
        },
    })
}
