use futures::FutureExt;
use phytoscan_shared::{AdviceMode, AnalysisOutcome, PlantNameSource};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use super::advice::AdviceInvoker;
use super::detection::DetectionInvoker;
use super::{AdviceResult, DetectionResult, Verdict};
use crate::capability::ModelCapability;
use crate::error::AnalysisError;
use crate::intake::{FormValidator, RawSubmission};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub plant_name_source: PlantNameSource,
    pub advice_mode: AdviceMode,
    pub max_image_bytes: usize,
    /// Upper bound on each capability stage, retries included.
    pub stage_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Validating,
    Detecting,
    Advising,
    Done,
}

/// A successful run: detection always, advice only for diseased plants.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub detection: DetectionResult,
    pub advice: Option<AdviceResult>,
}

impl Analysis {
    pub fn into_outcome(self) -> AnalysisOutcome {
        AnalysisOutcome::succeeded(
            self.detection.to_report(),
            self.advice.as_ref().map(AdviceResult::to_report),
        )
    }
}

/// Validate, detect, then advise when a disease was found. The pipeline is
/// the error boundary: `run` never fails, it reports through the outcome.
#[derive(Clone)]
pub struct Pipeline {
    validator: FormValidator,
    detector: DetectionInvoker,
    advisor: AdviceInvoker,
}

impl Pipeline {
    pub fn new(
        detection: Arc<dyn ModelCapability>,
        advice: Arc<dyn ModelCapability>,
        options: &PipelineOptions,
    ) -> Self {
        Self {
            validator: FormValidator::new(options.plant_name_source, options.max_image_bytes),
            detector: DetectionInvoker::new(
                detection,
                options.plant_name_source,
                options.stage_timeout,
            ),
            advisor: AdviceInvoker::new(advice, options.advice_mode, options.stage_timeout),
        }
    }

    pub async fn run(&self, raw: &RawSubmission) -> AnalysisOutcome {
        let result = match AssertUnwindSafe(self.analyze(raw)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(AnalysisError::Unknown(panic_message(panic))),
        };

        match result {
            Ok(analysis) => analysis.into_outcome(),
            Err(err) => {
                match &err {
                    AnalysisError::Validation(e) => log::info!("Rejected submission: {}", e),
                    AnalysisError::Unknown(detail) => {
                        log::error!("Analysis failed unexpectedly: {}", detail)
                    }
                    other => log::error!("Analysis failed at {} stage: {}", other.stage(), other),
                }
                AnalysisOutcome::failed(err.user_message())
            }
        }
    }

    pub async fn analyze(&self, raw: &RawSubmission) -> Result<Analysis, AnalysisError> {
        enter(Stage::Validating);
        let request = self.validator.validate(raw)?;
        log::info!(
            "Analyzing {} image {} ({} bytes)",
            request.image.media_type(),
            request.image.fingerprint(),
            request.image.decoded_len()
        );

        enter(Stage::Detecting);
        let detection = self.detector.detect(&request).await?;
        log::info!(
            "Detection for {}: {:?} (confidence {:.2})",
            request.image.fingerprint(),
            detection.verdict,
            detection.confidence.value()
        );

        let disease_name = match &detection.verdict {
            Verdict::Healthy => {
                enter(Stage::Done);
                return Ok(Analysis {
                    detection,
                    advice: None,
                });
            }
            Verdict::Diseased { name } => name.clone(),
        };

        enter(Stage::Advising);
        let plant_name = request
            .plant_name_hint
            .as_deref()
            .or(detection.plant.common_name.as_deref())
            .unwrap_or_default();

        let advice = match self.advisor.advise(plant_name, &disease_name).await {
            Ok(advice) => advice,
            Err(source) => {
                log::warn!(
                    "Discarding detection of '{}' for {} because tips generation failed",
                    disease_name,
                    request.image.fingerprint()
                );
                return Err(AnalysisError::Advice {
                    mode: self.advisor.mode(),
                    source,
                });
            }
        };

        enter(Stage::Done);
        Ok(Analysis {
            detection,
            advice: Some(advice),
        })
    }
}

fn enter(stage: Stage) {
    log::debug!("Pipeline stage: {:?}", stage);
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::stub::StubCapability;
    use crate::capability::CapabilityError;
    use crate::intake::{IMAGE_FIELD, PLANT_NAME_FIELD};
    use serde_json::json;

    const JPEG: &str = "data:image/jpeg;base64,/9j/4AAQSkZJRg==";

    fn options(source: PlantNameSource) -> PipelineOptions {
        PipelineOptions {
            plant_name_source: source,
            advice_mode: AdviceMode::Prevention,
            max_image_bytes: 1024,
            stage_timeout: Duration::from_secs(5),
        }
    }

    fn pipeline(detect: &StubCapability, advise: &StubCapability, source: PlantNameSource) -> Pipeline {
        Pipeline::new(
            Arc::new(detect.clone()),
            Arc::new(advise.clone()),
            &options(source),
        )
    }

    #[tokio::test]
    async fn model_inferred_plant_name_feeds_advice() {
        let detect = StubCapability::new();
        detect.push_ok(json!({
            "diseaseDetected": true,
            "diseaseName": "Late blight",
            "confidence": 0.88,
            "plantName": "Potato",
            "scientificName": "Solanum tuberosum"
        }));
        let advise = StubCapability::new();
        advise.push_ok(json!({ "preventionTips": "- Rotate crops" }));

        let raw = RawSubmission::new().with_text(IMAGE_FIELD, JPEG);
        let analysis = pipeline(&detect, &advise, PlantNameSource::Model)
            .analyze(&raw)
            .await
            .unwrap();

        assert_eq!(analysis.detection.plant.common_name.as_deref(), Some("Potato"));
        assert!(advise.prompts()[0].text.contains("Plant: Potato"));
    }

    #[tokio::test]
    async fn user_hint_wins_over_inferred_name() {
        let detect = StubCapability::new();
        detect.push_ok(json!({
            "diseaseDetected": true,
            "diseaseName": "Rust",
            "confidence": 0.5,
            "plantName": "Bean"
        }));
        let advise = StubCapability::new();
        advise.push_ok(json!({ "preventionTips": "- Keep leaves dry" }));

        let raw = RawSubmission::new()
            .with_text(IMAGE_FIELD, JPEG)
            .with_text(PLANT_NAME_FIELD, "Snap pea");
        pipeline(&detect, &advise, PlantNameSource::Model)
            .analyze(&raw)
            .await
            .unwrap();

        assert!(advise.prompts()[0].text.contains("Plant: Snap pea"));
    }

    #[tokio::test]
    async fn diseased_without_any_plant_name_fails_at_advice() {
        let detect = StubCapability::new();
        detect.push_ok(json!({ "diseaseDetected": true, "diseaseName": "Rust", "confidence": 0.5 }));
        let advise = StubCapability::new();

        let raw = RawSubmission::new().with_text(IMAGE_FIELD, JPEG);
        let err = pipeline(&detect, &advise, PlantNameSource::Model)
            .analyze(&raw)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), "advice");
        assert_eq!(advise.calls(), 0);
    }

    #[tokio::test]
    async fn panics_become_unknown_errors() {
        let detect = StubCapability::new();
        detect.push_panic("stub exploded");
        let advise = StubCapability::new();

        let raw = RawSubmission::new()
            .with_text(IMAGE_FIELD, JPEG)
            .with_text(PLANT_NAME_FIELD, "Tomato");
        let outcome = pipeline(&detect, &advise, PlantNameSource::User).run(&raw).await;

        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Analysis failed: An unknown error occurred.")
        );
    }

    #[tokio::test]
    async fn detection_timeout_is_a_detection_failure() {
        let detect = StubCapability::new().with_delay(Duration::from_millis(200));
        detect.push_ok(json!({ "diseaseDetected": false, "diseaseName": "", "confidence": 0.9 }));
        let advise = StubCapability::new();

        let mut opts = options(PlantNameSource::User);
        opts.stage_timeout = Duration::from_millis(20);
        let pipeline = Pipeline::new(Arc::new(detect.clone()), Arc::new(advise.clone()), &opts);

        let raw = RawSubmission::new()
            .with_text(IMAGE_FIELD, JPEG)
            .with_text(PLANT_NAME_FIELD, "Tomato");
        let outcome = pipeline.run(&raw).await;

        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Analysis failed: Disease detection failed: request timed out after 20ms")
        );
        assert_eq!(advise.calls(), 0);
    }

    #[tokio::test]
    async fn transient_detection_errors_are_reported_not_retried() {
        let detect = StubCapability::new();
        detect.push_err(CapabilityError::Api { status: 500, message: "internal".into() });
        let advise = StubCapability::new();

        let raw = RawSubmission::new()
            .with_text(IMAGE_FIELD, JPEG)
            .with_text(PLANT_NAME_FIELD, "Tomato");
        let outcome = pipeline(&detect, &advise, PlantNameSource::User).run(&raw).await;

        assert!(!outcome.success);
        assert_eq!(detect.calls(), 1);
    }
}
