use phytoscan::analysis::pipeline::{Pipeline, PipelineOptions};
use phytoscan::capability::stub::StubCapability;
use phytoscan::capability::CapabilityError;
use phytoscan::intake::{RawSubmission, IMAGE_FIELD, PLANT_NAME_FIELD};
use phytoscan_shared::{AdviceMode, AnalysisOutcome, PlantNameSource};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// A tiny but well-formed JPEG header, base64 encoded.
const JPEG: &str = "data:image/jpeg;base64,/9j/4AAQSkZJRgABAQAAAQABAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwg";

struct Harness {
    detect: StubCapability,
    advise: StubCapability,
    pipeline: Pipeline,
}

fn harness(mode: AdviceMode) -> Harness {
    let detect = StubCapability::new();
    let advise = StubCapability::new();
    let options = PipelineOptions {
        plant_name_source: PlantNameSource::User,
        advice_mode: mode,
        max_image_bytes: 1024 * 1024,
        stage_timeout: Duration::from_secs(5),
    };
    let pipeline = Pipeline::new(Arc::new(detect.clone()), Arc::new(advise.clone()), &options);
    Harness {
        detect,
        advise,
        pipeline,
    }
}

fn submission(plant_name: &str) -> RawSubmission {
    RawSubmission::new()
        .with_text(IMAGE_FIELD, JPEG)
        .with_text(PLANT_NAME_FIELD, plant_name)
}

#[tokio::test]
async fn healthy_plant_skips_advice() {
    let h = harness(AdviceMode::Prevention);
    h.detect
        .push_ok(json!({ "diseaseDetected": false, "diseaseName": "", "confidence": 0.95 }));

    let outcome = h.pipeline.run(&submission("Tomato")).await;

    assert!(outcome.success);
    let detection = outcome.detection.expect("detection present");
    assert!(!detection.disease_detected);
    assert_eq!(detection.confidence, 0.95);
    assert_eq!(outcome.advice, None);
    assert_eq!(outcome.error, None);
    assert_eq!(h.advise.calls(), 0);
}

#[tokio::test]
async fn diseased_plant_gets_tips() {
    let h = harness(AdviceMode::Prevention);
    h.detect.push_ok(
        json!({ "diseaseDetected": true, "diseaseName": "Black spot", "confidence": 0.82 }),
    );
    h.advise.push_ok(
        json!({ "preventionTips": "- Remove affected leaves\n- Improve air circulation" }),
    );

    let outcome = h.pipeline.run(&submission("Rose")).await;

    assert!(outcome.success);
    let detection = outcome.detection.expect("detection present");
    assert_eq!(detection.disease_name, "Black spot");
    assert_eq!(detection.confidence_percent(), 82);
    let advice = outcome.advice.expect("advice present");
    assert_eq!(advice.mode, AdviceMode::Prevention);
    assert_eq!(advice.tips_text, "- Remove affected leaves\n- Improve air circulation");

    let prompt = &h.advise.prompts()[0];
    assert!(prompt.text.contains("Plant: Rose"));
    assert!(prompt.text.contains("Disease: Black spot"));
    assert!(prompt.image.is_none());
}

#[tokio::test]
async fn missing_image_is_rejected_before_any_call() {
    let h = harness(AdviceMode::Prevention);

    let raw = RawSubmission::new().with_text(PLANT_NAME_FIELD, "Tomato");
    let outcome = h.pipeline.run(&raw).await;

    assert_eq!(
        outcome,
        AnalysisOutcome::failed("Invalid form data. Please check your inputs.")
    );
    assert_eq!(h.detect.calls(), 0);
    assert_eq!(h.advise.calls(), 0);
}

#[tokio::test]
async fn detection_failures_name_the_stage() {
    let h = harness(AdviceMode::Prevention);
    h.detect.push_err(CapabilityError::Network("connection reset".into()));
    h.detect
        .push_ok(json!({ "diseaseDetected": true, "confidence": 0.6 }));

    let first = h.pipeline.run(&submission("Tomato")).await;
    assert!(!first.success);
    assert_eq!(
        first.error.as_deref(),
        Some("Analysis failed: Disease detection failed: network error: connection reset")
    );

    let second = h.pipeline.run(&submission("Tomato")).await;
    assert!(!second.success);
    assert!(second
        .error
        .as_deref()
        .unwrap_or_default()
        .starts_with("Analysis failed: Disease detection failed:"));
    assert_eq!(h.advise.calls(), 0);
}

#[tokio::test]
async fn out_of_range_confidence_is_a_detection_failure() {
    let h = harness(AdviceMode::Prevention);
    h.detect.push_ok(
        json!({ "diseaseDetected": true, "diseaseName": "Rust", "confidence": 1.4 }),
    );

    let outcome = h.pipeline.run(&submission("Bean")).await;

    assert!(!outcome.success);
    assert!(outcome
        .error
        .as_deref()
        .unwrap_or_default()
        .starts_with("Analysis failed: Disease detection failed:"));
    assert_eq!(h.advise.calls(), 0);
}

#[tokio::test]
async fn healthy_verdict_ignores_a_stray_disease_name() {
    let h = harness(AdviceMode::Prevention);
    h.detect.push_ok(
        json!({ "diseaseDetected": false, "diseaseName": "Powdery mildew", "confidence": 0.7 }),
    );

    let outcome = h.pipeline.run(&submission("Squash")).await;

    assert!(outcome.success);
    assert_eq!(outcome.detection.map(|d| d.disease_name), Some(String::new()));
    assert_eq!(h.advise.calls(), 0);
}

#[tokio::test]
async fn advice_failure_discards_the_detection() {
    let h = harness(AdviceMode::Treatment);
    h.detect.push_ok(
        json!({ "diseaseDetected": true, "diseaseName": "Leaf curl", "confidence": 0.9 }),
    );
    h.advise.push_err(CapabilityError::Api {
        status: 500,
        message: "internal".into(),
    });

    let outcome = h.pipeline.run(&submission("Peach")).await;

    assert_eq!(
        outcome,
        AnalysisOutcome::failed(
            "Analysis failed: Treatment tips generation failed: model API error (500): internal"
        )
    );
    assert_eq!(h.advise.calls(), 1);
}

#[tokio::test]
async fn same_replies_give_same_outcome() {
    let h = harness(AdviceMode::Prevention);
    for _ in 0..2 {
        h.detect.push_ok(
            json!({ "diseaseDetected": true, "diseaseName": "Black spot", "confidence": 0.82 }),
        );
        h.advise.push_ok(json!({ "preventionTips": "- Prune\n- Mulch" }));
    }

    let first = h.pipeline.run(&submission("Rose")).await;
    let second = h.pipeline.run(&submission("Rose")).await;

    assert!(first.success);
    assert_eq!(first, second);
}
