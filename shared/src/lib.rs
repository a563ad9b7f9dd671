use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Which kind of tips the advice stage asks the model for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AdviceMode {
    Prevention,
    Treatment,
}

impl AdviceMode {
    /// Field name the model must fill in the advice response.
    pub fn tips_field(&self) -> &'static str {
        match self {
            AdviceMode::Prevention => "preventionTips",
            AdviceMode::Treatment => "treatmentTips",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AdviceMode::Prevention => "Prevention",
            AdviceMode::Treatment => "Treatment",
        }
    }
}

/// Whether the plant name comes from the user or is inferred by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PlantNameSource {
    User,
    Model,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSubmission {
    #[serde(default)]
    pub photo_data_uri: Option<String>,
    #[serde(default)]
    pub plant_name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReport {
    pub disease_detected: bool,
    pub disease_name: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plant_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scientific_name: Option<String>,
}

impl DetectionReport {
    pub fn confidence_percent(&self) -> u32 {
        (self.confidence * 100.0).round() as u32
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdviceReport {
    pub mode: AdviceMode,
    pub tips_text: String,
    pub tips: Vec<String>,
}

impl AdviceReport {
    pub fn new(mode: AdviceMode, tips_text: String) -> Self {
        let tips = split_tips(&tips_text);
        Self {
            mode,
            tips_text,
            tips,
        }
    }
}

/// Splits newline-delimited tips into display lines, dropping blank lines
/// and a leading bullet marker.
pub fn split_tips(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .map(|line| {
            ["- ", "* ", "• "]
                .iter()
                .find_map(|bullet| line.strip_prefix(bullet))
                .unwrap_or(line)
                .trim()
        })
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Terminal result of one analysis request, as rendered by the UI.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection: Option<DetectionReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<AdviceReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisOutcome {
    pub fn succeeded(detection: DetectionReport, advice: Option<AdviceReport>) -> Self {
        Self {
            success: true,
            detection: Some(detection),
            advice,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            detection: None,
            advice: None,
            error: Some(error.into()),
        }
    }
}
