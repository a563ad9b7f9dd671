use phytoscan_shared::AdviceMode;

use crate::analysis::advice::AdviceError;
use crate::analysis::detection::DetectionError;
use crate::intake::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Disease detection failed: {0}")]
    Detection(#[from] DetectionError),
    #[error("{label} tips generation failed: {source}", label = .mode.label())]
    Advice { mode: AdviceMode, source: AdviceError },
    #[error("An unknown error occurred.")]
    Unknown(String),
}

impl AnalysisError {
    pub fn stage(&self) -> &'static str {
        match self {
            AnalysisError::Validation(_) => "validation",
            AnalysisError::Detection(_) => "detection",
            AnalysisError::Advice { .. } => "advice",
            AnalysisError::Unknown(_) => "unknown",
        }
    }

    /// The single message surfaced to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::Validation(e) => e.user_message().to_string(),
            other => format!("Analysis failed: {other}"),
        }
    }
}
