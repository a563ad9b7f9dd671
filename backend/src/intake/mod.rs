mod data_uri;
mod validator;

pub use data_uri::{DataUri, DataUriError};
pub use validator::{FormValidator, ValidationError, INVALID_FORM_MESSAGE};

use phytoscan_shared::AnalysisSubmission;
use std::collections::HashMap;

pub const IMAGE_FIELD: &str = "photoDataUri";
pub const IMAGE_FILE_FIELD: &str = "photo";
pub const PLANT_NAME_FIELD: &str = "plantName";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File {
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

impl FormValue {
    pub fn is_blank(&self) -> bool {
        match self {
            FormValue::Text(text) => text.trim().is_empty(),
            FormValue::File { bytes, .. } => bytes.is_empty(),
        }
    }
}

/// Submitted fields as received, before any validation.
#[derive(Debug, Clone, Default)]
pub struct RawSubmission {
    fields: HashMap<String, FormValue>,
}

impl RawSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, FormValue::Text(value.into()));
        self
    }

    /// Later values for the same field replace earlier ones.
    pub fn insert(&mut self, name: &str, value: FormValue) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.fields.get(name)
    }
}

impl From<AnalysisSubmission> for RawSubmission {
    fn from(submission: AnalysisSubmission) -> Self {
        let mut raw = RawSubmission::new();
        if let Some(photo) = submission.photo_data_uri {
            raw.insert(IMAGE_FIELD, FormValue::Text(photo));
        }
        if let Some(plant_name) = submission.plant_name {
            raw.insert(PLANT_NAME_FIELD, FormValue::Text(plant_name));
        }
        raw
    }
}

/// A validated submission. Owned by the pipeline run that created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub image: DataUri,
    pub plant_name_hint: Option<String>,
}
