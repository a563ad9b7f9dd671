use phytoscan_shared::PlantNameSource;

use super::{
    AnalysisRequest, DataUri, DataUriError, FormValue, RawSubmission, IMAGE_FIELD,
    IMAGE_FILE_FIELD, PLANT_NAME_FIELD,
};

pub const INVALID_FORM_MESSAGE: &str = "Invalid form data. Please check your inputs.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("plant image is required")]
    MissingImage,
    #[error("plant name is required")]
    MissingPlantName,
    #[error("invalid plant image: {0}")]
    InvalidImage(#[from] DataUriError),
    #[error("plant image is {size} bytes, limit is {limit}")]
    ImageTooLarge { size: usize, limit: usize },
    #[error("unreadable form: {0}")]
    UnreadableForm(String),
}

impl ValidationError {
    /// The message shown to the user; the variant detail stays in the logs.
    pub fn user_message(&self) -> &'static str {
        INVALID_FORM_MESSAGE
    }
}

#[derive(Debug, Clone)]
pub struct FormValidator {
    plant_name_source: PlantNameSource,
    max_image_bytes: usize,
}

impl FormValidator {
    pub fn new(plant_name_source: PlantNameSource, max_image_bytes: usize) -> Self {
        Self {
            plant_name_source,
            max_image_bytes,
        }
    }

    pub fn validate(&self, raw: &RawSubmission) -> Result<AnalysisRequest, ValidationError> {
        let image = self.image(raw)?;

        let plant_name_hint = match raw.get(PLANT_NAME_FIELD) {
            Some(FormValue::Text(name)) if !name.trim().is_empty() => Some(name.trim().to_string()),
            _ => None,
        };
        if self.plant_name_source == PlantNameSource::User && plant_name_hint.is_none() {
            return Err(ValidationError::MissingPlantName);
        }

        Ok(AnalysisRequest {
            image,
            plant_name_hint,
        })
    }

    fn image(&self, raw: &RawSubmission) -> Result<DataUri, ValidationError> {
        // An empty data-URI field must not shadow an uploaded file.
        let value = [IMAGE_FIELD, IMAGE_FILE_FIELD]
            .into_iter()
            .filter_map(|field| raw.get(field))
            .find(|value| !value.is_blank())
            .ok_or(ValidationError::MissingImage)?;

        let image = match value {
            FormValue::Text(text) => DataUri::parse(text)?,
            FormValue::File {
                content_type,
                bytes,
            } => DataUri::from_bytes(content_type.as_deref().unwrap_or_default(), bytes)?,
        };

        if image.decoded_len() > self.max_image_bytes {
            return Err(ValidationError::ImageTooLarge {
                size: image.decoded_len(),
                limit: self.max_image_bytes,
            });
        }
        Ok(image)
    }
}
